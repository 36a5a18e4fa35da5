//! GeoJSON and WKT parsing: turns external text into [`SpatialObject`]s
//! with `id = 0`.
//!
//! GeoJSON is navigated through `serde_json::Value` rather than a typed
//! `geojson` crate dependency, since only `Point`/`LineString`/`Polygon`
//! need to be recognized (no `MultiGeometry`). WKT is hand-tokenized with
//! a peek/consume/expect cursor over `&str` byte offsets.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::geometry::{Geometry, Point, SpatialObject};

/// Parse a GeoJSON document. Accepts a `FeatureCollection`, a single
/// `Feature`, or a bare `Geometry` at the top level.
pub fn parse_geojson(input: &str) -> Result<Vec<SpatialObject>> {
    let value: Value = serde_json::from_str(input).map_err(|e| Error::Syntax(e.to_string()))?;
    parse_geojson_value(&value)
}

fn parse_geojson_value(value: &Value) -> Result<Vec<SpatialObject>> {
    let ty = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Parse("missing top-level \"type\"".into()))?;

    match ty {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Parse("FeatureCollection missing \"features\" array".into()))?;
            let mut out = Vec::with_capacity(features.len());
            for feature in features {
                out.extend(parse_feature(feature)?);
            }
            Ok(out)
        }
        "Feature" => parse_feature(value),
        "Point" | "LineString" | "Polygon" => {
            let geometry = geometry_from_value(value)?;
            Ok(vec![SpatialObject::new(0, geometry)?])
        }
        other => Err(Error::Unsupported(format!("unsupported GeoJSON type \"{other}\""))),
    }
}

fn parse_feature(value: &Value) -> Result<Vec<SpatialObject>> {
    let geometry_value = value
        .get("geometry")
        .ok_or_else(|| Error::Parse("Feature missing \"geometry\"".into()))?;
    let geometry = geometry_from_value(geometry_value)?;
    Ok(vec![SpatialObject::new(0, geometry)?])
}

fn geometry_from_value(value: &Value) -> Result<Geometry> {
    let ty = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Parse("geometry missing \"type\"".into()))?;
    let coords = value
        .get("coordinates")
        .ok_or_else(|| Error::Parse("geometry missing \"coordinates\"".into()))?;

    match ty {
        "Point" => {
            let p = point_from_array(coords)?;
            Ok(Geometry::Point(p))
        }
        "LineString" => {
            let pts = ring_from_array(coords)?;
            Ok(Geometry::LineString(pts))
        }
        "Polygon" => {
            let rings = coords
                .as_array()
                .ok_or_else(|| Error::Parse("Polygon coordinates must be an array of rings".into()))?;
            let mut iter = rings.iter();
            let exterior = ring_from_array(iter.next().ok_or_else(|| Error::Parse("Polygon has no exterior ring".into()))?)?;
            let holes = iter.map(ring_from_array).collect::<Result<Vec<_>>>()?;
            Ok(Geometry::Polygon { exterior, holes })
        }
        other => Err(Error::Unsupported(format!("unsupported geometry type \"{other}\""))),
    }
}

fn point_from_array(v: &Value) -> Result<Point> {
    let arr = v.as_array().ok_or_else(|| Error::Parse("coordinate is not an array".into()))?;
    if arr.len() < 2 {
        return Err(Error::Parse("coordinate array needs at least 2 numbers".into()));
    }
    let x = arr[0].as_f64().ok_or_else(|| Error::Parse("coordinate x is not numeric".into()))?;
    let y = arr[1].as_f64().ok_or_else(|| Error::Parse("coordinate y is not numeric".into()))?;
    Ok(Point::new(x, y))
}

fn ring_from_array(v: &Value) -> Result<Vec<Point>> {
    let arr = v.as_array().ok_or_else(|| Error::Parse("ring is not an array".into()))?;
    arr.iter().map(point_from_array).collect()
}

/// Parse a WKT string: `POINT (x y)`, `LINESTRING (x y, ...)`, or
/// `POLYGON ((...), (...), ...)` (case-insensitive keyword, whitespace
/// tolerant). Holes are preserved but ignored for centroid.
pub fn parse_wkt(input: &str) -> Result<SpatialObject> {
    let mut cursor = WktCursor::new(input);
    cursor.skip_ws();
    let keyword = cursor.take_ident().ok_or_else(|| Error::Syntax("expected a WKT keyword".into()))?;

    let geometry = match keyword.to_ascii_uppercase().as_str() {
        "POINT" => {
            cursor.expect('(')?;
            let p = cursor.take_point()?;
            cursor.expect(')')?;
            Geometry::Point(p)
        }
        "LINESTRING" => {
            cursor.expect('(')?;
            let pts = cursor.take_point_list()?;
            cursor.expect(')')?;
            Geometry::LineString(pts)
        }
        "POLYGON" => {
            cursor.expect('(')?;
            let mut rings = Vec::new();
            loop {
                cursor.expect('(')?;
                rings.push(cursor.take_point_list()?);
                cursor.expect(')')?;
                cursor.skip_ws();
                if cursor.peek() == Some(',') {
                    cursor.advance();
                    cursor.skip_ws();
                } else {
                    break;
                }
            }
            cursor.expect(')')?;
            let mut iter = rings.into_iter();
            let exterior = iter.next().ok_or_else(|| Error::Syntax("POLYGON has no exterior ring".into()))?;
            Geometry::Polygon {
                exterior,
                holes: iter.collect(),
            }
        }
        other => return Err(Error::Unsupported(format!("unsupported WKT keyword \"{other}\""))),
    };

    SpatialObject::new(0, geometry)
}

struct WktCursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> WktCursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).map(|&b| b as char)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(ch) {
            self.advance();
            Ok(())
        } else {
            Err(Error::Syntax(format!("expected '{}' at byte offset {}", ch, self.pos)))
        }
    }

    fn take_ident(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.advance();
        }
        if self.pos == start {
            None
        } else {
            Some(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
        }
    }

    fn take_number(&mut self) -> Result<f64> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '-' || c == '+') {
            self.advance();
        }
        let text = std::str::from_utf8(&self.input[start..self.pos]).map_err(|_| Error::Syntax("invalid utf-8 in number".into()))?;
        text.parse::<f64>().map_err(|_| Error::Syntax(format!("invalid number \"{text}\"")))
    }

    fn take_point(&mut self) -> Result<Point> {
        let x = self.take_number()?;
        self.skip_ws();
        let y = self.take_number()?;
        Ok(Point::new(x, y))
    }

    fn take_point_list(&mut self) -> Result<Vec<Point>> {
        let mut points = vec![self.take_point()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.advance();
                points.push(self.take_point()?);
            } else {
                break;
            }
        }
        Ok(points)
    }
}
