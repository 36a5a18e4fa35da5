//! End-to-end scenarios against the public `SpatialIndex` façade.
//!
//! Covers the six literal walkthroughs plus a couple of the boundary
//! behaviors called out for the index's public contract: range/kNN
//! results, adjacency seek estimation, polygon centroid derivation,
//! coincident points, and a file round-trip.

use urbis::{Geometry, IndexConfig, Point, SpatialIndex, SpatialObject};

fn point_obj(x: f64, y: f64) -> SpatialObject {
    SpatialObject::new(0, Geometry::Point(Point::new(x, y))).unwrap()
}

#[test]
fn basic_insert_and_range_query() {
    let mut idx = SpatialIndex::new(IndexConfig::default());
    idx.insert(point_obj(10.0, 20.0)).unwrap();
    idx.insert(point_obj(30.0, 40.0)).unwrap();
    idx.insert(point_obj(50.0, 60.0)).unwrap();
    idx.build().unwrap();

    let hits = idx.query_range(&urbis::Mbr::new(0.0, 0.0, 35.0, 45.0));
    let mut centroids: Vec<(f64, f64)> = hits.iter().map(|o| (o.centroid.x, o.centroid.y)).collect();
    centroids.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(centroids, vec![(10.0, 20.0), (30.0, 40.0)]);
}

#[test]
fn k_nearest_neighbors_in_ascending_distance_order() {
    let mut idx = SpatialIndex::new(IndexConfig::default());
    for (x, y) in [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (10.0, 10.0), (20.0, 20.0)] {
        idx.insert(point_obj(x, y)).unwrap();
    }
    idx.build().unwrap();

    let results = idx.query_knn(Point::new(0.5, 0.5), 3).unwrap();
    let centroids: Vec<(f64, f64)> = results.iter().map(|o| (o.centroid.x, o.centroid.y)).collect();
    assert_eq!(centroids, vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
}

#[test]
fn adjacency_seek_estimate_favors_spatial_locality() {
    let mut cfg = IndexConfig::default();
    cfg.page_capacity = 4;
    let mut idx = SpatialIndex::new(cfg);

    for row in 0..5i64 {
        for col in 0..10i64 {
            idx.insert(point_obj((col * 100) as f64, (row * 100) as f64)).unwrap();
        }
    }
    idx.build().unwrap();

    let result = idx.find_adjacent_pages(&urbis::Mbr::new(150.0, 150.0, 350.0, 350.0));
    assert!(result.count > 0);
    assert!(result.estimated_seeks <= result.count.saturating_sub(1));
    assert!((result.estimated_seeks as f64) / (result.count as f64) < 0.7);
}

#[test]
fn polygon_centroid_and_area() {
    let mut idx = SpatialIndex::new(IndexConfig::default());
    let square = Geometry::Polygon {
        exterior: vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 0.0),
        ],
        holes: vec![],
    };
    let id = idx.insert(SpatialObject::new(0, square).unwrap()).unwrap();

    let obj = idx.get(id).unwrap();
    assert!((obj.centroid.x - 5.0).abs() < 1e-9);
    assert!((obj.centroid.y - 5.0).abs() < 1e-9);
    assert!((obj.area() - 100.0).abs() < 1e-9);
}

#[test]
fn coincident_points_are_all_retrievable() {
    let mut idx = SpatialIndex::new(IndexConfig::default());
    for _ in 0..10 {
        idx.insert(point_obj(50.0, 50.0)).unwrap();
    }
    idx.build().unwrap();

    assert_eq!(idx.query_point(Point::new(50.0, 50.0)).len(), 10);
    assert_eq!(idx.query_knn(Point::new(50.0, 50.0), 5).unwrap().len(), 5);
}

#[test]
fn file_round_trip_preserves_count_and_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario6.urbis");

    let mut idx = SpatialIndex::new(IndexConfig::default());
    idx.insert(point_obj(10.0, 10.0)).unwrap();
    idx.insert(point_obj(100.0, 100.0)).unwrap();
    idx.insert(point_obj(200.0, 200.0)).unwrap();
    let bounds_before = idx.bounds();
    idx.sync(&path).unwrap();
    drop(idx);

    let reopened = urbis::PersistentFile::open(&path).unwrap();
    assert_eq!(reopened.header.object_count, 3);
    assert_eq!(reopened.header.bounds, bounds_before);
}

#[test]
fn empty_index_queries_succeed_with_zero_results() {
    let mut idx = SpatialIndex::new(IndexConfig::default());
    assert!(idx.query_range(&urbis::Mbr::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    assert!(idx.query_point(Point::new(0.0, 0.0)).is_empty());
    idx.build().unwrap();
    assert!(idx.is_built());
}
