//! Urbis: a disk-aware, in-process spatial index for static or
//! lightly-mutated 2-D GIS datasets.
//!
//! Objects are stored in fixed-capacity pages grouped into fixed-capacity
//! tracks (modeling a disk's cylinder/track layout); a k-d tree over
//! object centroids answers range and k-nearest queries, and a quadtree
//! over page extents answers adjacency queries used to estimate seek
//! counts. See [`SpatialIndex`] for the public entry point.

pub mod adjacency;
pub mod allocator;
pub mod cache;
pub mod config;
mod error;
pub mod geometry;
pub mod kdtree;
pub mod page;
pub mod parser;
pub mod persistence;
pub mod quadtree;
pub mod spatial_index;

pub use crate::adjacency::AdjacencyResult;
pub use crate::allocator::AllocStrategy;
pub use crate::cache::{CacheStats, PageCache};
pub use crate::config::IndexConfig;
pub use crate::error::{Error, Result};
pub use crate::geometry::{Geometry, Mbr, ObjectType, Point, SpatialObject};
pub use crate::page::{IoStats, Page, PageId, PagePool, Track, TrackId};
pub use crate::persistence::{FileHeader, PersistentFile};
pub use crate::spatial_index::{Block, SpatialIndex};
