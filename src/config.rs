//! Index configuration. A plain, `serde`-derivable struct with a `Default`
//! impl rather than a builder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::allocator::AllocStrategy;
use crate::page::MAX_OBJECTS_PER_PAGE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Max objects per partition output by the block partitioner.
    pub block_size: usize,
    /// Max objects per page; clamped to `MAX_OBJECTS_PER_PAGE` in
    /// [`IndexConfig::normalize`].
    pub page_capacity: usize,
    /// Pages resident in the LRU cache.
    pub cache_size: usize,
    pub pages_per_track: usize,
    pub alloc_strategy: AllocStrategy,
    /// If false, adjacency queries return an empty list.
    pub enable_quadtree: bool,
    pub persist: bool,
    pub data_path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            block_size: 1024,
            page_capacity: 64,
            cache_size: 128,
            pages_per_track: 16,
            alloc_strategy: AllocStrategy::default(),
            enable_quadtree: true,
            persist: false,
            data_path: None,
        }
    }
}

impl IndexConfig {
    /// Clamp `page_capacity` to the hard `MAX_OBJECTS_PER_PAGE` ceiling.
    pub fn normalize(mut self) -> Self {
        self.page_capacity = self.page_capacity.min(MAX_OBJECTS_PER_PAGE).max(1);
        self.pages_per_track = self.pages_per_track.max(1);
        self.cache_size = self.cache_size.max(1);
        self.block_size = self.block_size.max(1);
        self
    }
}

// `AllocStrategy` needs `Serialize`/`Deserialize` to live in a config
// struct; implemented here (rather than in `allocator.rs`) to keep that
// module free of the config-boundary serde dependency.
impl Serialize for AllocStrategy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            AllocStrategy::NearestTrack => "nearest-track",
            AllocStrategy::BestFit => "best-fit",
            AllocStrategy::Sequential => "sequential",
            AllocStrategy::NewTrack => "new-track",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for AllocStrategy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "nearest-track" => Ok(AllocStrategy::NearestTrack),
            "best-fit" => Ok(AllocStrategy::BestFit),
            "sequential" => Ok(AllocStrategy::Sequential),
            "new-track" => Ok(AllocStrategy::NewTrack),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["nearest-track", "best-fit", "sequential", "new-track"],
            )),
        }
    }
}
