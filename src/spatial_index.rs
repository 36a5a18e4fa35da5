//! Spatial index façade: the public entry point tying together the
//! object-centroid k-d tree, the page-extent quadtree, the page pool, and
//! the allocator.
//!
//! Owns storage, indexes, and id counters, and exposes typed `Result`
//! operations over them. No locking or atomics: the index is
//! single-threaded and non-reentrant by contract, so there is nothing for
//! concurrency machinery to protect.

use std::path::Path;

use log::{info, trace};

use crate::adjacency::{self, AdjacencyResult};
use crate::allocator::Allocator;
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::geometry::{Mbr, Point, SpatialObject};
use crate::kdtree::KdTree;
use crate::page::{PageId, PagePool, TrackId};
use crate::persistence::PersistentFile;
use crate::quadtree::{QtItem, QuadTree};

/// A read-only partition produced by `build()` from the object-centroid
/// k-d tree. Discarded and regenerated on the next `build()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_id: u64,
    pub bounds: Mbr,
    pub centroid: Point,
    pub track_id: TrackId,
    pub object_count: usize,
}

/// The façade's lifecycle state: `Empty` is the initial state before any
/// insert; `Dirty` after a mutation; `Built` after `build()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Empty,
    Dirty,
    Built,
}

/// The public Urbis index. Owns every other component and maintains
/// their cross-module invariants.
pub struct SpatialIndex {
    config: IndexConfig,
    pool: PagePool,
    allocator: Allocator,
    block_tree: KdTree<u64>,
    page_quadtree: Option<QuadTree<PageId>>,
    blocks: Vec<Block>,
    bounds: Mbr,
    next_object_id: u64,
    next_block_id: u64,
    state: BuildState,
}

impl SpatialIndex {
    pub fn new(config: IndexConfig) -> Self {
        let config = config.normalize();
        let allocator = Allocator::new(config.alloc_strategy);
        Self {
            pool: PagePool::new(config.page_capacity, config.pages_per_track),
            allocator,
            block_tree: KdTree::new(),
            page_quadtree: None,
            blocks: Vec::new(),
            bounds: Mbr::empty(),
            next_object_id: 1,
            next_block_id: 1,
            state: BuildState::Empty,
            config,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn bounds(&self) -> Mbr {
        self.bounds
    }

    pub fn is_built(&self) -> bool {
        self.state == BuildState::Built
    }

    pub fn object_count(&self) -> usize {
        self.pool.stats().total_objects
    }

    fn mark_dirty(&mut self) {
        self.state = BuildState::Dirty;
    }

    /// Insert an object. Assigns a dense id if `obj.id == 0`. Fails with
    /// `Error::Invalid` if the geometry is empty (checked by
    /// `SpatialObject::new` at construction, but re-checked here since
    /// callers may hand-build one).
    pub fn insert(&mut self, mut obj: SpatialObject) -> Result<u64> {
        if obj.geometry.is_empty() {
            return Err(Error::Invalid("geometry has no vertices"));
        }
        if obj.id == 0 {
            obj.id = self.next_object_id;
        }
        self.next_object_id = self.next_object_id.max(obj.id + 1);

        let centroid = obj.centroid;
        let page_id = self.allocator.pick_page(&mut self.pool, centroid)?;
        let object_id = obj.id;
        self.pool
            .get_page_mut(page_id)
            .ok_or(Error::NotFound(page_id.0 as u64))?
            .add_object(obj)?;
        self.pool.recompute_track_derived(self.pool.get_page(page_id).unwrap().track_id);

        self.bounds = self.bounds.expand(centroid);
        self.mark_dirty();
        trace!("inserted object {object_id} into page {}", page_id.0);
        Ok(object_id)
    }

    /// Sequential inserts; stops at the first failure.
    pub fn bulk_insert(&mut self, objects: Vec<SpatialObject>) -> Result<Vec<u64>> {
        let mut ids = Vec::with_capacity(objects.len());
        for obj in objects {
            ids.push(self.insert(obj)?);
        }
        Ok(ids)
    }

    /// Locate the object's page by linear scan, remove it, and rebuild the
    /// allocation k-d tree. Fails with `Error::NotFound` if the id is
    /// absent.
    pub fn remove(&mut self, object_id: u64) -> Result<SpatialObject> {
        let page_id = self
            .pool
            .pages()
            .find(|p| p.find_object(object_id).is_some())
            .map(|p| p.id)
            .ok_or(Error::NotFound(object_id))?;

        let removed = self.pool.get_page_mut(page_id).unwrap().remove_object(object_id)?;
        let track_id = self.pool.get_page(page_id).unwrap().track_id;
        self.pool.recompute_track_derived(track_id);
        self.allocator.rebuild(&self.pool);
        self.mark_dirty();
        Ok(removed)
    }

    /// Bulk-build the block k-d tree from all object centroids, partition
    /// into blocks using `config.block_size`, and rebuild the page
    /// quadtree.
    pub fn build(&mut self) -> Result<()> {
        let mut points: Vec<(Point, u64, u64)> = Vec::new();
        for page in self.pool.pages() {
            for obj in &page.objects {
                points.push((obj.centroid, obj.id, obj.id));
            }
        }
        self.block_tree = KdTree::bulk_load(points);

        let partition_mbrs = self.block_tree.partition(self.config.block_size);
        self.blocks.clear();
        for mbr in partition_mbrs {
            let track_id = self.pool.alloc_track().id;
            let members: Vec<_> = self.pool.pages().flat_map(|p| p.objects.iter()).filter(|o| mbr.contains_point(o.centroid)).collect();
            let centroid = if members.is_empty() {
                mbr.center()
            } else {
                let n = members.len() as f64;
                let sx: f64 = members.iter().map(|o| o.centroid.x).sum();
                let sy: f64 = members.iter().map(|o| o.centroid.y).sum();
                Point::new(sx / n, sy / n)
            };
            self.blocks.push(Block {
                block_id: self.next_block_id,
                bounds: mbr,
                centroid,
                track_id,
                object_count: members.len(),
            });
            self.next_block_id += 1;
        }

        if self.config.enable_quadtree {
            let mut qt = QuadTree::new(self.bounds);
            for page in self.pool.pages().filter(|p| !p.extent.is_empty()) {
                qt.insert(QtItem {
                    id: page.id.0 as u64,
                    bounds: page.extent,
                    centroid: page.centroid,
                    payload: page.id,
                });
            }
            self.page_quadtree = Some(qt);
        } else {
            self.page_quadtree = None;
        }

        self.state = BuildState::Built;
        info!("built index: {} blocks, {} objects", self.blocks.len(), self.object_count());
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Pages intersecting `mbr`, then objects within those pages whose MBR
    /// intersects `mbr`. Works in any state; deterministic given a fixed
    /// index.
    pub fn query_range(&self, mbr: &Mbr) -> Vec<&SpatialObject> {
        self.pool
            .pages()
            .filter(|p| p.extent.intersects(mbr))
            .flat_map(|p| p.objects.iter())
            .filter(|o| o.mbr.intersects(mbr))
            .collect()
    }

    /// As `query_range` with a degenerate rectangle at `p`.
    pub fn query_point(&self, p: Point) -> Vec<&SpatialObject> {
        self.query_range(&Mbr::from_point(p))
    }

    /// k-nearest objects by centroid distance, from the block k-d tree.
    /// Requires a built index.
    pub fn query_knn(&self, p: Point, k: usize) -> Result<Vec<&SpatialObject>> {
        if !self.is_built() {
            return Err(Error::NotBuilt);
        }
        let entries = self.block_tree.k_nearest(p, k);
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(obj) = self.pool.pages().flat_map(|pg| pg.objects.iter()).find(|o| o.id == entry.id) {
                out.push(obj);
            }
        }
        Ok(out)
    }

    /// Builds the page quadtree lazily if it does not yet exist. Returns
    /// an empty result if `config.enable_quadtree` is false.
    pub fn find_adjacent_pages(&mut self, region: &Mbr) -> AdjacencyResult {
        if !self.config.enable_quadtree {
            return AdjacencyResult {
                page_ids: Vec::new(),
                track_ids: Vec::new(),
                count: 0,
                estimated_seeks: 0,
            };
        }
        if self.page_quadtree.is_none() {
            let mut qt = QuadTree::new(self.bounds);
            for page in self.pool.pages().filter(|p| !p.extent.is_empty()) {
                qt.insert(QtItem {
                    id: page.id.0 as u64,
                    bounds: page.extent,
                    centroid: page.centroid,
                    payload: page.id,
                });
            }
            self.page_quadtree = Some(qt);
        }
        let pool = &self.pool;
        adjacency::find_adjacent_pages(self.page_quadtree.as_ref().unwrap(), region, |page_id| {
            pool.get_page(page_id).map(|p| p.track_id).unwrap_or(TrackId::NONE)
        })
    }

    pub fn get(&self, object_id: u64) -> Option<&SpatialObject> {
        self.pool.pages().flat_map(|p| p.objects.iter()).find(|o| o.id == object_id)
    }

    /// Re-check the page/track invariants (extent and full-flag agreement,
    /// track capacity). Returns the first violation found, if any.
    pub fn validate(&self) -> Result<()> {
        for page in self.pool.pages() {
            let expected_extent = page.objects.iter().fold(Mbr::empty(), |acc, o| acc.union(&o.mbr));
            if page.extent != expected_extent {
                return Err(Error::Corrupt("page extent disagrees with its objects"));
            }
            if page.flags.full != (page.objects.len() >= page.capacity) {
                return Err(Error::Corrupt("page full flag disagrees with object_count"));
            }
        }
        for track in self.pool.tracks() {
            if track.page_ids.len() > track.capacity {
                return Err(Error::Corrupt("track holds more pages than its capacity"));
            }
        }
        Ok(())
    }

    /// Rebuild the allocation k-d tree and the page quadtree from current
    /// state.
    pub fn optimize(&mut self) -> Result<()> {
        self.allocator.rebuild(&self.pool);
        self.page_quadtree = None;
        self.build()
    }

    /// Write all dirty pages and the file header to `path`, creating the
    /// file if it does not yet exist. The page format does not carry full
    /// geometry; a reopened file exposes page count, track count, object
    /// count and bounds but not a rehydrated, queryable object set.
    pub fn sync(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut file = if path.exists() {
            PersistentFile::open(path)?
        } else {
            PersistentFile::create(path, self.bounds, self.config.pages_per_track as u32)?
        };
        file.sync(&mut self.pool)
    }
}
