//! Spatial allocator: answers "which page should receive this new
//! object's centroid?" via a secondary k-d tree over resident page
//! centroids, falling back to one of four track-selection strategies when
//! no existing page has room.

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::kdtree::KdTree;
use crate::page::{PageId, PagePool, TrackId};

/// Track-selection policy used when no existing page can absorb a new
/// object. `BestFit` is the default: it minimizes inter-track spatial
/// drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocStrategy {
    NearestTrack,
    #[default]
    BestFit,
    Sequential,
    NewTrack,
}

/// Owns the allocation k-d tree (indexed by page centroid) and the
/// configured strategy.
pub struct Allocator {
    strategy: AllocStrategy,
    page_tree: KdTree<PageId>,
}

impl Allocator {
    pub fn new(strategy: AllocStrategy) -> Self {
        Self {
            strategy,
            page_tree: KdTree::new(),
        }
    }

    pub fn strategy(&self) -> AllocStrategy {
        self.strategy
    }

    /// Record a page centroid in the allocation tree. Called after a page
    /// is allocated or its centroid changes, so the tree stays updated
    /// incrementally rather than needing a full rebuild on every insert.
    pub fn note_page_centroid(&mut self, page_id: PageId, centroid: Point) {
        self.page_tree.insert(centroid, page_id.0 as u64, page_id);
    }

    /// Rebuild the allocation tree from scratch from the current page set.
    /// Called after deletes, since removing a page can't be reflected
    /// incrementally.
    pub fn rebuild(&mut self, pool: &PagePool) {
        let points: Vec<(Point, u64, PageId)> = pool
            .pages()
            .filter(|p| !p.extent.is_empty())
            .map(|p| (p.centroid, p.id.0 as u64, p.id))
            .collect();
        self.page_tree = KdTree::bulk_load(points);
    }

    /// Decide which page should receive an object centered at `p`,
    /// allocating a fresh page (and, if necessary, a fresh track) when no
    /// existing page can take it.
    pub fn pick_page(&mut self, pool: &mut PagePool, p: Point) -> Result<PageId> {
        if !self.page_tree.is_empty() {
            if let Some(nearest) = self.page_tree.nearest(p) {
                if let Some(page) = pool.get_page(nearest.data) {
                    if !page.is_full() {
                        return Ok(nearest.data);
                    }
                }
            }
        }

        let track_id = self.choose_track(pool, p)?;
        let page_id = pool.alloc_page().id;
        pool.assign_page_to_track(page_id, track_id)?;
        if let Some(page) = pool.get_page_mut(page_id) {
            page.centroid = p;
        }
        self.note_page_centroid(page_id, p);
        Ok(page_id)
    }

    fn choose_track(&self, pool: &mut PagePool, p: Point) -> Result<TrackId> {
        let candidate = match self.strategy {
            AllocStrategy::NearestTrack => pool
                .tracks()
                .filter(|t| t.has_space())
                .min_by(|a, b| {
                    a.centroid
                        .distance_sq(&p)
                        .partial_cmp(&b.centroid.distance_sq(&p))
                        .unwrap()
                })
                .map(|t| t.id),
            AllocStrategy::BestFit => pool
                .tracks()
                .filter(|t| t.has_space())
                .min_by(|a, b| {
                    let da = a.extent.expand(p).area() - a.extent.area();
                    let db = b.extent.expand(p).area() - b.extent.area();
                    da.partial_cmp(&db).unwrap()
                })
                .map(|t| t.id),
            AllocStrategy::Sequential => pool.tracks().rev().find(|t| t.has_space()).map(|t| t.id),
            AllocStrategy::NewTrack => None,
        };

        match candidate {
            Some(id) => Ok(id),
            None => Ok(pool.alloc_track().id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MAX_OBJECTS_PER_PAGE;

    #[test]
    fn first_allocation_creates_a_track_and_page() {
        let mut pool = PagePool::new(MAX_OBJECTS_PER_PAGE, 16);
        let mut alloc = Allocator::new(AllocStrategy::BestFit);
        let page_id = alloc.pick_page(&mut pool, Point::new(0.0, 0.0)).unwrap();
        assert_eq!(page_id, PageId(1));
        assert_eq!(pool.track_count(), 1);
    }

    #[test]
    fn nearest_non_full_page_is_reused() {
        let mut pool = PagePool::new(2, 16);
        let mut alloc = Allocator::new(AllocStrategy::BestFit);
        let p1 = alloc.pick_page(&mut pool, Point::new(0.0, 0.0)).unwrap();
        let p2 = alloc.pick_page(&mut pool, Point::new(0.1, 0.1)).unwrap();
        assert_eq!(p1, p2, "second centroid is nearest to the first page and it has room");
    }

    #[test]
    fn full_nearest_page_forces_new_allocation() {
        let mut pool = PagePool::new(1, 16);
        let mut alloc = Allocator::new(AllocStrategy::BestFit);
        let p1 = alloc.pick_page(&mut pool, Point::new(0.0, 0.0)).unwrap();
        pool.get_page_mut(p1)
            .unwrap()
            .add_object(
                crate::geometry::SpatialObject::new(1, crate::geometry::Geometry::Point(Point::new(0.0, 0.0)))
                    .unwrap(),
            )
            .unwrap();
        let p2 = alloc.pick_page(&mut pool, Point::new(0.1, 0.1)).unwrap();
        assert_ne!(p1, p2);
    }

    #[test]
    fn new_track_strategy_always_opens_a_track() {
        let mut pool = PagePool::new(1, 16);
        let mut alloc = Allocator::new(AllocStrategy::NewTrack);
        alloc.pick_page(&mut pool, Point::new(0.0, 0.0)).unwrap();
        pool.get_page_mut(PageId(1))
            .unwrap()
            .add_object(
                crate::geometry::SpatialObject::new(1, crate::geometry::Geometry::Point(Point::new(0.0, 0.0)))
                    .unwrap(),
            )
            .unwrap();
        alloc.pick_page(&mut pool, Point::new(50.0, 50.0)).unwrap();
        assert_eq!(pool.track_count(), 2);
    }
}
