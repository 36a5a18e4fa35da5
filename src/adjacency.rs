//! Adjacency and seek estimator: the user-facing locality query over the
//! page-extent quadtree, with a seek-count estimate derived from the
//! track ids of the pages it returns.

use crate::geometry::Mbr;
use crate::page::{PageId, TrackId};
use crate::quadtree::QuadTree;

/// Result of [`find_adjacent_pages`]: the pages judged near a query region,
/// their owning tracks, and a deliberately order-dependent seek estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyResult {
    pub page_ids: Vec<PageId>,
    pub track_ids: Vec<TrackId>,
    pub count: usize,
    pub estimated_seeks: usize,
}

/// Query the page quadtree for items adjacent to `region`, then derive the
/// page/track id lists and the track-transition seek estimate.
///
/// `track_of` resolves a page id to its owning track id (the quadtree
/// itself only stores page ids as payload; the façade looks track
/// ownership up in the page pool).
///
/// `estimated_seeks` counts track transitions while scanning the returned
/// order: starting `last = 0`, for each page whose `track_id != last` and
/// `last != 0`, increment; then `last = track_id`. This is deliberately
/// order-dependent: the quadtree's spatially-local traversal is expected
/// to emit same-track pages consecutively.
pub fn find_adjacent_pages<F>(quadtree: &QuadTree<PageId>, region: &Mbr, track_of: F) -> AdjacencyResult
where
    F: Fn(PageId) -> TrackId,
{
    let items = quadtree.find_adjacent_to_region(region);

    let mut page_ids = Vec::with_capacity(items.len());
    let mut track_ids = Vec::with_capacity(items.len());
    let mut estimated_seeks = 0usize;
    let mut last = TrackId::NONE;

    for item in &items {
        let page_id = item.payload;
        let track_id = track_of(page_id);
        if track_id != last && last != TrackId::NONE {
            estimated_seeks += 1;
        }
        last = track_id;
        page_ids.push(page_id);
        track_ids.push(track_id);
    }

    let count = page_ids.len();
    AdjacencyResult {
        page_ids,
        track_ids,
        count,
        estimated_seeks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::quadtree::QtItem;
    use std::collections::HashMap;

    fn item(id: u64, mbr: Mbr, page: PageId) -> QtItem<PageId> {
        QtItem {
            id,
            bounds: mbr,
            centroid: mbr.center(),
            payload: page,
        }
    }

    #[test]
    fn seek_count_is_zero_for_single_track() {
        let mut qt: QuadTree<PageId> = QuadTree::new(Mbr::new(0.0, 0.0, 100.0, 100.0));
        qt.insert(item(1, Mbr::new(1.0, 1.0, 2.0, 2.0), PageId(1)));
        qt.insert(item(2, Mbr::new(3.0, 3.0, 4.0, 4.0), PageId(2)));
        let mut track_of = HashMap::new();
        track_of.insert(PageId(1), TrackId(1));
        track_of.insert(PageId(2), TrackId(1));

        let result = find_adjacent_pages(&qt, &Mbr::new(0.0, 0.0, 10.0, 10.0), |p| track_of[&p]);
        assert_eq!(result.count, 2);
        assert_eq!(result.estimated_seeks, 0);
    }

    #[test]
    fn seek_count_increments_on_track_transition() {
        let mut qt: QuadTree<PageId> = QuadTree::new(Mbr::new(0.0, 0.0, 100.0, 100.0));
        qt.insert(item(1, Mbr::new(1.0, 1.0, 2.0, 2.0), PageId(1)));
        qt.insert(item(2, Mbr::new(3.0, 3.0, 4.0, 4.0), PageId(2)));
        qt.insert(item(3, Mbr::new(5.0, 5.0, 6.0, 6.0), PageId(3)));
        let mut track_of = HashMap::new();
        track_of.insert(PageId(1), TrackId(1));
        track_of.insert(PageId(2), TrackId(2));
        track_of.insert(PageId(3), TrackId(1));

        let result = find_adjacent_pages(&qt, &Mbr::new(0.0, 0.0, 10.0, 10.0), |p| track_of[&p]);
        assert_eq!(result.count, 3);
        assert_eq!(result.estimated_seeks, 2);
    }

    #[test]
    fn empty_quadtree_yields_empty_result() {
        let qt: QuadTree<PageId> = QuadTree::new(Mbr::new(0.0, 0.0, 100.0, 100.0));
        let result = find_adjacent_pages(&qt, &Mbr::new(0.0, 0.0, 10.0, 10.0), |_| TrackId::NONE);
        assert_eq!(result.count, 0);
        assert_eq!(result.estimated_seeks, 0);
    }
}
