//! Balanced 2-D k-d tree over object centroids: the partitioner that backs
//! both block construction and the allocator's page-placement search.
//!
//! Alternating-axis split, branch-and-bound nearest/k-nearest, top-down MBR
//! partitioning. Nodes own their children outright and carry explicit
//! per-node subtree metadata (bounds, count) so queries never need to
//! re-walk a subtree to answer "how big is this".
//!
//! Payloads are required to be `Copy` (in practice `u64`/`PageId`/`TrackId`,
//! small dense ids), so the tree can store them directly in each node
//! without any indirection.

use crate::geometry::{Mbr, Point};
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

struct Node<T> {
    point: Point,
    id: u64,
    data: T,
    split_dim: u8,
    left: Option<Box<Node<T>>>,
    right: Option<Box<Node<T>>>,
    subtree_mbr: Mbr,
    count: usize,
}

impl<T> Node<T> {
    fn leaf(point: Point, id: u64, data: T, split_dim: u8) -> Self {
        Self {
            point,
            id,
            data,
            split_dim,
            left: None,
            right: None,
            subtree_mbr: Mbr::from_point(point),
            count: 1,
        }
    }
}

/// A single `(point, id, payload)` result from a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KdEntry<T> {
    pub point: Point,
    pub id: u64,
    pub data: T,
}

/// A max-heap entry ordered solely by distance, used by `k_nearest`'s
/// bounded heap. `Point`/`T` carry no ordering of their own.
struct HeapItem<T> {
    dist: OrderedFloat<f64>,
    id: u64,
    point: Point,
    data: T,
}

impl<T> PartialEq for HeapItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl<T> Eq for HeapItem<T> {}
impl<T> PartialOrd for HeapItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for HeapItem<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist.cmp(&other.dist)
    }
}

/// A balanced 2-D k-d tree. Alternates split axis by depth: even depths
/// split on x, odd depths split on y.
#[derive(Default)]
pub struct KdTree<T> {
    root: Option<Box<Node<T>>>,
}

impl<T: Copy> KdTree<T> {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, |n| n.count)
    }

    /// Depth of the tree (root at depth 1, 0 for an empty tree).
    pub fn depth(&self) -> usize {
        fn go<T>(node: &Option<Box<Node<T>>>) -> usize {
            match node {
                None => 0,
                Some(n) => 1 + go(&n.left).max(go(&n.right)),
            }
        }
        go(&self.root)
    }

    /// The MBR-union of every point in the tree (empty MBR if the tree is
    /// empty).
    pub fn bounds(&self) -> Mbr {
        self.root.as_ref().map_or(Mbr::empty(), |n| n.subtree_mbr)
    }

    fn axis(p: Point, dim: u8) -> f64 {
        if dim == 0 {
            p.x
        } else {
            p.y
        }
    }

    /// Insert one `(point, id, data)` tuple. Not self-balancing: repeated
    /// single inserts into a tree built from a skewed distribution can
    /// degenerate, so callers loading bulk data up front should use
    /// `bulk_load` instead.
    pub fn insert(&mut self, point: Point, id: u64, data: T) {
        Self::insert_rec(&mut self.root, point, id, data, 0);
    }

    fn insert_rec(
        slot: &mut Option<Box<Node<T>>>,
        point: Point,
        id: u64,
        data: T,
        depth: u32,
    ) {
        match slot {
            None => {
                *slot = Some(Box::new(Node::leaf(point, id, data, (depth % 2) as u8)));
            }
            Some(node) => {
                node.subtree_mbr = node.subtree_mbr.expand(point);
                node.count += 1;
                let go_left = Self::axis(point, node.split_dim) < Self::axis(node.point, node.split_dim);
                if go_left {
                    Self::insert_rec(&mut node.left, point, id, data, depth + 1);
                } else {
                    Self::insert_rec(&mut node.right, point, id, data, depth + 1);
                }
            }
        }
    }

    /// Rebuild the tree from scratch via median-of-sorted-halves bulk
    /// loading. Produces a tree of depth `<= ceil(log2(n+1))` in
    /// expectation.
    pub fn bulk_load(points: Vec<(Point, u64, T)>) -> Self {
        let root = Self::build(points, 0);
        Self { root }
    }

    fn build(mut points: Vec<(Point, u64, T)>, depth: u32) -> Option<Box<Node<T>>> {
        if points.is_empty() {
            return None;
        }
        let dim = (depth % 2) as u8;
        // Stable sort preserves input order among ties for median selection.
        if dim == 0 {
            points.sort_by(|a, b| a.0.x.partial_cmp(&b.0.x).unwrap());
        } else {
            points.sort_by(|a, b| a.0.y.partial_cmp(&b.0.y).unwrap());
        }

        let mid = points.len() / 2;
        let right_half = points.split_off(mid + 1);
        let (median_point, median_id, median_data) = points.remove(mid);
        let left_half = points;

        let left = Self::build(left_half, depth + 1);
        let right = Self::build(right_half, depth + 1);

        let mut subtree_mbr = Mbr::from_point(median_point);
        let mut count = 1;
        if let Some(l) = &left {
            subtree_mbr = subtree_mbr.union(&l.subtree_mbr);
            count += l.count;
        }
        if let Some(r) = &right {
            subtree_mbr = subtree_mbr.union(&r.subtree_mbr);
            count += r.count;
        }

        Some(Box::new(Node {
            point: median_point,
            id: median_id,
            data: median_data,
            split_dim: dim,
            left,
            right,
            subtree_mbr,
            count,
        }))
    }

    /// Nearest point to `q` by Euclidean distance. Ties broken by whichever
    /// candidate was visited first during the descent.
    pub fn nearest(&self, q: Point) -> Option<KdEntry<T>> {
        let mut best: Option<(f64, &Node<T>)> = None;
        Self::nearest_rec(&self.root, q, &mut best);
        best.map(|(_, n)| KdEntry {
            point: n.point,
            id: n.id,
            data: n.data,
        })
    }

    fn nearest_rec<'a>(node: &'a Option<Box<Node<T>>>, q: Point, best: &mut Option<(f64, &'a Node<T>)>) {
        let Some(n) = node else { return };
        let d = q.distance_sq(&n.point);
        let better = match best {
            None => true,
            Some((bd, _)) => d < *bd,
        };
        if better {
            *best = Some((d, n));
        }

        let axis_q = Self::axis(q, n.split_dim);
        let axis_n = Self::axis(n.point, n.split_dim);
        let (near, far) = if axis_q < axis_n {
            (&n.left, &n.right)
        } else {
            (&n.right, &n.left)
        };

        Self::nearest_rec(near, q, best);

        let split_diff = axis_q - axis_n;
        let best_dist_sq = best.map_or(f64::INFINITY, |(bd, _)| bd);
        if split_diff * split_diff < best_dist_sq {
            Self::nearest_rec(far, q, best);
        }
    }

    /// The `k` points of minimum Euclidean distance to `q`, in
    /// non-decreasing distance order. `k == 0` or an empty tree returns no
    /// results.
    pub fn k_nearest(&self, q: Point, k: usize) -> Vec<KdEntry<T>> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        // Bounded max-heap of size k: evict the current farthest candidate
        // whenever a closer one is found once the heap is full.
        let mut heap: BinaryHeap<HeapItem<T>> = BinaryHeap::new();
        Self::knn_rec(&self.root, q, k, &mut heap);

        // `into_sorted_vec` returns ascending order by `Ord` (i.e. nearest
        // first, since `HeapItem` orders by distance).
        heap.into_sorted_vec()
            .into_iter()
            .map(|item| KdEntry {
                point: item.point,
                id: item.id,
                data: item.data,
            })
            .collect()
    }

    fn knn_rec(node: &Option<Box<Node<T>>>, q: Point, k: usize, heap: &mut BinaryHeap<HeapItem<T>>) {
        let Some(n) = node else { return };
        let d = q.distance_sq(&n.point);
        if heap.len() < k {
            heap.push(HeapItem {
                dist: OrderedFloat(d),
                id: n.id,
                point: n.point,
                data: n.data,
            });
        } else if let Some(worst) = heap.peek() {
            if d < worst.dist.0 {
                heap.pop();
                heap.push(HeapItem {
                    dist: OrderedFloat(d),
                    id: n.id,
                    point: n.point,
                    data: n.data,
                });
            }
        }

        let axis_q = Self::axis(q, n.split_dim);
        let axis_n = Self::axis(n.point, n.split_dim);
        let (near, far) = if axis_q < axis_n {
            (&n.left, &n.right)
        } else {
            (&n.right, &n.left)
        };

        Self::knn_rec(near, q, k, heap);

        let split_diff = axis_q - axis_n;
        let worst = heap.peek().map_or(f64::INFINITY, |w| w.dist.0);
        if heap.len() < k || split_diff * split_diff < worst {
            Self::knn_rec(far, q, k, heap);
        }
    }

    /// Points whose coordinates fall within the closed rectangle `mbr`,
    /// pruning subtrees whose MBR does not intersect it.
    pub fn range_query(&self, mbr: &Mbr) -> Vec<KdEntry<T>> {
        let mut out = Vec::new();
        Self::range_rec(&self.root, mbr, &mut out);
        out
    }

    fn range_rec(node: &Option<Box<Node<T>>>, mbr: &Mbr, out: &mut Vec<KdEntry<T>>) {
        let Some(n) = node else { return };
        if !n.subtree_mbr.intersects(mbr) {
            return;
        }
        if mbr.contains_point(n.point) {
            out.push(KdEntry {
                point: n.point,
                id: n.id,
                data: n.data,
            });
        }
        Self::range_rec(&n.left, mbr, out);
        Self::range_rec(&n.right, mbr, out);
    }

    /// Points within Euclidean distance `r` of `q`: a range query over the
    /// enclosing square, exact-filtered by distance.
    pub fn radius_query(&self, q: Point, r: f64) -> Vec<KdEntry<T>> {
        let square = Mbr::new(q.x - r, q.y - r, q.x + r, q.y + r);
        let r2 = r * r;
        self.range_query(&square)
            .into_iter()
            .filter(|e| q.distance_sq(&e.point) <= r2)
            .collect()
    }

    /// Top-down partition into blocks of at most `max_points_per_block`
    /// points, emitted as subtree MBRs in left-first pre-order.
    pub fn partition(&self, max_points_per_block: usize) -> Vec<Mbr> {
        let mut out = Vec::new();
        Self::partition_rec(&self.root, max_points_per_block.max(1), &mut out);
        out
    }

    fn partition_rec(node: &Option<Box<Node<T>>>, max_points_per_block: usize, out: &mut Vec<Mbr>) {
        let Some(n) = node else { return };
        if n.count <= max_points_per_block || (n.left.is_none() && n.right.is_none()) {
            out.push(n.subtree_mbr);
            return;
        }
        Self::partition_rec(&n.left, max_points_per_block, out);
        Self::partition_rec(&n.right, max_points_per_block, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts() -> Vec<(Point, u64, u64)> {
        vec![
            (Point::new(0.0, 0.0), 1, 1),
            (Point::new(1.0, 1.0), 2, 2),
            (Point::new(2.0, 2.0), 3, 3),
            (Point::new(10.0, 10.0), 4, 4),
            (Point::new(20.0, 20.0), 5, 5),
        ]
    }

    #[test]
    fn empty_tree_queries_are_empty_not_errors() {
        let t: KdTree<u64> = KdTree::new();
        assert!(t.nearest(Point::new(0.0, 0.0)).is_none());
        assert!(t.k_nearest(Point::new(0.0, 0.0), 3).is_empty());
        assert!(t.range_query(&Mbr::new(0.0, 0.0, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn bulk_load_depth_is_balanced() {
        let t = KdTree::bulk_load(pts());
        assert_eq!(t.len(), 5);
        // ceil(log2(6)) = 3
        assert!(t.depth() <= 3);
    }

    #[test]
    fn k_nearest_returns_closest_in_ascending_order() {
        let t = KdTree::bulk_load(pts());
        let res = t.k_nearest(Point::new(0.5, 0.5), 3);
        let ids: Vec<u64> = res.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for w in res.windows(2) {
            let d0 = Point::new(0.5, 0.5).distance_sq(&w[0].point);
            let d1 = Point::new(0.5, 0.5).distance_sq(&w[1].point);
            assert!(d0 <= d1);
        }
    }

    #[test]
    fn range_query_returns_points_inside_rect() {
        let objs = vec![
            (Point::new(10.0, 20.0), 1, 1u64),
            (Point::new(30.0, 40.0), 2, 2u64),
            (Point::new(50.0, 60.0), 3, 3u64),
        ];
        let t = KdTree::bulk_load(objs);
        let hits = t.range_query(&Mbr::new(0.0, 0.0, 35.0, 45.0));
        let mut ids: Vec<u64> = hits.iter().map(|e| e.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn partition_respects_block_size() {
        let mut points = Vec::new();
        for i in 0..100u64 {
            points.push((Point::new(i as f64, i as f64), i, i));
        }
        let t = KdTree::bulk_load(points);
        let blocks = t.partition(10);
        assert!(!blocks.is_empty());
    }

    #[test]
    fn insert_one_at_a_time_matches_bulk_load_membership() {
        let mut t: KdTree<u64> = KdTree::new();
        for (p, id, d) in pts() {
            t.insert(p, id, d);
        }
        assert_eq!(t.len(), 5);
        let res = t.k_nearest(Point::new(0.0, 0.0), 1);
        assert_eq!(res[0].id, 1);
    }
}
