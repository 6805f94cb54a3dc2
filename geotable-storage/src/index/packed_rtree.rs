//! Packed R-tree over feature envelopes.
//!
//! The tree is a flat array of [`NodeItem`]s laid out root level first and
//! leaf level last. Its byte size depends only on the number of items and the
//! branching factor, so writers can reserve the region before any feature is
//! encoded and readers can skip it without decoding it.
//!
//! Leaves keep feature storage order: leaf `i` describes feature `i` and its
//! `offset` is the byte offset of that feature's length prefix relative to
//! the start of the feature stream. An interior node's `offset` is the node
//! index of its first child.

use std::io::{Read, Write};
use std::ops::Range;

use geo::BoundingRect;
use geotable_tabular::Geometry;

use crate::error::{Result, StoreError};

/// Serialized size of one node: four f64 bounds and a u64 offset.
pub const NODE_ITEM_LEN: usize = 40;

/// One node of the tree: a bounding box plus an offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeItem {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub offset: u64,
}

impl NodeItem {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, offset: u64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            offset,
        }
    }

    /// A box that intersects nothing and is absorbed by [`expand`](Self::expand).
    pub fn empty(offset: u64) -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            offset,
        )
    }

    /// Envelope of `geometry`, or an empty box when there is no geometry or
    /// it has no coordinates.
    pub fn from_geometry(geometry: Option<&Geometry>, offset: u64) -> Self {
        match geometry.and_then(|g| g.bounding_rect()) {
            Some(rect) => Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y, offset),
            None => Self::empty(offset),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Grow this box to cover `other`. The offset is unchanged.
    pub fn expand(&mut self, other: &NodeItem) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    #[inline]
    pub fn intersects(&self, other: &NodeItem) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    fn write_le(&self, buf: &mut [u8; NODE_ITEM_LEN]) {
        buf[0..8].copy_from_slice(&self.min_x.to_le_bytes());
        buf[8..16].copy_from_slice(&self.min_y.to_le_bytes());
        buf[16..24].copy_from_slice(&self.max_x.to_le_bytes());
        buf[24..32].copy_from_slice(&self.max_y.to_le_bytes());
        buf[32..40].copy_from_slice(&self.offset.to_le_bytes());
    }

    fn read_le(buf: &[u8; NODE_ITEM_LEN]) -> Self {
        let f = |i: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&buf[i..i + 8]);
            b
        };
        Self {
            min_x: f64::from_le_bytes(f(0)),
            min_y: f64::from_le_bytes(f(8)),
            max_x: f64::from_le_bytes(f(16)),
            max_y: f64::from_le_bytes(f(24)),
            offset: u64::from_le_bytes(f(32)),
        }
    }
}

/// A leaf matched by [`PackedRTree::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// Feature ordinal in storage order.
    pub index: usize,
    /// Byte offset of the feature record within the feature stream.
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct PackedRTree {
    node_size: u16,
    num_items: usize,
    /// Node index range per level, leaves first.
    level_bounds: Vec<Range<usize>>,
    nodes: Vec<NodeItem>,
}

impl PackedRTree {
    /// Byte size of the index region for `num_items` features.
    ///
    /// Zero when there are no items or `node_size` is zero (no index).
    /// Otherwise `node_size` is clamped to at least 2 and every level down to
    /// a single root is counted, so one item still takes two nodes.
    pub fn calc_size(num_items: u64, node_size: u16) -> u64 {
        if num_items == 0 || node_size == 0 {
            return 0;
        }
        let num_nodes: u64 = level_sizes(num_items, node_size).iter().sum();
        num_nodes.saturating_mul(NODE_ITEM_LEN as u64)
    }

    /// Build the tree bottom-up from leaf envelopes in feature order.
    pub fn build(leaves: &[NodeItem], node_size: u16) -> Result<Self> {
        let _span =
            tracing::debug_span!("build_index", items = leaves.len(), node_size).entered();
        let level_bounds = level_bounds(leaves.len(), node_size)?;
        let num_nodes = level_bounds.first().map_or(0, |b| b.end);
        let ns = effective_node_size(node_size);

        let mut nodes = vec![NodeItem::empty(0); num_nodes];
        if let Some(leaf_level) = level_bounds.first() {
            nodes[leaf_level.clone()].copy_from_slice(leaves);
        }
        for level in 1..level_bounds.len() {
            let children = level_bounds[level - 1].clone();
            for (j, parent) in level_bounds[level].clone().enumerate() {
                let first = children.start + j * ns;
                let last = (first + ns).min(children.end);
                let mut node = NodeItem::empty(first as u64);
                for child in &nodes[first..last] {
                    node.expand(child);
                }
                nodes[parent] = node;
            }
        }

        Ok(Self {
            node_size,
            num_items: leaves.len(),
            level_bounds,
            nodes,
        })
    }

    /// Read a tree of `num_items` leaves from the index region.
    pub fn read_from<R: Read>(reader: &mut R, num_items: u64, node_size: u16) -> Result<Self> {
        let num_items = usize::try_from(num_items)
            .map_err(|_| StoreError::format(format!("feature count {num_items} too large")))?;
        let level_bounds = level_bounds(num_items, node_size)?;
        let num_nodes = level_bounds.first().map_or(0, |b| b.end);

        // Grow with the bytes actually read; a corrupt count must not
        // trigger one huge allocation.
        let mut nodes = Vec::with_capacity(num_nodes.min(1 << 16));
        let mut buf = [0u8; NODE_ITEM_LEN];
        for _ in 0..num_nodes {
            reader
                .read_exact(&mut buf)
                .map_err(|e| StoreError::from_read(e, "index region"))?;
            nodes.push(NodeItem::read_le(&buf));
        }

        Ok(Self {
            node_size,
            num_items,
            level_bounds,
            nodes,
        })
    }

    /// Serialize every node, root level first.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; NODE_ITEM_LEN];
        for node in &self.nodes {
            node.write_le(&mut buf);
            writer.write_all(&buf)?;
        }
        Ok(())
    }

    /// Serialized size in bytes; always equals [`calc_size`](Self::calc_size).
    #[inline]
    pub fn byte_size(&self) -> u64 {
        (self.nodes.len() * NODE_ITEM_LEN) as u64
    }

    #[inline]
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    #[inline]
    pub fn node_size(&self) -> u16 {
        self.node_size
    }

    /// Envelope of all indexed features, `None` for an empty tree.
    pub fn extent(&self) -> Option<NodeItem> {
        self.nodes.first().filter(|root| !root.is_empty()).copied()
    }

    /// Features whose envelope intersects the query box, in storage order.
    pub fn search(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<SearchHit> {
        let query = NodeItem::new(min_x, min_y, max_x, max_y, 0);
        let Some(top) = self.level_bounds.len().checked_sub(1) else {
            return Vec::new();
        };
        let ns = effective_node_size(self.node_size);

        let mut hits = Vec::new();
        let mut stack: Vec<(usize, usize)> =
            self.level_bounds[top].clone().map(|i| (i, top)).collect();
        while let Some((i, level)) = stack.pop() {
            let node = &self.nodes[i];
            if !node.intersects(&query) {
                continue;
            }
            if level == 0 {
                hits.push(SearchHit {
                    index: i - self.level_bounds[0].start,
                    offset: node.offset,
                });
                continue;
            }
            let children = &self.level_bounds[level - 1];
            let first = node.offset as usize;
            let last = first.saturating_add(ns).min(children.end);
            if first < children.start || first >= last {
                // Only reachable with a corrupt index region.
                tracing::warn!(node = i, first, "index node points outside its child level");
                continue;
            }
            stack.extend((first..last).map(|c| (c, level - 1)));
        }
        hits.sort_unstable_by_key(|h| h.index);
        hits
    }
}

#[inline]
fn effective_node_size(node_size: u16) -> usize {
    node_size.max(2) as usize
}

/// Node count per level, leaves first, ending with the single root.
fn level_sizes(num_items: u64, node_size: u16) -> Vec<u64> {
    let ns = effective_node_size(node_size) as u64;
    let mut n = num_items;
    let mut sizes = vec![n];
    loop {
        n = n.div_ceil(ns);
        sizes.push(n);
        if n == 1 {
            break;
        }
    }
    sizes
}

/// Node index range per level, leaves first. Empty for an empty tree.
fn level_bounds(num_items: usize, node_size: u16) -> Result<Vec<Range<usize>>> {
    if num_items == 0 || node_size == 0 {
        return Ok(Vec::new());
    }
    let sizes = level_sizes(num_items as u64, node_size);
    let total: u64 = sizes.iter().sum();
    let mut end = usize::try_from(total)
        .map_err(|_| StoreError::format(format!("index of {total} nodes too large")))?;
    let mut bounds = Vec::with_capacity(sizes.len());
    for size in sizes {
        // Sizes sum to `total`, which fits in usize.
        let start = end - size as usize;
        bounds.push(start..end);
        end = start;
    }
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point};

    fn grid(n: usize) -> Vec<NodeItem> {
        (0..n)
            .map(|i| {
                let x = (i % 10) as f64;
                let y = (i / 10) as f64;
                NodeItem::new(x, y, x + 0.5, y + 0.5, (i * 100) as u64)
            })
            .collect()
    }

    #[test]
    fn test_calc_size() {
        assert_eq!(PackedRTree::calc_size(0, 16), 0);
        assert_eq!(PackedRTree::calc_size(10, 0), 0);
        // leaf + root
        assert_eq!(PackedRTree::calc_size(1, 16), 2 * 40);
        assert_eq!(PackedRTree::calc_size(16, 16), 17 * 40);
        assert_eq!(PackedRTree::calc_size(17, 16), (17 + 2 + 1) * 40);
        assert_eq!(PackedRTree::calc_size(100, 16), (100 + 7 + 1) * 40);
        // node size 1 behaves like 2
        assert_eq!(
            PackedRTree::calc_size(5, 1),
            PackedRTree::calc_size(5, 2)
        );
        assert_eq!(PackedRTree::calc_size(5, 2), (5 + 3 + 2 + 1) * 40);
    }

    #[test]
    fn test_build_size_matches_calc_size() {
        for n in [1usize, 2, 15, 16, 17, 255, 256, 257, 1000] {
            for ns in [2u16, 4, 16, 100] {
                let tree = PackedRTree::build(&grid(n), ns).unwrap();
                assert_eq!(
                    tree.byte_size(),
                    PackedRTree::calc_size(n as u64, ns),
                    "n={n} ns={ns}"
                );
            }
        }
    }

    #[test]
    fn test_search_matches_brute_force() {
        let leaves = grid(237);
        let tree = PackedRTree::build(&leaves, 4).unwrap();
        let queries = [
            (0.0, 0.0, 1.0, 1.0),
            (2.2, 3.7, 6.1, 9.0),
            (-5.0, -5.0, -1.0, -1.0),
            (-100.0, -100.0, 100.0, 100.0),
            (9.5, 23.5, 9.5, 23.5),
        ];
        for (min_x, min_y, max_x, max_y) in queries {
            let query = NodeItem::new(min_x, min_y, max_x, max_y, 0);
            let expected: Vec<usize> = leaves
                .iter()
                .enumerate()
                .filter(|(_, leaf)| leaf.intersects(&query))
                .map(|(i, _)| i)
                .collect();
            let hits = tree.search(min_x, min_y, max_x, max_y);
            let got: Vec<usize> = hits.iter().map(|h| h.index).collect();
            assert_eq!(got, expected, "query {query:?}");
            for hit in hits {
                assert_eq!(hit.offset, (hit.index * 100) as u64);
            }
        }
    }

    #[test]
    fn test_extent_and_empty_leaves() {
        let p: Geometry = point!(x: 1.0, y: 2.0).into();
        let l: Geometry = line_string![(x: -3.0, y: 0.0), (x: 4.0, y: 8.0)].into();
        let leaves = vec![
            NodeItem::from_geometry(Some(&p), 0),
            NodeItem::from_geometry(None, 10),
            NodeItem::from_geometry(Some(&l), 20),
        ];
        assert!(leaves[1].is_empty());

        let tree = PackedRTree::build(&leaves, 16).unwrap();
        let extent = tree.extent().unwrap();
        assert_eq!(
            (extent.min_x, extent.min_y, extent.max_x, extent.max_y),
            (-3.0, 0.0, 4.0, 8.0)
        );

        // The feature without geometry is never returned.
        let hits = tree.search(-1000.0, -1000.0, 1000.0, 1000.0);
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_write_then_read() {
        let tree = PackedRTree::build(&grid(50), 8).unwrap();
        let mut bytes = Vec::new();
        tree.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len() as u64, tree.byte_size());

        let read = PackedRTree::read_from(&mut bytes.as_slice(), 50, 8).unwrap();
        assert_eq!(read.nodes, tree.nodes);
        assert_eq!(read.search(0.0, 0.0, 2.0, 0.2), tree.search(0.0, 0.0, 2.0, 0.2));

        let err = PackedRTree::read_from(&mut &bytes[..bytes.len() - 1], 50, 8).unwrap_err();
        assert!(err.to_string().contains("truncated index region"));
    }

    #[test]
    fn test_empty_tree() {
        let tree = PackedRTree::build(&[], 16).unwrap();
        assert_eq!(tree.byte_size(), 0);
        assert!(tree.extent().is_none());
        assert!(tree.search(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn test_zeroed_region_is_harmless() {
        // An unpopulated region reads as all-zero boxes pointing at node 0.
        let size = PackedRTree::calc_size(20, 4) as usize;
        let zeros = vec![0u8; size];
        let tree = PackedRTree::read_from(&mut zeros.as_slice(), 20, 4).unwrap();
        // Must terminate without panicking, whatever it returns.
        let _ = tree.search(0.0, 0.0, 0.0, 0.0);
    }
}
