//! Packed spatial index stored between the header and the feature stream.

mod packed_rtree;

pub use packed_rtree::{NodeItem, PackedRTree, SearchHit, NODE_ITEM_LEN};
