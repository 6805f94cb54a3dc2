//! Type conversion layer: rows, values and geometries to and from bytes.

pub mod feature;
pub mod geometry;
pub mod value;

pub use feature::{decode_feature, FeatureEncoder};
pub use geometry::{decode_geometry, encode_geometry};
pub use value::{
    column_type_from_tag, column_type_tag, decode_properties, decode_value, encode_properties,
    encode_value,
};
