//! Forward-only reading: the working buffer and the streaming row decoder.

mod buffer;
mod feature_reader;

pub use buffer::FrameBuffer;
pub use feature_reader::{DecoderState, FeatureReader};
