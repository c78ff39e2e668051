//! Image primitives: frame normalization and image persistence.

pub mod frame_ops;

pub use frame_ops::{normalize_frame, ImageWriter, JpegWriter};
