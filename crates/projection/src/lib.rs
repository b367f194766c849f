//! Map projections for geographic panels.
//!
//! Implements the projection math from scratch without external dependencies.

pub mod map_frame;
pub mod transverse_mercator;

pub use map_frame::MapFrame;
pub use transverse_mercator::TransverseMercator;
