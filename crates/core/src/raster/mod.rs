//! Raster data structures

mod element;
mod grid;
mod stack;

pub use element::RasterElement;
pub use grid::{Raster, RasterStatistics};
pub use stack::BandStack;
