//! # LandCART Parallel
//!
//! Execution strategies for the classification engine.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, global-pool or fixed-width rayon execution
//! - Row tiling for data-parallel raster prediction

pub mod strategy;
pub mod tiled;

pub use strategy::{ParallelStrategy, ProcessingMode};
pub use tiled::{Tile, TileIterator};
