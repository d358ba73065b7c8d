//! # LandCART Core
//!
//! Core types for the LandCART land-cover classification library.
//!
//! This crate provides:
//! - `Raster<T>`: generic single-band grid
//! - `BandStack`: named multi-band grid with a shared no-data marker
//! - `FeatureVector`, `LabeledSample`, `LabelAlphabet`, `Legend`: the sample
//!   and label model shared by training and prediction
//! - Algorithm traits for a consistent API

pub mod error;
pub mod raster;
pub mod sample;

pub use error::{Error, Result};
pub use raster::{BandStack, Raster, RasterElement};
pub use sample::{
    FeatureVector, LabelAlphabet, LabelOrder, LabeledSample, Legend, LegendEntry, CLASS_NODATA,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BandStack, Raster, RasterElement};
    pub use crate::sample::{
        FeatureVector, LabelAlphabet, LabelOrder, LabeledSample, Legend, CLASS_NODATA,
    };
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in LandCART.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
