//! Surface reflectance normalization
//!
//! Converts raw sensor digital numbers to percent reflectance:
//!
//! ```text
//! ρ = (DN * scale + offset) * 100      for lo <= DN <= hi
//! ρ = missing                          otherwise
//! ```
//!
//! The defaults are the Landsat Collection-2 Level-2 surface reflectance
//! coefficients, whose valid DN range maps to roughly 0–100 %.

use ndarray::{Array2, Array3};
use rayon::prelude::*;
use landcart_core::raster::{BandStack, Raster};
use landcart_core::{Algorithm, Error, Result};

/// Parameters for reflectance normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectanceParams {
    /// Lowest valid raw value (inclusive)
    pub valid_min: f64,
    /// Highest valid raw value (inclusive)
    pub valid_max: f64,
    /// Multiplicative scale applied to raw values
    pub scale: f64,
    /// Additive offset applied after scaling
    pub offset: f64,
}

impl Default for ReflectanceParams {
    fn default() -> Self {
        Self {
            valid_min: 7273.0,
            valid_max: 43636.0,
            scale: 0.0000275,
            offset: -0.2,
        }
    }
}

impl ReflectanceParams {
    fn validate(&self) -> Result<()> {
        // Also rejects NaN bounds
        if !(self.valid_min < self.valid_max) {
            return Err(Error::InvalidRange {
                lo: self.valid_min,
                hi: self.valid_max,
            });
        }
        if !self.scale.is_finite() {
            return Err(Error::InvalidParameter {
                name: "scale",
                value: self.scale.to_string(),
                reason: "must be finite".into(),
            });
        }
        if !self.offset.is_finite() {
            return Err(Error::InvalidParameter {
                name: "offset",
                value: self.offset.to_string(),
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }

    #[inline]
    fn apply(&self, v: f64) -> f64 {
        if v < self.valid_min || v > self.valid_max {
            f64::NAN
        } else {
            (v * self.scale + self.offset) * 100.0
        }
    }
}

/// Reflectance normalization as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct ReflectanceNormalizer;

impl Algorithm for ReflectanceNormalizer {
    type Input = BandStack;
    type Output = BandStack;
    type Params = ReflectanceParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Reflectance"
    }

    fn description(&self) -> &'static str {
        "Mask out-of-range digital numbers and rescale to percent reflectance"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        normalize_reflectance(&input, &params)
    }
}

/// Normalize every band of a stack to percent reflectance.
///
/// Missing cells and values outside `[valid_min, valid_max]` become NaN.
/// Bands are treated independently: a missing cell in one band does not
/// mask the same pixel in the others.
///
/// # Errors
/// [`Error::InvalidRange`] if `valid_min >= valid_max`.
pub fn normalize_reflectance(stack: &BandStack, params: &ReflectanceParams) -> Result<BandStack> {
    params.validate()?;

    let (bands, rows, cols) = stack.shape();
    let input = stack.data();

    let data: Vec<f64> = (0..bands * rows)
        .into_par_iter()
        .flat_map(|band_row| {
            let (b, row) = (band_row / rows, band_row % rows);
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = input[(b, row, col)];
                if !stack.is_missing(v) {
                    *out = params.apply(v);
                }
            }
            row_data
        })
        .collect();

    let data = Array3::from_shape_vec((bands, rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;

    BandStack::new(stack.names().iter().cloned(), data, Some(f64::NAN))
}

/// Normalize a single band raster to percent reflectance.
pub fn normalize_band(raster: &Raster<f64>, params: &ReflectanceParams) -> Result<Raster<f64>> {
    params.validate()?;

    let (rows, cols) = raster.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = unsafe { raster.get_unchecked(row, col) };
                if !raster.is_nodata(v) {
                    *out = params.apply(v);
                }
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(Raster::from_array(data).with_nodata(Some(f64::NAN)))
}
