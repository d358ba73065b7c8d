//! Multi-band raster stack

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use crate::sample::FeatureVector;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// A named stack of co-registered bands indexed by `(band, row, col)`.
///
/// All bands share the same extent and the same no-data semantics: a cell is
/// missing when it is non-finite or equal to the declared marker.
#[derive(Debug, Clone, PartialEq)]
pub struct BandStack {
    names: Vec<String>,
    data: Array3<f64>,
    nodata: Option<f64>,
}

impl BandStack {
    /// Create a stack from a `(band, row, col)` array and one name per band.
    pub fn new<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        data: Array3<f64>,
        nodata: Option<f64>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.len() != data.len_of(Axis(0)) {
            return Err(Error::InvalidParameter {
                name: "names",
                value: names.len().to_string(),
                reason: format!("stack has {} bands", data.len_of(Axis(0))),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::DuplicateBand(name.clone()));
            }
        }
        Ok(Self { names, data, nodata })
    }

    /// Stack single-band rasters of identical shape.
    ///
    /// Each raster's own no-data cells become NaN, so the resulting stack
    /// uses NaN as its only missing marker.
    pub fn from_rasters<S: Into<String>>(
        bands: impl IntoIterator<Item = (S, Raster<f64>)>,
    ) -> Result<Self> {
        let bands: Vec<(String, Raster<f64>)> =
            bands.into_iter().map(|(n, r)| (n.into(), r)).collect();

        let Some((_, first)) = bands.first() else {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: "0".into(),
                reason: "at least one band is required".into(),
            });
        };
        let (rows, cols) = first.shape();

        let mut data = Array3::from_elem((bands.len(), rows, cols), f64::NAN);
        let mut names = Vec::with_capacity(bands.len());
        for (b, (name, raster)) in bands.into_iter().enumerate() {
            if raster.shape() != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: raster.rows(),
                    ac: raster.cols(),
                });
            }
            let nodata = raster.nodata();
            data.index_axis_mut(Axis(0), b)
                .zip_mut_with(raster.data(), |out, &v| {
                    if !v.is_nodata(nodata) {
                        *out = v;
                    }
                });
            names.push(name);
        }

        Self::new(names, data, Some(f64::NAN))
    }

    /// Band names in stack order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of bands
    pub fn n_bands(&self) -> usize {
        self.names.len()
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Dimensions as (bands, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Declared no-data marker
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Underlying `(band, row, col)` array
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Position of a band by name
    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// View of one band by name
    pub fn band(&self, name: &str) -> Option<ArrayView2<'_, f64>> {
        self.band_index(name).map(|b| self.band_at(b))
    }

    /// View of one band by position
    ///
    /// # Panics
    /// Panics if `index >= self.n_bands()`.
    pub fn band_at(&self, index: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), index)
    }

    /// Whether a value counts as missing under this stack's no-data rules
    pub fn is_missing(&self, value: f64) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Value at (band, row, col)
    pub fn get(&self, band: usize, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((band, row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Feature vector of one pixel; missing cells are reported as NaN.
    pub fn pixel(&self, row: usize, col: usize) -> Result<FeatureVector> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self
            .names
            .iter()
            .enumerate()
            .map(|(b, name)| {
                let v = self.data[(b, row, col)];
                (name.clone(), if self.is_missing(v) { f64::NAN } else { v })
            })
            .collect())
    }

    /// Copy one band out as a single-band raster
    pub fn to_raster(&self, name: &str) -> Result<Raster<f64>> {
        let view = self.band(name).ok_or_else(|| Error::BandMismatch {
            band: name.to_string(),
        })?;
        Ok(Raster::from_array(view.to_owned()).with_nodata(self.nodata))
    }

    /// Mask of pixels where every band holds a valid value
    pub fn valid_mask(&self) -> Array2<bool> {
        let mut mask = Array2::from_elem((self.rows(), self.cols()), true);
        for band in self.data.axis_iter(Axis(0)) {
            mask.zip_mut_with(&band, |m, &v| *m = *m && !self.is_missing(v));
        }
        mask
    }
}
