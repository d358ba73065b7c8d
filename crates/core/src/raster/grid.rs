//! Single-band raster grid

use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::Array2;

/// One band of pixels, indexed `(row, col)`.
///
/// Spectral bands are read as `Raster<f64>` and classified scenes are written
/// as `Raster<u16>` class codes. A cell is missing when it equals the
/// declared marker; float cells are also missing when non-finite.
///
/// # Example
///
/// ```
/// use landcart_core::Raster;
///
/// let mut red = Raster::filled(4, 3, f64::NAN);
/// red.set(1, 2, 12.5).unwrap();
/// assert_eq!(red.get(1, 2).unwrap(), 12.5);
/// assert_eq!(red.statistics().valid_count, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Grid of `rows x cols` cells all holding `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Grid from row-major pixel values, as decoded from an image strip
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|_| Error::InvalidDimensions {
                width: cols,
                height: rows,
            })
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self { data, nodata: None }
    }

    /// Declare the value that marks missing cells
    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        match self.data.get((row, col)) {
            Some(&v) => Ok(v),
            None => Err(self.out_of_bounds(row, col)),
        }
    }

    /// Value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Overwrite the value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(self.out_of_bounds(row, col));
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Declared missing-value marker
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Whether `value` counts as missing in this band
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Range, mean and missing count over the band's cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut stats = RasterStatistics {
            min: None,
            max: None,
            mean: None,
            valid_count: 0,
            nodata_count: 0,
        };
        let mut sum = 0.0;

        for &value in self.data.iter() {
            let Some(v) = value.to_f64().filter(|_| !self.is_nodata(value)) else {
                stats.nodata_count += 1;
                continue;
            };
            if stats.min.map_or(true, |m| value < m) {
                stats.min = Some(value);
            }
            if stats.max.map_or(true, |m| value > m) {
                stats.max = Some(value);
            }
            sum += v;
            stats.valid_count += 1;
        }

        if stats.valid_count > 0 {
            stats.mean = Some(sum / stats.valid_count as f64);
        }
        stats
    }
}

/// Summary of one band's valid cells
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
