//! Raster prediction with a trained decision tree
//!
//! Every pixel is classified independently: its band values are looked up by
//! name, and if all of them are present the tree is walked to a leaf. The
//! grid is cut into non-overlapping row tiles that are mapped concurrently
//! and gathered in tile order, so the output does not depend on scheduling.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use tracing::debug;
use landcart_core::raster::{BandStack, Raster};
use landcart_core::sample::{LabelAlphabet, Legend, CLASS_NODATA};
use landcart_core::{Error, Result};
use landcart_parallel::{ParallelStrategy, ProcessingMode, Tile, TileIterator};

use super::tree::DecisionTree;

/// Parameters for raster prediction
#[derive(Debug, Clone, Copy)]
pub struct PredictParams {
    /// Rows per tile (default: 256)
    pub tile_rows: usize,
    /// Execution mode (default: parallel)
    pub mode: ProcessingMode,
}

impl Default for PredictParams {
    fn default() -> Self {
        Self {
            tile_rows: 256,
            mode: ProcessingMode::Parallel,
        }
    }
}

/// A classified raster and the legend for its class codes.
///
/// Codes are `class index + 1`; [`CLASS_NODATA`] marks pixels with a missing
/// band value.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub raster: Raster<u16>,
    pub legend: Legend,
}

impl Classification {
    /// Label at (row, col), `None` for unclassified pixels
    pub fn label_at(&self, row: usize, col: usize) -> Result<Option<&str>> {
        let code = self.raster.get(row, col)?;
        Ok(self.legend.label(code))
    }

    /// Pixel count per legend code, in legend order
    pub fn class_counts(&self) -> Vec<(u16, usize)> {
        let mut counts: Vec<(u16, usize)> =
            self.legend.entries().iter().map(|e| (e.code, 0)).collect();
        for &code in self.raster.data().iter() {
            if let Some(slot) = counts.iter_mut().find(|(c, _)| *c == code) {
                slot.1 += 1;
            }
        }
        counts
    }

    /// Number of unclassified pixels
    pub fn nodata_count(&self) -> usize {
        self.raster.data().iter().filter(|&&c| c == CLASS_NODATA).count()
    }
}

/// Classify every pixel of a stack with default parameters.
///
/// # Errors
/// [`Error::BandMismatch`] if a band the tree was trained on is absent.
pub fn predict(stack: &BandStack, tree: &DecisionTree) -> Result<Classification> {
    predict_with(stack, tree, &PredictParams::default())
}

/// Classify every pixel of a stack.
pub fn predict_with(stack: &BandStack, tree: &DecisionTree, params: &PredictParams) -> Result<Classification> {
    let mapping = band_mapping(stack, tree)?;
    let (_, rows, cols) = stack.shape();
    let tiles: Vec<Tile> = TileIterator::row_bands(rows, cols, params.tile_rows).collect();

    let results: Vec<Vec<u16>> = params.mode.par_map(0..tiles.len(), |t| {
        let mut codes = Vec::with_capacity(tiles[t].len());
        for_each_pixel(stack, &mapping, &tiles[t], |values| {
            codes.push(match values {
                Some(v) => LabelAlphabet::code(tree.classify(v)),
                None => CLASS_NODATA,
            });
        });
        codes
    });

    let mut output = Array2::from_elem((rows, cols), CLASS_NODATA);
    for (tile, codes) in tiles.iter().zip(&results) {
        let block = ArrayView2::from_shape((tile.rows, tile.cols), codes.as_slice())
            .map_err(|e| Error::Other(e.to_string()))?;
        output
            .slice_mut(s![tile.row_range(), tile.col_range()])
            .assign(&block);
    }
    debug!("classified {rows}x{cols} pixels in {} tiles", tiles.len());

    Ok(Classification {
        raster: Raster::from_array(output).with_nodata(Some(CLASS_NODATA)),
        legend: tree.legend(),
    })
}

/// Per-pixel class probabilities, indexed `(class, row, col)`.
///
/// Probabilities are the class shares of the training samples in the leaf a
/// pixel reaches. Pixels with a missing band value are NaN in every class.
pub fn predict_proba(stack: &BandStack, tree: &DecisionTree, params: &PredictParams) -> Result<Array3<f64>> {
    let mapping = band_mapping(stack, tree)?;
    let n_classes = tree.alphabet().len();
    let (_, rows, cols) = stack.shape();
    let tiles: Vec<Tile> = TileIterator::row_bands(rows, cols, params.tile_rows).collect();

    // Pixel-major per tile: [p(class 0), p(class 1), ...] for each pixel
    let results: Vec<Vec<f64>> = params.mode.par_map(0..tiles.len(), |t| {
        let mut probs = Vec::with_capacity(tiles[t].len() * n_classes);
        for_each_pixel(stack, &mapping, &tiles[t], |values| match values {
            Some(v) => probs.extend(tree.probabilities(v)),
            None => probs.extend(std::iter::repeat(f64::NAN).take(n_classes)),
        });
        probs
    });

    let mut output = Array3::from_elem((n_classes, rows, cols), f64::NAN);
    for (tile, probs) in tiles.iter().zip(results) {
        let block = Array3::from_shape_vec((tile.rows, tile.cols, n_classes), probs)
            .map_err(|e| Error::Other(e.to_string()))?;
        for k in 0..n_classes {
            output
                .index_axis_mut(Axis(0), k)
                .slice_mut(s![tile.row_range(), tile.col_range()])
                .assign(&block.index_axis(Axis(2), k));
        }
    }

    Ok(output)
}

/// Stack band index for each tree band, by name.
fn band_mapping(stack: &BandStack, tree: &DecisionTree) -> Result<Vec<usize>> {
    tree.bands()
        .iter()
        .map(|name| {
            stack
                .band_index(name)
                .ok_or_else(|| Error::BandMismatch { band: name.clone() })
        })
        .collect()
}

/// Visit the pixels of a tile in row-major order, passing the tree-ordered
/// band values or `None` when any of them is missing.
fn for_each_pixel<F>(stack: &BandStack, mapping: &[usize], tile: &Tile, mut f: F)
where
    F: FnMut(Option<&[f64]>),
{
    let data = stack.data();
    let mut values = vec![0.0; mapping.len()];
    for row in tile.row_range() {
        for col in tile.col_range() {
            let mut complete = true;
            for (slot, &b) in values.iter_mut().zip(mapping) {
                let v = data[(b, row, col)];
                if stack.is_missing(v) {
                    complete = false;
                    break;
                }
                *slot = v;
            }
            f(complete.then_some(values.as_slice()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{build_training_set, train, TreeParams};
    use approx::assert_relative_eq;
    use landcart_core::sample::{FeatureVector, LabelOrder};
    use std::collections::HashMap;

    fn water_urban_tree() -> DecisionTree {
        let vectors = vec![
            ("s1", FeatureVector::new().with("red", 10.0).with("green", 20.0)),
            ("s2", FeatureVector::new().with("red", 80.0).with("green", 15.0)),
            ("s3", FeatureVector::new().with("red", 12.0).with("green", 22.0)),
            ("s4", FeatureVector::new().with("red", 75.0).with("green", 18.0)),
        ];
        let labels: HashMap<String, String> = [("s1", "water"), ("s2", "urban"), ("s3", "water"), ("s4", "urban")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let ts = build_training_set(&vectors, &labels, LabelOrder::Lexicographic).unwrap();
        train(&ts, &TreeParams { max_depth: Some(1), ..Default::default() }).unwrap()
    }

    fn stack(red: Vec<f64>, green: Vec<f64>, rows: usize, cols: usize) -> BandStack {
        let mut data = red;
        data.extend(green);
        BandStack::new(["red", "green"], Array3::from_shape_vec((2, rows, cols), data).unwrap(), None).unwrap()
    }

    #[test]
    fn test_two_by_two() {
        let tree = water_urban_tree();
        let grid = stack(vec![11.0, 90.0, 90.0, 90.0], vec![19.0; 4], 2, 2);

        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.label_at(0, 0).unwrap(), Some("water"));
        assert_eq!(result.label_at(0, 1).unwrap(), Some("urban"));
        assert_eq!(result.label_at(1, 0).unwrap(), Some("urban"));
        assert_eq!(result.label_at(1, 1).unwrap(), Some("urban"));
        assert_eq!(result.class_counts(), vec![(1, 3), (2, 1)]);
    }

    #[test]
    fn test_missing_band_value_is_nodata() {
        let tree = water_urban_tree();
        let grid = stack(vec![11.0, 90.0, 11.0, 90.0], vec![19.0, f64::NAN, 19.0, 19.0], 2, 2);

        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.raster.get(0, 1).unwrap(), CLASS_NODATA);
        assert_eq!(result.nodata_count(), 1);
        assert_eq!(result.label_at(1, 0).unwrap(), Some("water"));
    }

    #[test]
    fn test_band_entirely_missing() {
        let tree = water_urban_tree();
        let grid = stack(vec![11.0, 90.0, 11.0, 90.0], vec![f64::NAN; 4], 2, 2);
        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.nodata_count(), 4);
    }

    #[test]
    fn test_declared_nodata_marker() {
        let tree = water_urban_tree();
        let data = Array3::from_shape_vec((2, 1, 2), vec![11.0, -9999.0, 19.0, 19.0]).unwrap();
        let grid = BandStack::new(["red", "green"], data, Some(-9999.0)).unwrap();
        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.raster.data().as_slice().unwrap(), &[2, CLASS_NODATA]);
    }

    #[test]
    fn test_band_mismatch() {
        let tree = water_urban_tree();
        let data = Array3::from_shape_vec((2, 1, 1), vec![11.0, 19.0]).unwrap();
        let grid = BandStack::new(["red", "nir"], data, None).unwrap();
        let err = predict(&grid, &tree).unwrap_err();
        assert!(matches!(err, Error::BandMismatch { band } if band == "green"));
    }

    #[test]
    fn test_extra_bands_and_order_ignored() {
        let tree = water_urban_tree();
        let data = Array3::from_shape_vec((3, 1, 2), vec![0.0, 0.0, 19.0, 19.0, 11.0, 90.0]).unwrap();
        let grid = BandStack::new(["swir", "green", "red"], data, None).unwrap();
        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.raster.data().as_slice().unwrap(), &[2, 1]);
    }

    #[test]
    fn test_tiling_and_modes_agree() {
        let tree = water_urban_tree();
        let (rows, cols) = (37, 11);
        let red: Vec<f64> = (0..rows * cols)
            .map(|i| if i % 7 == 0 { f64::NAN } else { (i % 100) as f64 })
            .collect();
        let grid = stack(red, vec![19.0; rows * cols], rows, cols);

        let reference = predict_with(
            &grid,
            &tree,
            &PredictParams { tile_rows: rows, mode: ProcessingMode::Sequential },
        )
        .unwrap();
        for (tile_rows, mode) in [
            (1, ProcessingMode::Parallel),
            (5, ProcessingMode::ParallelWith(3)),
            (64, ProcessingMode::Parallel),
        ] {
            let other = predict_with(&grid, &tree, &PredictParams { tile_rows, mode }).unwrap();
            assert_eq!(other, reference);
        }
    }

    #[test]
    fn test_predict_proba() {
        let tree = water_urban_tree();
        let grid = stack(vec![11.0, f64::NAN], vec![19.0, 19.0], 1, 2);
        let probs = predict_proba(&grid, &tree, &PredictParams { tile_rows: 1, ..Default::default() }).unwrap();

        assert_eq!(probs.dim(), (2, 1, 2));
        assert_relative_eq!(probs[(0, 0, 0)], 0.0);
        assert_relative_eq!(probs[(1, 0, 0)], 1.0);
        assert!(probs[(0, 0, 1)].is_nan());
        assert!(probs[(1, 0, 1)].is_nan());
    }

    #[test]
    fn test_empty_grid() {
        let tree = water_urban_tree();
        let grid = stack(vec![], vec![], 0, 3);
        let result = predict(&grid, &tree).unwrap();
        assert_eq!(result.raster.shape(), (0, 3));
    }
}
