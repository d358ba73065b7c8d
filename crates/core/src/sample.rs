//! Sample and label model shared by training and prediction
//!
//! - [`FeatureVector`]: ordered band name → value mapping for one pixel or sample
//! - [`LabeledSample`]: feature values in training band order plus a class index
//! - [`LabelAlphabet`]: the finite, explicitly ordered set of class labels
//! - [`Legend`]: class code → label mapping for classified rasters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Class code written to classified rasters for unclassified (missing) pixels.
pub const CLASS_NODATA: u16 = 0;

/// Ordered mapping from band name to value.
///
/// Insertion order is kept. Inserting a name that already exists replaces its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    /// Create an empty feature vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, band: impl Into<String>, value: f64) -> Self {
        self.insert(band, value);
        self
    }

    /// Insert or replace a band value
    pub fn insert(&mut self, band: impl Into<String>, value: f64) {
        let band = band.into();
        match self.entries.iter_mut().find(|(name, _)| *name == band) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((band, value)),
        }
    }

    /// Value of a band, if present
    pub fn get(&self, band: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == band)
            .map(|&(_, v)| v)
    }

    /// Band names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|&(_, v)| v)
    }

    /// (name, value) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, v)| (name.as_str(), *v))
    }

    /// Number of bands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the vector has no bands
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First band whose value is non-finite
    pub fn first_missing(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(name, _)| name.as_str())
    }

    /// Whether both vectors carry exactly the same set of band names
    pub fn same_bands(&self, other: &FeatureVector) -> bool {
        self.len() == other.len() && self.names().all(|n| other.get(n).is_some())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut fv = FeatureVector::new();
        for (name, value) in iter {
            fv.insert(name, value);
        }
        fv
    }
}

/// A training sample: values in training band order plus a class index.
///
/// Created once when the training set is built and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    key: String,
    values: Vec<f64>,
    class: usize,
}

impl LabeledSample {
    pub fn new(key: impl Into<String>, values: Vec<f64>, class: usize) -> Self {
        Self {
            key: key.into(),
            values,
            class,
        }
    }

    /// Sample identifier used to join with the label table
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Band values in training band order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index into the label alphabet
    pub fn class(&self) -> usize {
        self.class
    }
}

/// How the label alphabet orders its classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelOrder {
    /// Sorted by byte-wise string comparison
    #[default]
    Lexicographic,
    /// In order of first appearance in the input
    FirstSeen,
}

impl std::str::FromStr for LabelOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "lexicographic" | "sorted" => Ok(LabelOrder::Lexicographic),
            "first-seen" | "firstseen" => Ok(LabelOrder::FirstSeen),
            other => Err(format!("unknown label order: {other}")),
        }
    }
}

/// The finite set of class labels with a pinned order.
///
/// Class index `i` corresponds to `labels()[i]` and to raster class code
/// `i + 1`. The order is fixed when the alphabet is built and is threaded
/// through training, prediction and the output legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelAlphabet {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelAlphabet {
    /// Largest number of classes representable by `u16` class codes
    pub const MAX_CLASSES: usize = u16::MAX as usize - 1;

    /// Build an alphabet from (possibly repeated) labels
    pub fn from_labels<S: AsRef<str>>(labels: impl IntoIterator<Item = S>, order: LabelOrder) -> Self {
        let mut distinct: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for label in labels {
            let label = label.as_ref();
            if seen.insert(label.to_string()) {
                distinct.push(label.to_string());
            }
        }
        if order == LabelOrder::Lexicographic {
            distinct.sort();
        }
        Self::from(distinct)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in class-index order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label of a class index
    pub fn label(&self, class: usize) -> Option<&str> {
        self.labels.get(class).map(String::as_str)
    }

    /// Class index of a label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Raster class code of a class index
    pub fn code(class: usize) -> u16 {
        u16::try_from(class + 1).unwrap_or(CLASS_NODATA)
    }

    /// Legend mapping class codes to labels
    pub fn legend(&self) -> Legend {
        Legend {
            entries: self
                .labels
                .iter()
                .enumerate()
                .map(|(i, label)| LegendEntry {
                    code: Self::code(i),
                    label: label.clone(),
                })
                .collect(),
        }
    }
}

impl From<Vec<String>> for LabelAlphabet {
    fn from(labels: Vec<String>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }
}

impl From<LabelAlphabet> for Vec<String> {
    fn from(alphabet: LabelAlphabet) -> Self {
        alphabet.labels
    }
}

/// One legend row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub code: u16,
    pub label: String,
}

/// Class code → label mapping for a classified raster
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Legend {
    entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn entries(&self) -> &[LegendEntry] {
        &self.entries
    }

    /// Label for a class code; `None` for [`CLASS_NODATA`] and unknown codes
    pub fn label(&self, code: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.label.as_str())
    }

    /// Class code for a label
    pub fn code(&self, label: &str) -> Option<u16> {
        self.entries.iter().find(|e| e.label == label).map(|e| e.code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Legend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{:>5}  {}", entry.code, entry.label)?;
        }
        Ok(())
    }
}
