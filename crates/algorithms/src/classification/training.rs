//! Training set construction
//!
//! Joins extracted feature vectors with their labels, drops samples with
//! missing band values and pins the label alphabet to a deterministic order.

use std::collections::HashMap;
use tracing::{debug, info};
use landcart_core::sample::{FeatureVector, LabelAlphabet, LabelOrder, LabeledSample};
use landcart_core::{Error, Result};

/// Labeled samples ready for tree training.
///
/// All samples carry values for the same bands, in [`TrainingSet::bands`]
/// order, and a class index into [`TrainingSet::alphabet`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    bands: Vec<String>,
    alphabet: LabelAlphabet,
    samples: Vec<LabeledSample>,
    dropped: usize,
}

impl TrainingSet {
    /// Assemble a training set from already-encoded samples.
    ///
    /// Every sample must have one value per band and a class index inside
    /// the alphabet.
    pub fn new(bands: Vec<String>, alphabet: LabelAlphabet, samples: Vec<LabeledSample>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::InvalidParameter {
                name: "bands",
                value: "0".into(),
                reason: "at least one band is required".into(),
            });
        }
        if samples.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        check_class_capacity(&alphabet)?;
        for s in &samples {
            if s.values().len() != bands.len() {
                return Err(Error::InvalidParameter {
                    name: "values",
                    value: s.values().len().to_string(),
                    reason: format!("sample '{}' must have {} values", s.key(), bands.len()),
                });
            }
            if s.class() >= alphabet.len() {
                return Err(Error::InvalidParameter {
                    name: "class",
                    value: s.class().to_string(),
                    reason: format!("alphabet has {} labels", alphabet.len()),
                });
            }
            if let Some(b) = s.values().iter().position(|v| !v.is_finite()) {
                return Err(Error::MissingValue { band: bands[b].clone() });
            }
        }
        Ok(Self {
            bands,
            alphabet,
            samples,
            dropped: 0,
        })
    }

    /// Band names in value order
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    /// Label alphabet
    pub fn alphabet(&self) -> &LabelAlphabet {
        &self.alphabet
    }

    /// Samples in input order
    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of input vectors discarded for missing data
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of samples per class index
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.alphabet.len()];
        for s in &self.samples {
            counts[s.class()] += 1;
        }
        counts
    }
}

/// Build a training set from extracted feature vectors and a label table.
///
/// * `vectors` - `(sample key, feature vector)` pairs
/// * `labels` - sample key → raw label
/// * `order` - ordering policy for the label alphabet
///
/// Band order is taken from the first vector; all vectors must carry the
/// same band names. Vectors with any non-finite value, or whose label is
/// blank, are dropped. Labels are trimmed of surrounding whitespace.
///
/// # Errors
/// - [`Error::JoinKeyMismatch`] if a key has no label
/// - [`Error::BandMismatch`] if a vector's band names differ from the first
/// - [`Error::EmptyTrainingSet`] if nothing survives filtering
pub fn build_training_set<K: AsRef<str>>(
    vectors: &[(K, FeatureVector)],
    labels: &HashMap<String, String>,
    order: LabelOrder,
) -> Result<TrainingSet> {
    let Some((_, first)) = vectors.first() else {
        return Err(Error::EmptyTrainingSet);
    };
    let bands: Vec<String> = first.names().map(str::to_string).collect();
    if bands.is_empty() {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: "0".into(),
            reason: "feature vectors have no bands".into(),
        });
    }

    let mut kept: Vec<(&str, Vec<f64>, &str)> = Vec::with_capacity(vectors.len());
    let mut dropped = 0usize;

    for (key, fv) in vectors {
        let key = key.as_ref();
        check_bands(&bands, fv)?;

        let label = labels
            .get(key)
            .ok_or_else(|| Error::JoinKeyMismatch { key: key.to_string() })?
            .trim();

        match ordered_values(&bands, fv) {
            Ok(values) if !label.is_empty() => kept.push((key, values, label)),
            Ok(_) => {
                debug!("dropping sample '{key}': blank label");
                dropped += 1;
            }
            Err(Error::MissingValue { band }) => {
                debug!("dropping sample '{key}': missing value in band '{band}'");
                dropped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if kept.is_empty() {
        return Err(Error::EmptyTrainingSet);
    }

    let alphabet = LabelAlphabet::from_labels(kept.iter().map(|(_, _, l)| *l), order);
    check_class_capacity(&alphabet)?;

    let samples: Vec<LabeledSample> = kept
        .into_iter()
        .map(|(key, values, label)| {
            let class = alphabet.index_of(label).unwrap_or_default();
            LabeledSample::new(key, values, class)
        })
        .collect();

    info!(
        "training set: {} samples, {} dropped, {} classes, {} bands",
        samples.len(),
        dropped,
        alphabet.len(),
        bands.len()
    );

    Ok(TrainingSet {
        bands,
        alphabet,
        samples,
        dropped,
    })
}

fn check_bands(bands: &[String], fv: &FeatureVector) -> Result<()> {
    if let Some(band) = bands.iter().find(|b| fv.get(b).is_none()) {
        return Err(Error::BandMismatch { band: band.clone() });
    }
    if let Some(band) = fv.names().find(|n| !bands.iter().any(|b| b.as_str() == *n)) {
        return Err(Error::BandMismatch { band: band.to_string() });
    }
    Ok(())
}

/// Values of `fv` in `bands` order, or `MissingValue` for the first
/// absent or non-finite band.
fn ordered_values(bands: &[String], fv: &FeatureVector) -> Result<Vec<f64>> {
    bands
        .iter()
        .map(|b| match fv.get(b) {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(Error::MissingValue { band: b.clone() }),
        })
        .collect()
}

/// Every class index must map to a nonzero `u16` class code
pub(crate) fn check_class_capacity(alphabet: &LabelAlphabet) -> Result<()> {
    if alphabet.len() > LabelAlphabet::MAX_CLASSES {
        return Err(Error::InvalidParameter {
            name: "labels",
            value: alphabet.len().to_string(),
            reason: format!("at most {} classes are supported", LabelAlphabet::MAX_CLASSES),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(red: f64, green: f64) -> FeatureVector {
        FeatureVector::new().with("red", red).with("green", green)
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_build_basic() {
        let vectors = vec![("a", fv(10.0, 20.0)), ("b", fv(80.0, 15.0)), ("c", fv(12.0, 22.0))];
        let table = labels(&[("a", "water"), ("b", "urban"), ("c", " water ")]);

        let ts = build_training_set(&vectors, &table, LabelOrder::Lexicographic).unwrap();
        assert_eq!(ts.bands(), ["red", "green"]);
        assert_eq!(ts.alphabet().labels(), ["urban", "water"]);
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.samples()[0].class(), 1);
        assert_eq!(ts.samples()[1].class(), 0);
        assert_eq!(ts.samples()[2].class(), 1);
        assert_eq!(ts.class_counts(), vec![1, 2]);
    }

    #[test]
    fn test_values_reordered_to_first_vector() {
        let vectors = vec![
            ("a", fv(1.0, 2.0)),
            ("b", FeatureVector::new().with("green", 4.0).with("red", 3.0)),
        ];
        let table = labels(&[("a", "x"), ("b", "y")]);
        let ts = build_training_set(&vectors, &table, LabelOrder::FirstSeen).unwrap();
        assert_eq!(ts.samples()[1].values(), [3.0, 4.0]);
    }

    #[test]
    fn test_missing_values_dropped() {
        let vectors = vec![
            ("a", fv(10.0, f64::NAN)),
            ("b", fv(80.0, 15.0)),
            ("c", fv(f64::INFINITY, 1.0)),
        ];
        let table = labels(&[("a", "water"), ("b", "urban"), ("c", "water")]);
        let ts = build_training_set(&vectors, &table, LabelOrder::Lexicographic).unwrap();
        assert_eq!(ts.len(), 1);
        assert_eq!(ts.dropped(), 2);
        // "water" only appeared on dropped samples
        assert_eq!(ts.alphabet().labels(), ["urban"]);
    }

    #[test]
    fn test_join_key_mismatch() {
        let vectors = vec![("a", fv(1.0, 2.0)), ("zz", fv(3.0, 4.0))];
        let table = labels(&[("a", "x")]);
        let err = build_training_set(&vectors, &table, LabelOrder::Lexicographic).unwrap_err();
        assert!(matches!(err, Error::JoinKeyMismatch { key } if key == "zz"));
    }

    #[test]
    fn test_empty_after_filtering() {
        let vectors = vec![("a", fv(f64::NAN, 2.0)), ("b", fv(1.0, 2.0))];
        let table = labels(&[("a", "x"), ("b", "   ")]);
        let err = build_training_set(&vectors, &table, LabelOrder::Lexicographic).unwrap_err();
        assert!(matches!(err, Error::EmptyTrainingSet));

        let none: Vec<(&str, FeatureVector)> = Vec::new();
        assert!(matches!(
            build_training_set(&none, &table, LabelOrder::Lexicographic),
            Err(Error::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_band_mismatch() {
        let vectors = vec![
            ("a", fv(1.0, 2.0)),
            ("b", FeatureVector::new().with("red", 1.0).with("nir", 2.0)),
        ];
        let table = labels(&[("a", "x"), ("b", "y")]);
        let err = build_training_set(&vectors, &table, LabelOrder::Lexicographic).unwrap_err();
        assert!(matches!(err, Error::BandMismatch { band } if band == "green"));
    }

    #[test]
    fn test_alphabet_order_reproducible() {
        let vectors = vec![("a", fv(1.0, 1.0)), ("b", fv(2.0, 2.0)), ("c", fv(3.0, 3.0))];
        let table = labels(&[("a", "water"), ("b", "forest"), ("c", "urban")]);

        let first = build_training_set(&vectors, &table, LabelOrder::FirstSeen).unwrap();
        let again = build_training_set(&vectors, &table, LabelOrder::FirstSeen).unwrap();
        assert_eq!(first, again);
        assert_eq!(first.alphabet().labels(), ["water", "forest", "urban"]);
    }

    #[test]
    fn test_new_validates_samples() {
        let alphabet = LabelAlphabet::from_labels(["a"], LabelOrder::Lexicographic);
        let bands = vec!["red".to_string()];
        assert!(TrainingSet::new(bands.clone(), alphabet.clone(), vec![]).is_err());
        assert!(TrainingSet::new(
            bands.clone(),
            alphabet.clone(),
            vec![LabeledSample::new("s", vec![1.0, 2.0], 0)]
        )
        .is_err());
        assert!(TrainingSet::new(
            bands.clone(),
            alphabet.clone(),
            vec![LabeledSample::new("s", vec![1.0], 3)]
        )
        .is_err());
        assert!(TrainingSet::new(bands, alphabet, vec![LabeledSample::new("s", vec![1.0], 0)]).is_ok());
    }

    #[test]
    fn test_new_rejects_alphabet_beyond_class_codes() {
        let labels: Vec<String> = (0..=LabelAlphabet::MAX_CLASSES).map(|i| format!("c{i}")).collect();
        let alphabet = LabelAlphabet::from_labels(&labels, LabelOrder::FirstSeen);
        let top = alphabet.len() - 1;
        let samples = vec![LabeledSample::new("a", vec![1.0], top)];
        assert!(matches!(
            TrainingSet::new(vec!["red".into()], alphabet, samples),
            Err(Error::InvalidParameter { name: "labels", .. })
        ));
    }
}
