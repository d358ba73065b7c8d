//! Imagery preprocessing
//!
//! - Reflectance: sensor digital numbers → percent surface reflectance

mod reflectance;

pub use reflectance::{normalize_band, normalize_reflectance, ReflectanceNormalizer, ReflectanceParams};
