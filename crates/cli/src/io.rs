//! File formats used by the command line: single-band TIFF rasters, CSV
//! sample and label tables, and JSON tree models.

use anyhow::{bail, Context, Result};
use landcart_algorithms::classification::DecisionTree;
use landcart_core::raster::Raster;
use landcart_core::sample::{FeatureVector, Legend};
use landcart_core::BandStack;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray16;
use tiff::encoder::TiffEncoder;

/// Parse a `NAME=PATH` band argument
pub fn parse_band_arg(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{s}'")),
    }
}

/// Read the first band of a TIFF as `f64`
pub fn read_band(path: &Path, nodata: Option<f64>) -> Result<Raster<f64>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    let mut decoder = Decoder::new(BufReader::new(file)).context("TIFF decode error")?;
    let (width, height) = decoder.dimensions().context("Cannot read dimensions")?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<f64> = match decoder.read_image().context("Cannot read image data")? {
        DecodingResult::F32(buf) => widen(buf),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => widen(buf),
        DecodingResult::U16(buf) => widen(buf),
        DecodingResult::U32(buf) => widen(buf),
        DecodingResult::I8(buf) => widen(buf),
        DecodingResult::I16(buf) => widen(buf),
        DecodingResult::I32(buf) => widen(buf),
        _ => bail!("Unsupported TIFF pixel format in {}", path.display()),
    };

    // Interleaved multi-sample images: keep the first sample of each pixel
    let samples = data.len() / (rows * cols).max(1);
    let data = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    Ok(Raster::from_vec(data, rows, cols)
        .with_context(|| format!("Unexpected pixel count in {}", path.display()))?
        .with_nodata(nodata))
}

fn widen<T: num_traits::ToPrimitive>(buf: Vec<T>) -> Vec<f64> {
    buf.iter().map(|v| v.to_f64().unwrap_or(f64::NAN)).collect()
}

/// Read named bands into one stack
pub fn read_stack(bands: &[(String, PathBuf)], nodata: Option<f64>) -> Result<BandStack> {
    let rasters = bands
        .iter()
        .map(|(name, path)| -> Result<(String, Raster<f64>)> { Ok((name.clone(), read_band(path, nodata)?)) })
        .collect::<Result<Vec<_>>>()?;
    BandStack::from_rasters(rasters).context("Bands do not form a stack")
}

/// Write a class-code raster as a 16-bit grayscale TIFF
pub fn write_classes(raster: &Raster<u16>, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file)).context("TIFF encoder error")?;
    let (rows, cols) = raster.shape();
    let data: Vec<u16> = raster.data().iter().copied().collect();
    encoder
        .write_image::<Gray16>(cols as u32, rows as u32, &data)
        .context("Cannot write image data")?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    key: String,
    row: usize,
    col: usize,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    key: String,
    label: String,
}

/// Extract a feature vector per `key,row,col` record of a samples CSV
pub fn read_samples(path: &Path, stack: &BandStack) -> Result<Vec<(String, FeatureVector)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open {}", path.display()))?;

    let mut vectors = Vec::new();
    for record in reader.deserialize() {
        let SampleRow { key, row, col } = record.context("Invalid sample record")?;
        let fv = stack
            .pixel(row, col)
            .with_context(|| format!("Sample '{key}' at ({row}, {col}) is outside the image"))?;
        vectors.push((key, fv));
    }
    Ok(vectors)
}

/// Read a `key,label` CSV into a lookup table
pub fn read_labels(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Fields)
        .from_path(path)
        .with_context(|| format!("Cannot open {}", path.display()))?;

    let mut labels = HashMap::new();
    for record in reader.deserialize() {
        let LabelRow { key, label } = record.context("Invalid label record")?;
        if labels.insert(key.clone(), label).is_some() {
            bail!("Duplicate label for sample '{key}'");
        }
    }
    Ok(labels)
}

/// Write `code,label` rows
pub fn write_legend(legend: &Legend, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Cannot create {}", path.display()))?;
    for entry in legend.entries() {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_model(tree: &DecisionTree, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), tree).context("Cannot serialize model")?;
    Ok(())
}

/// Read a JSON model; the node list is checked while deserializing
pub fn load_model(path: &Path) -> Result<DecisionTree> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Invalid model {}", path.display()))
}
