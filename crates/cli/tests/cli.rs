//! Runs the `landcart` binary through train, predict and show.

use std::fs::File;
use std::path::Path;
use std::process::Command;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;

fn landcart() -> Command {
    Command::new(env!("CARGO_BIN_EXE_landcart"))
}

fn write_band(path: &Path, cols: usize, data: &[f32]) {
    let rows = data.len() / cols;
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<Gray32Float>(cols as u32, rows as u32, data)
        .unwrap();
}

#[test]
fn train_predict_show() {
    let dir = tempfile::tempdir().unwrap();
    let red = dir.path().join("red.tif");
    let green = dir.path().join("green.tif");
    // 2 x 3 scene, NaN in green at (1, 2)
    write_band(&red, 3, &[10.0, 12.0, 80.0, 11.0, 75.0, 90.0]);
    write_band(&green, 3, &[20.0, 22.0, 15.0, 19.0, 18.0, f32::NAN]);

    let samples = dir.path().join("samples.csv");
    let labels = dir.path().join("labels.csv");
    std::fs::write(&samples, "key,row,col\ns1,0,0\ns2,0,2\ns3,0,1\ns4,1,1\n").unwrap();
    std::fs::write(&labels, "key,label\ns1,water\ns2,urban\ns3,water\ns4,urban\n").unwrap();

    let model = dir.path().join("model.json");
    let out = landcart()
        .arg("train")
        .arg("--band")
        .arg(format!("red={}", red.display()))
        .arg("--band")
        .arg(format!("green={}", green.display()))
        .args(["--raw", "--max-depth", "1"])
        .arg("--samples")
        .arg(&samples)
        .arg("--labels")
        .arg(&labels)
        .arg("--output")
        .arg(&model)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Overall accuracy: 100.00%"));
    assert!(model.exists());

    let classes = dir.path().join("classes.tif");
    let legend = dir.path().join("legend.csv");
    let out = landcart()
        .arg("predict")
        .arg("--model")
        .arg(&model)
        .arg("--band")
        .arg(format!("green={}", green.display()))
        .arg("--band")
        .arg(format!("red={}", red.display()))
        .args(["--raw", "--threads", "2"])
        .arg("--output")
        .arg(&classes)
        .arg("--legend")
        .arg(&legend)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let mut decoder = Decoder::new(File::open(&classes).unwrap()).unwrap();
    match decoder.read_image().unwrap() {
        // urban = 1, water = 2, unclassified = 0
        DecodingResult::U16(buf) => assert_eq!(buf, vec![2, 2, 1, 2, 1, 0]),
        _ => panic!("expected 16-bit classes"),
    }
    assert_eq!(std::fs::read_to_string(&legend).unwrap(), "code,label\n1,urban\n2,water\n");

    let out = landcart().arg("show").arg(&model).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("red <= 43.5"));
    assert!(text.contains("Bands: red, green"));
}

#[test]
fn predict_missing_band_fails() {
    let dir = tempfile::tempdir().unwrap();
    let red = dir.path().join("red.tif");
    write_band(&red, 2, &[10.0, 80.0]);

    let samples = dir.path().join("samples.csv");
    let labels = dir.path().join("labels.csv");
    std::fs::write(&samples, "key,row,col\na,0,0\nb,0,1\n").unwrap();
    std::fs::write(&labels, "key,label\na,water\nb,urban\n").unwrap();

    let model = dir.path().join("model.json");
    let status = landcart()
        .arg("train")
        .arg("--band")
        .arg(format!("red={}", red.display()))
        .arg("--raw")
        .arg("--samples")
        .arg(&samples)
        .arg("--labels")
        .arg(&labels)
        .arg("--output")
        .arg(&model)
        .status()
        .unwrap();
    assert!(status.success());

    let out = landcart()
        .arg("predict")
        .arg("--model")
        .arg(&model)
        .arg("--band")
        .arg(format!("nir={}", red.display()))
        .arg("--raw")
        .arg("--output")
        .arg(dir.path().join("classes.tif"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("red"));
}
