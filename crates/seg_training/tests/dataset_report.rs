use image::{GrayImage, Luma, RgbImage};
use seg_dataset::{DatasetLayout, PairingCheck, SegmentationDataset, ValidationOutcome};
use seg_training::build_report;
use std::fs;
use std::path::Path;
use std::process::Command;

fn write_pair(root: &Path, name: &str) -> anyhow::Result<()> {
    fs::create_dir_all(root.join("images"))?;
    fs::create_dir_all(root.join("label_marks"))?;
    RgbImage::new(2, 2).save(root.join(format!("images/{name}.png")))?;
    GrayImage::from_pixel(2, 2, Luma([1])).save(root.join(format!("label_marks/{name}_labelTrainIds.png")))?;
    Ok(())
}

#[test]
fn clean_dataset_reports_pass() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_pair(tmp.path(), "a")?;
    write_pair(tmp.path(), "b")?;
    let ds = SegmentationDataset::new(tmp.path(), DatasetLayout::Validation)?;
    let report = build_report(&ds, true);
    assert_eq!(report.samples, 2);
    assert_eq!(report.decoded, 2);
    assert_eq!(report.outcome(), ValidationOutcome::Pass);
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["layout"], "validation");
    assert_eq!(json["pairing"]["outcome"], "pass");
    Ok(())
}

#[test]
fn corrupt_label_fails_report() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_pair(tmp.path(), "a")?;
    write_pair(tmp.path(), "b")?;
    fs::write(tmp.path().join("label_marks/b_labelTrainIds.png"), b"garbage")?;
    let ds = SegmentationDataset::builder(tmp.path())
        .layout(DatasetLayout::Validation)
        .pairing(PairingCheck::Unchecked)
        .build()?;

    let shallow = build_report(&ds, false);
    assert_eq!(shallow.outcome(), ValidationOutcome::Pass);

    let deep = build_report(&ds, true);
    assert_eq!(deep.decoded, 1);
    assert_eq!(deep.decode_failures.len(), 1);
    assert_eq!(deep.decode_failures[0].index, 1);
    assert_eq!(deep.outcome(), ValidationOutcome::Fail);
    Ok(())
}

fn run_report(root: &Path, extra: &[&str]) -> anyhow::Result<std::process::Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_dataset_report"))
        .arg("--root")
        .arg(root)
        .args(["--layout", "validation"])
        .args(extra)
        .output()?;
    Ok(output)
}

#[test]
fn cli_pairing_flag_controls_construction_check() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    write_pair(tmp.path(), "a")?;
    write_pair(tmp.path(), "b")?;
    RgbImage::new(2, 2).save(tmp.path().join("images/c.png"))?;

    // Without the flag the mismatch is reported, not raised.
    let listed = run_report(tmp.path(), &[])?;
    assert_eq!(listed.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&listed.stdout)?;
    assert_eq!(json["pairing"]["outcome"], "fail");
    assert_eq!(json["pairing"]["images"], 3);

    let strict = run_report(tmp.path(), &["--pairing", "length"])?;
    assert!(!strict.status.success());
    assert!(strict.stdout.is_empty());
    assert!(String::from_utf8_lossy(&strict.stderr).contains("pairing mismatch"));

    fs::remove_file(tmp.path().join("images/c.png"))?;
    let clean = run_report(tmp.path(), &["--pairing", "basename"])?;
    assert!(clean.status.success());
    Ok(())
}
