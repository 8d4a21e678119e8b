use clap::{Parser, ValueEnum};
use seg_dataset::{DatasetConfig, DatasetLayout, PairingCheck, SegmentationDataset, ValidationOutcome};
use seg_training::build_report;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LayoutKind {
    Voc12,
    Cityscapes,
    Validation,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PairingKind {
    Unchecked,
    Length,
    Basename,
}

impl From<PairingKind> for PairingCheck {
    fn from(kind: PairingKind) -> Self {
        match kind {
            PairingKind::Unchecked => PairingCheck::Unchecked,
            PairingKind::Length => PairingCheck::Length,
            PairingKind::Basename => PairingCheck::Basename,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dataset_report",
    about = "Index a segmentation dataset and report image/label pairing as JSON"
)]
struct Args {
    /// TOML dataset config; overrides --root/--layout/--subset.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dataset root.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Directory layout under the root.
    #[arg(long, value_enum, default_value_t = LayoutKind::Cityscapes)]
    layout: LayoutKind,
    /// Split directory (cityscapes only).
    #[arg(long, default_value = "val")]
    subset: String,
    /// Pairing check applied at construction; a failing check aborts with an
    /// error. Without it mismatches are only listed in the report.
    #[arg(long, value_enum)]
    pairing: Option<PairingKind>,
    /// Decode every image/label pair and report failures.
    #[arg(long, default_value_t = false)]
    decode: bool,
    /// Pretty-print the JSON report.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut cfg = match (&args.config, &args.root) {
        (Some(path), _) => DatasetConfig::from_path(path)?,
        (None, Some(root)) => {
            let layout = match args.layout {
                LayoutKind::Voc12 => DatasetLayout::Voc12,
                LayoutKind::Cityscapes => DatasetLayout::cityscapes(args.subset.clone()),
                LayoutKind::Validation => DatasetLayout::Validation,
            };
            DatasetConfig::new(root, layout)
        }
        (None, None) => DatasetConfig::load()?,
    };
    cfg.pairing = args
        .pairing
        .map(PairingCheck::from)
        .unwrap_or(PairingCheck::Unchecked);

    let dataset = SegmentationDataset::from_config(&cfg)?;
    let report = build_report(&dataset, args.decode);
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    tracing::info!(
        outcome = report.outcome().as_str(),
        samples = report.samples,
        "dataset report"
    );

    if report.outcome() == ValidationOutcome::Fail {
        std::process::exit(1);
    }
    Ok(())
}
