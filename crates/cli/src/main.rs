//! LandCART CLI - land-cover classification with decision trees

mod io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use landcart_algorithms::classification::{
    build_training_set, evaluate, predict_with, train_with_mode, DecisionTree, Impurity,
    PredictParams, TreeParams,
};
use landcart_algorithms::imagery::{normalize_reflectance, ReflectanceParams};
use landcart_core::sample::LabelOrder;
use landcart_core::BandStack;
use landcart_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "landcart")]
#[command(author, version, about = "Land-cover classification with decision trees", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Band inputs shared by `train` and `predict`
#[derive(clap::Args)]
struct BandArgs {
    /// Input band as NAME=PATH (repeat for each band)
    #[arg(short, long = "band", value_name = "NAME=PATH", required = true, value_parser = io::parse_band_arg)]
    bands: Vec<(String, PathBuf)>,
    /// Raw value marking missing pixels in the input bands
    #[arg(long)]
    nodata: Option<f64>,
    /// Bands already hold reflectance; skip normalization
    #[arg(long)]
    raw: bool,
    /// Lowest valid raw value
    #[arg(long, default_value = "7273")]
    valid_min: f64,
    /// Highest valid raw value
    #[arg(long, default_value = "43636")]
    valid_max: f64,
    /// Reflectance scale factor
    #[arg(long, default_value = "0.0000275")]
    scale: f64,
    /// Reflectance offset
    #[arg(long, default_value = "-0.2", allow_negative_numbers = true)]
    offset: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a decision tree from labeled sample pixels
    Train {
        #[command(flatten)]
        bands: BandArgs,
        /// Sample locations CSV with columns key,row,col
        #[arg(short, long)]
        samples: PathBuf,
        /// Sample labels CSV with columns key,label
        #[arg(short, long)]
        labels: PathBuf,
        /// Maximum tree depth (unbounded if omitted)
        #[arg(long)]
        max_depth: Option<usize>,
        /// Minimum samples required to split a node
        #[arg(long, default_value = "2")]
        min_samples_split: usize,
        /// Minimum samples in each child of a split
        #[arg(long, default_value = "1")]
        min_samples_leaf: usize,
        /// Impurity measure: gini, entropy
        #[arg(long, default_value = "gini")]
        impurity: Impurity,
        /// Class code order: lexicographic, first-seen
        #[arg(long, default_value = "lexicographic")]
        label_order: LabelOrder,
        /// Worker threads (all cores if omitted, 1 = sequential)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Output model file (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Classify every pixel of a band stack
    Predict {
        /// Model file produced by `train`
        #[arg(short, long)]
        model: PathBuf,
        #[command(flatten)]
        bands: BandArgs,
        /// Rows per prediction tile
        #[arg(long, default_value = "256")]
        tile_rows: usize,
        /// Worker threads (all cores if omitted, 1 = sequential)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Output class raster (16-bit TIFF, 0 = unclassified)
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the code,label legend as CSV
        #[arg(long)]
        legend: Option<PathBuf>,
    },
    /// Print a trained model
    Show {
        /// Model file
        model: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging already initialized");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Read the bands and normalize them unless `--raw`
fn load_bands(args: &BandArgs) -> Result<BandStack> {
    let pb = spinner("Reading bands...");
    let stack = io::read_stack(&args.bands, args.nodata)?;
    pb.finish_and_clear();
    let (n, rows, cols) = stack.shape();
    info!("Input: {} bands, {} x {}", n, cols, rows);

    let stack = if args.raw {
        stack
    } else {
        let params = ReflectanceParams {
            valid_min: args.valid_min,
            valid_max: args.valid_max,
            scale: args.scale,
            offset: args.offset,
        };
        debug!("normalizing with {:?}", params);
        normalize_reflectance(&stack, &params).context("Failed to normalize reflectance")?
    };

    for name in stack.names() {
        let stats = stack.to_raster(name)?.statistics();
        debug!(
            "{}: min {:?}, max {:?}, mean {:?}, {} missing",
            name, stats.min, stats.max, stats.mean, stats.nodata_count
        );
    }
    Ok(stack)
}

fn print_summary(tree: &DecisionTree) {
    println!(
        "Tree: depth {}, {} leaves, {} nodes ({} impurity)",
        tree.depth(),
        tree.n_leaves(),
        tree.n_nodes(),
        tree.params().impurity
    );
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Train {
            bands,
            samples,
            labels,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            impurity,
            label_order,
            threads,
            output,
        } => {
            let stack = load_bands(&bands)?;
            let vectors = io::read_samples(&samples, &stack)?;
            let table = io::read_labels(&labels)?;
            info!("Samples: {}, labels: {}", vectors.len(), table.len());

            let start = Instant::now();
            let training = build_training_set(&vectors, &table, label_order)
                .context("Failed to build training set")?;
            let params = TreeParams {
                max_depth,
                min_samples_split,
                min_samples_leaf,
                impurity,
            };
            let pb = spinner("Training...");
            let tree = train_with_mode(&training, &params, ProcessingMode::from_threads(threads))
                .context("Failed to train tree")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let matrix = evaluate(&tree, &training)?;
            print_summary(&tree);
            println!("Training samples: {} ({} dropped)", training.len(), training.dropped());
            println!("\nConfusion matrix (rows = actual):");
            print!("{}", matrix.display(tree.alphabet()));
            if let Some(acc) = matrix.overall_accuracy() {
                println!("Overall accuracy: {:.2}%", acc * 100.0);
            }
            if let Some(kappa) = matrix.kappa() {
                println!("Kappa: {:.4}", kappa);
            }

            io::save_model(&tree, &output)?;
            done("Model", &output, elapsed);
        }

        Commands::Predict {
            model,
            bands,
            tile_rows,
            threads,
            output,
            legend,
        } => {
            let tree = io::load_model(&model)?;
            let stack = load_bands(&bands)?;

            let start = Instant::now();
            let pb = spinner("Classifying...");
            let params = PredictParams {
                tile_rows,
                mode: ProcessingMode::from_threads(threads),
            };
            let result = predict_with(&stack, &tree, &params).context("Failed to classify")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            for (code, count) in result.class_counts() {
                let label = result.legend.label(code).unwrap_or("?");
                println!("{:>5}  {:<20} {}", code, label, count);
            }
            println!("{:>5}  {:<20} {}", 0, "(unclassified)", result.nodata_count());

            io::write_classes(&result.raster, &output)?;
            if let Some(path) = legend {
                io::write_legend(&result.legend, &path)?;
                println!("Legend saved to: {}", path.display());
            }
            done("Classification", &output, elapsed);
        }

        Commands::Show { model } => {
            let tree = io::load_model(&model)?;
            print_summary(&tree);
            println!("Bands: {}", tree.bands().join(", "));
            println!("\nLegend:");
            print!("{}", tree.legend());
            println!("\nBand importance:");
            for (band, importance) in tree.band_importances() {
                println!("  {:<12} {:.4}", band, importance);
            }
            println!("\n{}", tree);
        }
    }

    Ok(())
}
