use anyhow::{Context, Result};
use clap::Parser;
use gnnlaunch_connectome::{io, output_file_name, GraphDataset};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "connectome-graphs",
    about = "Threshold connectivity matrices and write a graph dataset",
    version
)]
struct Args {
    /// `[N, N, G]` matrix stacks (.mat or .safetensors), concatenated in order
    #[arg(long = "inputs", num_args = 1.., required = true)]
    inputs: Vec<PathBuf>,

    /// Label table (`[S, C]` or `[S]`, .mat or .safetensors), one row per graph
    #[arg(long)]
    labels: PathBuf,

    /// Directory receiving graphs_<label_column>_<pct>pct.safetensors
    #[arg(long = "output_dir", default_value = ".")]
    output_dir: PathBuf,

    /// Proportion of strongest edges kept per graph
    #[arg(long, default_value_t = 0.05)]
    threshold: f64,

    /// Number of classes (labels outside 0..num_labels are reported)
    #[arg(long = "num_labels", default_value_t = 2)]
    num_labels: usize,

    /// Name of the label column, used in the output file name
    #[arg(long = "label_column", default_value = "cddr15a")]
    label_column: String,

    /// Column of the label table to read
    #[arg(long = "label_index", default_value_t = 0)]
    label_index: usize,

    /// Tensor name inside the input files (default: file stem or only tensor)
    #[arg(long)]
    key: Option<String>,

    /// Tensor name inside the label file
    #[arg(long = "labels_key")]
    labels_key: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let matrices = io::load_matrices(&args.inputs, args.key.as_deref())
        .context("loading connectivity matrices")?;
    let labels = io::load_labels(&args.labels, args.labels_key.as_deref(), args.label_index)
        .with_context(|| format!("loading labels from {}", args.labels.display()))?;
    println!(
        "Matrices: {:?}, labels: {} ({} missing)",
        matrices.dim(),
        labels.len(),
        labels.iter().filter(|l| l.is_nan()).count()
    );

    let dataset = GraphDataset::build(matrices.view(), &labels, args.threshold, args.num_labels)?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let out = args
        .output_dir
        .join(output_file_name(&args.label_column, args.threshold));
    dataset.save(&out, &args.label_column, args.threshold)?;

    println!(
        "Wrote {} graphs ({} edges) → {}",
        dataset.num_graphs(),
        dataset.edge_index.ncols(),
        out.display()
    );
    Ok(())
}
