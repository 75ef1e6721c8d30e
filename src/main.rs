use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use wifinav::config::RunConfig;
use wifinav::io::write_estimates;
use wifinav::logging::init_logging;
use wifinav::positioning::{score_file, Method, PositioningPipeline};

#[derive(Parser, Debug)]
#[command(name = "wifinav")]
#[command(about = "WiFi fingerprint indoor positioning: dataset generation, KNN estimation and scoring", long_about = None)]
struct Args {
    /// JSON configuration file (defaults are used when omitted)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Random seed for dataset generation
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of neighbours for KNN
    #[arg(long, short, global = true)]
    k: Option<usize>,

    /// Output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate offline/online sets and write them as trace files
    Generate {
        #[arg(long, default_value = "offline_set.trace")]
        offline_out: PathBuf,
        #[arg(long, default_value = "online_set.trace")]
        online_out: PathBuf,
    },
    /// Empirical fingerprint nearest neighbour
    Nn,
    /// Empirical fingerprint k-nearest neighbours
    Knn,
    /// Path-loss model nearest neighbour
    ModelNn,
    /// Path-loss model k-nearest neighbours
    ModelKnn,
    /// Score an estimate file into a CDF table
    Score {
        estimates: PathBuf,
        #[arg(default_value = "score.txt")]
        output: PathBuf,
    },
    /// Full run: generate, estimate with every method, score
    Run,
    /// Write the default configuration to a file
    InitConfig {
        #[arg(default_value = "wifinav.json")]
        path: PathBuf,
    },
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load_from(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.generator.seed = Some(seed);
    }
    if let Some(k) = args.k {
        config.k = k;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn estimate_with(pipeline: &PositioningPipeline, method: Method) -> Result<()> {
    let dataset = pipeline.generate().context("dataset generation failed")?;
    let estimates = pipeline
        .estimate(method, &dataset)
        .with_context(|| format!("{} positioning failed", method))?;
    let path = pipeline.config().output_path(&method.output_file());
    write_estimates(&path, &estimates)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = load_config(&args)?;

    match &args.command {
        Command::InitConfig { path } => {
            config.save_to(path)?;
            info!("默认配置写入 {}", path.display());
        }
        Command::Score { estimates, output } => {
            let summary = score_file(estimates, output)
                .with_context(|| format!("failed to score {}", estimates.display()))?;
            println!("{}", summary);
        }
        Command::Generate {
            offline_out,
            online_out,
        } => {
            let pipeline = PositioningPipeline::new(config)?;
            let dataset = pipeline.generate().context("dataset generation failed")?;
            dataset.write_offline(offline_out)?;
            dataset.write_online(online_out)?;
        }
        Command::Nn => estimate_with(&PositioningPipeline::new(config)?, Method::EmpiricalNn)?,
        Command::Knn => estimate_with(&PositioningPipeline::new(config)?, Method::EmpiricalKnn)?,
        Command::ModelNn => estimate_with(&PositioningPipeline::new(config)?, Method::ModelNn)?,
        Command::ModelKnn => estimate_with(&PositioningPipeline::new(config)?, Method::ModelKnn)?,
        Command::Run => {
            let pipeline = PositioningPipeline::new(config)?;
            let methods = pipeline.default_methods();
            let summary = pipeline.run(&methods)?;
            print!("{}", summary);
        }
    }

    Ok(())
}
