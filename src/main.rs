use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematrix::report::{self, Only, Report};
use facematrix::runner::{LogObserver, Runner};
use facematrix::{config, ArcFace};
use log::{info, warn};

#[derive(Parser)]
#[command(name = "facematrix")]
#[command(
    version,
    about = "Pairwise face distance and similarity matrices with ArcFace"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every image in a folder and print the distance and similarity matrices
    Compare {
        /// Image folder (defaults to images_dir from the config)
        dir: Option<PathBuf>,
        /// Image file extension (defaults to extension from the config)
        #[arg(short, long)]
        ext: Option<String>,
        /// Print a JSON document instead of text
        #[arg(long)]
        json: bool,
        /// Print only one of the matrices
        #[arg(long, value_enum, default_value_t = Only::Both)]
        only: Only,
    },
    /// Load the model and report its input and output shapes
    Info,
    /// Open config file in editor
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compare {
            dir,
            ext,
            json,
            only,
        } => {
            let dir = dir.unwrap_or_else(|| cfg.images_dir.clone());
            let ext = ext.unwrap_or_else(|| cfg.extension.clone());
            compare(&cfg, dir, ext, json, only).await
        }
        Commands::Info => model_info(&cfg),
        Commands::Config => open_config(&cfg, cli.config),
    }
}

async fn compare(
    cfg: &config::Config,
    dir: PathBuf,
    ext: String,
    json: bool,
    only: Only,
) -> Result<()> {
    info!("Loading model: {}", cfg.model_path.display());
    let arc = ArcFace::new(&cfg.model_options())
        .context("Failed to initialize face recognition model")?;

    let runner = Arc::new(Runner::new(Arc::new(arc), ext).with_observer(Arc::new(LogObserver)));
    runner.select_folder(&dir);

    let canceller = Arc::clone(&runner);
    tokio::spawn(async move {
        let mut interrupted = false;
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupted {
                warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            interrupted = true;
            warn!("Interrupted, cancelling run... (press Ctrl-C again to exit)");
            canceller.cancel();
        }
    });

    let output = runner.start().await?;

    if json {
        let doc = Report::new(output.labels, &output.matrices, only);
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        for (i, label) in output.labels.iter().enumerate() {
            info!("[{}] {}", i, label);
        }
        print!("{}", report::render_text(&output.matrices, only));
    }
    Ok(())
}

fn model_info(cfg: &config::Config) -> Result<()> {
    let arc = ArcFace::new(&cfg.model_options())
        .context("Failed to initialize face recognition model")?;
    let probe = arc.probe().context("Failed to run model probe")?;

    println!("{}: float32{:?}", probe.input_name, probe.input_shape);
    println!("{}: float32{:?}", probe.output_name, probe.output_shape);
    println!("embedding length: {}", probe.embedding_len);
    Ok(())
}

fn open_config(cfg: &config::Config, path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(|| config::CONFIG_PATH.clone());
    if !config_path.exists() {
        config::save_config(cfg, Some(&config_path))
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
