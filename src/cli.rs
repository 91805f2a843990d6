use crate::{
    config::Config,
    fetch::ReqwestClient,
    layout::OutputLayout,
    pipeline::Ripper,
    report::ImageOutcome,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "slide-ripper")]
#[command(about = "Tiled microscopy image ripper (deep-zoom tiles + annotated preview)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./slide-ripper.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch an image's dimensions and print its tile plan.
    Probe { image: String },
    /// Download images as tiles (plus preview unless disabled).
    Rip {
        #[arg(required = true)]
        images: Vec<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        no_preview: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Probe { image } => {
            let _guard = init_logging(&args, &cfg, None)?;
            probe(&cfg, image)
        }
        Command::Rip {
            images,
            out_dir,
            base_url,
            concurrency,
            no_preview,
        } => {
            if let Some(dir) = out_dir {
                cfg.paths.out_dir = dir.display().to_string();
            }
            if let Some(url) = base_url {
                cfg.source.base_url = url.clone();
            }
            if let Some(n) = concurrency {
                cfg.limits.concurrency = *n;
            }
            if *no_preview {
                cfg.preview.enabled = false;
            }
            cfg.validate()?;
            rip(&args, &cfg, images)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("slide-ripper.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn probe(cfg: &Config, image: &str) -> Result<()> {
    let client = ReqwestClient::new(&cfg.http)?;
    let ripper = Ripper::new(cfg, client)?;
    let (job, grid) = ripper
        .plan(image)
        .with_context(|| format!("probing {image}"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "job": job,
            "grid": grid,
            "metadata_url": crate::fetch::metadata_url(&job.base_url, &job.image),
        }))?
    );
    Ok(())
}

fn rip(args: &Args, cfg: &Config, images: &[String]) -> Result<()> {
    let out_root = PathBuf::from(&cfg.paths.out_dir);
    ensure_dir(&out_root)?;

    let log_path = resolve_log_path(cfg);
    let _guard = init_logging(args, cfg, log_path.as_deref())?;
    info!("out={} images={}", out_root.display(), images.len());

    // Refuse up front rather than merging into an earlier run.
    let preview = cfg.preview.enabled.then_some(cfg.preview.filename.as_str());
    for image in images {
        let layout = OutputLayout::new(&out_root, image, preview);
        if layout.exists() {
            return Err(anyhow!(
                "output dir for {image} already exists: {}",
                layout.root().display()
            ));
        }
    }

    let client = ReqwestClient::new(&cfg.http)?;
    let ripper = Ripper::new(cfg, client)?;

    let outcomes: Vec<ImageOutcome> = ripper
        .rip_all(images)
        .into_iter()
        .map(|(image, res)| match res {
            Ok(out) => ImageOutcome {
                image,
                status: "ok",
                out_dir: Some(out.layout.root().display().to_string()),
                error: None,
            },
            Err(err) => ImageOutcome {
                image,
                status: "failed",
                out_dir: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if failed > 0 {
        return Err(anyhow!("{failed} of {} images failed", outcomes.len()));
    }
    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("slide-ripper.log"))
}
