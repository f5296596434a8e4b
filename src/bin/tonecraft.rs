use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tonecraft", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an image with an adjustment record.
    Render(RenderArgs),
    /// Print the sidecar profile that would be sent to the external renderer.
    Sidecar(SidecarArgs),
    /// Evict old render cache entries.
    CacheClean(CacheCleanArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Source image.
    #[arg(long)]
    image: PathBuf,

    /// Adjustment record JSON.
    #[arg(long)]
    params: PathBuf,

    /// Directory for the cache and scratch output.
    #[arg(long, default_value = "tonecraft-out")]
    out_dir: PathBuf,

    /// Resize output to this width (aspect preserved).
    #[arg(long)]
    width: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = 92)]
    quality: u8,

    /// Output format: jpeg or png.
    #[arg(long, default_value = "jpeg")]
    format: tonecraft::OutputFormat,

    /// Skip the cache lookup (the output is still stored).
    #[arg(long)]
    no_cache: bool,

    /// Name of the running render container.
    #[arg(long, default_value = "tonecraft-render")]
    container: String,
}

#[derive(Parser, Debug)]
struct SidecarArgs {
    /// Adjustment record JSON.
    #[arg(long)]
    params: PathBuf,

    /// Write the profile here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CacheCleanArgs {
    /// Cache directory to sweep.
    #[arg(long)]
    cache_dir: PathBuf,

    /// Entries older than this many hours are removed.
    #[arg(long, default_value_t = 24)]
    max_age_hours: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Sidecar(args) => cmd_sidecar(args),
        Command::CacheClean(args) => cmd_cache_clean(args),
    }
}

fn read_params_json(path: &Path) -> anyhow::Result<tonecraft::AdjustmentParams> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("open adjustment record '{}'", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| "parse adjustment record JSON")?;
    Ok(tonecraft::AdjustmentParams::from_json(&value))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let params = read_params_json(&args.params)?;

    let cache = tonecraft::CacheManager::new(args.out_dir.join("cache"))?;
    let external = tonecraft::ContainerRenderer::new(args.container);
    let orchestrator = tonecraft::RenderOrchestrator::new(
        cache,
        tonecraft::ColorEngine,
        Box::new(external),
        args.out_dir.join("work"),
    )?;

    let result = orchestrator.render(&tonecraft::RenderRequest {
        image: tonecraft::ImageSource::Path(args.image),
        params,
        use_cache: !args.no_cache,
        output: tonecraft::OutputOpts {
            width: args.width,
            quality: args.quality,
            format: args.format,
        },
    });

    if !result.success {
        anyhow::bail!("render failed: {}", result.message);
    }
    let path = result
        .output_path
        .context("successful render must carry an output path")?;
    eprintln!("{} — wrote {}", result.message, path.display());
    Ok(())
}

fn cmd_sidecar(args: SidecarArgs) -> anyhow::Result<()> {
    let params = read_params_json(&args.params)?;
    let ini = tonecraft::SidecarProfile::from_params(&params).to_ini();

    match args.out {
        Some(out) => {
            std::fs::write(&out, ini)
                .with_context(|| format!("write sidecar '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => print!("{ini}"),
    }
    Ok(())
}

fn cmd_cache_clean(args: CacheCleanArgs) -> anyhow::Result<()> {
    let cache = tonecraft::CacheManager::new(&args.cache_dir)?;
    let removed = cache.evict(Duration::from_secs(args.max_age_hours * 3600))?;
    eprintln!("removed {removed} cache entries");
    Ok(())
}
