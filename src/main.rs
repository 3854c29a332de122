use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::{Path, PathBuf};

use feedback_report::config::AppConfig;
use feedback_report::context::RunContext;
use feedback_report::services::ReportPipeline;
use feedback_report::settings::{mask_key, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn scraped comments into a user feedback report", long_about = None)]
struct Args {
    /// Root of the crawler data tree (env: DATA_ROOT)
    #[arg(long = "data-root", env = "DATA_ROOT", global = true)]
    data_root: Option<PathBuf>,

    /// Settings file, JSON or TOML (env: SETTINGS_PATH)
    #[arg(long = "settings", env = "SETTINGS_PATH", global = true)]
    settings_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report on the latest batch of a platform
    Run {
        #[arg(long)]
        platform: String,

        #[arg(long = "crawler-type", default_value = "search")]
        crawler_type: String,

        /// Search keyword; selects the keyword subdirectory when present
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Report on explicit comments/contents files
    RunPaths {
        #[arg(long)]
        comments: PathBuf,

        #[arg(long)]
        contents: PathBuf,

        /// Output directory (defaults to `reports` next to the comments directory)
        #[arg(long = "out-dir")]
        out_dir: Option<PathBuf>,
    },
    /// Print the model settings with the key masked
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(root) = args.data_root {
        if args.settings_path.is_none() {
            config.settings_path = root.join("system").join("settings.json");
        }
        config.data_root = root;
    }
    if let Some(path) = args.settings_path {
        config.settings_path = path;
    }
    let settings = Settings::load(&config.settings_path)
        .with_context(|| format!("failed to load settings from {}", config.settings_path.display()))?;

    match args.command {
        Command::Run {
            platform,
            crawler_type,
            keyword,
        } => {
            let ctx = RunContext::new(keyword);
            let pipeline = ReportPipeline::new(&config, &settings);
            let report = pipeline
                .generate_report(&ctx, &platform, &crawler_type)
                .await
                .context("report generation failed")?;
            let path = match report {
                Some(report) => {
                    info!("report written ({:?})", report.mode);
                    relative_to_root(&report.path, &config.data_root)
                }
                None => {
                    info!("no data for {platform}/{crawler_type}, nothing generated");
                    String::new()
                }
            };
            println!("{}", json!({"ok": true, "path": path}));
        }
        Command::RunPaths {
            comments,
            contents,
            out_dir,
        } => {
            let ctx = RunContext::new(None);
            let pipeline = ReportPipeline::new(&config, &settings);
            let report = pipeline
                .generate_report_from_paths(&ctx, &comments, &contents, out_dir.as_deref())
                .await
                .context("report generation failed")?;
            info!("report written ({:?})", report.mode);
            println!(
                "{}",
                json!({"ok": true, "path": relative_to_root(&report.path, &config.data_root)})
            );
        }
        Command::Settings => {
            let lm = &settings.lm;
            let summary = json!({
                "api_key": mask_key(&lm.api_key),
                "api_key_usable": settings.usable_api_key().is_some(),
                "api_base": lm.base_url(),
                "model": lm.model_name(),
                "temperature": lm.temperature,
                "max_tokens": lm.max_tokens,
                "custom_prompt": settings.custom_prompt().is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn relative_to_root(path: &Path, data_root: &Path) -> String {
    path.strip_prefix(data_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
