//! JNCEP web UI.
//!
//! Takes a J-Novel Club URL and an optional part range, has `jncep` build the
//! EPUB(s) and sends back one file or a zip of several.
//!
//! Code layout:
//! - `base_system`: config, logging, credentials, part ranges, working dirs
//! - `third_party`: the EPUB generator boundary and its `jncep` adapter
//! - `download`: the per-request pipeline and packaging
//! - `ui`: the HTTP front-end

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod base_system;
mod download;
mod third_party;
mod ui;

use base_system::config::{generate_yaml_with_comments, load};
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use third_party::JncepCli;
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "jncep-webui")]
#[command(about = "Web front-end that turns J-Novel Club URLs into EPUB downloads")]
struct Cli {
    /// Print debug logs on the console
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Optional YAML config file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the default config as commented YAML and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,

    /// Print the version and exit
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("jncep-webui v{VERSION}");
        return Ok(());
    }

    if cli.print_config {
        let yaml = generate_yaml_with_comments(&Config::default())
            .map_err(|e| anyhow!(e.to_string()))?;
        println!("{yaml}");
        return Ok(());
    }

    let config: Config = load(cli.config.as_deref()).map_err(|e| anyhow!(e.to_string()))?;
    let log = init_logging(cli.debug, &config)?;

    info!(target: "startup", "jncep-webui v{VERSION}");
    info!(
        target: "startup",
        output = %config.output_dir.display(),
        logs = %log.logs_dir().display(),
        jncep = %config.jncep_bin,
        timeout_secs = config.generation_timeout,
        "configuration loaded"
    );

    let generator = Arc::new(JncepCli::new(
        &config.jncep_bin,
        config.generation_timeout(),
    ));
    ui::web::run(&config, generator)
}

fn init_logging(debug: bool, config: &Config) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        ..LogOptions::default()
    };
    LogSystem::init(opts, &config.logs_dir).map_err(|e| anyhow!(e))
}
