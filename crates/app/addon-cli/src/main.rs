use std::{io, path::PathBuf, sync::Arc};

use addon_core::{AddonInfo, AddonInstanceId};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod commands;
mod config;

use commands::{LoggingRegistry, ValueKind};
use config::HostConfig;

#[derive(Parser)]
#[command(name = "addon-settings")]
#[command(about = "Inspect and edit the settings of installed add-ons")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/addon-settings/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding installed add-ons
    #[arg(long, global = true, value_name = "DIR", env = "ADDON_SETTINGS_ADDONS_DIR")]
    addons_dir: Option<PathBuf>,

    /// Directory holding per-add-on user data
    #[arg(long, global = true, value_name = "DIR", env = "ADDON_SETTINGS_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// Add-on instance; 0 selects the add-on's own settings
    #[arg(long, global = true, default_value_t = 0)]
    instance: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every setting with its type and current value
    List {
        addon: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the current value of a setting
    Get { addon: String, key: String },

    /// Change a setting and save it
    #[command(after_help = "\
Examples:
  addon-settings set plugin.video.example quality 1080
  addon-settings set plugin.video.example autoplay false --type bool")]
    Set {
        addon: String,
        key: String,
        value: String,

        /// Value type; unknown keys are defined with it instead of as strings
        #[arg(long = "type", value_enum)]
        kind: Option<ValueKind>,
    },

    /// Restore every setting to its default and save
    Defaults { addon: String },

    /// Write the add-on's values as a settings document
    Export {
        addon: String,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Merge values from a settings document and save
    Import { addon: String, file: PathBuf },
}

impl Command {
    fn addon_id(&self) -> &str {
        match self {
            Command::List { addon, .. }
            | Command::Get { addon, .. }
            | Command::Set { addon, .. }
            | Command::Defaults { addon }
            | Command::Export { addon, .. }
            | Command::Import { addon, .. } => addon,
        }
    }
}

fn main() -> Result<()> {
    // RUST_LOG replaces our directives; anything not listed stays at WARN
    let directives =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "addon_=info".to_owned());
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match cli.config.clone().or_else(HostConfig::default_path) {
        Some(path) => HostConfig::load(&path)?,
        None => HostConfig::default(),
    };
    let (addons_dir, profile_dir) = config.resolve(cli.addons_dir, cli.profile_dir)?;

    let info = AddonInfo::under(cli.command.addon_id(), &addons_dir, &profile_dir);
    let mut addon = addon_core::Addon::new(info, Arc::new(LoggingRegistry));
    let id = AddonInstanceId(cli.instance);
    let mut out = io::stdout().lock();

    match cli.command {
        Command::List { json, .. } => commands::list(&mut addon, id, json, &mut out),
        Command::Get { key, .. } => commands::get(&mut addon, id, &key, &mut out),
        Command::Set {
            key,
            value,
            kind,
            ..
        } => commands::set(&mut addon, id, &key, &value, kind),
        Command::Defaults { .. } => commands::defaults(&mut addon, id),
        Command::Export { output, .. } => {
            commands::export(&mut addon, id, output.as_deref(), &mut out)
        }
        Command::Import { file, .. } => commands::import(&mut addon, id, &file),
    }
}
