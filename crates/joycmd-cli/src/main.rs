//! joycmd CLI
//!
//! Configuration and device inspection tool for joycmd.

use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use joycmd_config::joystick::{candidate_paths, query_button_count, query_name, FALLBACK_NAME};
use joycmd_config::{ComboDef, Config, SectionMatch, DEFAULT_CONFIG_PATH};
use miette::IntoDiagnostic;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "joycmdctl")]
#[command(about = "Inspect joycmd configuration and joystick devices")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List connected joystick devices
    Devices {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the combos a device name resolves to
    Resolve {
        /// Device name as reported by the joystick driver
        name: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the default configuration file if it does not exist
    Init,
}

/// A joystick that could be opened
#[derive(Debug, Serialize)]
struct DeviceInfo {
    path: PathBuf,
    name: String,
    /// `None` when the driver refused the button-count query
    buttons: Option<usize>,
}

/// Outcome of resolving a device name against the configuration
#[derive(Debug, Serialize)]
struct Resolution<'a> {
    device: &'a str,
    matched: SectionMatch,
    section: Option<&'a str>,
    combos: &'a [ComboDef],
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Devices { json } => cmd_devices(&config_path, json),
        Commands::Resolve { name, json } => cmd_resolve(&config_path, &name, json),
        Commands::Init => cmd_init(&config_path),
    }
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = joycmd_config::parse_config(config_path)?;

    println!("Configuration is valid!");
    println!("  Sections: {}", config.devices.len());
    for section in &config.devices {
        println!("    - {} ({} combo(s))", section.name, section.combos.len());
    }
    if config.combo_count() == 0 {
        println!("  Warning: no combos configured, the daemon will not run anything");
    }
    Ok(())
}

fn cmd_devices(config_path: &Path, json: bool) -> miette::Result<()> {
    let config = joycmd_config::load_config(config_path)?;
    let devices = probe_devices(&config);

    if json {
        let out = serde_json::to_string_pretty(&devices).into_diagnostic()?;
        println!("{}", out);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No joystick devices found");
        return Ok(());
    }

    println!("Connected joystick devices:\n");
    for device in &devices {
        println!("  {}", device.name);
        println!("    Path: {}", device.path.display());
        match device.buttons {
            Some(buttons) => println!("    Buttons: {}", buttons),
            None => println!("    Buttons: unknown"),
        }
        println!("    Section: {}", describe_match(&config, &device.name));
        println!();
    }
    Ok(())
}

fn cmd_resolve(config_path: &Path, name: &str, json: bool) -> miette::Result<()> {
    let config = joycmd_config::load_config(config_path)?;
    let resolution = resolve(&config, name);

    if json {
        let out = serde_json::to_string_pretty(&resolution).into_diagnostic()?;
        println!("{}", out);
        return Ok(());
    }

    println!("Device '{}': {}", name, describe_match(&config, name));
    if resolution.combos.is_empty() {
        println!("  No combos");
    }
    for combo in resolution.combos {
        println!("  {} -> {}", format_buttons(&combo.buttons), combo.command);
    }
    Ok(())
}

fn cmd_init(config_path: &Path) -> miette::Result<()> {
    if joycmd_config::ensure_config_exists(config_path)? {
        println!("Created default configuration: {}", config_path.display());
    } else {
        println!("Configuration already exists: {}", config_path.display());
    }
    Ok(())
}

fn resolve<'a>(config: &'a Config, name: &'a str) -> Resolution<'a> {
    let (matched, section) = config.resolve(name);
    Resolution {
        device: name,
        matched,
        section: section.map(|section| section.name.as_str()),
        combos: section.map(|section| section.combos.as_slice()).unwrap_or(&[]),
    }
}

fn describe_match(config: &Config, name: &str) -> String {
    match config.resolve(name) {
        (SectionMatch::Exact, Some(section)) => format!("section '{}'", section.name),
        (SectionMatch::Default, _) => "default section".to_string(),
        _ => "no section".to_string(),
    }
}

/// `9+10`, with wildcard entries shown as `*`
fn format_buttons(buttons: &[i64]) -> String {
    buttons
        .iter()
        .map(|&button| {
            if button < 0 {
                "*".to_string()
            } else {
                button.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("+")
}

/// Open every candidate path the daemon would watch
fn probe_devices(config: &Config) -> Vec<DeviceInfo> {
    candidate_paths(&config.global.device_prefix, config.global.max_devices)
        .into_iter()
        .filter_map(|path| {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::debug!("Skipping {}: {}", path.display(), e);
                    }
                    return None;
                }
            };
            Some(DeviceInfo {
                name: query_name(&file).unwrap_or_else(|| FALLBACK_NAME.to_string()),
                buttons: query_button_count(&file),
                path,
            })
        })
        .collect()
}
