//! casa-switch CLI: move Logitech Casa devices to another paired host.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use casa_switch_core::config::{Config, DEFAULT_CONFIG_FILE};
use casa_switch_core::device::{DeviceIdentifier, KNOWN_DEVICES};
use casa_switch_core::host::HostSlot;
use casa_switch_core::scan::{scan_device, FeatureProbe, ScanOutcome, ScanReport};
use casa_switch_core::switch::{HostState, SwitchOptions, SwitchResult, Switcher};
use casa_switch_core::transport::HidApiBackend;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "casa-switch",
    version,
    about = "Switch Logitech Casa keyboard and touchpad between paired hosts"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Switch devices back to back, without pacing delays.
    #[arg(long, global = true)]
    no_pacing: bool,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch all Casa devices to a host.
    Switch {
        /// Host number (1-3).
        host: HostSlot,
    },
    /// Switch all Casa devices away from this host.
    Away,
    /// Report which host switching features each Casa device exposes.
    Scan,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_exit_code(&err));
        }
    };

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Help and version requests succeed; every other parse error is invalid input.
fn parse_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(&cli.config);
    debug!(path = %cli.config.display(), ?config, "Configuration loaded");
    let backend = HidApiBackend::new().context("cannot initialise HID access")?;

    match cli.command {
        Commands::Switch { host } => {
            let switcher = Switcher::new(backend).with_options(options(&cli, &config));
            println!("Switching to host {host}...");
            let results = switcher.switch_all(&KNOWN_DEVICES, host);
            print_results(&results);
        }
        Commands::Away => {
            let switcher = Switcher::new(backend).with_options(options(&cli, &config));
            let mut state = HostState::new(config.this_host_id);
            println!(
                "This is host {}, switching to host {}...",
                state.this_host(),
                state.away_target()
            );
            let results = switcher.switch_away(&mut state, &KNOWN_DEVICES);
            print_results(&results);
        }
        Commands::Scan => {
            println!("Scanning Logitech Casa devices...");
            for device in KNOWN_DEVICES {
                let report = scan_device(&backend, device)
                    .with_context(|| format!("scan of {device} failed"))?;
                print_scan(&report);
            }
            println!("\nScan complete.");
        }
    }

    Ok(())
}

fn options(cli: &Cli, config: &Config) -> SwitchOptions {
    if cli.no_pacing {
        SwitchOptions::minimal()
    } else {
        config.switch_options()
    }
}

fn print_results(results: &[(DeviceIdentifier, SwitchResult)]) {
    for (device, result) in results {
        match result {
            SwitchResult::Success => println!("  {}: switched", device.label()),
            SwitchResult::Failed(failure) => println!("  {}: {failure}", device.label()),
        }
    }
    let switched = results.iter().filter(|(_, r)| r.is_success()).count();
    println!("{switched} of {} device(s) switched.", results.len());
}

fn print_scan(report: &ScanReport) {
    println!("\n--- {} ---", report.device.label());
    match &report.outcome {
        ScanOutcome::NotFound { other_products } => {
            println!("  Device not found (check USB/Bluetooth connection)");
            if !other_products.is_empty() {
                println!("  Found other Logitech devices:");
                for product in other_products {
                    println!(
                        "    - PID: {:04X} | {}",
                        product.product_id,
                        product.product_string.as_deref().unwrap_or("(unnamed)")
                    );
                }
            }
        }
        ScanOutcome::Locked { message } => {
            println!("  [LOCKED] Cannot open device: {message}");
            println!("  -> Logi Options+ is likely running and holding an exclusive lock.");
            println!("  -> Close Logi Options+ and try again.");
        }
        ScanOutcome::NoHidppInterface { candidates } => {
            println!("  No HID++ interface answered ({candidates} interface(s) tried).");
        }
        ScanOutcome::Scanned { interface, features } => {
            println!(
                "  Opened {} (usage page 0x{:04X})",
                interface.path, interface.usage_page
            );
            for feature in features {
                let id = feature.feature_id;
                match feature.result {
                    FeatureProbe::Found(index) => {
                        println!("  [FOUND] Feature {id:04X} is at index {index}")
                    }
                    FeatureProbe::Unsupported => println!("  [MISS] Feature {id:04X} not supported"),
                    FeatureProbe::NoResponse => println!("  [TIMEOUT] No response for {id:04X}"),
                    FeatureProbe::Error(code) => {
                        println!("  [ERROR] Feature {id:04X}: HID++ error 0x{code:02X}")
                    }
                }
            }
            if !report.supports_host_switching() {
                println!("  [WARNING] Opened device but found no known host switching features.");
            }
        }
    }
}
