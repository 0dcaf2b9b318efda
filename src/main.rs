// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-plc-honeypot project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the PLC honeypot
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::signal;

use rust_plc_honeypot::config::{self, utils::validate_specific_rules, Config};
use rust_plc_honeypot::daemon::Daemon;
use rust_plc_honeypot::scenario::ScenarioLoader;

/// Industrial PLC honeypot with a simulated Modbus/S7 memory
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// List the scenarios of the scenario directory and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Scenario activated at startup
    #[arg(short, long)]
    scenario: Option<String>,

    /// Directory of the scenario files
    #[arg(long)]
    scenario_dir: Option<PathBuf>,

    /// Scenario overlay file merged over the scenario at startup
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Scheduler tick interval in milliseconds
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Seed of the pseudo-random generators, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Modbus enabled
    #[arg(long)]
    modbus_enabled: Option<bool>,

    /// Modbus server address
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus server port
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        Config::validate_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {:#}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(
        args.tick_interval_ms,
        args.scenario_dir.clone(),
        args.scenario.clone(),
        args.overrides.clone(),
        args.seed,
        args.modbus_enabled,
        args.modbus_address.clone(),
        args.modbus_port,
    );
    validate_specific_rules(&config)?;

    if args.list_scenarios {
        let mut loader = ScenarioLoader::new(&config.simulation.scenario_dir);
        let names = loader.list().to_vec();
        println!(
            "Scenarios in {}:",
            config.simulation.scenario_dir.display()
        );
        for name in names {
            match loader.info(&name) {
                Ok(info) => println!(
                    "- {}: {} v{} by {}\n    {}",
                    name, info.name, info.version, info.author, info.description
                ),
                Err(e) => println!("- {}: {}", name, e),
            }
        }
        return Ok(());
    }

    info!("Starting PLC honeypot");
    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, terminating daemon"),
        Err(err) => eprintln!("Error waiting for shutdown signal: {}", err),
    }
    daemon.shutdown().await
}
