//! conductor - run the scheduler against simulated hardware.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use conductor_core::app::{Listener, SchedulerBuilder, SchedulerConfig, SchedulerHandle};
use conductor_core::domain::{EventName, ListenerError, SchedulerEvent, TaskKind, TaskRequest};
use conductor_core::impls::{SimulatedActuator, SimulatedBattery};
use conductor_core::ports::PowerSource;

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Priority scheduler for a single exclusive actuator"
)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted session against a simulated actuator and battery
    Simulate(SimulateArgs),
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
struct SimulateArgs {
    /// Scheduler config (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to run before shutting down
    #[arg(long, default_value = "30")]
    seconds: u64,

    /// Starting battery voltage
    #[arg(long, default_value = "4.0")]
    battery: f32,

    /// Voltage lost per power sample
    #[arg(long, default_value = "0.05")]
    drain: f32,

    /// Power sampling period in ms, overrides the config when given
    #[arg(long)]
    sample_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "conductor=debug,conductor_core=debug"
    } else {
        "conductor=info,conductor_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Simulate(args) => simulate(args).await,
        Command::Config => {
            let text = SchedulerConfig::default()
                .to_toml_string()
                .context("failed to render default config")?;
            print!("{text}");
            Ok(())
        }
    }
}

async fn simulate(args: SimulateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SchedulerConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let actuator = SimulatedActuator::new().failing(TaskKind::Locomotion, "wheel encoder lost sync");
    let battery = Arc::new(SimulatedBattery::new(args.battery, args.drain));

    let runtime = SchedulerBuilder::new(Arc::new(actuator))
        .config(config)
        .power_source(Arc::clone(&battery) as Arc<dyn PowerSource>)
        .spawn()?;
    let handle = runtime.handle();

    // one JSON line per event on stdout; logs go to stderr
    let printer: Arc<dyn Listener> = Arc::new(|e: &SchedulerEvent| -> Result<(), ListenerError> {
        let line = serde_json::to_string(e).map_err(|err| ListenerError::new(err.to_string()))?;
        println!("{line}");
        Ok(())
    });
    for name in EventName::ALL {
        handle.subscribe(name, Arc::clone(&printer), None).await?;
    }

    let driver = tokio::spawn(run_script(handle.clone()));

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.seconds)) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("interrupted");
        }
    }
    driver.abort();

    let status = handle.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    runtime.shutdown_and_join().await;
    tracing::info!(volts = battery.volts(), "simulation finished");
    Ok(())
}

/// Flags win over the file, but only when they were given.
fn apply_overrides(config: &mut SchedulerConfig, args: &SimulateArgs) {
    if let Some(ms) = args.sample_ms {
        config.power.sample_interval_ms = ms;
    }
}

/// Submit a mix of work over the first few seconds.
async fn run_script(handle: SchedulerHandle) {
    let script = [
        (0, TaskRequest::new(TaskKind::InputCapture, 3)),
        (
            500,
            TaskRequest::new(TaskKind::Expression, 4).with_payload(json!({ "face": "smile" })),
        ),
        (
            2_000,
            TaskRequest::new(TaskKind::Notification, 8)
                .with_payload(json!({ "notification": { "type": "info" } })),
        ),
        (
            1_000,
            TaskRequest::new(TaskKind::Locomotion, 5).with_duration(Duration::from_secs(4)),
        ),
        (
            1_000,
            TaskRequest::new(TaskKind::Expression, 9).with_payload(json!({ "face": "surprised" })),
        ),
        (2_000, TaskRequest::new(TaskKind::Expression, 2)),
        (2_000, TaskRequest::new(TaskKind::Locomotion, 6)),
        (3_000, TaskRequest::new(TaskKind::Notification, 10)),
    ];

    for (delay_ms, request) in script {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        let id = handle.submit(request);
        tracing::debug!(task_id = %id, "scripted submission");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate_args(argv: &[&str]) -> SimulateArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Simulate(args) => args,
            Command::Config => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_config_sample_interval_kept_without_flag() {
        let mut config = SchedulerConfig::default();
        config.power.sample_interval_ms = 750;

        apply_overrides(&mut config, &simulate_args(&["conductor", "simulate"]));
        assert_eq!(config.power.sample_interval_ms, 750);
    }

    #[test]
    fn test_sample_ms_flag_overrides_config() {
        let mut config = SchedulerConfig::default();
        config.power.sample_interval_ms = 750;

        let args = simulate_args(&["conductor", "simulate", "--sample-ms", "250"]);
        apply_overrides(&mut config, &args);
        assert_eq!(config.power.sample_interval_ms, 250);
    }
}
