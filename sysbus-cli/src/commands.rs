use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bus_client::{BusTransport, ZbusTransport};
use sysbus_network::{NetworkManager, StreamConfig};
use sysbus_systemd::{ControlConfig, ServiceController, TransitionOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Command, Config};

/// How often watch loops look at the shutdown token.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub fn run(config: &Config, shutdown: CancellationToken) -> Result<()> {
    let transport: Arc<dyn BusTransport> = if config.session_bus {
        Arc::new(ZbusTransport::session())
    } else {
        Arc::new(ZbusTransport::system())
    };
    info!("Using the {}", transport.describe());

    match &config.command {
        Command::Status { unit } => status(&controller(config, transport, shutdown), unit),
        Command::Start { unit } => {
            let outcome = controller(config, transport, shutdown)
                .start_service(unit)
                .with_context(|| format!("Failed to start {}", unit))?;
            report(unit, "running", &outcome);
            Ok(())
        }
        Command::Stop { unit } => {
            let outcome = controller(config, transport, shutdown)
                .stop_service(unit)
                .with_context(|| format!("Failed to stop {}", unit))?;
            report(unit, "stopped", &outcome);
            Ok(())
        }
        Command::Net { interface } => net(&network(config, transport), interface.as_deref()),
        Command::Ssids { interface } => ssids(&network(config, transport), interface),
        Command::WatchDevice { device, interface } => watch_device(
            &network(config, transport),
            device.as_deref(),
            interface.as_deref(),
            &shutdown,
        ),
        Command::WatchManager => watch_manager(&network(config, transport), &shutdown),
    }
}

fn controller(
    config: &Config,
    transport: Arc<dyn BusTransport>,
    shutdown: CancellationToken,
) -> ServiceController {
    let control = ControlConfig::new()
        .with_job_timeout(config.job_timeout)
        .with_job_mode(config.job_mode);
    ServiceController::with_config(transport, control).with_shutdown(shutdown)
}

fn network(config: &Config, transport: Arc<dyn BusTransport>) -> NetworkManager {
    NetworkManager::new(transport)
        .with_stream_config(StreamConfig::new().with_buffer_size(config.buffer_size))
}

fn status(controller: &ServiceController, unit: &str) -> Result<()> {
    let state = controller
        .service_status(unit)
        .with_context(|| format!("Failed to read the state of {}", unit))?;
    println!(
        "{}: {} ({})",
        unit,
        state,
        if state.is_running() { "running" } else { "not running" }
    );
    Ok(())
}

fn report(unit: &str, target: &str, outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::AlreadyInState => println!("{}: already {}", unit, target),
        TransitionOutcome::Completed => println!("{}: {}", unit, target),
        TransitionOutcome::Reconciled(result) => {
            println!("{}: {} (job reported '{}')", unit, target, result)
        }
    }
}

fn net(nm: &NetworkManager, interface: Option<&str>) -> Result<()> {
    let state = nm.state().context("Failed to read NetworkManager state")?;
    println!("State:        {} ({})", state, state.code());

    let connectivity = nm.connectivity().context("Failed to check connectivity")?;
    println!("Connectivity: {} ({})", connectivity, connectivity.code());

    match nm.primary_device() {
        Ok(device) => {
            let name = nm.device_interface(&device)?;
            let device_state = nm.device_state(&device)?;
            println!("Primary:      {} [{}] {}", name, device, device_state);
        }
        Err(sysbus_network::NetworkError::NoPrimaryDevice) => println!("Primary:      none"),
        Err(e) => return Err(e).context("Failed to resolve the primary device"),
    }

    if let Some(interface) = interface {
        let device = nm
            .device_by_interface(interface)
            .with_context(|| format!("No device for interface {}", interface))?;
        let device_state = nm.device_state(&device)?;
        println!("Interface:    {} [{}] {}", interface, device, device_state);
    }
    Ok(())
}

fn ssids(nm: &NetworkManager, interface: &str) -> Result<()> {
    let device = nm
        .device_by_interface(interface)
        .with_context(|| format!("No device for interface {}", interface))?;
    let found = nm
        .available_ssids(&device)
        .with_context(|| format!("Failed to scan on {}", interface))?;

    println!("{} network(s) visible on {}", found.len(), interface);
    for (ssid, access_point) in &found {
        println!("-> {} [{}]", String::from_utf8_lossy(ssid), access_point);
    }
    Ok(())
}

fn watch_device(
    nm: &NetworkManager,
    device: Option<&str>,
    interface: Option<&str>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let device = match (device, interface) {
        (Some(device), _) => device.to_string(),
        (None, Some(interface)) => nm
            .device_by_interface(interface)
            .with_context(|| format!("No device for interface {}", interface))?,
        (None, None) => nm
            .primary_device()
            .context("Failed to resolve the primary device")?,
    };

    let mut sub = nm
        .subscribe_device_state_changes(&device)
        .with_context(|| format!("Failed to subscribe to {}", device))?;
    println!("Watching {} (Ctrl+C to stop)", device);

    while !shutdown.is_cancelled() {
        if let Some(change) = sub.recv_timeout(SHUTDOWN_POLL) {
            println!(
                "{} -> {} (reason {})",
                change.old_state, change.new_state, change.reason
            );
        }
    }

    sub.cancel();
    sub.join();
    log_losses(sub.stats().dropped);
    Ok(())
}

fn watch_manager(nm: &NetworkManager, shutdown: &CancellationToken) -> Result<()> {
    let mut sub = nm
        .subscribe_manager_state_changes()
        .context("Failed to subscribe to NetworkManager state")?;
    println!("Watching NetworkManager state (Ctrl+C to stop)");

    while !shutdown.is_cancelled() {
        if let Some(change) = sub.recv_timeout(SHUTDOWN_POLL) {
            println!("{} ({})", change.state, change.state.code());
        }
    }

    sub.cancel();
    sub.join();
    log_losses(sub.stats().dropped);
    Ok(())
}

fn log_losses(dropped: u64) {
    if dropped > 0 {
        warn!("{} state change(s) were dropped because output fell behind", dropped);
    }
}
