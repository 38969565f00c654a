pub mod client;
pub mod collectors;
pub mod config;
pub mod dashboard;
pub mod exec;
pub mod inbound;
pub mod models;
pub mod protocol;
pub mod utils;

use crate::client::{LinkConnection, LinkError, PortOpener, SerialOpener};
use crate::collectors::{MockTelemetry, SystemTelemetry, TelemetrySource};
use crate::config::AppConfig;
use crate::exec::CommandDispatcher;
use crate::inbound::InboundDispatcher;
use crate::models::{ExecutionPolicy, SensorSpec};
use anyhow::Context;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for the reader to notice its stop signal.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Switches taken from the command line.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Print one frame to stdout and exit without touching the port.
    pub dry_run: bool,
    /// Send a single frame and exit.
    pub once: bool,
    /// Serve `REQ COMMANDS` / `SELECT` from the display.
    pub inbound: bool,
    /// Use synthetic readings.
    pub mock: bool,
    pub policy: ExecutionPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            once: false,
            inbound: true,
            mock: false,
            policy: ExecutionPolicy::default(),
        }
    }
}

type ReaderTask = (CancellationToken, JoinHandle<Result<(), LinkError>>);

pub async fn run(config: AppConfig, options: RunOptions) -> anyhow::Result<()> {
    info!("Starting lcdlink");

    let source: Arc<dyn TelemetrySource> = if options.mock {
        info!("Using mock telemetry");
        Arc::new(MockTelemetry::new())
    } else {
        Arc::new(SystemTelemetry::new())
    };

    let result = if options.dry_run {
        dry_run(&config, source).await
    } else {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                signal_token.cancel();
            }
        });

        let opener = SerialOpener::new(config.serial.port.clone(), config.serial.baud);
        main_loop(&config, options, Box::new(opener), source, shutdown).await
    };

    match result {
        Ok(_) => info!("lcdlink stopped"),
        Err(e) => {
            error!("Application error: {e:#}");
            // Print chain of error causes
            let mut source = e.source();
            while let Some(e) = source {
                error!("Caused by: {e}");
                source = e.source();
            }
            return Err(e).context("Application failed to run");
        }
    }

    Ok(())
}

async fn snapshot(
    config: &AppConfig,
    sensors: Arc<Vec<SensorSpec>>,
    source: Arc<dyn TelemetrySource>,
) -> anyhow::Result<Vec<String>> {
    let max_lines = config.max_lines;
    let interval = config.interval_duration();
    // Collectors block on sysfs and nvidia-smi.
    tokio::task::spawn_blocking(move || {
        dashboard::assemble(&sensors, source.as_ref(), max_lines, interval)
    })
    .await
    .context("Telemetry collection panicked")
}

async fn dry_run(config: &AppConfig, source: Arc<dyn TelemetrySource>) -> anyhow::Result<()> {
    let lines = snapshot(config, Arc::new(config.sensors.clone()), source).await?;
    for line in &lines {
        println!("{}", line);
    }
    Ok(())
}

fn spawn_reader(
    inbound: Arc<InboundDispatcher>,
    stream: Box<dyn std::io::Read + Send>,
    shutdown: &CancellationToken,
) -> ReaderTask {
    let stop = shutdown.child_token();
    let token = stop.clone();
    let handle = tokio::task::spawn_blocking(move || inbound.run(stream, &token));
    (stop, handle)
}

async fn stop_reader(reader: Option<ReaderTask>) {
    let Some((stop, handle)) = reader else {
        return;
    };
    stop.cancel();
    match tokio::time::timeout(READER_JOIN_TIMEOUT, handle).await {
        Ok(Ok(Ok(()))) => debug!("Reader joined"),
        Ok(Ok(Err(e))) => debug!("Reader ended with: {}", e),
        Ok(Err(e)) => warn!("Reader task failed: {}", e),
        Err(_) => warn!("Reader did not stop within {:?}", READER_JOIN_TIMEOUT),
    }
}

/// Connect, push a frame every interval, reconnect on the next tick after a
/// failed write. Returns once `shutdown` fires, or after the first frame with
/// `options.once`.
async fn main_loop(
    config: &AppConfig,
    options: RunOptions,
    opener: Box<dyn PortOpener>,
    source: Arc<dyn TelemetrySource>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let link = Arc::new(LinkConnection::new(opener));
    let sensors = Arc::new(config.sensors.clone());
    let dispatcher = CommandDispatcher::new(options.policy);
    info!(
        "Execution policy: allow_exec={} driver={}",
        options.policy.allow_exec, options.policy.driver
    );
    let inbound = Arc::new(InboundDispatcher::new(
        link.clone(),
        Arc::new(config.commands.clone()),
        Arc::new(dispatcher),
    ));

    let mut reader: Option<ReaderTask> = None;
    let mut interval = tokio::time::interval(config.interval_duration());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.cancelled() => break Ok(()),
        }

        if !link.is_connected() {
            stop_reader(reader.take()).await;
            match link.connect(&shutdown).await {
                Ok(stream) => {
                    if options.inbound {
                        reader = Some(spawn_reader(inbound.clone(), stream, &shutdown));
                    }
                }
                Err(LinkError::Cancelled) => break Ok(()),
                Err(e) => break Err(anyhow::Error::new(e).context("Failed to connect to display")),
            }
        }

        let lines = match snapshot(config, sensors.clone(), source.clone()).await {
            Ok(lines) => lines,
            Err(e) => break Err(e),
        };

        match link.write_frame(&protocol::encode(&lines)) {
            Ok(()) => info!("Sent {} line(s)", lines.len()),
            Err(e) => warn!("Frame not sent, reconnecting on next tick: {}", e),
        }

        if options.once {
            break Ok(());
        }
    };

    stop_reader(reader.take()).await;
    link.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::FakeOpener;
    use crate::models::{CommandSpec, Provider};

    fn config() -> AppConfig {
        AppConfig {
            interval: 1.0,
            sensors: vec![
                SensorSpec::new("CPU", Provider::Cpu),
                SensorSpec::new("GPU", Provider::Gpu),
            ],
            commands: vec![CommandSpec::new("1", "Shutdown")],
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_once_sends_single_frame() {
        let opener = FakeOpener::new();
        let written = opener.written.clone();
        let options = RunOptions {
            once: true,
            inbound: false,
            ..RunOptions::default()
        };

        main_loop(
            &config(),
            options,
            Box::new(opener),
            Arc::new(MockTelemetry::new()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let text = written.text();
        assert!(text.starts_with("META interval=1.000\nCPU "));
        assert!(text.contains("\nGPU "));
        assert!(text.ends_with("\n\n"));
        assert_eq!(text.matches("\n\n").count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_tick_sends_nothing() {
        let opener = FakeOpener::new();
        let written = opener.written.clone();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // Whichever select! branch wins, connect refuses a cancelled token.
        main_loop(
            &config(),
            RunOptions::default(),
            Box::new(opener),
            Arc::new(MockTelemetry::new()),
            shutdown,
        )
        .await
        .unwrap();

        assert!(written.contents().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_port_gives_up_on_shutdown() {
        let opener = FakeOpener::failing(usize::MAX);
        let written = opener.written.clone();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        main_loop(
            &config(),
            RunOptions::default(),
            Box::new(opener),
            Arc::new(MockTelemetry::new()),
            shutdown,
        )
        .await
        .unwrap();

        assert!(written.contents().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_reconnects_on_next_tick() {
        let opener = FakeOpener::new().with_broken_writes(1);
        let written = opener.written.clone();
        let attempts = opener.attempts.clone();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let watched = written.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                if watched.text().ends_with("\n\n") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            trigger.cancel();
        });

        let options = RunOptions {
            inbound: false,
            ..RunOptions::default()
        };
        main_loop(
            &config(),
            options,
            Box::new(opener),
            Arc::new(MockTelemetry::new()),
            shutdown,
        )
        .await
        .unwrap();

        assert!(attempts.lock().unwrap().len() >= 2);
        let text = written.text();
        assert!(text.starts_with("META interval=1.000\nCPU "));
        assert!(text.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn test_reader_serves_catalog_while_running() {
        let opener = FakeOpener::new().with_input(b"REQ COMMANDS\n");
        let written = opener.written.clone();
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let watched = written.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                if watched.text().contains("COMMANDS v1") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.cancel();
        });

        main_loop(
            &config(),
            RunOptions::default(),
            Box::new(opener),
            Arc::new(MockTelemetry::new()),
            shutdown,
        )
        .await
        .unwrap();

        let text = written.text();
        assert!(text.contains("COMMANDS v1\n1 Shutdown\n\n"));
        assert!(text.contains("META interval=1.000\n"));
    }
}
