//! Worker supervision -- assembly, wiring, and lifecycle management.
//!
//! The [`Supervisor`] is the central coordinator of `wiregate-agent`.
//! It owns the bus writers and shutdown token, spawns one capture
//! worker per interface and one tailer per discovered log file, and
//! runs the shutdown sequence when a signal arrives.
//!
//! # Startup Order
//!
//! 1. Metrics endpoint (so early workers can record)
//! 2. Bus writers
//! 3. Batchers
//! 4. Interface enumeration + capture workers
//! 5. File discovery + log tailers
//!
//! # Shutdown Order
//!
//! 1. Cancel the shared token (capture readers observe it between
//!    timed reads, tailers between polls)
//! 2. Join capture workers, then tailers
//! 3. Flush residual batches from both batchers
//! 4. Flush the bus writers

use std::sync::Arc;

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use wiregate_bus::{DynBusPublisher, KafkaPublisher};
use wiregate_capture::{CaptureWorker, PacketBatcher, enumerate_interfaces};
use wiregate_core::{AgentConfig, MAX_MESSAGE_BYTES};
use wiregate_logtail::{FileTailer, LogBatcher, discover_targets};

use crate::metrics_server;

/// The agent supervisor.
///
/// Built through [`SupervisorBuilder`]; [`Supervisor::run`] blocks
/// until a shutdown signal is received or the cancellation token is
/// triggered programmatically.
pub struct Supervisor {
    config: AgentConfig,
    cancel: CancellationToken,
    network_publisher: Arc<dyn DynBusPublisher>,
    log_publisher: Arc<dyn DynBusPublisher>,
    /// Concrete Kafka handles kept for the final flush (empty when
    /// publishers were injected, e.g. in tests).
    producers: Vec<Arc<KafkaPublisher>>,
}

impl Supervisor {
    /// Get a clone of the shutdown token.
    ///
    /// Cancelling it has the same effect as receiving SIGTERM.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Spawn all workers and block until shutdown completes.
    pub async fn run(&mut self) -> Result<()> {
        // Signal handlers go in first; if they cannot be installed the
        // agent would be unstoppable, so treat that as a startup error.
        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("cannot install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("cannot install SIGINT handler: {}", e))?;

        // Batchers are constructed before any producer of records
        let packet_batcher = Arc::new(PacketBatcher::new(
            Arc::clone(&self.network_publisher),
            self.config.capture.batch_size,
            self.config.capture.batch_timeout,
            MAX_MESSAGE_BYTES,
            self.config.bus.publish_attempts,
            self.config.bus.retry_backoff,
        ));
        let log_batcher = Arc::new(LogBatcher::new(
            Arc::clone(&self.log_publisher),
            self.config.logs.batch_size,
            self.config.logs.batch_timeout,
            self.config.bus.publish_attempts,
            self.config.bus.retry_backoff,
        ));

        // One capture worker per interface. Enumeration failure is
        // fatal at startup; a single interface failing to open is not.
        let mut capture_tasks = Vec::new();
        if self.config.capture.enabled {
            let interfaces = enumerate_interfaces()
                .map_err(|e| anyhow::anyhow!("failed to enumerate interfaces: {}", e))?;
            tracing::info!(count = interfaces.len(), "found network interfaces");

            for device in interfaces {
                let worker = CaptureWorker::new(
                    device,
                    self.config.capture.clone(),
                    Arc::clone(&packet_batcher),
                    self.cancel.clone(),
                );
                capture_tasks.push(tokio::spawn(worker.run()));
            }
        }

        // One tailer per discovered log file
        let mut tail_tasks = Vec::new();
        if self.config.logs.enabled {
            let targets = discover_targets(&self.config.logs);
            tracing::info!(files = targets.len(), "discovered log files");

            for path in targets {
                let tailer = FileTailer::new(
                    path,
                    self.config.logs.poll_interval,
                    Arc::clone(&log_batcher),
                    self.cancel.clone(),
                );
                tail_tasks.push(tokio::spawn(tailer.run()));
            }
        }

        // Block until a signal arrives or the token is cancelled
        tokio::select! {
            _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "stopping on signal"),
            _ = sigint.recv() => tracing::info!(signal = "SIGINT", "stopping on signal"),
            _ = self.cancel.cancelled() => tracing::info!("stop requested via cancellation token"),
        }
        self.cancel.cancel();

        // Capture workers exit within one read-timeout period, tailers
        // within one poll interval
        for task in capture_tasks {
            let _ = task.await;
        }
        for task in tail_tasks {
            let _ = task.await;
        }

        // Residual batches from both sides
        packet_batcher.flush().await;
        log_batcher.flush().await;

        // Bus writers are closed last
        for producer in &self.producers {
            if let Err(e) = producer.flush() {
                tracing::warn!(topic = producer.topic(), error = %e, "failed to flush producer");
            }
        }

        tracing::info!("agent shut down gracefully");
        Ok(())
    }
}

/// Builder for [`Supervisor`].
///
/// Publishers can be injected to replace the Kafka writers, which is
/// how the integration tests observe published messages.
pub struct SupervisorBuilder {
    config: AgentConfig,
    network_publisher: Option<Arc<dyn DynBusPublisher>>,
    log_publisher: Option<Arc<dyn DynBusPublisher>>,
    cancel: Option<CancellationToken>,
}

impl SupervisorBuilder {
    /// Create a builder from a loaded configuration.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            network_publisher: None,
            log_publisher: None,
            cancel: None,
        }
    }

    /// Replace the network-topic publisher.
    pub fn network_publisher(mut self, publisher: Arc<dyn DynBusPublisher>) -> Self {
        self.network_publisher = Some(publisher);
        self
    }

    /// Replace the log-topic publisher.
    pub fn log_publisher(mut self, publisher: Arc<dyn DynBusPublisher>) -> Self {
        self.log_publisher = Some(publisher);
        self
    }

    /// Use an external cancellation token (for programmatic shutdown).
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate the configuration and assemble the supervisor.
    ///
    /// Installs the metrics recorder and creates the bus writers;
    /// workers are spawned later by [`Supervisor::run`].
    pub fn build(self) -> Result<Supervisor> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
            tracing::info!(port = self.config.metrics.port, "metrics endpoint enabled");
        }

        let mut producers = Vec::new();

        let network_publisher: Arc<dyn DynBusPublisher> = match self.network_publisher {
            Some(publisher) => publisher,
            None => {
                let producer = Arc::new(KafkaPublisher::new(
                    &self.config.bus,
                    self.config.bus.network_topic.clone(),
                )?);
                producers.push(Arc::clone(&producer));
                producer
            }
        };

        let log_publisher: Arc<dyn DynBusPublisher> = match self.log_publisher {
            Some(publisher) => publisher,
            None => {
                let producer = Arc::new(KafkaPublisher::new(
                    &self.config.bus,
                    self.config.bus.log_topic.clone(),
                )?);
                producers.push(Arc::clone(&producer));
                producer
            }
        };

        Ok(Supervisor {
            config: self.config,
            cancel: self.cancel.unwrap_or_default(),
            network_publisher,
            log_publisher,
            producers,
        })
    }
}
