//! Launches one monitor per location and drains them on shutdown

mod runtime;

pub use runtime::{wait_for_shutdown_signal, ShutdownReason};

use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::location::Location;
use crate::monitor::{MonitorReport, MonitorState, StreamMonitor, StreamMonitorBuilder};
use crate::recovery::sleep_or_cancel;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct RunningMonitor {
    location: Arc<Location>,
    state: watch::Receiver<MonitorState>,
    handle: JoinHandle<MonitorReport>,
}

/// Final outcome of a supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub reports: Vec<MonitorReport>,
    /// Locations whose monitor did not stop within the shutdown timeout
    pub timed_out: Vec<String>,
}

impl SupervisorReport {
    pub fn exit_code(&self) -> i32 {
        if self.timed_out.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Owns every stream monitor of the process
pub struct StreamSupervisor {
    pending: Vec<StreamMonitor>,
    running: Vec<RunningMonitor>,
    start_stagger: Duration,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
}

impl StreamSupervisor {
    pub fn new(start_stagger: Duration, shutdown_timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            running: Vec::new(),
            start_stagger,
            shutdown_timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(config.start_stagger(), config.shutdown_timeout())
    }

    /// Build a monitor bound to this supervisor's stop signal
    pub fn add(&mut self, builder: StreamMonitorBuilder) -> Result<()> {
        let monitor = builder
            .cancellation_token(self.cancel.child_token())
            .build()?;
        self.pending.push(monitor);
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state of every started monitor
    pub fn states(&self) -> Vec<(String, MonitorState)> {
        self.running
            .iter()
            .map(|m| (m.location.id.clone(), *m.state.borrow()))
            .collect()
    }

    /// Spawn the monitors one at a time, pausing between launches.
    ///
    /// Returns the number started; a stop request during the stagger leaves
    /// the rest unstarted.
    pub async fn start(&mut self) -> usize {
        let total = self.len();

        while !self.pending.is_empty() {
            if !self.running.is_empty() && !sleep_or_cancel(self.start_stagger, &self.cancel).await {
                info!("Stop requested during staggered start");
                break;
            }

            let monitor = self.pending.remove(0);
            let location = Arc::clone(monitor.location());
            info!("Starting monitor for {} ({})", location.name, location.id);

            let state = monitor.subscribe();
            let handle = tokio::spawn(monitor.run());
            self.running.push(RunningMonitor {
                location,
                state,
                handle,
            });
        }

        info!("Started {}/{} monitors", self.running.len(), total);
        self.running.len()
    }

    /// Resolves once every started monitor has reached a terminal state
    async fn all_terminated(states: Vec<watch::Receiver<MonitorState>>) {
        join_all(states.into_iter().map(|mut state| async move {
            let _ = state.wait_for(MonitorState::is_terminal).await;
        }))
        .await;
    }

    /// Start everything, run until `shutdown` resolves, then drain
    pub async fn run_until<F>(mut self, shutdown: F) -> SupervisorReport
    where
        F: Future<Output = ShutdownReason>,
    {
        tokio::pin!(shutdown);

        let reason = tokio::select! {
            reason = &mut shutdown => Some(reason),
            _ = self.start() => None,
        };

        let reason = match reason {
            Some(reason) => reason,
            None => {
                let states = self.running.iter().map(|m| m.state.clone()).collect();
                let all_terminated = Self::all_terminated(states);
                tokio::pin!(all_terminated);
                let mut warned = false;

                loop {
                    tokio::select! {
                        reason = &mut shutdown => break reason,
                        _ = &mut all_terminated, if !warned => {
                            warn!("Every monitor has terminated; waiting for a stop signal");
                            warned = true;
                        }
                    }
                }
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        self.shutdown().await
    }

    /// Stop every monitor and wait (bounded) for them to finish
    pub async fn shutdown(mut self) -> SupervisorReport {
        info!("Beginning graceful shutdown of {} monitors", self.running.len());
        self.cancel.cancel();

        let mut reports: Vec<MonitorReport> = self
            .pending
            .drain(..)
            .map(|monitor| MonitorReport {
                location_id: monitor.location().id.clone(),
                final_state: MonitorState::Stopped,
                frames_read: 0,
                ticks: 0,
                failed_ticks: 0,
                reconnects: 0,
            })
            .collect();
        let mut timed_out = Vec::new();

        let timeout = self.shutdown_timeout;
        let outcomes = join_all(self.running.into_iter().map(|mut monitor| async move {
            let outcome = tokio::time::timeout(timeout, &mut monitor.handle).await;
            if outcome.is_err() {
                monitor.handle.abort();
            }
            (monitor.location, outcome)
        }))
        .await;

        for (location, outcome) in outcomes {
            match outcome {
                Ok(Ok(report)) => {
                    info!("{} finished in {}", location.name, report.final_state);
                    reports.push(report);
                }
                Ok(Err(e)) => {
                    error!("Monitor for {} aborted: {}", location.name, e);
                    reports.push(MonitorReport {
                        location_id: location.id.clone(),
                        final_state: MonitorState::Failed,
                        frames_read: 0,
                        ticks: 0,
                        failed_ticks: 0,
                        reconnects: 0,
                    });
                }
                Err(_) => {
                    error!(
                        "Monitor for {} did not stop within {:?}",
                        location.name, timeout
                    );
                    timed_out.push(location.id.clone());
                }
            }
        }

        info!(
            "Shutdown complete: {} monitors reported, {} timed out",
            reports.len(),
            timed_out.len()
        );

        SupervisorReport { reports, timed_out }
    }
}
