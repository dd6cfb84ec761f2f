use crate::config::SamplerConfig;
use crate::interrupt::Interrupted;
use crate::reporting::MonitorSink;
use chrono::{DateTime, Local};
use pqload_metrics::ActiveRequests;
use slog::{debug, error, warn, Logger};
use std::io::Write;
use std::time::Duration;
use sysinfo::{Networks, System};
use thiserror::Error;
use tokio::task;

/// When the sampler stops once no requests are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Stop on the first tick that reads zero, before sampling it.
    Strict,
    /// Stop after this many consecutive ticks read zero. Every one of those
    /// ticks is still sampled.
    Debounced { stable_ticks: u32 },
}

/// Host-wide readings for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeReading {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    /// Bytes sent over all interfaces since the previous reading.
    pub bytes_sent: u64,
    /// Bytes received over all interfaces since the previous reading.
    pub bytes_received: u64,
}

#[derive(Debug, Error)]
#[error("resource probe failed: {0}")]
pub struct ProbeError(pub String);

/// Source of host readings. `read` may block; the sampler calls it on the
/// blocking thread pool.
pub trait ResourceProbe: Send {
    fn read(&mut self) -> Result<ProbeReading, ProbeError>;
}

/// Reads CPU, memory and network counters from the local host.
pub struct SystemProbe {
    system: System,
    networks: Networks,
}

impl Default for SystemProbe {
    fn default() -> Self {
        SystemProbe::new()
    }
}

impl SystemProbe {
    pub fn new() -> SystemProbe {
        let mut system = System::new();
        // CPU usage is a delta between refreshes, so prime it once.
        system.refresh_cpu();
        system.refresh_memory();
        SystemProbe {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl ResourceProbe for SystemProbe {
    fn read(&mut self) -> Result<ProbeReading, ProbeError> {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.networks.refresh();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProbeError("no memory information available".into()));
        }
        let memory_percent = (self.system.used_memory() as f64 / total as f64 * 100.0) as f32;

        let mut bytes_sent = 0u64;
        let mut bytes_received = 0u64;
        for (_name, data) in &self.networks {
            bytes_sent = bytes_sent.saturating_add(data.transmitted());
            bytes_received = bytes_received.saturating_add(data.received());
        }

        Ok(ProbeReading {
            cpu_percent: self.system.global_cpu_info().cpu_usage(),
            memory_percent,
            bytes_sent,
            bytes_received,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub active_requests: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Background loop recording host resource usage while requests are in flight.
pub struct Sampler<P> {
    interval: Duration,
    stop: StopCondition,
    active: ActiveRequests,
    probe: P,
    interrupted: Interrupted,
    logger: Logger,
}

impl<P: ResourceProbe + 'static> Sampler<P> {
    pub fn new(
        config: SamplerConfig,
        active: ActiveRequests,
        probe: P,
        interrupted: Interrupted,
        logger: Logger,
    ) -> Sampler<P> {
        Sampler {
            interval: config.interval,
            stop: config.stop,
            active,
            probe,
            interrupted,
            logger,
        }
    }

    /// Sample until the stop condition holds or the run is interrupted.
    /// Each sample is appended to `sink` as soon as it is taken; a failed
    /// append is logged and sampling continues. Returns every sample taken.
    pub async fn run<W: Write>(self, mut sink: MonitorSink<W>) -> Vec<ResourceSample> {
        let mut probe = self.probe;
        let mut samples = Vec::new();
        let mut stable = 0u32;
        loop {
            if self.interrupted.interrupted() {
                debug!(self.logger, "sampler interrupted"; "samples" => samples.len());
                break;
            }
            let active = self.active.current();
            if active == 0 && self.stop == StopCondition::Strict {
                break;
            }

            let read = task::spawn_blocking(move || {
                let reading = probe.read();
                (probe, reading)
            })
            .await;
            let reading = match read {
                Ok((returned, reading)) => {
                    probe = returned;
                    reading
                }
                Err(e) => {
                    error!(self.logger, "resource probe failed, sampling stopped: {}", e);
                    break;
                }
            };
            match reading {
                Ok(reading) => {
                    let sample = ResourceSample {
                        timestamp: Local::now(),
                        cpu_percent: reading.cpu_percent,
                        memory_percent: reading.memory_percent,
                        active_requests: active,
                        bytes_sent: reading.bytes_sent,
                        bytes_received: reading.bytes_received,
                    };
                    if let Err(e) = sink.append(&sample) {
                        warn!(self.logger, "could not write resource sample: {}", e);
                    }
                    samples.push(sample);
                }
                Err(e) => warn!(self.logger, "{}", e),
            }

            if let StopCondition::Debounced { stable_ticks } = self.stop {
                stable = if active == 0 { stable + 1 } else { 0 };
                if stable >= stable_ticks {
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.interrupted.cancelled() => {}
            }
        }
        debug!(self.logger, "sampler stopped"; "samples" => samples.len());
        samples
    }
}
