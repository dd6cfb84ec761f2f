use crate::config::Config;
use crate::executor::{FailureReason, RequestExecutor, RequestResult};
use crate::interrupt::Interrupted;
use crate::reporting::{append_average, MonitorSink, ReportError, ResultSink, RunSummary};
use crate::sampler::{ResourceProbe, ResourceSample, Sampler};
use crate::session::{RunFiles, RunId};
use futures::stream::{self, StreamExt};
use pqload_client::{Metric, Transport};
use pqload_metrics::{ActiveRequests, Collector, Stopwatch};
use slog::{debug, error, info, o, warn, Logger};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What a finished run leaves behind.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub results_path: PathBuf,
    /// `None` when the monitoring file could not be created.
    pub monitor_path: Option<PathBuf>,
    pub results: Vec<RequestResult>,
    pub summary: RunSummary,
}

/// Drives one batch of requests alongside a resource sampler.
pub struct Benchmark {
    config: Config,
    files: Arc<RunFiles>,
    transport: Arc<dyn Transport>,
    active: ActiveRequests,
    interrupted: Interrupted,
    logger: Logger,
}

impl Benchmark {
    pub fn new(
        config: Config,
        run_id: RunId,
        transport: Arc<dyn Transport>,
        interrupted: Interrupted,
        logger: Logger,
    ) -> Benchmark {
        let files = Arc::new(RunFiles::new(&config.output, &run_id));
        let logger = logger.new(o!("run" => run_id.to_string()));
        Benchmark {
            config,
            files,
            transport,
            active: ActiveRequests::new(),
            interrupted,
            logger,
        }
    }

    pub fn files(&self) -> &RunFiles {
        &self.files
    }

    pub fn active(&self) -> ActiveRequests {
        self.active.clone()
    }

    /// Run every request, then write the result file and the cross-run
    /// averages. Only a result file that cannot be written is an error.
    pub async fn run<P: ResourceProbe + 'static>(self, probe: P) -> Result<RunReport, ReportError> {
        let wall = Stopwatch::new();
        let files = self.files.clone();
        let results_dir = files.results_dir().to_path_buf();
        files.create_results_dir().map_err(|source| ReportError::Setup {
            path: results_dir,
            source,
        })?;
        let results_error = |source| ReportError::Results {
            path: files.results.clone(),
            source,
        };
        let mut sink = ResultSink::create(&files.results).map_err(results_error)?;

        if let Err(e) = fs::create_dir_all(&files.trace_dir) {
            warn!(self.logger, "could not create trace directory {}: {}", files.trace_dir.display(), e);
        }

        info!(self.logger, "starting benchmark";
            "url" => &self.config.client.url,
            "requests" => self.config.requests,
            "concurrency" => self.config.concurrency);

        let sampler = self.spawn_sampler(probe);
        let deadline = self.spawn_deadline();

        let mut collector = Collector::new();
        Metric::configure_collector(&mut collector);
        let executor = Arc::new(RequestExecutor::new(
            self.transport.clone(),
            self.config.client.clone(),
            files.clone(),
            self.config.require_http_ok,
            self.active.clone(),
            collector.handle(),
            self.interrupted.clone(),
            self.logger.clone(),
        ));
        let results = self.dispatch(executor).await;

        let samples = match sampler {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                error!(self.logger, "sampler stopped unexpectedly: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        if let Some(d) = deadline {
            d.abort();
        }
        debug!(self.logger, "requests finished";
            "in_flight" => self.active.current(),
            "entered" => self.active.entered());

        let processed = collector.process_outstanding();
        debug!(self.logger, "aggregated {} metric samples", processed);
        for s in Metric::all_metrics(&collector) {
            debug!(self.logger, "{}", s.key(); "count" => ?s.count(), "last" => ?s.gauge(), "peak" => ?s.peak());
        }
        let summary = RunSummary::compute(&results, &samples, &collector, wall.elapsed());

        sink.write_results(&results, self.config.requests as u64)
            .and_then(|_| sink.write_summary(&summary))
            .map_err(results_error)?;
        sink.finish().map_err(results_error)?;

        match append_average(&files.averages, &files.run_id, &summary) {
            Ok(true) => {}
            Ok(false) => warn!(self.logger, "no request succeeded, run left out of {}", files.averages.display()),
            Err(e) => warn!(self.logger, "could not update {}: {}", files.averages.display(), e),
        }

        info!(self.logger, "benchmark finished";
            "successes" => summary.successes,
            "failures" => summary.failures(),
            "samples" => samples.len());

        let monitor_path = if files.monitor.exists() {
            Some(files.monitor.clone())
        } else {
            None
        };
        Ok(RunReport {
            run_id: files.run_id.clone(),
            results_path: files.results.clone(),
            monitor_path,
            results,
            summary,
        })
    }

    /// Results come back in completion order.
    async fn dispatch(&self, executor: Arc<RequestExecutor>) -> Vec<RequestResult> {
        let requests = self.config.requests as u64;
        stream::iter(1..=requests)
            .map(|n| {
                let executor = executor.clone();
                let logger = self.logger.clone();
                async move {
                    match tokio::spawn(async move { executor.execute(n).await }).await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(logger, "request task failed: {}", e; "request" => n);
                            RequestResult::failed(n, FailureReason::Panicked)
                        }
                    }
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await
    }

    fn spawn_sampler<P: ResourceProbe + 'static>(
        &self,
        probe: P,
    ) -> Option<JoinHandle<Vec<ResourceSample>>> {
        let monitor = &self.files.monitor;
        let sink = fs::create_dir_all(self.files.monitor_dir())
            .and_then(|_| MonitorSink::create(monitor));
        let sink = match sink {
            Ok(sink) => sink,
            Err(e) => {
                warn!(self.logger, "resource sampling disabled, could not create {}: {}", monitor.display(), e);
                return None;
            }
        };
        let sampler = Sampler::new(
            self.config.sampler,
            self.active.clone(),
            probe,
            self.interrupted.clone(),
            self.logger.new(o!("task" => "sampler")),
        );
        Some(tokio::spawn(sampler.run(sink)))
    }

    fn spawn_deadline(&self) -> Option<JoinHandle<()>> {
        let timeout = self.config.timeout?;
        let interrupted = self.interrupted.clone();
        let logger = self.logger.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    warn!(logger, "batch deadline of {:?} reached, cancelling", timeout);
                    interrupted.interrupt();
                }
                _ = interrupted.cancelled() => {}
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::executor::Status;
    use crate::sampler::{ProbeError, ProbeReading};
    use futures::FutureExt;
    use pqload_client::{FutureResponse, Invocation, TransportError, TransportOutput};
    use slog::Discard;
    use std::collections::HashSet;
    use std::time::Duration;

    const TRACE: &str = "\
=> Send SSL data, 100 bytes (0x64)
<= Recv SSL data, 200 bytes (0xc8)
== Info: SSL connection using TLSv1.3 / TLS_AES_256_GCM_SHA384 / mlkem512 / mldsa44
";
    const OUTPUT: &str = "Connect Time: 0.010, TLS Handshake: 0.030, Total Time: 0.050, 200\n";

    #[derive(Default)]
    struct StubTransport {
        failing: Option<u64>,
        panicking: Option<u64>,
        hang: bool,
    }

    impl Transport for StubTransport {
        fn invoke(&self, inv: &Invocation) -> FutureResponse<TransportOutput, TransportError> {
            let n = inv.request_number;
            if self.panicking == Some(n) {
                panic!("stub transport panicked on request {}", n);
            }
            let exit = if self.failing == Some(n) { 1 } else { 0 };
            let hang = self.hang;
            let path = inv.trace_path.clone();
            async move {
                std::fs::write(&path, TRACE).unwrap();
                if hang {
                    futures::future::pending::<()>().await;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(TransportOutput {
                    exit_code: Some(exit),
                    stdout: OUTPUT.into(),
                    stderr: String::new(),
                })
            }
            .boxed()
        }
    }

    struct StubProbe;

    impl ResourceProbe for StubProbe {
        fn read(&mut self) -> Result<ProbeReading, ProbeError> {
            Ok(ProbeReading {
                cpu_percent: 25.0,
                memory_percent: 50.0,
                bytes_sent: 1,
                bytes_received: 2,
            })
        }
    }

    fn config(dir: &std::path::Path, requests: usize) -> Config {
        let mut c = Config::defaults()
            .unwrap()
            .with_overrides(Some(requests), None, None)
            .unwrap();
        c.output = OutputConfig {
            results_dir: dir.join("request_logs"),
            monitor_dir: dir.join("system_logs"),
            trace_dir: dir.join("traces"),
        };
        c.sampler.interval = Duration::from_millis(10);
        c
    }

    fn benchmark(config: Config, transport: StubTransport, interrupted: &Interrupted) -> Benchmark {
        Benchmark::new(
            config,
            RunId::new("test"),
            Arc::new(transport),
            interrupted.clone(),
            Logger::root(Discard, o!()),
        )
    }

    fn data_rows(path: &std::path::Path) -> (Vec<Vec<String>>, Vec<String>) {
        let contents = fs::read_to_string(path).unwrap();
        let mut blocks = contents.split("\n\n");
        let rows = blocks
            .next()
            .unwrap()
            .lines()
            .skip(1)
            .map(|l| l.split(',').map(String::from).collect())
            .collect();
        let summary = blocks
            .next()
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        (rows, summary)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn all_requests_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        let b = benchmark(config(dir.path(), 10), StubTransport::default(), &interrupted);
        let active = b.active();
        let report = b.run(StubProbe).await.unwrap();

        assert_eq!(active.current(), 0);
        assert_eq!(active.entered(), 10);
        assert_eq!(report.summary.successes, 10);

        let (rows, summary) = data_rows(&report.results_path);
        assert_eq!(rows.len(), 10);
        let numbers: HashSet<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(numbers.len(), 10);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row[5], "Success");
            assert_eq!(row[6], format!("{}/10", i + 1));
            assert_eq!(row[7], "100");
            assert_eq!(row[8], "200");
            assert_eq!(row[9], "mlkem512");
            assert_eq!(row[10], "mldsa44");
            assert_eq!(row[1], "10.000");
        }
        assert_eq!(summary[0], "Metric,Value");
        assert!(summary.contains(&"Total_Bytes_Sent,1000".to_string()));
        assert!(summary.contains(&"Requests,10".to_string()));

        let monitor = fs::read_to_string(report.monitor_path.unwrap()).unwrap();
        assert_eq!(monitor.lines().count(), report.summary.resources.samples + 1);
        assert!(report.summary.resources.samples >= 5);

        let averages = fs::read_to_string(dir.path().join("request_logs/average_metrics.csv")).unwrap();
        assert!(averages.lines().nth(1).unwrap().starts_with("test,10.000,30.000,50.000,"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_failure_does_not_affect_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        let transport = StubTransport {
            failing: Some(3),
            ..StubTransport::default()
        };
        let report = benchmark(config(dir.path(), 5), transport, &interrupted)
            .run(StubProbe)
            .await
            .unwrap();

        let (rows, _) = data_rows(&report.results_path);
        assert_eq!(rows.len(), 5);
        let failed: Vec<&Vec<String>> = rows.iter().filter(|r| r[5] == "Failure").collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0][0], "3");
        assert_eq!(&failed[0][1..4], &["", "", ""]);
        for row in rows.iter().filter(|r| r[5] == "Success") {
            assert_eq!(row[3], "50.000");
            assert_eq!(row[7], "100");
        }
        assert_eq!(rows.last().unwrap()[6], "4/5");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_request_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        let transport = StubTransport {
            panicking: Some(2),
            ..StubTransport::default()
        };
        let b = benchmark(config(dir.path(), 4), transport, &interrupted);
        let active = b.active();
        let report = b.run(StubProbe).await.unwrap();

        assert_eq!(active.current(), 0);
        assert_eq!(report.results.len(), 4);
        let panicked: Vec<&RequestResult> = report
            .results
            .iter()
            .filter(|r| r.failure == Some(FailureReason::Panicked))
            .collect();
        assert_eq!(panicked.len(), 1);
        assert_eq!(panicked[0].request_number, 2);
    }

    #[tokio::test]
    async fn empty_batch_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        let b = benchmark(config(dir.path(), 0), StubTransport::default(), &interrupted);
        let active = b.active();
        let report = b.run(StubProbe).await.unwrap();

        assert_eq!(active.current(), 0);
        assert_eq!(active.entered(), 0);
        assert!(report.results.is_empty());

        let (rows, summary) = data_rows(&report.results_path);
        assert!(rows.is_empty());
        assert_eq!(summary[0], "Metric,Value");
        assert_eq!(summary[1], "Requests,0");
        assert!(summary.contains(&"Successes,0".to_string()));

        // Every tick reads zero in flight, so the sampler ends after its stable ticks.
        assert_eq!(report.summary.resources.samples, 5);
        let monitor = fs::read_to_string(report.monitor_path.unwrap()).unwrap();
        assert_eq!(monitor.lines().count(), 6);
        assert!(!dir.path().join("request_logs/average_metrics.csv").exists());
    }

    #[tokio::test]
    async fn interrupted_run_still_writes_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        interrupted.interrupt();
        let report = benchmark(config(dir.path(), 6), StubTransport::default(), &interrupted)
            .run(StubProbe)
            .await
            .unwrap();

        let (rows, _) = data_rows(&report.results_path);
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r[5] == "Failure" && r[6] == "0/6"));
        assert!(report
            .results
            .iter()
            .all(|r| r.failure == Some(FailureReason::Cancelled)));
        assert!(!dir.path().join("request_logs/average_metrics.csv").exists());
    }

    #[tokio::test]
    async fn deadline_cancels_hung_requests() {
        let dir = tempfile::tempdir().unwrap();
        let interrupted = Interrupted::new();
        let mut c = config(dir.path(), 3);
        c.timeout = Some(Duration::from_millis(100));
        let transport = StubTransport {
            hang: true,
            ..StubTransport::default()
        };
        let b = benchmark(c, transport, &interrupted);
        let active = b.active();
        let report = b.run(StubProbe).await.unwrap();

        assert!(interrupted.interrupted());
        assert_eq!(active.current(), 0);
        assert_eq!(report.results.len(), 3);
        for r in &report.results {
            assert_eq!(r.status, Status::Failure);
            assert_eq!(r.failure, Some(FailureReason::Cancelled));
            assert!(r.elapsed_time.is_some());
            assert_eq!(r.trace.kem, "mlkem512");
        }
    }

    #[tokio::test]
    async fn unwritable_results_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("request_logs");
        fs::write(&blocker, "not a directory").unwrap();
        let interrupted = Interrupted::new();
        let result = benchmark(config(dir.path(), 1), StubTransport::default(), &interrupted)
            .run(StubProbe)
            .await;
        assert!(matches!(result, Err(ReportError::Setup { .. })));
    }
}
