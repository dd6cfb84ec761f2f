use crate::interrupt::Interrupted;
use crate::session::RunFiles;
use pqload_client::{ClientCommand, Metric, TraceParser, TraceSummary, Transport, WriteOut, WriteOutError};
use pqload_metrics::{ActiveRequests, CollectorHandle, Stopwatch};
use slog::{error, info, o, Logger};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Success => f.write_str("Success"),
            Status::Failure => f.write_str("Failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The client tool could not be started or waited on.
    Spawn(String),
    /// The client exited unsuccessfully; `None` means it was killed by a signal.
    Exit(Option<i32>),
    Output(WriteOutError),
    HttpStatus(u16),
    Cancelled,
    Panicked,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureReason::Spawn(e) => write!(f, "{}", e),
            FailureReason::Exit(Some(code)) => write!(f, "client exited with status {}", code),
            FailureReason::Exit(None) => f.write_str("client terminated by signal"),
            FailureReason::Output(e) => write!(f, "{}", e),
            FailureReason::HttpStatus(code) => write!(f, "HTTP status {}", code),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Panicked => f.write_str("executor panicked"),
        }
    }
}

/// Outcome of one dispatched request. Built once, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    pub request_number: u64,
    pub connect_time: Option<Duration>,
    pub handshake_time: Option<Duration>,
    pub total_time: Option<Duration>,
    /// Measured around the client process, independent of what it reports.
    pub elapsed_time: Option<Duration>,
    pub status: Status,
    pub failure: Option<FailureReason>,
    pub http_status: Option<u16>,
    pub trace: TraceSummary,
}

impl RequestResult {
    /// A failed request with nothing measured.
    pub fn failed(request_number: u64, reason: FailureReason) -> RequestResult {
        RequestResult {
            request_number,
            connect_time: None,
            handshake_time: None,
            total_time: None,
            elapsed_time: None,
            status: Status::Failure,
            failure: Some(reason),
            http_status: None,
            trace: TraceSummary::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Runs single requests through the client tool. Shared by every in-flight
/// request of a run.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    command: ClientCommand,
    traces: TraceParser,
    files: Arc<RunFiles>,
    require_http_ok: bool,
    active: ActiveRequests,
    metrics: CollectorHandle<Metric>,
    interrupted: Interrupted,
    logger: Logger,
}

impl RequestExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        command: ClientCommand,
        files: Arc<RunFiles>,
        require_http_ok: bool,
        active: ActiveRequests,
        metrics: CollectorHandle<Metric>,
        interrupted: Interrupted,
        logger: Logger,
    ) -> RequestExecutor {
        RequestExecutor {
            transport,
            command,
            traces: TraceParser::new(),
            files,
            require_http_ok,
            active,
            metrics,
            interrupted,
            logger,
        }
    }

    /// Perform one request end to end. Never fails: every problem ends up
    /// in the returned result's status.
    pub async fn execute(&self, request_number: u64) -> RequestResult {
        let _in_flight = self.active.enter();
        let logger = self.logger.new(o!("request" => request_number));

        if self.interrupted.interrupted() {
            let result = RequestResult::failed(request_number, FailureReason::Cancelled);
            self.log(&logger, &result);
            return result;
        }

        let invocation = self
            .command
            .invocation(request_number, self.files.trace(request_number));
        let stopwatch = Stopwatch::new();
        let outcome = tokio::select! {
            out = self.transport.invoke(&invocation) => Some(out),
            _ = self.interrupted.cancelled() => None,
        };
        let elapsed = stopwatch.elapsed();
        let trace = self.traces.parse_file(&invocation.trace_path);

        let mut result = RequestResult::failed(request_number, FailureReason::Cancelled);
        result.elapsed_time = Some(elapsed);
        result.trace = trace;

        match outcome {
            None => {}
            Some(Err(e)) => result.failure = Some(FailureReason::Spawn(e.to_string())),
            Some(Ok(out)) if !out.success() => {
                result.failure = Some(FailureReason::Exit(out.exit_code));
            }
            Some(Ok(out)) => match out.stdout.parse::<WriteOut>() {
                Err(e) => result.failure = Some(FailureReason::Output(e)),
                Ok(w) => {
                    result.connect_time = Some(w.connect);
                    result.handshake_time = Some(w.handshake);
                    result.total_time = Some(w.total);
                    result.http_status = w.http_status;
                    match w.http_status {
                        Some(code) if self.require_http_ok && code != 200 => {
                            result.failure = Some(FailureReason::HttpStatus(code));
                        }
                        _ => {
                            result.status = Status::Success;
                            result.failure = None;
                        }
                    }
                }
            },
        }

        self.record(&result);
        self.log(&logger, &result);
        result
    }

    fn record(&self, result: &RequestResult) {
        let m = &self.metrics;
        m.send_count(Metric::BytesSent, result.trace.bytes_sent);
        m.send_count(Metric::BytesReceived, result.trace.bytes_received);
        if result.trace.certificate_size > 0 {
            m.send_value(Metric::CertSize, result.trace.certificate_size);
        }
        if !result.is_success() {
            return;
        }
        let timings = [
            (Metric::Connect, result.connect_time),
            (Metric::Handshake, result.handshake_time),
            (Metric::Total, result.total_time),
            (Metric::Elapsed, result.elapsed_time),
        ];
        for (metric, d) in timings.iter() {
            if let Some(d) = d {
                m.send_elapsed(*metric, *d);
            }
        }
    }

    fn log(&self, logger: &Logger, r: &RequestResult) {
        let t = &r.trace;
        match &r.failure {
            None => info!(logger, "request succeeded";
                "connect" => ?r.connect_time,
                "handshake" => ?r.handshake_time,
                "total" => ?r.total_time,
                "elapsed" => ?r.elapsed_time,
                "http" => ?r.http_status,
                "sent" => t.bytes_sent,
                "received" => t.bytes_received,
                "kem" => &t.kem,
                "signature" => &t.signature_algorithm,
                "cert_size" => t.certificate_size),
            Some(reason) => error!(logger, "request failed: {}", reason;
                "elapsed" => ?r.elapsed_time,
                "sent" => t.bytes_sent,
                "received" => t.bytes_received),
        }
    }
}
