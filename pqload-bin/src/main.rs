mod config;
mod executor;
mod interrupt;
mod orchestrator;
mod reporting;
mod sampler;
mod session;

use crate::config::Config;
use crate::executor::FailureReason;
use crate::orchestrator::Benchmark;
use crate::sampler::SystemProbe;
use crate::session::RunId;
use anyhow::Error;
use clap::{value_t, App, Arg};
use pqload_client::ProcessTransport;
use slog::{info, o, Drain, Level};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn root_logger(level: Level) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().stdout().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let async_drain = slog_async::Async::new(drain).build().fuse();
    let level_filter = slog::LevelFilter(async_drain, level).fuse();
    slog::Logger::root(level_filter, o!())
}

fn run_benchmark(logger: slog::Logger, config: Config) -> Result<(), Error> {
    let interrupted = interrupt::register()?;
    let run_id = RunId::generate();
    let benchmark = Benchmark::new(
        config,
        run_id,
        Arc::new(ProcessTransport::new()),
        interrupted,
        logger.clone(),
    );
    info!(logger, "writing results to {}", benchmark.files().results.display());
    let active = benchmark.active();
    let rt = Runtime::new()?;
    let report = rt.block_on(benchmark.run(SystemProbe::new()))?;
    info!(logger, "all requests released"; "entered" => active.entered(), "in_flight" => active.current());
    let cancelled = report
        .results
        .iter()
        .filter(|r| r.failure == Some(FailureReason::Cancelled))
        .count();
    println!("Run {}: {}", report.run_id, report.summary);
    if cancelled > 0 {
        println!("{} requests cancelled", cancelled);
    }
    println!("Results: {}", report.results_path.display());
    if let Some(monitor) = report.monitor_path {
        println!("Resource samples: {}", monitor.display());
    }
    Ok(())
}

fn main() {
    let matches = App::new("pqload")
        .version("0.1")
        .about("Drive concurrent TLS requests against a post-quantum endpoint and record timings")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Path to config file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("n")
                .short("n")
                .value_name("REQUESTS")
                .help("Number of requests to dispatch")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("j")
                .short("j")
                .value_name("CONCURRENCY")
                .help("Maximum requests in flight")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("o")
                .short("o")
                .value_name("DIR")
                .help("Root directory for result, monitoring and trace files")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets verbosity level"),
        )
        .get_matches();

    let loaded = match matches.value_of("config") {
        Some(path) => Config::load(path),
        None => Config::defaults(),
    };
    let requests = if matches.is_present("n") {
        Some(value_t!(matches, "n", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let concurrency = if matches.is_present("j") {
        Some(value_t!(matches, "j", usize).unwrap_or_else(|e| e.exit()))
    } else {
        None
    };
    let output_root = matches.value_of("o").map(Path::new);
    let config = match loaded.and_then(|c| c.with_overrides(requests, concurrency, output_root)) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Could not load config: {}", e);
            std::process::exit(1);
        }
    };

    let level = match matches.occurrences_of("v") {
        0 => Level::Warning,
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => {
            eprintln!("WARNING: more than -vvv is ignored");
            Level::Trace
        }
    };
    let logger = root_logger(level);
    if let Err(e) = run_benchmark(logger, config) {
        eprintln!("Error running benchmark: {}", e);
        std::process::exit(1);
    }
}
