//! Trading simulator driver
//!
//! Wires the full pipeline: a seeded generator thread feeds raw bytes over
//! an SPSC queue to the ingest thread, which parses them into order-book
//! mutations; strategies run as a continuation of each update and their
//! signals route into the execution engine, whose lifecycle reports land in
//! the append-only log file.

mod synth;

use anyhow::Result;
use clap::Parser;
use common::Side;
use config::ConfigStore;
use engine::ExecutionEngine;
use feeds::MarketDataHandler;
use logger::{LogLevel, Logger};
use metrics::Timekeeper;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use strategy::{StatArbStrategy, StrategyEngine};
use synth::FeedGenerator;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "sim")]
#[command(about = "Low-latency trading simulator over a synthetic feed")]
#[command(version)]
struct Args {
    /// Path to a `key = value` configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Synthetic messages per batch
    #[arg(long, default_value_t = 1_000)]
    batch_size: usize,

    /// Number of batches to run
    #[arg(long, default_value_t = 200)]
    batches: usize,

    /// Seed for the synthetic feed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Execution-report log file
    #[arg(long, default_value = "sim.log")]
    log_file: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let symbols = config.get("symbols").as_string_list();
    let buffer_size = usize::try_from(config.get("market_data.buffer_size").as_u64())?;
    let z_threshold = config.get("strategy.stat_arb.z_score_threshold").as_f64();
    let window = usize::try_from(config.get("strategy.stat_arb.window_size").as_u64())?;
    info!(
        symbols = symbols.len(),
        buffer_size, z_threshold, window, "configuration loaded"
    );

    let log = Arc::new(Logger::new(&args.log_file, LogLevel::Info)?);

    // Ingest: one book per configured symbol
    let mut handler = MarketDataHandler::new(buffer_size);
    for symbol in &symbols {
        handler.ensure_book(symbol);
    }

    // Execution: reports are journaled through the log sink
    let execution = Arc::new(ExecutionEngine::new(handler.top_registry()));
    let report_log = Arc::clone(&log);
    execution.set_execution_callback(Arc::new(move |report| {
        report_log.info(format!(
            "report: id={} status={:?} price={} exec={} leaves={} symbol={}",
            report.order_id,
            report.status,
            report.price,
            report.exec_quantity,
            report.leaves_quantity,
            report.symbol
        ));
    }));
    execution.start();

    // Strategies: stat-arb over the configured symbols, signals into the
    // execution engine on the ingest thread
    let strategies = Arc::new(Mutex::new(StrategyEngine::new()));
    {
        let mut engine = strategies.lock();
        engine.register_strategy(Box::new(StatArbStrategy::new(
            symbols.clone(),
            z_threshold,
            window,
        )));

        let submit = Arc::clone(&execution);
        let signal_log = Arc::clone(&log);
        engine.set_signal_callback(Box::new(move |signal| {
            let order_id = submit.submit_order(signal);
            signal_log.info(format!(
                "signal: {} {} qty={} conf={:.2} -> order {}",
                match signal.side {
                    Side::Buy => "BUY",
                    Side::Sell => "SELL",
                },
                signal.symbol,
                signal.quantity,
                signal.confidence,
                order_id
            ));
        }));
        engine.start();
    }

    let hook_strategies = Arc::clone(&strategies);
    handler.set_update_hook(Box::new(move |book| {
        hook_strategies.lock().process_order_book(book);
    }));

    run_feed(&mut handler, &args, symbols);

    // Shutdown order: strategies first, then execution, then the log sink
    strategies.lock().stop();
    execution.stop();
    log.stop();
    info!("shutdown complete");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<ConfigStore> {
    let config = ConfigStore::new();
    config.set("market_data.buffer_size", "1048576");
    config.set("symbols", "AAPL,MSFT,GOOG,AMZN");
    config.set("strategy.stat_arb.z_score_threshold", "2.0");
    config.set("strategy.stat_arb.window_size", "20");
    if let Some(path) = path {
        config.load_file(path)?;
    }
    Ok(config)
}

/// Generate batches on a producer thread and drain them through the ingest
/// ring, timing each batch
fn run_feed(handler: &mut MarketDataHandler, args: &Args, symbols: Vec<String>) {
    let (batch_tx, batch_rx) = bus::channel::<Vec<u8>>(64);
    let batches = args.batches;
    let batch_size = args.batch_size;
    let seed = args.seed;

    let producer = std::thread::spawn(move || {
        let mut generator = FeedGenerator::new(symbols, seed);
        for _ in 0..batches {
            let mut batch = Some(generator.batch(batch_size));
            while let Some(rejected) = batch.take().and_then(|b| batch_tx.try_push(b).err()) {
                batch = Some(rejected);
                std::thread::yield_now();
            }
        }
    });

    let mut timer = Timekeeper::new(batches);
    let mut received = 0;
    let mut bytes_total = 0usize;
    while received < batches {
        let Some(batch) = batch_rx.try_pop() else {
            std::thread::yield_now();
            continue;
        };
        received += 1;
        bytes_total += batch.len();

        timer.start();
        let mut offset = 0;
        while offset < batch.len() {
            let accepted = handler.enqueue_bytes(&batch[offset..]);
            let drained = handler.drain();
            if accepted == 0 && drained == 0 {
                warn!("ingest ring stalled, dropping rest of batch");
                break;
            }
            offset += accepted;
        }
        timer.end();
    }

    if producer.join().is_err() {
        warn!("feed generator exited abnormally");
    }

    info!(
        batches = received,
        bytes = bytes_total,
        "feed complete; per-batch latency:\n{}",
        timer.summary()
    );
}
