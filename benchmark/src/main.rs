use clap::Parser;
use exchange::config::{DispatchMode, RuntimeConfig};
use exchange::{AccountId, LogNotifier, MatchEngine, OrderStatus, PlaceOrder};
use hdrhistogram::Histogram;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of concurrent clients
    #[arg(short, long, default_value = "4")]
    concurrency: usize,

    /// INTERVAL ms
    #[arg(short, long, default_value = "1")]
    interval: u64,

    /// Duration of the benchmark in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// Number of trading accounts
    #[arg(short, long, default_value = "100")]
    accounts: usize,

    /// Match dispatch: inline, queued or off
    #[arg(long, default_value = "inline")]
    dispatch: String,
}

fn dispatch_mode(name: &str) -> DispatchMode {
    match name {
        "queued" => DispatchMode::Queued,
        "off" => DispatchMode::Off,
        _ => DispatchMode::Inline,
    }
}

fn setup_accounts(engine: &MatchEngine, count: usize) -> Vec<AccountId> {
    let mut accounts = Vec::with_capacity(count);
    for _ in 0..count {
        let account_id = match engine.open_account(dec!(1000000000)) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Failed to open account: {}", e);
                continue;
            }
        };
        if let Err(e) = engine.deposit_asset(account_id, "BTC", dec!(1000000)) {
            eprintln!("Failed to deposit: {}", e);
        }
        accounts.push(account_id);
    }
    accounts
}

fn random_order(accounts: &[AccountId]) -> PlaceOrder {
    let mut rng = rand::thread_rng();
    let side = if rng.gen_bool(0.5) { "buy" } else { "sell" };
    // a narrow grid of prices and amounts so orders actually cross
    let price = Decimal::new(rng.gen_range(49_990..=50_010), 0);
    let amount = Decimal::new(rng.gen_range(1..=5), 3);
    PlaceOrder {
        account_id: accounts[rng.gen_range(0..accounts.len())],
        symbol: "BTC".to_string(),
        side: side.to_string(),
        price,
        amount,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::try_init().unwrap_or_default();
    let args = Args::parse();

    let config = RuntimeConfig {
        dispatch: dispatch_mode(&args.dispatch),
        ..RuntimeConfig::new()
    };
    let engine = Arc::new(MatchEngine::new(&config, Arc::new(LogNotifier)));
    let accounts = Arc::new(setup_accounts(&engine, args.accounts.max(1)));

    let histogram = Arc::new(Mutex::new(Histogram::<u64>::new(3)?));
    let total_requests = Arc::new(Mutex::new(0u64));
    let cancels = Arc::new(Mutex::new(0u64));

    println!(
        "Starting benchmark with {} concurrent clients, target INTERVAL: {}, dispatch {:?}",
        args.concurrency, args.interval, config.dispatch
    );

    // Spawn client tasks
    let interval = args.interval;
    let mut handles = vec![];
    for _ in 0..args.concurrency {
        let engine = engine.clone();
        let accounts = accounts.clone();
        let histogram = histogram.clone();
        let total_requests = total_requests.clone();
        let cancels = cancels.clone();

        let handle = tokio::spawn(async move {
            loop {
                let request = random_order(&accounts);
                let start = Instant::now();
                let engine_ref = engine.clone();
                let placed =
                    tokio::task::spawn_blocking(move || engine_ref.place_order(&request)).await;

                match placed {
                    Ok(Ok(order)) => {
                        let duration = start.elapsed();
                        let mut hist = histogram.lock().await;
                        if let Err(e) = hist.record(duration.as_micros() as u64) {
                            eprintln!("Failed to record latency: {}", e);
                        }
                        drop(hist);
                        *total_requests.lock().await += 1;

                        // cancel some of the orders left on the book
                        if rand::random::<u8>() < 32 {
                            let still_open = engine
                                .order(order.id)
                                .map_or(false, |o| o.status == OrderStatus::Open);
                            if still_open && engine.cancel_order(order.id).is_ok() {
                                *cancels.lock().await += 1;
                            }
                        }
                    }
                    Ok(Err(e)) => eprintln!("Request failed: {}", e),
                    Err(e) => eprintln!("Request task failed: {}", e),
                }

                tokio::time::sleep(Duration::from_millis(interval)).await;
            }
        });

        handles.push(handle);
    }

    // Run for specified duration
    sleep(Duration::from_secs(args.duration)).await;

    // Cancel all tasks
    for handle in handles {
        handle.abort();
    }

    let report = engine.run_match_sweep();
    engine.shutdown();

    // Print statistics
    let total = *total_requests.lock().await;
    let hist = histogram.lock().await;

    println!("\nBenchmark Results:");
    println!("Total Requests: {}", total);
    println!("Average TPS: {:.2}", total as f64 / args.duration as f64);
    println!("Trades: {}", engine.trades().len());
    println!("Cancels: {}", *cancels.lock().await);
    println!(
        "Final sweep: examined {}, matched {}, failed {}",
        report.examined, report.matched, report.failed
    );
    println!("\nLatency Distribution (microseconds):");
    println!("p50: {}", hist.value_at_percentile(50.0));
    println!("p90: {}", hist.value_at_percentile(90.0));
    println!("p95: {}", hist.value_at_percentile(95.0));
    println!("p99: {}", hist.value_at_percentile(99.0));
    println!("p99.9: {}", hist.value_at_percentile(99.9));

    Ok(())
}
