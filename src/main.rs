//! rfmforge: RFM customer segmentation CLI
//!
//! Loads a transaction CSV, scores and segments every customer, and prints
//! the KPI summary and leaderboard.

use anyhow::{Context, Result};
use clap::Parser;
use rfmforge::{compute_segmentation, load_transactions, read_headers, report, Args};
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();

    let headers = read_headers(&args.input)
        .with_context(|| format!("Failed to read headers from {}", args.input))?;
    let mapping = args.column_mapping(&headers)?;
    info!(
        customer = %mapping.customer_id,
        date = %mapping.transaction_date,
        amount = %mapping.order_value,
        invoice = mapping.invoice_no.as_deref().unwrap_or("-"),
        "Using column mapping"
    );

    let config = args.scoring_config()?;
    let weights = config.weights;
    if weights.recency == 0 {
        warn!("Recency weight is 0: loyal and lost customers cannot be told apart");
    } else if weights.frequency == 0 {
        info!("Frequency weight is 0: scoring ignores purchase counts");
    } else if weights.monetary == 0 {
        info!("Monetary weight is 0: scoring focuses on engagement only");
    }

    let table = load_transactions(&args.input, &mapping)?;
    info!(
        rows = table.transactions.len(),
        dropped = table.dropped_rows,
        "Loaded transactions from {}",
        args.input
    );

    let segmentation = compute_segmentation(&table.transactions, &config)?;
    debug!(elapsed = ?start_time.elapsed(), "Scoring finished");

    if args.json {
        println!("{}", report::to_json(&segmentation)?);
    } else {
        println!(
            "Weighting factors: R={}, F={}, M={} ({} bins)\n",
            weights.recency, weights.frequency, weights.monetary, config.bin_count
        );
        println!("{}", report::render_summary(&segmentation));
        println!("=== Customer Leaderboard ===");
        print!("{}", report::render_leaderboard(&segmentation, args.top));
    }

    info!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Initialize tracing on stderr, filtered by RFMFORGE_LOG
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("RFMFORGE_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
