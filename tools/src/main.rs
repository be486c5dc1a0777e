//! tally-runner: headless trigger for daily indicator tally generation.
//!
//! Usage:
//!   tally-runner --db reporting.db --data-dir ./data
//!   tally-runner --db reporting.db --as-of 2019-12-11 --policy advance-on-full-success

use anyhow::Result;
use tally_core::{
    clock::SystemClock,
    config::{CheckpointPolicy, ReportingConfig},
    generator::{RunSummary, TallyGenerator},
    store::ReportStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let as_of = arg_value(&args, "--as-of");
    let json = args.iter().any(|a| a == "--json");

    let mut config = ReportingConfig::load(data_dir)?;
    if let Some(policy) = arg_value(&args, "--policy") {
        config.generator.checkpoint_policy = policy
            .parse::<CheckpointPolicy>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    if !json {
        println!("tally-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  as_of:     {}", as_of.unwrap_or("(stored checkpoint)"));
        println!("  policy:    {:?}", config.generator.checkpoint_policy);
        println!();
    }

    let store = ReportStore::open(db)?;
    store.migrate()?;
    let seeded = store.seed_indicator_definitions(&config.definitions)?;
    log::info!("catalog seeded: {seeded:?}");

    let clock = SystemClock;
    let generator = TallyGenerator::new(&store, &clock, config.generator.clone());
    let summary = generator.generate_daily_indicator_tallies(as_of)?;

    if json {
        print_json(&store)?;
    } else {
        print_summary(&store, &summary)?;
    }
    Ok(())
}

fn print_summary(store: &ReportStore, summary: &RunSummary) -> Result<()> {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:       {}", summary.run_id);
    println!("  dates:        {}", summary.dates.len());
    println!("  attempted:    {}", summary.attempted);
    println!("  persisted:    {}", summary.persisted);
    println!("  failed:       {}", summary.failures.len());
    println!("  cache hits:   {}", summary.cache_hits);
    println!(
        "  checkpoint:   {}",
        summary.checkpoint.as_deref().unwrap_or("(unchanged)")
    );
    for f in &summary.failures {
        println!("    ! {} {}: {}", f.date, f.indicator_code, f.reason);
    }

    println!();
    println!("=== DAILY TALLIES (last 7 days) ===");
    let days = store.indicators_daily_tallies()?;
    if days.is_empty() {
        println!("  (No tallies stored yet)");
    }
    let skip = days.len().saturating_sub(7);
    for day in days.iter().skip(skip) {
        println!("  {}", day.date);
        for tally in day.tallies.values() {
            println!(
                "    {:<12} {:<20} {:>10.0}",
                tally.indicator_code,
                tally.sub_key.as_deref().unwrap_or(""),
                tally.value
            );
        }
    }
    Ok(())
}

fn print_json(store: &ReportStore) -> Result<()> {
    let days = store.indicators_daily_tallies()?;
    let out: Vec<serde_json::Value> = days
        .iter()
        .map(|day| {
            let tallies: Vec<_> = day.tallies.values().collect();
            serde_json::json!({ "date": day.date, "tallies": tallies })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
