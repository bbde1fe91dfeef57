pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod lookup;
pub mod pipeline;
pub mod reconcile;
pub mod render;
pub mod schema;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, LookupArgs, SearchArgs, ShowArgs},
    config::Config,
    lookup::Record,
    pipeline::{Pipeline, Snapshot},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("store_lookup", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    info!(
        "Using {} source(s): {}",
        config.sources.len(),
        config.sources.iter().map(|s| s.kind).join(", ")
    );
    let pipeline = Pipeline::new(config)?;
    let snapshot = pipeline.snapshot();
    match &cli.command {
        Commands::Lookup(args) => handle_lookup(&snapshot, args, cli.json),
        Commands::Search(args) => handle_search(&snapshot, args, cli.json),
        Commands::Summary => handle_summary(&snapshot, cli.json),
        Commands::Show(args) => handle_show(&snapshot, args, cli.json),
    }
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Loading config {path:?}"))?,
        None => Config::default(),
    };
    config.merge_sources(cli.sources.clone());
    config.prepend_key_aliases(cli.key_aliases.clone());
    if let Some(ttl) = cli.ttl {
        config.ttl_secs = ttl;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if cli.input_encoding.is_some() {
        config.input_encoding = cli.input_encoding.clone();
    }
    debug!("Effective config: {config:?}");
    Ok(config)
}

fn handle_lookup(snapshot: &Snapshot, args: &LookupArgs, json: bool) -> Result<()> {
    let table = snapshot.unified();
    let record = match &args.column {
        Some(column) => {
            lookup::find_exact_in(table, &schema::normalize_column_name(column), &args.store)
        }
        None => lookup::find_exact(table, &args.store),
    };
    if json {
        let output = serde_json::json!({ "store": args.store.trim(), "record": record });
        return print_json(&output);
    }
    if table.is_empty() {
        println!("No data available.");
        return Ok(());
    }
    match record {
        Some(record) => {
            println!("Store {} found.", args.store.trim());
            print!("{}", render::render_record(&record));
        }
        None => println!("Store {} not found. Check the number.", args.store.trim()),
    }
    Ok(())
}

fn handle_search(snapshot: &Snapshot, args: &SearchArgs, json: bool) -> Result<()> {
    let table = snapshot.unified();
    let records = lookup::find_contains(table, &args.query);
    if json {
        return print_json(&records);
    }
    if table.is_empty() {
        println!("No data available.");
        return Ok(());
    }
    if records.is_empty() {
        println!("No stores match '{}'.", args.query);
        return Ok(());
    }
    print!("{}", render::render_records(table.columns(), &records));
    info!("{} store(s) matched '{}'", records.len(), args.query);
    Ok(())
}

fn handle_summary(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "summary": snapshot.reconciliation.summary,
            "warnings": snapshot.reconciliation.warnings,
            "sources": snapshot.sources,
        });
        return print_json(&output);
    }
    print!("{}", render::render_summary(snapshot));
    Ok(())
}

fn handle_show(snapshot: &Snapshot, args: &ShowArgs, json: bool) -> Result<()> {
    let table = snapshot.unified();
    let limit = args.limit.unwrap_or(usize::MAX);
    let records = table
        .rows()
        .iter()
        .take(limit)
        .map(|row| Record::new(table.columns(), row))
        .collect::<Vec<_>>();
    if json {
        return print_json(&records);
    }
    if table.is_empty() {
        println!("No data available.");
        return Ok(());
    }
    if records.len() == table.row_count() {
        print!("{}", render::render_full_table(table));
    } else {
        print!("{}", render::render_records(table.columns(), &records));
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Serializing JSON output")?;
    println!("{rendered}");
    Ok(())
}
