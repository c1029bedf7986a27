pub mod classify;
pub mod cli;
pub mod commands;
pub mod data;
pub mod error;
pub mod inference;
pub mod intake;
pub mod io_utils;
pub mod model;
pub mod naming;
pub mod parse;
pub mod pipeline;
pub mod somatometria;
pub mod stats;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};
use crate::store::JsonStore;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Opening store at {:?}", cli.store);
    let store = JsonStore::open(&cli.store)
        .with_context(|| format!("Opening store at {:?}", cli.store))?;
    match &cli.command {
        Commands::Ingest(args) => commands::ingest(&store, store.root(), args),
        Commands::Uploads(args) => commands::uploads(&store, args),
        Commands::Show(args) => commands::show(&store, args),
        Commands::Rows(args) => commands::rows(&store, args),
        Commands::Somatometria(args) => commands::somatometria(&store, args),
        Commands::Stats(args) => commands::stats(&store, args),
        Commands::Clear => commands::clear(&store),
    }
}
