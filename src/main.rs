mod types;
mod error;
mod ml;
mod engine;
mod config;
mod web;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use engine::{spawn_persistence_writer, EngineHandle, ModelSource, PersistOptions, PredictionEngine};
use ml::{FileStore, PersistedModel, StateStore};
use web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "baccarat-predictor")]
#[command(version = "0.1.0")]
#[command(about = "Predicts the next Banker/Player/Tie result from the last two", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "predictor.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the prediction web app
    Serve {
        /// Port override (default from config: 10000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Predict the next result from a history log, without starting the server
    Predict {
        /// History CSV (previous,current rows); defaults to the configured log
        #[arg(long)]
        history: Option<String>,
    },
    /// Fit the model on a history log and write the model file
    Train {
        /// History CSV (previous,current rows); defaults to the configured log
        #[arg(long)]
        history: Option<String>,
    },
    /// Write the default configuration to a TOML file
    InitConfig {
        #[arg(short, long, default_value = "predictor.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Baccarat Predictor v0.1.0");

    if let Commands::InitConfig { output } = &cli.command {
        return crate::config::write_default_config(output);
    }

    let app_config = crate::config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            run_server(app_config, port).await?;
        }
        Commands::Predict { history } => {
            run_offline_predict(app_config, history)?;
        }
        Commands::Train { history } => {
            run_offline_train(app_config, history)?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Build an engine from persisted state. Missing or corrupt files fall back
/// to an empty history and an untrained predictor.
fn seed_engine(app_config: &AppConfig, store: &dyn StateStore, load_model: bool) -> PredictionEngine {
    let mut engine = PredictionEngine::new(app_config.model.forest_params());

    let history = match store.load_history() {
        Ok(history) => history,
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    };

    let model = if load_model {
        match store.load_model() {
            Ok(model) => model,
            Err(e) => {
                warn!("Ignoring model file: {}", e);
                None
            }
        }
    } else {
        None
    };

    match engine.seed(history, model.as_ref()) {
        ModelSource::Imported => info!("Using persisted model"),
        ModelSource::Refit => info!("Model refit from persisted history"),
        ModelSource::None => info!("Starting untrained ({} results)", engine.len()),
    }

    engine
}

async fn run_server(app_config: AppConfig, port: Option<u16>) -> Result<()> {
    let store: Arc<dyn StateStore> = Arc::new(FileStore::new(
        app_config.storage.history_csv.clone(),
        app_config.storage.model_path.clone(),
    ));

    let engine = seed_engine(&app_config, store.as_ref(), app_config.storage.persist_model);
    let (persist_tx, writer) = spawn_persistence_writer(Arc::clone(&store));

    let options = PersistOptions {
        save_model: app_config.storage.persist_model,
        clear_log_on_reset: app_config.storage.clear_log_on_reset,
    };
    let state = AppState::new(EngineHandle::with_persistence(engine, persist_tx, options));

    let port = port.unwrap_or(app_config.server.port);
    start_server(state, &app_config.server.host, port).await?;

    // The router (and with it every sender) is gone; let the writer drain
    match writer.await {
        Ok(jobs) => info!("Flushed persistence writer ({} jobs written)", jobs),
        Err(e) => warn!("Persistence writer ended abnormally: {}", e),
    }
    Ok(())
}

fn offline_store(app_config: &AppConfig, history: Option<String>) -> FileStore {
    let history_path: PathBuf = history
        .map(PathBuf::from)
        .unwrap_or_else(|| app_config.storage.history_csv.clone());
    FileStore::new(history_path, app_config.storage.model_path.clone())
}

fn run_offline_predict(app_config: AppConfig, history: Option<String>) -> Result<()> {
    let store = offline_store(&app_config, history);
    let engine = seed_engine(&app_config, &store, false);

    match engine.query() {
        Ok(prediction) => {
            let pct = prediction.percentages();
            info!("Prediction: {}", prediction.outcome);
            info!("  Banker: {:.2}%", pct[0]);
            info!("  Player: {:.2}%", pct[1]);
            info!("  Tie:    {:.2}%", pct[2]);
        }
        Err(e) => warn!("No prediction: {}", e),
    }
    Ok(())
}

fn run_offline_train(app_config: AppConfig, history: Option<String>) -> Result<()> {
    let store = offline_store(&app_config, history);
    let engine = seed_engine(&app_config, &store, false);

    let Some(samples) = engine.trained_samples() else {
        warn!("Not enough results to train ({} recorded, need 3)", engine.len());
        return Ok(());
    };

    let model = PersistedModel::new(engine.export_state()?, samples);
    store.save_model(&model)?;
    info!("Model trained on {} samples written to {}", samples, store.model_path().display());
    Ok(())
}
