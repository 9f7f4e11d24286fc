//! PhotoMuse - AI-assisted photo editing, image generation and chat
//!
//! Main entry point for the terminal application.
//!
//! # Execution Flow
//!
//! 1. Parse command line arguments
//! 2. Load settings from `PhotoMuse Data/PhotoMuse Config.yaml` (+ `PHOTOMUSE_*` env)
//! 3. Initialize logging → logs/photomuse.<date>
//! 4. Create tokio runtime
//! 5. Create the Gemini client and the StudioController (opens the chat session)
//! 6. Run the shell until `quit` or end of input
//! 7. Log the metrics summary and shut the runtime down with a 5s timeout
//!
//! # API Key
//!
//! Read from `GEMINI_API_KEY`, `GOOGLE_API_KEY` or `API_KEY`. Without one the
//! application still starts; every remote action reports the missing key.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use photomuse::logging::{self, LOG_PREFIX};
use photomuse::services::api_key_from_env;
use photomuse::ui::{Shell, spawn_status_printer};
use photomuse::{APP_NAME, ConfigManager, GeminiClient, StudioController, VERSION};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "photomuse", version, about = "Edit, analyze and generate images with Gemini")]
struct Args {
    /// Directory holding `PhotoMuse Config.yaml`
    #[arg(long, default_value = "PhotoMuse Data")]
    config_dir: Utf8PathBuf,

    /// Verbose logging (overrides `debug_mode` in the settings file)
    #[arg(long)]
    debug: bool,

    /// Log to the file only
    #[arg(long)]
    no_console_log: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = ConfigManager::new(&args.config_dir)?;
    let seeded = config_manager.save_default_if_missing()?;
    let settings = config_manager.load_settings()?;

    let debug_mode = args.debug || settings.debug_mode;
    let _log_guard = logging::setup_logging_with_console(
        &settings.log_dir,
        LOG_PREFIX,
        debug_mode,
        !args.no_console_log,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    if seeded {
        tracing::info!("Wrote default settings to {}", config_manager.settings_path());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("photomuse-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 2);

    let client = GeminiClient::new(&settings, api_key_from_env())
        .context("Failed to create Gemini client")?;
    let studio = StudioController::from_settings(Arc::new(client), &settings);
    let metrics = Arc::clone(studio.metrics());
    let shell = Shell::new(studio);

    let result = runtime.block_on(async {
        let printer = spawn_status_printer(shell.studio().state());
        let result = shell.run().await;
        printer.abort();
        result
    });

    tracing::info!("Shell closed, shutting down");
    metrics.log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");

    result.inspect_err(|e| tracing::error!("Shell error: {:#}", e))
}
