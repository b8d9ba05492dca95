//! Realtime console client
//!
//! Run with:
//! ```bash
//! REALTIME_URL=ws://localhost:8080/ws cargo run -p spark-realtime -- <subject-id>
//! ```
//!
//! Configuration is loaded from environment variables. Commands are read
//! from stdin, inbound events are printed to stdout as JSON lines.

use spark_common::{
    try_init_tracing, try_init_tracing_with_config, AppConfig, AppError, AppResult, TracingConfig,
};
use spark_realtime::host::{self, ConsoleExit, JsonLinePrinter};
use spark_realtime::{ConnectionManager, EventListener};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// How long to wait for the close handshake on the way out
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, code = e.error_code(), "Realtime client failed");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> AppResult<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            if let Err(e) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {e}");
            }
            return Err(e.into());
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::from_app_config(&config)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let subject_id = std::env::args()
        .nth(1)
        .ok_or_else(|| AppError::invalid_input("usage: spark-realtime <subject-id>"))?;

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        endpoint = %config.realtime.endpoint,
        "Configuration loaded"
    );

    let manager = ConnectionManager::with_websocket(config.realtime)?;
    let printer: Arc<dyn EventListener> = Arc::new(JsonLinePrinter::new(std::io::stdout()));
    manager.add_listener(printer.clone());
    manager.connect(subject_id);

    let console = host::run_console(&manager, host::stdin_lines()?);
    let outcome = tokio::select! {
        result = console => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted");
            Ok(ConsoleExit::Quit)
        }
    };

    manager.remove_listener(&printer);
    manager.shutdown(CLOSE_GRACE).await;
    info!(?outcome, "Realtime client stopped");

    outcome.map(|_| ())
}
