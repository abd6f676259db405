use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("fatal: {0}")]
    Fatal(String),
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: &str) -> Result<(), BootError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "{level},v2scrape={level},reqwest=warn,hyper=warn,html5ever=error,selectors=error"
        ))
        .map_err(|e| BootError::Fatal(format!("log filter: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| BootError::Fatal(format!("logging already initialized: {e}")))
}
