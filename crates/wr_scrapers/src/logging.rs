use std::fmt::Display;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Tags log lines of one pipeline run, e.g. `[album:123] Album page 2 failed`.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    scope: String,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        if !self.scope.is_empty() {
            self.scope.push(' ');
        }
        self.scope.push_str(prefix.as_ref());
        self
    }

    pub fn format(&self, message: impl Display) -> String {
        if self.scope.is_empty() {
            message.to_string()
        } else {
            format!("{} {}", self.scope, message)
        }
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!("{}", self.format(message));
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!("{}", self.format(message));
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!("{}", self.format(message));
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!("{}", self.format(message));
    }
}

/// Installs the global subscriber once, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
