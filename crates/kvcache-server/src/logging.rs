//! `LoggingService` facade: `select(name) -> logger`, where the logger
//! accepts leveled formatted messages and the core must function when it
//! is a no-op. Built on `tracing`/`tracing-subscriber`, wrapped behind a
//! trait so the core never assumes a global subscriber is installed
//! (useful for the store/proto unit tests, which don't install one).

pub trait LoggingService: Send + Sync {
    fn select(&self, name: &'static str) -> Logger;
}

#[derive(Clone, Copy)]
pub struct Logger {
    scope: &'static str,
    enabled: bool,
}

impl Logger {
    pub fn info(&self, msg: impl std::fmt::Display) {
        if self.enabled {
            tracing::info!(scope = self.scope, "{msg}");
        }
    }

    pub fn warn(&self, msg: impl std::fmt::Display) {
        if self.enabled {
            tracing::warn!(scope = self.scope, "{msg}");
        }
    }

    pub fn error(&self, msg: impl std::fmt::Display) {
        if self.enabled {
            tracing::error!(scope = self.scope, "{msg}");
        }
    }
}

/// Real backend: every call goes through `tracing`'s global dispatcher.
pub struct TracingLoggingService;

impl LoggingService for TracingLoggingService {
    fn select(&self, name: &'static str) -> Logger {
        Logger {
            scope: name,
            enabled: true,
        }
    }
}

/// No-op backend: the core must run correctly against this.
pub struct NoopLoggingService;

impl LoggingService for NoopLoggingService {
    fn select(&self, name: &'static str) -> Logger {
        Logger {
            scope: name,
            enabled: false,
        }
    }
}
