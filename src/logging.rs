//! Logging setup: JSONL file + pretty stderr, with a per-tool-call correlation id.
//!
//! Grounded on the teacher's `logging.rs` subscriber-construction and correlation-id
//! pattern. The teacher's GPUI-render-loop instrumentation (scroll/frame-perf counters) has
//! no counterpart here and was not carried over.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

thread_local! {
    static CORRELATION_ID: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// RAII guard that scopes a correlation id to the current thread for the lifetime of one
/// tool invocation (`perceive`/`act`/`remember`), mirroring the teacher's per-HTTP-request
/// scoping.
pub struct CorrelationGuard {
    previous: Option<String>,
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        CORRELATION_ID.with(|c| *c.borrow_mut() = self.previous.take());
    }
}

pub fn set_correlation_id(id: impl Into<String>) -> CorrelationGuard {
    let previous = CORRELATION_ID.with(|c| c.borrow_mut().replace(id.into()));
    CorrelationGuard { previous }
}

pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.with(|c| c.borrow().clone())
}

/// Truncates a request/response payload for debug logging without dumping megabytes of
/// base64 screenshot data into the log file.
pub fn summarize_payload(s: &str) -> String {
    const MAX: usize = 500;
    if s.len() <= MAX {
        s.to_string()
    } else {
        format!("{}...<{} bytes total>", &s[..MAX], s.len())
    }
}

struct LoggingGuard {
    _file_guard: WorkerGuard,
}

static LOGGING_GUARD: OnceLock<LoggingGuard> = OnceLock::new();

/// Idempotent logging init. Safe to call multiple times (e.g. once from `main`, once from
/// each integration test) — only the first call installs the subscriber.
pub fn init(log_dir: &std::path::Path) {
    if LOGGING_GUARD.get().is_some() {
        return;
    }

    let _ = std::fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "nexus-agent.jsonl");
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_span_events(FmtSpan::NONE)
        .with_current_span(false);

    let pretty_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();

    if result.is_err() {
        // Another subscriber is already installed (e.g. a test harness). Not fatal.
        return;
    }

    let _ = LOGGING_GUARD.set(LoggingGuard {
        _file_guard: file_guard,
    });

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "panic");
    }));
}

/// Default log directory: `~/.nexus/logs`, matching the control-channel's `~/.nexus` home.
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nexus")
        .join("logs")
}
