//! Tracing subscriber setup.
//!
//! Everything is written to stderr; stdout carries `list` output only.

use std::time::{Duration, Instant};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Default)]
pub struct LogConfig {
    /// One JSON object per event instead of human-readable lines
    pub json: bool,
    /// Debug-level events from this crate
    pub verbose: bool,
}

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `verbose`.
pub fn init(config: LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.verbose)));

    let json = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(false)
    });
    let text = (!config.json).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "haste=debug" } else { "haste=info" }
}

/// Lets a progress line through at most once per interval.
///
/// Owned by the single task that reports progress, so plain `&mut self`.
pub struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True on the first call and whenever `interval` has passed since the
    /// last `true`.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
