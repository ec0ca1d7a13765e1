//! Subscriber setup for the binary.
//!
//! `TICKGRAB_LOG` takes precedence over `RUST_LOG`; both fall back to `info`.
//! `TICKGRAB_LOG_FORMAT=json` switches to one JSON object per line.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Plain,
    Json,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        }
    }
}

/// Install the global subscriber. A second call is ignored.
pub fn init() {
    let directive = directive(non_empty_var("TICKGRAB_LOG"), non_empty_var("RUST_LOG"));
    let format = LogFormat::parse(non_empty_var("TICKGRAB_LOG_FORMAT").as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
}

fn directive(own: Option<String>, rust_log: Option<String>) -> String {
    own.or(rust_log)
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
