//! Process-wide `tracing` setup for the server binary.
//!
//! - `STUDIO_OBSERVABILITY`: `off`/`0`/`false` disables logging (default on).
//! - `STUDIO_LOG_LEVEL`: filter directive, e.g. `debug` or `studio_harness=trace`.
//!   Falls back to `RUST_LOG`, then [`DEFAULT_FILTER`].
//! - `STUDIO_JSON_LOG_PATH`: write JSONL to this file instead of stdout.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

pub const DEFAULT_FILTER: &str = "info,tower_http=info";
const DEFAULT_LOG_FILE: &str = "studio.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stdout.
    Stdout,
    /// One JSON object per line, appended to `dir/file_name`.
    JsonFile { dir: PathBuf, file_name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    pub filter: String,
    pub sink: LogSink,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup` so they can be computed without
    /// touching the process environment.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let enabled = set("STUDIO_OBSERVABILITY").is_none_or(|v| !is_off(&v));
        let filter = ["STUDIO_LOG_LEVEL", "RUST_LOG"]
            .into_iter()
            .filter_map(|key| set(key))
            .find(|directive| EnvFilter::try_new(directive).is_ok())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let sink = set("STUDIO_JSON_LOG_PATH")
            .map(|raw| json_sink(Path::new(raw.trim())))
            .unwrap_or(LogSink::Stdout);
        Self {
            enabled,
            filter,
            sink,
        }
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off" | "disabled"
    )
}

fn json_sink(path: &Path) -> LogSink {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    LogSink::JsonFile { dir, file_name }
}

/// Installs the global subscriber once. The returned guard flushes the
/// file writer on drop and must live as long as the process logs.
pub fn init_observability(settings: &LogSettings) -> Option<WorkerGuard> {
    let mut guard = None;
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }
        let filter = EnvFilter::new(&settings.filter);
        match &settings.sink {
            LogSink::Stdout => {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_target(false),
                    )
                    .try_init();
            }
            LogSink::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(dir);
                let (writer, worker) =
                    tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_target(false)
                            .with_writer(writer),
                    )
                    .try_init();
                guard = Some(worker);
            }
        }
    });
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::resolve(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_enabled_stdout() {
        assert_eq!(
            resolve(&[]),
            LogSettings {
                enabled: true,
                filter: DEFAULT_FILTER.to_string(),
                sink: LogSink::Stdout,
            }
        );
        assert!(!resolve(&[("STUDIO_OBSERVABILITY", " Off ")]).enabled);
        assert!(resolve(&[("STUDIO_OBSERVABILITY", "maybe")]).enabled);
    }

    #[test]
    fn studio_level_wins_over_rust_log() {
        let settings = resolve(&[("STUDIO_LOG_LEVEL", "debug"), ("RUST_LOG", "warn")]);
        assert_eq!(settings.filter, "debug");
        let settings = resolve(&[("STUDIO_LOG_LEVEL", " "), ("RUST_LOG", "warn")]);
        assert_eq!(settings.filter, "warn");
    }

    #[test]
    fn json_path_splits_into_dir_and_file() {
        assert_eq!(
            resolve(&[("STUDIO_JSON_LOG_PATH", "logs/studio.jsonl")]).sink,
            LogSink::JsonFile {
                dir: PathBuf::from("logs"),
                file_name: "studio.jsonl".into()
            }
        );
        assert_eq!(
            resolve(&[("STUDIO_JSON_LOG_PATH", "bare.jsonl")]).sink,
            LogSink::JsonFile {
                dir: PathBuf::from("."),
                file_name: "bare.jsonl".into()
            }
        );
    }
}
