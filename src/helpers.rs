use std::time::Duration;

use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

/// Render an error chain for the console: `Error: outer: inner: ...`.
pub fn fmt_error(err: &anyhow::Error) -> String {
    format!("{} {err:#}", "Error:".red().bold())
}

/// clap value parser for `--poll-interval` / `--retry-delay`.
pub fn parse_seconds(ascii: &str) -> Result<Duration, String> {
    ascii
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| format!("`{ascii}` is not a whole number of seconds"))
}

/// Filter directives for `verbosity` `-v` flags. Without any, a non-empty
/// `RUST_LOG` is used as is; an explicit `-v` always wins over it.
fn filter_directives(
    verbosity: u8,
    rust_log: Option<String>,
) -> String {
    let level = match verbosity {
        0 => {
            if let Some(directives) = rust_log.filter(|value| !value.trim().is_empty()) {
                return directives;
            }
            "warn"
        }
        1 => "glacier_purge=info,warn",
        2 => "glacier_purge=debug,info",
        _ => "debug",
    };

    level.to_owned()
}

pub fn log_filter(verbosity: u8) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    EnvFilter::builder().parse_lossy(filter_directives(verbosity, rust_log))
}

/// Diagnostics go to stderr so stdout only carries status lines.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
