use std::io::IsTerminal as _;

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Filter override, in `RUST_LOG` syntax. Replaces the verbosity-derived filter.
pub const LOG_FILTER_ENV: &str = "CONNECTOR_LOG";

const CONNECTOR_TARGETS: [&str; 5] = [
    "connector",
    "connector_core",
    "connector_dify",
    "connector_ragflow",
    "connector_tools",
];

/// Maps `-q` / repeated `-v` flags to a level. Warnings are shown by default.
pub fn verbosity_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn level_name(level: LevelFilter) -> &'static str {
    if level == LevelFilter::OFF {
        "off"
    } else if level == LevelFilter::ERROR {
        "error"
    } else if level == LevelFilter::WARN {
        "warn"
    } else if level == LevelFilter::INFO {
        "info"
    } else if level == LevelFilter::DEBUG {
        "debug"
    } else {
        "trace"
    }
}

/// Connector crates log at `level`; dependencies (reqwest, hyper) never go
/// below warn, so `-vv` shows our request flow without connection-pool noise.
fn directives(level: LevelFilter) -> String {
    let base = if level == LevelFilter::OFF || level == LevelFilter::ERROR {
        level_name(level)
    } else {
        "warn"
    };
    let mut out = base.to_string();
    for target in CONNECTOR_TARGETS {
        out.push(',');
        out.push_str(target);
        out.push('=');
        out.push_str(level_name(level));
    }
    out
}

/// Installs the process-wide log subscriber once.
///
/// Logs go to stderr without timestamps, colored only on a terminal; stdout
/// stays reserved for command output and streamed answers. `CONNECTOR_LOG`
/// replaces the filter derived from `level` when it parses. Library code only
/// emits `tracing` events and never calls this.
pub fn init_observability(level: LevelFilter) {
    INIT.get_or_init(|| {
        let filter = std::env::var(LOG_FILTER_ENV)
            .ok()
            .and_then(|raw| EnvFilter::try_new(raw).ok())
            .unwrap_or_else(|| EnvFilter::new(directives(level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .without_time()
            .compact()
            .try_init();
    });
}
