//! Logging setup.
//!
//! Diagnostics go through the `log` facade to an `env_logger` backend on
//! stderr; stdout is reserved for results. The level comes from, in order:
//!
//! 1. `RUST_LOG`, when set
//! 2. `-q` (errors only) or `-v`/`-vv` (debug/trace)
//! 3. Otherwise info
//!
//! Per-file fingerprint failures are logged at `warn`, cache statistics and
//! pipeline parameters at `debug`, individual transform steps at `trace`.
//!
//! ```rust,no_run
//! use imgprint::logging::init_logging;
//!
//! init_logging(1, false);
//! log::debug!("visible with -v");
//! ```

use std::env;
use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Install the global logger. Later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let from_env = env::var_os("RUST_LOG").is_some();

    let mut builder = Builder::new();
    builder.target(Target::Stderr);
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    let detailed = verbose >= 2;
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        if detailed {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("imgprint"),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{style}{}{style:#}: {}",
                record.level().as_str().to_lowercase(),
                record.args()
            )
        }
    });

    if builder.try_init().is_ok() {
        log::trace!(
            "Logging initialized ({})",
            if from_env { "RUST_LOG" } else { "flags" }
        );
    }
}

/// Level selected by the command-line flags.
#[must_use]
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}
