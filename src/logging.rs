//! Log output setup.  Plain compact lines by default, JSON with
//! `--json-log`; `--verbose` lowers the filter to debug.  `MG_LOG` accepts a
//! full `tracing` filter directive for finer control.

use tracing_subscriber::EnvFilter;

pub fn init(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("MG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().without_time().init();
    }
}
