use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives: quiet unless `--verbose`; `RUST_LOG` always wins.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,colorizer=debug,colorizer_lib=debug"
    } else {
        "warn"
    }
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .try_init();
}
