//! Tracing setup for hosts embedding the engine.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise the
/// engine crates log at debug and everything else at info.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,cs_engine=debug,cs_stream=debug,cs_assistant=debug")
            }),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
