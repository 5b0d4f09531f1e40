use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

/// Install the tracing subscriber: stdout formatting plus `RUST_LOG`
/// filtering. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}
