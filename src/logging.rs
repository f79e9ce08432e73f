use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "TASKBOARD_LOG";

const DEFAULT_FILTER: &str = "warn";

/// Pick the filter: `TASKBOARD_LOG`, then the configured directives, then
/// `warn`. Unparseable directives fall through to the next source.
pub fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| match configured {
            Some(directives) => EnvFilter::try_new(directives),
            None => EnvFilter::try_new(DEFAULT_FILTER),
        })
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a compact stderr subscriber. Later calls are no-ops.
pub fn init(configured: Option<&str>) {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter(configured))
        .with(console_layer)
        .try_init()
        .ok();
}
