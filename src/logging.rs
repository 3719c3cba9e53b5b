use anyhow::Context as _;

/// Default directives for the CLI.
pub const CLI_FILTER: &str = "info";

/// Default directives for the HTTP app; request spans come from `tower_http`.
pub const APP_FILTER: &str = "info,tower_http=debug";

/// Installs the stderr subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(default_filter)
            .with_context(|| format!("build log filter from {default_filter:?}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("install chapter log subscriber: {err}"))?;

    Ok(())
}
