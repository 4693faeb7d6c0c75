use anyhow::{Context, Result};
use painel_vigilancia::{
    server::{self, AppState},
    Settings, SheetLoader,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // RUST_LOG wins over the configured level.
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    let loader = SheetLoader::http(settings.request_timeout(), settings.cache_ttl())
        .context("building HTTP client")?;
    info!(
        ttl_secs = settings.cache_ttl_secs,
        timeout_secs = settings.request_timeout_secs,
        overrides = settings.sheets.len(),
        "sheet loader ready"
    );

    server::serve(AppState::new(loader, settings)).await;
    Ok(())
}
