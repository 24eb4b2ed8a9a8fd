use absterco_core::AppConfig;
use absterco_server::config::ENV_PREFIX;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real deployments use the process environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::from_env(ENV_PREFIX).snapshot();
    let app = absterco_server::build(&cfg).await?;
    let addr = app.state.server.addr();
    app.listen(addr).await?;

    Ok(())
}
