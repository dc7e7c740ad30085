use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let cfg = tasknest::config::Config::from_env()?;
    info!(
        target: "tasknest",
        "tasknest starting: http_port={}, db='{}', session_ttl_secs={}",
        cfg.http_port,
        cfg.db_path,
        cfg.session_ttl.as_secs()
    );

    tasknest::server::run_with_config(cfg).await
}
