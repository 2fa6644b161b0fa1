use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let ax = pixgram::build()?;

    let host = ax.get("http.host").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = ax.get("http.port").unwrap_or_else(|| "3030".to_string());

    let addr = format!("{host}:{port}");

    ax.listen(addr).await?;

    Ok(())
}
