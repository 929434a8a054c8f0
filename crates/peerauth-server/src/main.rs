use anyhow::Context;

use peerauth_server::{PeerAuthServer, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load().context("loading configuration")?;

    let server = PeerAuthServer::new(config).context("building server")?;
    server.start().await?;

    Ok(())
}
