//! Fetch a URL with peer-id authentication and print who answered.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use http::{Method, Request};

use peerauth_client::{ClientAuthenticator, ClientConfig, ReqwestTransport};
use peerauth_crypto::PeerId;

#[derive(Parser, Debug)]
#[command(name = "peerauth-fetch")]
#[command(version, about = "Authenticated HTTP request to a peer-id server")]
struct Cli {
    /// URL to fetch
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// Expected server peer id (hex); the handshake fails on any other
    #[arg(long, env = "PEERAUTH_EXPECT_PEER")]
    expect_peer: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("loading client configuration")?;

    let identity = Arc::new(config.identity()?);
    let transport = ReqwestTransport::new(config.request_timeout())?;
    let mut client = ClientAuthenticator::new(identity, transport).with_cache_capacity(config.cache_capacity()?);
    if let Some(expected) = &cli.expect_peer {
        let expected: PeerId = expected.parse().context("parsing --expect-peer")?;
        client = client.with_peer_verifier(Arc::new(move |peer: &PeerId| *peer == expected));
    }

    let method: Method = cli.method.to_ascii_uppercase().parse().context("parsing method")?;
    let request = Request::builder()
        .method(method)
        .uri(&cli.url)
        .body(cli.data.map(Bytes::from).unwrap_or_default())
        .context("building request")?;

    let result = client.authenticated_request(request).await?;
    println!("server peer id: {}", result.server);
    println!("status: {}", result.response.status());
    println!();
    println!("{}", String::from_utf8_lossy(result.response.body()));

    Ok(())
}
