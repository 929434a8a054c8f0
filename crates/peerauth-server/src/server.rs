use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use peerauth_crypto::PeerId;
use peerauth_proto::{ProtocolMetadata, PEER_ID_AUTH_PROTOCOL};

use crate::api::{create_router, whoami, AppState};
use crate::authenticator::ServerAuthenticator;
use crate::config::ServerConfig;
use crate::handler::authenticated;
use crate::metrics::AuthMetrics;
use crate::registry::WellKnownRegistry;

pub struct PeerAuthServer {
    config: ServerConfig,
    authenticator: Arc<ServerAuthenticator>,
    registry: Arc<WellKnownRegistry>,
    metrics: Arc<AuthMetrics>,
    shutdown_tx: watch::Sender<bool>,
}

impl PeerAuthServer {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let identity = Arc::new(config.identity()?);
        let metrics = Arc::new(AuthMetrics::new()?);
        let authenticator = ServerAuthenticator::new(identity)
            .with_challenge_ttl(config.challenge_ttl_secs)
            .with_token_ttl(config.token_ttl_secs)
            .with_hostname_predicate(config.hostname_predicate())
            .require_tls(config.require_tls)
            .trust_forwarded_proto(config.trust_forwarded_proto)
            .with_metrics(Arc::clone(&metrics));

        let mut registry = WellKnownRegistry::new();
        registry.register(PEER_ID_AUTH_PROTOCOL, ProtocolMetadata::new(config.protected_path.clone()));
        for entry in &config.protocols {
            registry.register(entry.id.clone(), entry.metadata());
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            authenticator: Arc::new(authenticator),
            registry: Arc::new(registry),
            metrics,
            shutdown_tx,
        })
    }

    pub fn peer_id(&self) -> PeerId {
        self.authenticator.peer_id()
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
            peer_id: self.peer_id(),
        };

        create_router(state)
            .route(
                &self.config.protected_path,
                authenticated(Arc::clone(&self.authenticator), whoami),
            )
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            peer_id = %self.peer_id(),
            protected_path = %self.config.protected_path,
            "peerauth-server listening"
        );

        let (signalled_tx, mut signalled_rx) = watch::channel(false);
        let shutdown_rx = self.shutdown_tx.subscribe();
        let serve = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            Self::shutdown_signal(shutdown_rx).await;
            let _ = signalled_tx.send(true);
        });

        let timeout = self.config.shutdown_timeout();
        tokio::select! {
            result = serve.into_future() => result?,
            _ = async {
                let _ = signalled_rx.wait_for(|signalled| *signalled).await;
                tokio::time::sleep(timeout).await;
            } => {
                warn!("connections still open after {:?}, exiting anyway", timeout);
            }
        }

        info!("peerauth-server stopped");
        Ok(())
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    if let Some(ref mut sigterm) = sigterm {
                        sigterm.recv().await;
                        return;
                    }
                }
                std::future::pending::<()>().await;
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown requested");
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
