use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::api::api_routes;
use crate::api::gateway_routes;
use crate::node::Node;
use crate::repo::multiaddr_to_socket_addr;
use crate::repo::socket_addr_to_multiaddr;

/// A bound listener and the means to stop it gracefully.
struct Listener {
    label: &'static str,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Listener {
    fn spawn(
        label: &'static str,
        shutdown: oneshot::Sender<()>,
        server: impl Future<Output = ()> + Send + 'static,
    ) -> Self {
        Self {
            label,
            shutdown,
            task: tokio::spawn(server),
        }
    }

    async fn stop(self) -> anyhow::Result<()> {
        // The server may already be gone, in which case nobody listens.
        let _ = self.shutdown.send(());
        self.task
            .await
            .with_context(|| format!("stopping {} listener", self.label))
    }
}

/// The API and gateway listeners, bound to `Addresses.API` and
/// `Addresses.Gateway` of the repository configuration.
pub(crate) struct ApiServer {
    api_addr: SocketAddr,
    gateway_addr: SocketAddr,
    listeners: Vec<Listener>,
}

impl ApiServer {
    /// Binds both listeners. Fails if either address cannot be bound.
    pub(crate) async fn start(node: Arc<Node>) -> anyhow::Result<Self> {
        let addresses = node.repo().config().addresses.clone();
        let api = multiaddr_to_socket_addr(&addresses.api).context("parsing Addresses.API")?;
        let gateway =
            multiaddr_to_socket_addr(&addresses.gateway).context("parsing Addresses.Gateway")?;

        let (api_tx, api_rx) = oneshot::channel::<()>();
        let (api_addr, api_server) = warp::serve(api_routes(node.clone()))
            .try_bind_with_graceful_shutdown(api, async {
                api_rx.await.ok();
            })
            .with_context(|| format!("binding API listener on {api}"))?;
        let api_listener = Listener::spawn("API", api_tx, api_server);

        let (gateway_tx, gateway_rx) = oneshot::channel::<()>();
        let bound = warp::serve(gateway_routes(node))
            .try_bind_with_graceful_shutdown(gateway, async {
                gateway_rx.await.ok();
            })
            .with_context(|| format!("binding Gateway listener on {gateway}"));
        let (gateway_addr, gateway_server) = match bound {
            Ok(bound) => bound,
            Err(err) => {
                // The API port is free again once this returns.
                if let Err(stop_err) = api_listener.stop().await {
                    warn!("Stopping API listener after failed start: {:?}", stop_err);
                }
                return Err(err);
            },
        };
        let gateway_listener = Listener::spawn("Gateway", gateway_tx, gateway_server);

        info!("API is listening on: {}", socket_addr_to_multiaddr(api_addr));
        info!(
            "Gateway (readonly) is listening on: {}",
            socket_addr_to_multiaddr(gateway_addr)
        );

        Ok(Self {
            api_addr,
            gateway_addr,
            listeners: vec![api_listener, gateway_listener],
        })
    }

    pub(crate) fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub(crate) fn gateway_addr(&self) -> SocketAddr {
        self.gateway_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    ///
    /// Every listener is stopped even when an earlier one fails.
    pub(crate) async fn stop(self) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        for listener in self.listeners {
            if let Err(err) = listener.stop().await {
                warn!("Listener did not stop cleanly: {:?}", err);
                failures.push(format!("{err:#}"));
            }
        }
        if !failures.is_empty() {
            bail!(
                "{} HTTP listener(s) failed to stop: {}",
                failures.len(),
                failures.join("; ")
            );
        }
        info!("HTTP listeners stopped");
        Ok(())
    }
}
