//! Daemon start up and tear down.
//!
//! Boot walks through three stages in order: the block store is prepared,
//! the node is started on top of it and finally the HTTP listeners are bound.
//! A failing stage aborts the boot and nothing after it runs.
use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Context;
use ethbox_fetch::BlockFetcher;
use ethbox_store::Datastore;
use ethbox_store::InterceptingStore;
use ethbox_store::LocalStore;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::api::ApiServer;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::node::Node;
use crate::repo::socket_addr_to_multiaddr;
use crate::repo::Repository;

/// Everything a running daemon owns.
pub(crate) struct AppContext {
    pub(crate) node: Arc<Node>,
    pub(crate) api: ApiServer,
}

enum Stage {
    PrepareStorage,
    StartNode(Repository),
    StartApi(Arc<Node>),
    Running(AppContext),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::PrepareStorage => "prepare-storage",
            Stage::StartNode(_) => "start-node",
            Stage::StartApi(_) => "start-api",
            Stage::Running(_) => "running",
        }
    }
}

/// Boots the daemon described by `config`.
pub(crate) async fn boot(config: &Config) -> anyhow::Result<AppContext> {
    let mut stage = Stage::PrepareStorage;
    loop {
        info!("Boot stage: {}", stage.name());
        stage = match stage {
            Stage::PrepareStorage => Stage::StartNode(prepare_storage(config).await?),
            Stage::StartNode(repo) => Stage::StartApi(start_node(repo).await?),
            Stage::StartApi(node) => Stage::Running(start_api(node).await?),
            Stage::Running(ctx) => return Ok(ctx),
        };
    }
}

/// Opens the repository with remote blocks mounted over its local block store.
async fn prepare_storage(config: &Config) -> anyhow::Result<Repository> {
    let root = Path::new(&config.repo.path);
    if !Repository::exists(root) {
        bail!(
            "no repository found in {:?}\nplease run: ethbox-node init",
            root
        );
    }

    let fetcher = BlockFetcher::new(&config.eth).context("creating remote block fetcher")?;
    info!(
        "Mounting remote block API as data store: {}",
        fetcher.block_get_url()
    );

    let local = LocalStore::open(Repository::blocks_dir(root)).context("opening block store")?;
    let blocks: Arc<dyn Datastore> = Arc::new(InterceptingStore::new(local, fetcher));

    Repository::open(root, blocks).await
}

async fn start_node(repo: Repository) -> anyhow::Result<Arc<Node>> {
    let node = Arc::new(Node::new(repo));
    node.start().await.context("starting node")?;
    Metrics::new().set_node_online(true);
    Ok(node)
}

async fn start_api(node: Arc<Node>) -> anyhow::Result<AppContext> {
    let api = match ApiServer::start(node.clone()).await {
        Ok(api) => api,
        Err(err) => {
            if let Err(stop_err) = node.stop().await {
                warn!("Stopping node after failed API start: {:?}", stop_err);
            }
            Metrics::new().set_node_online(false);
            return Err(err.context("starting API"));
        },
    };

    let api_multiaddr = socket_addr_to_multiaddr(api.api_addr());
    node.repo()
        .set_api_addr(&api_multiaddr)
        .context("recording API address")?;
    info!(
        "Daemon is ready. api: {} gateway: {}",
        api_multiaddr,
        socket_addr_to_multiaddr(api.gateway_addr())
    );

    Ok(AppContext { node, api })
}

/// Stops the HTTP listeners, then the node.
pub(crate) async fn shutdown(ctx: AppContext) -> anyhow::Result<()> {
    let AppContext { node, api } = ctx;

    let api_result = api.stop().await;
    let node_result = node.stop().await;
    Metrics::new().set_node_online(false);

    if let Err(err) = api_result.and(node_result) {
        error!("There were errors stopping: {:?}", err);
        return Err(err);
    }
    info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use ethbox_cid::cid::Cid;
    use ethbox_cid::Codec;
    use ethbox_cid::ContentIdentifier;
    use ethbox_fetch::request_arg;
    use ethbox_fetch::RemoteEndpoint;
    use multihash_codetable::Code;
    use multihash_codetable::MultihashDigest;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;
    use crate::config::PrometheusConfig;
    use crate::config::RepoSettings;
    use crate::repo::RepoConfig;
    use crate::repo::CONFIG_FILE;

    async fn repo_listening_on(
        dir: &Path,
        api: &str,
        gateway: &str,
    ) {
        Repository::init(dir).await.unwrap();
        let mut repo_config = RepoConfig::default();
        repo_config.addresses.api = api.to_string();
        repo_config.addresses.gateway = gateway.to_string();
        std::fs::write(
            dir.join(CONFIG_FILE),
            serde_json::to_vec(&repo_config).unwrap(),
        )
        .unwrap();
    }

    fn config_for(
        dir: &Path,
        server: &MockServer,
    ) -> Config {
        let address = server.address();
        Config {
            eth: RemoteEndpoint {
                host: address.ip().to_string(),
                port: address.port(),
                timeout_secs: Some(5),
                ..Default::default()
            },
            repo: RepoSettings {
                path: dir.to_string_lossy().into_owned(),
            },
            prometheus: PrometheusConfig { port: 0 },
        }
    }

    #[tokio::test]
    async fn boot_serves_remote_blocks_then_shuts_down() {
        let server = MockServer::start().await;
        let id = ContentIdentifier::try_from(Cid::new_v1(
            Codec::EthTxReceipt.code(),
            Code::Keccak256.digest(b"receipt"),
        ))
        .unwrap();
        Mock::given(method("GET"))
            .and(path("/api/v0/block/get"))
            .and(query_param("arg", request_arg(&id).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"receipt rlp".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        repo_listening_on(dir.path(), "/ip4/127.0.0.1/tcp/0", "/ip4/127.0.0.1/tcp/0").await;

        let ctx = boot(&config_for(dir.path(), &server)).await.unwrap();
        assert!(ctx.node.is_online());
        let api_addr = ctx.api.api_addr();
        assert_eq!(
            ctx.node.repo().api_addr(),
            Some(socket_addr_to_multiaddr(api_addr))
        );

        let client = reqwest::Client::new();
        let res = client
            .post(format!("http://{api_addr}/api/v0/block/get?arg={id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"receipt rlp");

        let res = client
            .get(format!("http://{}/ipfs/{id}", ctx.api.gateway_addr()))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let node = ctx.node.clone();
        shutdown(ctx).await.unwrap();
        assert!(!node.is_online());
        assert_eq!(node.repo().api_addr(), None);
        assert!(reqwest::Client::new()
            .post(format!("http://{api_addr}/api/v0/version"))
            .send()
            .await
            .is_err());
    }

    #[tokio::test]
    async fn boot_without_repository_fails() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        let err = boot(&config_for(&dir.path().join("missing"), &server))
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("no repository found"));
    }

    #[tokio::test]
    async fn bind_failure_stops_the_node() {
        let server = MockServer::start().await;
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = socket_addr_to_multiaddr(taken.local_addr().unwrap());

        let dir = tempfile::tempdir().unwrap();
        repo_listening_on(dir.path(), &taken, "/ip4/127.0.0.1/tcp/0").await;

        let err = boot(&config_for(dir.path(), &server))
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("binding API listener"));

        let repo = Repository::open(dir.path(), Arc::new(LocalStore::in_memory()))
            .await
            .unwrap();
        assert_eq!(repo.api_addr(), None);
    }
}
