//! On-disk repository: configuration, API address file and block store.
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use anyhow::ensure;
use anyhow::Context;
use bytes::Bytes;
use ethbox_cid::key::SHARDING_SPEC;
use ethbox_store::Datastore;
use ethbox_store::Key;
use ethbox_store::LocalStore;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tracing::debug;
use tracing::info;

pub(crate) const CONFIG_FILE: &str = "config";
pub(crate) const API_FILE: &str = "api";
pub(crate) const BLOCKS_DIR: &str = "blocks";

const SHARDING_KEY: &str = "/SHARDING";
const README_KEY: &str = "/_README";
const README: &str = "This is a repository of IPLD objects. Each object is stored under a \
                      key derived from its content identifier, sharded by the next-to-last \
                      two characters of the key.\n";

const DEFAULT_API_ADDR: &str = "/ip4/127.0.0.1/tcp/5002";
const DEFAULT_GATEWAY_ADDR: &str = "/ip4/127.0.0.1/tcp/9090";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RepoConfig {
    pub(crate) addresses: Addresses,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct Addresses {
    #[serde(rename = "API")]
    pub(crate) api: String,
    #[serde(rename = "Gateway")]
    pub(crate) gateway: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            addresses: Addresses {
                api: DEFAULT_API_ADDR.to_string(),
                gateway: DEFAULT_GATEWAY_ADDR.to_string(),
            },
        }
    }
}

/// An opened repository whose block backend has been chosen by the caller.
#[derive(Clone)]
pub(crate) struct Repository {
    root: PathBuf,
    config: RepoConfig,
    blocks: Arc<dyn Datastore>,
}

impl std::fmt::Debug for Repository {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish()
    }
}

impl Repository {
    pub(crate) fn exists(root: &Path) -> bool {
        root.join(CONFIG_FILE).is_file()
    }

    pub(crate) fn blocks_dir(root: &Path) -> PathBuf {
        root.join(BLOCKS_DIR)
    }

    /// Creates a fresh repository with default addresses.
    pub(crate) async fn init(root: &Path) -> anyhow::Result<()> {
        ensure!(
            !Self::exists(root),
            "repository already exists at {:?}",
            root
        );
        std::fs::create_dir_all(root)
            .with_context(|| format!("creating repository directory {root:?}"))?;

        let config = serde_json::to_vec_pretty(&RepoConfig::default())?;
        std::fs::write(root.join(CONFIG_FILE), config).context("writing repository config")?;

        let blocks = LocalStore::open(Self::blocks_dir(root)).context("creating block store")?;
        blocks
            .put(
                &Key::new(SHARDING_KEY),
                Bytes::from(format!("{SHARDING_SPEC}\n")),
            )
            .await?;
        blocks
            .put(&Key::new(README_KEY), Bytes::from_static(README.as_bytes()))
            .await?;

        info!("Initialized repository at {:?}", root);
        Ok(())
    }

    /// Opens the repository at `root`, installing `blocks` as its block backend.
    pub(crate) async fn open(
        root: &Path,
        blocks: Arc<dyn Datastore>,
    ) -> anyhow::Result<Self> {
        if !Self::exists(root) {
            bail!("no repository found in {:?}", root);
        }

        let config = std::fs::read(root.join(CONFIG_FILE)).context("reading repository config")?;
        let config: RepoConfig =
            serde_json::from_slice(&config).context("parsing repository config")?;
        debug!("Loaded repository config: {:?}", config);

        let repo = Self {
            root: root.to_path_buf(),
            config,
            blocks,
        };
        repo.check_sharding().await?;
        Ok(repo)
    }

    async fn check_sharding(&self) -> anyhow::Result<()> {
        let key = Key::new(SHARDING_KEY);
        if !self.blocks.has(&key).await? {
            info!("Block store has no sharding marker, writing {}", SHARDING_SPEC);
            self.blocks
                .put(&key, Bytes::from(format!("{SHARDING_SPEC}\n")))
                .await?;
            return Ok(());
        }

        let marker = self.blocks.get(&key).await?;
        let marker = String::from_utf8_lossy(&marker);
        ensure!(
            marker.trim() == SHARDING_SPEC,
            "unsupported block store sharding `{}`",
            marker.trim()
        );
        Ok(())
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub(crate) fn blocks(&self) -> &Arc<dyn Datastore> {
        &self.blocks
    }

    /// Records where the API listens, for command line clients.
    pub(crate) fn set_api_addr(
        &self,
        multiaddr: &str,
    ) -> anyhow::Result<()> {
        std::fs::write(self.root.join(API_FILE), multiaddr).context("writing api file")
    }

    pub(crate) fn api_addr(&self) -> Option<String> {
        std::fs::read_to_string(self.root.join(API_FILE)).ok()
    }

    pub(crate) fn clear_api_addr(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(self.root.join(API_FILE)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("removing api file"),
        }
    }
}

/// Parses `/ip4/<addr>/tcp/<port>` (or `/ip6/...`) into a socket address.
pub(crate) fn multiaddr_to_socket_addr(multiaddr: &str) -> anyhow::Result<SocketAddr> {
    let parts: Vec<&str> = multiaddr.split('/').collect();
    match parts.as_slice() {
        ["", proto @ ("ip4" | "ip6"), ip, "tcp", port] => {
            let ip: IpAddr = ip
                .parse()
                .with_context(|| format!("invalid {proto} address in `{multiaddr}`"))?;
            ensure!(
                (*proto == "ip4") == ip.is_ipv4(),
                "address family mismatch in `{}`",
                multiaddr
            );
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid tcp port in `{multiaddr}`"))?;
            Ok(SocketAddr::new(ip, port))
        },
        _ => bail!("unsupported multiaddr `{}`", multiaddr),
    }
}

pub(crate) fn socket_addr_to_multiaddr(addr: SocketAddr) -> String {
    match addr.ip() {
        IpAddr::V4(ip) => format!("/ip4/{}/tcp/{}", ip, addr.port()),
        IpAddr::V6(ip) => format!("/ip6/{}/tcp/{}", ip, addr.port()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiaddrs() {
        assert_eq!(
            multiaddr_to_socket_addr("/ip4/127.0.0.1/tcp/5002").unwrap(),
            "127.0.0.1:5002".parse().unwrap()
        );
        assert_eq!(
            multiaddr_to_socket_addr("/ip6/::1/tcp/9090").unwrap(),
            "[::1]:9090".parse().unwrap()
        );
        assert!(multiaddr_to_socket_addr("/ip4/::1/tcp/1").is_err());
        assert!(multiaddr_to_socket_addr("/ip4/127.0.0.1/udp/1").is_err());
        assert!(multiaddr_to_socket_addr("/ip4/127.0.0.1/tcp/port").is_err());
        assert!(multiaddr_to_socket_addr("127.0.0.1:5002").is_err());
    }

    #[test]
    fn multiaddr_round_trip() {
        let addr: SocketAddr = "10.0.0.2:4001".parse().unwrap();
        let multiaddr = socket_addr_to_multiaddr(addr);

        assert_eq!(multiaddr, "/ip4/10.0.0.2/tcp/4001");
        assert_eq!(multiaddr_to_socket_addr(&multiaddr).unwrap(), addr);
    }

    #[test]
    fn config_uses_ipfs_field_names() {
        let json = serde_json::to_value(RepoConfig::default()).unwrap();

        assert_eq!(json["Addresses"]["API"], DEFAULT_API_ADDR);
        assert_eq!(json["Addresses"]["Gateway"], DEFAULT_GATEWAY_ADDR);
    }

    #[tokio::test]
    async fn init_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");

        assert!(!Repository::exists(&root));
        Repository::init(&root).await.unwrap();
        assert!(Repository::init(&root).await.is_err());

        let blocks = Arc::new(LocalStore::open(Repository::blocks_dir(&root)).unwrap());
        let repo = Repository::open(&root, blocks).await.unwrap();
        assert_eq!(repo.config(), &RepoConfig::default());

        repo.set_api_addr("/ip4/127.0.0.1/tcp/5002").unwrap();
        assert_eq!(repo.api_addr().as_deref(), Some("/ip4/127.0.0.1/tcp/5002"));
        repo.clear_api_addr().unwrap();
        repo.clear_api_addr().unwrap();
        assert_eq!(repo.api_addr(), None);
    }

    #[tokio::test]
    async fn open_missing_repository_fails() {
        let dir = tempfile::tempdir().unwrap();

        let err = Repository::open(dir.path(), Arc::new(LocalStore::in_memory()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no repository found"));
    }

    #[tokio::test]
    async fn foreign_sharding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).await.unwrap();

        let blocks = Arc::new(LocalStore::in_memory());
        blocks
            .put(&Key::new(SHARDING_KEY), Bytes::from_static(b"/repo/flatfs/shard/v1/prefix/2"))
            .await
            .unwrap();

        assert!(Repository::open(dir.path(), blocks).await.is_err());
    }
}
