use std::env;

use anyhow::Context;
use config::FileFormat;
use ethbox_fetch::RemoteEndpoint;
use lazy_static_include::*;
use serde_derive::Deserialize;
use tracing::debug;

lazy_static_include_str! {
    DEFAULT_CONFIG => "src/config/default.toml",
}

/// Legacy environment variables naming the remote block API.
const LEGACY_ENV_OVERRIDES: [(&str, &str); 3] = [
    ("ETH_PROTOCOL", "eth.protocol"),
    ("ETH_HOST", "eth.host"),
    ("ETH_PORT", "eth.port"),
];

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct Config
{
    pub(crate) eth: RemoteEndpoint,
    pub(crate) repo: RepoSettings,
    pub(crate) prometheus: PrometheusConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct RepoSettings
{
    pub(crate) path: String,
}

impl RepoSettings
{
    pub fn validate(&self)
    {
        assert!(
            !self
                .path
                .is_empty(),
            "Repository path is required"
        );
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct PrometheusConfig
{
    /// Port of the metrics exporter, `0` disables it.
    pub(crate) port: u16,
}

impl Config
{
    pub fn load(
        local_file: Option<String>,
        repo_path: Option<String>,
    ) -> anyhow::Result<Config>
    {
        let mut config_builder = config::Config::builder();
        config_builder = config_builder.add_source(
            config::File::from_str(
                &DEFAULT_CONFIG,
                FileFormat::Toml,
            ),
        );

        if let Some(local_file) = local_file
        {
            debug!(
                "Loading local configuration from {}",
                local_file
            );
            config_builder = config_builder.add_source(config::File::with_name(&local_file));
        }

        config_builder = config_builder.add_source(
            config::Environment::default()
                .separator("__")
                .ignore_empty(true),
        );

        for (var, key) in LEGACY_ENV_OVERRIDES
        {
            let value = env::var(var)
                .ok()
                .filter(|v| !v.is_empty());
            config_builder = config_builder
                .set_override_option(key, value)
                .with_context(|| format!("overriding {key} from {var}"))?;
        }

        config_builder = config_builder
            .set_override_option("repo.path", repo_path)
            .context("overriding repo.path")?;

        config_builder
            .build()
            .context("Could not load configuration")?
            .try_deserialize()
            .context("Could not deserialize configuration")
    }

    pub fn validate(&self)
    {
        self.eth
            .validate();
        self.repo
            .validate();
    }
}
