use anyhow::{Context, bail};
use dotenvy::from_path_iter;
use resolve_path::PathResolveExt;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const VAULT_KEY: &str = "GLACIER_VAULT";
pub const REGION_KEY: &str = "GLACIER_REGION";
pub const ACCOUNT_ID_KEY: &str = "GLACIER_ACCOUNT_ID";
pub const INVENTORY_DIR_KEY: &str = "GLACIER_INVENTORY_DIR";

/// `-` tells the service to use the account the credentials belong to.
pub const DEFAULT_ACCOUNT_ID: &str = "-";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_JOB_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Config files, in lookup order. Process environment sits between the
/// local files and the global one.
const LOCAL_CONFIG_FILES: [&str; 2] = [".glacier", ".env"];
const GLOBAL_CONFIG_FILE: &str = "~/.glacier";

type ConfigSource = BTreeMap<String, String>;

/// Values given explicitly (on the command line); they win over any file or
/// environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub vault: Option<String>,
    pub region: Option<String>,
    pub account_id: Option<String>,
    pub inventory_dir: Option<PathBuf>,
    pub poll_interval: Option<Duration>,
    pub retry_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    pub vault: String,
    /// `None` defers to the AWS region provider chain.
    pub region: Option<String>,
    pub account_id: String,
    pub inventory_dir: PathBuf,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub max_job_age: Duration,
}

fn read_configfile(path: &Path) -> Option<ConfigSource> {
    let abs_path = path
        .try_resolve()
        .map_or_else(|_| path.to_path_buf(), std::borrow::Cow::into_owned);

    let iter = from_path_iter(abs_path).ok()?;

    let mut config = ConfigSource::new();

    for item in iter {
        let (key, value) = item.ok()?;
        config.insert(key, value);
    }

    Some(config)
}

fn env_source() -> ConfigSource {
    [VAULT_KEY, REGION_KEY, ACCOUNT_ID_KEY, INVENTORY_DIR_KEY]
        .into_iter()
        .filter_map(|key| env::var(key).ok().map(|value| (key.to_owned(), value)))
        .collect()
}

fn lookup(
    sources: &[ConfigSource],
    key: &str,
) -> Option<String> {
    sources
        .iter()
        .find_map(|source| source.get(key).filter(|value| !value.is_empty()))
        .cloned()
}

fn resolve_dir(dir: PathBuf) -> PathBuf {
    dir.try_resolve()
        .map_or_else(|_| dir.clone(), std::borrow::Cow::into_owned)
}

impl PurgeConfig {
    /// Resolves every setting: `overrides`, then `.glacier`, `.env`, the
    /// environment and finally `~/.glacier`.
    pub fn load(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let mut sources: Vec<ConfigSource> = LOCAL_CONFIG_FILES
            .iter()
            .filter_map(|file| read_configfile(Path::new(file)))
            .collect();

        sources.push(env_source());
        sources.extend(read_configfile(Path::new(GLOBAL_CONFIG_FILE)));

        Self::from_sources(overrides, &sources)
    }

    pub fn from_sources(
        overrides: ConfigOverrides,
        sources: &[ConfigSource],
    ) -> anyhow::Result<Self> {
        let Some(vault) = overrides.vault.or_else(|| lookup(sources, VAULT_KEY)) else {
            bail!("No vault configured (use --vault or set `{VAULT_KEY}`).");
        };

        if vault.contains(['/', '\\']) {
            bail!("Invalid vault name `{vault}`.");
        }

        let inventory_dir = overrides
            .inventory_dir
            .or_else(|| lookup(sources, INVENTORY_DIR_KEY).map(PathBuf::from))
            .map_or_else(env::temp_dir, resolve_dir);

        Ok(Self {
            vault,
            region: overrides.region.or_else(|| lookup(sources, REGION_KEY)),
            account_id: overrides
                .account_id
                .or_else(|| lookup(sources, ACCOUNT_ID_KEY))
                .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_owned()),
            inventory_dir,
            poll_interval: overrides.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            retry_delay: overrides.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            max_job_age: DEFAULT_MAX_JOB_AGE,
        })
    }

    pub fn for_vault(vault: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            region: None,
            account_id: DEFAULT_ACCOUNT_ID.to_owned(),
            inventory_dir: env::temp_dir(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_job_age: DEFAULT_MAX_JOB_AGE,
        }
    }

    /// `<inventory_dir>/<vault>.csv`
    pub fn inventory_path(&self) -> PathBuf {
        crate::inventory::inventory_path(&self.inventory_dir, &self.vault)
    }

    /// Makes sure the inventory directory exists before anything is written.
    pub fn ensure_inventory_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.inventory_dir).with_context(|| {
            format!(
                "Could not create inventory directory `{}`",
                self.inventory_dir.display()
            )
        })
    }
}
