use anyhow::{Context, bail};
use std::io;

use crate::cli::{Process, PurgeOptions};
use crate::clock::SystemClock;
use crate::config::PurgeConfig;
use crate::glacier::GlacierClient;
use crate::glacier_purge::VaultPurger;

impl Process for PurgeOptions {
    async fn process(self) -> anyhow::Result<i32> {
        let config = PurgeConfig::load(self.vault.into_overrides(self.retry_delay))?;

        if !self.yes {
            bail!(
                "Refusing to delete vault `{}` and all of its archives without `--yes`.",
                config.vault
            );
        }

        config.ensure_inventory_dir()?;
        let vault = config.vault.clone();

        let client = GlacierClient::from_config(&config).await;
        let mut purger = VaultPurger::new(client, SystemClock, io::stdout(), config);

        let deleted = purger
            .run()
            .await
            .with_context(|| format!("Purging vault `{vault}` failed"))?;

        tracing::info!(vault = %vault, deleted, "purge finished");

        Ok(0)
    }
}
