use anyhow::Context;
use std::io;

use crate::cli::{InventoryOptions, Process};
use crate::clock::SystemClock;
use crate::config::PurgeConfig;
use crate::glacier::GlacierClient;
use crate::glacier_purge::VaultPurger;

impl Process for InventoryOptions {
    async fn process(self) -> anyhow::Result<i32> {
        let config = PurgeConfig::load(self.vault.into_overrides(None))?;
        config.ensure_inventory_dir()?;

        let vault = config.vault.clone();
        let path = config.inventory_path();

        let client = GlacierClient::from_config(&config).await;
        let mut purger = VaultPurger::new(client, SystemClock, io::stdout(), config);

        purger
            .ensure_inventory(&vault, &path)
            .await
            .with_context(|| format!("Fetching the inventory of `{vault}` failed"))?;

        println!("{}", path.display());

        Ok(0)
    }
}
