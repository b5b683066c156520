use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap_complete::Shell;

use crate::config::ConfigOverrides;
use crate::helpers::parse_seconds;

pub const fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
        .placeholder(
            anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))),
        )
}

pub trait Process {
    async fn process(self) -> anyhow::Result<i32>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Parser)]
#[clap(version, styles=get_styles())]
pub struct Args {
    #[arg(long = "generate", value_enum)]
    pub generator: Option<Shell>,

    /// More diagnostics on stderr (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub cmd: Option<Commands>,
}

// Which vault, and where its inventory lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, clap::Args)]
pub struct VaultOptions {
    /// Vault to operate on (default: `GLACIER_VAULT`)
    #[arg(long)]
    pub vault: Option<String>,

    /// AWS region (default: `GLACIER_REGION`, then the AWS environment)
    #[arg(long)]
    pub region: Option<String>,

    /// Account owning the vault; `-` is the account of the credentials
    #[arg(long)]
    pub account_id: Option<String>,

    /// Directory the `<vault>.csv` inventory is cached in
    #[arg(long)]
    pub inventory_dir: Option<PathBuf>,

    /// Seconds between inventory job status checks
    #[arg(long, value_parser = parse_seconds, value_name = "SECS")]
    pub poll_interval: Option<Duration>,
}

impl VaultOptions {
    pub fn into_overrides(
        self,
        retry_delay: Option<Duration>,
    ) -> ConfigOverrides {
        ConfigOverrides {
            vault: self.vault,
            region: self.region,
            account_id: self.account_id,
            inventory_dir: self.inventory_dir,
            poll_interval: self.poll_interval,
            retry_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, clap::Args)]
pub struct PurgeOptions {
    #[clap(flatten)]
    pub vault: VaultOptions,

    /// Seconds to wait before retrying a failed archive delete
    #[arg(long, value_parser = parse_seconds, value_name = "SECS")]
    pub retry_delay: Option<Duration>,

    /// Confirm that the vault and all of its archives should be destroyed
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, clap::Args)]
pub struct InventoryOptions {
    #[clap(flatten)]
    pub vault: VaultOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, clap::Subcommand)]
pub enum Commands {
    /// Delete every archive in the vault, then the vault itself
    Purge(PurgeOptions),
    /// Fetch (or reuse) the vault inventory without deleting anything
    Inventory(InventoryOptions),
}

impl Process for Commands {
    async fn process(self) -> anyhow::Result<i32> {
        match self {
            Self::Purge(opts) => opts.process().await,
            Self::Inventory(opts) => opts.process().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn purge_arguments_become_overrides() {
        let args = Args::parse_from([
            "glacier-purge",
            "purge",
            "--vault",
            "myVault",
            "--retry-delay",
            "5",
            "--poll-interval",
            "60",
            "--yes",
        ]);

        let Some(Commands::Purge(opts)) = args.cmd else {
            panic!("expected the purge subcommand");
        };
        assert!(opts.yes);

        let overrides = opts.vault.into_overrides(opts.retry_delay);
        assert_eq!(overrides.vault.as_deref(), Some("myVault"));
        assert_eq!(overrides.retry_delay, Some(Duration::from_secs(5)));
        assert_eq!(overrides.poll_interval, Some(Duration::from_secs(60)));
        assert_eq!(overrides.region, None);
    }

    #[test]
    fn verbosity_is_counted() {
        let args = Args::parse_from(["glacier-purge", "-vv", "inventory"]);

        assert_eq!(args.verbose, 2);
        assert!(matches!(args.cmd, Some(Commands::Inventory(_))));
    }
}
