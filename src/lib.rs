use crate::cli::{Args, Process};
use crate::helpers::{fmt_error, init_logging};
use clap::{Command, CommandFactory, Parser};
use clap_complete::{Generator, generate};
use std::ffi::OsString;
use std::future::Future;
use std::io;

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod glacier;
pub mod glacier_purge;
pub mod helpers;
pub mod inventory;

pub use crate::clock::{Clock, SystemClock};
pub use crate::config::PurgeConfig;
pub use crate::error::{PurgeError, PurgeResult};
pub use crate::glacier::{GlacierClient, VaultService};
pub use crate::glacier_purge::{PurgeSummary, VaultPurger};
pub use crate::inventory::InventoryJob;

pub fn print_completions<G: Generator>(
    generator: G,
    cmd: &mut Command,
) {
    // get_name returns a str, to_owned = to_string (but restriction::str_to_string)
    generate(generator, cmd, cmd.get_name().to_owned(), &mut io::stdout());
}

/// Parse `args`, run the selected command and return the process exit code.
///
/// Ctrl-C drops the running command, which also cancels any poll or retry
/// sleep it is waiting in.
pub async fn main_rs<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::parse_from(args);
    init_logging(args.verbose);

    if let Some(generator) = args.generator {
        let mut cmd = Args::command();

        print_completions(generator, &mut cmd);
        return 0;
    }

    let Some(command) = args.cmd else {
        let _ = Args::command().print_help();
        return 2;
    };

    until_interrupted(command.process(), tokio::signal::ctrl_c())
        .await
        .unwrap_or_else(|msg| {
            eprintln!("{}", fmt_error(&msg));
            1
        })
}

/// Runs `work` until it finishes or `interrupt` fires, whichever comes first.
///
/// A failing `interrupt` (no signal handler could be installed) is ignored and
/// `work` runs to completion.
pub async fn until_interrupted<F, S>(
    work: F,
    interrupt: S,
) -> anyhow::Result<i32>
where
    F: Future<Output = anyhow::Result<i32>>,
    S: Future<Output = io::Result<()>>,
{
    tokio::select! {
        result = work => result,
        Ok(()) = interrupt => Err(anyhow::anyhow!("Interrupted.")),
    }
}
