use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::clock::{Clock, describe_duration};
use crate::config::PurgeConfig;
use crate::error::{PurgeError, PurgeResult};
use crate::glacier::VaultService;
use crate::inventory::{JobChoice, archive_id, choose_job};

/// Buffer size for both writing the downloaded inventory and reading it back.
pub const INVENTORY_CHUNK_SIZE: usize = 64 * 1024;

/// What happened to the archives listed in one inventory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub attempted: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Drives a vault from "full" to "gone": inventory, archive deletes, vault
/// delete. Status lines go to `out`.
pub struct VaultPurger<S, C, W> {
    service: S,
    clock: C,
    out: W,
    config: PurgeConfig,
}

/// Console output is best effort; a closed stdout must not stop a purge.
macro_rules! status {
    ($self:expr, $($arg:tt)*) => {{
        let _ = writeln!($self.out, $($arg)*);
    }};
}

impl<S: VaultService, C: Clock, W: Write> VaultPurger<S, C, W> {
    pub const fn new(
        service: S,
        clock: C,
        out: W,
        config: PurgeConfig,
    ) -> Self {
        Self {
            service,
            clock,
            out,
            config,
        }
    }

    pub const fn config(&self) -> &PurgeConfig {
        &self.config
    }

    pub const fn service(&self) -> &S {
        &self.service
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Full run: inventory, delete every archive in it, delete the vault.
    ///
    /// Returns whether the vault is gone.
    pub async fn run(&mut self) -> PurgeResult<bool> {
        let vault = self.config.vault.clone();
        let path = self.config.inventory_path();

        self.ensure_inventory(&vault, &path).await?;
        let summary = self.purge_all_archives(&vault, &path).await?;
        tracing::info!(vault = %vault, ?summary, "archives processed");

        let deleted = self.delete_vault(&vault).await?;

        if deleted {
            status!(self, "Deleted vault {vault}");
        } else {
            status!(self, "Could not delete vault {vault}");
        }

        Ok(deleted)
    }

    /// Makes sure an inventory of `vault` is on disk at `path`.
    ///
    /// An existing file is trusted as is; otherwise a recent job is reused
    /// (completed before pending) or a new one requested, polled until it is
    /// done and its output saved.
    pub async fn ensure_inventory(
        &mut self,
        vault: &str,
        path: &Path,
    ) -> PurgeResult<()> {
        let cached = tokio::fs::try_exists(path).await.map_err(|err| {
            PurgeError::fatal("read inventory", format!("{}: {err}", path.display()))
        })?;

        if cached {
            tracing::info!(path = %path.display(), "reusing cached inventory");
            return Ok(());
        }

        status!(self, "Listing jobs");
        let jobs = self.service.list_inventory_jobs(vault).await?;

        let choice = choose_job(&jobs, self.clock.now(), self.config.max_job_age);

        let (job_id, completed) = match choice {
            Some(JobChoice::Completed(job)) => (job.job_id.clone(), true),
            Some(JobChoice::Pending(job)) => (job.job_id.clone(), false),
            None => {
                status!(self, "Requesting new inventory");
                (self.service.initiate_inventory_job(vault).await?, false)
            }
        };
        tracing::info!(vault, job_id = %job_id, completed, "using inventory job");

        if !completed {
            self.wait_for_job(vault, &job_id).await?;
        }

        self.save_inventory(vault, &job_id, path).await?;
        status!(self, "Saved inventory to disc");

        Ok(())
    }

    /// Polls until the service reports the job as completed. There is no
    /// upper bound; inventory jobs routinely take hours.
    async fn wait_for_job(
        &mut self,
        vault: &str,
        job_id: &str,
    ) -> PurgeResult<()> {
        let interval = self.config.poll_interval;

        while !self.service.is_job_completed(vault, job_id).await? {
            status!(
                self,
                "Inventory not ready, sleeping for {}",
                describe_duration(interval)
            );
            self.clock.sleep(interval).await;
        }

        Ok(())
    }

    /// Downloads next to `path` and renames once complete, so a half written
    /// file is never mistaken for a cached inventory. The partial file is
    /// removed whenever any step fails.
    async fn save_inventory(
        &self,
        vault: &str,
        job_id: &str,
        path: &Path,
    ) -> PurgeResult<()> {
        let partial = partial_path(path);

        match self.write_inventory(vault, job_id, &partial, path).await {
            Ok(written) => {
                tracing::debug!(path = %path.display(), written, "inventory saved");
                Ok(())
            }
            Err(err) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!(path = %partial.display(), %cleanup, "partial inventory not removed");
                }
                Err(err)
            }
        }
    }

    async fn write_inventory(
        &self,
        vault: &str,
        job_id: &str,
        partial: &Path,
        path: &Path,
    ) -> PurgeResult<u64> {
        let io_error = |err: std::io::Error| {
            PurgeError::fatal("write inventory", format!("{}: {err}", partial.display()))
        };

        let file = File::create(partial).await.map_err(io_error)?;
        let mut writer = BufWriter::with_capacity(INVENTORY_CHUNK_SIZE, file);

        let written = self
            .service
            .download_job_output(vault, job_id, &mut writer)
            .await?;
        writer.flush().await.map_err(io_error)?;
        writer.into_inner().sync_all().await.map_err(io_error)?;

        tokio::fs::rename(partial, path).await.map_err(io_error)?;

        Ok(written)
    }

    /// `Ok(true)` when the archive is gone, including when it was gone
    /// already. `Ok(false)` for failures worth retrying; anything else is
    /// returned as an error.
    pub async fn delete_one_archive(
        &self,
        vault: &str,
        archive_id: &str,
    ) -> PurgeResult<bool> {
        match self.service.delete_archive(vault, archive_id).await {
            Ok(()) => Ok(true),
            Err(PurgeError::NotFound(_)) => {
                tracing::debug!(archive_id, "archive already removed");
                Ok(true)
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(archive_id, %err, "delete failed");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes every archive listed in the inventory at `path`, one line at a
    /// time. Each failed delete is retried once after the retry delay; a
    /// second failure is reported and skipped.
    pub async fn purge_all_archives(
        &mut self,
        vault: &str,
        path: &Path,
    ) -> PurgeResult<PurgeSummary> {
        let file = File::open(path).await.map_err(|err| {
            PurgeError::fatal("read inventory", format!("{}: {err}", path.display()))
        })?;
        let mut lines = BufReader::with_capacity(INVENTORY_CHUNK_SIZE, file).lines();
        let mut summary = PurgeSummary::default();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| PurgeError::fatal("read inventory", err.to_string()))?
        {
            let Some(id) = archive_id(&line) else {
                continue;
            };
            summary.attempted += 1;

            if self.delete_with_retry(vault, id).await? {
                summary.deleted += 1;
            } else {
                summary.failed += 1;
            }
        }

        Ok(summary)
    }

    async fn delete_with_retry(
        &mut self,
        vault: &str,
        archive_id: &str,
    ) -> PurgeResult<bool> {
        if self.delete_one_archive(vault, archive_id).await? {
            return Ok(true);
        }

        let delay = self.config.retry_delay;
        status!(self, "Could not delete archive {archive_id}, retrying");
        status!(self, "Sleeping for {}", describe_duration(delay));
        self.clock.sleep(delay).await;

        if self.delete_one_archive(vault, archive_id).await? {
            return Ok(true);
        }

        status!(self, "Could not delete archive {archive_id}, failed");
        Ok(false)
    }

    /// `Ok(false)` when the service asked us to come back later; a vault
    /// that still holds archives (or does not exist) is an error.
    pub async fn delete_vault(
        &self,
        vault: &str,
    ) -> PurgeResult<bool> {
        match self.service.delete_vault(vault).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_transient() => {
                tracing::warn!(vault, %err, "delete vault failed");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
