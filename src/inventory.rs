use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Header cell of the CSV produced by an inventory-retrieval job.
const CSV_HEADER_FIELD: &str = "ArchiveId";

/// An inventory-retrieval job as reported by the vault's job list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryJob {
    pub job_id: String,
    pub completed: bool,
    /// Completed jobs can have failed; their output is useless.
    pub failed: bool,
    /// `None` when the service sent no (or an unparsable) timestamp.
    pub creation_date: Option<SystemTime>,
}

impl InventoryJob {
    pub fn pending(
        job_id: impl Into<String>,
        creation_date: SystemTime,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            completed: false,
            failed: false,
            creation_date: Some(creation_date),
        }
    }

    pub fn completed(
        job_id: impl Into<String>,
        creation_date: SystemTime,
    ) -> Self {
        Self {
            completed: true,
            ..Self::pending(job_id, creation_date)
        }
    }

    fn created_after(
        &self,
        cutoff: Option<SystemTime>,
    ) -> bool {
        match (self.creation_date, cutoff) {
            (Some(created), Some(cutoff)) => created > cutoff,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Which existing job (if any) can stand in for a fresh inventory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobChoice<'a> {
    /// Output can be downloaded right away.
    Completed(&'a InventoryJob),
    /// Still running on the service side; needs polling.
    Pending(&'a InventoryJob),
}

impl<'a> JobChoice<'a> {
    pub const fn job(&self) -> &'a InventoryJob {
        match *self {
            Self::Completed(job) | Self::Pending(job) => job,
        }
    }
}

/// Picks the newest successfully completed job younger than `max_age`,
/// falling back to the newest pending one.
pub fn choose_job(
    jobs: &[InventoryJob],
    now: SystemTime,
    max_age: Duration,
) -> Option<JobChoice<'_>> {
    let cutoff = now.checked_sub(max_age);
    let recent = || jobs.iter().filter(move |job| job.created_after(cutoff));

    let newest_completed = recent()
        .filter(|job| job.completed && !job.failed)
        .max_by_key(|job| job.creation_date);

    if let Some(job) = newest_completed {
        return Some(JobChoice::Completed(job));
    }

    recent()
        .filter(|job| !job.completed)
        .max_by_key(|job| job.creation_date)
        .map(JobChoice::Pending)
}

/// Where the inventory of `vault` is cached: `<dir>/<vault>.csv`.
pub fn inventory_path(
    dir: &Path,
    vault: &str,
) -> PathBuf {
    dir.join(format!("{vault}.csv"))
}

/// The archive id on one inventory line, if there is one to delete.
///
/// Only the first comma-separated field matters; the rest of the record is
/// ignored.
pub fn archive_id(line: &str) -> Option<&str> {
    let first = line.split(',').next().unwrap_or_default();
    let id = first.trim().trim_matches('"').trim();

    if id.is_empty() || id == CSV_HEADER_FIELD {
        None
    } else {
        Some(id)
    }
}
