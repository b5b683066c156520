use std::fmt::Debug;
use std::time::SystemTime;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_glacier::Client;
use aws_sdk_glacier::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_glacier::types::{ActionCode, GlacierJobDescription, JobParameters, StatusCode};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use aws_smithy_types::date_time::{DateTime, Format};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::PurgeConfig;
use crate::error::{PurgeError, PurgeResult};
use crate::inventory::InventoryJob;

/// Used when neither the config nor the AWS environment names a region.
pub const FALLBACK_REGION: &str = "eu-west-1";

const INVENTORY_RETRIEVAL: &str = "inventory-retrieval";
const INVENTORY_FORMAT: &str = "CSV";

/// Error codes the service uses for "try again later".
const TRANSIENT_CODES: [&str; 5] = [
    "ServiceUnavailableException",
    "RequestTimeoutException",
    "ThrottlingException",
    "ThrottledException",
    "SlowDown",
];

/// The calls the purge workflow needs from the archival service.
pub trait VaultService {
    /// All inventory-retrieval jobs known for `vault`.
    async fn list_inventory_jobs(
        &self,
        vault: &str,
    ) -> PurgeResult<Vec<InventoryJob>>;

    /// Starts a CSV inventory-retrieval job and returns its id.
    async fn initiate_inventory_job(
        &self,
        vault: &str,
    ) -> PurgeResult<String>;

    async fn is_job_completed(
        &self,
        vault: &str,
        job_id: &str,
    ) -> PurgeResult<bool>;

    /// Streams the output of a completed job into `out`, returning the number
    /// of bytes written.
    async fn download_job_output<W: AsyncWrite + Unpin>(
        &self,
        vault: &str,
        job_id: &str,
        out: &mut W,
    ) -> PurgeResult<u64>;

    async fn delete_archive(
        &self,
        vault: &str,
        archive_id: &str,
    ) -> PurgeResult<()>;

    async fn delete_vault(
        &self,
        vault: &str,
    ) -> PurgeResult<()>;
}

/// [`VaultService`] backed by the AWS SDK.
///
/// One client is built per run and shared by every call.
#[derive(Debug, Clone)]
pub struct GlacierClient {
    client: Client,
    account_id: String,
}

impl GlacierClient {
    pub const fn new(
        client: Client,
        account_id: String,
    ) -> Self {
        Self { client, account_id }
    }

    /// Region from the config, else the default AWS provider chain, else
    /// [`FALLBACK_REGION`]. Credentials always come from the default chain.
    pub async fn from_config(config: &PurgeConfig) -> Self {
        let region = RegionProviderChain::first_try(config.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(FALLBACK_REGION));

        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        Self::new(Client::new(&shared_config), config.account_id.clone())
    }
}

impl VaultService for GlacierClient {
    async fn list_inventory_jobs(
        &self,
        vault: &str,
    ) -> PurgeResult<Vec<InventoryJob>> {
        let mut jobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            tracing::debug!(vault, ?marker, "list jobs");

            let page = self
                .client
                .list_jobs()
                .account_id(&self.account_id)
                .vault_name(vault)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|err| classify("list jobs", vault, &err))?;

            jobs.extend(page.job_list().iter().filter_map(to_inventory_job));

            match page.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_owned()),
                _ => break,
            }
        }

        Ok(jobs)
    }

    async fn initiate_inventory_job(
        &self,
        vault: &str,
    ) -> PurgeResult<String> {
        tracing::debug!(vault, "initiate inventory job");

        let parameters = JobParameters::builder()
            .r#type(INVENTORY_RETRIEVAL)
            .format(INVENTORY_FORMAT)
            .build();

        let output = self
            .client
            .initiate_job()
            .account_id(&self.account_id)
            .vault_name(vault)
            .job_parameters(parameters)
            .send()
            .await
            .map_err(|err| classify("initiate job", vault, &err))?;

        output
            .job_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| PurgeError::fatal("initiate job", "response carried no job id"))
    }

    async fn is_job_completed(
        &self,
        vault: &str,
        job_id: &str,
    ) -> PurgeResult<bool> {
        tracing::debug!(vault, job_id, "describe job");

        let output = self
            .client
            .describe_job()
            .account_id(&self.account_id)
            .vault_name(vault)
            .job_id(job_id)
            .send()
            .await
            .map_err(|err| classify("describe job", job_id, &err))?;

        if output.status_code() == Some(&StatusCode::Failed) {
            return Err(PurgeError::fatal(
                "describe job",
                format!(
                    "inventory job {job_id} failed: {}",
                    output.status_message().unwrap_or("no reason given")
                ),
            ));
        }

        Ok(output.completed())
    }

    async fn download_job_output<W: AsyncWrite + Unpin>(
        &self,
        vault: &str,
        job_id: &str,
        out: &mut W,
    ) -> PurgeResult<u64> {
        tracing::debug!(vault, job_id, "get job output");

        let output = self
            .client
            .get_job_output()
            .account_id(&self.account_id)
            .vault_name(vault)
            .job_id(job_id)
            .send()
            .await
            .map_err(|err| classify("get job output", job_id, &err))?;

        let mut body = output.body;
        let mut written: u64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|err| PurgeError::fatal("get job output", err.to_string()))?
        {
            out.write_all(&chunk)
                .await
                .map_err(|err| PurgeError::fatal("write inventory", err.to_string()))?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }

    async fn delete_archive(
        &self,
        vault: &str,
        archive_id: &str,
    ) -> PurgeResult<()> {
        tracing::debug!(vault, archive_id, "delete archive");

        self.client
            .delete_archive()
            .account_id(&self.account_id)
            .vault_name(vault)
            .archive_id(archive_id)
            .send()
            .await
            .map_err(|err| classify("delete archive", archive_id, &err))?;

        Ok(())
    }

    async fn delete_vault(
        &self,
        vault: &str,
    ) -> PurgeResult<()> {
        tracing::debug!(vault, "delete vault");

        self.client
            .delete_vault()
            .account_id(&self.account_id)
            .vault_name(vault)
            .send()
            .await
            .map_err(|err| classify("delete vault", vault, &err))?;

        Ok(())
    }
}

/// Skips jobs that are not inventory retrievals or carry no id.
fn to_inventory_job(description: &GlacierJobDescription) -> Option<InventoryJob> {
    if description.action() != Some(&ActionCode::InventoryRetrieval) {
        return None;
    }

    let job_id = description.job_id()?.to_owned();

    Some(InventoryJob {
        job_id,
        completed: description.completed(),
        failed: description.status_code() == Some(&StatusCode::Failed),
        creation_date: description.creation_date().and_then(parse_timestamp),
    })
}

/// Parses the ISO-8601 timestamps the job list uses.
pub fn parse_timestamp(text: &str) -> Option<SystemTime> {
    let parsed = DateTime::from_str(text, Format::DateTime).ok()?;

    SystemTime::try_from(parsed).ok()
}

/// Maps an SDK failure onto [`PurgeError`].
fn classify<E>(
    operation: &'static str,
    subject: &str,
    err: &SdkError<E, HttpResponse>,
) -> PurgeError
where
    E: ProvideErrorMetadata + std::error::Error + Debug + 'static,
{
    match err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let service_error = context.err();
            let code = service_error.code();
            let message = service_error
                .message()
                .map_or_else(|| format!("{service_error}"), ToOwned::to_owned);

            classify_service_error(operation, subject, code, status, message)
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            PurgeError::transient(operation, describe_sdk_error(err))
        }
        _ => PurgeError::fatal(operation, describe_sdk_error(err)),
    }
}

/// The decision behind [`classify`] for errors the service answered with.
pub fn classify_service_error(
    operation: &'static str,
    subject: &str,
    code: Option<&str>,
    status: u16,
    message: String,
) -> PurgeError {
    let message = code.map_or_else(|| message.clone(), |code| format!("{code}: {message}"));

    match code {
        Some("ResourceNotFoundException") => PurgeError::NotFound(subject.to_owned()),
        Some(code) if TRANSIENT_CODES.contains(&code) => PurgeError::transient(operation, message),
        _ if status == 429 || status >= 500 => PurgeError::transient(operation, message),
        _ => PurgeError::fatal(operation, message),
    }
}

/// `SdkError`'s own `Display` is just "service error"; walk the sources.
fn describe_sdk_error(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();

    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(Some("ResourceNotFoundException"), 404, "not found")]
    #[case(Some("ServiceUnavailableException"), 500, "transient")]
    #[case(Some("RequestTimeoutException"), 408, "transient")]
    #[case(Some("ThrottlingException"), 400, "transient")]
    #[case(None, 503, "transient")]
    #[case(None, 429, "transient")]
    #[case(Some("InvalidParameterValueException"), 400, "fatal")]
    #[case(Some("AccessDeniedException"), 403, "fatal")]
    #[case(None, 400, "fatal")]
    fn classifies_service_errors(
        #[case] code: Option<&str>,
        #[case] status: u16,
        #[case] expected: &str,
    ) {
        let err = classify_service_error("delete archive", "A1", code, status, "boom".to_owned());

        let kind = match err {
            PurgeError::NotFound(_) => "not found",
            PurgeError::TransientFailure { .. } => "transient",
            PurgeError::Fatal { .. } => "fatal",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn not_found_names_the_subject() {
        let err = classify_service_error(
            "delete archive",
            "A1",
            Some("ResourceNotFoundException"),
            404,
            "gone".to_owned(),
        );

        assert_eq!(err.to_string(), "A1 does not exist");
    }

    #[test]
    fn parses_job_list_timestamps() {
        let parsed = parse_timestamp("2012-05-15T17:21:39.339Z");

        let expected =
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_337_102_499) + Duration::from_millis(339);
        assert_eq!(parsed, Some(expected));
    }

    #[test]
    fn unparsable_timestamp_is_none() {
        assert_eq!(parse_timestamp("last tuesday"), None);
    }

    #[test]
    fn only_inventory_jobs_are_kept() {
        let inventory = GlacierJobDescription::builder()
            .job_id("inv")
            .action(ActionCode::InventoryRetrieval)
            .completed(true)
            .status_code(StatusCode::Succeeded)
            .creation_date("2012-05-15T17:21:39.339Z")
            .build();
        let archive = GlacierJobDescription::builder()
            .job_id("arch")
            .action(ActionCode::ArchiveRetrieval)
            .completed(true)
            .build();

        let job = to_inventory_job(&inventory);

        assert_eq!(job.as_ref().map(|j| j.job_id.as_str()), Some("inv"));
        assert_eq!(job.map(|j| (j.completed, j.failed)), Some((true, false)));
        assert_eq!(to_inventory_job(&archive), None);
    }
}
