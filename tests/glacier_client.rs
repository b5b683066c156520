use aws_credential_types::Credentials;
use aws_sdk_glacier::Client;
use aws_sdk_glacier::config::retry::RetryConfig;
use aws_sdk_glacier::config::{BehaviorVersion, Region};
use aws_smithy_runtime::client::http::test_util::{ReplayEvent, StaticReplayClient};
use aws_smithy_types::body::SdkBody;

use glacier_purge::{GlacierClient, PurgeError, VaultService};

const VAULT: &str = "myVault";

fn glacier(events: Vec<ReplayEvent>) -> GlacierClient {
    let http_client = StaticReplayClient::new(events);

    let config = aws_sdk_glacier::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("eu-west-1"))
        .credentials_provider(Credentials::new("AKID", "SECRET", None, None, "test"))
        .retry_config(RetryConfig::disabled())
        .http_client(http_client)
        .build();

    GlacierClient::new(Client::from_conf(config), "-".to_owned())
}

fn request() -> http::Request<SdkBody> {
    http::Request::builder()
        .uri("https://glacier.eu-west-1.amazonaws.com/")
        .body(SdkBody::empty())
        .unwrap()
}

fn response(
    status: u16,
    body: &str,
) -> http::Response<SdkBody> {
    http::Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(SdkBody::from(body))
        .unwrap()
}

fn error_response(
    status: u16,
    code: &str,
) -> http::Response<SdkBody> {
    let body = format!(r#"{{"code":"{code}","message":"{code} for test","type":"Client"}}"#);

    http::Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("x-amzn-errortype", code)
        .body(SdkBody::from(body))
        .unwrap()
}

fn event(response: http::Response<SdkBody>) -> ReplayEvent {
    ReplayEvent::new(request(), response)
}

#[tokio::test]
async fn deleted_archive_is_ok() {
    let glacier = glacier(vec![event(response(204, ""))]);

    glacier.delete_archive(VAULT, "A1").await.unwrap();
}

#[tokio::test]
async fn missing_archive_is_not_found() {
    let glacier = glacier(vec![event(error_response(404, "ResourceNotFoundException"))]);

    let err = glacier.delete_archive(VAULT, "A1").await.unwrap_err();

    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn unavailable_service_is_transient() {
    let glacier = glacier(vec![event(error_response(500, "ServiceUnavailableException"))]);

    let err = glacier.delete_archive(VAULT, "A1").await.unwrap_err();

    assert!(err.is_transient(), "{err:?}");
}

#[tokio::test]
async fn non_empty_vault_is_fatal() {
    let glacier = glacier(vec![event(error_response(400, "InvalidParameterValueException"))]);

    let err = glacier.delete_vault(VAULT).await.unwrap_err();

    assert!(matches!(err, PurgeError::Fatal { .. }), "{err:?}");
}

#[tokio::test]
async fn job_list_follows_markers_and_keeps_only_inventory_jobs() {
    let first_page = r#"{
        "JobList": [{
            "JobId": "inventory-1",
            "Action": "InventoryRetrieval",
            "Completed": true,
            "StatusCode": "Succeeded",
            "CreationDate": "2012-05-15T17:21:39.339Z"
        }],
        "Marker": "next-page"
    }"#;
    let second_page = r#"{
        "JobList": [
            {"JobId": "archive-1", "Action": "ArchiveRetrieval", "Completed": false},
            {"JobId": "inventory-2", "Action": "InventoryRetrieval", "Completed": false, "StatusCode": "InProgress"}
        ]
    }"#;
    let glacier = glacier(vec![
        event(response(200, first_page)),
        event(response(200, second_page)),
    ]);

    let jobs = glacier.list_inventory_jobs(VAULT).await.unwrap();

    let summary: Vec<_> = jobs
        .iter()
        .map(|job| (job.job_id.as_str(), job.completed, job.creation_date.is_some()))
        .collect();
    assert_eq!(
        summary,
        vec![("inventory-1", true, true), ("inventory-2", false, false)]
    );
}

#[tokio::test]
async fn initiated_job_id_comes_from_the_response_headers() {
    let accepted = http::Response::builder()
        .status(202)
        .header("x-amz-job-id", "job-123")
        .header("location", "/-/vaults/myVault/jobs/job-123")
        .body(SdkBody::empty())
        .unwrap();
    let glacier = glacier(vec![event(accepted)]);

    let job_id = glacier.initiate_inventory_job(VAULT).await.unwrap();

    assert_eq!(job_id, "job-123");
}

#[tokio::test]
async fn describe_job_reports_completion() {
    let glacier = glacier(vec![
        event(response(200, r#"{"JobId":"j","Completed":false,"StatusCode":"InProgress"}"#)),
        event(response(200, r#"{"JobId":"j","Completed":true,"StatusCode":"Succeeded"}"#)),
    ]);

    assert!(!glacier.is_job_completed(VAULT, "j").await.unwrap());
    assert!(glacier.is_job_completed(VAULT, "j").await.unwrap());
}

#[tokio::test]
async fn failed_inventory_job_is_fatal() {
    let glacier = glacier(vec![event(response(
        200,
        r#"{"JobId":"j","Completed":true,"StatusCode":"Failed","StatusMessage":"vault was empty"}"#,
    ))]);

    let err = glacier.is_job_completed(VAULT, "j").await.unwrap_err();

    assert!(err.to_string().contains("vault was empty"), "{err}");
}

#[tokio::test]
async fn job_output_is_streamed_verbatim() {
    let csv = "ArchiveId,ArchiveDescription\nA1,first\nA2,second\n";
    let output = http::Response::builder()
        .status(200)
        .header("content-type", "text/csv")
        .body(SdkBody::from(csv))
        .unwrap();
    let glacier = glacier(vec![event(output)]);
    let mut written = Vec::new();

    let count = glacier
        .download_job_output(VAULT, "j", &mut written)
        .await
        .unwrap();

    assert_eq!(count, csv.len() as u64);
    assert_eq!(String::from_utf8(written).unwrap(), csv);
}
