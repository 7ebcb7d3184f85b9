//! Linear GraphQL client.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{IssueTracker, UploadTarget};
use crate::config::LinearConfig;
use crate::http::{send_with_retry, RetryPolicy};
use crate::models::ticket::{CreatedIssue, ResolvedTicket};
use crate::{AppError, Result};

const ISSUE_CREATE: &str = r"
mutation IssueCreate($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue {
      id
      title
      url
    }
  }
}";

const FILE_UPLOAD: &str = r"
mutation FileUpload($contentType: String!, $filename: String!, $size: Int!) {
  fileUpload(contentType: $contentType, filename: $filename, size: $size) {
    success
    uploadFile {
      uploadUrl
      assetUrl
      headers {
        key
        value
      }
    }
  }
}";

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateData {
    issue_create: Option<IssueCreatePayload>,
}

#[derive(Debug, Deserialize)]
struct IssueCreatePayload {
    #[serde(default)]
    success: bool,
    issue: Option<CreatedIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadData {
    file_upload: Option<FileUploadPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileUploadPayload {
    #[serde(default)]
    success: bool,
    upload_file: Option<UploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFile {
    upload_url: String,
    asset_url: String,
    #[serde(default)]
    headers: Vec<UploadHeader>,
}

#[derive(Debug, Deserialize)]
struct UploadHeader {
    key: String,
    value: String,
}

/// Linear API client authenticating with a personal API key.
pub struct LinearClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    policy: RetryPolicy,
}

/// Build the `IssueCreateInput` variables for a resolved ticket.
///
/// `assigneeId` is omitted when unresolved.
#[must_use]
pub fn issue_input(ticket: &ResolvedTicket) -> Value {
    let mut input = json!({
        "teamId": ticket.team_id,
        "title": ticket.title,
        "description": ticket.description,
        "priority": ticket.priority_ordinal,
        "labelIds": ticket.label_ids,
    });
    if let (Some(assignee_id), Some(map)) = (&ticket.assignee_id, input.as_object_mut()) {
        map.insert("assigneeId".into(), Value::String(assignee_id.clone()));
    }
    input
}

fn join_errors(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl LinearClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be created.
    pub fn new(config: &LinearConfig, policy: RetryPolicy) -> Result<Self> {
        let http = policy
            .client()
            .map_err(|err| AppError::Config(format!("failed to build linear client: {err}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            policy,
        })
    }

    /// Post a GraphQL document. Any transport failure, non-2xx status, or
    /// non-empty `errors` list is mapped through `wrap`.
    async fn graphql<T, W>(&self, operation: &str, body: &Value, wrap: W) -> Result<T>
    where
        T: DeserializeOwned,
        W: Fn(String) -> AppError,
    {
        let response = send_with_retry(operation, &self.policy, || {
            self.http
                .post(&self.api_url)
                .header(reqwest::header::AUTHORIZATION, &self.api_key)
                .json(body)
        })
        .await
        .map_err(|err| wrap(format!("linear {operation}: {err}")))?;

        let parsed: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|err| wrap(format!("linear {operation}: malformed response: {err}")))?;

        if !parsed.errors.is_empty() {
            return Err(wrap(format!(
                "linear {operation}: {}",
                join_errors(&parsed.errors)
            )));
        }

        parsed
            .data
            .ok_or_else(|| wrap(format!("linear {operation}: response carried no data")))
    }

    async fn create(&self, ticket: &ResolvedTicket) -> Result<CreatedIssue> {
        let body = json!({
            "query": ISSUE_CREATE,
            "variables": { "input": issue_input(ticket) },
        });
        let data: IssueCreateData = self
            .graphql("issueCreate", &body, AppError::TicketSubmission)
            .await?;

        let payload = data.issue_create.ok_or_else(|| {
            AppError::TicketSubmission("linear issueCreate: empty payload".into())
        })?;
        if !payload.success {
            return Err(AppError::TicketSubmission(
                "linear issueCreate: success=false".into(),
            ));
        }
        let issue = payload.issue.ok_or_else(|| {
            AppError::TicketSubmission("linear issueCreate: no issue returned".into())
        })?;
        info!(issue_id = %issue.id, url = %issue.url, "linear issue created");
        Ok(issue)
    }

    async fn reserve(&self, content_type: &str, filename: &str, size: usize) -> Result<UploadTarget> {
        let body = json!({
            "query": FILE_UPLOAD,
            "variables": {
                "contentType": content_type,
                "filename": filename,
                "size": size,
            },
        });
        let data: FileUploadData = self
            .graphql("fileUpload", &body, AppError::Attachment)
            .await?;

        let payload = data
            .file_upload
            .filter(|payload| payload.success)
            .ok_or_else(|| AppError::Attachment(format!("linear fileUpload refused {filename}")))?;
        let file = payload.upload_file.ok_or_else(|| {
            AppError::Attachment(format!("linear fileUpload returned no target for {filename}"))
        })?;
        debug!(filename, asset_url = %file.asset_url, "upload target reserved");

        Ok(UploadTarget {
            upload_url: file.upload_url,
            asset_url: file.asset_url,
            headers: file
                .headers
                .into_iter()
                .map(|header| (header.key, header.value))
                .collect(),
        })
    }

    async fn put(&self, target: &UploadTarget, content_type: &str, payload: Bytes) -> Result<()> {
        send_with_retry("asset_put", &self.policy, || {
            let mut request = self
                .http
                .put(&target.upload_url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .header(reqwest::header::CACHE_CONTROL, "public, max-age=31536000");
            for (key, value) in &target.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            request.body(payload.clone())
        })
        .await
        .map_err(|err| AppError::Attachment(format!("asset upload failed: {err}")))?;
        Ok(())
    }
}

impl IssueTracker for LinearClient {
    fn create_issue<'a>(
        &'a self,
        ticket: &'a ResolvedTicket,
    ) -> Pin<Box<dyn Future<Output = Result<CreatedIssue>> + Send + 'a>> {
        Box::pin(self.create(ticket))
    }

    fn request_upload<'a>(
        &'a self,
        content_type: &'a str,
        filename: &'a str,
        size: usize,
    ) -> Pin<Box<dyn Future<Output = Result<UploadTarget>> + Send + 'a>> {
        Box::pin(self.reserve(content_type, filename, size))
    }

    fn upload<'a>(
        &'a self,
        target: &'a UploadTarget,
        content_type: &'a str,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.put(target, content_type, payload))
    }
}
