use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use notes_platform::StorageError;

use super::{DriveFile, DriveTransport, FOLDER_MIME_TYPE, TEXT_MIME_TYPE};

const BOUNDARY: &str = "-------314159265358979323846";
const FILE_FIELDS: &str = "id,name,mimeType,parents,trashed";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,parents,trashed)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// [`DriveTransport`] speaking the Drive v3 REST protocol
pub struct HttpDriveTransport {
    client: Client,
    api_base: String,
    upload_base: String,
}

impl HttpDriveTransport {
    pub fn new(api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, what: &str, request: RequestBuilder) -> Result<Response, StorageError> {
        let resp = request
            .send()
            .await
            .map_err(|e| StorageError::io(what.to_string(), e))?;
        check_status(what, resp).await
    }

    async fn query(
        &self,
        token: &str,
        q: &str,
        page_size: u32,
        all_pages: bool,
    ) -> Result<Vec<DriveFile>, StorageError> {
        let url = format!("{}/files", self.api_base);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("q", q.to_string()),
                ("fields", LIST_FIELDS.to_string()),
                ("orderBy", "folder,name".to_string()),
                ("pageSize", page_size.to_string()),
            ];
            if let Some(t) = &page_token {
                params.push(("pageToken", t.clone()));
            }
            let request = self.client.get(&url).bearer_auth(token).query(&params);
            let page: FileList = self
                .send("list files", request)
                .await?
                .json()
                .await
                .map_err(|e| StorageError::io("decode file list", e))?;
            files.extend(page.files);
            match page.next_page_token {
                Some(next) if all_pages => page_token = Some(next),
                _ => break,
            }
        }
        debug!("query {:?} returned {} files", q, files.len());
        Ok(files)
    }
}

async fn check_status(what: &str, resp: Response) -> Result<Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::UNAUTHORIZED => Err(StorageError::NotAuthenticated),
        StatusCode::NOT_FOUND => Err(StorageError::NotFound(what.to_string())),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(StorageError::io(
                what.to_string(),
                format!("HTTP {}: {}", status, body.trim()),
            ))
        }
    }
}

/// Quote a value for use inside a single-quoted query literal
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn children_query(parent_id: &str) -> String {
    format!("'{}' in parents and trashed = false", quote(parent_id))
}

fn named_child_query(parent_id: &str, name: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        quote(name),
        quote(parent_id)
    )
}

/// `multipart/related` upload body: JSON metadata followed by the text
fn multipart_related(metadata: &serde_json::Value, text: &str) -> String {
    let delimiter = format!("\r\n--{}\r\n", BOUNDARY);
    let close = format!("\r\n--{}--", BOUNDARY);
    format!(
        "{delimiter}Content-Type: application/json; charset=UTF-8\r\n\r\n{metadata}{delimiter}Content-Type: {TEXT_MIME_TYPE}\r\n\r\n{text}{close}"
    )
}

fn multipart_content_type() -> String {
    format!("multipart/related; boundary=\"{}\"", BOUNDARY)
}

#[async_trait]
impl DriveTransport for HttpDriveTransport {
    async fn list_children(
        &self,
        token: &str,
        parent_id: &str,
    ) -> Result<Vec<DriveFile>, StorageError> {
        self.query(token, &children_query(parent_id), 1000, true).await
    }

    async fn find_child(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<DriveFile>, StorageError> {
        let files = self.query(token, &named_child_query(parent_id, name), 1, false).await?;
        Ok(files.into_iter().next())
    }

    async fn download(&self, token: &str, file_id: &str) -> Result<String, StorageError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("alt", "media")]);
        self.send("download file", request)
            .await?
            .text()
            .await
            .map_err(|e| StorageError::io("read file content", e))
    }

    async fn update_content(
        &self,
        token: &str,
        file_id: &str,
        text: &str,
    ) -> Result<(), StorageError> {
        let url = format!("{}/files/{}", self.upload_base, file_id);
        let body = multipart_related(&json!({ "mimeType": TEXT_MIME_TYPE }), text);
        let request = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "multipart")])
            .header(reqwest::header::CONTENT_TYPE, multipart_content_type())
            .body(body);
        self.send("upload file content", request).await?;
        Ok(())
    }

    async fn create_file(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
        text: &str,
    ) -> Result<DriveFile, StorageError> {
        let url = format!("{}/files", self.upload_base);
        let metadata = json!({
            "name": name,
            "mimeType": TEXT_MIME_TYPE,
            "parents": [parent_id],
        });
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, multipart_content_type())
            .body(multipart_related(&metadata, text));
        self.send("create file", request)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::io("decode created file", e))
    }

    async fn create_folder(
        &self,
        token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<DriveFile, StorageError> {
        let url = format!("{}/files", self.api_base);
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("fields", FILE_FIELDS)])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent_id],
            }));
        self.send("create folder", request)
            .await?
            .json()
            .await
            .map_err(|e| StorageError::io("decode created folder", e))
    }

    async fn trash(&self, token: &str, file_id: &str) -> Result<(), StorageError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        let request = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "trashed": true }));
        self.send("trash file", request).await?;
        Ok(())
    }
}
