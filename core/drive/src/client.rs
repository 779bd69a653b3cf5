//! Google Drive and Docs API client.

use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use docsgate_auth::TokenLifecycleManager;
use docsgate_common::{AccountId, Error, Result};

use crate::types::{
    Document, DriveFile, ExportedDocument, FileListResponse, FolderContents, Permission,
    PermissionListResponse, FOLDER_MIME_TYPE,
};

/// Google Drive API base URL.
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
/// Google Drive upload API base URL.
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
/// Google Docs API base URL.
const DOCS_API_BASE: &str = "https://docs.googleapis.com/v1";

const FILE_FIELDS: &str = "id,name,mimeType,webViewLink,iconLink,parents,size,modifiedTime";
const PAGE_SIZE: &str = "1000";
/// Parents per `in parents` query; keeps the `q` parameter well under URL limits.
const PARENTS_PER_QUERY: usize = 40;
const MULTIPART_BOUNDARY: &str = "docsgate_multipart_boundary";

/// Drive client acting on behalf of one account.
///
/// Every request asks the token lifecycle manager for a bearer token, so an
/// expired token is refreshed transparently and a revoked one surfaces as
/// `Error::NotAuthorized` with the consent URL.
pub struct DriveClient {
    http: Client,
    manager: Arc<TokenLifecycleManager>,
    account: AccountId,
}

impl DriveClient {
    /// Create a new Drive client for `account`.
    ///
    /// # Errors
    /// - HTTP client construction failure
    pub fn new(manager: Arc<TokenLifecycleManager>, account: AccountId) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("docsgate/", env!("CARGO_PKG_VERSION")))
            .timeout(manager.config().request_timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            manager,
            account,
        })
    }

    /// Account whose credential authorizes the requests.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.manager.access_token(&self.account).await?;
        Ok(format!("Bearer {}", token))
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get file: {}", e)))?;

        self.handle_response(response).await
    }

    /// Run a files.list query, following pagination.
    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>> {
        let url = format!("{}/files", DRIVE_API_BASE);
        let fields = format!("files({}),nextPageToken", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.auth_header().await?;

            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, auth)
                .query(&[
                    ("q", query),
                    ("fields", fields.as_str()),
                    ("pageSize", PAGE_SIZE),
                ]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list files: {}", e)))?;

            let list_response: FileListResponse = self.handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// List the non-trashed folders directly inside `parent_id`.
    pub async fn list_subfolders(&self, parent_id: &str) -> Result<Vec<DriveFile>> {
        let query = format!(
            "'{}' in parents and mimeType = '{}' and trashed = false",
            escape_query(parent_id),
            FOLDER_MIME_TYPE
        );
        self.list_files(&query).await
    }

    /// List the non-trashed files directly inside any of `parent_ids`.
    pub async fn list_files_in(&self, parent_ids: &[String]) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        for chunk in parent_ids.chunks(PARENTS_PER_QUERY) {
            files.extend(self.list_files(&parents_query(chunk)).await?);
        }
        Ok(files)
    }

    /// The folder itself, its subfolders, and the files inside each subfolder.
    pub async fn folder_contents(&self, folder_id: &str) -> Result<FolderContents> {
        let folder = self.get_file(folder_id).await?;
        let subfolders = self.list_subfolders(folder_id).await?;

        let files = if subfolders.is_empty() {
            Vec::new()
        } else {
            let ids: Vec<String> = subfolders.iter().map(|f| f.id.clone()).collect();
            self.list_files_in(&ids).await?
        };

        debug!(
            "Folder {} has {} subfolders and {} files",
            folder_id,
            subfolders.len(),
            files.len()
        );
        Ok(FolderContents::assemble(folder, subfolders, files))
    }

    /// Create a folder.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<DriveFile> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("folder name is empty".to_string()));
        }

        let url = format!("{}/files", DRIVE_API_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id]
        });

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to create folder: {}", e)))?;

        let folder: DriveFile = self.handle_response(response).await?;
        info!("Created folder {} ({}) in {}", folder.name, folder.id, parent_id);
        Ok(folder)
    }

    /// Upload a file in a single multipart request.
    pub async fn upload_file(
        &self,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile> {
        let url = format!("{}/files", DRIVE_UPLOAD_BASE);
        let auth = self.auth_header().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id]
        });
        let body = multipart_body(&serde_json::to_string(&metadata)?, mime_type, &data);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to upload file: {}", e)))?;

        let file: DriveFile = self.handle_response(response).await?;
        info!("Uploaded {} ({} bytes) as {}", name, data.len(), file.id);
        Ok(file)
    }

    /// Delete a file.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .delete(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to delete file: {}", e)))?;

        if response.status().is_success() {
            info!("Deleted file {}", file_id);
            Ok(())
        } else {
            Err(Self::status_error(response, "Delete").await)
        }
    }

    /// Export a Google Doc as PDF.
    pub async fn export_pdf(&self, file_id: &str) -> Result<ExportedDocument> {
        let file = self.get_file(file_id).await?;
        let url = format!("{}/files/{}/export", DRIVE_API_BASE, file_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("mimeType", "application/pdf")])
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to export file: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, "Export").await);
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read export response: {}", e)))?;

        Ok(ExportedDocument {
            file_name: pdf_file_name(&file.name),
            data,
        })
    }

    /// Fetch a Google Docs document.
    pub async fn document(&self, document_id: &str) -> Result<Document> {
        let url = format!("{}/documents/{}", DOCS_API_BASE, document_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to get document: {}", e)))?;

        self.handle_response(response).await
    }

    /// Plain text of a Google Docs document.
    pub async fn document_text(&self, document_id: &str) -> Result<String> {
        Ok(self.document(document_id).await?.plain_text())
    }

    /// List who has access to a file or folder.
    pub async fn list_permissions(&self, file_id: &str) -> Result<Vec<Permission>> {
        let url = format!("{}/files/{}/permissions", DRIVE_API_BASE, file_id);
        let mut permissions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let auth = self.auth_header().await?;
            let mut request = self
                .http
                .get(&url)
                .header(header::AUTHORIZATION, auth)
                .query(&[(
                    "fields",
                    "permissions(id,emailAddress,role),nextPageToken",
                )]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Network(format!("Failed to list permissions: {}", e)))?;

            let page: PermissionListResponse = self.handle_response(response).await?;
            permissions.extend(page.permissions);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(permissions)
    }

    /// Handle API response with error checking.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Network(format!("Failed to parse response: {}", e)))
        } else {
            Err(Self::status_error(response, "API").await)
        }
    }

    async fn status_error(response: reqwest::Response, what: &str) -> Error {
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Error::NotFound("Resource not found".to_string()),
            StatusCode::UNAUTHORIZED => {
                Error::Authentication("Invalid or expired token".to_string())
            }
            StatusCode::FORBIDDEN => Error::PermissionDenied("Access denied".to_string()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Error::Network(format!("{} error: {} - {}", what, status, body))
            }
        }
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn parents_query(parent_ids: &[String]) -> String {
    let clauses: Vec<String> = parent_ids
        .iter()
        .map(|id| format!("'{}' in parents", escape_query(id)))
        .collect();
    format!("({}) and trashed = false", clauses.join(" or "))
}

fn pdf_file_name(name: &str) -> String {
    let stem = if name.trim().is_empty() { "document" } else { name };
    format!("{}.pdf", stem)
}

fn multipart_body(metadata_json: &str, mime_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + metadata_json.len() + 256);

    // Metadata part
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    // Data part
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--", MULTIPART_BOUNDARY).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("plain"), "plain");
        assert_eq!(escape_query("O'Brien"), "O\\'Brien");
        assert_eq!(escape_query("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_parents_query() {
        let ids = vec!["s1".to_string(), "s2".to_string()];
        assert_eq!(
            parents_query(&ids),
            "('s1' in parents or 's2' in parents) and trashed = false"
        );
    }

    #[test]
    fn test_pdf_file_name() {
        assert_eq!(pdf_file_name("Handbook"), "Handbook.pdf");
        assert_eq!(pdf_file_name(""), "document.pdf");
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(r#"{"name":"a.pdf"}"#, "application/pdf", b"%PDF-1.4");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{}\r\n", MULTIPART_BOUNDARY)));
        assert!(text.contains("Content-Type: application/json; charset=UTF-8\r\n\r\n{\"name\":\"a.pdf\"}\r\n"));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF-1.4\r\n"));
        assert!(text.ends_with(&format!("--{}--", MULTIPART_BOUNDARY)));
    }
}
