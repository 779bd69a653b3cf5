//! Drive and Docs API payloads.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Link that opens the file in the Drive web UI.
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub icon_link: Option<String>,
    /// Parent folder IDs.
    #[serde(default)]
    pub parents: Vec<String>,
    /// File size in bytes (only for binary files).
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// Response from listing files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A subfolder of the document root together with the files inside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubfolderContents {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub files: Vec<DriveFile>,
}

/// The document root folder and one level of subfolders with their files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderContents {
    pub folder: DriveFile,
    pub subfolders: Vec<SubfolderContents>,
}

impl FolderContents {
    /// Attach `files` to the subfolders they live in.
    ///
    /// A file with several parents is listed under each of them; files whose
    /// parents are not among `subfolders` are dropped. Subfolder order is kept.
    pub fn assemble(folder: DriveFile, subfolders: Vec<DriveFile>, files: Vec<DriveFile>) -> Self {
        let mut grouped: HashMap<String, Vec<DriveFile>> = HashMap::new();
        for file in files {
            for parent in &file.parents {
                grouped.entry(parent.clone()).or_default().push(file.clone());
            }
        }

        let subfolders = subfolders
            .into_iter()
            .map(|sub| SubfolderContents {
                files: grouped.remove(&sub.id).unwrap_or_default(),
                id: sub.id,
                name: sub.name,
                web_view_link: sub.web_view_link,
            })
            .collect();

        Self { folder, subfolders }
    }
}

/// One entry of a file's permission list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub id: Option<String>,
    /// Absent for `anyone` and `domain` permissions.
    #[serde(default)]
    pub email_address: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PermissionListResponse {
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A Google Doc exported to PDF.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    /// `<document name>.pdf`
    pub file_name: String,
    pub data: Bytes,
}

/// Google Docs document, reduced to what text extraction needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<Body>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub content: Vec<StructuralElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StructuralElement {
    #[serde(default)]
    pub paragraph: Option<Paragraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub elements: Vec<ParagraphElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphElement {
    #[serde(default)]
    pub text_run: Option<TextRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub content: String,
}

impl Document {
    /// Concatenate the text runs of all top-level paragraphs.
    ///
    /// Tables, section breaks and other non-paragraph elements are skipped.
    pub fn plain_text(&self) -> String {
        self.body
            .iter()
            .flat_map(|body| &body.content)
            .filter_map(|element| element.paragraph.as_ref())
            .flat_map(|paragraph| &paragraph.elements)
            .filter_map(|element| element.text_run.as_ref())
            .map(|run| run.content.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, name: &str, mime: &str, parents: &[&str]) -> DriveFile {
        DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some(mime.to_string()),
            web_view_link: None,
            icon_link: None,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            size: None,
            modified_time: None,
        }
    }

    #[test]
    fn test_drive_file_is_folder() {
        assert!(file("1", "folder", FOLDER_MIME_TYPE, &[]).is_folder());
        assert!(!file("2", "doc", "application/pdf", &[]).is_folder());
    }

    #[test]
    fn test_drive_file_size_bytes() {
        let mut pdf = file("1", "a.pdf", "application/pdf", &[]);
        pdf.size = Some("12345".to_string());
        assert_eq!(pdf.size_bytes(), Some(12345));

        let folder = file("2", "folder", FOLDER_MIME_TYPE, &[]);
        assert_eq!(folder.size_bytes(), None);
    }

    #[test]
    fn test_drive_file_deserializes_partial_fields() {
        let json = r#"{"id": "abc", "name": "Handbook", "webViewLink": "https://docs.google.com/d/abc"}"#;
        let parsed: DriveFile = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.id, "abc");
        assert_eq!(parsed.web_view_link.as_deref(), Some("https://docs.google.com/d/abc"));
        assert!(parsed.parents.is_empty());
        assert!(parsed.mime_type.is_none());
    }

    #[test]
    fn test_assemble_groups_files_by_parent() {
        let root = file("root", "Docs", FOLDER_MIME_TYPE, &[]);
        let subfolders = vec![
            file("s1", "HR", FOLDER_MIME_TYPE, &["root"]),
            file("s2", "Finance", FOLDER_MIME_TYPE, &["root"]),
            file("s3", "Empty", FOLDER_MIME_TYPE, &["root"]),
        ];
        let files = vec![
            file("f1", "leave.pdf", "application/pdf", &["s1"]),
            file("f2", "budget", "application/vnd.google-apps.document", &["s2"]),
            file("f3", "policy", "application/vnd.google-apps.document", &["s1", "s2"]),
            file("f4", "stray", "text/plain", &["elsewhere"]),
        ];

        let contents = FolderContents::assemble(root.clone(), subfolders, files);

        assert_eq!(contents.folder, root);
        let names: Vec<_> = contents.subfolders.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["HR", "Finance", "Empty"]);

        let ids = |i: usize| -> Vec<&str> {
            contents.subfolders[i].files.iter().map(|f| f.id.as_str()).collect()
        };
        assert_eq!(ids(0), vec!["f1", "f3"]);
        assert_eq!(ids(1), vec!["f2", "f3"]);
        assert!(ids(2).is_empty());
    }

    #[test]
    fn test_document_plain_text() {
        let json = r#"{
            "documentId": "doc1",
            "title": "Guide",
            "body": {
                "content": [
                    {"sectionBreak": {}},
                    {"paragraph": {"elements": [
                        {"textRun": {"content": "Hello, "}},
                        {"textRun": {"content": "world.\n"}}
                    ]}},
                    {"table": {"rows": 1}},
                    {"paragraph": {"elements": [
                        {"inlineObjectElement": {}},
                        {"textRun": {"content": "Second line\n"}}
                    ]}}
                ]
            }
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.plain_text(), "Hello, world.\nSecond line\n");
    }

    #[test]
    fn test_document_without_body() {
        let doc: Document = serde_json::from_str(r#"{"documentId": "x"}"#).unwrap();
        assert_eq!(doc.plain_text(), "");
    }

    #[test]
    fn test_permission_without_email() {
        let json = r#"{"permissions": [
            {"id": "1", "emailAddress": "a@x.com", "role": "writer"},
            {"id": "anyoneWithLink", "role": "reader"}
        ]}"#;
        let parsed: PermissionListResponse = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.permissions.len(), 2);
        assert_eq!(parsed.permissions[0].email_address.as_deref(), Some("a@x.com"));
        assert!(parsed.permissions[1].email_address.is_none());
    }
}
