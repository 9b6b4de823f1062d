//! Import, export and upload payloads.

use serde::{Deserialize, Serialize};

/// In-memory file handed to an upload or import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Lower-cased extension including the dot, e.g. `.png`.
    pub fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_ascii_lowercase()))
    }
}

/// Where imported recipes come from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// A `.paprikarecipes` archive
    Paprika(UploadFile),
    /// A recipe page to scrape
    Url(String),
    /// Plain text or markdown files
    Files(Vec<UploadFile>),
}

impl ImportSource {
    pub fn describe(&self) -> String {
        match self {
            ImportSource::Paprika(file) => format!("paprika:{}", file.file_name),
            ImportSource::Url(url) => format!("url:{}", url),
            ImportSource::Files(files) => format!("files:{}", files.len()),
        }
    }
}

/// Request body for importing from a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlImportRequest {
    pub url: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportResult {
    pub imported: u32,
    #[serde(default)]
    pub skipped: u32,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Export file format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Paprika,
    Markdown,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paprika" => Some(ExportFormat::Paprika),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }
}

/// Which recipes to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Recipe(String),
    Saved,
    Library,
}

/// A fire-and-forget export; the result is streamed to the caller and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub scope: ExportScope,
}

impl ExportRequest {
    /// Service path relative to the API base URL.
    pub fn path(&self) -> String {
        let prefix = match self.format {
            ExportFormat::Paprika => "/paprika",
            ExportFormat::Markdown => "/markdown",
        };
        match &self.scope {
            ExportScope::Recipe(id) => format!("{}/export/{}", prefix, urlencoding::encode(id)),
            ExportScope::Saved => format!("{}/export", prefix),
            ExportScope::Library => format!("{}/export-all", prefix),
        }
    }
}

/// Outcome of searching images for recipes that have none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackfillResult {
    pub total: u32,
    pub updated: u32,
    #[serde(default)]
    pub pexels_key_set: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}
