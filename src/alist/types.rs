//! Alist API wire types
//!
//! Response shapes for the Alist file-host API. Every endpoint wraps its
//! payload in a `{code, message, data}` envelope whose `code` is an
//! application-level status, independent of the HTTP status line.

use serde::{Deserialize, Deserializer, Serialize};

/// Entry type code Alist assigns to images
pub const ENTRY_TYPE_IMAGE: u8 = 5;

/// Deserialize a field that the API may send as an explicit `null`.
/// Empty directories arrive as `"content": null` rather than `[]`.
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Standard response envelope around every Alist payload
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Application status: 200 success, 401 expired session, others errors
    pub code: u16,
    /// Human-readable status, often "success"
    #[serde(default)]
    pub message: String,
    /// Payload; null on errors and on data-free operations
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Payload of a successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    /// Session token, sent back in the Authorization header
    pub token: String,
}

/// One entry in a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsEntry {
    /// Entry name, not a full path
    pub name: String,
    /// Size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Last-modified timestamp, RFC 3339
    #[serde(default)]
    pub modified: String,
    /// Signature for direct download links, often empty
    #[serde(default)]
    pub sign: String,
    /// Thumbnail URL, empty when the provider has none
    #[serde(default)]
    pub thumb: String,
    /// Entry type code (5 marks an image)
    #[serde(rename = "type", default)]
    pub kind: u8,
}

impl FsEntry {
    /// Whether this entry is an image file
    pub fn is_image(&self) -> bool {
        !self.is_dir && self.kind == ENTRY_TYPE_IMAGE
    }

    /// Thumbnail URL, treating the API's empty string as absent
    pub fn thumbnail(&self) -> Option<&str> {
        if self.thumb.is_empty() {
            None
        } else {
            Some(&self.thumb)
        }
    }
}

/// Payload of `/api/fs/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirListing {
    /// Entries in the directory; the API sends null when empty
    #[serde(default, deserialize_with = "null_to_default")]
    pub content: Vec<FsEntry>,
    /// Total entry count
    #[serde(default)]
    pub total: u64,
    /// Rendered readme for the directory, usually empty
    #[serde(default)]
    pub readme: String,
    /// Whether the session may write here
    #[serde(default)]
    pub write: bool,
    /// Storage provider backing this path
    #[serde(default)]
    pub provider: String,
}

/// Payload of `/api/fs/get`: one file's detail including its download URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name, not a full path
    pub name: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// Whether the path is a directory
    pub is_dir: bool,
    /// Last-modified timestamp, RFC 3339
    #[serde(default)]
    pub modified: String,
    /// Signature for the download link, often empty
    #[serde(default)]
    pub sign: String,
    /// Thumbnail URL, empty when the provider has none
    #[serde(default)]
    pub thumb: String,
    /// Entry type code (5 marks an image)
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Direct download URL
    #[serde(default)]
    pub raw_url: String,
    /// Storage provider backing this path
    #[serde(default)]
    pub provider: String,
}
