use std::path::Path;

use anyhow::{Context, Result};

use crate::api::FormPart;

/// An image attached to a tweet or used as an avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = Self::guess_mime(&file_name).map(str::to_string);
        Self {
            file_name,
            bytes,
            mime,
        }
    }

    /// Read an image from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read upload: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("Upload path has no file name: {}", path.display()))?;
        Ok(Self::new(file_name, bytes))
    }

    fn guess_mime(file_name: &str) -> Option<&'static str> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }

    pub(crate) fn into_part(self, field: &str) -> FormPart {
        FormPart::File {
            name: field.to_string(),
            file_name: self.file_name,
            bytes: self.bytes,
            mime: self.mime,
        }
    }
}
