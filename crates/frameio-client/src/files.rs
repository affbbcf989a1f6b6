use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ClientError;

/// Body of a create-asset call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAsset {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
}

impl NewAsset {
    pub fn file(name: impl Into<String>, filesize: u64, filetype: Option<String>) -> Self {
        Self {
            kind: "file".into(),
            name: name.into(),
            filetype,
            filesize: Some(filesize),
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            kind: "folder".into(),
            name: name.into(),
            filetype: None,
            filesize: None,
        }
    }

    /// Describe a local file for upload.
    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(ClientError::InvalidPath(path.to_path_buf()));
        }
        Ok(Self::file(file_name(path)?, meta.len(), guess_filetype(path)))
    }
}

pub(crate) fn file_name(path: &Path) -> Result<String, ClientError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ClientError::InvalidPath(path.to_path_buf()))
}

/// MIME type for common media extensions; `None` when unknown.
pub fn guess_filetype(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mxf" => "application/mxf",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/x-wav",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mime.to_string())
}

/// Finder metadata that is never uploaded.
const IGNORED_NAMES: &[&str] = &[".DS_Store"];

/// Directory entries split into subdirectories and files, each sorted by name.
pub(crate) fn read_dir_sorted(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ClientError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| IGNORED_NAMES.contains(&n)) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}
