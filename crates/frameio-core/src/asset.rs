use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Server-side checksums attached to a file asset once ingestion finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    #[serde(default)]
    pub xx_hash: Option<String>,
}

/// Remote asset metadata as returned by the assets endpoints.
///
/// Only the fields the transfer engine needs are modelled; everything else in
/// the payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "_type", default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub filesize: u64,
    #[serde(rename = "is_session_watermarked", default)]
    pub watermarked: bool,
    #[serde(default)]
    pub checksums: Option<Checksums>,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub downloads: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub upload_urls: Vec<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub upload_completed_at: Option<String>,
}

impl Asset {
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Assets without a `_type` predate the field and are treated as files.
    pub fn is_file(&self) -> bool {
        self.asset_type.as_deref().map_or(true, |t| t == "file")
    }

    pub fn is_folder(&self) -> bool {
        self.asset_type.as_deref() == Some("folder")
    }

    /// True once server-side ingestion has completed.
    pub fn is_ready(&self) -> bool {
        self.upload_completed_at.is_some()
    }

    /// The xxHash64 digest computed by the service, if any.
    pub fn xx_hash(&self) -> Option<&str> {
        self.checksums
            .as_ref()
            .and_then(|c| c.xx_hash.as_deref())
            .filter(|h| !h.is_empty())
    }

    /// Pick the URL to download from.
    ///
    /// The original upload wins. Watermarked assets without one fall back to
    /// the highest numeric resolution in `downloads`, whose keys look like
    /// `h264_1080_best`.
    pub fn download_url(&self) -> Option<&str> {
        if let Some(url) = self.original.as_deref() {
            return Some(url);
        }
        if !self.watermarked {
            return None;
        }

        let mut candidates: Vec<(u32, &str)> = self
            .downloads
            .iter()
            .filter_map(|(key, url)| {
                let resolution = key.split('_').nth(1)?.parse::<u32>().ok()?;
                Some((resolution, url.as_deref()?))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        candidates.first().map(|(_, url)| *url)
    }

    /// Content type sent with each upload chunk.
    pub fn content_type(&self) -> &str {
        self.filetype
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("application/octet-stream")
    }
}
