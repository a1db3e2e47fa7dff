//! Upload gateway (tusd) webhook payloads.
//!
//! The gateway POSTs a JSON body for every lifecycle hook and names the hook in
//! a header. Only `pre-create` and `post-finish` drive the pipeline; the other
//! hooks parse but convert to no event.

use ath_ids::UploadId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Metadata key the upload client uses to carry its correlation id.
pub const UPLOAD_ID_METADATA_KEY: &str = "upload_id";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("Hook metadata has no '{UPLOAD_ID_METADATA_KEY}' entry")]
    MissingUploadId,

    #[error("Hook metadata carries an invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("post-finish hook for upload {0} has no storage key")]
    MissingStorageKey(UploadId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookName {
    PreCreate,
    PostCreate,
    PostReceive,
    PreFinish,
    PostFinish,
    PostTerminate,
}

impl HookName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::PreCreate => "pre-create",
            HookName::PostCreate => "post-create",
            HookName::PostReceive => "post-receive",
            HookName::PreFinish => "pre-finish",
            HookName::PostFinish => "post-finish",
            HookName::PostTerminate => "post-terminate",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre-create" => Ok(HookName::PreCreate),
            "post-create" => Ok(HookName::PostCreate),
            "post-receive" => Ok(HookName::PostReceive),
            "pre-finish" => Ok(HookName::PreFinish),
            "post-finish" => Ok(HookName::PostFinish),
            "post-terminate" => Ok(HookName::PostTerminate),
            _ => Err(format!("Unknown hook name: '{}'", s)),
        }
    }
}

/// Where the gateway put the finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Storage {
    #[serde(rename = "filestore")]
    File {
        #[serde(rename = "Path")]
        path: String,
    },
    #[serde(rename = "s3store")]
    S3 {
        #[serde(rename = "Bucket")]
        bucket: String,
        #[serde(rename = "Key")]
        key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Upload {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub size_is_deferred: bool,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub partial_uploads: Option<Vec<String>>,
    #[serde(rename = "MetaData", default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub storage: Option<Storage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    #[serde(rename = "Method", default)]
    pub method: String,
    #[serde(rename = "URI", default)]
    pub uri: String,
    #[serde(rename = "RemoteAddr", default)]
    pub remote_addr: String,
    #[serde(rename = "Header", default)]
    pub header: BTreeMap<String, Vec<String>>,
}

/// Full webhook request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookBody {
    #[serde(rename = "Upload")]
    pub upload: Upload,
    #[serde(rename = "HTTPRequest", default)]
    pub http_request: HttpRequest,
}

/// The two gateway events the ingestor acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    PreCreate {
        upload_id: UploadId,
        metadata: BTreeMap<String, String>,
    },
    PostFinish {
        upload_id: UploadId,
        storage_key: String,
        metadata: BTreeMap<String, String>,
    },
}

impl UploadEvent {
    pub fn upload_id(&self) -> &UploadId {
        match self {
            UploadEvent::PreCreate { upload_id, .. } => upload_id,
            UploadEvent::PostFinish { upload_id, .. } => upload_id,
        }
    }

    /// Convert a raw hook into an event. Hooks other than `pre-create` and
    /// `post-finish` yield `Ok(None)`.
    pub fn from_hook(name: HookName, body: &HookBody) -> Result<Option<Self>, HookError> {
        if !matches!(name, HookName::PreCreate | HookName::PostFinish) {
            return Ok(None);
        }

        let raw = body
            .upload
            .metadata
            .get(UPLOAD_ID_METADATA_KEY)
            .ok_or(HookError::MissingUploadId)?;
        let upload_id =
            UploadId::parse(raw).map_err(|e| HookError::InvalidUploadId(e.to_string()))?;
        let metadata = body.upload.metadata.clone();

        if name == HookName::PreCreate {
            return Ok(Some(UploadEvent::PreCreate {
                upload_id,
                metadata,
            }));
        }

        match &body.upload.storage {
            Some(Storage::S3 { key, .. }) if !key.is_empty() => Ok(Some(UploadEvent::PostFinish {
                upload_id,
                storage_key: key.clone(),
                metadata,
            })),
            _ => Err(HookError::MissingStorageKey(upload_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPLOAD: &str = "5f0e4d0c-3b1a-4c59-9d55-1f2f3b4c5d6e";

    fn body(storage: &str) -> HookBody {
        let json = format!(
            r#"{{
                "Upload": {{
                    "ID": "abc123",
                    "Size": 2048,
                    "SizeIsDeferred": false,
                    "Offset": 2048,
                    "IsFinal": false,
                    "IsPartial": false,
                    "PartialUploads": null,
                    "MetaData": {{"filename": "prs.csv", "upload_id": "{UPLOAD}"}},
                    "Storage": {storage}
                }},
                "HTTPRequest": {{
                    "Method": "PATCH",
                    "URI": "/files/abc123",
                    "RemoteAddr": "127.0.0.1:51234",
                    "Header": {{"Tus-Resumable": ["1.0.0"]}}
                }}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn parses_s3_post_finish() {
        let body = body(r#"{"Type": "s3store", "Bucket": "csvs", "Key": "abc123"}"#);
        let event = UploadEvent::from_hook(HookName::PostFinish, &body)
            .unwrap()
            .unwrap();
        match event {
            UploadEvent::PostFinish {
                upload_id,
                storage_key,
                metadata,
            } => {
                assert_eq!(upload_id.as_str(), UPLOAD);
                assert_eq!(storage_key, "abc123");
                assert_eq!(metadata["filename"], "prs.csv");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn pre_create_ignores_storage() {
        let body = body("null");
        let event = UploadEvent::from_hook(HookName::PreCreate, &body)
            .unwrap()
            .unwrap();
        assert!(matches!(event, UploadEvent::PreCreate { .. }));
        assert_eq!(event.upload_id().as_str(), UPLOAD);
    }

    #[test]
    fn post_finish_without_key_is_rejected() {
        let body = body(r#"{"Type": "filestore", "Path": "/srv/tusd/abc123"}"#);
        let err = UploadEvent::from_hook(HookName::PostFinish, &body).unwrap_err();
        assert!(matches!(err, HookError::MissingStorageKey(_)));
    }

    #[test]
    fn missing_upload_id_is_rejected() {
        let mut body = body("null");
        body.upload.metadata.remove(UPLOAD_ID_METADATA_KEY);
        assert_eq!(
            UploadEvent::from_hook(HookName::PreCreate, &body).unwrap_err(),
            HookError::MissingUploadId
        );
    }

    #[test]
    fn other_hooks_are_ignored() {
        let body = body("null");
        assert!(UploadEvent::from_hook(HookName::PostReceive, &body)
            .unwrap()
            .is_none());
    }

    #[test]
    fn hook_name_parse() {
        assert_eq!("post-finish".parse::<HookName>().unwrap(), HookName::PostFinish);
        assert!("pre-terminate".parse::<HookName>().is_err());
    }
}
