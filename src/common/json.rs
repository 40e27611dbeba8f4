use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Server-assigned identifier of an upload session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub String);

/// Identifier of the finished object, returned once by finalize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FileId(pub String);

macro_rules! impl_id {
    ($id:ident) => {
        impl $id {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $id {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $id {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }
    };
}

impl_id!(SessionId);
impl_id!(FileId);

/// Body of `POST /sessions`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionParam {
    /// File name
    pub name: String,

    /// File size in bytes
    pub size: u64,

    pub chunk_size: u64,

    pub chunk_count: usize,
}

/// Successful reply of `POST /sessions`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionOpened {
    pub session_id: SessionId,
}

/// Reply of `GET /sessions/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: SessionId,

    pub name: String,

    pub size: u64,

    pub chunk_size: u64,

    pub chunk_count: usize,

    /// Chunk indices the server already holds
    pub received: Vec<Range<usize>>,
}

/// Successful reply of `POST /sessions/{id}/finalize`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Finalized {
    pub file_id: FileId,
}

/// Body sent alongside any non-success status.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, thiserror::Error)]
#[serde(tag = "type")]
pub enum ErrorDetail {
    /// File exceeds what the server accepts
    #[error("file size exceeds the limit of {max} bytes")]
    Size { max: u64 },

    /// Chunk size not acceptable, with the largest the server allows
    #[error("chunk size exceeds the limit of {max} bytes")]
    ChunkSize { max: u64 },

    #[error("unknown session")]
    UnknownSession,

    /// The chunk does not match its declared length, offset or digest
    #[error("chunk rejected: {detail}")]
    ChunkMismatch { detail: String },

    /// Finalize called while chunks are missing
    #[error("chunks missing: {missing:?}")]
    Incomplete { missing: Vec<Range<usize>> },

    #[error("{detail}")]
    Other { detail: String },
}

impl ErrorDetail {
    pub fn into_body(self) -> ErrorBody {
        ErrorBody { error: self }
    }
}
