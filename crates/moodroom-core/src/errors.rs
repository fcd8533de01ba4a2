use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("Configuration invalid: {reason}")]
    Invalid { reason: String },
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token request failed: {reason}")]
    Request { reason: String },

    #[error("Failed to get token: HTTP status {status}")]
    Status { status: u16, body: String },

    #[error("Token response has no token field")]
    MissingToken,

    #[error("Invalid token response: {reason}")]
    Decode { reason: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Failed to enable camera/microphone: {reason}")]
    MediaUnavailable { reason: String },
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model artifact missing: {path}")]
    MissingArtifact { path: PathBuf },

    #[error("Model load failed: {reason}")]
    LoadFailed { reason: String },

    #[error("Model not loaded")]
    NotLoaded,

    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Already joined room '{room_name}'")]
    AlreadyJoined { room_name: String },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Token: {0}")]
    Token(#[from] TokenError),

    #[error("Transport: {0}")]
    Transport(#[from] TransportError),
}
