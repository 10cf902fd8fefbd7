//! Error types for ledgewalker
//!
//! Only administrative operations (config, level and graph loading) return
//! these. The per-tick navigation API never fails; it degrades instead.

use thiserror::Error;

/// Ledgewalker error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unknown waypoint: {0}")]
    UnknownWaypoint(String),

    #[error("invalid graph edge {from} -> {to}: {reason}")]
    InvalidGraphEdge {
        from: usize,
        to: usize,
        reason: &'static str,
    },

    #[error("sensor reference point missing: {0}")]
    SensorUnavailable(&'static str),
}

impl NavError {
    pub fn parse(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        NavError::Parse {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
