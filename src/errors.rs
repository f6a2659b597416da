//! Error types for the DNS responder.
//!
//! This module defines the error type used throughout the responder, from
//! configuration loading to datagram decoding.

use thiserror::Error;

/// Represents errors that can occur in the DNS responder.
#[derive(Error, Debug)]
pub enum DnsError {
    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to DNS protocol parsing or formatting.
    #[error("Invalid DNS packet: {0}")]
    Protocol(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or extra command line arguments.
    #[error("{0}")]
    Usage(String),

    /// The metrics exporter could not be installed.
    #[error("Metrics error: {0}")]
    Metrics(String),
}
