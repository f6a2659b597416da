//! Configuration for the DNS responder.
//!
//! The record file path comes from the command line; everything else has a
//! default that can be overridden through environment variables.

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use crate::errors::DnsError;

/// Default TTL for answer records in seconds.
pub const DEFAULT_TTL: u32 = 3600;

/// Maximum size of DNS packets in bytes.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Default capacity of the query event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Default interval between dashboard redraws.
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(1);

/// Responder configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the `<domain> <ipv4>` record file.
    pub records_path: PathBuf,

    /// Address to bind the UDP socket to.
    pub bind_addr: SocketAddr,

    /// Size of the datagram receive buffer.
    pub max_packet_size: usize,

    /// TTL written into every answer record.
    pub ttl: u32,

    /// Capacity of the bounded event channel feeding the live view.
    pub event_capacity: usize,

    /// How often the live view redraws.
    pub refresh_interval: Duration,

    /// Where to expose Prometheus metrics, if anywhere.
    pub metrics_addr: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from the process arguments and environment.
    ///
    /// # Returns
    /// A `Result` containing either the loaded `ServerConfig` or a `DnsError`.
    pub fn from_env() -> Result<Self, DnsError> {
        Self::from_sources(env::args(), |key| env::var(key).ok())
    }

    /// Build a configuration from an argument list (program name first) and
    /// a variable lookup function.
    pub fn from_sources<I, F>(args: I, var: F) -> Result<Self, DnsError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut args = args.into_iter();
        let program = args.next().unwrap_or_else(|| "smolboy-dns".into());
        let records_path = match (args.next(), args.next()) {
            (Some(path), None) => PathBuf::from(path),
            _ => return Err(DnsError::Usage(format!("Usage: {program} <config file>"))),
        };

        let bind_addr = var("DNS_BIND")
            .unwrap_or_else(|| "0.0.0.0:53".into())
            .parse()
            .map_err(|_| DnsError::Config("Invalid DNS_BIND address".into()))?;

        let metrics_addr = match var("DNS_METRICS_BIND") {
            Some(addr) => Some(
                addr.parse()
                    .map_err(|_| DnsError::Config("Invalid DNS_METRICS_BIND address".into()))?,
            ),
            None => None,
        };

        Ok(Self {
            records_path,
            bind_addr,
            max_packet_size: var("DNS_MAX_PACKET_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_PACKET_SIZE),
            ttl: var("DNS_TTL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TTL),
            event_capacity: var("DNS_EVENT_CAPACITY")
                .and_then(|v| v.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            refresh_interval: var("DNS_REFRESH_MS")
                .and_then(|v| v.parse().ok())
                .filter(|&ms: &u64| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_REFRESH),
            metrics_addr,
        })
    }
}
