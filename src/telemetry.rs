//! Process counters exported through the `metrics` facade.
//!
//! Without an installed recorder these calls are no-ops.

use std::net::SocketAddr;

use log::info;
use metrics::increment_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::errors::DnsError;

pub const QUERIES_TOTAL: &str = "dns_queries_total";
pub const ANSWERS_TOTAL: &str = "dns_answers_total";
pub const EVENTS_DROPPED_TOTAL: &str = "dns_events_dropped_total";

/// Serve Prometheus metrics over HTTP on `addr`.
pub fn install_exporter(addr: SocketAddr) -> Result<(), DnsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| DnsError::Metrics(e.to_string()))?;
    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

pub fn query_received() {
    increment_counter!(QUERIES_TOTAL);
}

pub fn answer_sent() {
    increment_counter!(ANSWERS_TOTAL);
}

pub fn event_dropped() {
    increment_counter!(EVENTS_DROPPED_TOTAL);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::OnceLock;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

    /// One recorder per process; each test reads only its own thread's values.
    fn snapshotter() -> &'static Snapshotter {
        static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
        SNAPSHOTTER.get_or_init(|| {
            let recorder = DebuggingRecorder::per_thread();
            let snapshotter = recorder.snapshotter();
            recorder.install().expect("recorder already installed");
            snapshotter
        })
    }

    /// Counter values recorded on the current thread.
    fn counters() -> HashMap<String, u64> {
        snapshotter();
        Snapshotter::current_thread_snapshot()
            .map(|snapshot| snapshot.into_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(n) => Some((key.key().name().to_string(), n)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn counts_queries_answers_and_drops() {
        snapshotter();
        Snapshotter::clear_current_thread();

        query_received();
        query_received();
        answer_sent();
        event_dropped();
        event_dropped();
        event_dropped();

        let counters = counters();
        assert_eq!(counters[QUERIES_TOTAL], 2);
        assert_eq!(counters[ANSWERS_TOTAL], 1);
        assert_eq!(counters[EVENTS_DROPPED_TOTAL], 3);
    }

    #[test]
    fn full_channel_increments_drop_counter() {
        snapshotter();
        Snapshotter::clear_current_thread();

        let (tx, _rx) = crate::event::event_channel(1);
        let event = || {
            crate::event::QueryEvent::new(
                "a.test.",
                std::net::Ipv4Addr::new(10, 0, 0, 1),
                std::net::IpAddr::from([192, 0, 2, 1]),
            )
        };
        tx.try_send(event());
        tx.try_send(event());
        tx.try_send(event());

        assert_eq!(counters()[EVENTS_DROPPED_TOTAL], 2);
    }
}
