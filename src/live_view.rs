//! Live dashboard of recent resolutions.
//!
//! A single task drains the event channel into a per-domain table and redraws
//! it on a fixed cadence. Whichever of "event arrived" and "timer fired" is
//! ready first gets serviced, so sparse traffic still refreshes the screen
//! and bursts do not delay the next frame beyond one event.

use std::{
    collections::BTreeMap,
    io::{self, Write},
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use chrono::{DateTime, Local};
use log::{debug, error};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::errors::DnsError;
use crate::event::{EventReceiver, QueryEvent};

/// ANSI cursor-home followed by erase-display.
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Title line drawn at the top of every frame.
pub const BANNER: &str = "smolboy-dns :: live query feed";

const DOMAIN_WIDTH: usize = 32;
const ADDRESS_WIDTH: usize = 15;
const SOURCE_WIDTH: usize = 24;
const SEEN_WIDTH: usize = 9;

/// Latest resolution seen for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedEntry {
    pub address: Ipv4Addr,
    pub source: IpAddr,
    pub last_seen: DateTime<Local>,
}

/// Domain-keyed table of the most recent event per domain.
#[derive(Debug, Default)]
pub struct AggregationTable {
    entries: BTreeMap<String, AggregatedEntry>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event`, replacing whatever was known about its domain.
    pub fn apply(&mut self, event: QueryEvent) {
        self.entries.insert(
            event.domain,
            AggregatedEntry {
                address: event.resolved_address,
                source: event.source_address,
                last_seen: event.timestamp,
            },
        );
    }

    pub fn get(&self, domain: &str) -> Option<&AggregatedEntry> {
        self.entries.get(domain)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the current rows, sorted by domain.
    pub fn snapshot(&self) -> Vec<(String, AggregatedEntry)> {
        self.entries
            .iter()
            .map(|(domain, entry)| (domain.clone(), entry.clone()))
            .collect()
    }
}

/// Draw one frame: clear the screen, then the table and a footer.
pub fn render_table<W: Write>(
    out: &mut W,
    rows: &[(String, AggregatedEntry)],
    dropped: u64,
) -> io::Result<()> {
    let border = format!(
        "+{}+{}+{}+{}+",
        "-".repeat(DOMAIN_WIDTH + 2),
        "-".repeat(ADDRESS_WIDTH + 2),
        "-".repeat(SOURCE_WIDTH + 2),
        "-".repeat(SEEN_WIDTH + 2),
    );

    write!(out, "{CLEAR_SCREEN}")?;
    writeln!(out, "{BANNER}")?;
    writeln!(out, "{border}")?;
    writeln!(
        out,
        "| {:<DOMAIN_WIDTH$} | {:<ADDRESS_WIDTH$} | {:<SOURCE_WIDTH$} | {:<SEEN_WIDTH$} |",
        "Domain", "IP Address", "Source IP", "Last Seen"
    )?;
    writeln!(out, "{border}")?;

    for (domain, entry) in rows {
        writeln!(
            out,
            "| {:<DOMAIN_WIDTH$} | {:<ADDRESS_WIDTH$} | {:<SOURCE_WIDTH$} | {:<SEEN_WIDTH$} |",
            fit(domain, DOMAIN_WIDTH),
            entry.address.to_string(),
            fit(&entry.source.to_string(), SOURCE_WIDTH),
            entry.last_seen.format("%H:%M:%S").to_string(),
        )?;
    }

    writeln!(out, "{border}")?;
    writeln!(out, "{} domains, {} dropped events", rows.len(), dropped)?;
    out.flush()
}

/// Truncate `value` to `width` characters, marking the cut with `~`.
fn fit(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

/// The dashboard task.
pub struct LiveView<W> {
    receiver: EventReceiver,
    table: AggregationTable,
    refresh: Duration,
    out: W,
}

impl<W: Write> LiveView<W> {
    pub fn new(receiver: EventReceiver, refresh: Duration, out: W) -> Self {
        Self {
            receiver,
            table: AggregationTable::new(),
            refresh,
            out,
        }
    }

    /// Run until every event sender is dropped. A final frame is drawn once
    /// the channel is drained.
    pub async fn run(mut self) -> Result<(), DnsError> {
        let mut ticker = time::interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.receiver.receive() => match event {
                    Some(event) => self.table.apply(event),
                    None => {
                        debug!("Event channel closed, stopping live view");
                        self.render()?;
                        return Ok(());
                    }
                },
                _ = ticker.tick() => self.render()?,
            }
        }
    }

    /// Run on the tokio runtime. A failure that ends the view is logged, the
    /// responder keeps serving without it.
    pub fn spawn(self) -> JoinHandle<()>
    where
        W: Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!("Live view stopped: {}", e);
            }
        })
    }

    fn render(&mut self) -> Result<(), DnsError> {
        let rows = self.table.snapshot();
        render_table(&mut self.out, &rows, self.receiver.dropped())?;
        Ok(())
    }
}
