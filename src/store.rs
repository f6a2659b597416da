//! Static record storage.
//!
//! Records are read once from a line oriented text file and never change
//! afterwards, so lookups can be shared between query tasks without locking.

use std::{collections::HashMap, fs, net::Ipv4Addr, path::Path, str::FromStr};

use log::{debug, info, warn};

use crate::errors::DnsError;

/// An immutable mapping of fully qualified domain names to IPv4 addresses.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: HashMap<String, Ipv4Addr>,
}

impl RecordStore {
    /// Load records from the file at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to a file containing `<domain> <ipv4>` lines.
    ///
    /// # Returns
    /// The loaded store, or a `DnsError` if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DnsError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            DnsError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let store: Self = data.parse()?;
        info!("Loaded {} records from {}", store.len(), path.display());
        Ok(store)
    }

    /// Exact, case sensitive lookup of a normalized name.
    pub fn lookup(&self, name: &str) -> Option<Ipv4Addr> {
        self.records.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromStr for RecordStore {
    type Err = DnsError;

    /// Lines that do not hold exactly two tokens are skipped; a later line for
    /// the same name replaces an earlier one.
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut records = HashMap::new();

        for (idx, line) in data.lines().enumerate() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [name, addr] = fields.as_slice() else {
                if !fields.is_empty() {
                    debug!("Skipping line {}: expected 2 fields, got {}", idx + 1, fields.len());
                }
                continue;
            };

            match addr.parse::<Ipv4Addr>() {
                Ok(ip) => {
                    records.insert(normalize_name(name), ip);
                }
                Err(_) => warn!("Skipping line {}: invalid IPv4 address {addr:?}", idx + 1),
            }
        }

        Ok(Self { records })
    }
}

/// Append the root label separator if the name lacks it.
pub fn normalize_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn last_definition_of_a_name_wins() {
        let store: RecordStore = "example.test. 10.0.0.5\nexample.test. 10.0.0.9\n"
            .parse()
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("example.test."), Some(Ipv4Addr::new(10, 0, 0, 9)));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let data = "\n   \nonly-one-token\nthree tokens here\nok.test. 192.0.2.7\nbad.test. 999.1.1.1\n";
        let store: RecordStore = data.parse().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("ok.test."), Some(Ipv4Addr::new(192, 0, 2, 7)));
        assert_eq!(store.lookup("bad.test."), None);
    }

    #[test]
    fn names_are_normalized_with_trailing_dot() {
        let store: RecordStore = "plain.test 10.1.1.1".parse().unwrap();
        assert_eq!(store.lookup("plain.test."), Some(Ipv4Addr::new(10, 1, 1, 1)));
        assert_eq!(store.lookup("plain.test"), None);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let store: RecordStore = "Mixed.Test. 10.2.2.2".parse().unwrap();
        assert!(store.lookup("Mixed.Test.").is_some());
        assert!(store.lookup("mixed.test.").is_none());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a.test. 10.0.0.1").unwrap();
        writeln!(file, "b.test.\t10.0.0.2").unwrap();

        let store = RecordStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("b.test."), Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = RecordStore::load(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, DnsError::Config(_)));
    }
}
