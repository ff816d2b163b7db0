//! In-memory authoritative record table.

use rustc_hash::FxHashMap;
use std::net::Ipv4Addr;
use std::sync::RwLock;

use crate::dns::{EncodeError, Name, TYPE_A};

/// Records served when the table is built with [`RecordTable::seeded`].
const SEED_RECORDS: &[(&str, [u8; 4])] = &[
    ("www.example.com", [192, 168, 1, 1]),
    ("example.com", [192, 168, 1, 1]),
    ("test.com", [10, 0, 0, 1]),
    ("localhost", [127, 0, 0, 1]),
    ("google.com", [8, 8, 8, 8]),
];

/// Record data keyed by lowercased domain name, then by record type.
///
/// Keys are the escaped text form of a [`Name`] with ASCII letters
/// lowercased, so `"Example.COM."` and `"example.com"` share a key.
///
/// Lookups take a shared read lock and may run in parallel; `add` and
/// `remove` take the write lock for the duration of the mutation. A
/// poisoned lock reads as an empty table and ignores writes.
pub struct RecordTable {
    records: RwLock<FxHashMap<String, FxHashMap<u16, Vec<u8>>>>,
}

impl RecordTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(FxHashMap::default()),
        }
    }

    /// Create a table holding the default seed records.
    pub fn seeded() -> Self {
        let table = Self::new();
        for (name, ip) in SEED_RECORDS {
            table.insert(name, TYPE_A, ip.to_vec());
        }
        table
    }

    /// Look up data for `name` and `rtype`.
    ///
    /// `name` must already be in key form, see [`RecordTable::key`].
    pub fn lookup(&self, name: &str, rtype: u16) -> Option<Vec<u8>> {
        let Ok(records) = self.records.read() else {
            return None;
        };
        records.get(name)?.get(&rtype).cloned()
    }

    /// Store `data` for `name` and `rtype`, replacing any previous data.
    ///
    /// Data longer than a record's 65535 byte RDATA limit is rejected and
    /// the table is left unchanged.
    pub fn add(&self, name: &str, rtype: u16, data: Vec<u8>) -> Result<(), EncodeError> {
        if data.len() > usize::from(u16::MAX) {
            return Err(EncodeError::RdataTooLong { len: data.len() });
        }
        self.insert(name, rtype, data);
        Ok(())
    }

    /// Store an A record.
    pub fn add_address(&self, name: &str, addr: Ipv4Addr) {
        self.insert(name, TYPE_A, addr.octets().to_vec());
    }

    /// Canonical key for `name`: parsed, ASCII-lowercased, re-rendered.
    pub fn key(name: &Name) -> String {
        name.to_ascii_lowercase().to_string()
    }

    fn insert(&self, name: &str, rtype: u16, data: Vec<u8>) {
        let Ok(mut records) = self.records.write() else {
            return;
        };
        records
            .entry(Self::key(&Name::from(name)))
            .or_default()
            .insert(rtype, data);
    }

    /// Remove the data for `name` and `rtype`.
    ///
    /// Returns whether anything was removed. A name left without any
    /// record types is dropped entirely.
    pub fn remove(&self, name: &str, rtype: u16) -> bool {
        let Ok(mut records) = self.records.write() else {
            return false;
        };
        let name = Self::key(&Name::from(name));
        let Some(types) = records.get_mut(&name) else {
            return false;
        };
        let removed = types.remove(&rtype).is_some();
        if types.is_empty() {
            records.remove(&name);
        }
        removed
    }

    /// Number of names with at least one record.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::TYPE_AAAA;
    use std::sync::Arc;

    #[test]
    fn seeded_contains_default_records() {
        let table = RecordTable::seeded();

        assert_eq!(table.len(), 5);
        assert_eq!(table.lookup("www.example.com", TYPE_A), Some(vec![192, 168, 1, 1]));
        assert_eq!(table.lookup("localhost", TYPE_A), Some(vec![127, 0, 0, 1]));
    }

    #[test]
    fn new_is_empty() {
        let table = RecordTable::new();

        assert!(table.is_empty());
        assert_eq!(table.lookup("www.example.com", TYPE_A), None);
    }

    #[test]
    fn lookup_misses_unknown_name_and_type() {
        let table = RecordTable::seeded();

        assert_eq!(table.lookup("nonexistent.com", TYPE_A), None);
        assert_eq!(table.lookup("www.example.com", TYPE_AAAA), None);
    }

    #[test]
    fn add_lowercases_name() {
        let table = RecordTable::new();
        table.add_address("New.Example.COM", Ipv4Addr::new(192, 168, 1, 100));

        assert_eq!(table.lookup("new.example.com", TYPE_A), Some(vec![192, 168, 1, 100]));
        assert_eq!(table.lookup("New.Example.COM", TYPE_A), None);
    }

    #[test]
    fn add_replaces_existing_data() {
        let table = RecordTable::seeded();
        table.add("test.com", TYPE_A, vec![10, 0, 0, 2]).unwrap();

        assert_eq!(table.lookup("test.com", TYPE_A), Some(vec![10, 0, 0, 2]));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn add_rejects_oversized_data() {
        let table = RecordTable::new();

        assert_eq!(
            table.add("big.example", 16, vec![0; 65536]),
            Err(EncodeError::RdataTooLong { len: 65536 })
        );
        assert!(table.is_empty());

        table.add("big.example", 16, vec![0; 65535]).unwrap();
        assert_eq!(table.lookup("big.example", 16).map(|d| d.len()), Some(65535));
    }

    #[test]
    fn key_lowercases_ascii_only() {
        let name = Name::from_labels([vec![b'A', 0xC9], b"COM".to_vec()]);

        assert_eq!(RecordTable::key(&name), "a\\201.com");
        assert_eq!(RecordTable::key(&Name::from("Example.COM.")), "example.com");
    }

    #[test]
    fn remove_drops_empty_names() {
        let table = RecordTable::new();
        table.add("dual.example", TYPE_A, vec![1, 1, 1, 1]).unwrap();
        table.add("dual.example", TYPE_AAAA, vec![0; 16]).unwrap();

        assert!(table.remove("dual.example", TYPE_A));
        assert_eq!(table.len(), 1);
        assert!(table.lookup("dual.example", TYPE_AAAA).is_some());

        assert!(table.remove("DUAL.example", TYPE_AAAA));
        assert!(table.is_empty());
    }

    #[test]
    fn remove_missing_record_is_noop() {
        let table = RecordTable::seeded();

        assert!(!table.remove("nonexistent.com", TYPE_A));
        assert!(!table.remove("test.com", TYPE_AAAA));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let table = Arc::new(RecordTable::seeded());

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        assert_eq!(table.lookup("test.com", TYPE_A), Some(vec![10, 0, 0, 1]));
                    }
                })
            })
            .collect();

        let writer = {
            let table = table.clone();
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    let name = format!("host{i}.example");
                    table.add_address(&name, Ipv4Addr::from(i));
                    assert!(table.remove(&name, TYPE_A));
                }
            })
        };

        for reader in readers {
            reader.join().unwrap();
        }
        writer.join().unwrap();

        assert_eq!(table.len(), 5);
    }
}
