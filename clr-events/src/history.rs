//! Time-ordered lookup tables that span records.
//!
//! A type id is named by a BulkType record that may arrive after the
//! allocation records referring to it, and ids are reused as types are
//! unloaded, so names are kept per key as a history and looked up "as of"
//! a timestamp.

use std::hash::Hash;
use std::io::{Cursor, Read, Seek, Write};

use binrw::{binrw, BinRead, BinWrite, NullWideString};
use fxhash::FxHashMap;

use crate::error::Result;

/// Per-key values, each recorded at a timestamp.
#[derive(Debug, Clone)]
pub struct HistoryMap<K, V> {
    entries: FxHashMap<K, Vec<(u64, V)>>,
}

impl<K, V> Default for HistoryMap<K, V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Hash + Eq, V> HistoryMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `key` from `timestamp` on. A value added at the
    /// same timestamp as an earlier one supersedes it.
    pub fn add(&mut self, key: K, timestamp: u64, value: V) {
        let history = self.entries.entry(key).or_default();
        match history.last() {
            Some((last, _)) if *last > timestamp => {
                let at = history.partition_point(|(t, _)| *t <= timestamp);
                history.insert(at, (timestamp, value));
            }
            _ => history.push((timestamp, value)),
        }
    }

    /// The latest value recorded for `key` at or before `timestamp`.
    pub fn lookup(&self, key: &K, timestamp: u64) -> Option<&V> {
        let history = self.entries.get(key)?;
        let at = history.partition_point(|(t, _)| *t <= timestamp);
        at.checked_sub(1).map(|i| &history[i].1)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every `(key, timestamp, value)`, time-ordered within a key.
    pub fn iter(&self) -> impl Iterator<Item = (&K, u64, &V)> {
        self.entries
            .iter()
            .flat_map(|(key, history)| history.iter().map(move |(t, v)| (key, *t, v)))
    }
}

const STORE_VERSION: u32 = 1;

#[binrw]
#[brw(little, magic = b"CLRTYPES")]
struct TypeNameStore {
    #[br(assert(version == STORE_VERSION))]
    version: u32,
    #[br(temp)]
    #[bw(calc = entries.len() as u32)]
    count: u32,
    #[br(count = count)]
    entries: Vec<TypeNameEntry>,
}

#[binrw]
#[brw(little)]
struct TypeNameEntry {
    type_id: u64,
    process_id: u32,
    timestamp: u64,
    name: NullWideString,
}

/// Type names keyed by `(type_id, process_id)`.
#[derive(Debug, Clone, Default)]
pub struct TypeNameHistory {
    names: HistoryMap<(u64, u32), String>,
}

impl TypeNameHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, type_id: u64, process_id: u32, timestamp: u64, name: String) {
        self.names.add((type_id, process_id), timestamp, name);
    }

    pub fn lookup(&self, type_id: u64, process_id: u32, timestamp: u64) -> Option<&str> {
        self.names
            .lookup(&(type_id, process_id), timestamp)
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let mut entries: Vec<TypeNameEntry> = self
            .names
            .iter()
            .map(|(&(type_id, process_id), timestamp, name)| TypeNameEntry {
                type_id,
                process_id,
                timestamp,
                name: NullWideString::from(name.as_str()),
            })
            .collect();
        entries.sort_by_key(|e| (e.type_id, e.process_id, e.timestamp));
        TypeNameStore {
            version: STORE_VERSION,
            entries,
        }
        .write(writer)?;
        Ok(())
    }

    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<TypeNameHistory> {
        let store = TypeNameStore::read(reader)?;
        let mut history = TypeNameHistory::new();
        for entry in store.entries {
            history.add(
                entry.type_id,
                entry.process_id,
                entry.timestamp,
                entry.name.to_string(),
            );
        }
        Ok(history)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<TypeNameHistory> {
        Self::read_from(&mut Cursor::new(bytes))
    }
}
