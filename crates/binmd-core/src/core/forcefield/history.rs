use crate::core::models::ids::AtomTag;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Identity of a contact between two atoms, independent of list slots and of the
/// order the pair was visited in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactKey {
    lo: AtomTag,
    hi: AtomTag,
}

impl ContactKey {
    pub fn new(a: AtomTag, b: AtomTag) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    #[inline]
    pub fn lo(&self) -> AtomTag {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> AtomTag {
        self.hi
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Malformed history record {record} in '{path}': {reason}")]
    Record {
        path: String,
        record: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Slot<const N: usize> {
    values: [f64; N],
    touched: bool,
}

/// Per-contact history of `N` values.
///
/// Lifecycle per force evaluation: [`begin_step`](Self::begin_step) clears all touch
/// marks, every contact still in range calls [`entry`](Self::entry) (creating zeroed
/// history on first contact), and [`end_step`](Self::end_step) discards contacts that
/// were not touched, i.e. that separated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactHistory<const N: usize> {
    slots: HashMap<ContactKey, Slot<N>>,
}

impl<const N: usize> ContactHistory<N> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    pub fn begin_step(&mut self) {
        for slot in self.slots.values_mut() {
            slot.touched = false;
        }
    }

    pub fn entry(&mut self, key: ContactKey) -> &mut [f64; N] {
        let slot = self.slots.entry(key).or_insert(Slot {
            values: [0.0; N],
            touched: false,
        });
        slot.touched = true;
        &mut slot.values
    }

    /// Drops untouched contacts and returns how many were dropped.
    pub fn end_step(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.touched);
        before - self.slots.len()
    }

    pub fn get(&self, key: &ContactKey) -> Option<&[f64; N]> {
        self.slots.get(key).map(|slot| &slot.values)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContactKey, &[f64; N])> {
        self.slots.iter().map(|(key, slot)| (key, &slot.values))
    }

    /// Writes one `tag_lo,tag_hi,h0,..` record per contact, sorted by key.
    pub fn write_csv(&self, path: &Path) -> Result<(), HistoryError> {
        let csv_err = |e| HistoryError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;

        let mut header = vec!["tag_lo".to_string(), "tag_hi".to_string()];
        header.extend((0..N).map(|k| format!("h{k}")));
        writer.write_record(&header).map_err(csv_err)?;

        let mut keys: Vec<_> = self.slots.keys().copied().collect();
        keys.sort();
        for key in keys {
            let values = &self.slots[&key].values;
            let mut record = vec![key.lo.to_string(), key.hi.to_string()];
            record.extend(values.iter().map(|v| format!("{v:e}")));
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer
            .flush()
            .map_err(|e| csv_err(csv::Error::from(e)))?;
        debug!(contacts = self.len(), path = %path.display(), "Wrote contact history.");
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, HistoryError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|e| HistoryError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

        let mut history = Self::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| HistoryError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let malformed = |reason: String| HistoryError::Record {
                path: path_str.clone(),
                record: index + 1,
                reason,
            };
            if record.len() != N + 2 {
                return Err(malformed(format!(
                    "expected {} fields, found {}",
                    N + 2,
                    record.len()
                )));
            }
            let tag = |k: usize| -> Result<AtomTag, HistoryError> {
                record[k]
                    .trim()
                    .parse::<u64>()
                    .map(AtomTag)
                    .map_err(|e| malformed(format!("tag '{}': {e}", &record[k])))
            };
            let key = ContactKey::new(tag(0)?, tag(1)?);
            let mut values = [0.0; N];
            for (k, value) in values.iter_mut().enumerate() {
                let field = &record[k + 2];
                *value = field
                    .trim()
                    .parse()
                    .map_err(|e| malformed(format!("value '{field}': {e}")))?;
            }
            history.slots.insert(
                key,
                Slot {
                    values,
                    touched: false,
                },
            );
        }
        Ok(history)
    }
}
