use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::Result;
use crate::model::{IndexableValue, PropertyValue, RecordId};

type IndexKey = (String, String);

/// Exact-match indexes keyed by (index name, key).
///
/// Each record holds at most one value per index key; the reverse map makes
/// removal independent of the value that was indexed.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyIndexes {
    entries: HashMap<IndexKey, BTreeMap<IndexableValue, BTreeSet<RecordId>>>,
    by_record: HashMap<RecordId, HashMap<IndexKey, IndexableValue>>,
}

impl PropertyIndexes {
    pub(crate) fn insert(
        &mut self,
        record: RecordId,
        index: &str,
        key: &str,
        value: &PropertyValue,
    ) -> Result<()> {
        let indexable = IndexableValue::try_from(value)?;
        self.remove(record, index, key);

        let index_key = (index.to_string(), key.to_string());
        self.entries
            .entry(index_key.clone())
            .or_default()
            .entry(indexable.clone())
            .or_default()
            .insert(record);
        self.by_record
            .entry(record)
            .or_default()
            .insert(index_key, indexable);
        Ok(())
    }

    pub(crate) fn remove(&mut self, record: RecordId, index: &str, key: &str) -> bool {
        let index_key = (index.to_string(), key.to_string());
        let Some(previous) = self
            .by_record
            .get_mut(&record)
            .and_then(|keys| keys.remove(&index_key))
        else {
            return false;
        };
        if self.by_record.get(&record).is_some_and(HashMap::is_empty) {
            self.by_record.remove(&record);
        }
        self.unlink(&index_key, &previous, record);
        true
    }

    pub(crate) fn remove_record(&mut self, record: RecordId) {
        let Some(keys) = self.by_record.remove(&record) else {
            return;
        };
        for (index_key, value) in keys {
            self.unlink(&index_key, &value, record);
        }
    }

    pub(crate) fn lookup(&self, index: &str, key: &str, value: &PropertyValue) -> Vec<RecordId> {
        let Ok(indexable) = IndexableValue::try_from(value) else {
            return Vec::new();
        };
        self.entries
            .get(&(index.to_string(), key.to_string()))
            .and_then(|values| values.get(&indexable))
            .map(|records| records.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_record.values().map(HashMap::len).sum()
    }

    fn unlink(&mut self, index_key: &IndexKey, value: &IndexableValue, record: RecordId) {
        if let Some(values) = self.entries.get_mut(index_key) {
            if let Some(records) = values.get_mut(value) {
                records.remove(&record);
                if records.is_empty() {
                    values.remove(value);
                }
            }
            if values.is_empty() {
                self.entries.remove(index_key);
            }
        }
    }
}
