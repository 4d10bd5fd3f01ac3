// Narrows a fetched window to one vehicle's replay sequence
use crate::domain::record::RawRecord;

/// Records of exactly one entity, in source order (ascending by time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySequence {
    entity_id: String,
    records: Vec<RawRecord>,
    missing_entity: usize,
}

impl ReplaySequence {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&RawRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in the fetched window that carried no entity id at all.
    pub fn missing_entity(&self) -> usize {
        self.missing_entity
    }
}

/// Keep the records whose entity id matches, preserving their relative order.
/// Rows without an entity id belong to no vehicle and are skipped with a warning.
pub fn filter_series(records: Vec<RawRecord>, entity_id: &str) -> ReplaySequence {
    let mut missing_entity = 0usize;
    let records = records
        .into_iter()
        .filter(|r| match r.entity_id.as_deref() {
            Some(id) => id == entity_id,
            None => {
                missing_entity += 1;
                false
            }
        })
        .collect();
    if missing_entity > 0 {
        tracing::warn!(entity_id, "skipped {} records without a vehicle id", missing_entity);
    }

    ReplaySequence {
        entity_id: entity_id.to_string(),
        records,
        missing_entity,
    }
}
