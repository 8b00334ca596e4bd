//! Snapshot construction from registry records.

use crate::types::{PropertyRecord, Snapshot, TranslationTable};

/// Build the desired snapshot for one poll cycle.
///
/// Each record's name is passed through the translation table. When two
/// records land on the same key, the later one wins.
pub fn build_snapshot(records: &[PropertyRecord], translation: &TranslationTable) -> Snapshot {
    records
        .iter()
        .map(|record| {
            (
                translation.translate(&record.name).to_string(),
                record.value.clone(),
            )
        })
        .collect()
}
