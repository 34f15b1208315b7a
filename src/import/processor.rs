//! Import processor
//!
//! Drives one import run over a validated record collection: builds a draft
//! per record, applies the mapping through the field transformers, asks the
//! host to create the record, then sets structured fields on it.
//!
//! Failures are isolated to the record that produced them. The run always
//! continues to the last record.

use super::transform::{TransformContext, apply_custom_fields, apply_standard_fields};
use crate::models::{
    CreatedRecord, ImportResult, MappingSpecification, RawRecord, RecordDraft, RecordId, Severity,
};
use crate::platform::{ContentStore, DeferredCounting};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs mapped records into a [`ContentStore`].
pub struct ImportProcessor<'a> {
    store: &'a dyn ContentStore,
    context: TransformContext,
}

impl<'a> ImportProcessor<'a> {
    pub fn new(store: &'a dyn ContentStore, context: TransformContext) -> Self {
        Self { store, context }
    }

    pub fn context(&self) -> &TransformContext {
        &self.context
    }

    /// Import every record, returning the per-item outcome.
    ///
    /// Secondary bookkeeping is deferred for the duration of the loop and
    /// re-enabled when it ends, however it ends.
    pub fn run(
        &self,
        records: &[Value],
        mapping: &MappingSpecification,
        file_name: &str,
    ) -> ImportResult {
        let started = Instant::now();
        let mut result = ImportResult::new(&self.context.record_type, file_name);

        info!(
            "Importing {} records from '{}' as '{}'",
            records.len(),
            file_name,
            self.context.record_type
        );

        self.store.suspend_time_limit();
        {
            let _deferred = DeferredCounting::acquire(self.store);
            for (index, value) in records.iter().enumerate() {
                self.import_item(index + 1, value, mapping, &mut result);
            }
        }

        result.elapsed = started.elapsed();
        info!(
            "Import of '{}' finished: {} imported, {} skipped in {:.2?}",
            file_name, result.imported, result.skipped, result.elapsed
        );
        result
    }

    fn import_item(
        &self,
        item: usize,
        value: &Value,
        mapping: &MappingSpecification,
        result: &mut ImportResult,
    ) {
        let Some(record) = RawRecord::from_value(value) else {
            warn!("Skipping item {}: not an object", item);
            result.skipped += 1;
            result.push_message(
                item,
                Severity::Error,
                format!("Item {} skipped: not a JSON object.", item),
            );
            return;
        };

        let mut draft = RecordDraft::new(
            &self.context.record_type,
            &self.context.default_status,
            self.context.importing_user,
        );
        let notices = apply_standard_fields(&mut draft, &record, mapping, &self.context, self.store);

        if draft.title.is_empty() {
            debug!("Skipping item {}: empty title", item);
            result.skipped += 1;
            result.push_message(
                item,
                Severity::Error,
                format!("Item {} skipped: title is required.", item),
            );
            return;
        }

        apply_custom_fields(&mut draft, &record, mapping);

        let id = match self.store.create_record(&draft) {
            Ok(id) => id,
            Err(e) => {
                warn!("Item {} was not created: {}", item, e);
                result.skipped += 1;
                result.push_message(
                    item,
                    Severity::Error,
                    format!("Item {} failed: {}", item, e),
                );
                return;
            }
        };

        for notice in notices {
            result.push_message(item, Severity::Warning, format!("Item {}: {}", item, notice));
        }
        self.set_structured_fields(item, id, &record, mapping, result);

        debug!("Item {} imported as record {}", item, id);
        result.imported += 1;
        result.created.push(CreatedRecord { item, id });
    }

    fn set_structured_fields(
        &self,
        item: usize,
        id: RecordId,
        record: &RawRecord,
        mapping: &MappingSpecification,
        result: &mut ImportResult,
    ) {
        for (field_id, source_key) in &mapping.structured {
            let Some(value) = record.get(source_key).filter(|v| !v.is_null()) else {
                continue;
            };
            if let Err(e) = self.store.set_structured_field(field_id, value, id) {
                warn!("Item {}: structured field '{}' not set: {}", item, field_id, e);
                result.push_message(item, Severity::Warning, format!("Item {}: {}", item, e));
            }
        }
    }
}
