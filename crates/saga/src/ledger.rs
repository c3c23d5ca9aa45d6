//! Record of rows written by an in-flight creation.

use common::{DosageId, ProcessEntryId, StepEntryId, WashRecipeId};

/// Ids written (or about to be written) by one creation call.
///
/// Ids are generated before their write is issued and recorded first, so a
/// write that fails or times out after reaching the store is still covered.
/// Compensating deletes of ids that never landed are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationLedger {
    recipe: Option<WashRecipeId>,
    step_entries: Vec<StepEntryId>,
    dosages: Vec<DosageId>,
    process_entries: Vec<ProcessEntryId>,
}

impl CreationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_recipe(&mut self, id: WashRecipeId) {
        self.recipe = Some(id);
    }

    pub fn record_step_entry(&mut self, id: StepEntryId) {
        self.step_entries.push(id);
    }

    pub fn record_dosages(&mut self, ids: impl IntoIterator<Item = DosageId>) {
        self.dosages.extend(ids);
    }

    pub fn record_process_entries(&mut self, ids: impl IntoIterator<Item = ProcessEntryId>) {
        self.process_entries.extend(ids);
    }

    pub fn recipe(&self) -> Option<WashRecipeId> {
        self.recipe
    }

    pub fn step_entries(&self) -> &[StepEntryId] {
        &self.step_entries
    }

    pub fn dosages(&self) -> &[DosageId] {
        &self.dosages
    }

    pub fn process_entries(&self) -> &[ProcessEntryId] {
        &self.process_entries
    }

    /// Returns true if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.recipe.is_none()
            && self.step_entries.is_empty()
            && self.dosages.is_empty()
            && self.process_entries.is_empty()
    }
}
