//! Detail-by-merge: steps and processes fetched independently and interleaved.

use std::collections::BTreeMap;

use common::StepEntryId;
use recipe_store::WashRecipe;
use serde::Serialize;

use crate::item::{RecipeItem, ResolvedDosage};

/// A recipe header plus its merged, sequence-ordered items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecipe {
    pub recipe: WashRecipe,
    /// Resolved dosages keyed by owning step entry, in stored order.
    pub dosages: BTreeMap<StepEntryId, Vec<ResolvedDosage>>,
    pub items: Vec<RecipeItem>,
}

impl MergedRecipe {
    /// Returns the resolved dosages of one step entry.
    pub fn dosages_of(&self, step_entry_id: StepEntryId) -> &[ResolvedDosage] {
        self.dosages
            .get(&step_entry_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
