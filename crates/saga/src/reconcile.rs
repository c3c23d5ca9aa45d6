//! Update by set difference against the persisted children.

use std::collections::HashMap;

use chrono::Utc;
use common::{ChemicalId, DosageId, OrderId, ProcessEntryId, StepEntryId, WashRecipeId};
use domain::{RecipeDraft, RecipeError, Result, StepItem, normalize_wash_code};
use recipe_store::{
    ChemicalDosage, OrderLinkage, ProcessEntry, RecipeStore, RecipeStoreExt, ReferenceCatalog,
    StepEntry, WashRecipe,
};

use crate::engine::WashRecipeEngine;

impl<S, R, O> WashRecipeEngine<S, R, O>
where
    S: RecipeStore + Clone,
    R: ReferenceCatalog + Clone,
    O: OrderLinkage,
{
    /// Brings the persisted recipe in line with `draft`.
    ///
    /// Step entries named by id are updated in place and keep their
    /// identity, as do dosages matched by chemical. Process entries are
    /// always replaced and renumbered `1..N` in submission order.
    pub(crate) async fn reconcile(&self, id: WashRecipeId, draft: &RecipeDraft) -> Result<WashRecipe> {
        let mut recipe = self
            .store
            .get_recipe(id)
            .await?
            .ok_or(RecipeError::NotFound(id))?;

        let wash_code = normalize_wash_code(draft.header.wash_code.as_deref());
        self.ensure_wash_code_free(wash_code.as_deref(), Some(id))
            .await?;

        let (steps, processes) = draft.partition();
        let step_definitions = self.resolve_step_definitions(&steps).await?;
        let process_definitions = self.resolve_process_definitions(&processes).await?;

        if draft.header.order_id != recipe.order_id {
            self.relink_order(id, recipe.order_id, draft.header.order_id)
                .await?;
        }

        let mut existing: HashMap<StepEntryId, StepEntry> = self
            .store
            .step_entries_for_recipe(id)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        let existing_ids: Vec<_> = existing.keys().copied().collect();
        let mut existing_dosages = self.store.dosages_by_step_entry(&existing_ids).await?;

        let mut step_ids = Vec::with_capacity(steps.len());
        for (item, definition) in steps.iter().zip(step_definitions) {
            let matched = item.entry_id().and_then(|entry_id| existing.remove(&entry_id));
            let mut entry = match matched {
                Some(entry) => entry,
                None => {
                    let entry = StepEntry {
                        id: StepEntryId::new(),
                        wash_recipe_id: id,
                        step_definition_id: definition,
                        time: None,
                        temperature: None,
                        liters: None,
                        sequence: item.sequence,
                        dosages: Vec::new(),
                    };
                    self.store.insert_step_entry(&entry).await?;
                    entry
                }
            };

            let current = existing_dosages.remove(&entry.id).unwrap_or_default();
            entry.dosages = self.reconcile_dosages(entry.id, item, current).await?;
            entry.step_definition_id = definition;
            entry.time = item.time;
            entry.temperature = item.temperature;
            entry.liters = item.liters;
            entry.sequence = item.sequence;
            self.store.update_step_entry(&entry).await?;
            step_ids.push(entry.id);
        }

        let stale: Vec<StepEntryId> = existing.into_keys().collect();
        if !stale.is_empty() {
            let dosages = self.store.delete_dosages_for_step_entries(&stale).await?;
            let entries = self.store.delete_step_entries(&stale).await?;
            tracing::debug!(entries, dosages, "removed step entries absent from update");
        }

        self.store.delete_process_entries_for_recipe(id).await?;
        let process_entries: Vec<ProcessEntry> = (1u32..)
            .zip(processes.iter().zip(process_definitions))
            .map(|(sequence, (item, definition))| ProcessEntry {
                id: ProcessEntryId::new(),
                wash_recipe_id: id,
                process_definition_id: definition,
                process_type: item.process_type.clone(),
                remark: item.remark.clone(),
                sequence,
            })
            .collect();
        if !process_entries.is_empty() {
            self.store.insert_process_entries(&process_entries).await?;
        }

        recipe.order_id = draft.header.order_id;
        if let Some(date) = draft.header.date {
            recipe.date = date;
        }
        recipe.wash_code = wash_code;
        recipe.wash_type = draft.header.wash_type.clone();
        recipe.steps = step_ids;
        recipe.recipe_process_ids = process_entries.iter().map(|p| p.id).collect();
        recipe.updated_at = Utc::now();
        self.store.update_recipe(&recipe).await?;

        tracing::info!(
            recipe_id = %id,
            steps = recipe.steps.len(),
            processes = recipe.recipe_process_ids.len(),
            "wash recipe updated"
        );
        Ok(recipe)
    }

    /// Reconciles one step's dosages, keyed by chemical.
    ///
    /// Returns the step's dosage ids in submission order. Dosages naming a
    /// malformed or unknown chemical are skipped.
    async fn reconcile_dosages(
        &self,
        step_entry_id: StepEntryId,
        item: &StepItem,
        current: Vec<ChemicalDosage>,
    ) -> Result<Vec<DosageId>> {
        let mut stale: Vec<DosageId> = Vec::new();
        let mut by_chemical: HashMap<ChemicalId, ChemicalDosage> = HashMap::new();
        for dosage in current {
            if by_chemical.contains_key(&dosage.chemical_id) {
                stale.push(dosage.id);
            } else {
                by_chemical.insert(dosage.chemical_id, dosage);
            }
        }

        let parsed: Vec<Option<ChemicalId>> = item
            .chemicals
            .iter()
            .map(|dosage| dosage.chemical_ref(item.sequence).ok())
            .collect();
        let lookup: Vec<ChemicalId> = parsed.iter().flatten().copied().collect();
        let known = self.catalog.chemicals(&lookup).await?;

        // Submission order, one row per chemical, flagged when not yet
        // persisted. A repeated chemical overwrites the earlier row.
        let mut rows: Vec<(ChemicalDosage, bool)> = Vec::new();
        let mut position: HashMap<ChemicalId, usize> = HashMap::new();
        for (submitted, chemical_id) in item.chemicals.iter().zip(parsed) {
            let Some(chemical_id) = chemical_id.filter(|c| known.contains_key(c)) else {
                metrics::counter!("wash_recipe_dosages_skipped_total").increment(1);
                tracing::warn!(
                    %step_entry_id,
                    chemical_id = %submitted.chemical_id,
                    "skipping dosage with invalid chemical reference"
                );
                continue;
            };

            if let Some(&index) = position.get(&chemical_id) {
                rows[index].0.quantity = submitted.quantity;
                rows[index].0.unit = submitted.unit.clone();
                continue;
            }

            let row = match by_chemical.remove(&chemical_id) {
                Some(mut existing) => {
                    existing.quantity = submitted.quantity;
                    existing.unit = submitted.unit.clone();
                    (existing, false)
                }
                None => (
                    ChemicalDosage {
                        id: DosageId::new(),
                        step_entry_id,
                        chemical_id,
                        quantity: submitted.quantity,
                        unit: submitted.unit.clone(),
                    },
                    true,
                ),
            };
            position.insert(chemical_id, rows.len());
            rows.push(row);
        }

        stale.extend(by_chemical.into_values().map(|d| d.id));

        let ids: Vec<DosageId> = rows.iter().map(|(row, _)| row.id).collect();
        let (inserts, updates): (Vec<_>, Vec<_>) = rows.into_iter().partition(|(_, new)| *new);

        for (row, _) in &updates {
            self.store.update_dosage(row).await?;
        }
        if !inserts.is_empty() {
            let inserts: Vec<ChemicalDosage> = inserts.into_iter().map(|(row, _)| row).collect();
            self.store.insert_dosages(&inserts).await?;
        }
        if !stale.is_empty() {
            self.store.delete_dosages(&stale).await?;
        }

        Ok(ids)
    }

    /// Moves the recipe reference from one order to another.
    async fn relink_order(
        &self,
        recipe_id: WashRecipeId,
        previous: Option<OrderId>,
        next: Option<OrderId>,
    ) -> Result<()> {
        if let Some(order_id) = previous {
            let matched = self
                .orders
                .remove_recipe_ref(order_id, recipe_id)
                .await
                .map_err(|source| RecipeError::OrderLink {
                    recipe_id,
                    order_id,
                    source,
                })?;
            if !matched {
                tracing::warn!(%order_id, %recipe_id, "previous order not found while unlinking");
            }
        }
        if let Some(order_id) = next {
            let matched = self
                .orders
                .add_recipe_ref(order_id, recipe_id)
                .await
                .map_err(|source| RecipeError::OrderLink {
                    recipe_id,
                    order_id,
                    source,
                })?;
            if !matched {
                tracing::warn!(%order_id, %recipe_id, "order not found, recipe left unlinked");
            }
        }
        Ok(())
    }
}
