//! Creation saga with compensating deletes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{
    ChemicalId, DosageId, OrderId, ProcessEntryId, StepDefinitionId, StepEntryId, WashRecipeId,
};
use domain::{RecipeDraft, RecipeError, Result, StepItem, normalize_wash_code};
use recipe_store::{
    ChemicalDosage, OrderLinkage, ProcessEntry, RecipeStore, ReferenceCatalog, StepEntry,
    StoreError, WashRecipe,
};

use crate::engine::WashRecipeEngine;
use crate::ledger::CreationLedger;

impl<S, R, O> WashRecipeEngine<S, R, O>
where
    S: RecipeStore + Clone,
    R: ReferenceCatalog + Clone,
    O: OrderLinkage,
{
    pub(crate) async fn run_creation(&self, draft: &RecipeDraft) -> Result<WashRecipe> {
        let started = Instant::now();
        let deadline = self.config.deadline;
        let mut ledger = CreationLedger::new();

        let persisted = tokio::time::timeout(deadline, self.persist_new(draft, &mut ledger))
            .await
            .unwrap_or_else(|_| Err(RecipeError::DeadlineExceeded(deadline)));

        let recipe = match persisted {
            Ok(recipe) => recipe,
            Err(err) => {
                self.compensate(&ledger, &err).await;
                return Err(err);
            }
        };

        // The recipe is committed from here on; a failed link is reported
        // but never rolled back.
        if let Some(order_id) = recipe.order_id {
            let remaining = deadline.saturating_sub(started.elapsed());
            self.link_order(order_id, recipe.id, remaining).await?;
        }

        tracing::info!(
            recipe_id = %recipe.id,
            steps = recipe.steps.len(),
            processes = recipe.recipe_process_ids.len(),
            "wash recipe created"
        );
        Ok(recipe)
    }

    async fn persist_new(
        &self,
        draft: &RecipeDraft,
        ledger: &mut CreationLedger,
    ) -> Result<WashRecipe> {
        let wash_code = normalize_wash_code(draft.header.wash_code.as_deref());
        self.ensure_wash_code_free(wash_code.as_deref(), None)
            .await?;

        let (steps, processes) = draft.partition();
        let step_references = self.resolve_step_references(&steps).await?;

        let mut recipe = WashRecipe::new(
            WashRecipeId::new(),
            draft.header.order_id,
            draft.header.date.unwrap_or_else(Utc::now),
            wash_code,
            draft.header.wash_type.clone(),
        );
        ledger.record_recipe(recipe.id);
        self.store.insert_recipe(&recipe).await?;

        for (item, (definition, chemical_ids)) in steps.iter().zip(step_references) {
            let entry = self
                .persist_step(recipe.id, item, definition, &chemical_ids, ledger)
                .await?;
            recipe.steps.push(entry);
        }

        let process_definitions = self.resolve_process_definitions(&processes).await?;
        let entries: Vec<ProcessEntry> = processes
            .iter()
            .zip(process_definitions)
            .map(|(item, definition)| ProcessEntry {
                id: ProcessEntryId::new(),
                wash_recipe_id: recipe.id,
                process_definition_id: definition,
                process_type: item.process_type.clone(),
                remark: item.remark.clone(),
                sequence: item.sequence,
            })
            .collect();
        if !entries.is_empty() {
            ledger.record_process_entries(entries.iter().map(|e| e.id));
            self.store.insert_process_entries(&entries).await?;
        }
        recipe.recipe_process_ids = entries.iter().map(|e| e.id).collect();

        recipe.updated_at = Utc::now();
        self.store.update_recipe(&recipe).await?;
        Ok(recipe)
    }

    /// Writes one step entry, then its dosages, then links them into the entry.
    async fn persist_step(
        &self,
        recipe_id: WashRecipeId,
        item: &StepItem,
        definition: StepDefinitionId,
        chemical_ids: &[ChemicalId],
        ledger: &mut CreationLedger,
    ) -> Result<StepEntryId> {
        let mut entry = StepEntry {
            id: StepEntryId::new(),
            wash_recipe_id: recipe_id,
            step_definition_id: definition,
            time: item.time,
            temperature: item.temperature,
            liters: item.liters,
            sequence: item.sequence,
            dosages: Vec::new(),
        };
        ledger.record_step_entry(entry.id);
        self.store.insert_step_entry(&entry).await?;

        if item.chemicals.is_empty() {
            return Ok(entry.id);
        }

        // One row per chemical; a repeated chemical keeps its first
        // position and takes the last submitted quantity.
        let mut dosages: Vec<ChemicalDosage> = Vec::with_capacity(item.chemicals.len());
        let mut position: HashMap<ChemicalId, usize> = HashMap::new();
        for (dosage, chemical_id) in item.chemicals.iter().zip(chemical_ids) {
            if let Some(&index) = position.get(chemical_id) {
                dosages[index].quantity = dosage.quantity;
                dosages[index].unit = dosage.unit.clone();
                continue;
            }
            position.insert(*chemical_id, dosages.len());
            dosages.push(ChemicalDosage {
                id: DosageId::new(),
                step_entry_id: entry.id,
                chemical_id: *chemical_id,
                quantity: dosage.quantity,
                unit: dosage.unit.clone(),
            });
        }
        ledger.record_dosages(dosages.iter().map(|d| d.id));
        self.store.insert_dosages(&dosages).await?;

        entry.dosages = dosages.iter().map(|d| d.id).collect();
        self.store.update_step_entry(&entry).await?;
        Ok(entry.id)
    }

    async fn link_order(
        &self,
        order_id: OrderId,
        recipe_id: WashRecipeId,
        remaining: Duration,
    ) -> Result<()> {
        let linked = tokio::time::timeout(remaining, self.orders.add_recipe_ref(order_id, recipe_id))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Unavailable(
                    "order link exceeded the saga deadline".to_string(),
                ))
            });

        match linked {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::warn!(%order_id, %recipe_id, "order not found, recipe left unlinked");
                Ok(())
            }
            Err(source) => {
                tracing::error!(%order_id, %recipe_id, error = %source, "failed to link recipe to order");
                Err(RecipeError::OrderLink {
                    recipe_id,
                    order_id,
                    source,
                })
            }
        }
    }

    /// Deletes everything the ledger recorded: dosages, step entries,
    /// process entries, then the header.
    ///
    /// Each delete is attempted even if an earlier one failed.
    #[tracing::instrument(skip(self, ledger, cause), fields(recipe_id = ?ledger.recipe()))]
    async fn compensate(&self, ledger: &CreationLedger, cause: &RecipeError) {
        if ledger.is_empty() {
            return;
        }

        metrics::counter!("wash_recipe_compensations_total").increment(1);
        tracing::warn!(
            error = %cause,
            step_entries = ledger.step_entries().len(),
            dosages = ledger.dosages().len(),
            process_entries = ledger.process_entries().len(),
            "wash recipe creation failed, compensating"
        );

        if !ledger.dosages().is_empty() {
            if let Err(e) = self.store.delete_dosages(ledger.dosages()).await {
                tracing::error!(error = %e, "compensation failed to delete dosages");
            }
        }
        if !ledger.step_entries().is_empty() {
            if let Err(e) = self.store.delete_step_entries(ledger.step_entries()).await {
                tracing::error!(error = %e, "compensation failed to delete step entries");
            }
        }
        if !ledger.process_entries().is_empty() {
            if let Err(e) = self
                .store
                .delete_process_entries(ledger.process_entries())
                .await
            {
                tracing::error!(error = %e, "compensation failed to delete process entries");
            }
        }
        if let Some(recipe_id) = ledger.recipe() {
            if let Err(e) = self.store.delete_recipe(recipe_id).await {
                tracing::error!(error = %e, "compensation failed to delete recipe header");
            }
        }
    }
}
