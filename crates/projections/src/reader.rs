//! Assembles read views from the recipe store and reference catalogs.

use std::collections::{BTreeMap, HashMap};

use common::WashRecipeId;
use domain::{RecipeError, Result};
use futures_util::future::try_join;
use recipe_store::{
    ChemicalDosage, ProcessEntry, RecipeStore, RecipeStoreExt, ReferenceCatalog, StepEntry,
    WashRecipe,
};

use crate::item::{ProcessView, ResolvedDosage, StepView, merge_by_sequence};
use crate::views::{
    MergedRecipe, PopulatedDosage, PopulatedProcess, PopulatedRecipe, PopulatedStep,
};

/// Read side of the recipe aggregate.
///
/// Only reads; every view is rebuilt from the stores on each call.
#[derive(Clone)]
pub struct RecipeReader<S, R> {
    store: S,
    catalog: R,
}

impl<S, R> RecipeReader<S, R>
where
    S: RecipeStore,
    R: ReferenceCatalog,
{
    /// Creates a reader over the given store and catalog.
    pub fn new(store: S, catalog: R) -> Self {
        Self { store, catalog }
    }

    async fn load_header(&self, id: WashRecipeId) -> Result<WashRecipe> {
        self.store
            .get_recipe(id)
            .await?
            .ok_or(RecipeError::NotFound(id))
    }

    /// Lists recipe headers, most recent date first.
    ///
    /// An empty listing is reported as `NoRecipes`.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<WashRecipe>> {
        let recipes = self.store.list_recipes().await?;
        if recipes.is_empty() {
            return Err(RecipeError::NoRecipes);
        }
        Ok(recipes)
    }

    /// Loads a recipe with its step and process references expanded in place.
    #[tracing::instrument(skip(self))]
    pub async fn populated(&self, id: WashRecipeId) -> Result<PopulatedRecipe> {
        let recipe = self.load_header(id).await?;

        let (entries, processes) = try_join(
            self.store.step_entries_for_recipe(id),
            self.store.process_entries_for_recipe(id),
        )
        .await?;
        let mut dosages = self
            .store
            .dosages_by_step_entry(&recipe.steps)
            .await?;

        let step_defs = self
            .catalog
            .step_definitions(&distinct(entries.iter().map(|e| e.step_definition_id)))
            .await?;
        let chemicals = self
            .catalog
            .chemicals(&distinct(
                dosages.values().flatten().map(|d| d.chemical_id),
            ))
            .await?;
        let process_defs = self
            .catalog
            .process_definitions(&distinct(processes.iter().map(|p| p.process_definition_id)))
            .await?;

        let mut entries: HashMap<_, StepEntry> = entries.into_iter().map(|e| (e.id, e)).collect();
        let steps = recipe
            .steps
            .iter()
            .filter_map(|id| entries.remove(id))
            .map(|entry| {
                let mut owned: HashMap<_, ChemicalDosage> = dosages
                    .remove(&entry.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|d| (d.id, d))
                    .collect();
                let resolved = entry
                    .dosages
                    .iter()
                    .filter_map(|id| owned.remove(id))
                    .map(|d| PopulatedDosage {
                        id: d.id,
                        chemical_id: d.chemical_id,
                        chemical: chemicals.get(&d.chemical_id).cloned(),
                        quantity: d.quantity,
                        unit: d.unit,
                    })
                    .collect();
                PopulatedStep {
                    id: entry.id,
                    step_definition_id: entry.step_definition_id,
                    step_definition: step_defs.get(&entry.step_definition_id).cloned(),
                    time: entry.time,
                    temperature: entry.temperature,
                    liters: entry.liters,
                    sequence: entry.sequence,
                    dosages: resolved,
                }
            })
            .collect();

        let mut processes: HashMap<_, ProcessEntry> =
            processes.into_iter().map(|p| (p.id, p)).collect();
        let processes = recipe
            .recipe_process_ids
            .iter()
            .filter_map(|id| processes.remove(id))
            .map(|p| PopulatedProcess {
                id: p.id,
                process_definition_id: p.process_definition_id,
                process_definition: process_defs.get(&p.process_definition_id).cloned(),
                process_type: p.process_type,
                remark: p.remark,
                sequence: p.sequence,
            })
            .collect();

        Ok(PopulatedRecipe {
            id: recipe.id,
            order_id: recipe.order_id,
            date: recipe.date,
            wash_code: recipe.wash_code,
            wash_type: recipe.wash_type,
            steps,
            processes,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
        })
    }

    /// Loads a recipe as one sequence of steps and processes.
    ///
    /// Step entries and process entries are fetched concurrently and
    /// interleaved by `sequence`; see [`merge_by_sequence`] for tie-breaking.
    #[tracing::instrument(skip(self))]
    pub async fn merged(&self, id: WashRecipeId) -> Result<MergedRecipe> {
        let recipe = self.load_header(id).await?;

        let (entries, processes) = try_join(
            self.store.step_entries_for_recipe(id),
            self.store.process_entries_for_recipe(id),
        )
        .await?;

        let entry_ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        let grouped = self.store.dosages_by_step_entry(&entry_ids).await?;

        let step_defs = self
            .catalog
            .step_definitions(&distinct(entries.iter().map(|e| e.step_definition_id)))
            .await?;
        let chemicals = self
            .catalog
            .chemicals(&distinct(
                grouped.values().flatten().map(|d| d.chemical_id),
            ))
            .await?;
        let process_defs = self
            .catalog
            .process_definitions(&distinct(processes.iter().map(|p| p.process_definition_id)))
            .await?;

        let dosages: BTreeMap<_, Vec<ResolvedDosage>> = grouped
            .into_iter()
            .map(|(step_entry_id, rows)| {
                let resolved = rows
                    .into_iter()
                    .map(|dosage| ResolvedDosage {
                        chemical_name: chemicals.get(&dosage.chemical_id).map(|c| c.name.clone()),
                        dosage,
                    })
                    .collect();
                (step_entry_id, resolved)
            })
            .collect();

        let steps = entries
            .into_iter()
            .map(|entry| StepView {
                step_name: step_defs
                    .get(&entry.step_definition_id)
                    .map(|d| d.name.clone()),
                entry,
            })
            .collect();
        let processes = processes
            .into_iter()
            .map(|entry| ProcessView {
                process_definition: process_defs.get(&entry.process_definition_id).cloned(),
                entry,
            })
            .collect();

        metrics::counter!("wash_recipe_merged_reads_total").increment(1);

        Ok(MergedRecipe {
            recipe,
            dosages,
            items: merge_by_sequence(steps, processes),
        })
    }
}

fn distinct<T: Ord>(ids: impl Iterator<Item = T>) -> Vec<T> {
    let mut ids: Vec<T> = ids.collect();
    ids.sort();
    ids.dedup();
    ids
}
