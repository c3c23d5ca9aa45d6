use std::collections::HashMap;

use async_trait::async_trait;
use common::{DosageId, ProcessEntryId, StepEntryId, WashRecipeId};

use crate::{ChemicalDosage, ProcessEntry, Result, StepEntry, WashRecipe};

/// Core trait for the recipe header store and its three child collections.
///
/// The collections are independently addressable; nothing here spans more
/// than one of them, so callers coordinate multi-collection writes
/// themselves. All delete operations are idempotent: deleting rows that are
/// already gone succeeds and reports how many rows were actually removed.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Inserts a new recipe header.
    ///
    /// Fails with `DuplicateKey` if another recipe already holds the same
    /// non-null wash code.
    async fn insert_recipe(&self, recipe: &WashRecipe) -> Result<()>;

    /// Replaces an existing recipe header.
    ///
    /// Fails with `NotFound` if the header does not exist.
    async fn update_recipe(&self, recipe: &WashRecipe) -> Result<()>;

    /// Loads a recipe header by id.
    async fn get_recipe(&self, id: WashRecipeId) -> Result<Option<WashRecipe>>;

    /// Finds the recipe holding the given wash code, if any.
    async fn find_recipe_by_wash_code(&self, wash_code: &str) -> Result<Option<WashRecipe>>;

    /// Lists every recipe header, most recent `date` first.
    async fn list_recipes(&self) -> Result<Vec<WashRecipe>>;

    /// Deletes a recipe header. Returns false if it did not exist.
    async fn delete_recipe(&self, id: WashRecipeId) -> Result<bool>;

    /// Inserts a step entry.
    async fn insert_step_entry(&self, entry: &StepEntry) -> Result<()>;

    /// Replaces an existing step entry.
    async fn update_step_entry(&self, entry: &StepEntry) -> Result<()>;

    /// Loads every step entry whose back-reference is the given recipe,
    /// ordered by `sequence`.
    async fn step_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<Vec<StepEntry>>;

    /// Deletes step entries by id.
    async fn delete_step_entries(&self, ids: &[StepEntryId]) -> Result<u64>;

    /// Inserts a batch of dosages.
    async fn insert_dosages(&self, dosages: &[ChemicalDosage]) -> Result<()>;

    /// Replaces an existing dosage.
    async fn update_dosage(&self, dosage: &ChemicalDosage) -> Result<()>;

    /// Loads every dosage owned by any of the given step entries.
    async fn dosages_for_step_entries(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<Vec<ChemicalDosage>>;

    /// Deletes dosages by id.
    async fn delete_dosages(&self, ids: &[DosageId]) -> Result<u64>;

    /// Deletes every dosage owned by any of the given step entries.
    async fn delete_dosages_for_step_entries(&self, step_entry_ids: &[StepEntryId])
    -> Result<u64>;

    /// Inserts a batch of process entries.
    async fn insert_process_entries(&self, entries: &[ProcessEntry]) -> Result<()>;

    /// Loads every process entry whose back-reference is the given recipe,
    /// ordered by `sequence`.
    async fn process_entries_for_recipe(
        &self,
        recipe_id: WashRecipeId,
    ) -> Result<Vec<ProcessEntry>>;

    /// Deletes process entries by id.
    async fn delete_process_entries(&self, ids: &[ProcessEntryId]) -> Result<u64>;

    /// Deletes every process entry owned by the given recipe.
    async fn delete_process_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<u64>;
}

/// Extension trait providing convenience methods for recipe stores.
#[async_trait]
pub trait RecipeStoreExt: RecipeStore {
    /// Checks if a recipe header exists.
    async fn recipe_exists(&self, id: WashRecipeId) -> Result<bool> {
        Ok(self.get_recipe(id).await?.is_some())
    }

    /// Loads the dosages of the given step entries grouped by owner.
    ///
    /// Each group keeps the store's row order. Step entries without dosages
    /// have no key in the map.
    async fn dosages_by_step_entry(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<HashMap<StepEntryId, Vec<ChemicalDosage>>> {
        let dosages = self.dosages_for_step_entries(step_entry_ids).await?;
        let mut grouped: HashMap<StepEntryId, Vec<ChemicalDosage>> = HashMap::new();
        for dosage in dosages {
            grouped.entry(dosage.step_entry_id).or_default().push(dosage);
        }
        Ok(grouped)
    }
}

// Blanket implementation for all RecipeStore implementations
impl<T: RecipeStore + ?Sized> RecipeStoreExt for T {}
