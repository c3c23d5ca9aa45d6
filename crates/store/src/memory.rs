use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{DosageId, ProcessEntryId, StepEntryId, WashRecipeId};
use tokio::sync::RwLock;

use crate::{
    ChemicalDosage, ProcessEntry, Result, StepEntry, StoreError, WashRecipe, store::RecipeStore,
};

#[derive(Debug, Default)]
struct Tables {
    recipes: Vec<WashRecipe>,
    step_entries: Vec<StepEntry>,
    dosages: Vec<ChemicalDosage>,
    process_entries: Vec<ProcessEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Number of step entry inserts still allowed before every further one fails.
    step_inserts_remaining: Option<usize>,
    fail_process_insert: bool,
    fail_recipe_update: bool,
    fail_step_delete: bool,
    step_insert_delay: Option<Duration>,
}

/// In-memory recipe store implementation for testing.
///
/// Rows are kept in insertion order and the wash code unique index is
/// enforced the same way the PostgreSQL schema enforces it. Faults can be
/// injected to exercise failure handling in callers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecipeStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryRecipeStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `n` more step entry inserts succeed, then fails every later one.
    pub async fn fail_step_insert_after(&self, n: usize) {
        self.faults.write().await.step_inserts_remaining = Some(n);
    }

    /// Configures the store to fail every process entry batch insert.
    pub async fn set_fail_process_insert(&self, fail: bool) {
        self.faults.write().await.fail_process_insert = fail;
    }

    /// Configures the store to fail every recipe header update.
    pub async fn set_fail_recipe_update(&self, fail: bool) {
        self.faults.write().await.fail_recipe_update = fail;
    }

    /// Configures the store to fail every step entry delete.
    pub async fn set_fail_step_delete(&self, fail: bool) {
        self.faults.write().await.fail_step_delete = fail;
    }

    /// Delays every step entry insert, to make callers hit their deadline.
    pub async fn set_step_insert_delay(&self, delay: Option<Duration>) {
        self.faults.write().await.step_insert_delay = delay;
    }

    /// Removes every injected fault.
    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Returns the number of recipe headers stored.
    pub async fn recipe_count(&self) -> usize {
        self.tables.read().await.recipes.len()
    }

    /// Returns the number of step entries stored.
    pub async fn step_entry_count(&self) -> usize {
        self.tables.read().await.step_entries.len()
    }

    /// Returns the number of dosages stored.
    pub async fn dosage_count(&self) -> usize {
        self.tables.read().await.dosages.len()
    }

    /// Returns the number of process entries stored.
    pub async fn process_entry_count(&self) -> usize {
        self.tables.read().await.process_entries.len()
    }

    /// Clears all rows and faults.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
        self.clear_faults().await;
    }
}

fn check_wash_code(tables: &Tables, recipe: &WashRecipe) -> Result<()> {
    let Some(code) = recipe.wash_code.as_deref() else {
        return Ok(());
    };
    let taken = tables
        .recipes
        .iter()
        .any(|r| r.id != recipe.id && r.wash_code.as_deref() == Some(code));
    if taken {
        return Err(StoreError::DuplicateKey {
            field: "wash_code",
            value: code.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl RecipeStore for InMemoryRecipeStore {
    async fn insert_recipe(&self, recipe: &WashRecipe) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.recipes.iter().any(|r| r.id == recipe.id) {
            return Err(StoreError::DuplicateKey {
                field: "id",
                value: recipe.id.to_string(),
            });
        }
        check_wash_code(&tables, recipe)?;
        tables.recipes.push(recipe.clone());
        Ok(())
    }

    async fn update_recipe(&self, recipe: &WashRecipe) -> Result<()> {
        if self.faults.read().await.fail_recipe_update {
            return Err(StoreError::Unavailable(format!(
                "recipe update rejected for {}",
                recipe.id
            )));
        }

        let mut tables = self.tables.write().await;
        check_wash_code(&tables, recipe)?;
        let row = tables
            .recipes
            .iter_mut()
            .find(|r| r.id == recipe.id)
            .ok_or_else(|| StoreError::not_found("WashRecipe", recipe.id))?;
        *row = recipe.clone();
        Ok(())
    }

    async fn get_recipe(&self, id: WashRecipeId) -> Result<Option<WashRecipe>> {
        let tables = self.tables.read().await;
        Ok(tables.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn find_recipe_by_wash_code(&self, wash_code: &str) -> Result<Option<WashRecipe>> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipes
            .iter()
            .find(|r| r.wash_code.as_deref() == Some(wash_code))
            .cloned())
    }

    async fn list_recipes(&self) -> Result<Vec<WashRecipe>> {
        let tables = self.tables.read().await;
        let mut recipes = tables.recipes.clone();
        recipes.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(recipes)
    }

    async fn delete_recipe(&self, id: WashRecipeId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.recipes.len();
        tables.recipes.retain(|r| r.id != id);
        Ok(tables.recipes.len() < before)
    }

    async fn insert_step_entry(&self, entry: &StepEntry) -> Result<()> {
        let delay = self.faults.read().await.step_insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut faults = self.faults.write().await;
            if let Some(remaining) = faults.step_inserts_remaining.as_mut() {
                if *remaining == 0 {
                    return Err(StoreError::Unavailable(format!(
                        "step entry insert rejected for sequence {}",
                        entry.sequence
                    )));
                }
                *remaining -= 1;
            }
        }

        let mut tables = self.tables.write().await;
        if tables.step_entries.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::DuplicateKey {
                field: "id",
                value: entry.id.to_string(),
            });
        }
        tables.step_entries.push(entry.clone());
        Ok(())
    }

    async fn update_step_entry(&self, entry: &StepEntry) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .step_entries
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or_else(|| StoreError::not_found("StepEntry", entry.id))?;
        *row = entry.clone();
        Ok(())
    }

    async fn step_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<Vec<StepEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<_> = tables
            .step_entries
            .iter()
            .filter(|e| e.wash_recipe_id == recipe_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn delete_step_entries(&self, ids: &[StepEntryId]) -> Result<u64> {
        if self.faults.read().await.fail_step_delete {
            return Err(StoreError::Unavailable(
                "step entry delete rejected".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let before = tables.step_entries.len();
        tables.step_entries.retain(|e| !ids.contains(&e.id));
        Ok((before - tables.step_entries.len()) as u64)
    }

    async fn insert_dosages(&self, dosages: &[ChemicalDosage]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for dosage in dosages {
            if tables.dosages.iter().any(|d| d.id == dosage.id) {
                return Err(StoreError::DuplicateKey {
                    field: "id",
                    value: dosage.id.to_string(),
                });
            }
        }
        tables.dosages.extend(dosages.iter().cloned());
        Ok(())
    }

    async fn update_dosage(&self, dosage: &ChemicalDosage) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .dosages
            .iter_mut()
            .find(|d| d.id == dosage.id)
            .ok_or_else(|| StoreError::not_found("ChemicalDosage", dosage.id))?;
        *row = dosage.clone();
        Ok(())
    }

    async fn dosages_for_step_entries(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<Vec<ChemicalDosage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .dosages
            .iter()
            .filter(|d| step_entry_ids.contains(&d.step_entry_id))
            .cloned()
            .collect())
    }

    async fn delete_dosages(&self, ids: &[DosageId]) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.dosages.len();
        tables.dosages.retain(|d| !ids.contains(&d.id));
        Ok((before - tables.dosages.len()) as u64)
    }

    async fn delete_dosages_for_step_entries(
        &self,
        step_entry_ids: &[StepEntryId],
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.dosages.len();
        tables
            .dosages
            .retain(|d| !step_entry_ids.contains(&d.step_entry_id));
        Ok((before - tables.dosages.len()) as u64)
    }

    async fn insert_process_entries(&self, entries: &[ProcessEntry]) -> Result<()> {
        if self.faults.read().await.fail_process_insert {
            return Err(StoreError::Unavailable(
                "process entry insert rejected".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        for entry in entries {
            if tables.process_entries.iter().any(|e| e.id == entry.id) {
                return Err(StoreError::DuplicateKey {
                    field: "id",
                    value: entry.id.to_string(),
                });
            }
        }
        tables.process_entries.extend(entries.iter().cloned());
        Ok(())
    }

    async fn process_entries_for_recipe(
        &self,
        recipe_id: WashRecipeId,
    ) -> Result<Vec<ProcessEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<_> = tables
            .process_entries
            .iter()
            .filter(|e| e.wash_recipe_id == recipe_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn delete_process_entries(&self, ids: &[ProcessEntryId]) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.process_entries.len();
        tables.process_entries.retain(|e| !ids.contains(&e.id));
        Ok((before - tables.process_entries.len()) as u64)
    }

    async fn delete_process_entries_for_recipe(&self, recipe_id: WashRecipeId) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.process_entries.len();
        tables
            .process_entries
            .retain(|e| e.wash_recipe_id != recipe_id);
        Ok((before - tables.process_entries.len()) as u64)
    }
}
