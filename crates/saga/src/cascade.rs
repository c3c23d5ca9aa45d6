//! Cascading delete of a recipe and everything it owns.

use common::{ProcessEntryId, StepEntryId, WashRecipeId};
use domain::{RecipeError, Result};
use recipe_store::{OrderLinkage, RecipeStore, ReferenceCatalog};

use crate::engine::WashRecipeEngine;

impl<S, R, O> WashRecipeEngine<S, R, O>
where
    S: RecipeStore + Clone,
    R: ReferenceCatalog + Clone,
    O: OrderLinkage,
{
    /// Deletes dosages, step entries, process entries, the order reference,
    /// and finally the header.
    ///
    /// Every delete is a no-op on rows that are already gone, so a call that
    /// failed halfway is finished by retrying it. Children left behind by an
    /// interrupted update are found through their back-reference.
    pub(crate) async fn cascade_delete(&self, id: WashRecipeId) -> Result<()> {
        let recipe = self
            .store
            .get_recipe(id)
            .await?
            .ok_or(RecipeError::NotFound(id))?;

        let mut step_ids: Vec<StepEntryId> = recipe.steps.clone();
        for entry in self.store.step_entries_for_recipe(id).await? {
            if !step_ids.contains(&entry.id) {
                step_ids.push(entry.id);
            }
        }
        let mut process_ids: Vec<ProcessEntryId> = recipe.recipe_process_ids.clone();
        for entry in self.store.process_entries_for_recipe(id).await? {
            if !process_ids.contains(&entry.id) {
                process_ids.push(entry.id);
            }
        }

        let dosage_ids: Vec<_> = self
            .store
            .dosages_for_step_entries(&step_ids)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();
        let dosages = self.store.delete_dosages(&dosage_ids).await?;
        let steps = self.store.delete_step_entries(&step_ids).await?;
        let processes = self.store.delete_process_entries(&process_ids).await?;

        if let Some(order_id) = recipe.order_id {
            let matched = self
                .orders
                .remove_recipe_ref(order_id, id)
                .await
                .map_err(|source| RecipeError::OrderLink {
                    recipe_id: id,
                    order_id,
                    source,
                })?;
            if !matched {
                tracing::warn!(%order_id, recipe_id = %id, "order not found while unlinking");
            }
        }

        self.store.delete_recipe(id).await?;
        tracing::info!(recipe_id = %id, steps, dosages, processes, "wash recipe deleted");
        Ok(())
    }
}
