//! Facade over the wash recipe aggregate.

use std::time::Instant;

use common::{ChemicalId, ProcessDefinitionId, StepDefinitionId, WashRecipeId};
use domain::{ProcessItem, RecipeDraft, RecipeError, ReferenceKind, Result, StepItem};
use projections::{MergedRecipe, PopulatedRecipe, RecipeReader};
use recipe_store::{OrderLinkage, RecipeStore, ReferenceCatalog, WashRecipe};

use crate::config::EngineConfig;

/// Persistence engine for the wash recipe aggregate.
///
/// Writes span the recipe header, its three child collections and the
/// owning order. Creation runs as a saga that compensates on failure;
/// update and delete surface the first failure and leave partial state for
/// a retry to finish. Reads are delegated to a [`RecipeReader`].
pub struct WashRecipeEngine<S, R, O>
where
    S: RecipeStore,
    R: ReferenceCatalog,
    O: OrderLinkage,
{
    pub(crate) store: S,
    pub(crate) catalog: R,
    pub(crate) orders: O,
    pub(crate) config: EngineConfig,
    reader: RecipeReader<S, R>,
}

impl<S, R, O> WashRecipeEngine<S, R, O>
where
    S: RecipeStore + Clone,
    R: ReferenceCatalog + Clone,
    O: OrderLinkage,
{
    /// Creates a new engine.
    pub fn new(store: S, catalog: R, orders: O, config: EngineConfig) -> Self {
        let reader = RecipeReader::new(store.clone(), catalog.clone());
        Self {
            store,
            catalog,
            orders,
            config,
            reader,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a recipe from a draft.
    ///
    /// On any failure after the first write, everything written by this call
    /// is deleted again before the error is returned. A failure to link the
    /// committed recipe to its order is reported as [`RecipeError::OrderLink`]
    /// without rolling the recipe back.
    #[tracing::instrument(skip(self, draft), fields(wash_code = ?draft.header.wash_code))]
    pub async fn create_recipe(&self, draft: RecipeDraft) -> Result<WashRecipe> {
        let started = Instant::now();
        let result = self.run_creation(&draft).await;
        record_outcome("create", started, &result);
        result
    }

    /// Loads a recipe with its references expanded in place.
    #[tracing::instrument(skip(self))]
    pub async fn get_recipe(&self, id: WashRecipeId) -> Result<PopulatedRecipe> {
        let started = Instant::now();
        let result = self.reader.populated(id).await;
        record_outcome("get", started, &result);
        result
    }

    /// Loads a recipe as one sequence-ordered list of steps and processes.
    #[tracing::instrument(skip(self))]
    pub async fn get_merged_recipe(&self, id: WashRecipeId) -> Result<MergedRecipe> {
        let started = Instant::now();
        let result = self.reader.merged(id).await;
        record_outcome("get_merged", started, &result);
        result
    }

    /// Lists recipe headers, most recent date first.
    #[tracing::instrument(skip(self))]
    pub async fn list_recipes(&self) -> Result<Vec<WashRecipe>> {
        let started = Instant::now();
        let result = self.reader.list().await;
        record_outcome("list", started, &result);
        result
    }

    /// Reconciles a recipe's persisted children against a full replacement draft.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update_recipe(&self, id: WashRecipeId, draft: RecipeDraft) -> Result<WashRecipe> {
        let started = Instant::now();
        let deadline = self.config.deadline;
        let result = tokio::time::timeout(deadline, self.reconcile(id, &draft))
            .await
            .unwrap_or_else(|_| Err(RecipeError::DeadlineExceeded(deadline)));
        record_outcome("update", started, &result);
        result
    }

    /// Deletes a recipe, everything it owns, and its order reference.
    #[tracing::instrument(skip(self))]
    pub async fn delete_recipe(&self, id: WashRecipeId) -> Result<()> {
        let started = Instant::now();
        let deadline = self.config.deadline;
        let result = tokio::time::timeout(deadline, self.cascade_delete(id))
            .await
            .unwrap_or_else(|_| Err(RecipeError::DeadlineExceeded(deadline)));
        record_outcome("delete", started, &result);
        result
    }

    /// Parses every step definition reference and checks it exists.
    ///
    /// Fails on the first offending item in submission order, whether the
    /// reference is malformed or unknown.
    pub(crate) async fn resolve_step_definitions(
        &self,
        steps: &[&StepItem],
    ) -> Result<Vec<StepDefinitionId>> {
        let parsed: Vec<Result<StepDefinitionId>> =
            steps.iter().map(|step| step.step_definition_ref()).collect();
        let lookup: Vec<StepDefinitionId> =
            parsed.iter().filter_map(|id| id.as_ref().ok()).copied().collect();
        let known = self.catalog.step_definitions(&lookup).await?;

        steps
            .iter()
            .zip(parsed)
            .map(|(step, id)| -> Result<StepDefinitionId> {
                let id = id?;
                if known.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(RecipeError::invalid_reference(
                        ReferenceKind::StepDefinition,
                        &step.step_definition_id,
                        step.sequence,
                    ))
                }
            })
            .collect()
    }

    /// Resolves each step's definition and chemicals together.
    ///
    /// Items are walked once in submission order, a step's definition
    /// before its dosages, and the first malformed or unknown reference
    /// of either kind fails the whole draft.
    pub(crate) async fn resolve_step_references(
        &self,
        steps: &[&StepItem],
    ) -> Result<Vec<(StepDefinitionId, Vec<ChemicalId>)>> {
        let definitions: Vec<Result<StepDefinitionId>> =
            steps.iter().map(|step| step.step_definition_ref()).collect();
        let chemicals: Vec<Vec<Result<ChemicalId>>> = steps
            .iter()
            .map(|step| {
                step.chemicals
                    .iter()
                    .map(|dosage| dosage.chemical_ref(step.sequence))
                    .collect()
            })
            .collect();

        let definition_lookup: Vec<StepDefinitionId> = definitions
            .iter()
            .filter_map(|id| id.as_ref().ok())
            .copied()
            .collect();
        let chemical_lookup: Vec<ChemicalId> = chemicals
            .iter()
            .flatten()
            .filter_map(|id| id.as_ref().ok())
            .copied()
            .collect();
        let known_definitions = self.catalog.step_definitions(&definition_lookup).await?;
        let known_chemicals = self.catalog.chemicals(&chemical_lookup).await?;

        let mut resolved = Vec::with_capacity(steps.len());
        for ((step, definition), step_chemicals) in steps.iter().zip(definitions).zip(chemicals) {
            let definition = definition?;
            if !known_definitions.contains_key(&definition) {
                return Err(RecipeError::invalid_reference(
                    ReferenceKind::StepDefinition,
                    &step.step_definition_id,
                    step.sequence,
                ));
            }

            let mut chemical_ids = Vec::with_capacity(step_chemicals.len());
            for (dosage, chemical) in step.chemicals.iter().zip(step_chemicals) {
                let chemical = chemical?;
                if !known_chemicals.contains_key(&chemical) {
                    return Err(RecipeError::invalid_reference(
                        ReferenceKind::Chemical,
                        &dosage.chemical_id,
                        step.sequence,
                    ));
                }
                chemical_ids.push(chemical);
            }
            resolved.push((definition, chemical_ids));
        }
        Ok(resolved)
    }

    /// Parses every process definition reference and checks it exists.
    ///
    /// Fails on the first offending item in submission order.
    pub(crate) async fn resolve_process_definitions(
        &self,
        processes: &[&ProcessItem],
    ) -> Result<Vec<ProcessDefinitionId>> {
        let parsed: Vec<Result<ProcessDefinitionId>> = processes
            .iter()
            .map(|process| process.process_definition_ref())
            .collect();
        let lookup: Vec<ProcessDefinitionId> =
            parsed.iter().filter_map(|id| id.as_ref().ok()).copied().collect();
        let known = self.catalog.process_definitions(&lookup).await?;

        processes
            .iter()
            .zip(parsed)
            .map(|(process, id)| -> Result<ProcessDefinitionId> {
                let id = id?;
                if known.contains_key(&id) {
                    Ok(id)
                } else {
                    Err(RecipeError::invalid_reference(
                        ReferenceKind::ProcessDefinition,
                        &process.process_definition_id,
                        process.sequence,
                    ))
                }
            })
            .collect()
    }

    /// Fails with `DuplicateKey` if a recipe other than `owner` holds the code.
    pub(crate) async fn ensure_wash_code_free(
        &self,
        wash_code: Option<&str>,
        owner: Option<WashRecipeId>,
    ) -> Result<()> {
        let Some(code) = wash_code else {
            return Ok(());
        };
        match self.store.find_recipe_by_wash_code(code).await? {
            Some(holder) if Some(holder.id) != owner => Err(RecipeError::DuplicateKey {
                wash_code: code.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn record_outcome<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => err.kind().as_str(),
    };
    metrics::counter!(
        "wash_recipe_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("wash_recipe_operation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
