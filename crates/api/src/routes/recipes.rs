//! Wash recipe endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::WashRecipeId;
use domain::{RecipeDraft, RecipeHeader, WorkspaceItem};
use projections::{MergedRecipe, PopulatedRecipe};
use recipe_store::{OrderLinkage, RecipeStore, ReferenceCatalog, WashRecipe};
use saga::WashRecipeEngine;
use serde::Deserialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, R, O>
where
    S: RecipeStore,
    R: ReferenceCatalog,
    O: OrderLinkage,
{
    pub engine: WashRecipeEngine<S, R, O>,
}

// -- Request types --

/// Body of a create or update call: header fields plus the workspace items.
#[derive(Deserialize)]
pub struct RecipeRequest {
    #[serde(flatten)]
    pub header: RecipeHeader,
    pub items: Option<Vec<WorkspaceItem>>,
}

impl RecipeRequest {
    fn into_draft(self) -> Result<RecipeDraft, ApiError> {
        Ok(RecipeDraft::new(self.header, self.items)?)
    }
}

fn parse_recipe_id(id: &str) -> Result<WashRecipeId, ApiError> {
    WashRecipeId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid recipe id: {e}")))
}

// -- Handlers --

/// POST /wash-recipes: create a recipe with its steps and processes.
#[tracing::instrument(skip(state, body))]
pub async fn create<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
    body: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WashRecipe>), ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let Json(req) = body?;
    let recipe = state.engine.create_recipe(req.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// GET /wash-recipes: list recipe headers, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
) -> Result<Json<Vec<WashRecipe>>, ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    Ok(Json(state.engine.list_recipes().await?))
}

/// GET /wash-recipes/{id}: recipe with its references expanded.
#[tracing::instrument(skip(state))]
pub async fn get<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
    Path(id): Path<String>,
) -> Result<Json<PopulatedRecipe>, ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let id = parse_recipe_id(&id)?;
    Ok(Json(state.engine.get_recipe(id).await?))
}

/// GET /wash-recipes/{id}/merged: steps and processes as one ordered list.
#[tracing::instrument(skip(state))]
pub async fn merged<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
    Path(id): Path<String>,
) -> Result<Json<MergedRecipe>, ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let id = parse_recipe_id(&id)?;
    Ok(Json(state.engine.get_merged_recipe(id).await?))
}

/// PUT /wash-recipes/{id}: reconcile the recipe against a full replacement.
#[tracing::instrument(skip(state, body))]
pub async fn update<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
    Path(id): Path<String>,
    body: Result<Json<RecipeRequest>, JsonRejection>,
) -> Result<Json<WashRecipe>, ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let id = parse_recipe_id(&id)?;
    let Json(req) = body?;
    Ok(Json(state.engine.update_recipe(id, req.into_draft()?).await?))
}

/// DELETE /wash-recipes/{id}: delete the recipe and everything it owns.
#[tracing::instrument(skip(state))]
pub async fn delete<S, R, O>(
    State(state): State<Arc<AppState<S, R, O>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: RecipeStore + Clone + 'static,
    R: ReferenceCatalog + Clone + 'static,
    O: OrderLinkage + 'static,
{
    let id = parse_recipe_id(&id)?;
    state.engine.delete_recipe(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
