//! Error taxonomy for wash recipe operations.

use std::time::Duration;

use common::{OrderId, WashRecipeId};
use recipe_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Which reference catalog a rejected id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    StepDefinition,
    Chemical,
    ProcessDefinition,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::StepDefinition => write!(f, "step definition"),
            ReferenceKind::Chemical => write!(f, "chemical"),
            ReferenceKind::ProcessDefinition => write!(f, "process definition"),
        }
    }
}

/// Stable, caller-facing classification of a [`RecipeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    DuplicateKey,
    InvalidReference,
    NotFound,
    StorageFailure,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during wash recipe operations.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Another recipe already holds the wash code.
    #[error("Wash code already in use: {wash_code}")]
    DuplicateKey { wash_code: String },

    /// A step, chemical or process reference is malformed or unknown.
    #[error("Invalid {kind} reference '{reference}' at sequence {sequence}")]
    InvalidReference {
        kind: ReferenceKind,
        reference: String,
        sequence: u32,
    },

    /// The recipe id does not resolve.
    #[error("Wash recipe not found: {0}")]
    NotFound(WashRecipeId),

    /// The recipe listing is empty.
    #[error("No wash recipes found")]
    NoRecipes,

    /// An underlying store operation failed.
    #[error("Storage failure: {0}")]
    Storage(StoreError),

    /// The operation did not finish within its deadline.
    #[error("Operation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The recipe was committed but the owning order could not be updated.
    #[error("Wash recipe {recipe_id} was saved but could not be linked to order {order_id}: {source}")]
    OrderLink {
        recipe_id: WashRecipeId,
        order_id: OrderId,
        #[source]
        source: StoreError,
    },
}

impl RecipeError {
    /// Classifies the error into its stable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecipeError::Validation(_) => ErrorKind::ValidationError,
            RecipeError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            RecipeError::InvalidReference { .. } => ErrorKind::InvalidReference,
            RecipeError::NotFound(_) | RecipeError::NoRecipes => ErrorKind::NotFound,
            RecipeError::Storage(_)
            | RecipeError::DeadlineExceeded(_)
            | RecipeError::OrderLink { .. } => ErrorKind::StorageFailure,
        }
    }

    /// Creates an invalid reference error.
    pub fn invalid_reference(kind: ReferenceKind, reference: impl Into<String>, sequence: u32) -> Self {
        RecipeError::InvalidReference {
            kind,
            reference: reference.into(),
            sequence,
        }
    }
}

impl From<StoreError> for RecipeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey {
                field: "wash_code",
                value,
            } => RecipeError::DuplicateKey { wash_code: value },
            other => RecipeError::Storage(other),
        }
    }
}

/// Result type for recipe operations.
pub type Result<T> = std::result::Result<T, RecipeError>;
