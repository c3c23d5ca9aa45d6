//! Domain layer for wash recipes.
//!
//! This crate provides the caller-facing side of the recipe aggregate:
//! - [`RecipeDraft`] with its [`RecipeHeader`] and tagged [`WorkspaceItem`]s
//! - Validation rules for wash codes and catalog references
//! - The [`RecipeError`] taxonomy and its stable [`ErrorKind`]

pub mod draft;
pub mod error;
pub mod validation;

pub use draft::{DosageItem, ProcessItem, RecipeDraft, RecipeHeader, StepItem, WorkspaceItem};
pub use error::{ErrorKind, RecipeError, ReferenceKind, Result};
pub use validation::normalize_wash_code;
