//! Storage for wash recipes.
//!
//! Provides the row types, the [`RecipeStore`] trait over the recipe header
//! and its three child collections, the [`ReferenceCatalog`] over the
//! read-only step, chemical and process definitions, and the
//! [`OrderLinkage`] over the externally owned order's recipe list. Each has
//! an in-memory implementation; [`PostgresRecipeStore`] implements all three.

pub mod error;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod record;
pub mod reference;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryRecipeStore;
pub use orders::{InMemoryOrderLinks, OrderLinkage};
pub use postgres::PostgresRecipeStore;
pub use record::{
    ChemicalDefinition, ChemicalDosage, ProcessDefinition, ProcessEntry, StepDefinition,
    StepEntry, WashRecipe,
};
pub use reference::{InMemoryReferenceCatalog, ReferenceCatalog};
pub use store::{RecipeStore, RecipeStoreExt};
