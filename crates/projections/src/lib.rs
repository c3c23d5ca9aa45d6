//! Read side of the wash recipe aggregate.
//!
//! This crate rebuilds recipes for display:
//! - [`RecipeReader::populated`] returns the header with child references expanded in place
//! - [`RecipeReader::merged`] returns steps and processes as one [`RecipeItem`] sequence
//! - [`merge_by_sequence`] is the single ordering rule for that sequence

pub mod item;
pub mod reader;
pub mod views;

pub use item::{ProcessView, RecipeItem, ResolvedDosage, StepView, merge_by_sequence};
pub use reader::RecipeReader;
pub use views::{
    MergedRecipe, PopulatedDosage, PopulatedProcess, PopulatedRecipe, PopulatedStep,
};
