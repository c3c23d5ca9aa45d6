//! Read views over a persisted recipe.

pub mod merged;
pub mod populated;

pub use merged::MergedRecipe;
pub use populated::{PopulatedDosage, PopulatedProcess, PopulatedRecipe, PopulatedStep};
