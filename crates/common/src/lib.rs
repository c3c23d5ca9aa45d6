//! Shared identifier types for the wash recipe system.

mod ids;

pub use ids::{
    ChemicalId, DosageId, OrderId, ProcessDefinitionId, ProcessEntryId, StepDefinitionId,
    StepEntryId, WashRecipeId,
};
