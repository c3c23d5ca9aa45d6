//! Detail-by-population: the header with its child references expanded in place.

use chrono::{DateTime, Utc};
use common::{
    ChemicalId, DosageId, OrderId, ProcessDefinitionId, ProcessEntryId, StepDefinitionId,
    StepEntryId, WashRecipeId,
};
use recipe_store::{ChemicalDefinition, ProcessDefinition, StepDefinition};
use serde::Serialize;

/// A dosage with its chemical definition resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulatedDosage {
    pub id: DosageId,
    pub chemical_id: ChemicalId,
    pub chemical: Option<ChemicalDefinition>,
    pub quantity: f64,
    pub unit: String,
}

/// A step entry with its step definition and dosages resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulatedStep {
    pub id: StepEntryId,
    pub step_definition_id: StepDefinitionId,
    pub step_definition: Option<StepDefinition>,
    pub time: Option<f64>,
    pub temperature: Option<f64>,
    pub liters: Option<f64>,
    pub sequence: u32,
    pub dosages: Vec<PopulatedDosage>,
}

/// A process entry with its process definition resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulatedProcess {
    pub id: ProcessEntryId,
    pub process_definition_id: ProcessDefinitionId,
    pub process_definition: Option<ProcessDefinition>,
    pub process_type: Option<String>,
    pub remark: Option<String>,
    pub sequence: u32,
}

/// A recipe header whose `steps` and `processes` hold resolved rows instead of ids.
///
/// Rows follow the order of the header's reference lists. A referenced row
/// that no longer exists is left out; a catalog reference that no longer
/// resolves is reported as `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulatedRecipe {
    pub id: WashRecipeId,
    pub order_id: Option<OrderId>,
    pub date: DateTime<Utc>,
    pub wash_code: Option<String>,
    pub wash_type: String,
    pub steps: Vec<PopulatedStep>,
    pub processes: Vec<PopulatedProcess>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
