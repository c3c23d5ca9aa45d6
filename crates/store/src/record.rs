//! Persisted row types.
//!
//! Each struct maps one-to-one onto a stored row. Child rows carry a
//! back-reference to their owner, and owners carry ordered id lists of
//! their children; the engine keeps both directions consistent.

use chrono::{DateTime, Utc};
use common::{
    ChemicalId, DosageId, OrderId, ProcessDefinitionId, ProcessEntryId, StepDefinitionId,
    StepEntryId, WashRecipeId,
};
use serde::{Deserialize, Serialize};

/// The aggregate root: a wash recipe header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WashRecipe {
    pub id: WashRecipeId,
    pub order_id: Option<OrderId>,
    pub date: DateTime<Utc>,
    /// Unique across all recipes when present.
    pub wash_code: Option<String>,
    pub wash_type: String,
    /// Step entries in submission order.
    pub steps: Vec<StepEntryId>,
    /// Process entries in submission order.
    pub recipe_process_ids: Vec<ProcessEntryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WashRecipe {
    /// Creates a header with empty child reference lists.
    pub fn new(
        id: WashRecipeId,
        order_id: Option<OrderId>,
        date: DateTime<Utc>,
        wash_code: Option<String>,
        wash_type: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_id,
            date,
            wash_code,
            wash_type: wash_type.into(),
            steps: Vec::new(),
            recipe_process_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One step occurrence inside a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    pub id: StepEntryId,
    pub wash_recipe_id: WashRecipeId,
    pub step_definition_id: StepDefinitionId,
    pub time: Option<f64>,
    pub temperature: Option<f64>,
    pub liters: Option<f64>,
    pub sequence: u32,
    pub dosages: Vec<DosageId>,
}

/// A chemical attached to a step entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalDosage {
    pub id: DosageId,
    pub step_entry_id: StepEntryId,
    pub chemical_id: ChemicalId,
    pub quantity: f64,
    pub unit: String,
}

/// One laundry process occurrence inside a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub id: ProcessEntryId,
    pub wash_recipe_id: WashRecipeId,
    pub process_definition_id: ProcessDefinitionId,
    /// Free-form classification, independent of the definition's own type.
    pub process_type: Option<String>,
    pub remark: Option<String>,
    pub sequence: u32,
}

/// Catalog entry describing a kind of wash step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: StepDefinitionId,
    pub name: String,
    pub description: Option<String>,
}

/// Catalog entry describing a chemical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalDefinition {
    pub id: ChemicalId,
    pub name: String,
    pub default_unit: Option<String>,
}

/// Catalog entry describing an external laundry process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: ProcessDefinitionId,
    pub name: String,
    pub process_type: Option<String>,
}
