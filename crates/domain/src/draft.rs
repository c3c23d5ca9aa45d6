//! Caller-submitted recipe state: a header plus unordered workspace items.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

/// Header fields of a submitted recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeHeader {
    pub order_id: Option<OrderId>,
    /// Defaults to the creation instant when absent.
    pub date: Option<DateTime<Utc>>,
    pub wash_code: Option<String>,
    #[serde(default)]
    pub wash_type: String,
}

/// A chemical dosage as submitted with a step item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosageItem {
    pub chemical_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
}

/// A submitted step occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepItem {
    /// Id of the persisted step entry this item edits, if any. Anything that
    /// does not name an existing entry of the recipe creates a new one.
    #[serde(default)]
    pub id: Option<String>,
    pub step_definition_id: String,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub liters: Option<f64>,
    pub sequence: u32,
    #[serde(default)]
    pub chemicals: Vec<DosageItem>,
}

/// A submitted laundry process occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessItem {
    #[serde(default)]
    pub id: Option<String>,
    pub process_definition_id: String,
    #[serde(default)]
    pub process_type: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
    pub sequence: u32,
}

/// A workspace item tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkspaceItem {
    Step(StepItem),
    Process(ProcessItem),
}

impl WorkspaceItem {
    /// Returns the caller-supplied position in the combined sequence.
    pub fn sequence(&self) -> u32 {
        match self {
            WorkspaceItem::Step(step) => step.sequence,
            WorkspaceItem::Process(process) => process.sequence,
        }
    }
}

/// A validated create or update submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDraft {
    pub header: RecipeHeader,
    pub items: Vec<WorkspaceItem>,
}

impl RecipeDraft {
    /// Builds a draft, failing when the item array is missing.
    ///
    /// An empty array is accepted; only its absence is rejected.
    pub fn new(header: RecipeHeader, items: Option<Vec<WorkspaceItem>>) -> Result<Self> {
        let items = items.ok_or_else(|| {
            RecipeError::Validation("workspace items array is required".to_string())
        })?;
        Ok(Self { header, items })
    }

    /// Splits the items into steps and processes, each in submission order.
    pub fn partition(&self) -> (Vec<&StepItem>, Vec<&ProcessItem>) {
        let mut steps = Vec::new();
        let mut processes = Vec::new();
        for item in &self.items {
            match item {
                WorkspaceItem::Step(step) => steps.push(step),
                WorkspaceItem::Process(process) => processes.push(process),
            }
        }
        (steps, processes)
    }
}
