//! The combined step/process sequence.

use recipe_store::{ChemicalDosage, ProcessDefinition, ProcessEntry, StepEntry};
use serde::Serialize;

/// A step entry with its step definition name resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    #[serde(flatten)]
    pub entry: StepEntry,
    pub step_name: Option<String>,
}

/// A process entry with its process definition resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessView {
    #[serde(flatten)]
    pub entry: ProcessEntry,
    pub process_definition: Option<ProcessDefinition>,
}

/// A dosage with its chemical name resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedDosage {
    #[serde(flatten)]
    pub dosage: ChemicalDosage,
    pub chemical_name: Option<String>,
}

/// One entry of a recipe's merged sequence.
///
/// Steps and processes share a single `sequence` space; everything that
/// orders them goes through this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecipeItem {
    Step(StepView),
    Process(ProcessView),
}

impl RecipeItem {
    /// Returns the item's position in the combined sequence.
    pub fn sequence(&self) -> u32 {
        match self {
            RecipeItem::Step(step) => step.entry.sequence,
            RecipeItem::Process(process) => process.entry.sequence,
        }
    }

    /// Returns true for step items.
    pub fn is_step(&self) -> bool {
        matches!(self, RecipeItem::Step(_))
    }
}

/// Interleaves steps and processes by ascending `sequence`.
///
/// Equal sequence values keep their input order, so steps come before
/// processes and each kind keeps the order it was given in.
pub fn merge_by_sequence(steps: Vec<StepView>, processes: Vec<ProcessView>) -> Vec<RecipeItem> {
    let mut items: Vec<RecipeItem> = steps
        .into_iter()
        .map(RecipeItem::Step)
        .chain(processes.into_iter().map(RecipeItem::Process))
        .collect();
    items.sort_by_key(RecipeItem::sequence);
    items
}
