//! Input validation rules shared by create and update.

use common::{ChemicalId, ProcessDefinitionId, StepDefinitionId, StepEntryId};

use crate::draft::{DosageItem, ProcessItem, StepItem};
use crate::error::{RecipeError, ReferenceKind, Result};

/// Normalizes a submitted wash code: trims it and treats an empty string as absent.
pub fn normalize_wash_code(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

impl StepItem {
    /// Parses the step definition reference.
    pub fn step_definition_ref(&self) -> Result<StepDefinitionId> {
        StepDefinitionId::parse(&self.step_definition_id).map_err(|_| {
            RecipeError::invalid_reference(
                ReferenceKind::StepDefinition,
                &self.step_definition_id,
                self.sequence,
            )
        })
    }

    /// Returns the persisted entry id this item names, if it is well formed.
    pub fn entry_id(&self) -> Option<StepEntryId> {
        self.id.as_deref().and_then(|id| StepEntryId::parse(id).ok())
    }
}

impl DosageItem {
    /// Parses the chemical reference, attributing failures to the owning step's sequence.
    pub fn chemical_ref(&self, sequence: u32) -> Result<ChemicalId> {
        ChemicalId::parse(&self.chemical_id).map_err(|_| {
            RecipeError::invalid_reference(ReferenceKind::Chemical, &self.chemical_id, sequence)
        })
    }
}

impl ProcessItem {
    /// Parses the process definition reference.
    pub fn process_definition_ref(&self) -> Result<ProcessDefinitionId> {
        ProcessDefinitionId::parse(&self.process_definition_id).map_err(|_| {
            RecipeError::invalid_reference(
                ReferenceKind::ProcessDefinition,
                &self.process_definition_id,
                self.sequence,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_item(def: &str, id: Option<&str>) -> StepItem {
        StepItem {
            id: id.map(str::to_string),
            step_definition_id: def.to_string(),
            time: None,
            temperature: None,
            liters: None,
            sequence: 7,
            chemicals: vec![],
        }
    }

    #[test]
    fn wash_code_empty_is_absent() {
        assert_eq!(normalize_wash_code(None), None);
        assert_eq!(normalize_wash_code(Some("")), None);
        assert_eq!(normalize_wash_code(Some("   ")), None);
        assert_eq!(
            normalize_wash_code(Some(" WC-100 ")),
            Some("WC-100".to_string())
        );
    }

    #[test]
    fn malformed_step_reference_names_sequence() {
        let err = step_item("bogus", None).step_definition_ref().unwrap_err();
        assert!(matches!(
            err,
            RecipeError::InvalidReference {
                kind: ReferenceKind::StepDefinition,
                sequence: 7,
                ..
            }
        ));
    }

    #[test]
    fn well_formed_step_reference_parses() {
        let def = StepDefinitionId::new();
        let parsed = step_item(&def.to_string(), None)
            .step_definition_ref()
            .unwrap();
        assert_eq!(parsed, def);
    }

    #[test]
    fn entry_id_ignores_temporary_ids() {
        assert_eq!(step_item("x", Some("temp-17")).entry_id(), None);
        let id = StepEntryId::new();
        assert_eq!(
            step_item("x", Some(&id.to_string())).entry_id(),
            Some(id)
        );
    }

    #[test]
    fn chemical_reference_uses_step_sequence() {
        let dosage = DosageItem {
            chemical_id: "nope".to_string(),
            quantity: 1.0,
            unit: "g/L".to_string(),
        };
        let err = dosage.chemical_ref(3).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::InvalidReference {
                kind: ReferenceKind::Chemical,
                sequence: 3,
                ..
            }
        ));
    }
}
