//! Read-only reference catalogs: step, chemical and process definitions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ChemicalId, ProcessDefinitionId, StepDefinitionId};
use tokio::sync::RwLock;

use crate::{ChemicalDefinition, ProcessDefinition, Result, StepDefinition};

/// Lookup interface over the reference data the engine consumes but never
/// mutates.
///
/// The batch lookups default to one single lookup per id; backends that can
/// do better override them.
#[async_trait]
pub trait ReferenceCatalog: Send + Sync {
    /// Looks up a step definition.
    async fn step_definition(&self, id: StepDefinitionId) -> Result<Option<StepDefinition>>;

    /// Looks up a chemical definition.
    async fn chemical(&self, id: ChemicalId) -> Result<Option<ChemicalDefinition>>;

    /// Looks up a laundry process definition.
    async fn process_definition(
        &self,
        id: ProcessDefinitionId,
    ) -> Result<Option<ProcessDefinition>>;

    /// Looks up many step definitions at once. Unknown ids are absent from the map.
    async fn step_definitions(
        &self,
        ids: &[StepDefinitionId],
    ) -> Result<HashMap<StepDefinitionId, StepDefinition>> {
        let mut found = HashMap::new();
        for id in ids {
            if let Some(def) = self.step_definition(*id).await? {
                found.insert(*id, def);
            }
        }
        Ok(found)
    }

    /// Looks up many chemicals at once. Unknown ids are absent from the map.
    async fn chemicals(&self, ids: &[ChemicalId]) -> Result<HashMap<ChemicalId, ChemicalDefinition>> {
        let mut found = HashMap::new();
        for id in ids {
            if let Some(def) = self.chemical(*id).await? {
                found.insert(*id, def);
            }
        }
        Ok(found)
    }

    /// Looks up many process definitions at once. Unknown ids are absent from the map.
    async fn process_definitions(
        &self,
        ids: &[ProcessDefinitionId],
    ) -> Result<HashMap<ProcessDefinitionId, ProcessDefinition>> {
        let mut found = HashMap::new();
        for id in ids {
            if let Some(def) = self.process_definition(*id).await? {
                found.insert(*id, def);
            }
        }
        Ok(found)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    steps: HashMap<StepDefinitionId, StepDefinition>,
    chemicals: HashMap<ChemicalId, ChemicalDefinition>,
    processes: HashMap<ProcessDefinitionId, ProcessDefinition>,
}

/// In-memory reference catalog for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReferenceCatalog {
    catalog: Arc<RwLock<Catalog>>,
}

impl InMemoryReferenceCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step definition and returns its id.
    pub async fn add_step_definition(&self, name: impl Into<String>) -> StepDefinitionId {
        let id = StepDefinitionId::new();
        let def = StepDefinition {
            id,
            name: name.into(),
            description: None,
        };
        self.catalog.write().await.steps.insert(id, def);
        id
    }

    /// Registers a chemical and returns its id.
    pub async fn add_chemical(&self, name: impl Into<String>, default_unit: &str) -> ChemicalId {
        let id = ChemicalId::new();
        let def = ChemicalDefinition {
            id,
            name: name.into(),
            default_unit: Some(default_unit.to_string()),
        };
        self.catalog.write().await.chemicals.insert(id, def);
        id
    }

    /// Registers a process definition and returns its id.
    pub async fn add_process_definition(
        &self,
        name: impl Into<String>,
        process_type: Option<&str>,
    ) -> ProcessDefinitionId {
        let id = ProcessDefinitionId::new();
        let def = ProcessDefinition {
            id,
            name: name.into(),
            process_type: process_type.map(str::to_string),
        };
        self.catalog.write().await.processes.insert(id, def);
        id
    }
}

#[async_trait]
impl ReferenceCatalog for InMemoryReferenceCatalog {
    async fn step_definition(&self, id: StepDefinitionId) -> Result<Option<StepDefinition>> {
        Ok(self.catalog.read().await.steps.get(&id).cloned())
    }

    async fn chemical(&self, id: ChemicalId) -> Result<Option<ChemicalDefinition>> {
        Ok(self.catalog.read().await.chemicals.get(&id).cloned())
    }

    async fn process_definition(
        &self,
        id: ProcessDefinitionId,
    ) -> Result<Option<ProcessDefinition>> {
        Ok(self.catalog.read().await.processes.get(&id).cloned())
    }
}
