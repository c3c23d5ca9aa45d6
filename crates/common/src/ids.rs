use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Every entity and reference kind gets its own type so a step entry id can
/// never be passed where a dosage id is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parses an identifier from its hyphenated or simple string form.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s.trim()).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identity of a wash recipe, the aggregate root.
    WashRecipeId
);
entity_id!(
    /// Identity of one step occurrence inside a recipe.
    StepEntryId
);
entity_id!(
    /// Identity of a chemical dosage attached to a step entry.
    DosageId
);
entity_id!(
    /// Identity of one process occurrence inside a recipe.
    ProcessEntryId
);
entity_id!(
    /// Identity of the externally owned order a recipe belongs to.
    OrderId
);
entity_id!(
    /// Reference into the step definition catalog.
    StepDefinitionId
);
entity_id!(
    /// Reference into the chemical catalog.
    ChemicalId
);
entity_id!(
    /// Reference into the laundry process catalog.
    ProcessDefinitionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_unique_ids() {
        let id1 = WashRecipeId::new();
        let id2 = WashRecipeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = StepEntryId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn parse_accepts_padded_input() {
        let uuid = Uuid::new_v4();
        let id = ChemicalId::parse(&format!("  {uuid} ")).unwrap();
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(StepDefinitionId::parse("not-an-id").is_err());
        assert!(StepDefinitionId::parse("").is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
