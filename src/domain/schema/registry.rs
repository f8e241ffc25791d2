//! Process-wide, read-only schema registry.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use thiserror::Error;

use super::{builtin, SlotSchema};
use crate::domain::intent::Intent;

/// Errors raised by schema construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("no schema registered for intent '{0}'")]
    UnknownIntent(Intent),

    #[error("intent '{0}' is reserved and cannot carry a schema")]
    ReservedIntent(Intent),

    #[error("slot '{slot}' of intent '{intent}' has an empty prompt")]
    EmptyPrompt { intent: Intent, slot: String },

    #[error("slot '{slot}' of intent '{intent}' is declared twice")]
    DuplicateSlot { intent: Intent, slot: String },

    #[error("two schemas registered for intent '{0}'")]
    DuplicateIntent(Intent),
}

static BUILTIN: Lazy<SchemaRegistry> = Lazy::new(|| {
    SchemaRegistry::new(builtin::all()).expect("built-in schemas are well-formed")
});

/// Immutable mapping from workflow intent to its slot schema.
///
/// Registered once at startup; sessions only ever read it.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<Intent, SlotSchema>,
}

impl SchemaRegistry {
    /// Builds a registry from a list of schemas.
    ///
    /// Rejects two schemas for the same intent.
    pub fn new(schemas: Vec<SlotSchema>) -> Result<Self, SchemaError> {
        let mut map = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            let intent = schema.intent();
            if map.insert(intent, schema).is_some() {
                return Err(SchemaError::DuplicateIntent(intent));
            }
        }
        Ok(Self { schemas: map })
    }

    /// The registry of built-in workflow schemas, frozen on first use.
    pub fn builtin() -> &'static SchemaRegistry {
        &BUILTIN
    }

    /// Looks up the schema for an intent.
    pub fn get_schema(&self, intent: Intent) -> Result<&SlotSchema, SchemaError> {
        self.schemas
            .get(&intent)
            .ok_or(SchemaError::UnknownIntent(intent))
    }

    /// Intents this registry can serve.
    pub fn registered_intents(&self) -> impl Iterator<Item = Intent> + '_ {
        self.schemas.keys().copied()
    }
}
