//! Catalog documentation attached to metadata snapshots
//!
//! Each provider ships a JSON block describing how its catalog relations
//! join (`relationships`) and a set of proven catalog queries
//! (`queryPatterns`). The blocks are static data compiled into the binary.

use crate::db::Provider;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const BUILTIN: &[(Provider, &str)] = &[
    (Provider::Db2, include_str!("../../resources/docs/db2.json")),
    (
        Provider::Postgresql,
        include_str!("../../resources/docs/postgresql.json"),
    ),
    (Provider::Sqlite, include_str!("../../resources/docs/sqlite.json")),
];

/// Documentation block for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDocs {
    #[serde(default = "empty_object")]
    pub relationships: Value,
    #[serde(default = "empty_object")]
    pub query_patterns: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Default for ProviderDocs {
    fn default() -> Self {
        Self {
            relationships: empty_object(),
            query_patterns: empty_object(),
        }
    }
}

/// Documentation blocks keyed by provider
#[derive(Debug, Clone, Default)]
pub struct DocumentationSet {
    providers: HashMap<Provider, ProviderDocs>,
}

impl DocumentationSet {
    /// The embedded blocks
    pub fn builtin() -> Result<Self> {
        let mut set = Self::default();
        for (provider, text) in BUILTIN {
            set.insert(*provider, serde_json::from_str(text)?);
        }
        Ok(set)
    }

    pub fn insert(&mut self, provider: Provider, docs: ProviderDocs) {
        self.providers.insert(provider, docs);
    }

    /// Block for a provider; empty objects when none is registered
    pub fn for_provider(&self, provider: Provider) -> ProviderDocs {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }
}
