//! Statement catalog
//!
//! Versioned, parameterized catalog queries keyed by (provider, version,
//! logical name). Templates are configuration data: TOML files embedded in
//! the binary, optionally extended from a user directory. The catalog is
//! immutable once loaded.

pub mod names;

use crate::db::Provider;
use crate::error::{CatalogError, CatalogResult};
use crate::sql::placeholder_count;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Statement files compiled into the binary
const BUILTIN: &[(&str, &str)] = &[
    (
        "db2_11.5.toml",
        include_str!("../../resources/statements/db2_11.5.toml"),
    ),
    (
        "postgresql_12.toml",
        include_str!("../../resources/statements/postgresql_12.toml"),
    ),
    (
        "sqlite_3.toml",
        include_str!("../../resources/statements/sqlite_3.toml"),
    ),
];

/// One parameterized catalog query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementTemplate {
    pub provider: Provider,
    pub version: String,
    pub name: String,
    pub description: String,
    /// Declared parameter names, in binding order
    pub parameters: Vec<String>,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
struct StatementFile {
    provider: Provider,
    version: String,
    #[serde(default)]
    statements: Vec<StatementEntry>,
}

#[derive(Debug, Deserialize)]
struct StatementEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Vec<String>,
    sql: String,
}

/// Lookup table of statement templates
#[derive(Debug, Clone, Default)]
pub struct StatementCatalog {
    sets: HashMap<(Provider, String), BTreeMap<String, StatementTemplate>>,
}

impl StatementCatalog {
    /// Catalog with only the embedded statement files
    pub fn builtin() -> CatalogResult<Self> {
        Self::from_sources(BUILTIN.iter().copied())
    }

    /// Embedded statements plus every `*.toml` file in `statements_dir`.
    ///
    /// User files are applied after the built-in ones, in file name order;
    /// a statement with the same (provider, version, name) replaces the
    /// earlier one.
    pub fn load(statements_dir: Option<&Path>) -> CatalogResult<Self> {
        let mut catalog = Self::builtin()?;
        let Some(dir) = statements_dir else {
            return Ok(catalog);
        };

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();

        for path in files {
            let content = std::fs::read_to_string(&path)?;
            let label = path.display().to_string();
            let count = catalog.add_source(&label, &content)?;
            tracing::debug!(file = %label, statements = count, "loaded statement file");
        }
        Ok(catalog)
    }

    /// Build a catalog from `(file label, TOML text)` pairs
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> CatalogResult<Self> {
        let mut catalog = Self::default();
        for (file, content) in sources {
            catalog.add_source(file, content)?;
        }
        Ok(catalog)
    }

    /// Parse and validate one file, then merge it. Nothing is merged if any
    /// template in the file is invalid.
    fn add_source(&mut self, file: &str, content: &str) -> CatalogResult<usize> {
        let parsed: StatementFile = toml::from_str(content).map_err(|source| {
            CatalogError::Parse {
                file: file.to_string(),
                source,
            }
        })?;

        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(parsed.statements.len());
        for entry in parsed.statements {
            if !seen.insert(entry.name.clone()) {
                return Err(CatalogError::InvalidTemplate {
                    name: entry.name,
                    reason: format!("defined more than once in {}", file),
                });
            }
            if entry.sql.trim().is_empty() {
                return Err(CatalogError::InvalidTemplate {
                    name: entry.name,
                    reason: "empty SQL".to_string(),
                });
            }
            let placeholders = placeholder_count(&entry.sql);
            if placeholders != entry.parameters.len() {
                return Err(CatalogError::InvalidTemplate {
                    name: entry.name,
                    reason: format!(
                        "{} placeholder(s) but {} declared parameter(s)",
                        placeholders,
                        entry.parameters.len()
                    ),
                });
            }
            templates.push(StatementTemplate {
                provider: parsed.provider,
                version: parsed.version.clone(),
                name: entry.name,
                description: entry.description,
                parameters: entry.parameters,
                sql: entry.sql.trim().to_string(),
            });
        }

        let count = templates.len();
        let set = self
            .sets
            .entry((parsed.provider, parsed.version))
            .or_default();
        for template in templates {
            set.insert(template.name.clone(), template);
        }
        Ok(count)
    }

    /// Look up a template.
    ///
    /// # Errors
    /// `CatalogError::StatementNotFound` when the triple is not registered.
    /// There is no fallback to another version or a default query.
    pub fn get_statement(
        &self,
        provider: Provider,
        version: &str,
        name: &str,
    ) -> CatalogResult<&StatementTemplate> {
        self.sets
            .get(&(provider, version.to_string()))
            .and_then(|set| set.get(name))
            .ok_or_else(|| CatalogError::StatementNotFound {
                provider: provider.to_string(),
                version: version.to_string(),
                name: name.to_string(),
            })
    }

    /// Probe for an optional statement
    pub fn contains(&self, provider: Provider, version: &str, name: &str) -> bool {
        self.get_statement(provider, version, name).is_ok()
    }

    /// Number of templates registered for a (provider, version) pair
    pub fn statement_count(&self, provider: Provider, version: &str) -> usize {
        self.sets
            .get(&(provider, version.to_string()))
            .map_or(0, BTreeMap::len)
    }

    /// Logical names registered for a (provider, version) pair, sorted
    pub fn statement_names(&self, provider: Provider, version: &str) -> Vec<&str> {
        self.sets
            .get(&(provider, version.to_string()))
            .map(|set| set.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Registered versions for a provider, oldest first
    pub fn versions(&self, provider: Provider) -> Vec<&str> {
        let mut versions: Vec<&str> = self
            .sets
            .keys()
            .filter(|(p, _)| *p == provider)
            .map(|(_, v)| v.as_str())
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Pick the statement set to use for a detected server version.
    ///
    /// Exact match first, then the highest registered version not newer
    /// than the detected one, then the newest registered version.
    pub fn resolve_version(&self, provider: Provider, detected: Option<&str>) -> CatalogResult<String> {
        let versions = self.versions(provider);
        let newest = versions
            .last()
            .ok_or_else(|| CatalogError::ProviderNotRegistered(provider.to_string()))?;

        let Some(detected) = detected else {
            return Ok(newest.to_string());
        };
        if versions.contains(&detected) {
            return Ok(detected.to_string());
        }
        let Some(target) = parse_version(detected) else {
            return Ok(newest.to_string());
        };

        let best = versions
            .iter()
            .filter(|v| parse_version(v).is_some_and(|parsed| parsed <= target))
            .last()
            .unwrap_or(newest);
        Ok(best.to_string())
    }
}

/// Numeric components of a version string (`11.5`, `11_5`, `16.2`)
fn parse_version(version: &str) -> Option<Vec<u64>> {
    let parts: Vec<u64> = version
        .split(['.', '_'])
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() { None } else { Some(parts) }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
