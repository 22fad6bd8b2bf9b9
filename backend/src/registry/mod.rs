//! Mapping Registry - Store and reuse mapping sets
//!
//! Saves validated mapping sets to disk as JSON and finds them again by id,
//! by name and transaction type, or by the input columns they read.
//!
//! The registry is owned by the caller; the engine never sees it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult, ValidationError};
use crate::logs::{log_success, log_warning};
use crate::transform::dsl::{read_document, MappingSet};
use crate::validation::validate_mapping_document;

/// Directory where mappings are stored (relative to current dir)
pub const DEFAULT_REGISTRY_DIR: &str = ".etlmap/mappings";

/// Environment variable overriding the registry directory
pub const REGISTRY_DIR_ENV: &str = "ETLMAP_MAPPINGS_DIR";

/// Minimum share of a mapping's columns present in the input
const COMPATIBILITY_THRESHOLD: f64 = 0.5;

/// A stored mapping set with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMapping {
    /// Unique identifier
    pub id: String,
    pub name: String,
    pub transaction_type: Option<String>,
    pub mapping: MappingSet,
    /// Input columns the mapping reads
    pub source_columns: Vec<String>,
    pub created_at: String,
    pub last_used: Option<String>,
    pub use_count: u32,
}

/// Registry for managing mapping sets
pub struct MappingRegistry {
    registry_dir: PathBuf,
    /// Loaded mappings (id -> mapping)
    mappings: HashMap<String, StoredMapping>,
}

impl MappingRegistry {
    /// Create a registry in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_REGISTRY_DIR)
    }

    /// Create a registry in `ETLMAP_MAPPINGS_DIR`, or the default directory
    pub fn from_env() -> Self {
        match std::env::var(REGISTRY_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::with_dir(dir),
            _ => Self::new(),
        }
    }

    /// Create a registry with a custom directory, loading what it holds
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let mut registry = Self {
            registry_dir: dir.as_ref().to_path_buf(),
            mappings: HashMap::new(),
        };
        registry.load_all();
        registry
    }

    pub fn dir(&self) -> &Path {
        &self.registry_dir
    }

    /// Load all mappings from the registry directory
    fn load_all(&mut self) {
        let Ok(entries) = fs::read_dir(&self.registry_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            let loaded = fs::read_to_string(&path)
                .map_err(RegistryError::from)
                .and_then(|content| Ok(serde_json::from_str::<StoredMapping>(&content)?));
            match loaded {
                Ok(stored) => {
                    self.mappings.insert(stored.id.clone(), stored);
                }
                Err(e) => log_warning(format!("Skipping {}: {}", path.display(), e)),
            }
        }
    }

    /// All stored mappings, by name then id
    pub fn list(&self) -> Vec<&StoredMapping> {
        let mut all: Vec<_> = self.mappings.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get(&self, id: &str) -> Option<&StoredMapping> {
        self.mappings.get(id)
    }

    /// Like [`get`](Self::get), as an error when missing
    pub fn require(&self, id: &str) -> RegistryResult<&StoredMapping> {
        self.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Most recently created mapping with this name (case-insensitive) and,
    /// when given, this transaction type
    pub fn find(&self, name: &str, transaction_type: Option<&str>) -> Option<&StoredMapping> {
        self.mappings
            .values()
            .filter(|m| m.name.eq_ignore_ascii_case(name))
            .filter(|m| match transaction_type {
                Some(tx) => m.transaction_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tx)),
                None => true,
            })
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
    }

    /// Mappings whose source columns mostly appear in `headers`, best first
    pub fn find_compatible(&self, headers: &[String]) -> Vec<(&StoredMapping, f64)> {
        let mut compatible: Vec<_> = self
            .mappings
            .values()
            .filter_map(|m| {
                let score = compatibility(&m.source_columns, headers);
                (score > COMPATIBILITY_THRESHOLD).then_some((m, score))
            })
            .collect();

        compatible.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.use_count.cmp(&a.0.use_count))
        });

        compatible
    }

    /// Store a mapping set, returning its new id
    pub fn save(&mut self, mapping: MappingSet) -> RegistryResult<String> {
        fs::create_dir_all(&self.registry_dir)?;

        let id = generate_id(&mapping.name);
        let stored = StoredMapping {
            id: id.clone(),
            name: mapping.name.clone(),
            transaction_type: mapping.transaction_type.clone(),
            source_columns: mapping.source_columns(),
            mapping,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_used: None,
            use_count: 0,
        };

        self.write(&stored)?;
        self.mappings.insert(id.clone(), stored);
        Ok(id)
    }

    /// Validate a YAML or JSON mapping file and store it. `name` replaces the
    /// document's own name; the file stem is used when both are empty.
    pub fn import(&mut self, path: &Path, name: Option<&str>) -> RegistryResult<String> {
        let document = read_document(path)?;
        validate_mapping_document(&document).map_err(|e| match e {
            ValidationError::SchemaError { errors } => RegistryError::InvalidMapping(errors),
            ValidationError::InvalidSchema(msg) => RegistryError::InvalidMapping(vec![msg]),
            ValidationError::Mapping(err) => RegistryError::Mapping(err),
        })?;

        let mut mapping = MappingSet::from_value(&document)?;
        if let Some(name) = name {
            mapping.name = name.to_string();
        } else if mapping.name.is_empty() {
            mapping.name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("imported")
                .to_string();
        }

        let id = self.save(mapping)?;
        log_success(format!("Imported {} as {}", path.display(), id));
        Ok(id)
    }

    /// Record one use of a mapping
    pub fn record_use(&mut self, id: &str) -> RegistryResult<()> {
        let stored = self
            .mappings
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        stored.last_used = Some(chrono::Utc::now().to_rfc3339());
        stored.use_count += 1;

        let snapshot = stored.clone();
        self.write(&snapshot)
    }

    /// Delete a mapping from the registry
    pub fn delete(&mut self, id: &str) -> RegistryResult<()> {
        if self.mappings.remove(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        fs::remove_file(self.path_for(id))?;
        log_success(format!("Deleted mapping {}", id));
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.registry_dir.join(format!("{}.json", id))
    }

    fn write(&self, stored: &StoredMapping) -> RegistryResult<()> {
        let content = serde_json::to_string_pretty(stored)?;
        fs::write(self.path_for(&stored.id), content)?;
        Ok(())
    }
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Share of `stored` columns present in `headers` (case-insensitive)
fn compatibility(stored: &[String], headers: &[String]) -> f64 {
    if stored.is_empty() {
        return 0.0;
    }

    let matched = stored
        .iter()
        .filter(|col| headers.iter().any(|h| h.eq_ignore_ascii_case(col)))
        .count();

    matched as f64 / stored.len() as f64
}

/// Slug of `name` plus a short random suffix
fn generate_id(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let slug = if slug.is_empty() { "mapping".to_string() } else { slug };
    format!("{}-{}", slug, &suffix[..8])
}
