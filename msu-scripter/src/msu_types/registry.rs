//! MSU type (track schema) registry
//!
//! An MSU type names a track-numbering convention: the valid track numbers,
//! their display names, alias keys used by MSU details YAML, and the remap
//! functions from other MSU types into this one.

use msu_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::mapping::{Remap, TrackMapping};

pub const A_LINK_TO_THE_PAST: &str = "The Legend of Zelda: A Link to the Past";
pub const SUPER_METROID: &str = "Super Metroid";
pub const SMZ3: &str = "Super Metroid / A Link to the Past Combination Randomizer";
pub const SMZ3_LEGACY: &str = "Super Metroid / A Link to the Past Combination Randomizer Legacy";

const BUILTIN_MSU_TYPES: &str = include_str!("../../data/msu_types.json");

/// Definitions compiled into the binary
pub fn builtin_definitions() -> Result<Vec<SchemaDefinition>> {
    Ok(serde_json::from_str(BUILTIN_MSU_TYPES)?)
}

/// Definitions from a JSON file holding an array of MSU types
pub fn read_definitions(path: &Path) -> Result<Vec<SchemaDefinition>> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "MSU type definitions {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// One track slot of an MSU type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDefinition {
    pub number: u32,
    pub name: String,
    /// Keys used for this track in serialized MSU details documents
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TrackDefinition {
    /// Key written when exporting MSU details
    pub fn primary_alias(&self) -> Option<&str> {
        self.aliases.first().map(String::as_str)
    }
}

/// Serialized form of an MSU type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub tracks: Vec<TrackDefinition>,
    /// Remap functions into this type, keyed by source type name
    #[serde(default)]
    pub conversions: BTreeMap<String, TrackMapping>,
    /// Types declared compatible without a registered remap
    #[serde(default)]
    pub compatible_with: Vec<String>,
}

/// Immutable MSU type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSchema {
    name: String,
    tracks: BTreeMap<u32, TrackDefinition>,
    conversions: BTreeMap<String, TrackMapping>,
    compatible_with: HashSet<String>,
}

impl TrackSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn valid_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.tracks.keys().copied()
    }

    pub fn is_valid(&self, number: u32) -> bool {
        self.tracks.contains_key(&number)
    }

    pub fn track(&self, number: u32) -> Option<&TrackDefinition> {
        self.tracks.get(&number)
    }

    /// Track definitions in ascending number order
    pub fn tracks(&self) -> impl Iterator<Item = &TrackDefinition> {
        self.tracks.values()
    }

    pub fn track_by_alias(&self, key: &str) -> Option<&TrackDefinition> {
        self.tracks
            .values()
            .find(|t| t.aliases.iter().any(|a| a == key))
    }

    fn declares_relation_to(&self, other: &str) -> bool {
        self.conversions.contains_key(other) || self.compatible_with.contains(other)
    }
}

impl From<SchemaDefinition> for TrackSchema {
    fn from(def: SchemaDefinition) -> Self {
        Self {
            name: def.name,
            tracks: def.tracks.into_iter().map(|t| (t.number, t)).collect(),
            conversions: def.conversions,
            compatible_with: def.compatible_with.into_iter().collect(),
        }
    }
}

/// Lookup table of every known MSU type
#[derive(Debug, Clone, Default)]
pub struct TrackSchemaRegistry {
    schemas: BTreeMap<String, Arc<TrackSchema>>,
}

impl TrackSchemaRegistry {
    /// Registry with the MSU types shipped in the binary
    pub fn builtin() -> Result<Self> {
        Self::from_definitions(builtin_definitions()?)
    }

    /// Built-in types with same-named definitions from `path` replacing them
    pub fn builtin_with_overrides(path: &Path) -> Result<Self> {
        let mut merged: BTreeMap<String, SchemaDefinition> = builtin_definitions()?
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        for def in read_definitions(path)? {
            debug!(msu_type = %def.name, "Custom MSU type definition");
            merged.insert(def.name.clone(), def);
        }
        let registry = Self::from_definitions(merged.into_values().collect())?;
        info!(
            path = %path.display(),
            msu_types = registry.schemas.len(),
            "Merged custom MSU type definitions"
        );
        Ok(registry)
    }

    /// Build a registry, rejecting duplicate names, duplicate track numbers,
    /// and conversions from unknown types
    pub fn from_definitions(defs: Vec<SchemaDefinition>) -> Result<Self> {
        let names: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        if names.len() != defs.len() {
            return Err(Error::InvalidInput(
                "Duplicate MSU type name in definitions".to_string(),
            ));
        }

        for def in &defs {
            let numbers: HashSet<u32> = def.tracks.iter().map(|t| t.number).collect();
            if numbers.len() != def.tracks.len() {
                return Err(Error::InvalidInput(format!(
                    "MSU type '{}' defines a track number twice",
                    def.name
                )));
            }
            if let Some(unknown) = def
                .conversions
                .keys()
                .chain(def.compatible_with.iter())
                .find(|source| !names.contains(source.as_str()))
            {
                return Err(Error::InvalidInput(format!(
                    "MSU type '{}' references unknown type '{}'",
                    def.name, unknown
                )));
            }
        }

        let schemas = defs
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(TrackSchema::from(def))))
            .collect();
        Ok(Self { schemas })
    }

    pub fn get(&self, name: &str) -> Option<Arc<TrackSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TrackSchema>> {
        self.get(name)
            .ok_or_else(|| Error::NotFound(format!("MSU type '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Equal, or a relation declared in either direction
    pub fn are_compatible(&self, a: &TrackSchema, b: &TrackSchema) -> bool {
        a.name == b.name || a.declares_relation_to(&b.name) || b.declares_relation_to(&a.name)
    }

    /// Remap function from `from` numbering into `to` numbering
    pub fn remap(&self, from: &TrackSchema, to: &TrackSchema) -> Result<Remap> {
        if from.name == to.name {
            return Ok(Remap::identity());
        }
        match to.conversions.get(&from.name) {
            Some(mapping) => {
                debug!(from = %from.name, to = %to.name, "Resolved track conversion");
                Ok(Remap::new(mapping.clone()))
            }
            None => Err(Error::UnsupportedConversion {
                from: from.name.clone(),
                to: to.name.clone(),
            }),
        }
    }

    /// True for the two layouts that hold both games in one pack
    pub fn is_combined(&self, schema: &TrackSchema) -> bool {
        schema.name == SMZ3 || schema.name == SMZ3_LEGACY
    }
}
