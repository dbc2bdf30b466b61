//! TOML manifest declaring converters and entity types.
//!
//! ```toml
//! [converters.personality]
//! kind = "enum"
//! variants = ["INTROVERT", "EXTROVERT"]
//!
//! [[entity]]
//! name = "Person"
//!
//! [[entity.field]]
//! name = "name"
//! indexed = true
//!
//! [[entity.field]]
//! name = "spouse"
//! kind = "relationship"
//! target = "Person"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use super::{EntityKind, EntitySchema, EntityType, FieldDescriptor};
use crate::config::ConfigError;
use crate::context::GraphContext;
use crate::convert::EnumConverter;
use crate::error::Result;
use crate::fieldaccess::TraversalDescription;
use crate::model::{Direction, PropertyValue};

/// Converter declared by a manifest.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConverterSpec {
    /// Closed set of variant names.
    Enum {
        /// Accepted variant names.
        variants: Vec<String>,
    },
}

/// Field capability as spelled in a manifest.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestFieldKind {
    /// Plain property.
    #[default]
    Property,
    /// Converted property; needs `converter`.
    Converted,
    /// Record id.
    Id,
    /// Foreign id of a cross-store type.
    ForeignId,
    /// Never stored.
    Transient,
    /// Single relationship; needs `target`.
    Relationship,
    /// Relationship collection; needs `target`.
    Relationships,
    /// Relationship-entity collection; `target` names the relationship type.
    RelationshipEntities,
    /// Traversal; needs `target`.
    Traversal,
    /// Start node of a relationship entity.
    StartNode,
    /// End node of a relationship entity.
    EndNode,
}

/// One `[[entity.field]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestField {
    /// Field name.
    pub name: String,
    /// Capability, `property` by default.
    #[serde(default)]
    pub kind: ManifestFieldKind,
    /// Store-side property name override.
    pub store_name: Option<String>,
    /// Whether the field is indexed.
    #[serde(default)]
    pub indexed: bool,
    /// Index name override; implies `indexed`.
    pub index: Option<String>,
    /// Converter name for converted fields.
    pub converter: Option<String>,
    /// Target type of relationship-like fields.
    pub target: Option<String>,
    /// Relationship type override.
    pub rel_type: Option<String>,
    /// Relationship direction.
    pub direction: Option<Direction>,
    /// Rejects mutation of a relationship collection.
    #[serde(default)]
    pub read_only: bool,
    /// Stored in the graph for cross-store types.
    #[serde(default)]
    pub graph_backed: bool,
    /// Value read when nothing is stored.
    pub default: Option<PropertyValue>,
    /// Walk of a traversal field.
    pub traversal: Option<TraversalDescription>,
}

/// One `[[entity]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntity {
    /// Type name.
    pub name: String,
    /// Record kind, `node` by default.
    #[serde(default = "default_kind")]
    pub kind: EntityKind,
    /// Parent type.
    pub extends: Option<String>,
    /// Declared fields.
    #[serde(default, rename = "field")]
    pub fields: Vec<ManifestField>,
}

fn default_kind() -> EntityKind {
    EntityKind::Node
}

/// Converters and entity types to register, in order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Named converters.
    #[serde(default)]
    pub converters: BTreeMap<String, ConverterSpec>,
    /// Entity types; parents must come before their children.
    #[serde(default, rename = "entity")]
    pub entities: Vec<ManifestEntity>,
}

impl Manifest {
    /// Reads a manifest file.
    pub fn from_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parses manifest text; `origin` is only used in errors.
    pub fn parse(contents: &str, origin: &Path) -> std::result::Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(origin),
            source,
        })
    }

    /// Entity schemas described by the manifest.
    pub fn schemas(&self) -> std::result::Result<Vec<EntitySchema>, ConfigError> {
        self.entities.iter().map(ManifestEntity::to_schema).collect()
    }

    /// Registers the converters, then the entity types in order, and checks
    /// that every referenced type exists.
    pub fn apply(&self, ctx: &GraphContext) -> Result<Vec<Arc<EntityType>>> {
        for (name, spec) in &self.converters {
            match spec {
                ConverterSpec::Enum { variants } => ctx.register_converter(
                    name.clone(),
                    EnumConverter::new(variants.iter().cloned()),
                ),
            }
        }
        let mut registered = Vec::with_capacity(self.entities.len());
        for schema in self.schemas()? {
            registered.push(ctx.register(schema)?);
        }
        ctx.verify()?;
        Ok(registered)
    }
}

impl ManifestEntity {
    fn to_schema(&self) -> std::result::Result<EntitySchema, ConfigError> {
        let mut schema = match self.kind {
            EntityKind::Node => EntitySchema::node(&self.name),
            EntityKind::Relationship => EntitySchema::relationship(&self.name),
            EntityKind::CrossStore => EntitySchema::cross_store(&self.name),
        };
        if let Some(parent) = &self.extends {
            schema = schema.extends(parent);
        }
        for field in &self.fields {
            schema = schema.field(field.to_descriptor(&self.name)?);
        }
        Ok(schema)
    }
}

impl ManifestField {
    fn invalid(&self, entity: &str, message: &str) -> ConfigError {
        ConfigError::InvalidManifest {
            entry: format!("{entity}.{}", self.name),
            message: message.to_string(),
        }
    }

    fn target(&self, entity: &str) -> std::result::Result<&str, ConfigError> {
        self.target
            .as_deref()
            .ok_or_else(|| self.invalid(entity, "this kind of field needs a target"))
    }

    fn to_descriptor(&self, entity: &str) -> std::result::Result<FieldDescriptor, ConfigError> {
        let name = self.name.as_str();
        let mut field = match self.kind {
            ManifestFieldKind::Property => FieldDescriptor::property(name),
            ManifestFieldKind::Converted => {
                let converter = self
                    .converter
                    .as_deref()
                    .ok_or_else(|| self.invalid(entity, "converted fields need a converter"))?;
                FieldDescriptor::converted(name, converter)
            }
            ManifestFieldKind::Id => FieldDescriptor::id(name),
            ManifestFieldKind::ForeignId => FieldDescriptor::foreign_id(name),
            ManifestFieldKind::Transient => FieldDescriptor::transient(name),
            ManifestFieldKind::Relationship => {
                FieldDescriptor::relationship(name, self.target(entity)?)
            }
            ManifestFieldKind::Relationships if self.read_only => {
                FieldDescriptor::read_only_relationships(name, self.target(entity)?)
            }
            ManifestFieldKind::Relationships => {
                FieldDescriptor::relationships(name, self.target(entity)?)
            }
            ManifestFieldKind::RelationshipEntities => {
                FieldDescriptor::relationship_entities(name, self.target(entity)?)
            }
            ManifestFieldKind::Traversal => FieldDescriptor::traversal(
                name,
                self.target(entity)?,
                self.traversal.clone().unwrap_or_default(),
            ),
            ManifestFieldKind::StartNode => FieldDescriptor::start_node(name, self.target(entity)?),
            ManifestFieldKind::EndNode => FieldDescriptor::end_node(name, self.target(entity)?),
        };

        if self.read_only && self.kind != ManifestFieldKind::Relationships {
            return Err(self.invalid(entity, "only relationship collections can be read-only"));
        }
        if (self.rel_type.is_some() || self.direction.is_some())
            && field.kind.relationship_spec().is_none()
        {
            return Err(self.invalid(entity, "rel_type and direction need a relationship field"));
        }

        if let Some(store_name) = &self.store_name {
            field = field.stored_as(store_name);
        }
        match &self.index {
            Some(index) => field = field.indexed_in(index),
            None if self.indexed => field = field.indexed(),
            None => {}
        }
        if let Some(rel_type) = &self.rel_type {
            field = field.rel_type(rel_type);
        }
        if let Some(direction) = self.direction {
            field = field.direction(direction);
        }
        if self.graph_backed {
            field = field.graph_backed();
        }
        if let Some(default) = &self.default {
            field = field.default_value(default.clone());
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;

    const MANIFEST: &str = r#"
[converters.personality]
kind = "enum"
variants = ["INTROVERT", "EXTROVERT"]

[[entity]]
name = "Person"

[[entity.field]]
name = "name"
index = "people"

[[entity.field]]
name = "personality"
kind = "converted"
converter = "personality"

[[entity.field]]
name = "boss"
kind = "relationship"
target = "Person"
rel_type = "boss"
direction = "incoming"

[[entity]]
name = "Group"

[[entity.field]]
name = "people"
kind = "traversal"
target = "Person"
traversal = { rel_types = ["persons"], max_depth = 1 }
"#;

    #[test]
    fn parses_entities_and_converters() {
        let manifest = Manifest::parse(MANIFEST, Path::new("inline.toml")).unwrap();
        assert_eq!(manifest.converters.len(), 1);
        let schemas = manifest.schemas().unwrap();
        assert_eq!(schemas.len(), 2);

        let person = &schemas[0];
        assert_eq!(person.kind, EntityKind::Node);
        assert_eq!(person.fields[0].index_name.as_deref(), Some("people"));
        let boss = person.fields[2].kind.relationship_spec().unwrap();
        assert_eq!(boss.direction, Direction::Incoming);

        let FieldKind::Traversal { description, .. } = &schemas[1].fields[0].kind else {
            panic!("expected a traversal field");
        };
        assert_eq!(description.max_depth, Some(1));
    }

    #[test]
    fn missing_targets_name_the_entry() {
        let manifest = Manifest::parse(
            "[[entity]]\nname = \"Group\"\n\
             [[entity.field]]\nname = \"persons\"\nkind = \"relationships\"\n",
            Path::new("inline.toml"),
        )
        .unwrap();
        match manifest.schemas().unwrap_err() {
            ConfigError::InvalidManifest { entry, .. } => assert_eq!(entry, "Group.persons"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Manifest::parse(
            "[[entity]]\nname = \"Person\"\ncolour = \"red\"\n",
            Path::new("inline.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
