//! Declarative property schemas and the type registry.
//!
//! Each managed-object type declares only its own properties plus the name
//! of its parent type. [`TypeRegistry::register`] composes the merged schema
//! (own entries over the parent's merged entries) once, at registration
//! time, and the same registry doubles as the type factory: it is the only
//! place that turns a [`ManagedObjectReference`] into a [`ManagedObject`].

use crate::error::{VimError, VimResult};
use crate::object::ManagedObject;
use crate::types::{ManagedObjectReference, VimValue};

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ── Declarations ────────────────────────────────────────────────────

/// Value a property holds before anything has been retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// Absent
    Unset,
    /// Empty ordered sequence
    EmptyList,
    Bool(bool),
    Int(i64),
}

impl DefaultValue {
    pub fn to_value(self) -> VimValue {
        match self {
            Self::Unset => VimValue::None,
            Self::EmptyList => VimValue::empty_array(),
            Self::Bool(b) => VimValue::Bool(b),
            Self::Int(i) => VimValue::Int(i),
        }
    }
}

/// One declared property of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: &'static str,
    /// Value is one or more managed object references that resolve to objects
    pub reference: bool,
    pub default: DefaultValue,
}

impl PropertyDef {
    /// Plain data property, unset by default.
    pub const fn data(name: &'static str) -> Self {
        Self { name, reference: false, default: DefaultValue::Unset }
    }

    /// Plain data property holding a list.
    pub const fn data_list(name: &'static str) -> Self {
        Self { name, reference: false, default: DefaultValue::EmptyList }
    }

    /// Single reference to another managed object.
    pub const fn reference(name: &'static str) -> Self {
        Self { name, reference: true, default: DefaultValue::Unset }
    }

    /// List of references to other managed objects.
    pub const fn reference_list(name: &'static str) -> Self {
        Self { name, reference: true, default: DefaultValue::EmptyList }
    }

    pub const fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = default;
        self
    }
}

/// A managed-object type: its parent and the properties it adds.
#[derive(Debug, Clone, Copy)]
pub struct TypeDef {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub properties: &'static [PropertyDef],
}

impl TypeDef {
    pub const fn root(name: &'static str, properties: &'static [PropertyDef]) -> Self {
        Self { name, parent: None, properties }
    }

    pub const fn extends(
        name: &'static str,
        parent: &'static str,
        properties: &'static [PropertyDef],
    ) -> Self {
        Self { name, parent: Some(parent), properties }
    }
}

// ── Merged schema ───────────────────────────────────────────────────

/// Where a merged entry was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub def: PropertyDef,
    pub declared_by: &'static str,
}

/// The merged property schema of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_name: &'static str,
    entries: BTreeMap<&'static str, SchemaEntry>,
}

impl Schema {
    fn compose(def: &TypeDef, parent: Option<&Schema>) -> Self {
        let mut entries = parent.map(|p| p.entries.clone()).unwrap_or_default();
        for prop in def.properties {
            entries.insert(
                prop.name,
                SchemaEntry { def: *prop, declared_by: def.name },
            );
        }
        Self { type_name: def.name, entries }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDef> {
        self.entries.get(name).map(|e| &e.def)
    }

    pub fn entry(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyDef> {
        self.entries.values().map(|e| &e.def)
    }
}

// ── Registry / factory ──────────────────────────────────────────────

struct RegisteredType {
    def: TypeDef,
    schema: Arc<Schema>,
}

/// Closed catalog of managed-object types.
///
/// Built once at start-up (see [`TypeRegistry::with_catalog`]) and shared
/// behind an `Arc`. Parents must be registered before their children.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<&'static str, RegisteredType>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every type in [`crate::catalog::CATALOG`].
    pub fn with_catalog() -> VimResult<Self> {
        let mut registry = Self::new();
        registry.register_all(crate::catalog::CATALOG)?;
        Ok(registry)
    }

    pub fn register(&mut self, def: TypeDef) -> VimResult<()> {
        if self.types.contains_key(def.name) {
            return Err(VimError::schema(format!("Type '{}' registered twice", def.name)));
        }
        let parent = match def.parent {
            Some(parent) => Some(self.types.get(parent).ok_or_else(|| {
                VimError::schema(format!(
                    "Type '{}' extends '{parent}', which is not registered",
                    def.name
                ))
            })?),
            None => None,
        };
        let schema = Schema::compose(&def, parent.map(|p| p.schema.as_ref()));
        self.types.insert(
            def.name,
            RegisteredType { def, schema: Arc::new(schema) },
        );
        Ok(())
    }

    pub fn register_all(&mut self, defs: &[TypeDef]) -> VimResult<()> {
        for def in defs {
            self.register(*def)?;
        }
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_def(&self, type_name: &str) -> VimResult<&TypeDef> {
        self.types
            .get(type_name)
            .map(|t| &t.def)
            .ok_or_else(|| VimError::unknown_type(type_name))
    }

    /// The merged schema of `type_name`.
    pub fn merged_schema(&self, type_name: &str) -> VimResult<Arc<Schema>> {
        self.types
            .get(type_name)
            .map(|t| Arc::clone(&t.schema))
            .ok_or_else(|| VimError::unknown_type(type_name))
    }

    /// Whether `type_name` is `ancestor` or derives from it.
    pub fn is_a(&self, type_name: &str, ancestor: &str) -> bool {
        let mut current = self.types.get(type_name).map(|t| t.def);
        while let Some(def) = current {
            if def.name == ancestor {
                return true;
            }
            current = def.parent.and_then(|p| self.types.get(p)).map(|t| t.def);
        }
        false
    }

    /// Construct an unpopulated object for `mo_ref`, seeded from its schema.
    pub fn build(&self, mo_ref: &ManagedObjectReference) -> VimResult<ManagedObject> {
        let schema = self.merged_schema(&mo_ref.mo_type)?;
        debug!("Building {} ({} properties)", mo_ref, schema.len());
        Ok(ManagedObject::new(mo_ref.clone(), schema))
    }

    pub fn build_many(&self, refs: &[ManagedObjectReference]) -> VimResult<Vec<ManagedObject>> {
        refs.iter().map(|r| self.build(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CATALOG;
    use crate::error::VimErrorKind;

    const BASE: TypeDef = TypeDef::root(
        "Base",
        &[PropertyDef::data("name"), PropertyDef::data_list("tags")],
    );
    const DERIVED: TypeDef = TypeDef::extends(
        "Derived",
        "Base",
        &[PropertyDef::reference_list("tags"), PropertyDef::reference("owner")],
    );
    const LEAF: TypeDef = TypeDef::extends("Leaf", "Derived", &[PropertyDef::data("size")]);

    fn small() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_all(&[BASE, DERIVED, LEAF]).unwrap();
        registry
    }

    #[test]
    fn subtype_entry_wins_on_collision() {
        let schema = small().merged_schema("Derived").unwrap();
        let tags = schema.entry("tags").unwrap();
        assert!(tags.def.reference);
        assert_eq!(tags.declared_by, "Derived");
        assert_eq!(schema.entry("name").unwrap().declared_by, "Base");
    }

    #[test]
    fn merged_schema_is_transitive() {
        let schema = small().merged_schema("Leaf").unwrap();
        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["name", "owner", "size", "tags"]);
        assert!(schema.get("tags").unwrap().reference);
    }

    #[test]
    fn catalog_obeys_precedence_law() {
        let registry = TypeRegistry::with_catalog().unwrap();
        let by_name: HashMap<_, _> = CATALOG.iter().map(|d| (d.name, d)).collect();

        for def in CATALOG {
            let schema = registry.merged_schema(def.name).unwrap();
            for name in schema.names() {
                // Nearest declaration walking up from the type itself.
                let mut cursor = Some(def.name);
                let mut expected = None;
                while let Some(t) = cursor {
                    let d = by_name[t];
                    if let Some(p) = d.properties.iter().find(|p| p.name == name) {
                        expected = Some((*p, d.name));
                        break;
                    }
                    cursor = d.parent;
                }
                let (prop, owner) = expected.expect("merged name declared somewhere");
                let entry = schema.entry(name).unwrap();
                assert_eq!(entry.def, prop, "{}.{}", def.name, name);
                assert_eq!(entry.declared_by, owner, "{}.{}", def.name, name);
            }
        }
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut registry = TypeRegistry::new();
        let err = registry.register(LEAF).unwrap_err();
        assert_eq!(err.kind, VimErrorKind::InvalidSchema);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = small();
        assert_eq!(registry.register(BASE).unwrap_err().kind, VimErrorKind::InvalidSchema);
    }

    #[test]
    fn type_def_keeps_own_declarations_only() {
        let registry = small();
        let leaf = registry.type_def("Leaf").unwrap();
        assert_eq!(leaf.parent, Some("Derived"));
        assert_eq!(leaf.properties.len(), 1);
        assert_eq!(registry.merged_schema("Leaf").unwrap().len(), 4);
        assert_eq!(registry.type_def("Gadget").unwrap_err().kind, VimErrorKind::UnknownType);
    }

    #[test]
    fn build_unknown_type_fails() {
        let registry = small();
        let err = registry
            .build(&ManagedObjectReference::new("Gadget", "g-1"))
            .unwrap_err();
        assert_eq!(err.kind, VimErrorKind::UnknownType);
    }

    #[test]
    fn build_many_preserves_order() {
        let registry = small();
        let refs = vec![
            ManagedObjectReference::new("Leaf", "b"),
            ManagedObjectReference::new("Base", "a"),
        ];
        let objects = registry.build_many(&refs).unwrap();
        let built: Vec<_> = objects.iter().map(|o| o.mo_ref().clone()).collect();
        assert_eq!(built, refs);
    }

    #[test]
    fn is_a_follows_parents() {
        let registry = TypeRegistry::with_catalog().unwrap();
        assert!(registry.is_a("ClusterComputeResource", "ManagedEntity"));
        assert!(registry.is_a("Datacenter", "Datacenter"));
        assert!(!registry.is_a("Folder", "Datacenter"));
        assert!(!registry.is_a("Gadget", "ManagedObject"));
    }
}
