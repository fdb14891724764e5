//! A single managed object: its reference, merged schema and property store.
//!
//! `ManagedObject` holds no connection and never talks to the server on its
//! own. The client feeds it retrieved properties through
//! [`ManagedObject::set_view_data`] and drives materialization through
//! [`ManagedObject::resolution`] / [`ManagedObject::install`].

use crate::error::{VimError, VimResult};
use crate::schema::Schema;
use crate::store::{Materialized, PropertyStore};
use crate::types::{ManagedObjectReference, VimValue};
use crate::view::ObjectContent;

use log::{debug, trace, warn};
use std::sync::Arc;

/// What reading a property requires.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Already materialized
    Cached(Materialized),
    /// Can be materialized from local data alone
    Local(Materialized),
    /// One child object has to be built
    One(ManagedObjectReference),
    /// Several child objects have to be built, in this order
    Many(Vec<ManagedObjectReference>),
}

#[derive(Debug, Clone)]
pub struct ManagedObject {
    mo_ref: ManagedObjectReference,
    schema: Arc<Schema>,
    store: PropertyStore,
    last_content: Option<ObjectContent>,
}

impl ManagedObject {
    /// New unpopulated object with every schema property at its default.
    pub fn new(mo_ref: ManagedObjectReference, schema: Arc<Schema>) -> Self {
        let store = PropertyStore::seed(&schema);
        Self {
            mo_ref,
            schema,
            store,
            last_content: None,
        }
    }

    pub fn mo_ref(&self) -> &ManagedObjectReference {
        &self.mo_ref
    }

    pub fn type_name(&self) -> &str {
        &self.mo_ref.mo_type
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &PropertyStore {
        &self.store
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.schema.contains(name)
    }

    pub fn raw(&self, name: &str) -> Option<&VimValue> {
        self.store.get(name).map(|s| s.raw())
    }

    pub fn cached(&self, name: &str) -> Option<&Materialized> {
        self.store.get(name).and_then(|s| s.cached())
    }

    /// The last `ObjectContent` applied to this object.
    pub fn last_content(&self) -> Option<&ObjectContent> {
        self.last_content.as_ref()
    }

    /// Apply retrieved properties. Returns how many were stored.
    ///
    /// Names outside the schema and empty values are skipped; a list
    /// delivered inside a one-element array envelope is unwrapped first.
    pub fn set_view_data(&mut self, content: &ObjectContent) -> usize {
        let mut applied = 0;
        for prop in &content.prop_set {
            if !self.schema.contains(&prop.name) {
                warn!(
                    "Skipping undefined property '{}' on {} (value {:?})",
                    prop.name, self.mo_ref, prop.val
                );
                continue;
            }
            if prop.val.is_empty_marker() {
                debug!("Skipping {}.{} with empty value", self.mo_ref, prop.name);
                continue;
            }
            let value = prop.val.clone().unwrap_array_envelope();
            if self.store.overwrite(&prop.name, value) {
                applied += 1;
            }
        }
        self.last_content = Some(content.clone());
        applied
    }

    /// Work needed to read `name`.
    pub fn resolution(&self, name: &str) -> VimResult<Resolution> {
        let slot = self
            .store
            .get(name)
            .ok_or_else(|| VimError::attribute_not_found(self.type_name(), name))?;

        if let Some(cached) = slot.cached() {
            trace!("Using cached value for {}.{}", self.mo_ref, name);
            return Ok(Resolution::Cached(cached.clone()));
        }
        if !slot.is_reference() {
            return Ok(Resolution::Local(Materialized::Value(slot.raw().clone())));
        }

        match slot.raw() {
            VimValue::Reference(r) => Ok(Resolution::One(r.clone())),
            VimValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_reference().cloned().ok_or_else(|| {
                        VimError::parse(format!(
                            "{}.{} holds a non-reference list element: {item:?}",
                            self.mo_ref, name
                        ))
                    })
                })
                .collect::<VimResult<Vec<_>>>()
                .map(Resolution::Many),
            VimValue::None => Ok(Resolution::Local(Materialized::Value(VimValue::None))),
            other => Err(VimError::parse(format!(
                "{}.{} should hold managed object references, got {other:?}",
                self.mo_ref, name
            ))),
        }
    }

    /// Cache the materialized value of `name`.
    pub fn install(&mut self, name: &str, value: Materialized) -> VimResult<()> {
        let mo_ref = &self.mo_ref;
        let slot = self
            .store
            .get_mut(name)
            .ok_or_else(|| VimError::attribute_not_found(&mo_ref.mo_type, name))?;
        trace!("Caching materialized value for {}.{}", mo_ref, name);
        slot.resolve(value);
        Ok(())
    }

    /// Drop the materialized value of `name`; the next read re-materializes
    /// from the current raw value.
    pub fn invalidate(&mut self, name: &str) -> bool {
        self.store.get_mut(name).map(|s| s.invalidate()).unwrap_or(false)
    }

    pub fn invalidate_all(&mut self) -> usize {
        self.store.invalidate_all()
    }

    /// Raw property values as JSON, for display.
    pub fn snapshot(&self) -> VimResult<serde_json::Value> {
        Ok(serde_json::json!({
            "moRef": serde_json::to_value(&self.mo_ref)?,
            "properties": serde_json::to_value(self.store.raw_values())?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VimErrorKind;
    use crate::schema::TypeRegistry;
    use crate::store::SlotState;
    use crate::types::DataObject;
    use crate::view::DynamicProperty;

    fn host() -> ManagedObject {
        let registry = TypeRegistry::with_catalog().unwrap();
        registry
            .build(&ManagedObjectReference::new("HostSystem", "host-1"))
            .unwrap()
    }

    fn content(props: Vec<(&str, VimValue)>) -> ObjectContent {
        ObjectContent {
            obj: ManagedObjectReference::new("HostSystem", "host-1"),
            prop_set: props
                .into_iter()
                .map(|(name, val)| DynamicProperty { name: name.to_string(), val })
                .collect(),
        }
    }

    #[test]
    fn unknown_response_property_is_dropped() {
        let mut obj = host();
        let before = obj.store().raw_values().len();
        let applied = obj.set_view_data(&content(vec![("frobnicator", VimValue::Int(3))]));
        assert_eq!(applied, 0);
        assert_eq!(obj.store().raw_values().len(), before);
        assert!(obj.raw("frobnicator").is_none());
    }

    #[test]
    fn empty_values_keep_existing_raw() {
        let mut obj = host();
        obj.set_view_data(&content(vec![("name", VimValue::string("esx01"))]));
        obj.set_view_data(&content(vec![("name", VimValue::None)]));
        assert_eq!(obj.raw("name"), Some(&VimValue::string("esx01")));
    }

    #[test]
    fn double_wrapped_list_is_unwrapped() {
        let mut obj = host();
        let a = VimValue::reference("Datastore", "ds-1");
        let b = VimValue::reference("Datastore", "ds-2");
        let c = VimValue::reference("Datastore", "ds-3");
        obj.set_view_data(&content(vec![(
            "datastore",
            VimValue::Array(vec![VimValue::Array(vec![a.clone(), b.clone(), c.clone()])]),
        )]));
        assert_eq!(obj.raw("datastore"), Some(&VimValue::Array(vec![a, b, c])));
    }

    #[test]
    fn scalars_and_data_objects_stored_as_is() {
        let mut obj = host();
        let summary = DataObject::new("HostListSummary").with("overallStatus", "green");
        obj.set_view_data(&content(vec![("summary", VimValue::Data(summary.clone()))]));
        assert_eq!(obj.raw("summary"), Some(&VimValue::Data(summary)));
        assert_eq!(obj.last_content().unwrap().prop_set.len(), 1);
    }

    #[test]
    fn resolution_plans() {
        let mut obj = host();
        assert_eq!(
            obj.resolution("name").unwrap(),
            Resolution::Local(Materialized::Value(VimValue::None))
        );
        assert_eq!(obj.resolution("vm").unwrap(), Resolution::Many(vec![]));

        obj.set_view_data(&content(vec![("parent", VimValue::reference("ComputeResource", "domain-s1"))]));
        assert_eq!(
            obj.resolution("parent").unwrap(),
            Resolution::One(ManagedObjectReference::new("ComputeResource", "domain-s1"))
        );

        obj.install("parent", Materialized::Object(ManagedObjectReference::new("ComputeResource", "domain-s1")))
            .unwrap();
        assert!(matches!(obj.resolution("parent").unwrap(), Resolution::Cached(_)));

        let err = obj.resolution("nope").unwrap_err();
        assert_eq!(err.kind, VimErrorKind::AttributeNotFound);
    }

    #[test]
    fn reference_property_with_scalar_is_a_parse_error() {
        let mut obj = host();
        obj.set_view_data(&content(vec![("parent", VimValue::string("domain-s1"))]));
        assert_eq!(obj.resolution("parent").unwrap_err().kind, VimErrorKind::ParseError);
    }

    #[test]
    fn invalidate_returns_to_pending() {
        let mut obj = host();
        obj.install("name", Materialized::Value(VimValue::string("old"))).unwrap();
        assert!(obj.invalidate("name"));
        assert_eq!(obj.store().get("name").unwrap().state(), &SlotState::RawPending);
        assert!(!obj.invalidate("name"));
        assert!(!obj.invalidate("missing"));
    }

    #[test]
    fn snapshot_lists_raw_properties() {
        let mut obj = host();
        obj.set_view_data(&content(vec![("name", VimValue::string("esx01"))]));
        let snap = obj.snapshot().unwrap();
        assert_eq!(snap["moRef"]["value"], "host-1");
        assert_eq!(snap["properties"]["name"]["value"], "esx01");
    }
}
