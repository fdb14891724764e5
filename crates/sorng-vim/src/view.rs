//! Property-retrieval messages (`RetrieveProperties`).
//!
//! Requests are described with typed specs and turned into wire messages
//! through [`VimTransport::create`]; responses are decoded back into
//! [`ObjectContent`] lists.

use crate::error::{VimError, VimResult};
use crate::transport::VimTransport;
use crate::types::{DataObject, ManagedObjectReference, VimValue};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Requests ────────────────────────────────────────────────────────

/// Which properties of which type to retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySpec {
    pub type_name: String,
    pub all: bool,
    #[serde(default)]
    pub path_set: Vec<String>,
}

/// Follow `path` on objects of `type_name` when collecting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalSpec {
    pub name: String,
    pub type_name: String,
    pub path: String,
    pub skip: bool,
}

/// Starting object of a retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    pub obj: ManagedObjectReference,
    pub skip: bool,
    #[serde(default)]
    pub select_set: Vec<TraversalSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyFilterSpec {
    pub prop_set: Vec<PropertySpec>,
    pub object_set: Vec<ObjectSpec>,
}

impl PropertyFilterSpec {
    /// Retrieve properties of a single object: everything when `all` is
    /// set, otherwise the named subset.
    pub fn for_object(obj: &ManagedObjectReference, properties: &[&str], all: bool) -> Self {
        Self {
            prop_set: vec![PropertySpec {
                type_name: obj.mo_type.clone(),
                all,
                path_set: properties.iter().map(|p| p.to_string()).collect(),
            }],
            object_set: vec![ObjectSpec {
                obj: obj.clone(),
                skip: false,
                select_set: Vec::new(),
            }],
        }
    }

    /// Retrieve `properties` of every member of a container view.
    pub fn for_container_view(
        view: &ManagedObjectReference,
        type_name: &str,
        properties: &[&str],
    ) -> Self {
        Self {
            prop_set: vec![PropertySpec {
                type_name: type_name.to_string(),
                all: false,
                path_set: properties.iter().map(|p| p.to_string()).collect(),
            }],
            object_set: vec![ObjectSpec {
                obj: view.clone(),
                skip: true,
                select_set: vec![TraversalSpec {
                    name: "traverseEntities".to_string(),
                    type_name: "ContainerView".to_string(),
                    path: "view".to_string(),
                    skip: false,
                }],
            }],
        }
    }

    /// Build the wire message through the transport's type factory.
    pub fn to_message(&self, transport: &dyn VimTransport) -> VimResult<VimValue> {
        let prop_set = self
            .prop_set
            .iter()
            .map(|p| {
                let mut fields = BTreeMap::new();
                fields.insert("type".to_string(), VimValue::string(&p.type_name));
                fields.insert("all".to_string(), VimValue::Bool(p.all));
                if !p.path_set.is_empty() {
                    fields.insert(
                        "pathSet".to_string(),
                        VimValue::Array(p.path_set.iter().map(|s| VimValue::string(s)).collect()),
                    );
                }
                transport.create("PropertySpec", fields).map(VimValue::Data)
            })
            .collect::<VimResult<Vec<_>>>()?;

        let object_set = self
            .object_set
            .iter()
            .map(|o| {
                let select_set = o
                    .select_set
                    .iter()
                    .map(|t| {
                        let mut fields = BTreeMap::new();
                        fields.insert("name".to_string(), VimValue::string(&t.name));
                        fields.insert("type".to_string(), VimValue::string(&t.type_name));
                        fields.insert("path".to_string(), VimValue::string(&t.path));
                        fields.insert("skip".to_string(), VimValue::Bool(t.skip));
                        transport.create("TraversalSpec", fields).map(VimValue::Data)
                    })
                    .collect::<VimResult<Vec<_>>>()?;

                let mut fields = BTreeMap::new();
                fields.insert("obj".to_string(), VimValue::Reference(o.obj.clone()));
                fields.insert("skip".to_string(), VimValue::Bool(o.skip));
                if !select_set.is_empty() {
                    fields.insert("selectSet".to_string(), VimValue::Array(select_set));
                }
                transport.create("ObjectSpec", fields).map(VimValue::Data)
            })
            .collect::<VimResult<Vec<_>>>()?;

        let mut fields = BTreeMap::new();
        fields.insert("propSet".to_string(), VimValue::Array(prop_set));
        fields.insert("objectSet".to_string(), VimValue::Array(object_set));
        transport.create("PropertyFilterSpec", fields).map(VimValue::Data)
    }

    /// Decode a wire message (server side of the exchange).
    pub fn from_message(value: &VimValue) -> VimResult<Self> {
        let spec = expect_data(value, "PropertyFilterSpec")?;

        let prop_set = list_field(spec, "propSet")
            .iter()
            .map(|v| {
                let p = expect_data(v, "PropertySpec")?;
                Ok(PropertySpec {
                    type_name: string_field(p, "type")?,
                    all: p.field("all").and_then(VimValue::as_bool).unwrap_or(false),
                    path_set: list_field(p, "pathSet")
                        .iter()
                        .filter_map(|s| s.as_str().map(str::to_string))
                        .collect(),
                })
            })
            .collect::<VimResult<Vec<_>>>()?;

        let object_set = list_field(spec, "objectSet")
            .iter()
            .map(|v| {
                let o = expect_data(v, "ObjectSpec")?;
                let select_set = list_field(o, "selectSet")
                    .iter()
                    .map(|t| {
                        let t = expect_data(t, "TraversalSpec")?;
                        Ok(TraversalSpec {
                            name: t.field("name").and_then(VimValue::as_str).unwrap_or_default().to_string(),
                            type_name: string_field(t, "type")?,
                            path: string_field(t, "path")?,
                            skip: t.field("skip").and_then(VimValue::as_bool).unwrap_or(false),
                        })
                    })
                    .collect::<VimResult<Vec<_>>>()?;
                Ok(ObjectSpec {
                    obj: o.require_reference("obj")?.clone(),
                    skip: o.field("skip").and_then(VimValue::as_bool).unwrap_or(false),
                    select_set,
                })
            })
            .collect::<VimResult<Vec<_>>>()?;

        Ok(Self { prop_set, object_set })
    }
}

// ── Responses ───────────────────────────────────────────────────────

/// One retrieved `(name, value)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    pub name: String,
    pub val: VimValue,
}

/// Retrieved properties of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectContent {
    pub obj: ManagedObjectReference,
    #[serde(default)]
    pub prop_set: Vec<DynamicProperty>,
}

impl ObjectContent {
    pub fn new(obj: ManagedObjectReference) -> Self {
        Self { obj, prop_set: Vec::new() }
    }

    pub fn with(mut self, name: impl Into<String>, val: impl Into<VimValue>) -> Self {
        self.prop_set.push(DynamicProperty { name: name.into(), val: val.into() });
        self
    }

    pub fn property(&self, name: &str) -> Option<&VimValue> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }

    pub fn to_value(&self) -> VimValue {
        let props = self
            .prop_set
            .iter()
            .map(|p| {
                VimValue::Data(
                    DataObject::new("DynamicProperty")
                        .with("name", p.name.as_str())
                        .with("val", p.val.clone()),
                )
            })
            .collect();
        VimValue::Data(
            DataObject::new("ObjectContent")
                .with("obj", self.obj.clone())
                .with("propSet", VimValue::Array(props)),
        )
    }

    pub fn from_value(value: &VimValue) -> VimResult<Self> {
        let content = expect_data(value, "ObjectContent")?;
        let prop_set = list_field(content, "propSet")
            .iter()
            .map(|p| {
                let p = expect_data(p, "DynamicProperty")?;
                Ok(DynamicProperty {
                    name: string_field(p, "name")?,
                    val: p.field("val").cloned().unwrap_or_default(),
                })
            })
            .collect::<VimResult<Vec<_>>>()?;
        Ok(Self {
            obj: content.require_reference("obj")?.clone(),
            prop_set,
        })
    }
}

/// Decode a `RetrieveProperties` result. An absent result is an empty list.
pub fn parse_object_contents(value: &VimValue) -> VimResult<Vec<ObjectContent>> {
    match value {
        VimValue::None => Ok(Vec::new()),
        VimValue::Array(items) => items
            .iter()
            .map(|item| match item {
                VimValue::Array(inner) => inner.iter().map(ObjectContent::from_value).collect(),
                other => ObjectContent::from_value(other).map(|c| vec![c]),
            })
            .collect::<VimResult<Vec<Vec<_>>>>()
            .map(|nested| nested.into_iter().flatten().collect()),
        single => ObjectContent::from_value(single).map(|c| vec![c]),
    }
}

// ── Decoding helpers ────────────────────────────────────────────────

fn expect_data<'a>(value: &'a VimValue, type_name: &str) -> VimResult<&'a DataObject> {
    value
        .as_data()
        .ok_or_else(|| VimError::parse(format!("Expected {type_name}, got {value:?}")))
}

fn list_field<'a>(obj: &'a DataObject, name: &str) -> &'a [VimValue] {
    match obj.field(name) {
        Some(VimValue::Array(items)) => items,
        Some(single @ VimValue::Data(_)) => std::slice::from_ref(single),
        _ => &[],
    }
}

fn string_field(obj: &DataObject, name: &str) -> VimResult<String> {
    obj.field(name)
        .and_then(VimValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| VimError::parse(format!("{} is missing string field '{name}'", obj.type_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;

    #[test]
    fn object_filter_requests_all_or_subset() {
        let vm = ManagedObjectReference::new("VirtualMachine", "vm-7");

        let all = PropertyFilterSpec::for_object(&vm, &[], true);
        assert!(all.prop_set[0].all);
        assert!(all.prop_set[0].path_set.is_empty());
        assert_eq!(all.prop_set[0].type_name, "VirtualMachine");
        assert_eq!(all.object_set[0].obj, vm);

        let some = PropertyFilterSpec::for_object(&vm, &["name", "parent"], false);
        assert!(!some.prop_set[0].all);
        assert_eq!(some.prop_set[0].path_set, vec!["name", "parent"]);
    }

    #[test]
    fn message_carries_target_type_and_paths() {
        let transport = SimulatedTransport::new();
        let vm = ManagedObjectReference::new("VirtualMachine", "vm-7");
        let msg = PropertyFilterSpec::for_object(&vm, &["summary"], false)
            .to_message(transport.as_ref())
            .unwrap();

        let spec = msg.as_data().unwrap();
        assert_eq!(spec.type_name, "PropertyFilterSpec");
        let prop = spec.field("propSet").unwrap().as_array().unwrap()[0].as_data().unwrap();
        assert_eq!(prop.type_name, "PropertySpec");
        assert_eq!(prop.field("type"), Some(&VimValue::string("VirtualMachine")));
        assert_eq!(
            prop.field("pathSet"),
            Some(&VimValue::Array(vec![VimValue::string("summary")]))
        );

        assert_eq!(PropertyFilterSpec::from_message(&msg).unwrap().object_set[0].obj, vm);
    }

    #[test]
    fn container_view_spec_traverses_view() {
        let transport = SimulatedTransport::new();
        let view = ManagedObjectReference::new("ContainerView", "session[1]view-1");
        let spec = PropertyFilterSpec::for_container_view(&view, "HostSystem", &["name"]);
        let decoded =
            PropertyFilterSpec::from_message(&spec.to_message(transport.as_ref()).unwrap()).unwrap();
        assert!(decoded.object_set[0].skip);
        assert_eq!(decoded.object_set[0].select_set[0].path, "view");
        assert_eq!(decoded.prop_set[0].type_name, "HostSystem");
    }

    #[test]
    fn parse_contents_accepts_absent_and_wrapped_results() {
        assert!(parse_object_contents(&VimValue::None).unwrap().is_empty());

        let content = ObjectContent::new(ManagedObjectReference::new("Folder", "group-d1"))
            .with("name", "Datacenters");
        let flat = VimValue::Array(vec![content.to_value()]);
        let wrapped = VimValue::Array(vec![VimValue::Array(vec![content.to_value()])]);

        assert_eq!(parse_object_contents(&flat).unwrap(), vec![content.clone()]);
        assert_eq!(parse_object_contents(&wrapped).unwrap(), vec![content.clone()]);
        assert_eq!(
            parse_object_contents(&flat).unwrap()[0].property("name"),
            Some(&VimValue::string("Datacenters"))
        );
    }

    #[test]
    fn malformed_content_is_a_parse_error() {
        let err = parse_object_contents(&VimValue::Array(vec![VimValue::Int(4)])).unwrap_err();
        assert_eq!(err.kind, crate::error::VimErrorKind::ParseError);
    }
}
