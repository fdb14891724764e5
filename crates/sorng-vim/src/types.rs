//! Shared types for the VIM managed-object model.

use crate::error::{VimError, VimResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Managed object reference
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity of a remote managed object (e.g. `HostSystem:host-12`).
///
/// Two references with equal `(mo_type, value)` denote the same remote
/// object. References are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedObjectReference {
    /// Remote class name
    #[serde(rename = "type")]
    pub mo_type: String,
    /// Opaque identifier, unique within the remote system
    pub value: String,
}

impl ManagedObjectReference {
    pub fn new(mo_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            mo_type: mo_type.into(),
            value: value.into(),
        }
    }

    /// The well-known root of every VIM inventory.
    pub fn service_instance() -> Self {
        Self::new("ServiceInstance", "ServiceInstance")
    }
}

impl fmt::Display for ManagedObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mo_type, self.value)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Values
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A property or argument value as carried on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum VimValue {
    /// Unset / absent
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Reference(ManagedObjectReference),
    Array(Vec<VimValue>),
    /// A structured data object (e.g. `VirtualMachineSummary`)
    Data(DataObject),
}

impl VimValue {
    pub fn empty_array() -> Self {
        Self::Array(Vec::new())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn reference(mo_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Reference(ManagedObjectReference::new(mo_type, value))
    }

    pub fn references<'a, I>(refs: I) -> Self
    where
        I: IntoIterator<Item = &'a ManagedObjectReference>,
    {
        Self::Array(refs.into_iter().cloned().map(Self::Reference).collect())
    }

    /// Whether this value is the "nothing here" marker a response may carry.
    ///
    /// Absent values, empty strings, empty arrays and data objects without
    /// fields all count; numbers, booleans and timestamps never do.
    pub fn is_empty_marker(&self) -> bool {
        match self {
            Self::None => true,
            Self::String(s) => s.is_empty(),
            Self::Array(items) => items.is_empty(),
            Self::Data(obj) => obj.fields.is_empty(),
            _ => false,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ManagedObjectReference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[VimValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataObject> {
        match self {
            Self::Data(obj) => Some(obj),
            _ => None,
        }
    }

    /// Strip the one-element array-of-array envelope some encoders put
    /// around list-valued properties (`[[a, b, c]]` → `[a, b, c]`).
    pub fn unwrap_array_envelope(self) -> Self {
        match self {
            Self::Array(mut outer) if outer.len() == 1 && matches!(outer[0], Self::Array(_)) => {
                outer.remove(0)
            }
            other => other,
        }
    }
}

impl From<&str> for VimValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for VimValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for VimValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for VimValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<ManagedObjectReference> for VimValue {
    fn from(r: ManagedObjectReference) -> Self {
        Self::Reference(r)
    }
}

impl From<DataObject> for VimValue {
    fn from(obj: DataObject) -> Self {
        Self::Data(obj)
    }
}

/// A typed structure of named fields (`PropertySpec`, `HostListSummary`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, VimValue>,
}

impl DataObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<VimValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<VimValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&VimValue> {
        self.fields.get(name)
    }

    /// Field that must be present and hold a reference.
    pub fn require_reference(&self, name: &str) -> VimResult<&ManagedObjectReference> {
        self.field(name)
            .and_then(VimValue::as_reference)
            .ok_or_else(|| {
                VimError::parse(format!(
                    "{} is missing managed object reference field '{name}'",
                    self.type_name
                ))
            })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Service content
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The singleton managers published by `RetrieveServiceContent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceContent {
    pub root_folder: ManagedObjectReference,
    pub property_collector: ManagedObjectReference,
    pub view_manager: ManagedObjectReference,
    #[serde(default)]
    pub session_manager: Option<ManagedObjectReference>,
    #[serde(default)]
    pub search_index: Option<ManagedObjectReference>,
}

impl ServiceContent {
    pub fn from_value(value: &VimValue) -> VimResult<Self> {
        let obj = value
            .as_data()
            .ok_or_else(|| VimError::parse("RetrieveServiceContent did not return a data object"))?;
        Ok(Self {
            root_folder: obj.require_reference("rootFolder")?.clone(),
            property_collector: obj.require_reference("propertyCollector")?.clone(),
            view_manager: obj.require_reference("viewManager")?.clone(),
            session_manager: obj.field("sessionManager").and_then(VimValue::as_reference).cloned(),
            search_index: obj.field("searchIndex").and_then(VimValue::as_reference).cloned(),
        })
    }

    pub fn to_value(&self) -> VimValue {
        let mut obj = DataObject::new("ServiceContent")
            .with("rootFolder", self.root_folder.clone())
            .with("propertyCollector", self.property_collector.clone())
            .with("viewManager", self.view_manager.clone());
        if let Some(ref sm) = self.session_manager {
            obj.set("sessionManager", sm.clone());
        }
        if let Some(ref si) = self.search_index {
            obj.set("searchIndex", si.clone());
        }
        VimValue::Data(obj)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VimConfig {
    /// SDK endpoint (e.g. "https://vcenter.lab.local/sdk"); informational,
    /// the transport owns the actual connection
    #[serde(default)]
    pub url: String,
    /// Username for `Login`; no login is attempted when empty
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Refresh every property of an object as soon as it is built
    #[serde(default = "default_auto_populate")]
    pub auto_populate: bool,
    /// Type that terminates `find_datacenter` parent walks
    #[serde(default = "default_root_type")]
    pub root_type: String,
}

fn default_auto_populate() -> bool { true }
fn default_root_type() -> String { "Datacenter".to_string() }

impl Default for VimConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            auto_populate: true,
            root_type: default_root_type(),
        }
    }
}

impl VimConfig {
    pub fn from_json(json: &str) -> VimResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Config without the password, safe to send to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VimConfigSafe {
    pub url: String,
    pub username: String,
    pub auto_populate: bool,
    pub root_type: String,
}

impl From<&VimConfig> for VimConfigSafe {
    fn from(c: &VimConfig) -> Self {
        Self {
            url: c.url.clone(),
            username: c.username.clone(),
            auto_populate: c.auto_populate,
            root_type: c.root_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_compare_by_type_and_value() {
        let a = ManagedObjectReference::new("HostSystem", "host-1");
        let b = ManagedObjectReference::new("HostSystem", "host-1");
        let c = ManagedObjectReference::new("Datastore", "host-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "HostSystem:host-1");
    }

    #[test]
    fn reference_serializes_with_type_tag() {
        let r = ManagedObjectReference::new("Folder", "group-d1");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Folder", "value": "group-d1"}));
    }

    #[test]
    fn empty_markers() {
        assert!(VimValue::None.is_empty_marker());
        assert!(VimValue::string("").is_empty_marker());
        assert!(VimValue::empty_array().is_empty_marker());
        assert!(VimValue::Data(DataObject::new("Summary")).is_empty_marker());
        assert!(!VimValue::Int(0).is_empty_marker());
        assert!(!VimValue::Bool(false).is_empty_marker());
        assert!(!VimValue::string("x").is_empty_marker());
    }

    #[test]
    fn unwraps_only_single_nested_arrays() {
        let wrapped = VimValue::Array(vec![VimValue::Array(vec![
            VimValue::Int(1),
            VimValue::Int(2),
        ])]);
        assert_eq!(
            wrapped.unwrap_array_envelope(),
            VimValue::Array(vec![VimValue::Int(1), VimValue::Int(2)])
        );

        let plain = VimValue::Array(vec![VimValue::Int(1)]);
        assert_eq!(plain.clone().unwrap_array_envelope(), plain);

        let two = VimValue::Array(vec![VimValue::empty_array(), VimValue::empty_array()]);
        assert_eq!(two.clone().unwrap_array_envelope(), two);
    }

    #[test]
    fn service_content_requires_core_managers() {
        let content = ServiceContent {
            root_folder: ManagedObjectReference::new("Folder", "group-d1"),
            property_collector: ManagedObjectReference::new("PropertyCollector", "propertyCollector"),
            view_manager: ManagedObjectReference::new("ViewManager", "ViewManager"),
            session_manager: None,
            search_index: None,
        };
        assert_eq!(ServiceContent::from_value(&content.to_value()).unwrap(), content);

        let partial = VimValue::Data(
            DataObject::new("ServiceContent")
                .with("rootFolder", ManagedObjectReference::new("Folder", "group-d1")),
        );
        let err = ServiceContent::from_value(&partial).unwrap_err();
        assert_eq!(err.kind, crate::error::VimErrorKind::ParseError);
    }

    #[test]
    fn config_defaults_from_json() {
        let cfg = VimConfig::from_json(r#"{"url": "https://vc/sdk", "username": "root"}"#).unwrap();
        assert!(cfg.auto_populate);
        assert_eq!(cfg.root_type, "Datacenter");
        assert!(cfg.has_credentials());

        let safe = VimConfigSafe::from(&cfg);
        assert_eq!(safe.username, "root");
    }
}
