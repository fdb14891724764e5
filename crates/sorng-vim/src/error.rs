//! Error types for the VIM managed-object crate.

use crate::types::VimValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A protocol-level fault returned by the remote side.
///
/// Carries the fault's type tag (e.g. `"InvalidLogin"`) and the field
/// values of the fault detail so callers can inspect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VimFault {
    pub fault_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, VimValue>,
}

impl VimFault {
    pub fn new(fault_type: impl Into<String>) -> Self {
        Self {
            fault_type: fault_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: VimValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&VimValue> {
        self.fields.get(name)
    }
}

impl fmt::Display for VimFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fault_type)?;
        if !self.fields.is_empty() {
            let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
            write!(f, " ({})", names.join(", "))?;
        }
        Ok(())
    }
}

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum VimErrorKind {
    /// A named lookup or parent-chain walk matched nothing
    ObjectNotFound,
    /// A reference names a type with no registered local representation
    UnknownType,
    /// Name matched neither the schema, a remote operation, nor a declared field
    AttributeNotFound,
    /// The remote side returned a fault
    RemoteFault(VimFault),
    /// The call could not complete (connectivity, name resolution, transport)
    TransportFailure,
    /// Registry misuse (unknown parent type, duplicate registration)
    InvalidSchema,
    /// A message or value did not have the expected shape
    ParseError,
    /// Service façade used before `connect`
    NotConnected,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{kind:?}] {message}")]
pub struct VimError {
    pub kind: VimErrorKind,
    pub message: String,
}

impl VimError {
    pub fn new(kind: VimErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VimErrorKind::ObjectNotFound, msg)
    }

    pub fn unknown_type(type_name: &str) -> Self {
        Self::new(
            VimErrorKind::UnknownType,
            format!("No managed object type registered for '{type_name}'"),
        )
    }

    pub fn attribute_not_found(type_name: &str, name: &str) -> Self {
        Self::new(
            VimErrorKind::AttributeNotFound,
            format!("'{type_name}' has no property, method or field named '{name}'"),
        )
    }

    pub fn fault(fault: VimFault) -> Self {
        let message = format!("Remote fault: {fault}");
        Self::new(VimErrorKind::RemoteFault(fault), message)
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(VimErrorKind::TransportFailure, msg)
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::new(VimErrorKind::InvalidSchema, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(VimErrorKind::ParseError, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(
            VimErrorKind::NotConnected,
            "Not connected to a VIM endpoint. Call connect first.",
        )
    }

    /// The remote fault carried by this error, if any.
    pub fn remote_fault(&self) -> Option<&VimFault> {
        match &self.kind {
            VimErrorKind::RemoteFault(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == VimErrorKind::ObjectNotFound
    }
}

impl From<VimError> for String {
    fn from(e: VimError) -> String {
        e.to_string()
    }
}

impl From<serde_json::Error> for VimError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VimResult<T> = Result<T, VimError>;
