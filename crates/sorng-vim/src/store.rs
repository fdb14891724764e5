//! Per-object property store.
//!
//! One [`PropertySlot`] per merged-schema property. A slot keeps the raw
//! value last received from the server next to a [`SlotState`]:
//!
//! ```text
//!   Unset ──overwrite──▶ RawPending ──resolve──▶ Resolved(value)
//!                             ▲                        │
//!                             └──────invalidate────────┘
//! ```
//!
//! `overwrite` on a `Resolved` slot replaces the raw value but keeps the
//! materialized one; only `invalidate` drops it.

use crate::schema::{PropertyDef, Schema};
use crate::types::{ManagedObjectReference, VimValue};

use serde::Serialize;
use std::collections::BTreeMap;

/// A property value after materialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Materialized {
    /// Plain data (or an unset reference property)
    Value(VimValue),
    /// A single resolved managed object, addressed by its key
    Object(ManagedObjectReference),
    /// Resolved managed objects, in the server's order
    Objects(Vec<ManagedObjectReference>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    /// Holds the schema default; nothing received yet
    Unset,
    /// Raw value received, not materialized yet
    RawPending,
    Resolved(Materialized),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySlot {
    raw: VimValue,
    reference: bool,
    state: SlotState,
}

impl PropertySlot {
    fn seeded(def: &PropertyDef) -> Self {
        Self {
            raw: def.default.to_value(),
            reference: def.reference,
            state: SlotState::Unset,
        }
    }

    pub fn raw(&self) -> &VimValue {
        &self.raw
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn is_reference(&self) -> bool {
        self.reference
    }

    /// Data properties never need resolution work; reference properties
    /// are resolved once materialized.
    pub fn is_resolved(&self) -> bool {
        !self.reference || matches!(self.state, SlotState::Resolved(_))
    }

    pub fn cached(&self) -> Option<&Materialized> {
        match &self.state {
            SlotState::Resolved(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn overwrite(&mut self, raw: VimValue) {
        self.raw = raw;
        if !matches!(self.state, SlotState::Resolved(_)) {
            self.state = SlotState::RawPending;
        }
    }

    pub(crate) fn resolve(&mut self, value: Materialized) {
        self.state = SlotState::Resolved(value);
    }

    pub(crate) fn invalidate(&mut self) -> bool {
        if matches!(self.state, SlotState::Resolved(_)) {
            self.state = SlotState::RawPending;
            true
        } else {
            false
        }
    }
}

/// All slots of one object, keyed by property name.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    slots: BTreeMap<String, PropertySlot>,
}

impl PropertyStore {
    /// Seed one slot per merged-schema entry with its default.
    pub fn seed(schema: &Schema) -> Self {
        let slots = schema
            .iter()
            .map(|def| (def.name.to_string(), PropertySlot::seeded(def)))
            .collect();
        Self { slots }
    }

    pub fn get(&self, name: &str) -> Option<&PropertySlot> {
        self.slots.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut PropertySlot> {
        self.slots.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertySlot)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace the raw value of a known property. Unknown names are
    /// refused and the store is left untouched.
    pub(crate) fn overwrite(&mut self, name: &str, raw: VimValue) -> bool {
        match self.slots.get_mut(name) {
            Some(slot) => {
                slot.overwrite(raw);
                true
            }
            None => false,
        }
    }

    pub(crate) fn invalidate_all(&mut self) -> usize {
        self.slots.values_mut().map(PropertySlot::invalidate).filter(|dropped| *dropped).count()
    }

    /// Raw values keyed by name.
    pub fn raw_values(&self) -> BTreeMap<&str, &VimValue> {
        self.slots.iter().map(|(k, v)| (k.as_str(), &v.raw)).collect()
    }
}
