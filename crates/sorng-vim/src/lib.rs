//! # SortOfRemote NG – vSphere VIM Managed Objects
//!
//! Client-side object model for the vSphere VIM (SOAP) API: declarative
//! per-type property schemas, lazily materialized properties, reference
//! resolution through a central entity table, and remote method proxying.
//!
//! ## Modules
//!
//! - **types** — References, property values, service content, config
//! - **error** — Crate-specific error types
//! - **schema** — Property declarations and the type registry / factory
//! - **catalog** — The managed-object type catalog
//! - **store** — Per-object property slots and their resolution state
//! - **object** — A managed object: reference + merged schema + store
//! - **view** — `RetrieveProperties` request / response messages
//! - **transport** — RPC transport trait + in-memory simulated endpoint
//! - **client** — Entity table, view refresh, property access, lookups
//! - **service** — Aggregate facade + shared state alias

pub mod types;
pub mod error;
pub mod schema;
pub mod catalog;
pub mod store;
pub mod object;
pub mod view;
pub mod transport;
pub mod client;
pub mod service;
