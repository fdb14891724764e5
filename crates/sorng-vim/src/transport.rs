//! RPC transport abstraction.
//!
//! The object model never speaks SOAP itself. Everything it needs from the
//! wire goes through [`VimTransport`]: invoke an operation against a target
//! reference, build a typed request message, and ask whether an operation
//! exists in the service description.

use crate::error::{VimError, VimFault, VimResult};
use crate::types::{DataObject, ManagedObjectReference, ServiceContent, VimValue};
use crate::view::{ObjectContent, PropertyFilterSpec};

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Keyword arguments of a remote call.
pub type Args = BTreeMap<String, VimValue>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request/response access to a VIM endpoint.
///
/// Implementations must be `Send + Sync` so they can be shared behind an
/// `Arc` by the client and every method handle it hands out.
#[async_trait::async_trait]
pub trait VimTransport: Send + Sync {
    /// Invoke `method` with `this` as the target object.
    ///
    /// Remote faults come back as `VimErrorKind::RemoteFault`, connection
    /// problems as `VimErrorKind::TransportFailure`.
    async fn invoke(
        &self,
        method: &str,
        this: &ManagedObjectReference,
        args: Args,
    ) -> VimResult<VimValue>;

    /// Whether the service description exposes an operation called `name`.
    async fn has_operation(&self, name: &str) -> bool;

    /// Build a request message of `type_name`.
    fn create(&self, type_name: &str, fields: Args) -> VimResult<DataObject> {
        Ok(DataObject { type_name: type_name.to_string(), fields })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Simulated transport (for testing & offline use)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const BUILTIN_OPERATIONS: &[&str] = &[
    "RetrieveServiceContent",
    "RetrieveProperties",
    "CreateContainerView",
    "DestroyView",
    "Login",
    "Logout",
];

/// One recorded `invoke`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub this: ManagedObjectReference,
    pub args: Args,
}

/// A fully in-memory VIM endpoint useful for unit tests and demos.
///
/// Holds an inventory of objects and their properties, answers the
/// property-collector and view-manager operations the client relies on,
/// and returns canned results for any other registered operation.
pub struct SimulatedTransport {
    content: ServiceContent,
    objects: Mutex<HashMap<ManagedObjectReference, BTreeMap<String, VimValue>>>,
    views: Mutex<HashMap<ManagedObjectReference, Vec<ManagedObjectReference>>>,
    operations: Mutex<HashMap<String, VimValue>>,
    faults: Mutex<HashMap<String, VimFault>>,
    calls: Mutex<Vec<RecordedCall>>,
    offline: AtomicBool,
    wrap_arrays: AtomicBool,
    next_view: AtomicU64,
}

impl SimulatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            content: ServiceContent {
                root_folder: ManagedObjectReference::new("Folder", "group-d1"),
                property_collector: ManagedObjectReference::new("PropertyCollector", "propertyCollector"),
                view_manager: ManagedObjectReference::new("ViewManager", "ViewManager"),
                session_manager: Some(ManagedObjectReference::new("SessionManager", "SessionManager")),
                search_index: Some(ManagedObjectReference::new("SearchIndex", "SearchIndex")),
            },
            objects: Mutex::new(HashMap::new()),
            views: Mutex::new(HashMap::new()),
            operations: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            wrap_arrays: AtomicBool::new(false),
            next_view: AtomicU64::new(1),
        })
    }

    pub fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    /// Add (or replace) an object and its server-side properties.
    pub async fn insert_object(&self, mo_ref: ManagedObjectReference, props: Vec<(&str, VimValue)>) {
        let props = props.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.objects.lock().await.insert(mo_ref, props);
    }

    /// Change one server-side property.
    pub async fn set_property(&self, mo_ref: &ManagedObjectReference, name: &str, value: VimValue) {
        let mut objects = self.objects.lock().await;
        objects
            .entry(mo_ref.clone())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Remove one server-side property.
    pub async fn remove_property(&self, mo_ref: &ManagedObjectReference, name: &str) {
        if let Some(props) = self.objects.lock().await.get_mut(mo_ref) {
            props.remove(name);
        }
    }

    /// Expose an extra operation that always returns `result`.
    pub async fn register_operation(&self, name: &str, result: VimValue) {
        self.operations.lock().await.insert(name.to_string(), result);
    }

    /// Make every call of `method` fail with `fault`.
    pub async fn inject_fault(&self, method: &str, fault: VimFault) {
        self.faults.lock().await.insert(method.to_string(), fault);
    }

    /// Simulate a dropped connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Deliver list values inside a one-element array envelope.
    pub fn set_wrap_arrays(&self, enabled: bool) {
        self.wrap_arrays.store(enabled, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, method: &str) -> usize {
        self.calls.lock().await.iter().filter(|c| c.method == method).count()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    // ── Built-in operations ─────────────────────────────────────────

    async fn retrieve_properties(&self, args: &Args) -> VimResult<VimValue> {
        let spec_value = args
            .get("specSet")
            .ok_or_else(|| VimError::parse("RetrieveProperties requires 'specSet'"))?;
        let specs: Vec<PropertyFilterSpec> = match spec_value {
            VimValue::Array(items) => items
                .iter()
                .map(PropertyFilterSpec::from_message)
                .collect::<VimResult<_>>()?,
            single => vec![PropertyFilterSpec::from_message(single)?],
        };

        let objects = self.objects.lock().await;
        let views = self.views.lock().await;
        let wrap = self.wrap_arrays.load(Ordering::SeqCst);

        let mut results = Vec::new();
        for spec in &specs {
            let mut targets = Vec::new();
            for obj_spec in &spec.object_set {
                if !obj_spec.skip {
                    targets.push(obj_spec.obj.clone());
                }
                let follows_view = obj_spec.select_set.iter().any(|t| t.path == "view");
                if follows_view {
                    if let Some(members) = views.get(&obj_spec.obj) {
                        targets.extend(members.iter().cloned());
                    }
                }
            }

            for target in targets {
                let Some(props) = objects.get(&target) else {
                    continue;
                };
                for prop_spec in spec.prop_set.iter().filter(|p| p.type_name == target.mo_type) {
                    let mut content = ObjectContent::new(target.clone());
                    for (name, value) in props {
                        if prop_spec.all || prop_spec.path_set.iter().any(|p| p == name) {
                            let value = match value {
                                VimValue::Array(_) if wrap => VimValue::Array(vec![value.clone()]),
                                _ => value.clone(),
                            };
                            content = content.with(name.as_str(), value);
                        }
                    }
                    results.push(content.to_value());
                }
            }
        }
        Ok(VimValue::Array(results))
    }

    async fn create_container_view(&self, args: &Args) -> VimResult<VimValue> {
        let types: HashSet<&str> = args
            .get("type")
            .and_then(VimValue::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(VimValue::as_str)
            .collect();

        let mut members: Vec<ManagedObjectReference> = self
            .objects
            .lock()
            .await
            .keys()
            .filter(|r| types.is_empty() || types.contains(r.mo_type.as_str()))
            .cloned()
            .collect();
        members.sort();

        let id = self.next_view.fetch_add(1, Ordering::SeqCst);
        let view = ManagedObjectReference::new("ContainerView", format!("session[sim]view-{id}"));
        self.views.lock().await.insert(view.clone(), members);
        Ok(VimValue::Reference(view))
    }
}

#[async_trait::async_trait]
impl VimTransport for SimulatedTransport {
    async fn invoke(
        &self,
        method: &str,
        this: &ManagedObjectReference,
        args: Args,
    ) -> VimResult<VimValue> {
        self.calls.lock().await.push(RecordedCall {
            method: method.to_string(),
            this: this.clone(),
            args: args.clone(),
        });

        if self.offline.load(Ordering::SeqCst) {
            return Err(VimError::transport(format!(
                "Connection refused while invoking '{method}'"
            )));
        }
        if let Some(fault) = self.faults.lock().await.get(method).cloned() {
            return Err(VimError::fault(fault));
        }

        debug!("Simulated invoke {method} on {this}");
        match method {
            "RetrieveServiceContent" => Ok(self.content.to_value()),
            "RetrieveProperties" => self.retrieve_properties(&args).await,
            "CreateContainerView" => self.create_container_view(&args).await,
            "DestroyView" => {
                self.views.lock().await.remove(this);
                Ok(VimValue::None)
            }
            "Login" => {
                let user = args.get("userName").cloned().unwrap_or_default();
                Ok(VimValue::Data(DataObject::new("UserSession").with("userName", user)))
            }
            "Logout" => Ok(VimValue::None),
            other => self
                .operations
                .lock()
                .await
                .get(other)
                .cloned()
                .ok_or_else(|| VimError::transport(format!("Unknown method: {other}"))),
        }
    }

    async fn has_operation(&self, name: &str) -> bool {
        BUILTIN_OPERATIONS.contains(&name) || self.operations.lock().await.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_service_content() {
        let t = SimulatedTransport::new();
        let value = t
            .invoke("RetrieveServiceContent", &ManagedObjectReference::service_instance(), Args::new())
            .await
            .unwrap();
        assert_eq!(ServiceContent::from_value(&value).unwrap(), *t.service_content());
    }

    #[tokio::test]
    async fn registered_operations_are_discoverable() {
        let t = SimulatedTransport::new();
        assert!(t.has_operation("RetrieveProperties").await);
        assert!(!t.has_operation("PowerOnVM_Task").await);

        t.register_operation("PowerOnVM_Task", VimValue::reference("Task", "task-1")).await;
        assert!(t.has_operation("PowerOnVM_Task").await);
    }

    #[tokio::test]
    async fn faults_and_outages_are_reported() {
        let t = SimulatedTransport::new();
        let this = ManagedObjectReference::new("VirtualMachine", "vm-1");

        t.inject_fault("Destroy_Task", VimFault::new("InvalidState")).await;
        let err = t.invoke("Destroy_Task", &this, Args::new()).await.unwrap_err();
        assert_eq!(err.remote_fault().unwrap().fault_type, "InvalidState");

        t.set_offline(true);
        let err = t.invoke("RetrieveServiceContent", &this, Args::new()).await.unwrap_err();
        assert_eq!(err.kind, crate::error::VimErrorKind::TransportFailure);
        assert_eq!(t.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_methods_fail() {
        let t = SimulatedTransport::new();
        let this = ManagedObjectReference::new("VirtualMachine", "vm-1");
        assert!(t.invoke("Frobnicate", &this, Args::new()).await.is_err());
    }
}
