//! Aggregate service façade for the VIM crate.
//!
//! `VimService` owns the connected `VimClient` and the shared type registry.
//! Front ends hold `VimServiceState = Arc<Mutex<VimService>>`, which also
//! serializes overlapping refreshes of the same object.

use crate::client::{Attribute, VimClient};
use crate::error::{VimError, VimResult};
use crate::schema::TypeRegistry;
use crate::store::Materialized;
use crate::transport::{Args, VimTransport};
use crate::types::*;

use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe handle.
pub type VimServiceState = Arc<Mutex<VimService>>;

pub struct VimService {
    client: Option<VimClient>,
    config: Option<VimConfig>,
    registry: Arc<TypeRegistry>,
}

impl VimService {
    /// Create a new (disconnected) service backed by the full type catalog.
    pub fn new() -> VimResult<Self> {
        Ok(Self::with_registry(Arc::new(TypeRegistry::with_catalog()?)))
    }

    /// Create a new (disconnected) service with a caller-built registry.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            client: None,
            config: None,
            registry,
        }
    }

    pub fn new_state() -> VimResult<VimServiceState> {
        Ok(Arc::new(Mutex::new(Self::new()?)))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn require_client(&mut self) -> VimResult<&mut VimClient> {
        self.client.as_mut().ok_or_else(VimError::not_connected)
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Connect through `transport`, logging in when credentials are set.
    pub async fn connect(
        &mut self,
        transport: Arc<dyn VimTransport>,
        config: VimConfig,
    ) -> VimResult<ServiceContent> {
        if self.client.is_some() {
            self.disconnect().await?;
        }
        let mut client = VimClient::connect(transport, Arc::clone(&self.registry), config.clone()).await?;
        if config.has_credentials() {
            client.login(&config.username, &config.password).await?;
            debug!("Logged in to {} as {}", config.url, config.username);
        }
        let content = client.service_content().clone();
        self.config = Some(config);
        self.client = Some(client);
        Ok(content)
    }

    pub async fn disconnect(&mut self) -> VimResult<()> {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.logout().await {
                warn!("Logout failed: {e}");
            }
        }
        self.config = None;
        Ok(())
    }

    /// Current config without the password.
    pub fn get_config(&self) -> Option<VimConfigSafe> {
        self.config.as_ref().map(VimConfigSafe::from)
    }

    // ── Pass-through operations ─────────────────────────────────────

    pub async fn refresh(
        &mut self,
        mo_ref: &ManagedObjectReference,
        properties: Option<&[&str]>,
    ) -> VimResult<usize> {
        self.require_client()?.refresh(mo_ref, properties).await
    }

    /// Refresh an object and return its raw properties as JSON.
    pub async fn get_view(
        &mut self,
        mo_ref: &ManagedObjectReference,
        properties: Option<&[&str]>,
    ) -> VimResult<serde_json::Value> {
        self.require_client()?.get_view(mo_ref, properties).await?.snapshot()
    }

    pub async fn property(&mut self, mo_ref: &ManagedObjectReference, name: &str) -> VimResult<Materialized> {
        self.require_client()?.property(mo_ref, name).await
    }

    pub async fn get(&mut self, mo_ref: &ManagedObjectReference, name: &str) -> VimResult<Attribute> {
        self.require_client()?.get(mo_ref, name).await
    }

    pub async fn call(
        &mut self,
        mo_ref: &ManagedObjectReference,
        method: &str,
        args: Args,
    ) -> VimResult<VimValue> {
        self.require_client()?.call(mo_ref, method, args).await
    }

    pub async fn find_by_name(&mut self, type_name: &str, name: &str) -> VimResult<ManagedObjectReference> {
        self.require_client()?.find_by_name(type_name, name).await
    }

    pub async fn find_entity_view(
        &mut self,
        type_name: &str,
        filter: &[(&str, VimValue)],
    ) -> VimResult<ManagedObjectReference> {
        self.require_client()?.find_entity_view(type_name, filter).await
    }

    pub async fn find_datacenter(&mut self, mo_ref: &ManagedObjectReference) -> VimResult<ManagedObjectReference> {
        self.require_client()?.find_datacenter(mo_ref).await
    }

    pub async fn find_datastore(
        &mut self,
        compute: &ManagedObjectReference,
        name: &str,
    ) -> VimResult<ManagedObjectReference> {
        self.require_client()?.find_datastore(compute, name).await
    }

    pub fn invalidate(&mut self, mo_ref: &ManagedObjectReference, name: &str) -> VimResult<bool> {
        Ok(self.require_client()?.invalidate(mo_ref, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VimErrorKind;
    use crate::transport::SimulatedTransport;

    async fn transport() -> Arc<SimulatedTransport> {
        let t = SimulatedTransport::new();
        t.insert_object(
            ManagedObjectReference::new("VirtualMachine", "vm-5"),
            vec![("name", "build01".into()), ("guestHeartbeatStatus", "green".into())],
        )
        .await;
        t
    }

    #[tokio::test]
    async fn operations_require_connection() {
        let mut svc = VimService::new().unwrap();
        assert!(!svc.is_connected());
        assert!(svc.get_config().is_none());

        let err = svc.find_by_name("VirtualMachine", "build01").await.unwrap_err();
        assert_eq!(err.kind, VimErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn connect_logs_in_with_credentials() {
        let t = transport().await;
        let mut svc = VimService::new().unwrap();
        let config = VimConfig::from_json(
            r#"{"url":"https://vc.lab/sdk","username":"root","password":"pw","autoPopulate":false}"#,
        )
        .unwrap();

        let content = svc.connect(t.clone(), config).await.unwrap();
        assert_eq!(content.root_folder.value, "group-d1");
        assert_eq!(t.call_count("Login").await, 1);

        let safe = svc.get_config().unwrap();
        assert_eq!(safe.username, "root");
        assert!(!safe.auto_populate);
        assert_eq!(safe.root_type, "Datacenter");

        svc.disconnect().await.unwrap();
        assert!(!svc.is_connected());
        assert_eq!(t.call_count("Logout").await, 1);
    }

    #[tokio::test]
    async fn anonymous_connect_skips_login() {
        let t = transport().await;
        let mut svc = VimService::new().unwrap();
        svc.connect(t.clone(), VimConfig::default()).await.unwrap();
        assert_eq!(t.call_count("Login").await, 0);

        let vm = svc.find_by_name("VirtualMachine", "build01").await.unwrap();
        let view = svc.get_view(&vm, Some(&["guestHeartbeatStatus"])).await.unwrap();
        assert_eq!(view["properties"]["guestHeartbeatStatus"]["value"], "green");
    }

    #[tokio::test]
    async fn shared_state_serializes_access() {
        let t = transport().await;
        let state = VimService::new_state().unwrap();
        state.lock().await.connect(t.clone(), VimConfig::default()).await.unwrap();

        let vm = ManagedObjectReference::new("VirtualMachine", "vm-5");
        let mut handles = Vec::new();
        for _ in 0..4 {
            let state = Arc::clone(&state);
            let vm = vm.clone();
            handles.push(tokio::spawn(async move {
                state.lock().await.property(&vm, "name").await
            }));
        }
        for h in handles {
            assert_eq!(
                h.await.unwrap().unwrap(),
                Materialized::Value(VimValue::string("build01"))
            );
        }
    }
}
