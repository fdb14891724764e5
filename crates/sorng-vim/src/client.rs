//! Connected VIM client: entity table, view refresh, lazy property
//! resolution and remote method proxying.
//!
//! Every managed object the client has seen lives in one table keyed by its
//! [`ManagedObjectReference`]. Materialized reference properties store keys
//! into that table, never the child objects themselves, so cyclic graphs
//! (entity → parent → childEntity → entity) need no shared ownership.

use crate::error::{VimError, VimResult};
use crate::object::{ManagedObject, Resolution};
use crate::schema::TypeRegistry;
use crate::store::Materialized;
use crate::transport::{Args, VimTransport};
use crate::types::{DataObject, ManagedObjectReference, ServiceContent, VimConfig, VimValue};
use crate::view::{parse_object_contents, ObjectContent, PropertyFilterSpec};

use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Properties refreshed on every link of a parent-chain walk.
const CHAIN_PROPERTIES: &[&str] = &["name", "parent"];

/// Fields every managed object exposes besides its schema.
const DECLARED_FIELDS: &[&str] = &["mo_ref"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Attribute lookup results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A remote operation bound to one managed object.
#[derive(Clone)]
pub struct RemoteMethod {
    name: String,
    this: ManagedObjectReference,
    transport: Arc<dyn VimTransport>,
}

impl RemoteMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The object the operation is invoked on.
    pub fn this(&self) -> &ManagedObjectReference {
        &self.this
    }

    /// Invoke the operation. The bound reference is sent as the implicit
    /// target; the result (or fault) is returned unchanged.
    pub async fn call(&self, args: Args) -> VimResult<VimValue> {
        debug!("Invoking {} on {}", self.name, self.this);
        self.transport.invoke(&self.name, &self.this, args).await
    }
}

impl fmt::Debug for RemoteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMethod")
            .field("name", &self.name)
            .field("this", &self.this)
            .finish()
    }
}

/// What [`VimClient::get`] found under a name.
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(VimValue),
    Object(ManagedObjectReference),
    Objects(Vec<ManagedObjectReference>),
    Method(RemoteMethod),
}

impl Attribute {
    pub fn as_value(&self) -> Option<&VimValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ManagedObjectReference> {
        match self {
            Self::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_objects(&self) -> Option<&[ManagedObjectReference]> {
        match self {
            Self::Objects(refs) => Some(refs),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&RemoteMethod> {
        match self {
            Self::Method(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Materialized> for Attribute {
    fn from(m: Materialized) -> Self {
        match m {
            Materialized::Value(v) => Self::Value(v),
            Materialized::Object(r) => Self::Object(r),
            Materialized::Objects(refs) => Self::Objects(refs),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct VimClient {
    transport: Arc<dyn VimTransport>,
    registry: Arc<TypeRegistry>,
    content: ServiceContent,
    config: VimConfig,
    entities: HashMap<ManagedObjectReference, ManagedObject>,
    session: Option<DataObject>,
}

impl VimClient {
    /// Bootstrap against an endpoint by fetching its service content.
    pub async fn connect(
        transport: Arc<dyn VimTransport>,
        registry: Arc<TypeRegistry>,
        config: VimConfig,
    ) -> VimResult<Self> {
        let instance = ManagedObjectReference::service_instance();
        debug!("Retrieving service content from {}", config.url);
        let value = transport
            .invoke("RetrieveServiceContent", &instance, Args::new())
            .await?;
        let content = ServiceContent::from_value(&value)?;
        debug!(
            "Connected: root folder {}, property collector {}",
            content.root_folder, content.property_collector
        );

        Ok(Self {
            transport,
            registry,
            content,
            config,
            entities: HashMap::new(),
            session: None,
        })
    }

    pub fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    pub fn config(&self) -> &VimConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn VimTransport> {
        &self.transport
    }

    /// The `UserSession` returned by the last successful login.
    pub fn session(&self) -> Option<&DataObject> {
        self.session.as_ref()
    }

    // ── Session ─────────────────────────────────────────────────────

    pub async fn login(&mut self, username: &str, password: &str) -> VimResult<DataObject> {
        let session_manager = self.require_session_manager()?;
        let mut args = Args::new();
        args.insert("userName".to_string(), VimValue::string(username));
        args.insert("password".to_string(), VimValue::string(password));

        let result = self.invoke("Login", &session_manager, args).await?;
        let session = result
            .as_data()
            .cloned()
            .ok_or_else(|| VimError::parse(format!("Login returned {result:?}")))?;
        self.session = Some(session.clone());
        Ok(session)
    }

    pub async fn logout(&mut self) -> VimResult<()> {
        if self.session.take().is_some() {
            let session_manager = self.require_session_manager()?;
            self.invoke("Logout", &session_manager, Args::new()).await?;
        }
        Ok(())
    }

    fn require_session_manager(&self) -> VimResult<ManagedObjectReference> {
        self.content
            .session_manager
            .clone()
            .ok_or_else(|| VimError::not_found("Service content has no session manager"))
    }

    // ── Raw RPC ─────────────────────────────────────────────────────

    /// Invoke `method` on `this` without any local bookkeeping.
    pub async fn invoke(
        &self,
        method: &str,
        this: &ManagedObjectReference,
        args: Args,
    ) -> VimResult<VimValue> {
        debug!("Invoking {method} on {this}");
        self.transport.invoke(method, this, args).await
    }

    async fn retrieve(&self, spec: &PropertyFilterSpec) -> VimResult<Vec<ObjectContent>> {
        let message = spec.to_message(self.transport.as_ref())?;
        let mut args = Args::new();
        args.insert("specSet".to_string(), VimValue::Array(vec![message]));
        let result = self
            .invoke("RetrieveProperties", &self.content.property_collector, args)
            .await?;
        parse_object_contents(&result)
    }

    // ── Entity table ────────────────────────────────────────────────

    pub fn entity(&self, mo_ref: &ManagedObjectReference) -> Option<&ManagedObject> {
        self.entities.get(mo_ref)
    }

    pub fn entities(&self) -> impl Iterator<Item = &ManagedObject> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drop an object from the table. References to it held by other
    /// objects stay valid keys; the next access rebuilds it.
    pub fn forget(&mut self, mo_ref: &ManagedObjectReference) -> Option<ManagedObject> {
        self.entities.remove(mo_ref)
    }

    fn require_entity(&self, mo_ref: &ManagedObjectReference) -> VimResult<&ManagedObject> {
        self.entities
            .get(mo_ref)
            .ok_or_else(|| VimError::not_found(format!("{mo_ref} is not in the entity table")))
    }

    fn require_entity_mut(&mut self, mo_ref: &ManagedObjectReference) -> VimResult<&mut ManagedObject> {
        self.entities
            .get_mut(mo_ref)
            .ok_or_else(|| VimError::not_found(format!("{mo_ref} is not in the entity table")))
    }

    /// Build `mo_ref` into the table if it is not there yet. Never refreshes.
    fn insert_built(&mut self, mo_ref: &ManagedObjectReference) -> VimResult<bool> {
        if self.entities.contains_key(mo_ref) {
            return Ok(false);
        }
        let obj = self.registry.build(mo_ref)?;
        self.entities.insert(mo_ref.clone(), obj);
        Ok(true)
    }

    /// Build every reference missing from the table and, under
    /// auto-population, fully refresh the new ones. Nothing is kept in the
    /// table unless every type is known and every refresh succeeded.
    async fn adopt_many(&mut self, refs: &[ManagedObjectReference]) -> VimResult<()> {
        let mut seen = HashSet::new();
        let fresh: Vec<ManagedObjectReference> = refs
            .iter()
            .filter(|r| !self.entities.contains_key(*r) && seen.insert(*r))
            .cloned()
            .collect();
        let built = self.registry.build_many(&fresh)?;
        for obj in built {
            self.entities.insert(obj.mo_ref().clone(), obj);
        }
        if self.config.auto_populate {
            for r in &fresh {
                if let Err(e) = self.refresh(r, None).await {
                    // Drop the whole batch so the next read rebuilds and
                    // repopulates it.
                    for built in &fresh {
                        self.entities.remove(built);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn adopt(&mut self, mo_ref: &ManagedObjectReference) -> VimResult<()> {
        self.adopt_many(std::slice::from_ref(mo_ref)).await
    }

    // ── View refresh ────────────────────────────────────────────────

    /// Fetch properties of `mo_ref` from the server and apply them.
    ///
    /// `None` asks for every property when auto-population is enabled.
    /// Returns how many properties were stored. Already materialized values
    /// are kept; use [`invalidate`](Self::invalidate) to drop them.
    pub async fn refresh(
        &mut self,
        mo_ref: &ManagedObjectReference,
        properties: Option<&[&str]>,
    ) -> VimResult<usize> {
        self.insert_built(mo_ref)?;
        let spec = match properties {
            Some(names) => PropertyFilterSpec::for_object(mo_ref, names, false),
            None => PropertyFilterSpec::for_object(mo_ref, &[], self.config.auto_populate),
        };
        let contents = self.retrieve(&spec).await?;

        let Some(content) = contents.iter().find(|c| &c.obj == mo_ref) else {
            warn!("No content returned for {mo_ref}; keeping current properties");
            return Ok(0);
        };
        let applied = self.require_entity_mut(mo_ref)?.set_view_data(content);
        debug!("Refreshed {mo_ref}: {applied} properties applied");
        Ok(applied)
    }

    /// Build (or reuse) `mo_ref` and refresh it.
    pub async fn get_view(
        &mut self,
        mo_ref: &ManagedObjectReference,
        properties: Option<&[&str]>,
    ) -> VimResult<&ManagedObject> {
        self.refresh(mo_ref, properties).await?;
        self.require_entity(mo_ref)
    }

    /// [`get_view`](Self::get_view) for several references, in order.
    pub async fn get_views(
        &mut self,
        refs: &[ManagedObjectReference],
        properties: Option<&[&str]>,
    ) -> VimResult<Vec<&ManagedObject>> {
        // Unknown types fail before any RPC is made.
        for r in refs {
            self.registry.merged_schema(&r.mo_type)?;
        }
        for r in refs {
            self.refresh(r, properties).await?;
        }
        refs.iter().map(|r| self.require_entity(r)).collect()
    }

    // ── Property access ─────────────────────────────────────────────

    /// Read a schema property, materializing it on first access.
    ///
    /// Reference properties come back as keys into the entity table; the
    /// referenced objects are built (and, under auto-population, refreshed)
    /// before the value is cached. Later reads return the cached value
    /// without any RPC.
    pub async fn property(
        &mut self,
        mo_ref: &ManagedObjectReference,
        name: &str,
    ) -> VimResult<Materialized> {
        self.adopt(mo_ref).await?;
        let plan = self.require_entity(mo_ref)?.resolution(name)?;
        let value = match plan {
            Resolution::Cached(value) => return Ok(value),
            Resolution::Local(value) => value,
            Resolution::One(child) => {
                self.adopt(&child).await?;
                Materialized::Object(child)
            }
            Resolution::Many(children) => {
                self.adopt_many(&children).await?;
                Materialized::Objects(children)
            }
        };
        trace!("Materialized {mo_ref}.{name}");
        self.require_entity_mut(mo_ref)?.install(name, value.clone())?;
        Ok(value)
    }

    /// Look up `name` on `mo_ref`: schema property first, then a remote
    /// operation of that name, then a declared field.
    pub async fn get(&mut self, mo_ref: &ManagedObjectReference, name: &str) -> VimResult<Attribute> {
        if self.registry.merged_schema(&mo_ref.mo_type)?.contains(name) {
            return self.property(mo_ref, name).await.map(Attribute::from);
        }
        if self.transport.has_operation(name).await {
            trace!("'{name}' on {mo_ref} is a remote operation");
            return Ok(Attribute::Method(RemoteMethod {
                name: name.to_string(),
                this: mo_ref.clone(),
                transport: Arc::clone(&self.transport),
            }));
        }
        if DECLARED_FIELDS.contains(&name) {
            return Ok(Attribute::Value(VimValue::Reference(mo_ref.clone())));
        }
        Err(VimError::attribute_not_found(&mo_ref.mo_type, name))
    }

    /// Call a remote operation on `mo_ref` through [`get`](Self::get).
    pub async fn call(
        &mut self,
        mo_ref: &ManagedObjectReference,
        method: &str,
        args: Args,
    ) -> VimResult<VimValue> {
        match self.get(mo_ref, method).await? {
            Attribute::Method(m) => m.call(args).await,
            _ => Err(VimError::attribute_not_found(&mo_ref.mo_type, method)),
        }
    }

    // ── Invalidation ────────────────────────────────────────────────

    /// Drop the materialized value of one property.
    pub fn invalidate(&mut self, mo_ref: &ManagedObjectReference, name: &str) -> bool {
        self.entities
            .get_mut(mo_ref)
            .map(|e| e.invalidate(name))
            .unwrap_or(false)
    }

    pub fn invalidate_all(&mut self, mo_ref: &ManagedObjectReference) -> usize {
        self.entities
            .get_mut(mo_ref)
            .map(|e| e.invalidate_all())
            .unwrap_or(0)
    }

    // ── Lookups ─────────────────────────────────────────────────────

    /// First `type_name` entity below the root folder whose properties
    /// equal every `(name, value)` pair of `filter`, refreshed.
    pub async fn find_entity_view(
        &mut self,
        type_name: &str,
        filter: &[(&str, VimValue)],
    ) -> VimResult<ManagedObjectReference> {
        self.registry.merged_schema(type_name)?;
        let names: Vec<&str> = filter.iter().map(|(k, _)| *k).collect();

        let view = self.create_container_view(type_name).await?;
        let spec = PropertyFilterSpec::for_container_view(&view, type_name, &names);
        let retrieved = self.retrieve(&spec).await;
        if let Err(e) = self.invoke("DestroyView", &view, Args::new()).await {
            warn!("Failed to destroy {view}: {e}");
        }

        let found = retrieved?.into_iter().find(|content| {
            filter
                .iter()
                .all(|(k, v)| content.property(k) == Some(v))
        });
        let Some(content) = found else {
            debug!("No {type_name} matching {filter:?}");
            return Err(VimError::not_found(format!(
                "No {type_name} found matching {filter:?}"
            )));
        };

        let mo_ref = content.obj;
        debug!("Found {mo_ref} for {type_name} filter {filter:?}");
        self.insert_built(&mo_ref)?;
        if self.config.auto_populate {
            self.refresh(&mo_ref, None).await?;
        } else {
            self.refresh(&mo_ref, Some(names.as_slice())).await?;
        }
        Ok(mo_ref)
    }

    /// Shorthand for a `name` equality lookup.
    pub async fn find_by_name(&mut self, type_name: &str, name: &str) -> VimResult<ManagedObjectReference> {
        self.find_entity_view(type_name, &[("name", VimValue::string(name))])
            .await
    }

    async fn create_container_view(&self, type_name: &str) -> VimResult<ManagedObjectReference> {
        let mut args = Args::new();
        args.insert(
            "container".to_string(),
            VimValue::Reference(self.content.root_folder.clone()),
        );
        args.insert(
            "type".to_string(),
            VimValue::Array(vec![VimValue::string(type_name)]),
        );
        args.insert("recursive".to_string(), VimValue::Bool(true));

        let result = self
            .invoke("CreateContainerView", &self.content.view_manager, args)
            .await?;
        result
            .as_reference()
            .cloned()
            .ok_or_else(|| VimError::parse(format!("CreateContainerView returned {result:?}")))
    }

    /// Walk `parent` links upward from `mo_ref` until an entity of
    /// `root_type` (or a subtype) is reached.
    pub async fn find_ancestor(
        &mut self,
        mo_ref: &ManagedObjectReference,
        root_type: &str,
    ) -> VimResult<ManagedObjectReference> {
        self.insert_built(mo_ref)?;
        if self.raw_parent(mo_ref)?.is_none() {
            self.refresh(mo_ref, Some(CHAIN_PROPERTIES)).await?;
        }

        let mut visited = HashSet::from([mo_ref.clone()]);
        let mut current = mo_ref.clone();
        loop {
            let parent = self.raw_parent(&current)?.ok_or_else(|| {
                VimError::not_found(format!("No {root_type} above {mo_ref}: {current} has no parent"))
            })?;
            if !visited.insert(parent.clone()) {
                return Err(VimError::not_found(format!(
                    "Parent chain of {mo_ref} loops back to {parent}"
                )));
            }

            self.insert_built(&parent)?;
            self.refresh(&parent, Some(CHAIN_PROPERTIES)).await?;
            trace!("Parent of {current} is {parent}");
            if self.registry.is_a(&parent.mo_type, root_type) {
                return Ok(parent);
            }
            current = parent;
        }
    }

    /// The datacenter (or configured root type) `mo_ref` belongs to.
    pub async fn find_datacenter(&mut self, mo_ref: &ManagedObjectReference) -> VimResult<ManagedObjectReference> {
        let root_type = self.config.root_type.clone();
        self.find_ancestor(mo_ref, &root_type).await
    }

    fn raw_parent(&self, mo_ref: &ManagedObjectReference) -> VimResult<Option<ManagedObjectReference>> {
        let entity = self.require_entity(mo_ref)?;
        match entity.raw("parent") {
            Some(VimValue::Reference(r)) => Ok(Some(r.clone())),
            Some(VimValue::None) => Ok(None),
            Some(other) => Err(VimError::parse(format!(
                "{mo_ref}.parent should be a reference, got {other:?}"
            ))),
            None => Err(VimError::attribute_not_found(&mo_ref.mo_type, "parent")),
        }
    }

    /// The datastore called `name` among those attached to a compute
    /// resource.
    pub async fn find_datastore(
        &mut self,
        compute: &ManagedObjectReference,
        name: &str,
    ) -> VimResult<ManagedObjectReference> {
        self.adopt(compute).await?;
        let listed = self
            .require_entity(compute)?
            .raw("datastore")
            .map_or(false, |v| !v.is_empty_marker());
        if !listed {
            self.refresh(compute, Some(&["datastore"][..])).await?;
            self.invalidate(compute, "datastore");
        }

        let datastores = match self.property(compute, "datastore").await? {
            Materialized::Objects(refs) => refs,
            Materialized::Object(r) => vec![r],
            Materialized::Value(_) => Vec::new(),
        };
        let views = self.get_views(&datastores, Some(&["summary"])).await?;
        let found = views
            .iter()
            .find(|ds| {
                ds.raw("summary")
                    .and_then(VimValue::as_data)
                    .and_then(|s| s.field("name"))
                    .and_then(VimValue::as_str)
                    == Some(name)
            })
            .map(|ds| ds.mo_ref().clone());

        match found {
            Some(ds) => {
                if self.config.auto_populate {
                    self.refresh(&ds, None).await?;
                }
                Ok(ds)
            }
            None => Err(VimError::not_found(format!("No datastore matching {name}"))),
        }
    }
}
