//! The managed-object type catalog of the VIM API.
//!
//! Types are listed parents-first so the whole slice can be handed to
//! [`TypeRegistry::register_all`](crate::schema::TypeRegistry::register_all).
//! Only properties are declared here; methods are discovered from the
//! transport at call time.

use crate::schema::{PropertyDef as P, TypeDef as T};

/// Every managed-object type known to the client.
pub static CATALOG: &[T] = &[
    T::root("ManagedObject", &[]),

    // ── Direct managed objects ──────────────────────────────────────
    T::extends("AlarmManager", "ManagedObject", &[
        P::data_list("defaultExpression"),
        P::data("description"),
    ]),
    T::extends("AuthorizationManager", "ManagedObject", &[
        P::data("description"),
        P::data_list("privilegeList"),
        P::data_list("roleList"),
    ]),
    T::extends("CustomFieldsManager", "ManagedObject", &[P::data_list("field")]),
    T::extends("CustomizationSpecManager", "ManagedObject", &[
        P::data("encryptionKey"),
        P::data_list("info"),
    ]),
    T::extends("DiagnosticManager", "ManagedObject", &[]),
    T::extends("DistributedVirtualSwitchManager", "ManagedObject", &[]),
    T::extends("EnvironmentBrowser", "ManagedObject", &[P::reference("datastoreBrowser")]),
    T::extends("EventManager", "ManagedObject", &[
        P::data("description"),
        P::data("latestEvent"),
        P::data("maxCollector"),
    ]),
    T::extends("ExtensionManager", "ManagedObject", &[P::data_list("extensionList")]),
    T::extends("FileManager", "ManagedObject", &[]),
    T::extends("HistoryCollector", "ManagedObject", &[P::data("filter")]),
    T::extends("EventHistoryCollector", "HistoryCollector", &[P::data_list("latestPage")]),
    T::extends("TaskHistoryCollector", "HistoryCollector", &[P::data_list("latestPage")]),
    T::extends("HostAutoStartManager", "ManagedObject", &[P::data("config")]),
    T::extends("HostBootDeviceSystem", "ManagedObject", &[]),
    T::extends("HostDatastoreBrowser", "ManagedObject", &[
        P::reference_list("datastore"),
        P::data_list("supportedType"),
    ]),
    T::extends("HostDatastoreSystem", "ManagedObject", &[
        P::data("capabilities"),
        P::reference_list("datastore"),
    ]),
    T::extends("HostDateTimeSystem", "ManagedObject", &[P::data("dateTimeInfo")]),
    T::extends("HostDiagnosticSystem", "ManagedObject", &[P::data("activePartition")]),
    T::extends("HostFirmwareSystem", "ManagedObject", &[]),
    T::extends("HostHealthStatusSystem", "ManagedObject", &[P::data("runtime")]),
    T::extends("HostKernelModuleSystem", "ManagedObject", &[]),
    T::extends("HostLocalAccountManager", "ManagedObject", &[]),
    T::extends("HostPatchManager", "ManagedObject", &[]),
    T::extends("HostSnmpSystem", "ManagedObject", &[
        P::data("configuration"),
        P::data("limits"),
    ]),
    T::extends("HttpNfcLease", "ManagedObject", &[
        P::data("error"),
        P::data("info"),
        P::data("initializeProgress"),
        P::data("state"),
    ]),
    T::extends("IpPoolManager", "ManagedObject", &[]),
    T::extends("LicenseAssignmentManager", "ManagedObject", &[]),
    T::extends("LicenseManager", "ManagedObject", &[
        P::data("diagnostics"),
        P::data("evaluation"),
        P::data_list("featureInfo"),
        P::reference("licenseAssignmentManager"),
        P::data("licensedEdition"),
        P::data_list("licenses"),
        P::data("source"),
        P::data("sourceAvailable"),
    ]),
    T::extends("LocalizationManager", "ManagedObject", &[P::data_list("catalog")]),
    T::extends("OptionManager", "ManagedObject", &[
        P::data_list("setting"),
        P::data_list("supportedOption"),
    ]),
    T::extends("OvfManager", "ManagedObject", &[]),
    T::extends("PerformanceManager", "ManagedObject", &[
        P::data("description"),
        P::data_list("historicalInterval"),
        P::data_list("perfCounter"),
    ]),
    T::extends("Profile", "ManagedObject", &[
        P::data("complianceStatus"),
        P::data("config"),
        P::data("createdTime"),
        P::data("description"),
        P::reference_list("entity"),
        P::data("modifiedTime"),
        P::data("name"),
    ]),
    T::extends("ClusterProfile", "Profile", &[]),
    T::extends("HostProfile", "Profile", &[P::reference("referenceHost")]),
    T::extends("ProfileComplianceManager", "ManagedObject", &[]),
    T::extends("ProfileManager", "ManagedObject", &[P::reference_list("profile")]),
    T::extends("ClusterProfileManager", "ProfileManager", &[]),
    T::extends("HostProfileManager", "ProfileManager", &[]),
    T::extends("PropertyCollector", "ManagedObject", &[P::reference_list("filter")]),
    T::extends("PropertyFilter", "ManagedObject", &[
        P::data("partialUpdates"),
        P::data("spec"),
    ]),
    T::extends("ResourcePlanningManager", "ManagedObject", &[]),
    T::extends("ScheduledTaskManager", "ManagedObject", &[
        P::data("description"),
        P::reference_list("scheduledTask"),
    ]),
    T::extends("SearchIndex", "ManagedObject", &[]),
    T::extends("ServiceInstance", "ManagedObject", &[
        P::data("capability"),
        P::data("content"),
        P::data("serverClock"),
    ]),
    T::extends("SessionManager", "ManagedObject", &[
        P::data("currentSession"),
        P::data("defaultLocale"),
        P::data("message"),
        P::data_list("messageLocaleList"),
        P::data_list("sessionList"),
        P::data_list("supportedLocaleList"),
    ]),
    T::extends("TaskManager", "ManagedObject", &[
        P::data("description"),
        P::data("maxCollector"),
        P::reference_list("recentTask"),
    ]),
    T::extends("UserDirectory", "ManagedObject", &[P::data_list("domainList")]),
    T::extends("View", "ManagedObject", &[]),
    T::extends("ManagedObjectView", "View", &[P::reference_list("view")]),
    T::extends("ContainerView", "ManagedObjectView", &[
        P::reference("container"),
        P::data("recursive"),
        P::data_list("type"),
    ]),
    T::extends("InventoryView", "ManagedObjectView", &[]),
    T::extends("ListView", "ManagedObjectView", &[]),
    T::extends("ViewManager", "ManagedObject", &[P::reference_list("viewList")]),
    T::extends("VirtualDiskManager", "ManagedObject", &[]),
    T::extends("VirtualizationManager", "ManagedObject", &[]),
    T::extends("VirtualMachineCompatibilityChecker", "ManagedObject", &[]),
    T::extends("VirtualMachineProvisioningChecker", "ManagedObject", &[]),

    // ── Extensible managed objects ──────────────────────────────────
    T::extends("ExtensibleManagedObject", "ManagedObject", &[
        P::data_list("availableField"),
        P::data_list("value"),
    ]),
    T::extends("Alarm", "ExtensibleManagedObject", &[P::data("info")]),
    T::extends("HostCpuSchedulerSystem", "ExtensibleManagedObject", &[P::data("hyperthreadInfo")]),
    T::extends("HostFirewallSystem", "ExtensibleManagedObject", &[P::data("firewallInfo")]),
    T::extends("HostMemorySystem", "ExtensibleManagedObject", &[
        P::data("consoleReservationInfo"),
        P::data("virtualMachineReservationInfo"),
    ]),
    T::extends("HostNetworkSystem", "ExtensibleManagedObject", &[
        P::data("capabilities"),
        P::data("consoleIpRouteConfig"),
        P::data("dnsConfig"),
        P::data("ipRouteConfig"),
        P::data("networkConfig"),
        P::data("networkInfo"),
        P::data("offloadCapabilities"),
    ]),
    T::extends("HostPciPassthruSystem", "ExtensibleManagedObject", &[P::data_list("pciPassthruInfo")]),
    T::extends("HostServiceSystem", "ExtensibleManagedObject", &[P::data("serviceInfo")]),
    T::extends("HostStorageSystem", "ExtensibleManagedObject", &[
        P::data("fileSystemVolumeInfo"),
        P::data("multipathStateInfo"),
        P::data("storageDeviceInfo"),
        P::data_list("systemFile"),
    ]),
    T::extends("HostVirtualNicManager", "ExtensibleManagedObject", &[P::data("info")]),
    T::extends("HostVMotionSystem", "ExtensibleManagedObject", &[
        P::data("ipConfig"),
        P::data("netConfig"),
    ]),
    T::extends("ScheduledTask", "ExtensibleManagedObject", &[P::data("info")]),
    T::extends("Task", "ExtensibleManagedObject", &[P::data("info")]),
    T::extends("VirtualMachineSnapshot", "ExtensibleManagedObject", &[
        P::reference_list("childSnapshot"),
        P::data("config"),
    ]),

    // ── Managed entities (the inventory tree) ───────────────────────
    T::extends("ManagedEntity", "ExtensibleManagedObject", &[
        P::data("alarmActionsEnabled"),
        P::data_list("configIssue"),
        P::data("configStatus"),
        P::data_list("customValue"),
        P::data_list("declaredAlarmState"),
        P::data_list("disabledMethod"),
        P::data_list("effectiveRole"),
        P::data("name"),
        P::data("overallStatus"),
        P::reference("parent"),
        P::data_list("permission"),
        P::reference_list("recentTask"),
        P::data_list("tag"),
        P::data_list("triggeredAlarmState"),
    ]),
    T::extends("ComputeResource", "ManagedEntity", &[
        P::data("configurationEx"),
        P::reference_list("datastore"),
        P::reference("environmentBrowser"),
        P::reference_list("host"),
        P::reference_list("network"),
        P::reference("resourcePool"),
        P::data("summary"),
    ]),
    T::extends("ClusterComputeResource", "ComputeResource", &[
        P::data_list("actionHistory"),
        P::data("configuration"),
        P::data_list("drsFault"),
        P::data_list("drsRecommendation"),
        P::data_list("migrationHistory"),
        P::data_list("recommendation"),
    ]),
    T::extends("Datacenter", "ManagedEntity", &[
        P::reference_list("datastore"),
        P::reference("datastoreFolder"),
        P::reference("hostFolder"),
        P::reference_list("network"),
        P::reference("networkFolder"),
        P::reference("vmFolder"),
    ]),
    T::extends("Datastore", "ManagedEntity", &[
        P::reference("browser"),
        P::data("capability"),
        // DatastoreHostMount records, not references
        P::data_list("host"),
        P::data("info"),
        P::data("iormConfiguration"),
        P::data("summary"),
        P::reference_list("vm"),
    ]),
    T::extends("DistributedVirtualSwitch", "ManagedEntity", &[
        P::data("capability"),
        P::data("config"),
        P::data_list("networkResourcePool"),
        P::reference_list("portgroup"),
        P::data("summary"),
        P::data("uuid"),
    ]),
    T::extends("VmwareDistributedVirtualSwitch", "DistributedVirtualSwitch", &[]),
    T::extends("Folder", "ManagedEntity", &[
        P::reference_list("childEntity"),
        P::data_list("childType"),
    ]),
    T::extends("HostSystem", "ManagedEntity", &[
        P::data("capability"),
        P::data("config"),
        P::data("configManager"),
        P::reference_list("datastore"),
        P::reference("datastoreBrowser"),
        P::data("hardware"),
        P::reference_list("network"),
        P::data("runtime"),
        P::data("summary"),
        P::data("systemResources"),
        P::reference_list("vm"),
    ]),
    T::extends("Network", "ManagedEntity", &[
        P::reference_list("host"),
        P::data("summary"),
        P::reference_list("vm"),
    ]),
    T::extends("DistributedVirtualPortgroup", "Network", &[
        P::data("config"),
        P::data("key"),
        P::data_list("portKeys"),
    ]),
    T::extends("ResourcePool", "ManagedEntity", &[
        P::data("config"),
        P::reference("owner"),
        P::reference_list("resourcePool"),
        P::data("runtime"),
        P::data("summary"),
        P::reference_list("vm"),
    ]),
    T::extends("VirtualApp", "ResourcePool", &[
        P::data_list("childLink"),
        P::reference_list("datastore"),
        P::reference_list("network"),
        P::reference("parentFolder"),
        P::reference("parentVApp"),
        P::data("vAppConfig"),
    ]),
    T::extends("VirtualMachine", "ManagedEntity", &[
        P::data("capability"),
        P::data("config"),
        P::reference_list("datastore"),
        P::reference("environmentBrowser"),
        P::data("guest"),
        P::data("guestHeartbeatStatus"),
        P::data("layout"),
        P::data("layoutEx"),
        P::reference_list("network"),
        P::reference("parentVApp"),
        P::data("resourceConfig"),
        P::reference("resourcePool"),
        P::reference_list("rootSnapshot"),
        P::data("runtime"),
        P::data("snapshot"),
        P::data("storage"),
        P::data("summary"),
    ]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRegistry;

    #[test]
    fn catalog_registers_cleanly() {
        let registry = TypeRegistry::with_catalog().unwrap();
        assert_eq!(registry.len(), CATALOG.len());
    }

    #[test]
    fn virtual_machine_inherits_entity_and_extensible_properties() {
        let registry = TypeRegistry::with_catalog().unwrap();
        let schema = registry.merged_schema("VirtualMachine").unwrap();
        assert!(schema.get("parent").unwrap().reference);
        assert!(!schema.get("availableField").unwrap().reference);
        assert!(schema.get("datastore").unwrap().reference);
        assert!(!schema.get("summary").unwrap().reference);
    }

    #[test]
    fn plain_managed_objects_have_no_entity_properties() {
        let registry = TypeRegistry::with_catalog().unwrap();
        let schema = registry.merged_schema("SessionManager").unwrap();
        assert!(!schema.contains("parent"));
        assert!(schema.contains("currentSession"));
    }
}
