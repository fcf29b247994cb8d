//! vCloud Director XML object model.
//!
//! Unique responsibility: describe the XML documents exchanged with the vCD API
//! and navigate the `<Link>` / `<Reference>` lists they carry.
//!
//! Decoding and encoding go through `quick-xml`'s serde support:
//! - attributes are fields renamed with an `@` prefix,
//! - child elements are fields renamed after the element,
//! - repeated elements are `Vec`s with `#[serde(default)]`.
//!
//! Response documents only derive `Deserialize`; request payloads are separate
//! `Serialize` structs so that server-owned fields are never sent back.

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::vcd_client::VcdError;

// ============================================================================
// Namespaces, MIME types and link relations
// ============================================================================

/// XML declaration prepended to every request body.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// vCloud 1.5 namespace.
pub const NS_VCLOUD: &str = "http://www.vmware.com/vcloud/v1.5";
/// OVF envelope namespace.
pub const NS_OVF: &str = "http://schemas.dmtf.org/ovf/envelope/1";
/// XML schema instance namespace.
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Organization.
pub const MIME_ORG: &str = "application/vnd.vmware.vcloud.org+xml";
/// Admin view of an organization.
pub const MIME_ADMIN_ORG: &str = "application/vnd.vmware.admin.organization+xml";
/// Query list.
pub const MIME_QUERY_LIST: &str = "application/vnd.vmware.vcloud.query.queryList+xml";
/// Query result records.
pub const MIME_QUERY_RECORDS: &str = "application/vnd.vmware.vcloud.query.records+xml";
/// Catalog.
pub const MIME_CATALOG: &str = "application/vnd.vmware.vcloud.catalog+xml";
/// Admin view of a catalog.
pub const MIME_ADMIN_CATALOG: &str = "application/vnd.vmware.admin.catalog+xml";
/// Virtual datacenter.
pub const MIME_VDC: &str = "application/vnd.vmware.vcloud.vdc+xml";
/// Independent disk.
pub const MIME_DISK: &str = "application/vnd.vmware.vcloud.disk+xml";
/// Independent disk creation parameters.
pub const MIME_DISK_CREATE_PARAMS: &str = "application/vnd.vmware.vcloud.diskCreateParams+xml";
/// VM reference list.
pub const MIME_VMS: &str = "application/vnd.vmware.vcloud.vms+xml";
/// Task.
pub const MIME_TASK: &str = "application/vnd.vmware.vcloud.task+xml";
/// Media.
pub const MIME_MEDIA: &str = "application/vnd.vmware.vcloud.media+xml";
/// vApp template.
pub const MIME_VAPP_TEMPLATE: &str = "application/vnd.vmware.vcloud.vAppTemplate+xml";
/// Edge gateway.
pub const MIME_EDGE_GATEWAY: &str = "application/vnd.vmware.admin.edgeGateway+xml";
/// vApp.
pub const MIME_VAPP: &str = "application/vnd.vmware.vcloud.vApp+xml";
/// vApp composition parameters.
pub const MIME_COMPOSE_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.composeVAppParams+xml";
/// vApp template instantiation parameters.
pub const MIME_INSTANTIATE_VAPP_TEMPLATE: &str =
    "application/vnd.vmware.vcloud.instantiateVAppTemplateParams+xml";
/// vApp undeploy parameters.
pub const MIME_UNDEPLOY_VAPP_PARAMS: &str = "application/vnd.vmware.vcloud.undeployVAppParams+xml";
/// Org VDC network.
pub const MIME_ORG_VDC_NETWORK: &str = "application/vnd.vmware.vcloud.orgVdcNetwork+xml";
/// Matches links that carry no `type` attribute.
pub const MIME_EMPTY: &str = "";

/// Navigate to a child object.
pub const REL_DOWN: &str = "down";
/// Navigate to the parent object.
pub const REL_UP: &str = "up";
/// Create a child object.
pub const REL_ADD: &str = "add";
/// Delete the object.
pub const REL_REMOVE: &str = "remove";
/// Modify the object.
pub const REL_EDIT: &str = "edit";
/// Alternate representation (e.g. the admin view).
pub const REL_ALTERNATE: &str = "alternate";
/// Enable an optional capability (e.g. media download).
pub const REL_ENABLE: &str = "enable";
/// Cancel a task.
pub const REL_TASK_CANCEL: &str = "task:cancel";
/// Default download location of a file.
pub const REL_DOWNLOAD_DEFAULT: &str = "download:default";
/// Default upload location of a file.
pub const REL_UPLOAD_DEFAULT: &str = "upload:default";
/// Power on a vApp or VM.
pub const REL_POWER_ON: &str = "power:powerOn";
/// Undeploy a vApp.
pub const REL_UNDEPLOY: &str = "undeploy";
/// Edge gateway records of a VDC.
pub const REL_EDGE_GATEWAYS: &str = "edgeGateways";

// ============================================================================
// Links and references
// ============================================================================

/// `<Link>` navigation element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Link {
    /// Target URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// MIME type of the target.
    #[serde(rename = "@type", default)]
    pub link_type: String,
    /// Relation of the target to the current object.
    #[serde(rename = "@rel", default)]
    pub rel: String,
    /// Name of the target object.
    #[serde(rename = "@name", default)]
    pub name: String,
}

/// Lookups over a list of links.
pub trait LinkList {
    /// First link with the given name, type and relation.
    fn for_name(&self, name: &str, mime: &str, rel: &str) -> Option<&Link>;

    /// First link with the given type and relation.
    fn for_type(&self, mime: &str, rel: &str) -> Option<&Link>;

    /// Parsed URL of the first link with the given type and relation.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such link or its href is not a URL.
    fn url_for_type(&self, mime: &str, rel: &str) -> Result<Url, VcdError>;
}

impl LinkList for [Link] {
    fn for_name(&self, name: &str, mime: &str, rel: &str) -> Option<&Link> {
        self.iter()
            .find(|l| l.name == name && l.link_type == mime && l.rel == rel)
    }

    fn for_type(&self, mime: &str, rel: &str) -> Option<&Link> {
        self.iter().find(|l| l.link_type == mime && l.rel == rel)
    }

    fn url_for_type(&self, mime: &str, rel: &str) -> Result<Url, VcdError> {
        let link = self.for_type(mime, rel).ok_or_else(|| VcdError::LinkNotFound {
            mime: mime.to_string(),
            rel: rel.to_string(),
        })?;
        parse_href(&link.href)
    }
}

/// Reference to another vCD object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Object URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Object URN.
    #[serde(rename = "@id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Object MIME type.
    #[serde(rename = "@type", default, skip_serializing_if = "String::is_empty")]
    pub ref_type: String,
    /// Object name.
    #[serde(rename = "@name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Lookups over a list of references.
pub trait ReferenceList {
    /// First reference with the given name.
    fn for_name(&self, name: &str) -> Option<&Reference>;
}

impl ReferenceList for [Reference] {
    fn for_name(&self, name: &str) -> Option<&Reference> {
        self.iter().find(|r| r.name == name)
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// `<Task>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRecord {
    /// Task URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Task URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Task name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// MIME type.
    #[serde(rename = "@type", default)]
    pub task_type: String,
    /// Raw status (`queued`, `preRunning`, `running`, `success`, `error`, ...).
    #[serde(rename = "@status", default)]
    pub status: String,
    /// Operation description.
    #[serde(rename = "@operation", default)]
    pub operation: String,
    /// Operation short name.
    #[serde(rename = "@operationName", default)]
    pub operation_name: String,
    /// Start time (ISO 8601).
    #[serde(rename = "@startTime", default)]
    pub start_time: String,
    /// End time (ISO 8601).
    #[serde(rename = "@endTime", default)]
    pub end_time: String,
    /// Links (e.g. `task:cancel`).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Human readable description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Error detail for failed tasks.
    #[serde(rename = "Error", default)]
    pub error: Option<VcdErrorBody>,
    /// Object the task operates on.
    #[serde(rename = "Owner", default)]
    pub owner: Option<Reference>,
    /// Completion percentage.
    #[serde(rename = "Progress", default)]
    pub progress: Option<u32>,
}

/// `<Tasks>` container embedded in entity documents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksInProgress {
    /// Running tasks.
    #[serde(rename = "Task", default)]
    pub tasks: Vec<TaskRecord>,
}

/// Flatten an optional `<Tasks>` element.
#[must_use]
pub fn tasks_of(tasks: Option<&TasksInProgress>) -> &[TaskRecord] {
    tasks.map_or(&[], |t| t.tasks.as_slice())
}

/// `<Error>` document returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VcdErrorBody {
    /// Error message.
    #[serde(rename = "@message", default)]
    pub message: String,
    /// HTTP-like major code.
    #[serde(rename = "@majorErrorCode", default)]
    pub major_error_code: String,
    /// vCD symbolic code (e.g. `BUSY_ENTITY`).
    #[serde(rename = "@minorErrorCode", default)]
    pub minor_error_code: String,
}

// ============================================================================
// Session bootstrap
// ============================================================================

/// `<SupportedVersions>` document served at `/versions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupportedVersions {
    /// One entry per API version.
    #[serde(rename = "VersionInfo", default)]
    pub version_info: Vec<VersionInfo>,
}

/// Login endpoint of one API version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionInfo {
    /// API version (e.g. `5.6`).
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Session endpoint for that version.
    #[serde(rename = "LoginUrl", default)]
    pub login_url: String,
}

/// `<Session>` document returned by login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    /// Logged in user.
    #[serde(rename = "@user", default)]
    pub user: String,
    /// Logged in org.
    #[serde(rename = "@org", default)]
    pub org: String,
    /// Entry points (orgs, query list, logout).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
}

// ============================================================================
// Organizations
// ============================================================================

/// `<Org>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgRecord {
    /// Org URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Org URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Org short name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links to catalogs, VDCs, networks and the admin view.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Display name.
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    /// Whether the org is enabled.
    #[serde(rename = "IsEnabled", default)]
    pub is_enabled: Option<bool>,
}

/// `<AdminOrg>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminOrgRecord {
    /// Admin org URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Org URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Org short name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links (`add` catalog, ...).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Display name.
    #[serde(rename = "FullName", default)]
    pub full_name: Option<String>,
    /// Whether the org is enabled.
    #[serde(rename = "IsEnabled", default)]
    pub is_enabled: Option<bool>,
    /// Catalog references.
    #[serde(rename = "Catalogs", default)]
    pub catalogs: Option<CatalogsList>,
    /// VDC references.
    #[serde(rename = "Vdcs", default)]
    pub vdcs: Option<VdcsList>,
}

/// `<Catalogs>` container of an admin org.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogsList {
    /// Catalog references.
    #[serde(rename = "CatalogReference", default)]
    pub catalog: Vec<Reference>,
}

/// `<Vdcs>` container of an admin org.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VdcsList {
    /// VDC references.
    #[serde(rename = "Vdc", default)]
    pub vdc: Vec<Reference>,
}

// ============================================================================
// Catalogs and media
// ============================================================================

/// `<Catalog>` / `<AdminCatalog>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRecord {
    /// Catalog URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Catalog URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Catalog name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links (`add` media, `remove`, ...).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Creation tasks.
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
    /// Item references.
    #[serde(rename = "CatalogItems", default)]
    pub catalog_items: Vec<CatalogItems>,
    /// Whether the catalog is published to other orgs.
    #[serde(rename = "IsPublished", default)]
    pub is_published: Option<bool>,
}

/// `<CatalogItems>` container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogItems {
    /// Item references.
    #[serde(rename = "CatalogItem", default)]
    pub catalog_item: Vec<Reference>,
}

/// Body for creating or updating an admin catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "AdminCatalog")]
pub struct AdminCatalogParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Catalog name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Description.
    #[serde(rename = "Description")]
    pub description: String,
    /// Publication flag.
    #[serde(rename = "IsPublished", skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

/// `<CatalogItem>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogItemRecord {
    /// Item URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Item name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links (`remove`, ...).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// The media or vApp template this item wraps.
    #[serde(rename = "Entity", default)]
    pub entity: Option<Reference>,
}

/// `<Media>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRecord {
    /// Media URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Media name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// `iso` or `floppy`.
    #[serde(rename = "@imageType", default)]
    pub image_type: String,
    /// Size in bytes.
    #[serde(rename = "@size", default)]
    pub size: i64,
    /// Links (`enable`, ...).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Upload tasks.
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
    /// Transfer endpoints.
    #[serde(rename = "Files", default)]
    pub files: Option<FilesList>,
}

/// `<Files>` container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesList {
    /// Files.
    #[serde(rename = "File", default)]
    pub file: Vec<FileRecord>,
}

/// `<File>` transfer endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileRecord {
    /// File name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Expected size.
    #[serde(rename = "@size", default)]
    pub size: i64,
    /// Bytes already transferred.
    #[serde(rename = "@bytesTransferred", default)]
    pub bytes_transferred: i64,
    /// `upload:default` / `download:default` links.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
}

/// Body announcing a media upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "Media")]
pub struct MediaParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Media name.
    #[serde(rename = "@name")]
    pub name: String,
    /// `iso` or `floppy`.
    #[serde(rename = "@imageType")]
    pub image_type: String,
    /// Size in bytes.
    #[serde(rename = "@size")]
    pub size: i64,
}

/// `<VAppTemplate>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VAppTemplateRecord {
    /// Template URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Template name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Pending tasks.
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
}

/// Body for instantiating a vApp template into a VDC.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "InstantiateVAppTemplateParams")]
pub struct InstantiateVAppTemplateParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// OVF namespace.
    #[serde(rename = "@xmlns:ovf")]
    pub ovf: String,
    /// Name of the new vApp.
    #[serde(rename = "@name")]
    pub name: String,
    /// Deploy after instantiation.
    #[serde(rename = "@deploy")]
    pub deploy: bool,
    /// Power on after instantiation.
    #[serde(rename = "@powerOn")]
    pub power_on: bool,
    /// Description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template to instantiate.
    #[serde(rename = "Source")]
    pub source: Reference,
    /// Accept all EULAs in the template.
    #[serde(rename = "AllEULAsAccepted")]
    pub all_eulas_accepted: bool,
}

// ============================================================================
// VDCs
// ============================================================================

/// `<Vdc>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VdcRecord {
    /// VDC URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// VDC URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// VDC name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Links (`add` disk/vApp/network, edge gateway records, ...).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// vApps, templates, disks and media living in the VDC.
    #[serde(rename = "ResourceEntities", default)]
    pub resource_entities: Vec<ResourceEntities>,
    /// Networks usable by vApps in the VDC.
    #[serde(rename = "AvailableNetworks", default)]
    pub available_networks: Vec<AvailableNetworks>,
    /// Storage profiles of the VDC.
    #[serde(rename = "VdcStorageProfiles", default)]
    pub vdc_storage_profiles: Vec<VdcStorageProfiles>,
}

/// `<ResourceEntities>` container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceEntities {
    /// Entities.
    #[serde(rename = "ResourceEntity", default)]
    pub resource_entity: Vec<Reference>,
}

/// `<AvailableNetworks>` container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableNetworks {
    /// Networks.
    #[serde(rename = "Network", default)]
    pub network: Vec<Reference>,
}

/// `<VdcStorageProfiles>` container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VdcStorageProfiles {
    /// Storage profiles.
    #[serde(rename = "VdcStorageProfile", default)]
    pub vdc_storage_profile: Vec<Reference>,
}

// ============================================================================
// Independent disks
// ============================================================================

/// `<Disk>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiskRecord {
    /// Disk URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Disk URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Disk name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Size in bytes.
    #[serde(rename = "@size", default)]
    pub size: i64,
    /// Provisioned IOPS.
    #[serde(rename = "@iops", default)]
    pub iops: Option<i64>,
    /// Bus type (e.g. `6` for SCSI).
    #[serde(rename = "@busType", default)]
    pub bus_type: String,
    /// Bus sub type (e.g. `lsilogic`).
    #[serde(rename = "@busSubType", default)]
    pub bus_sub_type: String,
    /// Numeric entity status.
    #[serde(rename = "@status", default)]
    pub status: Option<i32>,
    /// Links (`edit`, `remove`, attached VMs).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Pending tasks (creation).
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
    /// Storage profile.
    #[serde(rename = "StorageProfile", default)]
    pub storage_profile: Option<Reference>,
    /// Owner.
    #[serde(rename = "Owner", default)]
    pub owner: Option<Owner>,
}

/// `<Owner>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// Owning user.
    #[serde(rename = "User", default)]
    pub user: Reference,
}

/// Body for creating an independent disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "DiskCreateParams")]
pub struct DiskCreateParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// The disk to create.
    #[serde(rename = "Disk")]
    pub disk: DiskParams,
}

/// Disk description inside [`DiskCreateParams`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiskParams {
    /// Disk name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Size in bytes.
    #[serde(rename = "@size")]
    pub size: i64,
    /// Provisioned IOPS.
    #[serde(rename = "@iops", skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    /// Bus type.
    #[serde(rename = "@busType", skip_serializing_if = "Option::is_none")]
    pub bus_type: Option<String>,
    /// Bus sub type.
    #[serde(rename = "@busSubType", skip_serializing_if = "Option::is_none")]
    pub bus_sub_type: Option<String>,
    /// Description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage profile.
    #[serde(rename = "StorageProfile", skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<Reference>,
}

/// Body for updating an independent disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "Disk")]
pub struct DiskUpdateParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Disk name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Size in bytes.
    #[serde(rename = "@size")]
    pub size: i64,
    /// Description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Storage profile.
    #[serde(rename = "StorageProfile", skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<Reference>,
    /// Owner.
    #[serde(rename = "Owner", skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

/// `<Vms>` document listing VMs attached to a disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vms {
    /// The attached VM, if any.
    #[serde(rename = "VmReference", default)]
    pub vm_reference: Option<Reference>,
}

// ============================================================================
// Org VDC networks
// ============================================================================

/// `<OrgVdcNetwork>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgVdcNetworkRecord {
    /// Network URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Network URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// Network name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Numeric entity status.
    #[serde(rename = "@status", default)]
    pub status: Option<i32>,
    /// Links.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Creation tasks.
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
    /// IP scopes and fence mode.
    #[serde(rename = "Configuration", default)]
    pub configuration: Option<NetworkConfiguration>,
    /// Edge gateway routing the network.
    #[serde(rename = "EdgeGateway", default)]
    pub edge_gateway: Option<Reference>,
    /// Shared with other VDCs of the org.
    #[serde(rename = "IsShared", default)]
    pub is_shared: Option<bool>,
}

/// `<Configuration>` of a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfiguration {
    /// IP scopes.
    #[serde(rename = "IpScopes", default, skip_serializing_if = "Option::is_none")]
    pub ip_scopes: Option<IpScopes>,
    /// `isolated`, `natRouted` or `bridged`.
    #[serde(rename = "FenceMode", default)]
    pub fence_mode: String,
}

/// `<IpScopes>` container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpScopes {
    /// Scopes.
    #[serde(rename = "IpScope", default)]
    pub ip_scope: Vec<IpScope>,
}

/// `<IpScope>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpScope {
    /// Inherited from the parent network.
    #[serde(rename = "IsInherited", default)]
    pub is_inherited: bool,
    /// Gateway address.
    #[serde(rename = "Gateway", default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Netmask.
    #[serde(rename = "Netmask", default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    /// Primary DNS.
    #[serde(rename = "Dns1", default, skip_serializing_if = "Option::is_none")]
    pub dns1: Option<String>,
    /// Secondary DNS.
    #[serde(rename = "Dns2", default, skip_serializing_if = "Option::is_none")]
    pub dns2: Option<String>,
    /// DNS suffix.
    #[serde(rename = "DnsSuffix", default, skip_serializing_if = "Option::is_none")]
    pub dns_suffix: Option<String>,
    /// Static IP pool.
    #[serde(rename = "IpRanges", default, skip_serializing_if = "Option::is_none")]
    pub ip_ranges: Option<IpRanges>,
}

/// `<IpRanges>` container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRanges {
    /// Ranges.
    #[serde(rename = "IpRange", default)]
    pub ip_range: Vec<IpRange>,
}

/// `<IpRange>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    /// First address.
    #[serde(rename = "StartAddress", default)]
    pub start_address: String,
    /// Last address.
    #[serde(rename = "EndAddress", default)]
    pub end_address: String,
}

/// Body for creating an org VDC network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "OrgVdcNetwork")]
pub struct OrgVdcNetworkParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// Network name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// IP scopes and fence mode.
    #[serde(rename = "Configuration")]
    pub configuration: NetworkConfiguration,
    /// Edge gateway for routed networks.
    #[serde(rename = "EdgeGateway", skip_serializing_if = "Option::is_none")]
    pub edge_gateway: Option<Reference>,
    /// Shared with other VDCs of the org.
    #[serde(rename = "IsShared", skip_serializing_if = "Option::is_none")]
    pub is_shared: Option<bool>,
}

// ============================================================================
// vApps and VMs
// ============================================================================

/// `<VApp>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VAppRecord {
    /// vApp URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// vApp URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// vApp name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Numeric status (4 = powered on, 8 = powered off).
    #[serde(rename = "@status", default)]
    pub status: Option<i32>,
    /// Whether the vApp is deployed.
    #[serde(rename = "@deployed", default)]
    pub deployed: Option<bool>,
    /// Links (power, undeploy, remove).
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    /// Pending tasks.
    #[serde(rename = "Tasks", default)]
    pub tasks: Option<TasksInProgress>,
    /// VMs.
    #[serde(rename = "Children", default)]
    pub children: Option<VAppChildren>,
}

/// `<Children>` of a vApp.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VAppChildren {
    /// VMs.
    #[serde(rename = "Vm", default)]
    pub vm: Vec<VmRecord>,
}

/// `<Vm>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VmRecord {
    /// VM URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// VM URN.
    #[serde(rename = "@id", default)]
    pub id: String,
    /// VM name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Numeric status.
    #[serde(rename = "@status", default)]
    pub status: Option<i32>,
    /// Whether the VM is deployed.
    #[serde(rename = "@deployed", default)]
    pub deployed: Option<bool>,
    /// Links.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Description.
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
}

/// Body for composing an empty vApp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "ComposeVAppParams")]
pub struct ComposeVAppParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// OVF namespace.
    #[serde(rename = "@xmlns:ovf")]
    pub ovf: String,
    /// XSI namespace.
    #[serde(rename = "@xmlns:xsi")]
    pub xsi: String,
    /// vApp name.
    #[serde(rename = "@name")]
    pub name: String,
    /// Deploy after composition.
    #[serde(rename = "@deploy")]
    pub deploy: bool,
    /// Power on after composition.
    #[serde(rename = "@powerOn")]
    pub power_on: bool,
    /// Description.
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body for undeploying a vApp.
#[derive(Debug, Clone, Serialize)]
#[serde(rename = "UndeployVAppParams")]
pub struct UndeployVAppParams {
    /// Namespace.
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// `powerOff`, `suspend`, `shutdown` or `force`.
    #[serde(rename = "UndeployPowerAction")]
    pub undeploy_power_action: String,
}

// ============================================================================
// Queries
// ============================================================================

/// `<QueryResultRecords>` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResultRecords {
    /// Total number of records.
    #[serde(rename = "@total", default)]
    pub total: Option<i64>,
    /// Paging links.
    #[serde(rename = "Link", default)]
    pub links: Vec<Link>,
    /// Records of an `orgVdcStorageProfile` query.
    #[serde(rename = "OrgVdcStorageProfileRecord", default)]
    pub org_vdc_storage_profile_record: Vec<StorageProfileRecord>,
    /// Records of an `edgeGateway` query.
    #[serde(rename = "EdgeGatewayRecord", default)]
    pub edge_gateway_record: Vec<EdgeGatewayRecord>,
}

/// `<OrgVdcStorageProfileRecord>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageProfileRecord {
    /// Profile URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Profile name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// VDC the profile belongs to.
    #[serde(rename = "@vdcName", default)]
    pub vdc_name: String,
    /// Whether it is the VDC default.
    #[serde(rename = "@isDefaultStorageProfile", default)]
    pub is_default_storage_profile: Option<bool>,
}

/// `<EdgeGatewayRecord>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeGatewayRecord {
    /// Gateway URL.
    #[serde(rename = "@href", default)]
    pub href: String,
    /// Gateway name.
    #[serde(rename = "@name", default)]
    pub name: String,
}

// ============================================================================
// Helpers
// ============================================================================

/// Decode an XML document.
///
/// # Errors
///
/// Returns [`VcdError::Xml`] if the body does not match `T`.
pub fn from_xml<T: DeserializeOwned>(body: &str) -> Result<T, VcdError> {
    quick_xml::de::from_str(body).map_err(|e| VcdError::Xml(e.to_string()))
}

/// Encode a request payload, XML declaration included.
///
/// # Errors
///
/// Returns [`VcdError::Xml`] if the value cannot be serialized.
pub fn to_xml<T: Serialize>(value: &T) -> Result<String, VcdError> {
    let body = quick_xml::se::to_string(value).map_err(|e| VcdError::Xml(e.to_string()))?;
    Ok(format!("{XML_HEADER}{body}"))
}

/// Parse an absolute href.
///
/// # Errors
///
/// Returns [`VcdError::Url`] if `href` is not an absolute URL.
pub fn parse_href(href: &str) -> Result<Url, VcdError> {
    Url::parse(href).map_err(|e| VcdError::Url {
        href: href.to_string(),
        reason: e.to_string(),
    })
}

/// Extract the trailing id from a URN.
///
/// `urn:vcloud:catalog:39867ab4-04e0-4b13-b468-08abcc1de810` yields
/// `39867ab4-04e0-4b13-b468-08abcc1de810`.
#[must_use]
pub fn extract_id(urn: &str) -> &str {
    urn.rsplit(':').next().unwrap_or(urn)
}
