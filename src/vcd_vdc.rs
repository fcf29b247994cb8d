//! Virtual datacenters, vApps and VMs.
//!
//! [`Vdc`] is the entry point for everything that lives in a VDC:
//! - vApps and VMs (this module)
//! - independent disks ([`crate::vcd_disk`])
//! - org VDC networks ([`crate::vcd_network`])

use reqwest::Method;

use crate::vcd_client::{VcdClient, VcdError};
use crate::vcd_org::Org;
use crate::vcd_task::{Task, wait_all_within};
use crate::vcd_types::{
    ComposeVAppParams, InstantiateVAppTemplateParams, LinkList, MIME_COMPOSE_VAPP_PARAMS,
    MIME_EDGE_GATEWAY, MIME_EMPTY, MIME_INSTANTIATE_VAPP_TEMPLATE, MIME_ORG, MIME_QUERY_RECORDS,
    MIME_UNDEPLOY_VAPP_PARAMS, MIME_VAPP, NS_OVF, NS_VCLOUD, NS_XSI, OrgRecord, OrgVdcNetworkRecord,
    QueryResultRecords, REL_ADD, REL_EDGE_GATEWAYS, REL_POWER_ON, REL_REMOVE, REL_UNDEPLOY, REL_UP,
    Reference, ReferenceList, UndeployVAppParams, VAppRecord, VdcRecord, VmRecord, parse_href,
    tasks_of, to_xml,
};
use crate::vcd_network::OrgVdcNetwork;

/// Virtual datacenter.
#[derive(Debug, Clone)]
pub struct Vdc {
    pub(crate) client: VcdClient,
    pub(crate) record: VdcRecord,
}

impl Vdc {
    /// Wrap a VDC document.
    #[must_use]
    pub const fn new(client: VcdClient, record: VdcRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched VDC document.
    #[must_use]
    pub const fn record(&self) -> &VdcRecord {
        &self.record
    }

    /// Re-fetch the VDC document.
    ///
    /// # Errors
    ///
    /// Returns an error if the VDC has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, vdc is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Resource entities of the given type.
    pub(crate) fn entities_of<'a>(&'a self, mime: &'a str) -> impl Iterator<Item = &'a Reference> {
        self.record
            .resource_entities
            .iter()
            .flat_map(|e| e.resource_entity.iter())
            .filter(move |r| r.ref_type == mime)
    }

    /// Fetch an org VDC network available in this VDC.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if no available network has that name.
    pub async fn find_vdc_network(&self, name: &str) -> Result<OrgVdcNetwork, VcdError> {
        let reference = self
            .record
            .available_networks
            .iter()
            .find_map(|n| n.network.for_name(name))
            .ok_or_else(|| VcdError::NotFound {
                kind: "network",
                name: name.to_string(),
            })?;
        let record: OrgVdcNetworkRecord = self.client.get_xml(parse_href(&reference.href)?).await?;
        Ok(OrgVdcNetwork::new(self.client.clone(), record))
    }

    /// Reference to a storage profile of this VDC.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the VDC has no such profile.
    pub fn find_storage_profile_reference(&self, name: &str) -> Result<Reference, VcdError> {
        self.record
            .vdc_storage_profiles
            .iter()
            .find_map(|p| p.vdc_storage_profile.for_name(name))
            .cloned()
            .ok_or_else(|| VcdError::NotFound {
                kind: "storage profile",
                name: name.to_string(),
            })
    }

    /// Fetch the org owning this VDC.
    ///
    /// # Errors
    ///
    /// Returns an error if the VDC has no parent link or the GET fails.
    pub async fn get_vdc_org(&self) -> Result<Org, VcdError> {
        let url = self.record.links.url_for_type(MIME_ORG, REL_UP)?;
        let record: OrgRecord = self.client.get_xml(url).await?;
        Ok(Org::new(self.client.clone(), record))
    }

    /// Reference to an edge gateway of this VDC.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if no gateway has that name.
    pub async fn find_edge_gateway(&self, name: &str) -> Result<Reference, VcdError> {
        let url = self
            .record
            .links
            .url_for_type(MIME_QUERY_RECORDS, REL_EDGE_GATEWAYS)?;
        let records: QueryResultRecords = self.client.get_xml(url).await?;

        records
            .edge_gateway_record
            .iter()
            .find(|r| r.name == name)
            .map(|r| Reference {
                href: r.href.clone(),
                ref_type: MIME_EDGE_GATEWAY.to_string(),
                name: r.name.clone(),
                ..Reference::default()
            })
            .ok_or_else(|| VcdError::NotFound {
                kind: "edge gateway",
                name: name.to_string(),
            })
    }

    /// Create an empty vApp and wait for it to be ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the POST fails, the creation task fails or it
    /// outlasts the retry budget.
    pub async fn compose_raw_vapp(&self, name: &str, description: Option<&str>) -> Result<(), VcdError> {
        let url = self.record.links.url_for_type(MIME_COMPOSE_VAPP_PARAMS, REL_ADD)?;
        let body = to_xml(&ComposeVAppParams {
            xmlns: NS_VCLOUD.to_string(),
            ovf: NS_OVF.to_string(),
            xsi: NS_XSI.to_string(),
            name: name.to_string(),
            deploy: false,
            power_on: false,
            description: description.map(str::to_string),
        })?;

        let vapp: VAppRecord = self
            .client
            .send_xml(Method::POST, url, Some(MIME_COMPOSE_VAPP_PARAMS), Some(body))
            .await?;
        self.wait_embedded(tasks_of(vapp.tasks.as_ref())).await
    }

    /// Instantiate a vApp template and wait for every resulting task.
    ///
    /// # Errors
    ///
    /// Returns an error if the POST fails, any task fails or the tasks
    /// outlast the retry budget.
    pub async fn instantiate_vapp_template(
        &self,
        mut params: InstantiateVAppTemplateParams,
    ) -> Result<(), VcdError> {
        let url = self
            .record
            .links
            .url_for_type(MIME_INSTANTIATE_VAPP_TEMPLATE, REL_ADD)?;
        params.xmlns = NS_VCLOUD.to_string();
        params.ovf = NS_OVF.to_string();
        let body = to_xml(&params)?;

        let vapp: VAppRecord = self
            .client
            .send_xml(Method::POST, url, Some(MIME_INSTANTIATE_VAPP_TEMPLATE), Some(body))
            .await?;
        self.wait_embedded(tasks_of(vapp.tasks.as_ref())).await
    }

    /// Fetch a vApp by name, refreshing the VDC first.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the VDC holds no such vApp.
    pub async fn find_vapp_by_name(&mut self, name: &str) -> Result<VApp, VcdError> {
        self.refresh().await?;

        let href = self
            .entities_of(MIME_VAPP)
            .find(|r| r.name == name)
            .map(|r| r.href.clone())
            .ok_or_else(|| VcdError::NotFound {
                kind: "vApp",
                name: name.to_string(),
            })?;
        self.get_vapp_by_href(&href).await
    }

    /// Fetch a VM of a vApp by name, refreshing the VDC and the vApp first.
    ///
    /// # Errors
    ///
    /// Returns an error if the vApp has no VMs or none has that name.
    pub async fn find_vm_by_name(&mut self, vapp: &mut VApp, name: &str) -> Result<Vm, VcdError> {
        self.refresh().await?;
        vapp.refresh().await?;

        let children = vapp.record.children.as_ref().ok_or_else(|| {
            VcdError::InvalidArgument(format!("vApp {} has no VMs", vapp.record.name))
        })?;

        tracing::trace!(vm = %name, vapp = %vapp.record.name, "looking for VM");
        let href = children
            .vm
            .iter()
            .find(|vm| vm.name == name)
            .map(|vm| vm.href.clone())
            .ok_or_else(|| VcdError::NotFound {
                kind: "vm",
                name: name.to_string(),
            })?;
        self.get_vm_by_href(&href).await
    }

    /// Fetch a VM by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the href is invalid or the GET fails.
    pub async fn get_vm_by_href(&self, href: &str) -> Result<Vm, VcdError> {
        let record: VmRecord = self.client.get_xml(parse_href(href)?).await?;
        Ok(Vm::new(self.client.clone(), record))
    }

    /// Fetch a vApp by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the href is invalid or the GET fails.
    pub async fn get_vapp_by_href(&self, href: &str) -> Result<VApp, VcdError> {
        let record: VAppRecord = self.client.get_xml(parse_href(href)?).await?;
        Ok(VApp::new(self.client.clone(), record))
    }

    /// Wait for tasks embedded in a response, within the retry budget.
    pub(crate) async fn wait_embedded(&self, tasks: &[crate::vcd_types::TaskRecord]) -> Result<(), VcdError> {
        wait_all_within(
            self.client.config().max_retry_timeout(),
            tasks
                .iter()
                .map(|t| Task::from_record(self.client.clone(), t.clone()))
                .collect::<Vec<_>>(),
        )
        .await
    }
}

/// vApp status codes as reported in the `status` attribute.
#[must_use]
pub const fn status_text(code: i32) -> &'static str {
    match code {
        -1 => "FAILED_CREATION",
        0 => "UNRESOLVED",
        1 => "RESOLVED",
        2 => "DEPLOYED",
        3 => "SUSPENDED",
        4 => "POWERED_ON",
        5 => "WAITING_FOR_INPUT",
        6 => "UNKNOWN",
        7 => "UNRECOGNIZED",
        8 => "POWERED_OFF",
        9 => "INCONSISTENT_STATE",
        10 => "MIXED",
        _ => "UNKNOWN",
    }
}

/// vApp.
#[derive(Debug, Clone)]
pub struct VApp {
    client: VcdClient,
    record: VAppRecord,
}

impl VApp {
    /// Wrap a vApp document.
    #[must_use]
    pub const fn new(client: VcdClient, record: VAppRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched vApp document.
    #[must_use]
    pub const fn record(&self) -> &VAppRecord {
        &self.record
    }

    /// Re-fetch the vApp document.
    ///
    /// # Errors
    ///
    /// Returns an error if the vApp has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, vApp is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Human readable status.
    #[must_use]
    pub fn status(&self) -> &'static str {
        self.record.status.map_or("UNKNOWN", status_text)
    }

    /// Whether the vApp is deployed.
    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.record.deployed.unwrap_or(false)
    }

    /// Names of the VMs in the vApp.
    #[must_use]
    pub fn vm_names(&self) -> Vec<String> {
        self.record
            .children
            .as_ref()
            .map(|c| c.vm.iter().map(|vm| vm.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Power the vApp on.
    ///
    /// # Errors
    ///
    /// Returns an error if the vApp cannot be powered on or the POST fails.
    pub async fn power_on(&self) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_POWER_ON)?;
        self.client
            .execute_task_request(Method::POST, url, None, None)
            .await
    }

    /// Undeploy the vApp with the given power action (`powerOff`, `shutdown`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the vApp cannot be undeployed or the POST fails.
    pub async fn undeploy(&self, power_action: &str) -> Result<Task, VcdError> {
        let url = self
            .record
            .links
            .url_for_type(MIME_UNDEPLOY_VAPP_PARAMS, REL_UNDEPLOY)?;
        let body = to_xml(&UndeployVAppParams {
            xmlns: NS_VCLOUD.to_string(),
            undeploy_power_action: power_action.to_string(),
        })?;
        self.client
            .execute_task_request(Method::POST, url, Some(MIME_UNDEPLOY_VAPP_PARAMS), Some(body))
            .await
    }

    /// Delete the vApp.
    ///
    /// # Errors
    ///
    /// Returns an error if the vApp has no remove link or the DELETE fails.
    pub async fn delete(&self) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_REMOVE)?;
        self.client
            .execute_task_request(Method::DELETE, url, None, None)
            .await
    }
}

/// Virtual machine inside a vApp.
#[derive(Debug, Clone)]
pub struct Vm {
    client: VcdClient,
    record: VmRecord,
}

impl Vm {
    /// Wrap a VM document.
    #[must_use]
    pub const fn new(client: VcdClient, record: VmRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched VM document.
    #[must_use]
    pub const fn record(&self) -> &VmRecord {
        &self.record
    }

    /// Human readable status.
    #[must_use]
    pub fn status(&self) -> &'static str {
        self.record.status.map_or("UNKNOWN", status_text)
    }

    /// Re-fetch the VM document.
    ///
    /// # Errors
    ///
    /// Returns an error if the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }
}
