//! Managed resources: catalogs, independent disks, org VDC networks, vApps.
//!
//! Every resource is identified by its name inside the org (catalogs) or the
//! VDC (everything else). Task-producing calls go through [`retry_call`]:
//! submitting is never retried, a failed task is.

use std::{future::Future, time::Duration};

use serde_json::{Value, json};

use crate::vcd_client::VcdError;
use crate::vcd_disk::{format_base2_bytes, parse_base2_bytes};
use crate::vcd_provider::{BoxFuture, ProviderError, ProviderResult, ResourceData, VcdProvider, VcdResource};
use crate::vcd_retry::{RetryError, retry_call};
use crate::vcd_schema::{Attribute, AttributeType, ResourceSchema};
use crate::vcd_task::{Task, wait_all_within};
use crate::vcd_types::{
    DiskParams, DiskRecord, IpRange, IpRanges, IpScope, IpScopes, NetworkConfiguration,
    OrgVdcNetworkParams, OrgVdcNetworkRecord,
};
use crate::vcd_vdc::Vdc;

/// Power action used when a vApp is switched off or removed.
pub const UNDEPLOY_POWER_ACTION: &str = "powerOff";

/// Fence modes accepted by `vcd_network`.
pub const FENCE_MODES: [&str; 3] = ["isolated", "natRouted", "bridged"];

const DEFAULT_FENCE_MODE: &str = "isolated";
const DEFAULT_NETMASK: &str = "255.255.255.0";

/// Submit a task-producing call and wait for the task, within `budget`.
///
/// A submit error stops immediately; a failed task re-runs the submit.
async fn submit_and_wait<F, Fut>(budget: Duration, mut submit: F) -> Result<(), VcdError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Task, VcdError>>,
{
    retry_call(budget, || {
        let submitted = submit();
        async move {
            let mut task = submitted.await.map_err(RetryError::NonRetryable)?;
            task.wait_task_completion()
                .await
                .map_err(RetryError::Retryable)
        }
    })
    .await
    .map_err(Into::into)
}

/// Turn "not found" into `None`, keep other errors.
fn found<T>(result: Result<T, VcdError>) -> Result<Option<T>, VcdError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// vcd_catalog
// ============================================================================

/// `vcd_catalog`: a catalog of the org.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogResource;

impl VcdResource for CatalogResource {
    fn name(&self) -> &'static str {
        "vcd_catalog"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(Attribute::new("name", AttributeType::String).required().force_new())
            .attribute(Attribute::new("description", AttributeType::String))
    }

    fn create<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let name = data.str_or_empty("name").to_string();
            let description = data.str_or_empty("description").to_string();

            {
                let mut org = provider.org().await;
                if found(org.find_catalog(&name).await)?.is_some() {
                    tracing::info!(catalog = %name, "catalog already exists, adopting it");
                } else {
                    let admin = provider.client().get_admin_org().await?;
                    submit_and_wait(provider.max_retry_timeout(), || {
                        admin.create_catalog(&name, &description)
                    })
                    .await?;

                    org.refresh().await?;
                    org.find_catalog(&name).await?;
                    tracing::info!(catalog = %name, "catalog created");
                }
            }

            data.id = name;
            self.read(provider, data).await
        })
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?.to_string();
            let mut org = provider.org().await;
            org.refresh().await?;

            let Some(catalog) = found(org.find_catalog(&id).await)? else {
                tracing::warn!(catalog = %id, "catalog does not exist, clearing id");
                data.clear_id();
                return Ok(data);
            };

            let record = catalog.record();
            data.set("name", record.name.as_str());
            data.set("description", record.description.clone().unwrap_or_default());
            Ok(data)
        })
    }

    fn update<'a>(
        &'a self,
        provider: &'a VcdProvider,
        _old: ResourceData,
        new: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = new.require_id(self.name())?;
            let admin = provider.client().get_admin_org().await?;
            let mut catalog = admin.find_admin_catalog(id).await?;
            catalog.set_description(new.str_or_empty("description"));
            catalog.update().await?;
            self.read(provider, new).await
        })
    }

    fn delete<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?;
            let client = provider.client();
            let catalog = client.get_admin_org().await?.find_admin_catalog(id).await?;
            catalog.delete(true, true).await?;

            retry_call(provider.max_retry_timeout(), || async move {
                let admin = client.get_admin_org().await.map_err(RetryError::Retryable)?;
                if admin.catalogs().iter().any(|c| c.name == id) {
                    Err(RetryError::Retryable(VcdError::StillExists {
                        kind: "catalog",
                        name: id.to_string(),
                    }))
                } else {
                    Ok(())
                }
            })
            .await?;

            tracing::info!(catalog = %id, "catalog deleted");
            Ok(())
        })
    }
}

// ============================================================================
// vcd_disk
// ============================================================================

/// `vcd_disk`: an independent disk of the VDC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskResource;

fn validate_disk_size(value: &Value) -> Result<(), String> {
    let size = value.as_str().unwrap_or_default();
    parse_base2_bytes(size).map(drop).map_err(|e| e.to_string())
}

impl DiskResource {
    /// Desired disk from attributes, with the storage profile resolved in `vdc`.
    fn desired(vdc: &Vdc, data: &ResourceData) -> ProviderResult<DiskParams> {
        let storage_profile = data
            .non_empty_str("storage_profile")
            .map(|name| vdc.find_storage_profile_reference(name))
            .transpose()?;

        Ok(DiskParams {
            name: data.str_or_empty("name").to_string(),
            size: parse_base2_bytes(data.str_or_empty("size"))?,
            iops: data.get_i64("iops"),
            bus_type: data.non_empty_str("bus_type").map(str::to_string),
            bus_sub_type: data.non_empty_str("bus_sub_type").map(str::to_string),
            description: data.non_empty_str("description").map(str::to_string),
            storage_profile,
        })
    }
}

impl VcdResource for DiskResource {
    fn name(&self) -> &'static str {
        "vcd_disk"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(Attribute::new("name", AttributeType::String).required().force_new())
            .attribute(Attribute::new("description", AttributeType::String))
            .attribute(
                Attribute::new("size", AttributeType::String)
                    .required()
                    .with_validator(validate_disk_size)
                    .with_description("base-2 size such as 512MB, 1GB or 1GB512MB"),
            )
            .attribute(Attribute::new("iops", AttributeType::Int))
            .attribute(Attribute::new("bus_type", AttributeType::String).optional_computed())
            .attribute(Attribute::new("bus_sub_type", AttributeType::String).optional_computed())
            .attribute(Attribute::new("storage_profile", AttributeType::String).optional_computed())
            .attribute(
                Attribute::new("attached_vm", AttributeType::String)
                    .computed()
                    .with_description("name of the VM the disk is attached to"),
            )
    }

    fn create<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let name = data.str_or_empty("name").to_string();
            {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                if found(vdc.find_disk_by_name(&name).await)?.is_some() {
                    return Err(ProviderError::Conflict { kind: "disk", name });
                }

                let params = Self::desired(&vdc, &data)?;
                tracing::info!(disk = %name, size = params.size, "creating disk");
                submit_and_wait(provider.max_retry_timeout(), || {
                    vdc.create_disk(params.clone())
                })
                .await?;
            }

            data.id = name;
            self.read(provider, data).await
        })
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?.to_string();
            let mut vdc = provider.vdc().await;
            vdc.refresh().await?;

            let Some(disk) = found(vdc.find_disk_by_name(&id).await)? else {
                tracing::warn!(disk = %id, "disk does not exist, clearing id");
                data.clear_id();
                return Ok(data);
            };
            drop(vdc);

            let attached_vm = match disk.attached_vm().await {
                Ok(vm) => vm.map(|r| r.name),
                Err(VcdError::LinkNotFound { .. }) => None,
                Err(e) => return Err(e.into()),
            };

            let record = disk.record();
            let size = data
                .get_str("size")
                .filter(|s| parse_base2_bytes(s).ok() == Some(record.size))
                .map_or_else(|| format_base2_bytes(record.size), str::to_string);

            data.set("name", record.name.as_str());
            data.set("description", record.description.clone().unwrap_or_default());
            data.set("size", size);
            data.set_opt("iops", record.iops);
            data.set("bus_type", record.bus_type.as_str());
            data.set("bus_sub_type", record.bus_sub_type.as_str());
            data.set_opt("storage_profile", record.storage_profile.as_ref().map(|p| p.name.as_str()));
            data.set_opt("attached_vm", attached_vm);
            Ok(data)
        })
    }

    fn update<'a>(
        &'a self,
        provider: &'a VcdProvider,
        _old: ResourceData,
        new: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = new.require_id(self.name())?.to_string();
            {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                let disk = found(vdc.find_disk_by_name(&id).await)?.ok_or_else(|| {
                    ProviderError::Gone {
                        kind: "disk",
                        id: id.clone(),
                    }
                })?;

                let params = Self::desired(&vdc, &new)?;
                let desired = DiskRecord {
                    name: params.name,
                    size: params.size,
                    description: params.description,
                    storage_profile: params.storage_profile,
                    ..DiskRecord::default()
                };
                drop(vdc);

                tracing::info!(disk = %id, size = desired.size, "updating disk");
                submit_and_wait(provider.max_retry_timeout(), || disk.update(&desired)).await?;
            }
            self.read(provider, new).await
        })
    }

    fn delete<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?;
            let disk = {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                found(vdc.find_disk_by_name(id).await)?.ok_or_else(|| ProviderError::Gone {
                    kind: "disk",
                    id: id.to_string(),
                })?
            };

            submit_and_wait(provider.max_retry_timeout(), || disk.delete()).await?;
            tracing::info!(disk = %id, "disk deleted");
            Ok(())
        })
    }
}

// ============================================================================
// vcd_network
// ============================================================================

/// `vcd_network`: an org VDC network. Every attribute forces replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkResource;

fn validate_fence_mode(value: &Value) -> Result<(), String> {
    let mode = value.as_str().unwrap_or_default();
    if FENCE_MODES.contains(&mode) {
        Ok(())
    } else {
        Err(format!("expected one of {}, got '{mode}'", FENCE_MODES.join(", ")))
    }
}

fn validate_ip_pool(value: &Value) -> Result<(), String> {
    let ranges = value.as_array().map_or(&[][..], Vec::as_slice);
    for (i, range) in ranges.iter().enumerate() {
        for key in ["start_address", "end_address"] {
            if range.get(key).and_then(Value::as_str).is_none_or(str::is_empty) {
                return Err(format!("range {i} needs a string '{key}'"));
            }
        }
    }
    Ok(())
}

impl NetworkResource {
    fn ip_scope(data: &ResourceData) -> IpScope {
        let ip_range: Vec<IpRange> = data
            .get_list("static_ip_pool")
            .iter()
            .map(|r| IpRange {
                start_address: r["start_address"].as_str().unwrap_or_default().to_string(),
                end_address: r["end_address"].as_str().unwrap_or_default().to_string(),
            })
            .collect();
        let owned = |name: &str| data.non_empty_str(name).map(str::to_string);

        IpScope {
            is_inherited: false,
            gateway: owned("gateway"),
            netmask: Some(owned("netmask").unwrap_or_else(|| DEFAULT_NETMASK.to_string())),
            dns1: owned("dns1"),
            dns2: owned("dns2"),
            dns_suffix: owned("dns_suffix"),
            ip_ranges: (!ip_range.is_empty()).then_some(IpRanges { ip_range }),
        }
    }

    fn fill(data: &mut ResourceData, record: &OrgVdcNetworkRecord) {
        data.set("name", record.name.as_str());
        data.set("description", record.description.clone().unwrap_or_default());
        data.set("shared", record.is_shared.unwrap_or(false));
        data.set_opt("edge_gateway", record.edge_gateway.as_ref().map(|g| g.name.as_str()));

        let Some(config) = &record.configuration else {
            return;
        };
        data.set("fence_mode", config.fence_mode.as_str());

        let scope = config
            .ip_scopes
            .as_ref()
            .and_then(|s| s.ip_scope.first());
        if let Some(scope) = scope {
            data.set_opt("gateway", scope.gateway.clone());
            data.set_opt("netmask", scope.netmask.clone());
            data.set_opt("dns1", scope.dns1.clone());
            data.set_opt("dns2", scope.dns2.clone());
            data.set_opt("dns_suffix", scope.dns_suffix.clone());
            let pool: Vec<Value> = scope
                .ip_ranges
                .iter()
                .flat_map(|r| r.ip_range.iter())
                .map(|r| json!({"start_address": r.start_address, "end_address": r.end_address}))
                .collect();
            data.set("static_ip_pool", pool);
        }
    }
}

impl VcdResource for NetworkResource {
    fn name(&self) -> &'static str {
        "vcd_network"
    }

    fn schema(&self) -> ResourceSchema {
        let string = |name| Attribute::new(name, AttributeType::String).force_new();
        ResourceSchema::new(self.name())
            .attribute(string("name").required())
            .attribute(string("description"))
            .attribute(
                string("fence_mode")
                    .optional_computed()
                    .with_validator(validate_fence_mode)
                    .with_description("isolated (default), natRouted or bridged"),
            )
            .attribute(string("edge_gateway").with_description("required for natRouted"))
            .attribute(string("gateway"))
            .attribute(string("netmask").optional_computed())
            .attribute(string("dns1"))
            .attribute(string("dns2"))
            .attribute(string("dns_suffix"))
            .attribute(
                Attribute::new("static_ip_pool", AttributeType::List)
                    .force_new()
                    .with_validator(validate_ip_pool)
                    .with_description("list of {start_address, end_address}"),
            )
            .attribute(Attribute::new("shared", AttributeType::Bool).force_new())
    }

    fn create<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let name = data.str_or_empty("name").to_string();
            let fence_mode = data
                .non_empty_str("fence_mode")
                .unwrap_or(DEFAULT_FENCE_MODE)
                .to_string();

            {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                if found(vdc.find_vdc_network(&name).await)?.is_some() {
                    return Err(ProviderError::Conflict { kind: "network", name });
                }

                let edge_gateway = match data.non_empty_str("edge_gateway") {
                    Some(gateway) => Some(vdc.find_edge_gateway(gateway).await?),
                    None if fence_mode == "natRouted" => {
                        return Err(VcdError::InvalidArgument(
                            "a natRouted network needs an edge_gateway".to_string(),
                        )
                        .into());
                    }
                    None => None,
                };

                let params = OrgVdcNetworkParams {
                    xmlns: String::new(),
                    name: name.clone(),
                    description: data.non_empty_str("description").map(str::to_string),
                    configuration: NetworkConfiguration {
                        ip_scopes: Some(IpScopes {
                            ip_scope: vec![Self::ip_scope(&data)],
                        }),
                        fence_mode,
                    },
                    edge_gateway,
                    is_shared: Some(data.get_bool("shared").unwrap_or(false)),
                };

                tracing::info!(network = %name, "creating network");
                vdc.create_org_vdc_network(params).await?;
                vdc.refresh().await?;
            }

            data.id = name;
            self.read(provider, data).await
        })
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?.to_string();
            let mut vdc = provider.vdc().await;
            vdc.refresh().await?;

            match found(vdc.find_vdc_network(&id).await)? {
                Some(network) => Self::fill(&mut data, network.record()),
                None => {
                    tracing::warn!(network = %id, "network does not exist, clearing id");
                    data.clear_id();
                }
            }
            Ok(data)
        })
    }

    fn update<'a>(
        &'a self,
        provider: &'a VcdProvider,
        _old: ResourceData,
        new: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        // Nothing is mutable in place; a real change was refused as a replacement.
        self.read(provider, new)
    }

    fn delete<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?;
            let mut network = {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                found(vdc.find_vdc_network(id).await)?.ok_or_else(|| ProviderError::Gone {
                    kind: "network",
                    id: id.to_string(),
                })?
            };

            let task = network.delete().await?;
            wait_all_within(provider.max_retry_timeout(), [task]).await?;

            tracing::info!(network = %id, "network deleted");
            Ok(())
        })
    }
}

// ============================================================================
// vcd_vapp
// ============================================================================

/// `vcd_vapp`: an empty vApp, optionally powered on.
#[derive(Debug, Clone, Copy, Default)]
pub struct VAppResource;

impl VcdResource for VAppResource {
    fn name(&self) -> &'static str {
        "vcd_vapp"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(Attribute::new("name", AttributeType::String).required().force_new())
            .attribute(Attribute::new("description", AttributeType::String).force_new())
            .attribute(Attribute::new("power_on", AttributeType::Bool))
            .attribute(Attribute::new("status", AttributeType::String).computed())
            .attribute(Attribute::new("vm_names", AttributeType::List).computed())
    }

    fn create<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let name = data.str_or_empty("name").to_string();
            {
                let mut vdc = provider.vdc().await;
                if found(vdc.find_vapp_by_name(&name).await)?.is_some() {
                    return Err(ProviderError::Conflict { kind: "vApp", name });
                }

                tracing::info!(vapp = %name, "composing vApp");
                vdc.compose_raw_vapp(&name, data.non_empty_str("description"))
                    .await?;

                if data.get_bool("power_on").unwrap_or(false) {
                    let vapp = vdc.find_vapp_by_name(&name).await?;
                    submit_and_wait(provider.max_retry_timeout(), || vapp.power_on()).await?;
                }
            }

            data.id = name;
            self.read(provider, data).await
        })
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?.to_string();
            let mut vdc = provider.vdc().await;

            let Some(vapp) = found(vdc.find_vapp_by_name(&id).await)? else {
                tracing::warn!(vapp = %id, "vApp does not exist, clearing id");
                data.clear_id();
                return Ok(data);
            };

            let record = vapp.record();
            data.set("name", record.name.as_str());
            data.set("description", record.description.clone().unwrap_or_default());
            data.set("status", vapp.status());
            data.set("power_on", vapp.status() == "POWERED_ON");
            data.set("vm_names", vapp.vm_names());
            Ok(data)
        })
    }

    fn update<'a>(
        &'a self,
        provider: &'a VcdProvider,
        old: ResourceData,
        new: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let id = new.require_id(self.name())?.to_string();
            let was_on = old.get_bool("power_on").unwrap_or(false);
            let want_on = new.get_bool("power_on").unwrap_or(false);

            if was_on != want_on {
                let vapp = provider.vdc().await.find_vapp_by_name(&id).await?;
                let budget = provider.max_retry_timeout();
                if want_on {
                    tracing::info!(vapp = %id, "powering vApp on");
                    submit_and_wait(budget, || vapp.power_on()).await?;
                } else {
                    tracing::info!(vapp = %id, "powering vApp off");
                    submit_and_wait(budget, || vapp.undeploy(UNDEPLOY_POWER_ACTION)).await?;
                }
            }
            self.read(provider, new).await
        })
    }

    fn delete<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move {
            let id = data.require_id(self.name())?;
            let vapp = found(provider.vdc().await.find_vapp_by_name(id).await)?.ok_or_else(|| {
                ProviderError::Gone {
                    kind: "vApp",
                    id: id.to_string(),
                }
            })?;

            let budget = provider.max_retry_timeout();
            if vapp.is_deployed() {
                tracing::info!(vapp = %id, "undeploying vApp");
                submit_and_wait(budget, || vapp.undeploy(UNDEPLOY_POWER_ACTION)).await?;
            }
            submit_and_wait(budget, || vapp.delete()).await?;

            tracing::info!(vapp = %id, "vApp deleted");
            Ok(())
        })
    }
}
