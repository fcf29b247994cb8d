//! Read-only lookups.

use crate::vcd_client::VcdError;
use crate::vcd_provider::{BoxFuture, ProviderResult, ResourceData, VcdDataSource, VcdProvider};
use crate::vcd_schema::{Attribute, AttributeType, ResourceSchema};

/// `vcd_org`: the org the provider is logged into.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrgDataSource;

impl VcdDataSource for OrgDataSource {
    fn name(&self) -> &'static str {
        "vcd_org"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(
                Attribute::new("name", AttributeType::String)
                    .optional_computed()
                    .with_description("defaults to the configured org"),
            )
            .attribute(Attribute::new("full_name", AttributeType::String).computed())
            .attribute(Attribute::new("description", AttributeType::String).computed())
            .attribute(Attribute::new("catalogs", AttributeType::List).computed())
            .attribute(Attribute::new("vdcs", AttributeType::List).computed())
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let mut org = provider.org().await;
            org.refresh().await?;

            let record = org.record();
            if let Some(name) = data.non_empty_str("name")
                && name != record.name
            {
                return Err(VcdError::NotFound {
                    kind: "org",
                    name: name.to_string(),
                }
                .into());
            }

            data.id = if record.id.is_empty() {
                record.href.clone()
            } else {
                record.id.clone()
            };
            data.set("name", record.name.as_str());
            data.set("full_name", record.full_name.clone().unwrap_or_default());
            data.set("description", record.description.clone().unwrap_or_default());
            data.set("catalogs", org.catalog_names());
            data.set("vdcs", org.vdc_names());
            Ok(data)
        })
    }
}

/// `vcd_vm`: a VM looked up by vApp and VM name.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmDataSource;

impl VcdDataSource for VmDataSource {
    fn name(&self) -> &'static str {
        "vcd_vm"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(Attribute::new("vapp_name", AttributeType::String).required())
            .attribute(Attribute::new("name", AttributeType::String).required())
            .attribute(Attribute::new("href", AttributeType::String).computed())
            .attribute(Attribute::new("status", AttributeType::String).computed())
            .attribute(Attribute::new("deployed", AttributeType::Bool).computed())
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let vapp_name = data.str_or_empty("vapp_name").to_string();
            let vm_name = data.str_or_empty("name").to_string();

            let vm = {
                let mut vdc = provider.vdc().await;
                let mut vapp = vdc.find_vapp_by_name(&vapp_name).await?;
                vdc.find_vm_by_name(&mut vapp, &vm_name).await?
            };

            let record = vm.record();
            data.id.clone_from(&record.href);
            data.set("href", record.href.as_str());
            data.set("status", vm.status());
            data.set("deployed", record.deployed.unwrap_or(false));
            Ok(data)
        })
    }
}

/// `vcd_storage_profile`: the default storage profile of a VDC.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageProfileDataSource;

impl VcdDataSource for StorageProfileDataSource {
    fn name(&self) -> &'static str {
        "vcd_storage_profile"
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
            .attribute(
                Attribute::new("vdc", AttributeType::String)
                    .optional_computed()
                    .with_description("defaults to the configured VDC"),
            )
            .attribute(Attribute::new("name", AttributeType::String).computed())
            .attribute(Attribute::new("href", AttributeType::String).computed())
    }

    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        mut data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>> {
        Box::pin(async move {
            let configured = &provider.client().config().vdc;
            let vdc_name = data
                .non_empty_str("vdc")
                .unwrap_or(configured)
                .to_string();

            let name = provider
                .client()
                .find_default_storage_profile(&vdc_name)
                .await?;

            // Only the configured VDC document is at hand to resolve the href.
            let href = if &vdc_name == configured {
                let mut vdc = provider.vdc().await;
                vdc.refresh().await?;
                vdc.find_storage_profile_reference(&name).ok().map(|r| r.href)
            } else {
                None
            };

            data.id.clone_from(&name);
            data.set("vdc", vdc_name);
            data.set("name", name);
            data.set_opt("href", href);
            Ok(data)
        })
    }
}
