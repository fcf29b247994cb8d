//! Organizations.
//!
//! [`Org`] is the tenant view used for navigation (catalogs, VDCs).
//! [`AdminOrg`] is the admin view used to create catalogs.

use reqwest::Method;

use crate::vcd_catalog::{AdminCatalog, Catalog};
use crate::vcd_client::{VcdClient, VcdError};
use crate::vcd_task::Task;
use crate::vcd_types::{
    AdminCatalogParams, AdminOrgRecord, CatalogRecord, LinkList, MIME_ADMIN_CATALOG, MIME_CATALOG,
    MIME_TASK, MIME_VDC, NS_VCLOUD, OrgRecord, REL_ADD, REL_DOWN, Reference, ReferenceList,
    VdcRecord, parse_href, tasks_of, to_xml,
};
use crate::vcd_vdc::Vdc;

/// Tenant view of an organization.
#[derive(Debug, Clone)]
pub struct Org {
    client: VcdClient,
    record: OrgRecord,
}

impl Org {
    /// Wrap an org document.
    #[must_use]
    pub const fn new(client: VcdClient, record: OrgRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched org document.
    #[must_use]
    pub const fn record(&self) -> &OrgRecord {
        &self.record
    }

    /// Re-fetch the org document.
    ///
    /// # Errors
    ///
    /// Returns an error if the org has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, org is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Names of the catalogs linked from the org.
    #[must_use]
    pub fn catalog_names(&self) -> Vec<String> {
        self.linked_names(MIME_CATALOG)
    }

    /// Names of the VDCs linked from the org.
    #[must_use]
    pub fn vdc_names(&self) -> Vec<String> {
        self.linked_names(MIME_VDC)
    }

    /// Fetch a catalog by name.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the org has no such catalog.
    pub async fn find_catalog(&self, name: &str) -> Result<Catalog, VcdError> {
        let link = self
            .record
            .links
            .for_name(name, MIME_CATALOG, REL_DOWN)
            .ok_or_else(|| VcdError::NotFound {
                kind: "catalog",
                name: name.to_string(),
            })?;
        let record: CatalogRecord = self.client.get_xml(parse_href(&link.href)?).await?;
        Ok(Catalog::new(self.client.clone(), record))
    }

    /// Fetch a VDC by name.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the org has no such VDC.
    pub async fn find_vdc(&self, name: &str) -> Result<Vdc, VcdError> {
        let link = self
            .record
            .links
            .for_name(name, MIME_VDC, REL_DOWN)
            .ok_or_else(|| VcdError::NotFound {
                kind: "vdc",
                name: name.to_string(),
            })?;
        let record: VdcRecord = self.client.get_xml(parse_href(&link.href)?).await?;
        Ok(Vdc::new(self.client.clone(), record))
    }

    fn linked_names(&self, mime: &str) -> Vec<String> {
        self.record
            .links
            .iter()
            .filter(|l| l.link_type == mime && l.rel == REL_DOWN)
            .map(|l| l.name.clone())
            .collect()
    }
}

/// Admin view of an organization.
#[derive(Debug, Clone)]
pub struct AdminOrg {
    client: VcdClient,
    record: AdminOrgRecord,
}

impl AdminOrg {
    /// Wrap an admin org document.
    #[must_use]
    pub const fn new(client: VcdClient, record: AdminOrgRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched admin org document.
    #[must_use]
    pub const fn record(&self) -> &AdminOrgRecord {
        &self.record
    }

    /// Re-fetch the admin org document.
    ///
    /// # Errors
    ///
    /// Returns an error if the admin org has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, admin org is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Catalog references listed by the admin org.
    #[must_use]
    pub fn catalogs(&self) -> &[Reference] {
        self.record
            .catalogs
            .as_ref()
            .map_or(&[], |c| c.catalog.as_slice())
    }

    /// Fetch the admin view of a catalog by name.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the org lists no such catalog.
    pub async fn find_admin_catalog(&self, name: &str) -> Result<AdminCatalog, VcdError> {
        let reference = self.catalogs().for_name(name).ok_or_else(|| VcdError::NotFound {
            kind: "catalog",
            name: name.to_string(),
        })?;
        let record: CatalogRecord = self.client.get_xml(parse_href(&reference.href)?).await?;
        Ok(AdminCatalog::new(self.client.clone(), record))
    }

    /// Create a catalog and return its creation task.
    ///
    /// # Errors
    ///
    /// Returns an error if the POST fails or the response carries no task.
    pub async fn create_catalog(&self, name: &str, description: &str) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_ADMIN_CATALOG, REL_ADD)?;
        let body = to_xml(&AdminCatalogParams {
            xmlns: NS_VCLOUD.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_published: None,
        })?;

        let catalog: CatalogRecord = self
            .client
            .send_xml(Method::POST, url, Some(MIME_ADMIN_CATALOG), Some(body))
            .await?;

        tasks_of(catalog.tasks.as_ref())
            .iter()
            .find(|t| t.task_type == MIME_TASK)
            .map(|t| Task::from_record(self.client.clone(), t.clone()))
            .ok_or_else(|| VcdError::NotFound {
                kind: "catalog creation task",
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin_org_xml, connect, mount_get, mount_login, org_xml, vdc_xml};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn finds_catalogs_and_vdcs_by_name() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &["images"])).await;
        mount_get(&server, "/api/vdc/2", vdc_xml(&uri, &[])).await;
        mount_get(
            &server,
            "/api/catalog/0",
            format!(r#"<Catalog name="images" href="{uri}/api/catalog/0"/>"#),
        )
        .await;

        let client = connect(&server).await;
        let org = client.get_org().await.unwrap();
        assert_eq!(org.catalog_names(), ["images"]);
        assert_eq!(org.vdc_names(), ["vdc-1"]);

        let catalog = org.find_catalog("images").await.unwrap();
        assert_eq!(catalog.record().name, "images");

        let vdc = org.find_vdc("vdc-1").await.unwrap();
        assert_eq!(vdc.record().name, "vdc-1");

        assert!(org.find_catalog("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn create_catalog_returns_embedded_task() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &[])).await;
        mount_get(&server, "/api/admin/org/1", admin_org_xml(&uri, &[])).await;

        Mock::given(method("POST"))
            .and(path("/api/admin/org/1/catalogs"))
            .and(header("content-type", MIME_ADMIN_CATALOG))
            .and(body_string_contains(r#"name="images""#))
            .and(body_string_contains("<Description>ISO files</Description>"))
            .respond_with(ResponseTemplate::new(201).set_body_string(format!(
                r#"<AdminCatalog name="images" href="{uri}/api/admin/catalog/9">
                    <Tasks>
                        <Task type="application/vnd.vmware.vcloud.task+xml" name="catalogCreateCatalog" status="running" href="{uri}/api/task/1"/>
                    </Tasks>
                </AdminCatalog>"#
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let admin = client.get_admin_org().await.unwrap();
        let task = admin.create_catalog("images", "ISO files").await.unwrap();
        assert_eq!(task.record().name, "catalogCreateCatalog");
    }

    #[tokio::test]
    async fn create_catalog_without_task_fails() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &[])).await;
        mount_get(&server, "/api/admin/org/1", admin_org_xml(&uri, &[])).await;

        Mock::given(method("POST"))
            .and(path("/api/admin/org/1/catalogs"))
            .respond_with(ResponseTemplate::new(201).set_body_string(format!(
                r#"<AdminCatalog name="images" href="{uri}/api/admin/catalog/9"/>"#
            )))
            .mount(&server)
            .await;

        let client = connect(&server).await;
        let admin = client.get_admin_org().await.unwrap();
        let err = admin.create_catalog("images", "").await.unwrap_err();
        assert!(matches!(err, VcdError::NotFound { kind: "catalog creation task", .. }));
    }

    #[tokio::test]
    async fn admin_catalog_lookup_uses_catalog_references() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &[])).await;
        mount_get(&server, "/api/admin/org/1", admin_org_xml(&uri, &["images", "templates"])).await;
        mount_get(
            &server,
            "/api/admin/catalog/1",
            format!(r#"<AdminCatalog name="templates" href="{uri}/api/admin/catalog/1"><IsPublished>true</IsPublished></AdminCatalog>"#),
        )
        .await;

        let client = connect(&server).await;
        let admin = client.get_admin_org().await.unwrap();
        assert_eq!(admin.catalogs().len(), 2);

        let catalog = admin.find_admin_catalog("templates").await.unwrap();
        assert_eq!(catalog.record().is_published, Some(true));
        assert!(admin.find_admin_catalog("nope").await.is_err());
    }
}
