//! Mock vCD endpoints shared by the unit tests.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::vcd_client::{AUTH_HEADER, VcdClient, VcdClientConfig};

pub const TOKEN: &str = "secret-token";

/// Configuration pointing at the mock server, with fast polling.
pub fn test_config(server: &MockServer) -> VcdClientConfig {
    let mut cfg = VcdClientConfig::new(
        format!("{}/api", server.uri()),
        "admin",
        "password",
        "acme",
        "vdc-1",
    );
    cfg.task_poll_interval_ms = 5;
    cfg.busy_retry_delay_ms = 5;
    cfg.max_retry_timeout_secs = 5;
    cfg
}

/// Mount `/api/versions` and `/api/sessions`.
pub async fn mount_login(server: &MockServer) {
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/api/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<SupportedVersions xmlns="http://www.vmware.com/vcloud/versions">
                <VersionInfo deprecated="false"><Version>5.5</Version><LoginUrl>{uri}/api/old-sessions</LoginUrl></VersionInfo>
                <VersionInfo deprecated="false"><Version>5.6</Version><LoginUrl>{uri}/api/sessions</LoginUrl></VersionInfo>
            </SupportedVersions>"#
        )))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(AUTH_HEADER, TOKEN)
                .set_body_string(format!(
                    r#"<Session user="admin" org="acme" href="{uri}/api/session">
                        <Link rel="down" type="application/vnd.vmware.vcloud.org+xml" name="acme" href="{uri}/api/org/1"/>
                        <Link rel="down" type="application/vnd.vmware.vcloud.query.queryList+xml" href="{uri}/api/query"/>
                        <Link rel="remove" href="{uri}/api/session"/>
                    </Session>"#
                )),
        )
        .mount(server)
        .await;
}

/// Log into the mock server.
pub async fn connect(server: &MockServer) -> VcdClient {
    VcdClient::connect(test_config(server)).await.unwrap()
}

/// Mount a GET returning `body` with status 200.
pub async fn mount_get(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// `<Task>` document with the given status, served at `/api/task/{id}`.
pub fn task_xml(uri: &str, id: &str, status: &str) -> String {
    format!(
        r#"<Task name="task" status="{status}" operation="Doing {id}" href="{uri}/api/task/{id}">
            <Link rel="task:cancel" href="{uri}/api/task/{id}/action/cancel"/>
        </Task>"#
    )
}

/// `<Org>` document linking to `vdc-1` and the admin view.
pub fn org_xml(uri: &str, catalogs: &[&str]) -> String {
    let catalog_links: String = catalogs
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<Link rel="down" type="application/vnd.vmware.vcloud.catalog+xml" name="{name}" href="{uri}/api/catalog/{i}"/>"#
            )
        })
        .collect();

    format!(
        r#"<Org name="acme" href="{uri}/api/org/1" id="urn:vcloud:org:1">
            {catalog_links}
            <Link rel="down" type="application/vnd.vmware.vcloud.vdc+xml" name="vdc-1" href="{uri}/api/vdc/2"/>
            <Link rel="alternate" type="application/vnd.vmware.admin.organization+xml" href="{uri}/api/admin/org/1"/>
            <Description>Acme org</Description>
            <FullName>Acme Corporation</FullName>
        </Org>"#
    )
}

/// `<AdminOrg>` document listing the given catalogs.
pub fn admin_org_xml(uri: &str, catalogs: &[&str]) -> String {
    let refs: String = catalogs
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<CatalogReference type="application/vnd.vmware.admin.catalog+xml" name="{name}" href="{uri}/api/admin/catalog/{i}"/>"#
            )
        })
        .collect();

    format!(
        r#"<AdminOrg name="acme" href="{uri}/api/admin/org/1">
            <Link rel="add" type="application/vnd.vmware.admin.catalog+xml" href="{uri}/api/admin/org/1/catalogs"/>
            <Catalogs>{refs}</Catalogs>
            <Vdcs><Vdc type="application/vnd.vmware.vcloud.vdc+xml" name="vdc-1" href="{uri}/api/vdc/2"/></Vdcs>
        </AdminOrg>"#
    )
}

/// `<Vdc>` document with the given `(mime, name, href path)` resource entities.
pub fn vdc_xml(uri: &str, entities: &[(&str, &str, &str)]) -> String {
    let entities: String = entities
        .iter()
        .map(|(mime, name, at)| {
            format!(r#"<ResourceEntity type="{mime}" name="{name}" href="{uri}{at}"/>"#)
        })
        .collect();

    format!(
        r#"<Vdc name="vdc-1" href="{uri}/api/vdc/2" id="urn:vcloud:vdc:2">
            <Link rel="up" type="application/vnd.vmware.vcloud.org+xml" href="{uri}/api/org/1"/>
            <Link rel="add" type="application/vnd.vmware.vcloud.diskCreateParams+xml" href="{uri}/api/vdc/2/disk"/>
            <Link rel="add" type="application/vnd.vmware.vcloud.orgVdcNetwork+xml" href="{uri}/api/admin/vdc/2/networks"/>
            <Link rel="add" type="application/vnd.vmware.vcloud.composeVAppParams+xml" href="{uri}/api/vdc/2/action/composeVApp"/>
            <Link rel="add" type="application/vnd.vmware.vcloud.instantiateVAppTemplateParams+xml" href="{uri}/api/vdc/2/action/instantiateVAppTemplate"/>
            <Link rel="edgeGateways" type="application/vnd.vmware.vcloud.query.records+xml" href="{uri}/api/admin/vdc/2/edgeGateways"/>
            <ResourceEntities>{entities}</ResourceEntities>
            <AvailableNetworks>
                <Network type="application/vnd.vmware.vcloud.network+xml" name="lan" href="{uri}/api/network/5"/>
            </AvailableNetworks>
            <VdcStorageProfiles>
                <VdcStorageProfile type="application/vnd.vmware.vcloud.vdcStorageProfile+xml" name="gold" href="{uri}/api/vdcStorageProfile/4"/>
            </VdcStorageProfiles>
        </Vdc>"#
    )
}
