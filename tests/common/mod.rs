//! Mock vCD server for the provider lifecycle tests.

#![allow(dead_code)]

use serde_json::{Map, Value};
use vcd_provider::VcdClientConfig;
use vcd_provider::vcd_client::AUTH_HEADER;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn config(server: &MockServer) -> VcdClientConfig {
    let mut cfg = VcdClientConfig::new(
        format!("{}/api", server.uri()),
        "admin",
        "password",
        "acme",
        "vdc-1",
    );
    cfg.task_poll_interval_ms = 5;
    cfg.busy_retry_delay_ms = 5;
    cfg.max_retry_timeout_secs = 10;
    cfg
}

pub fn attrs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

/// Versions, login and session links.
pub async fn mount_login(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/api/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<SupportedVersions><VersionInfo><Version>5.6</Version><LoginUrl>{uri}/api/sessions</LoginUrl></VersionInfo></SupportedVersions>"#
        )))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(AUTH_HEADER, "token")
                .set_body_string(format!(
                    r#"<Session user="admin" org="acme">
                        <Link rel="down" type="application/vnd.vmware.vcloud.org+xml" name="acme" href="{uri}/api/org/1"/>
                        <Link rel="down" type="application/vnd.vmware.vcloud.query.queryList+xml" href="{uri}/api/query"/>
                        <Link rel="remove" href="{uri}/api/session"/>
                    </Session>"#
                )),
        )
        .mount(server)
        .await;
}

/// GET returning `body`; with `times`, only that many calls at top priority.
pub async fn mount_get(server: &MockServer, at: &str, body: String, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body));
    match times {
        Some(n) => mock.up_to_n_times(n).with_priority(1).mount(server).await,
        None => mock.mount(server).await,
    }
}

pub fn task_xml(uri: &str, id: &str, status: &str) -> String {
    format!(r#"<Task name="task-{id}" status="{status}" href="{uri}/api/task/{id}"/>"#)
}

pub fn org_xml(uri: &str, catalog: Option<&str>) -> String {
    let catalog = catalog.map_or_else(String::new, |name| {
        format!(
            r#"<Link rel="down" type="application/vnd.vmware.vcloud.catalog+xml" name="{name}" href="{uri}/api/catalog/0"/>"#
        )
    });
    format!(
        r#"<Org name="acme" href="{uri}/api/org/1">
            {catalog}
            <Link rel="down" type="application/vnd.vmware.vcloud.vdc+xml" name="vdc-1" href="{uri}/api/vdc/2"/>
            <Link rel="alternate" type="application/vnd.vmware.admin.organization+xml" href="{uri}/api/admin/org/1"/>
        </Org>"#
    )
}

pub fn vdc_xml(uri: &str, disk: Option<&str>) -> String {
    let disk = disk.map_or_else(String::new, |name| {
        format!(
            r#"<ResourceEntity type="application/vnd.vmware.vcloud.disk+xml" name="{name}" href="{uri}/api/disk/9"/>"#
        )
    });
    format!(
        r#"<Vdc name="vdc-1" href="{uri}/api/vdc/2">
            <Link rel="add" type="application/vnd.vmware.vcloud.diskCreateParams+xml" href="{uri}/api/vdc/2/disk"/>
            <ResourceEntities>{disk}</ResourceEntities>
            <VdcStorageProfiles>
                <VdcStorageProfile type="application/vnd.vmware.vcloud.vdcStorageProfile+xml" name="gold" href="{uri}/api/vdcStorageProfile/4"/>
            </VdcStorageProfiles>
        </Vdc>"#
    )
}

pub fn admin_org_xml(uri: &str, catalog: Option<&str>) -> String {
    let catalog = catalog.map_or_else(String::new, |name| {
        format!(
            r#"<CatalogReference type="application/vnd.vmware.admin.catalog+xml" name="{name}" href="{uri}/api/admin/catalog/0"/>"#
        )
    });
    format!(
        r#"<AdminOrg name="acme" href="{uri}/api/admin/org/1">
            <Link rel="add" type="application/vnd.vmware.admin.catalog+xml" href="{uri}/api/admin/org/1/catalogs"/>
            <Catalogs>{catalog}</Catalogs>
        </AdminOrg>"#
    )
}
