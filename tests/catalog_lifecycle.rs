//! `vcd_catalog` create, update and delete against a mock vCD.

mod common;

use common::{admin_org_xml, attrs, config, mount_get, mount_login, org_xml, task_xml};
use serde_json::json;
use vcd_provider::VcdProvider;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog_xml(uri: &str, at: &str, description: &str) -> String {
    format!(
        r#"<AdminCatalog name="images" href="{uri}{at}">
            <Link rel="remove" href="{uri}{at}"/>
            <Description>{description}</Description>
        </AdminCatalog>"#
    )
}

#[tokio::test]
async fn catalog_lifecycle() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_login(&server).await;

    // connect and the admin lookup before creation see no catalog
    mount_get(&server, "/api/org/1", org_xml(&uri, None), Some(2)).await;
    mount_get(&server, "/api/org/1", org_xml(&uri, Some("images")), None).await;
    mount_get(&server, "/api/vdc/2", common::vdc_xml(&uri, None), None).await;

    // create, update, delete lookup and the first deletion check still list it
    mount_get(&server, "/api/admin/org/1", admin_org_xml(&uri, Some("images")), Some(4)).await;
    mount_get(&server, "/api/admin/org/1", admin_org_xml(&uri, None), None).await;

    mount_get(&server, "/api/catalog/0", catalog_xml(&uri, "/api/catalog/0", "base images"), None).await;
    mount_get(
        &server,
        "/api/admin/catalog/0",
        catalog_xml(&uri, "/api/admin/catalog/0", "base images"),
        None,
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/api/admin/org/1/catalogs"))
        .and(body_string_contains("base images"))
        .respond_with(ResponseTemplate::new(201).set_body_string(format!(
            r#"<AdminCatalog name="images" href="{uri}/api/admin/catalog/0">
                <Tasks><Task type="application/vnd.vmware.vcloud.task+xml" name="catalogCreateCatalog" status="running" href="{uri}/api/task/1"/></Tasks>
            </AdminCatalog>"#
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_get(&server, "/api/task/1", task_xml(&uri, "1", "success"), None).await;

    let provider = VcdProvider::connect(config(&server)).await.unwrap();
    let created = provider
        .create(
            "vcd_catalog",
            attrs(json!({"name": "images", "description": "base images"})),
        )
        .await
        .unwrap();
    assert_eq!(created.id, "images");
    assert_eq!(created.get_str("description"), Some("base images"));

    Mock::given(method("PUT"))
        .and(path("/api/admin/catalog/0"))
        .and(body_string_contains("golden images"))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_xml(
            &uri,
            "/api/admin/catalog/0",
            "golden images",
        )))
        .expect(1)
        .mount(&server)
        .await;

    provider
        .update(
            "vcd_catalog",
            "images",
            attrs(json!({"name": "images", "description": "golden images"})),
        )
        .await
        .unwrap();

    Mock::given(method("DELETE"))
        .and(path("/api/admin/catalog/0"))
        .and(query_param("force", "true"))
        .and(query_param("recursive", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    provider.delete("vcd_catalog", "images").await.unwrap();

    let admin_reads = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/api/admin/org/1")
        .count();
    assert_eq!(admin_reads, 5);
}

#[tokio::test]
async fn existing_catalog_is_adopted() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_login(&server).await;
    mount_get(&server, "/api/org/1", org_xml(&uri, Some("images")), None).await;
    mount_get(&server, "/api/vdc/2", common::vdc_xml(&uri, None), None).await;
    mount_get(&server, "/api/catalog/0", catalog_xml(&uri, "/api/catalog/0", "kept"), None).await;

    Mock::given(method("POST"))
        .and(path("/api/admin/org/1/catalogs"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let provider = VcdProvider::connect(config(&server)).await.unwrap();
    let data = provider
        .create("vcd_catalog", attrs(json!({"name": "images"})))
        .await
        .unwrap();
    assert_eq!(data.id, "images");
    assert_eq!(data.get_str("description"), Some("kept"));
}
