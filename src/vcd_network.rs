//! Org VDC networks.
//!
//! Network creation and deletion are rejected while another operation holds
//! the VDC or the network ("is busy, cannot proceed with the operation").
//! Both calls go through [`RetryPolicy::busy`] with the client's retry budget.

use reqwest::Method;

use crate::vcd_client::{VcdClient, VcdError};
use crate::vcd_retry::RetryPolicy;
use crate::vcd_task::Task;
use crate::vcd_types::{
    LinkList, MIME_ORG_VDC_NETWORK, NS_VCLOUD, OrgVdcNetworkParams, OrgVdcNetworkRecord, REL_ADD,
    parse_href, tasks_of, to_xml,
};
use crate::vcd_vdc::Vdc;

impl Vdc {
    /// Create an org VDC network and wait for its creation tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the POST keeps failing within the retry budget, or
    /// a creation task fails or outlasts it.
    pub async fn create_org_vdc_network(&self, mut params: OrgVdcNetworkParams) -> Result<(), VcdError> {
        let url = self.record.links.url_for_type(MIME_ORG_VDC_NETWORK, REL_ADD)?;
        params.xmlns = NS_VCLOUD.to_string();
        let body = to_xml(&params)?;
        tracing::debug!(network = %params.name, "creating org VDC network");

        let client = &self.client;
        let created: OrgVdcNetworkRecord = RetryPolicy::busy_from_config(client.config())
            .run(|| {
                let url = url.clone();
                let body = body.clone();
                async move {
                    client
                        .send_xml(Method::POST, url, Some(MIME_ORG_VDC_NETWORK), Some(body))
                        .await
                }
            })
            .await?;

        self.wait_embedded(tasks_of(created.tasks.as_ref())).await
    }
}

/// Org VDC network.
#[derive(Debug, Clone)]
pub struct OrgVdcNetwork {
    client: VcdClient,
    record: OrgVdcNetworkRecord,
}

impl OrgVdcNetwork {
    /// Wrap a network document.
    #[must_use]
    pub const fn new(client: VcdClient, record: OrgVdcNetworkRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched network document.
    #[must_use]
    pub const fn record(&self) -> &OrgVdcNetworkRecord {
        &self.record
    }

    /// Re-fetch the network document.
    ///
    /// # Errors
    ///
    /// Returns an error if the network has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, network is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Delete the network through the admin API.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or the DELETE keeps failing
    /// within the retry budget.
    pub async fn delete(&mut self) -> Result<Task, VcdError> {
        self.refresh().await?;
        let url = admin_network_url(&self.record.href)?;

        let client = &self.client;
        let task = RetryPolicy::busy_from_config(client.config())
            .run(|| {
                let url = url.clone();
                async move {
                    client
                        .execute_task_request(Method::DELETE, url, None, None)
                        .await
                }
            })
            .await?;
        Ok(task)
    }
}

/// `/api/admin/network/<id>` on the host of `href`.
fn admin_network_url(href: &str) -> Result<reqwest::Url, VcdError> {
    let mut url = parse_href(href)?;
    let id = href.rsplit('/').next().unwrap_or_default().to_string();
    url.set_path(&format!("/api/admin/network/{id}"));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connect, mount_get, mount_login, task_xml, vdc_xml};
    use crate::vcd_types::{NetworkConfiguration, VdcRecord};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BUSY_BODY: &str = r#"<Error majorErrorCode="400" minorErrorCode="BUSY_ENTITY" message="[ 9a1c ] The entity vdc-1 is busy, cannot proceed with the operation."/>"#;

    fn params() -> OrgVdcNetworkParams {
        OrgVdcNetworkParams {
            xmlns: String::new(),
            name: "lan".into(),
            description: None,
            configuration: NetworkConfiguration {
                ip_scopes: None,
                fence_mode: "isolated".into(),
            },
            edge_gateway: None,
            is_shared: Some(false),
        }
    }

    async fn vdc(server: &MockServer) -> Vdc {
        let uri = server.uri();
        mount_get(server, "/api/vdc/2", vdc_xml(&uri, &[])).await;
        let client = connect(server).await;
        let mut vdc = Vdc::new(
            client,
            VdcRecord {
                href: format!("{uri}/api/vdc/2"),
                ..VdcRecord::default()
            },
        );
        vdc.refresh().await.unwrap();
        vdc
    }

    #[test]
    fn admin_url_keeps_host_and_last_segment() {
        let url = admin_network_url("https://vcd.example.com/api/network/5f1e").unwrap();
        assert_eq!(url.as_str(), "https://vcd.example.com/api/admin/network/5f1e");
    }

    #[tokio::test]
    async fn create_retries_while_vdc_is_busy() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/task/1", task_xml(&uri, "1", "success")).await;

        Mock::given(method("POST"))
            .and(path("/api/admin/vdc/2/networks"))
            .respond_with(ResponseTemplate::new(400).set_body_string(BUSY_BODY))
            .up_to_n_times(2)
            .with_priority(1)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/admin/vdc/2/networks"))
            .and(body_string_contains("<FenceMode>isolated</FenceMode>"))
            .respond_with(ResponseTemplate::new(201).set_body_string(format!(
                r#"<OrgVdcNetwork name="lan" href="{uri}/api/admin/network/5">
                    <Tasks><Task name="networkCreateOrgVdcNetwork" status="running" href="{uri}/api/task/1"/></Tasks>
                </OrgVdcNetwork>"#
            )))
            .expect(1)
            .mount(&server)
            .await;

        let vdc = vdc(&server).await;
        vdc.create_org_vdc_network(params()).await.unwrap();
    }

    #[tokio::test]
    async fn create_fails_fast_on_other_errors() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/admin/vdc/2/networks"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"<Error majorErrorCode="400" minorErrorCode="DUPLICATE_NAME" message="The name lan is already in use."/>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let vdc = vdc(&server).await;
        let err = vdc.create_org_vdc_network(params()).await.unwrap_err();
        assert!(matches!(err, VcdError::Api { ref minor_code, .. } if minor_code == "DUPLICATE_NAME"));
    }

    #[tokio::test]
    async fn delete_refreshes_then_deletes_through_admin_path() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(
            &server,
            "/api/network/5",
            format!(r#"<OrgVdcNetwork name="lan" href="{uri}/api/network/5"/>"#),
        )
        .await;

        Mock::given(method("DELETE"))
            .and(path("/api/admin/network/5"))
            .respond_with(ResponseTemplate::new(400).set_body_string(BUSY_BODY))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/admin/network/5"))
            .respond_with(ResponseTemplate::new(202).set_body_string(task_xml(&uri, "2", "queued")))
            .expect(1)
            .mount(&server)
            .await;

        let vdc = vdc(&server).await;
        let mut network = vdc.find_vdc_network("lan").await.unwrap();
        let task = network.delete().await.unwrap();
        assert!(task.record().href.ends_with("/api/task/2"));
    }
}
