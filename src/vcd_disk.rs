//! Independent disks.
//!
//! Sizes are exchanged with vCD in bytes. Users write them with base-2 units
//! (`512MB`, `1GB`, `1GB512MB`), see [`parse_base2_bytes`].

use reqwest::Method;

use crate::vcd_client::{VcdClient, VcdError};
use crate::vcd_task::Task;
use crate::vcd_types::{
    DiskCreateParams, DiskParams, DiskRecord, DiskUpdateParams, LinkList, MIME_DISK,
    MIME_DISK_CREATE_PARAMS, MIME_EMPTY, MIME_VMS, NS_VCLOUD, REL_ADD, REL_DOWN, REL_EDIT,
    REL_REMOVE, Reference, Vms, parse_href, tasks_of, to_xml,
};
use crate::vcd_vdc::Vdc;

impl Vdc {
    /// Create an independent disk and return its creation task.
    ///
    /// # Errors
    ///
    /// Returns an error if the POST fails or the response carries no task.
    pub async fn create_disk(&self, disk: DiskParams) -> Result<Task, VcdError> {
        let url = self
            .record
            .links
            .url_for_type(MIME_DISK_CREATE_PARAMS, REL_ADD)?;
        let name = disk.name.clone();
        let body = to_xml(&DiskCreateParams {
            xmlns: NS_VCLOUD.to_string(),
            disk,
        })?;

        let created: DiskRecord = self
            .client
            .send_xml(Method::POST, url, Some(MIME_DISK_CREATE_PARAMS), Some(body))
            .await?;

        tasks_of(created.tasks.as_ref())
            .first()
            .map(|t| Task::from_record(self.client.clone(), t.clone()))
            .ok_or_else(|| VcdError::NotFound {
                kind: "disk creation task",
                name,
            })
    }

    /// Fetch the first disk of this VDC with that name.
    ///
    /// Works on the last fetched VDC document; refresh first to see new disks.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the VDC holds no such disk.
    pub async fn find_disk_by_name(&self, name: &str) -> Result<Disk, VcdError> {
        let href = self
            .entities_of(MIME_DISK)
            .find(|r| r.name == name)
            .map(|r| r.href.clone())
            .ok_or_else(|| VcdError::NotFound {
                kind: "disk",
                name: name.to_string(),
            })?;
        self.find_disk_by_href(&href).await
    }

    /// Fetch a disk by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the href is invalid or the GET fails.
    pub async fn find_disk_by_href(&self, href: &str) -> Result<Disk, VcdError> {
        let record: DiskRecord = self.client.get_xml(parse_href(href)?).await?;
        Ok(Disk::new(self.client.clone(), record))
    }
}

/// Independent disk.
#[derive(Debug, Clone)]
pub struct Disk {
    client: VcdClient,
    record: DiskRecord,
}

impl Disk {
    /// Wrap a disk document.
    #[must_use]
    pub const fn new(client: VcdClient, record: DiskRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched disk document.
    #[must_use]
    pub const fn record(&self) -> &DiskRecord {
        &self.record
    }

    /// Re-fetch the disk document.
    ///
    /// # Errors
    ///
    /// Returns an error if the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Push new name, description, size, storage profile and owner.
    ///
    /// Other fields of `new` are ignored: vCD does not change them in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk has no edit link or the PUT fails.
    pub async fn update(&self, new: &DiskRecord) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_DISK, REL_EDIT)?;
        let body = to_xml(&DiskUpdateParams {
            xmlns: NS_VCLOUD.to_string(),
            name: new.name.clone(),
            size: new.size,
            description: new.description.clone(),
            storage_profile: new.storage_profile.clone(),
            owner: new.owner.clone(),
        })?;
        self.client
            .execute_task_request(Method::PUT, url, Some(MIME_DISK), Some(body))
            .await
    }

    /// Delete the disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk has no remove link or the DELETE fails.
    pub async fn delete(&self) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_REMOVE)?;
        self.client
            .execute_task_request(Method::DELETE, url, None, None)
            .await
    }

    /// VM the disk is attached to, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk has no attached-VMs link or the GET fails.
    pub async fn attached_vm(&self) -> Result<Option<Reference>, VcdError> {
        let url = self.record.links.url_for_type(MIME_VMS, REL_DOWN)?;
        let vms: Vms = self.client.get_xml(url).await?;
        Ok(vms.vm_reference)
    }
}

// ============================================================================
// Base-2 sizes
// ============================================================================

const BASE2_UNITS: [(&str, u32); 13] = [
    ("B", 0),
    ("KB", 10),
    ("KiB", 10),
    ("MB", 20),
    ("MiB", 20),
    ("GB", 30),
    ("GiB", 30),
    ("TB", 40),
    ("TiB", 40),
    ("PB", 50),
    ("PiB", 50),
    ("EB", 60),
    ("EiB", 60),
];

/// Parse a base-2 size such as `1GB`, `1.5GiB` or `1GB512MB` into bytes.
///
/// A leading `+` is allowed. Whitespace is not, and neither is a negative
/// size.
///
/// # Errors
///
/// Returns [`VcdError::InvalidArgument`] if the string is not a valid size.
pub fn parse_base2_bytes(input: &str) -> Result<i64, VcdError> {
    let invalid = || VcdError::InvalidArgument(format!("wrong disk size '{input}'"));

    let s = input.strip_prefix('+').unwrap_or(input);
    if s == "0" {
        return Ok(0);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let shift = BASE2_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, shift)| *shift)
            .ok_or_else(invalid)?;

        total = total
            .checked_add(scaled(number, shift).ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        rest = tail;
    }

    i64::try_from(total).map_err(|_| invalid())
}

/// `number * 2^shift`, with an optional decimal fraction truncated to whole bytes.
fn scaled(number: &str, shift: u32) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let multiplier = 1u128 << shift;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut value = whole.checked_mul(multiplier)?;

    if !fraction.is_empty() {
        let digits = u32::try_from(fraction.len()).ok()?;
        let denominator = 10u128.checked_pow(digits)?;
        let numerator: u128 = fraction.parse().ok()?;
        value = value.checked_add(numerator.checked_mul(multiplier)? / denominator)?;
    }
    Some(value)
}

/// Format bytes with the largest base-2 unit that divides them exactly.
#[must_use]
pub fn format_base2_bytes(bytes: i64) -> String {
    if bytes <= 0 {
        return format!("{bytes}B");
    }
    let unit = ["EB", "PB", "TB", "GB", "MB", "KB"]
        .iter()
        .zip([60u32, 50, 40, 30, 20, 10])
        .find(|(_, shift)| bytes % (1i64 << shift) == 0);

    match unit {
        Some((name, shift)) => format!("{}{name}", bytes >> shift),
        None => format!("{bytes}B"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{connect, mount_get, mount_login, task_xml, vdc_xml};
    use crate::vcd_types::{MIME_VAPP, VdcRecord};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_base2_sizes() {
        assert_eq!(parse_base2_bytes("0").unwrap(), 0);
        assert_eq!(parse_base2_bytes("512B").unwrap(), 512);
        assert_eq!(parse_base2_bytes("1KB").unwrap(), 1024);
        assert_eq!(parse_base2_bytes("1KiB").unwrap(), 1024);
        assert_eq!(parse_base2_bytes("100MB").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_base2_bytes("1GB").unwrap(), 1_073_741_824);
        assert_eq!(parse_base2_bytes("1.5GB").unwrap(), 1_610_612_736);
        assert_eq!(parse_base2_bytes("1GB512MB").unwrap(), 1_610_612_736);
        assert_eq!(parse_base2_bytes("+2TB").unwrap(), 2 << 40);
        assert_eq!(parse_base2_bytes("+0").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_sizes() {
        for bad in ["", "+", "GB", "10", "10XB", "1..5GB", "-1GB", "1 GB", " 2TB", "2TB ", "++1GB", "16EB"] {
            assert!(parse_base2_bytes(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn formats_with_largest_exact_unit() {
        assert_eq!(format_base2_bytes(1_073_741_824), "1GB");
        assert_eq!(format_base2_bytes(1_610_612_736), "1536MB");
        assert_eq!(format_base2_bytes(1000), "1000B");
        assert_eq!(format_base2_bytes(0), "0B");
        assert_eq!(
            parse_base2_bytes(&format_base2_bytes(3 << 20)).unwrap(),
            3 << 20
        );
    }

    fn disk_xml(uri: &str) -> String {
        format!(
            r#"<Disk name="data" size="1073741824" busType="6" busSubType="lsilogic" status="1" href="{uri}/api/disk/9">
                <Link rel="edit" type="application/vnd.vmware.vcloud.disk+xml" href="{uri}/api/disk/9"/>
                <Link rel="remove" href="{uri}/api/disk/9"/>
                <Link rel="down" type="application/vnd.vmware.vcloud.vms+xml" href="{uri}/api/disk/9/attachedVms"/>
                <Description>scratch</Description>
                <StorageProfile type="application/vnd.vmware.vcloud.vdcStorageProfile+xml" name="gold" href="{uri}/api/vdcStorageProfile/4"/>
                <Owner><User type="application/vnd.vmware.admin.user+xml" name="admin" href="{uri}/api/admin/user/1"/></Owner>
            </Disk>"#
        )
    }

    async fn vdc_with_disk(server: &MockServer) -> Vdc {
        let uri = server.uri();
        mount_get(
            server,
            "/api/vdc/2",
            vdc_xml(
                &uri,
                &[
                    (MIME_VAPP, "data", "/api/vApp/vapp-1"),
                    (MIME_DISK, "data", "/api/disk/9"),
                ],
            ),
        )
        .await;
        mount_get(server, "/api/disk/9", disk_xml(&uri)).await;

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

    #[tokio::test]
    async fn find_disk_by_name_only_matches_disks() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let vdc = vdc_with_disk(&server).await;

        let disk = vdc.find_disk_by_name("data").await.unwrap();
        assert_eq!(disk.record().size, 1_073_741_824);
        assert_eq!(disk.record().bus_sub_type, "lsilogic");
        assert_eq!(
            disk.record().storage_profile.as_ref().map(|p| p.name.as_str()),
            Some("gold")
        );
        assert!(vdc.find_disk_by_name("logs").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn create_disk_returns_first_task() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        let vdc = vdc_with_disk(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/vdc/2/disk"))
            .and(header("content-type", MIME_DISK_CREATE_PARAMS))
            .and(body_string_contains(r#"name="logs""#))
            .and(body_string_contains(r#"size="536870912""#))
            .respond_with(ResponseTemplate::new(201).set_body_string(format!(
                r#"<Disk name="logs" href="{uri}/api/disk/10">
                    <Tasks>
                        <Task name="vdcCreateDisk" status="running" href="{uri}/api/task/1"/>
                        <Task name="other" status="running" href="{uri}/api/task/2"/>
                    </Tasks>
                </Disk>"#
            )))
            .expect(1)
            .mount(&server)
            .await;

        let task = vdc
            .create_disk(DiskParams {
                name: "logs".into(),
                size: parse_base2_bytes("512MB").unwrap(),
                ..DiskParams::default()
            })
            .await
            .unwrap();
        assert_eq!(task.record().name, "vdcCreateDisk");
    }

    #[tokio::test]
    async fn update_sends_only_mutable_fields() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        let vdc = vdc_with_disk(&server).await;

        Mock::given(method("PUT"))
            .and(path("/api/disk/9"))
            .and(header("content-type", MIME_DISK))
            .and(body_string_contains(r#"size="2147483648""#))
            .and(body_string_contains("<Owner>"))
            .respond_with(ResponseTemplate::new(202).set_body_string(task_xml(&uri, "3", "queued")))
            .expect(1)
            .mount(&server)
            .await;

        let disk = vdc.find_disk_by_name("data").await.unwrap();
        let mut new = disk.record().clone();
        new.size = 2 << 30;
        let task = disk.update(&new).await.unwrap();
        assert!(task.record().href.ends_with("/api/task/3"));

        let requests = server.received_requests().await.unwrap();
        let put = requests.iter().find(|r| r.method.as_str() == "PUT").unwrap();
        let body = String::from_utf8_lossy(&put.body);
        assert!(!body.contains("busType"));
    }

    #[tokio::test]
    async fn delete_and_attached_vm() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        let vdc = vdc_with_disk(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/api/disk/9"))
            .respond_with(ResponseTemplate::new(202).set_body_string(task_xml(&uri, "4", "queued")))
            .expect(1)
            .mount(&server)
            .await;
        mount_get(
            &server,
            "/api/disk/9/attachedVms",
            format!(r#"<Vms><VmReference type="application/vnd.vmware.vcloud.vm+xml" name="web-01" href="{uri}/api/vApp/vm-1"/></Vms>"#),
        )
        .await;

        let disk = vdc.find_disk_by_name("data").await.unwrap();
        let vm = disk.attached_vm().await.unwrap().unwrap();
        assert_eq!(vm.name, "web-01");

        let task = disk.delete().await.unwrap();
        assert!(task.record().href.ends_with("/api/task/4"));
    }
}
