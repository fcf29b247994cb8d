//! Catalogs, catalog items, media and vApp templates.

use reqwest::Method;

use crate::vcd_client::{VcdClient, VcdError, with_query};
use crate::vcd_task::Task;
use crate::vcd_types::{
    AdminCatalogParams, CatalogItemRecord, CatalogRecord, FileRecord, LinkList,
    MIME_ADMIN_CATALOG, MIME_EMPTY, MIME_MEDIA, MIME_VAPP_TEMPLATE, MediaParams, MediaRecord,
    NS_VCLOUD, REL_ADD, REL_DOWNLOAD_DEFAULT, REL_ENABLE, REL_REMOVE, REL_UPLOAD_DEFAULT, Reference,
    ReferenceList, VAppTemplateRecord, parse_href, tasks_of, to_xml,
};

/// Image type used when the media name has no extension.
pub const DEFAULT_MEDIA_TYPE: &str = "floppy";

/// Tenant view of a catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    client: VcdClient,
    record: CatalogRecord,
}

impl Catalog {
    /// Wrap a catalog document.
    #[must_use]
    pub const fn new(client: VcdClient, record: CatalogRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched catalog document.
    #[must_use]
    pub const fn record(&self) -> &CatalogRecord {
        &self.record
    }

    /// Re-fetch the catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, catalog is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Whether the catalog lists an item with that name.
    #[must_use]
    pub fn has_catalog_item(&self, name: &str) -> bool {
        self.item_reference(name).is_some()
    }

    /// Fetch a catalog item by name.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::NotFound`] if the catalog lists no such item.
    pub async fn find_catalog_item(&self, name: &str) -> Result<CatalogItem, VcdError> {
        let reference = self.item_reference(name).ok_or_else(|| VcdError::NotFound {
            kind: "catalog item",
            name: name.to_string(),
        })?;
        let record: CatalogItemRecord = self.client.get_xml(parse_href(&reference.href)?).await?;
        Ok(CatalogItem::new(self.client.clone(), record))
    }

    /// Announce a media file, upload its content and return the upload task.
    ///
    /// The image type comes from the extension of `name` (`disk.iso` is
    /// `iso`), defaulting to [`DEFAULT_MEDIA_TYPE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot take media, any request fails
    /// or vCD reports no upload task.
    pub async fn upload_media(&self, name: &str, content: Vec<u8>) -> Result<Task, VcdError> {
        let size = i64::try_from(content.len())
            .map_err(|_| VcdError::InvalidArgument(format!("media {name} is too large")))?;

        let body = to_xml(&MediaParams {
            xmlns: NS_VCLOUD.to_string(),
            name: name.to_string(),
            image_type: media_type(name).to_string(),
            size,
        })?;

        let url = self.record.links.url_for_type(MIME_MEDIA, REL_ADD)?;
        tracing::info!(catalog = %self.record.name, media = %name, size, "uploading media");

        let item: CatalogItemRecord = self
            .client
            .send_xml(Method::POST, url, Some(MIME_MEDIA), Some(body))
            .await?;

        let media = CatalogItem::new(self.client.clone(), item).get_media().await?;
        media.upload(content).await
    }

    fn item_reference(&self, name: &str) -> Option<&Reference> {
        self.record
            .catalog_items
            .iter()
            .find_map(|items| items.catalog_item.for_name(name))
    }
}

/// Image type derived from a media file name.
#[must_use]
pub fn media_type(name: &str) -> &str {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_MEDIA_TYPE)
}

/// Admin view of a catalog, used for mutations.
#[derive(Debug, Clone)]
pub struct AdminCatalog {
    client: VcdClient,
    record: CatalogRecord,
}

impl AdminCatalog {
    /// Wrap an admin catalog document.
    #[must_use]
    pub const fn new(client: VcdClient, record: CatalogRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched admin catalog document.
    #[must_use]
    pub const fn record(&self) -> &CatalogRecord {
        &self.record
    }

    /// Set the description sent by the next [`AdminCatalog::update`].
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.record.description = Some(description.into());
    }

    /// Push name, description and publication flag, then adopt the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the PUT fails or the response cannot be decoded.
    pub async fn update(&mut self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        let body = to_xml(&AdminCatalogParams {
            xmlns: NS_VCLOUD.to_string(),
            name: self.record.name.clone(),
            description: self.record.description.clone().unwrap_or_default(),
            is_published: self.record.is_published,
        })?;

        self.record = self
            .client
            .send_xml(Method::PUT, url, Some(MIME_ADMIN_CATALOG), Some(body))
            .await?;
        Ok(())
    }

    /// Delete the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog has no remove link or vCD rejects the call.
    pub async fn delete(&self, force: bool, recursive: bool) -> Result<(), VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_REMOVE)?;
        let url = with_query(
            &url,
            &[
                ("force", bool_str(force)),
                ("recursive", bool_str(recursive)),
            ],
        );
        self.client.send_empty(Method::DELETE, url).await
    }
}

const fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Entry of a catalog wrapping a media or a vApp template.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    client: VcdClient,
    record: CatalogItemRecord,
}

impl CatalogItem {
    /// Wrap a catalog item document.
    #[must_use]
    pub const fn new(client: VcdClient, record: CatalogItemRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched catalog item document.
    #[must_use]
    pub const fn record(&self) -> &CatalogItemRecord {
        &self.record
    }

    /// Fetch the vApp template this item wraps.
    ///
    /// # Errors
    ///
    /// Returns an error if the item wraps something else or the GET fails.
    pub async fn get_vapp_template(&self) -> Result<VAppTemplate, VcdError> {
        let entity = self.entity_of(MIME_VAPP_TEMPLATE)?;
        let record: VAppTemplateRecord = self.client.get_xml(parse_href(&entity.href)?).await?;
        Ok(VAppTemplate::new(self.client.clone(), record))
    }

    /// Fetch the media this item wraps.
    ///
    /// # Errors
    ///
    /// Returns an error if the item wraps something else or the GET fails.
    pub async fn get_media(&self) -> Result<Media, VcdError> {
        let entity = self.entity_of(MIME_MEDIA)?;
        let record: MediaRecord = self.client.get_xml(parse_href(&entity.href)?).await?;
        Ok(Media::new(self.client.clone(), record))
    }

    /// Delete the item.
    ///
    /// # Errors
    ///
    /// Returns an error if vCD rejects the call.
    pub async fn delete(&self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        self.client.send_empty(Method::DELETE, url).await
    }

    fn entity_of(&self, mime: &str) -> Result<&Reference, VcdError> {
        match &self.record.entity {
            Some(entity) if entity.ref_type == mime => Ok(entity),
            Some(entity) => Err(VcdError::InvalidArgument(format!(
                "catalog item {} is not of type {mime}: {}",
                self.record.name, entity.ref_type
            ))),
            None => Err(VcdError::InvalidArgument(format!(
                "catalog item {} has no entity",
                self.record.name
            ))),
        }
    }
}

/// ISO or floppy image stored in a catalog.
#[derive(Debug, Clone)]
pub struct Media {
    client: VcdClient,
    record: MediaRecord,
}

impl Media {
    /// Wrap a media document.
    #[must_use]
    pub const fn new(client: VcdClient, record: MediaRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched media document.
    #[must_use]
    pub const fn record(&self) -> &MediaRecord {
        &self.record
    }

    /// Re-fetch the media document.
    ///
    /// # Errors
    ///
    /// Returns an error if the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Ask vCD to stage the media for download.
    ///
    /// # Errors
    ///
    /// Returns an error if the media has no enable link or the POST fails.
    pub async fn enable_download(&self) -> Result<Task, VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_ENABLE)?;
        self.client
            .execute_task_request(Method::POST, url, None, None)
            .await
    }

    /// Download the media content.
    ///
    /// # Errors
    ///
    /// Returns an error if the media has no download link or the GET fails.
    pub async fn download(&self) -> Result<Vec<u8>, VcdError> {
        let url = self.first_file()?.links.url_for_type(MIME_EMPTY, REL_DOWNLOAD_DEFAULT)?;
        self.client.get_bytes(url).await
    }

    /// Upload the media content and return the pending upload task.
    ///
    /// # Errors
    ///
    /// Returns an error if the media has no upload link or task, or the PUT fails.
    pub async fn upload(&self, content: Vec<u8>) -> Result<Task, VcdError> {
        let url = self.first_file()?.links.url_for_type(MIME_EMPTY, REL_UPLOAD_DEFAULT)?;
        let task = tasks_of(self.record.tasks.as_ref())
            .first()
            .cloned()
            .ok_or_else(|| VcdError::NotFound {
                kind: "media upload task",
                name: self.record.name.clone(),
            })?;

        self.client.put_bytes(url, content).await?;
        Ok(Task::from_record(self.client.clone(), task))
    }

    fn first_file(&self) -> Result<&FileRecord, VcdError> {
        self.record
            .files
            .as_ref()
            .and_then(|f| f.file.first())
            .ok_or_else(|| {
                VcdError::InvalidArgument(format!("media {} does not have any files", self.record.name))
            })
    }
}

/// vApp template stored in a catalog.
#[derive(Debug, Clone)]
pub struct VAppTemplate {
    client: VcdClient,
    record: VAppTemplateRecord,
}

impl VAppTemplate {
    /// Wrap a vApp template document.
    #[must_use]
    pub const fn new(client: VcdClient, record: VAppTemplateRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched template document.
    #[must_use]
    pub const fn record(&self) -> &VAppTemplateRecord {
        &self.record
    }

    /// Re-fetch the template document.
    ///
    /// # Errors
    ///
    /// Returns an error if the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Reference used as the `<Source>` of an instantiation.
    #[must_use]
    pub fn reference(&self) -> Reference {
        Reference {
            href: self.record.href.clone(),
            name: self.record.name.clone(),
            ..Reference::default()
        }
    }
}
