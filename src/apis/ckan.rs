use std::sync::Arc;

use metrics::{counter, histogram};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::HttpClientPort;
use crate::constants::{DATASTORE_DUMP_PATH, PACKAGE_SHOW_PATH};
use crate::error::{DineSafeError, Result};
use crate::metrics::{RESOURCES_FETCHED, RESOURCE_BYTES};
use crate::types::RawTable;

/// `package_show` response envelope
#[derive(Debug, Deserialize)]
pub struct PackageShowResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Package>,
}

#[derive(Debug, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// One downloadable file of a package
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    /// Only datastore-backed resources can be dumped as CSV
    #[serde(default)]
    pub datastore_active: bool,
}

/// Client for a CKAN open-data portal.
pub struct CkanClient {
    base_url: String,
    http: Arc<dyn HttpClientPort>,
}

impl CkanClient {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClientPort>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the resources of a package.
    #[instrument(skip(self))]
    pub async fn package_resources(&self, package_id: &str) -> Result<Vec<Resource>> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, PACKAGE_SHOW_PATH),
            &[("id", package_id)],
        )
        .map_err(|e| DineSafeError::Fetch(format!("invalid package URL: {e}")))?;

        let resp = self
            .http
            .get(url.as_str())
            .await
            .map_err(|e| DineSafeError::Fetch(format!("package metadata request failed: {e}")))?;
        if !resp.is_success() {
            return Err(DineSafeError::Fetch(format!(
                "package metadata request returned HTTP {}",
                resp.status
            )));
        }

        let package: PackageShowResponse = serde_json::from_slice(&resp.bytes)
            .map_err(|e| DineSafeError::Fetch(format!("invalid package metadata: {e}")))?;
        if !package.success {
            return Err(DineSafeError::Fetch("Failed to fetch package metadata.".into()));
        }
        let resources = package.result.map(|p| p.resources).unwrap_or_default();
        debug!("Package {} lists {} resources", package_id, resources.len());
        Ok(resources)
    }

    /// Downloads one datastore resource as an untyped table.
    #[instrument(skip(self, resource), fields(resource_id = %resource.id))]
    pub async fn download_resource(&self, resource: &Resource) -> Result<RawTable> {
        let url = format!("{}{}{}", self.base_url, DATASTORE_DUMP_PATH, resource.id);
        let resp = self
            .http
            .get(&url)
            .await
            .map_err(|e| DineSafeError::Fetch(format!("download of resource {} failed: {e}", resource.id)))?;
        if !resp.is_success() {
            return Err(DineSafeError::Fetch(format!(
                "download of resource {} returned HTTP {}",
                resource.id, resp.status
            )));
        }

        if !resp.content_type.to_ascii_lowercase().contains("csv") {
            warn!(
                "Resource {} served as '{}' rather than CSV",
                resource.id, resp.content_type
            );
        }

        histogram!(RESOURCE_BYTES).record(resp.bytes.len() as f64);
        RawTable::from_csv_reader(resp.bytes.as_slice())
            .map_err(|e| DineSafeError::Fetch(format!("resource {} is not valid CSV: {e}", resource.id)))
    }

    /// Downloads every datastore-active resource of the package and stacks them
    /// into one table. Resources are fetched one after another.
    #[instrument(skip(self))]
    pub async fn fetch_package(&self, package_id: &str) -> Result<RawTable> {
        let resources = self.package_resources(package_id).await?;

        let mut tables = Vec::new();
        for resource in resources.iter() {
            if !resource.datastore_active {
                debug!("Skipping inactive resource {:?} ({})", resource.name, resource.id);
                continue;
            }
            let table = self.download_resource(resource).await?;
            info!(
                "Downloaded resource {} ({}) with {} rows",
                resource.name.as_deref().unwrap_or("unnamed"),
                resource.id,
                table.len()
            );
            counter!(RESOURCES_FETCHED).increment(1);
            tables.push(table);
        }

        if tables.is_empty() {
            warn!("Package {} has no datastore-active resources", package_id);
            return Err(DineSafeError::Fetch(format!(
                "package {package_id} has no datastore-active resources"
            )));
        }

        let combined = RawTable::concat(tables)?;
        info!("Fetched {} rows across {} columns", combined.len(), combined.columns.len());
        Ok(combined)
    }
}
