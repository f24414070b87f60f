// # Cloudflare DNS Backend
//
// This crate provides the Cloudflare implementation of the zonewatch
// `DnsBackend` trait.
//
// ## Behavior
//
// - Stateless: one logical operation per call, no retries, no background tasks
// - Every error is propagated; the reconciler isolates per-record failures
// - Idempotent upsert: no write when the record set already holds exactly
//   the requested address and TTL
// - Dry-run mode performs every read and logs the writes it would make
//
// ## Upsert Semantics
//
// Cloudflare stores each value of a multi-value set as its own record. An
// upsert replaces the whole `(name, type)` set with the single new address:
// the first record is updated in place, the remaining ones are deleted, and
// a record is created when none exists.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use zonewatch_core::config::BackendConfig;
use zonewatch_core::traits::{
    DnsBackend, RecordType, ResourceRecord, UpsertOutcome, UpsertRequest, Zone,
};
use zonewatch_core::{Error, Result};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Page size for list calls
const PER_PAGE: u32 = 100;

/// Hard stop for pagination in case `result_info` never converges
const MAX_PAGES: u32 = 1000;

const PROVIDER: &str = "cloudflare";

/// Cloudflare API v4 envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CfZone {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CfRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    ttl: Option<u32>,
    #[serde(default)]
    proxied: Option<bool>,
}

/// Cloudflare DNS backend
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the backend will:
/// - Perform all GET requests (zone and record listing)
/// - Log the intended create/update/delete requests
/// - **NOT** modify any DNS record
///
/// The returned [`UpsertOutcome`] describes what would have happened.
pub struct CloudflareBackend {
    /// Cloudflare API token
    /// NEVER log this value
    api_token: String,

    /// Zone that receives upserts
    zone_id: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform reads but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareBackend")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareBackend {
    /// Create a new Cloudflare backend
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `zone_id`: Zone that receives upserts
    /// - `timeout`: Upper bound for each HTTP request
    /// - `dry_run`: If true, perform reads but skip writes
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        timeout: Duration,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone_id = zone_id.into();
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a backend from configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        config.validate()?;
        match config {
            BackendConfig::Cloudflare {
                api_token,
                zone_id,
                timeout_secs,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare backend running in DRY-RUN mode - no changes will be made"
                    );
                }
                Self::new(
                    api_token.clone(),
                    zone_id.clone(),
                    Duration::from_secs(*timeout_secs),
                    *dry_run,
                )
            }
        }
    }

    /// Point the backend at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are suppressed
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the API envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<ApiResponse<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                Error::provider(PROVIDER, format!("{}: HTTP request failed: {}", context, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider(PROVIDER, format!("{}: failed to parse response: {}", context, e))
        })?;

        if !body.success {
            let messages: Vec<String> = body
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect();
            return Err(Error::provider(
                PROVIDER,
                format!("{}: API reported failure: {}", context, messages.join(", ")),
            ));
        }

        Ok(body)
    }

    /// GET every page of a list endpoint
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<Vec<T>> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let request = self
                .client
                .get(&url)
                .query(query)
                .query(&[("page", page), ("per_page", PER_PAGE)]);

            let body: ApiResponse<Vec<T>> = self.send(request, context).await?;
            items.extend(body.result.unwrap_or_default());

            let total_pages = body
                .result_info
                .and_then(|info| info.total_pages)
                .unwrap_or(1);
            if page >= total_pages || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Records of one `(name, type)` set in the upsert zone
    async fn find_records(&self, name: &str, record_type: &RecordType) -> Result<Vec<CfRecord>> {
        tracing::debug!("Looking up {} records for {}", record_type, name);
        self.get_all(
            &format!("/zones/{}/dns_records", self.zone_id),
            &[("name", name), ("type", record_type.as_str())],
            "record lookup",
        )
        .await
    }

    async fn create_record(&self, request: &UpsertRequest) -> Result<()> {
        let payload = serde_json::json!({
            "type": request.record_type.as_str(),
            "name": request.record_name,
            "content": request.new_address.to_string(),
            "ttl": request.ttl,
        });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would create record in zone {} with payload: {}",
                self.zone_id,
                payload
            );
            return Ok(());
        }

        let url = self.url(&format!("/zones/{}/dns_records", self.zone_id));
        let _: ApiResponse<CfRecord> = self
            .send(self.client.post(&url).json(&payload), "record create")
            .await?;
        Ok(())
    }

    async fn update_record(&self, existing: &CfRecord, request: &UpsertRequest) -> Result<()> {
        let mut payload = serde_json::json!({
            "type": request.record_type.as_str(),
            "name": request.record_name,
            "content": request.new_address.to_string(),
            "ttl": request.ttl,
        });
        if let Some(proxied) = existing.proxied {
            payload["proxied"] = serde_json::Value::Bool(proxied);
        }

        let url = self.url(&format!(
            "/zones/{}/dns_records/{}",
            self.zone_id, existing.id
        ));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                payload
            );
            return Ok(());
        }

        let _: ApiResponse<CfRecord> = self
            .send(self.client.put(&url).json(&payload), "record update")
            .await?;
        Ok(())
    }

    async fn delete_record(&self, existing: &CfRecord) -> Result<()> {
        let url = self.url(&format!(
            "/zones/{}/dns_records/{}",
            self.zone_id, existing.id
        ));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would delete {} record {} ({})",
                existing.record_type,
                existing.name,
                existing.content
            );
            return Ok(());
        }

        let _: ApiResponse<serde_json::Value> =
            self.send(self.client.delete(&url), "record delete").await?;
        Ok(())
    }
}

/// Map an HTTP error status to a zonewatch error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions (HTTP {})",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, error_text)),
        409 => Error::provider(
            PROVIDER,
            format!(
                "{}: conflict, record is being changed by another process (HTTP {})",
                context, status
            ),
        ),
        429 => Error::rate_limited(format!("{}: HTTP {}", context, status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: server error (transient): {} - {}", context, status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{}: {} - {}", context, status, error_text),
        ),
    }
}

/// Group per-value records into `(name, type)` sets, in first-seen order
fn group_records(records: Vec<CfRecord>) -> Vec<ResourceRecord> {
    let mut sets: Vec<ResourceRecord> = Vec::new();

    for record in records {
        let record_type = RecordType::parse(&record.record_type);
        match sets
            .iter_mut()
            .find(|set| set.name == record.name && set.record_type == record_type)
        {
            Some(set) => set.values.push(record.content),
            None => sets.push(ResourceRecord {
                name: record.name,
                record_type,
                values: vec![record.content],
                ttl: record.ttl,
            }),
        }
    }

    sets
}

#[async_trait]
impl DnsBackend for CloudflareBackend {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let zones: Vec<CfZone> = self.get_all("/zones", &[], "zone listing").await?;
        tracing::debug!("Cloudflare returned {} zone(s)", zones.len());

        Ok(zones
            .into_iter()
            .map(|zone| Zone {
                id: zone.id,
                name: zone.name,
            })
            .collect())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ResourceRecord>> {
        let records: Vec<CfRecord> = self
            .get_all(
                &format!("/zones/{}/dns_records", zone_id),
                &[],
                "record listing",
            )
            .await?;

        Ok(group_records(records))
    }

    /// Replace the `(name, type)` set with the single requested address
    ///
    /// # API Calls
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=...&type=...
    ///
    /// # none found
    /// POST /zones/:zone_id/dns_records
    ///
    /// # found, differs (skipped in dry-run mode)
    /// PUT /zones/:zone_id/dns_records/:first_id
    /// DELETE /zones/:zone_id/dns_records/:other_id
    /// ```
    async fn upsert(&self, request: &UpsertRequest) -> Result<UpsertOutcome> {
        let new_content = request.new_address.to_string();

        tracing::info!(
            "Upserting Cloudflare DNS record: {} -> {} ({}, ttl {}) [mode: {}]",
            request.record_name,
            new_content,
            request.record_type,
            request.ttl,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let existing = self
            .find_records(&request.record_name, &request.record_type)
            .await?;

        let Some((first, rest)) = existing.split_first() else {
            self.create_record(request).await?;
            return Ok(UpsertOutcome::Created);
        };

        if rest.is_empty() && first.content == new_content && first.ttl == Some(request.ttl) {
            tracing::info!(
                "DNS record already has correct value: {} -> {}",
                request.record_name,
                new_content
            );
            return Ok(UpsertOutcome::Unchanged);
        }

        let previous: Vec<String> = existing.iter().map(|r| r.content.clone()).collect();

        self.update_record(first, request).await?;
        for extra in rest {
            self.delete_record(extra).await?;
        }

        tracing::info!(
            "DNS record updated: {} -> {} (was: {})",
            request.record_name,
            new_content,
            previous.join(", ")
        );
        Ok(UpsertOutcome::Updated { previous })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
