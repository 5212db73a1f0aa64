// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use abasto_app::{
    DateRange, DeleteAllRequest, DeleteFilteredSummary, ExportFormat, FilterOptions,
    FilterSelection, ImportOutcome, ImportSummary, LoginForm, PURCHASES_BASE,
    PURCHASES_EXPORT_NAME, PagePayload, PageQuery, PageResult, PendingReport, PurchaseSuggestion,
    PurchaseUpdate, RecordForm, RecordId, Resource, SalesMonths,
};
use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::CONTENT_DISPOSITION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const BUSY_FALLBACK: &str = "import in progress -- wait before trying again";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("connection error: cannot reach {base_url} -- check backend.base_url ({source})")]
    Connection {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("{0}")]
    Busy(String),
    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{action} {}: {source}", .path.display())]
    File {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Busy(_) => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            _ => None,
        }
    }
}

/// Blocking client for the dashboard backend. Cookies persist across calls so
/// a successful login authenticates later requests.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("backend.base_url {trimmed:?} is not a valid URL"))?;
        if base_url.cannot_be_a_base() {
            bail!("backend.base_url {trimmed:?} cannot carry paths -- use http://host:port");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn forecast_options(&self, filters: &FilterSelection) -> Result<FilterOptions, ApiError> {
        let url = self.url("/forecast/options", &filters.options_query_pairs());
        tracing::debug!(%url, "fetching forecast options");
        let response = self.send(self.http.get(url))?;
        self.decode(response, "forecast options")
    }

    pub fn forecast_page(&self, query: &PageQuery) -> Result<PageResult, ApiError> {
        let url = self.url("/forecast/data", &query.query_pairs());
        tracing::debug!(%url, "fetching forecast page");
        let response = self.send(self.http.get(url))?;
        let payload: PagePayload = self.decode(response, "forecast page")?;
        Ok(PageResult::from_payload(payload, query.page_size))
    }

    /// Returns the backend's welcome message.
    pub fn login(&self, form: &LoginForm) -> Result<String, ApiError> {
        let url = self.url("/api/login", &[]);
        tracing::info!(user = %form.user, "logging in");
        let response = self.send(self.http.post(url).json(form))?;
        let body: MessageBody = self.decode(response, "login response")?;
        Ok(body.msg.unwrap_or_default())
    }

    pub fn list(&self, resource: Resource) -> Result<Vec<Value>, ApiError> {
        let url = self.url(&resource.collection_path(), &[]);
        let response = self.send(self.http.get(url))?;
        self.decode(response, "record list")
    }

    pub fn create(&self, form: RecordForm) -> Result<(), ApiError> {
        let url = self.url(&form.resource.collection_path(), &[]);
        tracing::info!(resource = form.resource.name(), "creating record");
        self.send(self.http.post(url).json(&form.into_body()))?;
        Ok(())
    }

    pub fn update(&self, id: &RecordId, form: RecordForm) -> Result<(), ApiError> {
        let url = self.record_url(form.resource, id);
        tracing::info!(resource = form.resource.name(), %id, "updating record");
        self.send(self.http.put(url).json(&form.into_body()))?;
        Ok(())
    }

    pub fn delete(&self, resource: Resource, id: &RecordId) -> Result<(), ApiError> {
        let url = self.record_url(resource, id);
        tracing::info!(resource = resource.name(), %id, "deleting record");
        self.send(self.http.delete(url))?;
        Ok(())
    }

    pub fn delete_all(&self, resource: Resource, request: DeleteAllRequest) -> Result<(), ApiError> {
        let url = self.url(&format!("{}/delete_all", resource.base_path()), &[]);
        tracing::warn!(resource = resource.name(), "deleting every record");
        self.send(self.http.post(url).json(&request))?;
        Ok(())
    }

    /// Uploads a spreadsheet or JSON file as the multipart field `file`.
    pub fn import(&self, resource: Resource, path: &Path) -> Result<ImportSummary, ApiError> {
        tracing::info!(resource = resource.name(), path = %path.display(), "importing file");
        self.upload(&format!("{}/import", resource.base_path()), path)
    }

    pub fn import_outcome(&self, resource: Resource, path: &Path) -> ImportOutcome {
        match self.import(resource, path) {
            Ok(summary) => ImportOutcome::Imported(summary),
            Err(ApiError::Busy(message)) => ImportOutcome::Busy(message),
            Err(error) => ImportOutcome::Failed(error.to_string()),
        }
    }

    /// Downloads `{base}/export` into `dir` and returns the written path.
    pub fn export(
        &self,
        resource: Resource,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let url = self.url(
            &format!("{}/export", resource.base_path()),
            &[("format", format.param().to_owned())],
        );
        let fallback = format!("{}_export.{}", resource.name(), format.extension());
        self.download(url, &fallback, dir)
    }

    pub fn pending(&self, resource: Resource) -> Result<PendingReport, ApiError> {
        let url = self.url(&format!("{}/pending", resource.base_path()), &[]);
        let response = self.send(self.http.get(url))?;
        self.decode(response, "pending report")
    }

    /// Sale months as `Enero - 2025` labels, oldest first.
    pub fn sales_months(&self) -> Result<Vec<String>, ApiError> {
        let url = self.url(&format!("{}/months", Resource::VentasClaro.base_path()), &[]);
        let response = self.send(self.http.get(url))?;
        let body: SalesMonths = self.decode(response, "sales months")?;
        Ok(body.months)
    }

    pub fn delete_sales_in_range(&self, range: &DateRange) -> Result<DeleteFilteredSummary, ApiError> {
        let url = self.url(
            &format!("{}/delete_filtered", Resource::VentasClaro.base_path()),
            &[],
        );
        tracing::warn!(%range, "deleting sales in range");
        let response = self.send(self.http.post(url).json(range))?;
        self.decode(response, "delete summary")
    }

    pub fn purchases(&self) -> Result<Vec<PurchaseSuggestion>, ApiError> {
        let url = self.url(&format!("{PURCHASES_BASE}/compras"), &[]);
        let response = self.send(self.http.get(url))?;
        self.decode(response, "purchase suggestions")
    }

    pub fn update_purchase(&self, update: &PurchaseUpdate) -> Result<(), ApiError> {
        let url = self.url(&format!("{PURCHASES_BASE}/update"), &[]);
        tracing::info!(material = update.material(), "updating purchase suggestion");
        self.send(self.http.post(url).json(update))?;
        Ok(())
    }

    /// Rows whose material already exists are merged into it.
    pub fn import_purchases(&self, path: &Path) -> Result<ImportSummary, ApiError> {
        tracing::info!(path = %path.display(), "importing purchase suggestions");
        self.upload(&format!("{PURCHASES_BASE}/import"), path)
    }

    pub fn export_purchases(&self, dir: &Path) -> Result<PathBuf, ApiError> {
        let url = self.url(&format!("{PURCHASES_BASE}/export_excel"), &[]);
        self.download(url, PURCHASES_EXPORT_NAME, dir)
    }

    fn upload(&self, path: &str, file: &Path) -> Result<ImportSummary, ApiError> {
        let url = self.url(path, &[]);
        let form = Form::new().file("file", file).map_err(|source| ApiError::File {
            action: "read import file",
            path: file.to_path_buf(),
            source,
        })?;
        let response = self.send(self.http.post(url).multipart(form))?;
        self.decode(response, "import summary")
    }

    /// The `Content-Disposition` name wins over `fallback`.
    fn download(&self, url: Url, fallback: &str, dir: &Path) -> Result<PathBuf, ApiError> {
        let response = self.send(self.http.get(url))?;
        let file_name = attachment_name(&response).unwrap_or_else(|| fallback.to_owned());
        let bytes = response.bytes().map_err(|source| self.connection_error(source))?;
        let path = dir.join(file_name);
        fs::write(&path, &bytes).map_err(|source| ApiError::File {
            action: "write export",
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "export downloaded");
        Ok(path)
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Url {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{prefix}{path}"));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    fn record_url(&self, resource: Resource, id: &RecordId) -> Url {
        let mut url = self.url(&resource.collection_path(), &[]);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id.as_str());
        }
        url
    }

    fn connection_error(&self, source: reqwest::Error) -> ApiError {
        ApiError::Connection {
            base_url: self.base_url().to_owned(),
            source,
        }
    }

    /// A body that stops arriving is a transport failure, not a decode one.
    fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        what: &'static str,
    ) -> Result<T, ApiError> {
        let body = response.text().map_err(|source| self.connection_error(source))?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { what, source })
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().map_err(|source| self.connection_error(source))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().map_err(|source| self.connection_error(source))?;
        tracing::warn!(status = status.as_u16(), "backend request failed");
        Err(clean_error_response(status, &body))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
    msg: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageBody {
    msg: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let message = [parsed.error, parsed.msg, parsed.detail]
        .into_iter()
        .flatten()
        .map(|text| text.trim().to_owned())
        .find(|text| !text.is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains(['{', '<']))
                .then(|| trimmed.to_owned())
        });

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ApiError::Busy(message.unwrap_or_else(|| BUSY_FALLBACK.to_owned()));
    }
    ApiError::Server {
        status: status.as_u16(),
        message: message.unwrap_or_else(|| "request failed without details".to_owned()),
    }
}


fn attachment_name(response: &Response) -> Option<String> {
    let header = response.headers().get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let (_, rest) = header.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    let name = Path::new(name).file_name()?.to_str()?;
    (!name.is_empty()).then(|| name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{ApiError, clean_error_response};
    use reqwest::StatusCode;

    #[test]
    fn error_field_wins_over_detail() {
        let error = clean_error_response(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Material requerido","detail":"row 3"}"#,
        );
        assert_eq!(error.to_string(), "server error (400): Material requerido");
    }

    #[test]
    fn login_msg_is_surfaced() {
        let error = clean_error_response(StatusCode::UNAUTHORIZED, r#"{"msg":"Credenciales inválidas"}"#);
        assert_eq!(error.status(), Some(401));
        assert!(error.to_string().contains("Credenciales inválidas"));
    }

    #[test]
    fn too_many_requests_is_busy() {
        let error = clean_error_response(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":"Importación en curso"}"#,
        );
        assert!(matches!(error, ApiError::Busy(ref message) if message == "Importación en curso"));

        let bare = clean_error_response(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(bare, ApiError::Busy(_)));
    }

    #[test]
    fn html_bodies_fall_back_to_generic_message() {
        let error = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "<html><body>Internal Server Error</body></html>",
        );
        assert_eq!(
            error.to_string(),
            "server error (500): request failed without details"
        );

        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(plain.to_string(), "server error (502): upstream down");
    }
}
