use std::time::Duration;

use futures_util::StreamExt;
use metview_logging::{met_debug, met_trace};
use reqwest::header::CONTENT_TYPE;

use crate::decode::decode_page;
use crate::fragment::{count_table_rows, extract_fragment};
use crate::payload::{UploadPayload, UploadTarget};
use crate::response::{parse_met_series, parse_plot_response};
use crate::{ApiError, FailureKind, FragmentSnapshot, MetSeries, PlotResponse};

pub const PLOT_PATH: &str = "/plot/";
pub const CLEAR_PATH: &str = "/clear/";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    /// Page re-fetched for fragment reloads.
    pub page_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_page_bytes: u64,
    pub allowed_page_types: Vec<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            page_path: "/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_page_bytes: 5 * 1024 * 1024,
            allowed_page_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

/// Calls the MET estimation server makes available.
#[async_trait::async_trait]
pub trait MetApi: Send + Sync {
    async fn upload(
        &self,
        target: &UploadTarget,
        payload: UploadPayload,
    ) -> Result<MetSeries, ApiError>;

    async fn request_plot(&self) -> Result<PlotResponse, ApiError>;

    /// Asks the server to drop stored results. The response body is ignored.
    async fn request_clear(&self) -> Result<(), ApiError>;

    /// Re-fetches the page and reads one fragment and its results table.
    async fn fetch_fragment(
        &self,
        fragment_id: &str,
        table_id: &str,
    ) -> Result<FragmentSnapshot, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestApi {
    settings: ApiSettings,
}

impl ReqwestApi {
    pub fn new(settings: ApiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn build_client(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))
    }

    fn url_for(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let base = self.settings.base_url.trim_end_matches('/');
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        reqwest::Url::parse(&format!("{base}{path}"))
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn is_page_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_page_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn post(
        &self,
        path: &str,
        form: Option<reqwest::multipart::Form>,
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.url_for(path)?;
        let client = self.build_client()?;
        let request = client.post(url);
        let request = match form {
            Some(form) => request.multipart(form),
            None => request,
        };
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }

    async fn fetch_page(&self) -> Result<String, ApiError> {
        let url = self.url_for(&self.settings.page_path)?;
        let client = self.build_client()?;
        let response = client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_page_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "page too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if let Some(ct) = content_type.as_deref() {
            if !self.is_page_type_allowed(ct) {
                return Err(ApiError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "page is not html",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(ApiError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "page too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let page = decode_page(&bytes, content_type.as_deref())
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        met_trace!("page decoded as {} ({} bytes)", page.encoding_label, bytes.len());
        Ok(page.html)
    }
}

#[async_trait::async_trait]
impl MetApi for ReqwestApi {
    async fn upload(
        &self,
        target: &UploadTarget,
        payload: UploadPayload,
    ) -> Result<MetSeries, ApiError> {
        met_debug!(
            "POST {} parts={} bytes={}",
            target.path,
            payload.parts().len(),
            payload.total_bytes()
        );
        let form = payload.into_form()?;
        let body = self.post(&target.path, Some(form)).await?;
        parse_met_series(&body, &target.met_column)
    }

    async fn request_plot(&self) -> Result<PlotResponse, ApiError> {
        let body = self.post(PLOT_PATH, None).await?;
        parse_plot_response(&body)
    }

    async fn request_clear(&self) -> Result<(), ApiError> {
        self.post(CLEAR_PATH, None).await.map(|_| ())
    }

    async fn fetch_fragment(
        &self,
        fragment_id: &str,
        table_id: &str,
    ) -> Result<FragmentSnapshot, ApiError> {
        let page = self.fetch_page().await?;
        let html = extract_fragment(&page, fragment_id);
        // Count within the fragment when it exists, the whole page otherwise.
        let scope = html.as_deref().unwrap_or(&page);
        let table_rows = count_table_rows(scope, table_id);
        met_debug!("fragment #{fragment_id}: table #{table_id} has {table_rows} rows");
        Ok(FragmentSnapshot { html, table_rows })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
