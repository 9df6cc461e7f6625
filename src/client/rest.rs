use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{endpoints, WarehouseApi};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{
    DateRangeRequest, Entrance, EntranceForm, ExitItem, ExitPatch, FolioSearchResponse,
    MutationResponse, OneOrMany, PartNumberSearchResult, ProcessExitsRequest,
    ProcessExitsResponse, ReportItem,
};

/// Thin JSON client over the warehouse REST service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Builds a client with the configured timeout and bearer token.
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()?;

        Self::with_client(
            &config.api_base_url,
            config.api_token().map(str::to_string),
            client,
        )
    }

    /// Build from an existing reqwest client (useful for testing).
    pub fn with_client(
        base_url: &str,
        token: Option<String>,
        client: Client,
    ) -> Result<Self, ServiceError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `endpoint` joined to the base URL, with each segment percent-encoded.
    pub fn url(&self, endpoint: &str, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint))?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| {
                    ServiceError::InvalidInput(format!("base URL '{}' cannot hold a path", self.base_url))
                })?
                .pop_if_empty()
                .extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get<T>(&self, url: Url) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + Default,
    {
        self.send_json(self.request(Method::GET, url)).await
    }

    pub async fn post<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.send_json(self.request(Method::POST, url).json(body))
            .await
    }

    pub async fn put<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.send_json(self.request(Method::PUT, url).json(body))
            .await
    }

    pub async fn patch<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.send_json(self.request(Method::PATCH, url).json(body))
            .await
    }

    pub async fn delete<T>(&self, url: Url) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + Default,
    {
        self.send_json(self.request(Method::DELETE, url)).await
    }

    /// Fetches a binary file. A body switches the request to POST.
    pub async fn download<B>(&self, url: Url, body: Option<&B>) -> Result<Bytes, ServiceError>
    where
        B: Serialize + ?Sized,
    {
        let builder = match body {
            Some(body) => self.request(Method::POST, url).json(body),
            None => self.request(Method::GET, url),
        };
        let response = Self::ensure_success(builder.send().await?).await?;
        Ok(response.bytes().await?)
    }

    async fn send_json<T>(&self, builder: RequestBuilder) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + Default,
    {
        let response = Self::ensure_success(builder.send().await?).await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Ok(T::default());
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            debug!(%status, "non-JSON success body ignored");
            return Ok(T::default());
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, %url, "warehouse service returned an error");
        Err(ServiceError::from_http_response(status, &body))
    }
}

/// [`WarehouseApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpWarehouseApi {
    client: ApiClient,
}

impl HttpWarehouseApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(ApiClient::new(config)?))
    }
}

#[async_trait]
impl WarehouseApi for HttpWarehouseApi {
    #[instrument(skip(self))]
    async fn list_entrances(&self) -> Result<Vec<Entrance>, ServiceError> {
        let url = self.client.url(endpoints::LIST_ENTRANCES, &[])?;
        self.client.get(url).await
    }

    #[instrument(skip(self, form), fields(folio = form.folio))]
    async fn create_entrance(
        &self,
        form: &EntranceForm,
    ) -> Result<MutationResponse, ServiceError> {
        let url = self.client.url(endpoints::CREATE_ENTRANCE, &[])?;
        self.client.post(url, form).await
    }

    #[instrument(skip(self, form), fields(folio = form.folio))]
    async fn update_entrance(
        &self,
        id: i64,
        form: &EntranceForm,
    ) -> Result<MutationResponse, ServiceError> {
        let id = id.to_string();
        let url = self.client.url(endpoints::UPDATE_ENTRANCE, &[&id])?;
        self.client.put(url, form).await
    }

    #[instrument(skip(self, patch), fields(platforms = patch.platforms))]
    async fn patch_entrance_exit(
        &self,
        id: i64,
        patch: &ExitPatch,
    ) -> Result<MutationResponse, ServiceError> {
        let id = id.to_string();
        let url = self.client.url(endpoints::UPDATE_EXITS, &[&id])?;
        self.client.patch(url, patch).await
    }

    #[instrument(skip(self))]
    async fn delete_entrance(&self, id: i64) -> Result<MutationResponse, ServiceError> {
        let id = id.to_string();
        let url = self.client.url(endpoints::DELETE_ENTRANCE, &[&id])?;
        self.client.delete(url).await
    }

    #[instrument(skip(self))]
    async fn search_by_folio(&self, folio: i64) -> Result<FolioSearchResponse, ServiceError> {
        let folio = folio.to_string();
        let url = self.client.url(endpoints::SEARCH_BY_FOLIO, &[&folio])?;
        self.client.get(url).await
    }

    #[instrument(skip(self))]
    async fn search_by_part_number(
        &self,
        part_number: &str,
    ) -> Result<Vec<PartNumberSearchResult>, ServiceError> {
        let url = self
            .client
            .url(endpoints::SEARCH_BY_PART_NUMBER, &[part_number])?;
        let results: OneOrMany<PartNumberSearchResult> = self.client.get(url).await?;
        Ok(results.into())
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn process_exits(
        &self,
        items: Vec<ExitItem>,
    ) -> Result<ProcessExitsResponse, ServiceError> {
        let url = self.client.url(endpoints::PROCESS_EXITS, &[])?;
        let request = ProcessExitsRequest { exit_items: items };
        self.client.post(url, &request).await
    }

    #[instrument(skip(self))]
    async fn list_available_reports(&self) -> Result<Vec<ReportItem>, ServiceError> {
        let url = self.client.url(endpoints::AVAILABLE_REPORTS, &[])?;
        self.client.get(url).await
    }

    #[instrument(skip(self))]
    async fn download_monthly_report(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Bytes, ServiceError> {
        let (year, month) = (year.to_string(), month.to_string());
        let url = self
            .client
            .url(endpoints::DOWNLOAD_MONTHLY_REPORT, &[&year, &month])?;
        self.client.download::<()>(url, None).await
    }

    #[instrument(skip(self))]
    async fn download_report_by_date_range(
        &self,
        range: &DateRangeRequest,
    ) -> Result<Bytes, ServiceError> {
        let url = self
            .client
            .url(endpoints::DOWNLOAD_REPORT_BY_DATE_RANGE, &[])?;
        self.client.download(url, Some(range)).await
    }
}
