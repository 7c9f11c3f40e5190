use crate::auth::Credential;
use crate::config::Config;
use crate::data::CampaignStatus;
use crate::error::Error;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AdsApi: Send + Sync + 'static {
    /// Lists the customers the authenticated identity can access.
    /// # Returns
    /// A Result containing either resource names such as `customers/1234567890` or an Error.
    async fn list_accessible_customers(&self) -> Result<Vec<String>, Error>;

    /// Runs one page of a search query for a customer.
    /// # Arguments
    /// * `customer_id` - Bare customer id, no resource prefix.
    /// * `query` - Query text sent as-is.
    /// * `page_token` - Token of the page to fetch, `None` for the first page.
    /// # Returns
    /// A Result containing either a [`SearchPage`] or an [`Error::Platform`] when the
    /// platform rejected the request.
    async fn search(
        &self,
        customer_id: &str,
        query: &str,
        page_token: Option<String>,
    ) -> Result<SearchPage, Error>;
}

/// One result row of the campaign metrics query, in the platform's JSON shape.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawRow {
    pub campaign: RawCampaign,
    #[serde(default)]
    pub metrics: RawMetrics,
    pub segments: RawSegments,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawCampaign {
    #[serde(deserialize_with = "int64::required")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
}

// Zero-valued metrics are omitted from responses.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawMetrics {
    #[serde(default, deserialize_with = "int64::required")]
    pub impressions: i64,
    #[serde(default, deserialize_with = "int64::required")]
    pub clicks: i64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default, deserialize_with = "int64::required")]
    pub cost_micros: i64,
    #[serde(default, deserialize_with = "int64::optional")]
    pub average_cpa_micros: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawSegments {
    pub date: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<RawRow>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessibleCustomers {
    #[serde(default)]
    resource_names: Vec<String>,
}

#[derive(Deserialize)]
struct FailureEnvelope {
    error: FailureBody,
}

#[derive(Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<FailureDetail>,
}

#[derive(Deserialize)]
struct FailureDetail {
    #[serde(default)]
    errors: Vec<FailureEntry>,
}

#[derive(Deserialize)]
struct FailureEntry {
    message: String,
}

/// int64 values arrive as decimal strings in the JSON mapping.
mod int64 {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(i64),
        Text(String),
    }

    impl Repr {
        fn into_i64<E: Error>(self) -> Result<i64, E> {
            match self {
                Repr::Number(value) => Ok(value),
                Repr::Text(text) => text.parse().map_err(E::custom),
            }
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Repr::deserialize(deserializer)?.into_i64()
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Repr>::deserialize(deserializer)?
            .map(Repr::into_i64)
            .transpose()
    }
}

#[derive(Clone)]
pub struct GoogleAdsClient {
    client: Client,
    base_url: String,
    api_version: String,
    developer_token: String,
    login_customer_id: Option<String>,
    credential: Credential,
}

impl GoogleAdsClient {
    pub fn new(config: &Config, credential: Credential) -> Self {
        GoogleAdsClient {
            client: Client::new(),
            base_url: config.api_url.to_string(),
            api_version: config.api_version.to_string(),
            developer_token: config.developer_token.to_string(),
            login_customer_id: config.login_customer_id(),
            credential,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .push(&self.api_version)
            .extend(segments);

        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .bearer_auth(&self.credential.access_token)
            .header("developer-token", &self.developer_token);

        match &self.login_customer_id {
            Some(login_customer_id) => request.header("login-customer-id", login_customer_id),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl AdsApi for GoogleAdsClient {
    async fn list_accessible_customers(&self) -> Result<Vec<String>, Error> {
        let url = self.endpoint(&["customers:listAccessibleCustomers"])?;

        let resp = self.authorize(self.client.get(url)).send().await?;
        let customers: AccessibleCustomers = decode(resp).await?;

        Ok(customers.resource_names)
    }

    async fn search(
        &self,
        customer_id: &str,
        query: &str,
        page_token: Option<String>,
    ) -> Result<SearchPage, Error> {
        let url = self.endpoint(&["customers", customer_id, "googleAds:search"])?;
        debug!(
            "searching customer {} (page token: {:?})",
            customer_id, page_token
        );

        let resp = self
            .authorize(self.client.post(url))
            .json(&SearchRequest { query, page_token })
            .send()
            .await?;

        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }

    let body = resp.text().await?;
    Err(Error::Platform {
        status,
        errors: failure_messages(status, &body),
    })
}

/// Collects the per-issue messages of a platform failure body, falling back to
/// the top-level message and then to the HTTP status.
fn failure_messages(status: StatusCode, body: &str) -> Vec<String> {
    let Ok(envelope) = serde_json::from_str::<FailureEnvelope>(body) else {
        let body = body.trim();
        if body.is_empty() {
            return vec![status.to_string()];
        }
        return vec![body.to_string()];
    };

    let messages: Vec<String> = envelope
        .error
        .details
        .into_iter()
        .flat_map(|detail| detail.errors)
        .map(|entry| entry.message)
        .collect();

    if !messages.is_empty() {
        return messages;
    }

    match envelope.error.message {
        Some(message) => vec![message],
        None => vec![status.to_string()],
    }
}
