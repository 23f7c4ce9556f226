//! Minimal ChemSpider client against the RSC compounds API.
//!
//! Searches are asynchronous on the server side: a filter request returns
//! a query id which has to be polled until the result set is ready.

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{AnnotateError, AnnotateResult};

const BASE: &str = "https://api.rsc.org/compounds/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const POLL_ATTEMPTS: u32 = 20;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "queryId")]
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    results: Vec<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordDetails {
    #[serde(default)]
    pub id: u64,
    #[serde(rename = "smiles", default)]
    pub smiles: Option<String>,
    #[serde(rename = "stdInChI", default)]
    pub stdinchi: Option<String>,
    #[serde(rename = "stdInChIKey", default)]
    pub stdinchikey: Option<String>,
    #[serde(rename = "commonName", default)]
    pub common_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChemSpider {
    client: Client,
}

impl ChemSpider {
    pub fn new(token: &str) -> AnnotateResult<Self> {
        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(token)
            .map_err(|_| AnnotateError::InvalidToken)?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TIMEOUT)
            .default_headers(headers)
            .user_agent(concat!("molminer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Record ids matching a name search; empty when nothing matches.
    pub async fn search(&self, query: &str) -> AnnotateResult<Vec<u64>> {
        let response = self
            .client
            .post(format!("{BASE}/filter/name"))
            .json(&json!({ "name": query }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let body: QueryResponse = check(response).await?.json().await?;
        self.poll(&body.query_id).await?;
        self.results(&body.query_id).await
    }

    pub async fn details(&self, record_id: u64) -> AnnotateResult<Option<RecordDetails>> {
        let url = format!(
            "{BASE}/records/{record_id}/details?fields=SMILES,StdInChI,StdInChIKey,CommonName"
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let details: RecordDetails = check(response).await?.json().await?;
        Ok(Some(details))
    }

    async fn poll(&self, query_id: &str) -> AnnotateResult<()> {
        for _ in 0..POLL_ATTEMPTS {
            let response = self
                .client
                .get(format!("{BASE}/filter/{query_id}/status"))
                .send()
                .await?;
            let body: StatusResponse = check(response).await?.json().await?;
            match body.status.as_str() {
                "Complete" => return Ok(()),
                "Failed" | "Not Found" | "Suspended" => {
                    return Err(AnnotateError::Search(body.status));
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
        Err(AnnotateError::Search("query timed out".to_owned()))
    }

    async fn results(&self, query_id: &str) -> AnnotateResult<Vec<u64>> {
        let response = self
            .client
            .get(format!("{BASE}/filter/{query_id}/results"))
            .send()
            .await?;
        let body: ResultsResponse = check(response).await?.json().await?;
        Ok(body.results)
    }
}

async fn check(response: reqwest::Response) -> AnnotateResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(AnnotateError::Api {
            service: "chemspider",
            status: response.status().as_u16(),
        })
    }
}
