//! Minimal PubChem PUG REST client.
//!
//! Identifiers are sent as form fields rather than path segments so that
//! SMILES and InChI strings need no escaping. A 404 from PUG means the
//! compound is unknown, not a failure.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AnnotateError, AnnotateResult};

const BASE: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TIMEOUT: Duration = Duration::from_secs(30);

/// Search namespace understood by PUG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query<'a> {
    Name(&'a str),
    InchiKey(&'a str),
    Smiles(&'a str),
    Inchi(&'a str),
    Formula(&'a str),
}

impl Query<'_> {
    const fn namespace(self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::InchiKey(_) => "inchikey",
            Self::Smiles(_) => "smiles",
            Self::Inchi(_) => "inchi",
            Self::Formula(_) => "fastformula",
        }
    }

    const fn field(self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::InchiKey(_) => "inchikey",
            Self::Smiles(_) => "smiles",
            Self::Inchi(_) => "inchi",
            Self::Formula(_) => "formula",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompoundProperties {
    #[serde(rename = "CID")]
    pub cid: u64,
    #[serde(rename = "CanonicalSMILES", default)]
    pub canonical_smiles: Option<String>,
    #[serde(rename = "InChI", default)]
    pub inchi: Option<String>,
    #[serde(rename = "InChIKey", default)]
    pub inchikey: Option<String>,
    #[serde(rename = "IUPACName", default)]
    pub iupac_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct CidResponse {
    #[serde(rename = "IdentifierList")]
    identifier_list: IdentifierList,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<CompoundProperties>,
}

#[derive(Debug, Deserialize)]
struct PropertyResponse {
    #[serde(rename = "PropertyTable")]
    property_table: PropertyTable,
}

#[derive(Debug, Deserialize)]
struct SynonymInformation {
    #[serde(rename = "Synonym", default)]
    synonym: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InformationList {
    #[serde(rename = "Information", default)]
    information: Vec<SynonymInformation>,
}

#[derive(Debug, Deserialize)]
struct SynonymResponse {
    #[serde(rename = "InformationList")]
    information_list: InformationList,
}

#[derive(Debug, Clone)]
pub struct PubChem {
    client: Client,
}

impl PubChem {
    pub fn new() -> AnnotateResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TIMEOUT)
            .user_agent(concat!("molminer/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Compound IDs matching a query; empty when nothing matches.
    pub async fn cids(&self, query: Query<'_>) -> AnnotateResult<Vec<u64>> {
        let url = format!("{BASE}/compound/{}/cids/JSON", query.namespace());
        let value = match query {
            Query::Name(v)
            | Query::InchiKey(v)
            | Query::Smiles(v)
            | Query::Inchi(v)
            | Query::Formula(v) => v,
        };
        let response = self
            .client
            .post(&url)
            .form(&[(query.field(), value)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check(response).await?;
        let body: CidResponse = response.json().await?;
        Ok(body.identifier_list.cid)
    }

    /// Canonical identifiers and IUPAC name of one compound.
    pub async fn properties(&self, cid: u64) -> AnnotateResult<Option<CompoundProperties>> {
        let url = format!(
            "{BASE}/compound/cid/{cid}/property/CanonicalSMILES,InChI,InChIKey,IUPACName/JSON"
        );
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check(response).await?;
        let body: PropertyResponse = response.json().await?;
        Ok(body.property_table.properties.into_iter().next())
    }

    pub async fn synonyms(&self, cid: u64) -> AnnotateResult<Vec<String>> {
        let url = format!("{BASE}/compound/cid/{cid}/synonyms/JSON");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check(response).await?;
        let body: SynonymResponse = response.json().await?;
        Ok(body
            .information_list
            .information
            .into_iter()
            .next()
            .map(|info| info.synonym)
            .unwrap_or_default())
    }
}

async fn check(response: reqwest::Response) -> AnnotateResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(AnnotateError::Api {
            service: "pubchem",
            status: response.status().as_u16(),
        })
    }
}
