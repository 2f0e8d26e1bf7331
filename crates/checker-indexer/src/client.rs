use std::time::Duration;

use checker_core::{
  Error, Result,
  indexer::{Indexer, IndexerApplication, IndexerApplicationWithRound, IndexerRound},
  pool::PoolKey,
};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::queries;

/// Ensure the endpoint ends in exactly one `/graphql`.
pub fn normalize_endpoint(url: &str) -> String {
  let trimmed = url.trim().trim_end_matches('/');
  if trimmed.ends_with("/graphql") {
    trimmed.to_owned()
  } else {
    format!("{trimmed}/graphql")
  }
}

/// Async GraphQL client for the indexer.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct IndexerClient {
  client:   Client,
  endpoint: String,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GraphQlResponse<T> {
  data:   Option<T>,
  #[serde(default)]
  errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
  message: String,
}

impl<T> GraphQlResponse<T> {
  fn into_data(self) -> Result<T> {
    if !self.errors.is_empty() {
      let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
      return Err(Error::Transport(format!(
        "indexer returned errors: {}",
        messages.join("; ")
      )));
    }
    self
      .data
      .ok_or_else(|| Error::Transport("indexer response has no data".into()))
  }
}

#[derive(Deserialize)]
struct RoundsData<R> {
  rounds: Vec<R>,
}

#[derive(Deserialize)]
struct ApplicationsData {
  applications: Vec<ApplicationRow>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationRow {
  #[serde(flatten)]
  application: IndexerApplication,
  chain_id:    i64,
  round:       RoundRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoundRef {
  id:             String,
  #[serde(default)]
  round_metadata: Value,
}

#[derive(Deserialize)]
struct ManagerRound {
  #[serde(default)]
  roles: Vec<Role>,
}

#[derive(Deserialize)]
struct Role {
  address: String,
}

impl From<ApplicationRow> for IndexerApplicationWithRound {
  fn from(row: ApplicationRow) -> Self {
    Self {
      application:    row.application,
      chain_id:       row.chain_id,
      round_id:       row.round.id,
      round_metadata: row.round.round_metadata,
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl IndexerClient {
  pub fn new(url: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, endpoint: normalize_endpoint(url) })
  }

  pub fn endpoint(&self) -> &str { &self.endpoint }

  async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
    let resp = self
      .client
      .post(&self.endpoint)
      .json(&json!({ "query": query, "variables": variables }))
      .send()
      .await
      .map_err(|e| Error::Transport(format!("indexer request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Transport(format!("indexer returned {status}")));
    }

    let body: GraphQlResponse<T> = resp
      .json()
      .await
      .map_err(|e| Error::Transport(format!("malformed indexer response: {e}")))?;
    body.into_data()
  }
}

impl Indexer for IndexerClient {
  async fn round_with_applications(&self, key: PoolKey) -> Result<Option<IndexerRound>> {
    tracing::debug!(pool = %key, "fetching round with applications");
    let data: RoundsData<IndexerRound> = self
      .query(
        queries::ROUND_WITH_APPLICATIONS,
        json!({ "chainId": key.chain_id, "roundId": key.allo_pool_id }),
      )
      .await?;

    let round = data.rounds.into_iter().next();
    match &round {
      Some(r) => tracing::info!(
        pool = %key,
        applications = r.applications.len(),
        "fetched round"
      ),
      None => tracing::warn!(pool = %key, "round not found on indexer"),
    }
    Ok(round)
  }

  async fn application_with_round(
    &self,
    key: PoolKey,
    application_id: String,
  ) -> Result<Option<IndexerApplicationWithRound>> {
    tracing::debug!(pool = %key, application_id = %application_id, "fetching application");
    let data: ApplicationsData = self
      .query(
        queries::APPLICATION_WITH_ROUND,
        json!({
          "chainId": key.chain_id,
          "roundId": key.allo_pool_id,
          "applicationId": application_id,
        }),
      )
      .await?;
    Ok(data.applications.into_iter().next().map(Into::into))
  }

  async fn pool_managers(&self, key: PoolKey) -> Result<Vec<String>> {
    let data: RoundsData<ManagerRound> = self
      .query(
        queries::ROUND_MANAGERS,
        json!({ "chainId": key.chain_id, "alloPoolId": key.allo_pool_id }),
      )
      .await?;

    let managers: Vec<String> = data
      .rounds
      .into_iter()
      .next()
      .map(|r| r.roles.into_iter().map(|role| role.address).collect())
      .unwrap_or_default();
    if managers.is_empty() {
      tracing::warn!(pool = %key, "no managers found for pool");
    }
    Ok(managers)
  }
}
