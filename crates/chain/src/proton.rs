use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChainError, ClaimSource};

/// System contract that owns the staking tables.
const STAKING_CONTRACT: &str = "eosio";

/// Per-voter staking table; `lastclaim` holds the last reward claim in epoch seconds.
const VOTERS_TABLE: &str = "votersxpr";

/// Request body for `/v1/chain/get_table_rows`.
#[derive(Debug, Serialize)]
struct TableRowsRequest<'a> {
    json: bool,
    code: &'a str,
    scope: &'a str,
    table: &'a str,
    lower_bound: &'a str,
    upper_bound: &'a str,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct TableRowsResponse {
    #[serde(default)]
    rows: Vec<serde_json::Value>,
}

/// HTTP client for the XPR Network chain API.
pub struct ProtonRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ProtonRpcClient {
    /// Create a client with its own connection pool and a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, endpoint))
    }

    /// Create a client that shares an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn table_rows_url(&self) -> String {
        format!("{}/v1/chain/get_table_rows", self.endpoint)
    }
}

#[async_trait]
impl ClaimSource for ProtonRpcClient {
    async fn last_claim(&self, account: &str) -> Result<Option<DateTime<Utc>>, ChainError> {
        let account = account.trim();
        if account.is_empty() {
            return Err(ChainError::InvalidAccount(account.to_string()));
        }

        let request = TableRowsRequest {
            json: true,
            code: STAKING_CONTRACT,
            scope: STAKING_CONTRACT,
            table: VOTERS_TABLE,
            lower_bound: account,
            upper_bound: account,
            limit: 1,
        };

        let response = self
            .http
            .post(self.table_rows_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: TableRowsResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Malformed(format!("invalid get_table_rows response: {}", e)))?;

        let Some(row) = data.rows.first() else {
            tracing::debug!(account, "No staking record");
            return Ok(None);
        };

        let last_claim = parse_last_claim(row)?;
        tracing::debug!(account, last_claim = %last_claim, "Resolved last claim");
        Ok(Some(last_claim))
    }

    fn name(&self) -> &'static str {
        "proton-rpc"
    }
}

/// Extract `lastclaim` from a `votersxpr` row.
///
/// Nodes return the field either at the top level or nested under `data`, as an
/// integer, a numeric string, or an ISO-8601 `time_point_sec`.
pub fn parse_last_claim(row: &serde_json::Value) -> Result<DateTime<Utc>, ChainError> {
    let field = row
        .get("lastclaim")
        .or_else(|| row.get("data").and_then(|data| data.get("lastclaim")))
        .ok_or_else(|| ChainError::Malformed("row has no `lastclaim` field".to_string()))?;

    let seconds = match field {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ChainError::Malformed(format!("`lastclaim` out of range: {}", n)))?,
        serde_json::Value::String(s) => match s.trim().parse::<i64>() {
            Ok(secs) => secs,
            Err(_) => return parse_time_point(s),
        },
        other => {
            return Err(ChainError::Malformed(format!(
                "`lastclaim` has unexpected type: {}",
                other
            )));
        }
    };

    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| ChainError::Malformed(format!("`lastclaim` out of range: {}", seconds)))
}

fn parse_time_point(raw: &str) -> Result<DateTime<Utc>, ChainError> {
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ChainError::Malformed(format!("unrecognised `lastclaim` value: {:?}", raw)))
}
