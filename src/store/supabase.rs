use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{StoreError, StoreResult, TableStore};
use crate::config::SupabaseConfig;

/// PostgREST client for a Supabase project (`{url}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    rest_base: String,
    http: Client,
}

impl SupabaseStore {
    pub fn new(cfg: &SupabaseConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut key = header::HeaderValue::from_str(&cfg.api_key)
            .context("Supabase key contains characters not allowed in a header")?;
        key.set_sensitive(true);
        let mut bearer = header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
            .context("Supabase key contains characters not allowed in a header")?;
        bearer.set_sensitive(true);
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);

        let http = Client::builder()
            .user_agent(concat!("atlas-import/", env!("CARGO_PKG_VERSION")))
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            rest_base: format!("{}/rest/v1", cfg.url.as_str().trim_end_matches('/')),
            http,
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/{}", self.rest_base, table)
    }

    async fn send(&self, table: &str, req: RequestBuilder) -> StoreResult<Response> {
        let resp = req.send().await.map_err(|source| StoreError::Transport {
            table: table.to_string(),
            source,
        })?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Status {
            table: table.to_string(),
            status: status.as_u16(),
            message: postgrest_message(&body),
        })
    }

    async fn rows(&self, table: &str, resp: Response) -> StoreResult<Vec<Value>> {
        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Decode {
                table: table.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl TableStore for SupabaseStore {
    #[instrument(level = "debug", skip(self))]
    async fn select(&self, table: &str, columns: &str) -> StoreResult<Vec<Value>> {
        let req = self.http.get(self.endpoint(table)).query(&[("select", columns)]);
        let resp = self.send(table, req).await?;
        self.rows(table, resp).await
    }

    #[instrument(level = "debug", skip(self, values), fields(count = values.len()))]
    async fn select_in(
        &self,
        table: &str,
        columns: &str,
        column: &str,
        values: &[String],
    ) -> StoreResult<Vec<Value>> {
        let filter = in_filter(values);
        let req = self
            .http
            .get(self.endpoint(table))
            .query(&[("select", columns), (column, filter.as_str())]);
        let resp = self.send(table, req).await?;
        self.rows(table, resp).await
    }

    #[instrument(level = "debug", skip(self, rows), fields(count = rows.len()))]
    async fn insert(
        &self,
        table: &str,
        rows: &[Value],
        returning: &str,
    ) -> StoreResult<Vec<Value>> {
        let req = self
            .http
            .post(self.endpoint(table))
            .query(&[("select", returning)])
            .header("Prefer", "return=representation")
            .json(rows);
        let resp = self.send(table, req).await?;
        let inserted = self.rows(table, resp).await?;
        debug!(inserted = inserted.len(), "insert acknowledged");
        Ok(inserted)
    }

    #[instrument(level = "debug", skip(self, patch))]
    async fn update_eq(
        &self,
        table: &str,
        patch: &Value,
        column: &str,
        value: &str,
    ) -> StoreResult<()> {
        let filter = format!("eq.{value}");
        let req = self
            .http
            .patch(self.endpoint(table))
            .query(&[(column, filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(patch);
        self.send(table, req).await?;
        Ok(())
    }
}

/// PostgREST `in.(...)` operand. Every value is double-quoted so slugs holding
/// commas, dots or parentheses survive; `"` and `\` are backslash-escaped.
pub fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

/// Prefer the `message` (plus `details`/`hint`) PostgREST puts in error bodies.
fn postgrest_message(body: &str) -> String {
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let Some(message) = v.get("message").and_then(Value::as_str) else {
        return body.trim().to_string();
    };
    let mut out = message.to_string();
    for extra in ["details", "hint"] {
        if let Some(s) = v.get(extra).and_then(Value::as_str) {
            if !s.is_empty() {
                out.push_str(&format!(" ({extra}: {s})"));
            }
        }
    }
    out
}
