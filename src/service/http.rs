//! HTTP implementation of [`DocumentService`] speaking the CouchDB REST
//! dialect.
//!
//! # Endpoints
//!
//! | Call | Request | Notes |
//! |------|---------|-------|
//! | `list_databases` | `GET /_all_dbs` | |
//! | `create_database` | `PUT /{db}` | 412 "already exists" is success |
//! | `find` | `POST /{db}/_find` | Mango selector body |
//! | `insert` | `POST /{db}` | 409 maps to [`InsertOutcome::Conflict`] |
//!
//! Every request carries the configured per-call timeout; basic auth is
//! attached when credentials are configured. A `_find` response without a
//! well-formed `docs` array parses as an empty result set so lookups stay
//! total.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::DatabaseConfig;
use crate::models::{Document, Selector};

use super::{DocumentService, InsertOutcome, InsertReceipt};

/// HTTP status CouchDB returns when a created database already exists.
const STATUS_PRECONDITION_FAILED: u16 = 412;
/// HTTP status CouchDB returns for a conflicting document id.
const STATUS_CONFLICT: u16 = 409;

/// A CouchDB-compatible [`DocumentService`] over HTTP.
pub struct CouchClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl CouchClient {
    /// Build a client from the database configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentService for CouchClient {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let response = self
            .authed(self.client.get(self.url("_all_dbs")))
            .send()
            .await
            .context("listing databases")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("list databases failed with {}: {}", status, body);
        }

        response
            .json::<Vec<String>>()
            .await
            .context("parsing database list")
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        let response = self
            .authed(self.client.put(self.url(name)))
            .send()
            .await
            .with_context(|| format!("creating database '{}'", name))?;

        let status = response.status();
        // Concurrent initializers race list-then-create; the loser's 412 is
        // the same end state as a win.
        if status.is_success() || status.as_u16() == STATUS_PRECONDITION_FAILED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        bail!("create database '{}' failed with {}: {}", name, status, body);
    }

    async fn find(&self, db: &str, selector: &Selector) -> Result<Vec<Document>> {
        let body = serde_json::json!({ "selector": selector.to_json() });
        let response = self
            .authed(self.client.post(self.url(&format!("{}/_find", db))))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("finding documents in '{}'", db))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("find in '{}' failed with {}: {}", db, status, body);
        }

        let json: Value = response.json().await.context("parsing find response")?;
        Ok(parse_find_response(&json))
    }

    async fn insert(&self, db: &str, doc: &Document) -> Result<InsertOutcome> {
        let response = self
            .authed(self.client.post(self.url(db)))
            .json(doc)
            .send()
            .await
            .with_context(|| format!("inserting document into '{}'", db))?;

        let status = response.status();
        if status.as_u16() == STATUS_CONFLICT {
            return Ok(InsertOutcome::Conflict);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("insert into '{}' failed with {}: {}", db, status, body);
        }

        let json: Value = response.json().await.context("parsing insert response")?;
        let receipt = parse_insert_response(&json)
            .with_context(|| format!("invalid insert response from '{}'", db))?;
        Ok(InsertOutcome::Created(receipt))
    }
}

/// Extract the `docs` array from a `_find` response.
///
/// A missing or malformed `docs` field yields an empty list; entries that are
/// not JSON objects are dropped.
fn parse_find_response(json: &Value) -> Vec<Document> {
    json.get("docs")
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(|value| Document::from_value(value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract the id/revision receipt from an insert response.
fn parse_insert_response(json: &Value) -> Result<InsertReceipt> {
    let id = json
        .get("id")
        .and_then(Value::as_str)
        .context("missing id")?;
    let rev = json
        .get("rev")
        .and_then(Value::as_str)
        .context("missing rev")?;
    Ok(InsertReceipt {
        id: id.to_string(),
        rev: rev.to_string(),
    })
}
