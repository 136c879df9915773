//! Database bootstrap and deduplicated insertion.
//!
//! [`ConversationStore`] owns the two protocols this crate exists for:
//!
//! - **Initialization** ([`init`](ConversationStore::init)): ensure the
//!   database and its index definition exist. Safe to run any number of
//!   times; "already exists" responses are success paths. Failures are
//!   reported as [`InitStatus::Degraded`] instead of an error so the caller
//!   decides whether to proceed with a possibly-unready store.
//! - **Dedup insert** ([`add_if_not_exists`](ConversationStore::add_if_not_exists)):
//!   at most one document per `(type, property, value)` key. The document id
//!   is the SHA-256 of that key, which makes the insert itself the atomic
//!   dedup point: when two callers race past the lookup, the second insert
//!   comes back as a conflict and both converge on the winner's document.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::models::{Document, Selector, ID_FIELD};
use crate::service::{Database, DocumentService, InsertOutcome};

/// Well-known id of the index definition created during initialization.
pub const DESIGN_DOC_ID: &str = "_design/questions";

/// Readiness reported by [`ConversationStore::init`].
#[derive(Debug, Clone, PartialEq)]
pub enum InitStatus {
    /// Database and index definition are in place.
    Ready,
    /// Setup could not be completed; the store may be unready.
    Degraded(String),
}

impl InitStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Persistence layer in front of one database on a document service.
pub struct ConversationStore {
    service: Arc<dyn DocumentService>,
    db: Database,
}

impl ConversationStore {
    /// Create a store for `db_name` on `service`.
    ///
    /// The database handle is stateless, so it is bound here; [`init`](Self::init)
    /// ensures the database it points at actually exists.
    pub fn new(service: Arc<dyn DocumentService>, db_name: &str) -> Self {
        let db = Database::new(service.clone(), db_name);
        Self { service, db }
    }

    /// Ensure the database and its index definition exist.
    ///
    /// Never returns an error: any service failure is logged and folded into
    /// [`InitStatus::Degraded`], leaving the crash-or-continue decision to
    /// the caller.
    pub async fn init(&self) -> InitStatus {
        match self.ensure_ready().await {
            Ok(()) => InitStatus::Ready,
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!("store initialization incomplete: {}", reason);
                InitStatus::Degraded(reason)
            }
        }
    }

    async fn ensure_ready(&self) -> Result<()> {
        let names = self
            .service
            .list_databases()
            .await
            .context("listing databases")?;

        if !names.iter().any(|name| name == self.db.name()) {
            info!("creating database {}", self.db.name());
            self.service
                .create_database(self.db.name())
                .await
                .context("creating database")?;
        }

        let existing = self
            .db
            .find(&Selector::Id(DESIGN_DOC_ID.to_string()))
            .await
            .context("looking up index definition")?;
        if existing.is_empty() {
            info!("creating index definition {}", DESIGN_DOC_ID);
            match self
                .db
                .insert(&design_document())
                .await
                .context("creating index definition")?
            {
                InsertOutcome::Created(_) => {}
                // A concurrent initializer got there first.
                InsertOutcome::Conflict => {}
            }
        }

        Ok(())
    }

    /// Insert `doc` unless a document with the same
    /// `(type, unique_property, value)` key already exists.
    ///
    /// Returns the persisted document either way: the existing one (the
    /// caller's copy is discarded), or the caller's document stamped with its
    /// new id and revision. The result always carries both.
    ///
    /// # Errors
    ///
    /// - `doc` has no string `type` field, or no `unique_property` field;
    /// - any service failure during lookup or insert (not swallowed, unlike
    ///   initialization).
    pub async fn add_if_not_exists(
        &self,
        mut doc: Document,
        unique_property: &str,
    ) -> Result<Document> {
        let doc_type = doc
            .doc_type()
            .ok_or_else(|| anyhow!("document has no string 'type' field"))?
            .to_string();
        let value = doc
            .get(unique_property)
            .cloned()
            .ok_or_else(|| anyhow!("document has no '{}' field", unique_property))?;

        if let Some(existing) = self.find_doc(&doc_type, unique_property, &value).await? {
            debug!(
                "returning existing {} doc where {}={}",
                doc_type, unique_property, value
            );
            return Ok(existing);
        }

        debug!("creating {} doc where {}={}", doc_type, unique_property, value);
        let id = dedup_id(&doc_type, unique_property, &value);
        doc.set_id(&id);
        match self.db.insert(&doc).await? {
            InsertOutcome::Created(receipt) => {
                doc.set_id(&receipt.id);
                doc.set_rev(&receipt.rev);
                Ok(doc)
            }
            InsertOutcome::Conflict => {
                // Lost a concurrent race; the winner's document is already
                // persisted under the derived id.
                let winners = self.db.find(&Selector::Id(id.clone())).await?;
                winners
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("document {} exists but is not yet visible", id))
            }
        }
    }

    /// Find one document of `doc_type` whose `property` equals `value`.
    ///
    /// Total over empty and malformed responses: both yield `Ok(None)`. When
    /// several documents match (duplicates created before this store enforced
    /// the key), the one with the lowest id wins.
    pub async fn find_doc(
        &self,
        doc_type: &str,
        property: &str,
        value: &Value,
    ) -> Result<Option<Document>> {
        let selector = Selector::field(doc_type, property, value.clone())?;
        let mut docs = self.db.find(&selector).await?;
        docs.sort_by(|a, b| a.id().cmp(&b.id()));
        Ok(docs.into_iter().next())
    }

    /// Record a rubbish string, reusing the existing document if the same
    /// string was already recorded.
    pub async fn add_rubbish(&self, name: &str) -> Result<Document> {
        let doc = Document::of_type("rubbish").with("name", json!(name));
        self.add_if_not_exists(doc, "name").await
    }

    /// All recorded rubbish documents.
    pub async fn all_rubbish(&self) -> Result<Vec<Document>> {
        self.db.find(&Selector::Type("rubbish".to_string())).await
    }
}

/// Derive the document id for a `(type, property, value)` dedup key.
///
/// The id is the hex SHA-256 over the three components, NUL-separated so
/// distinct keys cannot collide by concatenation. Equal keys always derive
/// equal ids, which is what turns a duplicate insert into a conflict.
pub fn dedup_id(doc_type: &str, property: &str, value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(property.as_bytes());
    hasher.update([0u8]);
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The canonical index definition: counts `rubbishRequest` documents grouped
/// by name, summed by the service's built-in reduce.
fn design_document() -> Document {
    let mut doc = Document::default();
    doc.set(ID_FIELD, json!(DESIGN_DOC_ID));
    doc.set(
        "views",
        json!({
            "rubbish": {
                "map": "function (doc) {\n  if (doc.type && doc.type=='rubbishRequest') {\n    emit(doc.name, 1);\n  }\n}",
                "reduce": "_sum",
            }
        }),
    );
    doc.set("language", json!("javascript"));
    doc
}
