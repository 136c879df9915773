//! Remote document service abstraction.
//!
//! The [`DocumentService`] trait defines the operations the persistence layer
//! needs from a Couch-style document database, enabling pluggable backends
//! (HTTP in production, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`list_databases`](DocumentService::list_databases) | Names of all databases on the service |
//! | [`create_database`](DocumentService::create_database) | Create a database (exists = success) |
//! | [`find`](DocumentService::find) | Documents matching a [`Selector`] |
//! | [`insert`](DocumentService::insert) | Insert a document, reporting id conflicts |
//!
//! Selecting a database yields a [`Database`] handle, which carries no state
//! beyond the service reference and the database name and is therefore safe
//! to share across concurrent callers.

pub mod http;
pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, Selector};

/// Receipt for a newly created document.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertReceipt {
    /// Storage-assigned document id.
    pub id: String,
    /// Storage-assigned revision token.
    pub rev: String,
}

/// Outcome of an insert.
///
/// A conflicting document id is a first-class outcome rather than an error:
/// it is the signal the dedup protocol relies on to detect "already exists".
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The document was persisted under the receipt's id/revision.
    Created(InsertReceipt),
    /// A document with the same id already exists.
    Conflict,
}

/// Abstract Couch-style document database.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// List the names of all databases on the service.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// Create a database. Creating one that already exists is a success.
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Return all documents in `db` matching `selector`, in service-defined
    /// order.
    async fn find(&self, db: &str, selector: &Selector) -> Result<Vec<Document>>;

    /// Insert a document into `db`.
    ///
    /// When the document carries an `_id` that is already taken, the result
    /// is [`InsertOutcome::Conflict`]; service failures are errors.
    async fn insert(&self, db: &str, doc: &Document) -> Result<InsertOutcome>;
}

/// Handle to one selected database.
#[derive(Clone)]
pub struct Database {
    service: Arc<dyn DocumentService>,
    name: String,
}

impl Database {
    /// Select `name` on `service`.
    pub fn new(service: Arc<dyn DocumentService>, name: &str) -> Self {
        Self {
            service,
            name: name.to_string(),
        }
    }

    /// The selected database's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find documents in this database. See [`DocumentService::find`].
    pub async fn find(&self, selector: &Selector) -> Result<Vec<Document>> {
        self.service.find(&self.name, selector).await
    }

    /// Insert a document into this database. See [`DocumentService::insert`].
    pub async fn insert(&self, doc: &Document) -> Result<InsertOutcome> {
        self.service.insert(&self.name, doc).await
    }
}
