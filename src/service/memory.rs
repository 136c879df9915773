//! In-memory [`DocumentService`] implementation for tests.
//!
//! Databases are `BTreeMap`s of id → document behind a single
//! `std::sync::RwLock`, so find order is id order and inserts are atomic:
//! two concurrent inserts under the same id resolve to one `Created` and one
//! `Conflict`, exactly like the real service.
//!
//! [`fail_requests`](InMemoryService::fail_requests) switches every call to
//! an error, for exercising degraded-initialization paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Document, Selector};

use super::{DocumentService, InsertOutcome, InsertReceipt};

/// In-memory document service for tests.
pub struct InMemoryService {
    databases: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    failing: AtomicBool,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(BTreeMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// When enabled, every service call fails with an injected error.
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("injected service failure");
        }
        Ok(())
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentService for InMemoryService {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let databases = self.databases.read().unwrap();
        Ok(databases.keys().cloned().collect())
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        self.check_available()?;
        let mut databases = self.databases.write().unwrap();
        databases.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn find(&self, db: &str, selector: &Selector) -> Result<Vec<Document>> {
        self.check_available()?;
        let databases = self.databases.read().unwrap();
        let docs = match databases.get(db) {
            Some(docs) => docs,
            None => bail!("no such database: '{}'", db),
        };
        Ok(docs
            .values()
            .filter(|doc| selector.matches(doc))
            .cloned()
            .collect())
    }

    async fn insert(&self, db: &str, doc: &Document) -> Result<InsertOutcome> {
        self.check_available()?;
        let mut databases = self.databases.write().unwrap();
        let docs = match databases.get_mut(db) {
            Some(docs) => docs,
            None => bail!("no such database: '{}'", db),
        };

        let id = match doc.id() {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        if docs.contains_key(&id) {
            return Ok(InsertOutcome::Conflict);
        }

        let rev = format!("1-{}", Uuid::new_v4().simple());
        let mut stored = doc.clone();
        stored.set_id(&id);
        stored.set_rev(&rev);
        docs.insert(id.clone(), stored);

        Ok(InsertOutcome::Created(InsertReceipt { id, rev }))
    }
}
