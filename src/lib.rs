//! # Conversation Store
//!
//! **A deduplicating persistence layer for Couch-style document databases.**
//!
//! Conversation Store sits in front of a remote document database and covers
//! the two operations a chat backend actually needs from it: bootstrapping the
//! database together with its secondary index (the "design document"), and
//! inserting documents that must be unique on an application-chosen property.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────────────────┐   ┌──────────────────┐
//! │ Caller │──▶│  ConversationStore   │──▶│  DocumentService │
//! │        │   │ init / add-if-absent │   │  HTTP │ memory   │
//! └────────┘   └──────────────────────┘   └──────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The caller runs [`store::ConversationStore::init`] once at startup. It
//!    creates the database and index definition if they are missing and
//!    reports [`store::InitStatus::Ready`] or `Degraded`; re-running it is
//!    always safe.
//! 2. Each create-if-absent request goes through
//!    [`store::ConversationStore::add_if_not_exists`], which looks up the
//!    `(type, property, value)` key and inserts only when nothing matches.
//!    Document ids are derived from that key, so a concurrent duplicate
//!    insert surfaces as a conflict and both callers converge on one document.
//! 3. All traffic reaches the database through the
//!    [`service::DocumentService`] trait: [`service::http::CouchClient`] in
//!    production, [`service::memory::InMemoryService`] in tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use conversation_store::config;
//! use conversation_store::service::http::CouchClient;
//! use conversation_store::store::ConversationStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = config::load_config(Path::new("store.toml"))?;
//! let service = Arc::new(CouchClient::new(&config.database)?);
//! let store = ConversationStore::new(service, &config.database.name);
//!
//! let status = store.init().await;
//! if !status.is_ready() {
//!     eprintln!("store is degraded: {:?}", status);
//! }
//!
//! let doc = store.add_rubbish("banana peel").await?;
//! println!("stored as {:?}", doc.id());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mailer;
pub mod models;
pub mod service;
pub mod store;
