//! Editing session.
//!
//! A [`Session`] is what a host holds on to: the module catalog, the undo
//! history whose present is the current document, and the derivation cache.
//! The current document is only ever replaced wholesale. Readers take an
//! `Arc<Document>` and keep a consistent snapshot for as long as they like.

use std::sync::Arc;

use tracing::info;

use crate::cache::DerivationCache;
use crate::command::{apply, EditCommand};
use crate::config::SessionConfig;
use crate::derive::{DerivedEdge, DerivedGraph};
use crate::document::Document;
use crate::error::CoreError;
use crate::history::History;
use crate::module::{ModuleCatalog, ModuleContract};

pub struct Session {
    catalog: Arc<ModuleCatalog>,
    history: History,
    config: SessionConfig,
    cache: DerivationCache,
}

impl Session {
    /// Starts a session on an empty document.
    pub fn new(catalog: Arc<ModuleCatalog>, config: SessionConfig) -> Self {
        let document = Document::new(config.bus_count);
        Session {
            history: History::with_limit(document, config.history_limit),
            catalog,
            config,
            cache: DerivationCache::new(),
        }
    }

    /// Starts a session on an existing document, which must be consistent
    /// with `catalog`.
    pub fn with_document(
        catalog: Arc<ModuleCatalog>,
        config: SessionConfig,
        document: Document,
    ) -> Result<Self, CoreError> {
        let mut session = Session::new(catalog, config);
        session.replace(document)?;
        Ok(session)
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The current document snapshot.
    pub fn document(&self) -> Arc<Document> {
        Arc::clone(self.history.present())
    }

    pub fn lookup_module(&self, module_type: &str) -> Result<&ModuleContract, CoreError> {
        self.catalog.lookup(module_type)
    }

    /// Applies a command and records the result in history.
    pub fn dispatch(&mut self, command: &EditCommand) -> Result<Arc<Document>, CoreError> {
        let next = apply(
            self.history.present(),
            &self.catalog,
            self.config.cycle_policy,
            command,
        )?;
        self.history.push(next);
        Ok(self.document())
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        if moved {
            info!(depth = self.history.undo_depth(), "undo");
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        if moved {
            info!(depth = self.history.redo_depth(), "redo");
        }
        moved
    }

    /// Swaps in a whole document, e.g. after a load. History is reset.
    pub fn replace(&mut self, document: Document) -> Result<(), CoreError> {
        document.validate(&self.catalog)?;
        info!(nodes = document.node_count(), "replaced document; history reset");
        self.history.reset(document);
        Ok(())
    }

    /// Derived edges of the current document.
    pub fn edges(&mut self) -> Arc<[DerivedEdge]> {
        let document = self.document();
        self.cache.edges(&document)
    }

    /// Derived graph of the current document.
    pub fn graph(&mut self) -> DerivedGraph {
        let document = self.document();
        let edges = self.cache.edges(&document);
        DerivedGraph::from_edges(&document, &edges)
    }
}
