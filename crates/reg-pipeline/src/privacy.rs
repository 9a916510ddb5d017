//! Single-slot cache for the default privacy list document.
//!
//! The document is parsed at most once per stored value. A failed parse is
//! cached too, as "no template", until the value is rewritten.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error};
use xmltree::Element;

use reg_core::Result;

use crate::template::parse_document;

#[derive(Debug, Default)]
struct Slot {
    loaded: bool,
    template: Option<Arc<Element>>,
}

/// Lazily parsed privacy list template.
///
/// Readers and the invalidation path share one lock, so a registration can
/// never cache a document that an administrator has already replaced.
#[derive(Debug, Default)]
pub struct PrivacyListCache {
    slot: RwLock<Slot>,
    generation: AtomicU64,
    parses: AtomicU64,
}

impl PrivacyListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached template, parsing the output of `load` on a miss.
    ///
    /// `load` runs under the cache's write lock. A `load` error is returned
    /// and leaves the cache unloaded; a parse failure is logged and cached
    /// as `None`.
    pub fn get<F>(&self, load: F) -> Result<Option<Arc<Element>>>
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        {
            let slot = self.slot.read();
            if slot.loaded {
                return Ok(slot.template.clone());
            }
        }

        let mut slot = self.slot.write();
        if slot.loaded {
            return Ok(slot.template.clone());
        }

        let source = load()?;
        self.parses.fetch_add(1, Ordering::Relaxed);
        slot.template = match source {
            Some(source) => match parse_document("privacy list", &source) {
                Ok(root) => Some(Arc::new(root)),
                Err(err) => {
                    error!(error = %err, "privacy list can not be parsed into a valid privacy list");
                    None
                }
            },
            None => {
                error!("privacy list is enabled but no privacy list document is configured");
                None
            }
        };
        slot.loaded = true;
        debug!(cached = slot.template.is_some(), "privacy list cache filled");
        Ok(slot.template.clone())
    }

    /// Forgets the cached template.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write();
        self.clear(&mut slot);
    }

    /// Runs `write` (typically the settings update) and invalidates while
    /// holding the cache lock.
    pub fn update<T, F>(&self, write: F) -> T
    where
        F: FnOnce() -> T,
    {
        let mut slot = self.slot.write();
        let out = write();
        self.clear(&mut slot);
        out
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().loaded
    }

    /// Number of invalidations so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Number of times a document has been parsed.
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    fn clear(&self, slot: &mut Slot) {
        slot.loaded = false;
        slot.template = None;
        self.generation.fetch_add(1, Ordering::Relaxed);
    }
}
