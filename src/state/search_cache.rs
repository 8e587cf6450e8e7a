use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::{SearchPayload, ViewId};

// ---------------------------------------------------------------------------
// Request tokens
// ---------------------------------------------------------------------------

/// Generation stamp handed out when a view starts a request. Only the most
/// recently issued token for a view may publish a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    view: ViewId,
    generation: u64,
}

impl RequestToken {
    pub fn view(&self) -> ViewId {
        self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of a cache read. Never an error: a view that has not been searched
/// yet, or was cleared, reports `NoActiveSearch`.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Active(Arc<SearchPayload>),
    NoActiveSearch,
}

impl Lookup {
    pub fn payload(&self) -> Option<&Arc<SearchPayload>> {
        match self {
            Lookup::Active(p) => Some(p),
            Lookup::NoActiveSearch => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Lookup::Active(_))
    }
}

// ---------------------------------------------------------------------------
// SearchResultCache
// ---------------------------------------------------------------------------

/// Last successful payload per analysis view.
///
/// Writes replace the whole payload; nothing is merged across searches.
#[derive(Debug, Default)]
pub struct SearchResultCache {
    /// view → current payload
    payloads: DashMap<ViewId, Arc<SearchPayload>>,
    /// view → latest issued request generation
    generations: DashMap<ViewId, u64>,
}

impl SearchResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally replace the payload for `view`.
    pub fn store(&self, view: ViewId, payload: Arc<SearchPayload>) {
        self.payloads.insert(view, payload);
    }

    pub fn get(&self, view: ViewId) -> Lookup {
        match self.payloads.get(&view) {
            Some(entry) => Lookup::Active(Arc::clone(entry.value())),
            None => Lookup::NoActiveSearch,
        }
    }

    pub fn clear(&self, view: ViewId) {
        self.payloads.remove(&view);
    }

    /// Issue a new token for `view`, invalidating every earlier one.
    pub fn begin_request(&self, view: ViewId) -> RequestToken {
        let mut generation = self.generations.entry(view).or_insert(0);
        *generation += 1;
        RequestToken { view, generation: *generation }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.generations
            .get(&token.view)
            .is_some_and(|g| *g == token.generation)
    }

    /// Store `payload` only if `token` is still the latest request for its
    /// view. Returns false when the response is stale and was dropped.
    pub fn store_if_current(&self, token: RequestToken, payload: Arc<SearchPayload>) -> bool {
        // Hold the generation shard while writing so a concurrent
        // `begin_request` cannot slip in between the check and the store.
        let Some(generation) = self.generations.get(&token.view) else {
            return false;
        };
        if *generation != token.generation {
            debug!(
                view = %token.view,
                stale = token.generation,
                latest = *generation,
                "discarding stale response"
            );
            return false;
        }
        self.payloads.insert(token.view, payload);
        drop(generation);
        true
    }

    pub fn active_views(&self) -> Vec<ViewId> {
        self.payloads.iter().map(|e| *e.key()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
