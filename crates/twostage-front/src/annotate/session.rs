use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use twostage_core::CancellationToken;

use super::AnnotationCache;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One compilation session: its own annotation cache and cancellation flag.
///
/// Sessions share nothing, so independent sessions may compile on separate
/// threads. Two handles to the same session compare equal.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    cache: Arc<AnnotationCache>,
    cancellation: CancellationToken,
}

impl Session {
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            id: SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)),
            cache: Arc::new(AnnotationCache::new()),
            cancellation,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn cache(&self) -> &AnnotationCache {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Session {}

impl std::hash::Hash for Session {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id.0)
            .field("annotations", &self.cache.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}
