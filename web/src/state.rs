//! Application state for Axum handlers.

use client_portal_core::{ActorResolver, PortalEngine};
use std::sync::Arc;

/// Shared by every handler.
///
/// # Examples
///
/// ```ignore
/// use client_portal_core::{PortalEngine, SystemClock};
/// use client_portal_web::AppState;
/// use std::sync::Arc;
///
/// let engine = PortalEngine::new(store, Arc::new(SystemClock));
/// let state = AppState::new(engine, Arc::new(resolver));
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Engine services
    pub engine: PortalEngine,
    /// Bearer token lookup
    pub resolver: Arc<dyn ActorResolver>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(engine: PortalEngine, resolver: Arc<dyn ActorResolver>) -> Self {
        Self { engine, resolver }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
