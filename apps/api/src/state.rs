use std::sync::Arc;

use crate::generation::flow::GenerationFlow;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The generation flow owns the capability registry, model backend and
    /// prompt cache; all of it is immutable after startup apart from the cache.
    pub flow: Arc<GenerationFlow>,
}
