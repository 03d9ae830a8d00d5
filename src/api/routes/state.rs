use std::sync::Arc;

use crate::activities::ActivityStore;
use crate::notifier::Notifier;

/// Shared application state passed to all Axum handlers via `.with_state()`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ActivityStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(store: Arc<ActivityStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }
}
