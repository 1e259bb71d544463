use crate::services::registry::TaskRegistry;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
}

impl AppState {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }
}
