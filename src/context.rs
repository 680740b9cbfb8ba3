use std::sync::Arc;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::store::ObjectStore;

/// Everything a run shares across its components. Read-only once built.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ObjectStore>,
    pub run_id: Uuid,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            run_id: Uuid::now_v7(),
        }
    }
}
