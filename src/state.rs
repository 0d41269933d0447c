use std::sync::Arc;

use axum::extract::FromRef;

use crate::cache::Cache;
use crate::config::Config;
use crate::store::QuizStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuizStore>,
    pub cache: Arc<dyn Cache>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn QuizStore>, cache: Arc<dyn Cache>, config: Config) -> Self {
        Self { store, cache, config }
    }

    pub fn store(&self) -> &dyn QuizStore {
        self.store.as_ref()
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
