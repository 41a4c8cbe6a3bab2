//! Application state management

use std::sync::Arc;

use crate::anchoring::{ExclusionPolicy, PaintConfig};
use crate::annotations::AnnotationStore;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn AnnotationStore>,
    paint: PaintConfig,
    policy: ExclusionPolicy,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn AnnotationStore>) -> Self {
        let paint = PaintConfig::default().with_alpha(config.highlight.alpha);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                paint,
                policy: ExclusionPolicy::default(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn AnnotationStore {
        self.inner.store.as_ref()
    }

    pub fn paint_config(&self) -> &PaintConfig {
        &self.inner.paint
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.inner.policy
    }
}
