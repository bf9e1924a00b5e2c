//! Name -> factory maps used to instantiate apps by string (launcher,
//! restore, replace-in-pane) and to rebuild apps from a snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::app::App;

pub type AppFactory = Arc<dyn Fn(Option<HashMap<String, Value>>) -> Box<dyn App> + Send + Sync>;
pub type SnapshotFactory =
    Arc<dyn Fn(String, Option<HashMap<String, Value>>) -> Option<Box<dyn App>> + Send + Sync>;

/// `name -> factory`. Unknown names return `None`; callers handle that
/// explicitly (spec.md §6).
#[derive(Default)]
pub struct AppRegistry {
    factories: HashMap<String, AppFactory>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: AppFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(&self, name: &str, config: Option<HashMap<String, Value>>) -> Option<Box<dyn App>> {
        self.factories.get(name).map(|f| f(config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

/// `app_type -> factory(title, config)`, used by [`crate::snapshot`] to
/// rebuild an app from a persisted [`crate::app::SnapshotProvider`] payload.
#[derive(Default)]
pub struct SnapshotRegistry {
    factories: HashMap<String, SnapshotFactory>,
}

impl SnapshotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, app_type: impl Into<String>, factory: SnapshotFactory) {
        self.factories.insert(app_type.into(), factory);
    }

    pub fn create(
        &self,
        app_type: &str,
        title: String,
        config: Option<HashMap<String, Value>>,
    ) -> Option<Box<dyn App>> {
        self.factories.get(app_type).and_then(|f| f(title, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::welcome::WelcomeApp;

    #[test]
    fn unknown_name_returns_none() {
        let registry = AppRegistry::new();
        assert!(registry.create("nonexistent", None).is_none());
    }

    #[test]
    fn registered_factory_constructs_an_app() {
        let mut registry = AppRegistry::new();
        registry.register("welcome", Arc::new(|_cfg| Box::new(WelcomeApp::new()) as Box<dyn App>));
        assert!(registry.create("welcome", None).is_some());
    }
}
