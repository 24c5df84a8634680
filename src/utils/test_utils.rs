#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::core::app::App;
#[cfg(test)]
use crate::core::config::ResolvedConfig;
#[cfg(test)]
use crate::core::notice::test_support::RecordingNotifier;
#[cfg(test)]
use crate::storage::MemoryStore;

#[cfg(test)]
pub fn create_test_app() -> (App, Arc<MemoryStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let config = ResolvedConfig {
        base_url: "http://relay.test".to_string(),
        api_key: "test-key".to_string(),
        greeting: "Hi! Ask me about deals.".to_string(),
    };
    let app = App::new(&config, store.clone(), store.clone(), notifier.clone());
    (app, store, notifier)
}
