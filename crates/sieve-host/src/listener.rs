use std::sync::Arc;

use sieve_core::RawSettings;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::FilterEngine;

/// Apply every settings value the host publishes on `settings`, starting with
/// the current one. The task ends when the sender is dropped.
///
/// A rejected value is logged and the previous settings stay in effect.
pub fn spawn_settings_listener(
    engine: Arc<FilterEngine>,
    mut settings: watch::Receiver<RawSettings>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let raw = settings.borrow_and_update().clone();
            if let Err(err) = engine.apply_settings(raw) {
                log::warn!("rejected settings change: {err}");
            }
            if settings.changed().await.is_err() {
                log::debug!("settings source closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use sieve_core::BlockingLevel;

    #[tokio::test]
    async fn applies_published_settings() {
        let engine = Arc::new(FilterEngine::new(EngineConfig::default()).unwrap());
        let (tx, rx) = watch::channel(RawSettings {
            blocking_level: 0,
            ..RawSettings::default()
        });
        let task = spawn_settings_listener(engine.clone(), rx);

        tx.send(RawSettings {
            blocking_level: 9,
            ..RawSettings::default()
        })
        .unwrap();
        tx.send(RawSettings {
            blocking_level: 2,
            content_types: vec!["image".into()],
            exception_domains: vec!["www.News.com".into()],
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let settings = engine.settings();
        assert_eq!(settings.blocking_level, BlockingLevel::All);
        assert!(settings.is_exception_domain("news.com"));
    }

    #[tokio::test]
    async fn invalid_settings_keep_previous() {
        let engine = Arc::new(FilterEngine::new(EngineConfig::default()).unwrap());
        let (tx, rx) = watch::channel(RawSettings {
            blocking_level: 5,
            ..RawSettings::default()
        });
        drop(tx);
        spawn_settings_listener(engine.clone(), rx).await.unwrap();
        assert_eq!(engine.settings().blocking_level, BlockingLevel::ThirdParty);
    }
}
