//! Shared filter state
//!
//! The index and the settings sit behind [`ArcSwap`]s. Every request loads
//! one snapshot of each and is decided against it; reloads and settings
//! changes build the replacement off to the side and swap it in.

use std::sync::Arc;

use arc_swap::ArcSwap;
use sieve_compiler::BuildStats;
use sieve_core::{
    BlockedRequestCounter, BlockingSettings, CountStore, CountStoreError, Decision, FilterIndex,
    ParamRewriter, PolicyGate, RawSettings, RequestDescriptor, SettingsError, Verdict,
};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::loader::load_lists;

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("none of the {0} configured filter lists could be read")]
    AllListsFailed(usize),
    #[error("reload task failed: {0}")]
    TaskFailed(String),
}

pub struct FilterEngine {
    config: EngineConfig,
    index: ArcSwap<FilterIndex>,
    settings: ArcSwap<BlockingSettings>,
    gate: PolicyGate,
}

impl FilterEngine {
    /// An engine with an empty index. Call [`FilterEngine::reload_now`] or
    /// [`FilterEngine::reload_in_background`] to load the configured lists.
    pub fn new(config: EngineConfig) -> Result<Self, SettingsError> {
        Self::with_counter(config, BlockedRequestCounter::new())
    }

    /// Like [`FilterEngine::new`], starting the blocked count from `store`.
    pub fn with_store(config: EngineConfig, store: &dyn CountStore) -> Result<Self, SettingsError> {
        let persisted = store.load().unwrap_or_else(|err| {
            log::error!("cannot read blocked-request count, starting from 0: {err}");
            0
        });
        Self::with_counter(config, BlockedRequestCounter::with_persisted(persisted))
    }

    fn with_counter(config: EngineConfig, counter: BlockedRequestCounter) -> Result<Self, SettingsError> {
        let settings = BlockingSettings::from_raw(&config.settings)?;
        let rewriter = ParamRewriter::builtin().with_extra(
            &config.extra_tracking_params,
            &config.extra_site_tracking_params,
        );

        Ok(Self {
            index: ArcSwap::from_pointee(FilterIndex::empty()),
            settings: ArcSwap::from_pointee(settings),
            gate: PolicyGate::new(rewriter, counter),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The index currently used for new requests.
    pub fn index(&self) -> Arc<FilterIndex> {
        self.index.load_full()
    }

    pub fn settings(&self) -> Arc<BlockingSettings> {
        self.settings.load_full()
    }

    pub fn install_index(&self, index: FilterIndex) {
        let stats = index.stats();
        self.index.store(Arc::new(index));
        log::info!(
            "filter index swapped in: {} rules, {} exceptions",
            stats.rules,
            stats.exceptions
        );
    }

    /// Load every configured list and swap the result in, on this thread.
    pub fn reload_now(&self) -> Result<BuildStats, ReloadError> {
        let (index, stats) = build_index(&self.config)?;
        self.install_index(index);
        Ok(stats)
    }

    /// Load and build on the blocking pool, then swap. Requests keep using
    /// the previous index until the swap; a failed reload keeps it for good.
    pub fn reload_in_background(self: &Arc<Self>) -> JoinHandle<Result<BuildStats, ReloadError>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let config = engine.config.clone();
            let built = match tokio::task::spawn_blocking(move || build_index(&config)).await {
                Ok(built) => built,
                Err(err) => Err(ReloadError::TaskFailed(err.to_string())),
            };

            match built {
                Ok((index, stats)) => {
                    engine.install_index(index);
                    Ok(stats)
                }
                Err(err) => {
                    log::error!("filter reload failed, keeping the previous index: {err}");
                    Err(err)
                }
            }
        })
    }

    pub fn apply_settings_json(&self, json: &str) -> Result<(), SettingsError> {
        let raw: RawSettings = serde_json::from_str(json)?;
        self.apply_settings(raw)
    }

    /// Normalize and install new settings. Invalid settings leave the current
    /// ones in place.
    pub fn apply_settings(&self, raw: RawSettings) -> Result<(), SettingsError> {
        let settings = BlockingSettings::from_raw(&raw)?;
        log::debug!(
            "settings applied: level {:?}, {} blocked types, {} exception domains",
            settings.blocking_level,
            settings.content_types.len(),
            settings.exception_domains.len()
        );
        self.settings.store(Arc::new(settings));
        Ok(())
    }

    pub fn evaluate(&self, request: &RequestDescriptor<'_>) -> Verdict {
        let index = self.index.load();
        let settings = self.settings.load();
        self.gate.evaluate(&index, &settings, request)
    }

    pub fn decide(&self, request: &RequestDescriptor<'_>) -> Decision {
        self.evaluate(request).into()
    }

    pub fn counter(&self) -> &BlockedRequestCounter {
        self.gate.counter()
    }

    pub fn blocked_total(&self) -> u64 {
        self.counter().total()
    }

    pub fn flush_count(&self, store: &dyn CountStore) -> Result<u64, CountStoreError> {
        self.counter().flush(store)
    }
}

fn build_index(config: &EngineConfig) -> Result<(FilterIndex, BuildStats), ReloadError> {
    let paths = config.list_paths();
    let loaded = load_lists(&paths);
    if loaded.all_failed() {
        return Err(ReloadError::AllListsFailed(paths.len()));
    }
    Ok(loaded.builder.build())
}
