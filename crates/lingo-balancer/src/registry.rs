//! Routing index over the adapter fleet.
//!
//! The registry answers one question on the hot path ("which ready
//! upstream serves this `(source, target)` pair?") and keeps two views
//! consistent while adapters come and go:
//!
//! - per-pair **target entries** holding the ready adapters and a cached
//!   weighted distribution over them, and
//! - the aggregated **supported-languages snapshot**, a pre-serialized
//!   JSON answer for capability queries.
//!
//! Source and target entries are created lazily and never destroyed, so
//! routing code can hold an `Arc` to an entry without any lifetime
//! coordination; only the membership list inside an entry changes.
//! Membership changes (`on_adapter_ready` / `on_adapter_disconnected`)
//! are serialized against each other by a dedicated mutex so the snapshot
//! always reflects a complete update, while selection only ever takes
//! shared locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use tracing::{debug, info, warn};

use lingo_core::lang::{LangUid, LanguageRegistry};
use lingo_core::messaging::SuppLangResponse;

use crate::adapter::{AdapterObserver, UpstreamAdapter, UpstreamConfig};
use crate::error::AdapterError;

/// Routing node for a single `(source, target)` language pair.
pub struct TargetEntry {
    routing: RwLock<TargetRouting>,
}

#[derive(Default)]
struct TargetRouting {
    adapters: Vec<Arc<UpstreamAdapter>>,
    /// Cached discrete distribution over `adapters`, rebuilt on every
    /// membership change. `None` when no adapter can be drawn.
    dist: Option<WeightedIndex<u32>>,
}

impl TargetEntry {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            routing: RwLock::new(TargetRouting::default()),
        })
    }

    /// Picks an adapter for the next job.
    ///
    /// A single registered adapter is returned unconditionally, weight
    /// ignored; with more, the draw is proportional to weight and a zero
    /// weight means a zero chance.
    fn choose(&self) -> Option<Arc<UpstreamAdapter>> {
        let routing = self.routing.read();
        match routing.adapters.len() {
            0 => None,
            1 => Some(routing.adapters[0].clone()),
            _ => routing
                .dist
                .as_ref()
                .map(|dist| routing.adapters[dist.sample(&mut rand::rng())].clone()),
        }
    }

    fn has_adapters(&self) -> bool {
        !self.routing.read().adapters.is_empty()
    }
}

/// Rebuilds the cached distribution from the current member weights.
/// Caller holds the entry's write lock.
fn recalculate_weights(routing: &mut TargetRouting) {
    let weights: Vec<u32> = routing.adapters.iter().map(|a| a.weight()).collect();
    // All-zero weights leave nothing drawable; `choose` then returns none.
    routing.dist = WeightedIndex::new(&weights).ok();
    debug!(?weights, "recalculated target weights");
}

struct SourceEntry {
    targets: RwLock<HashMap<LangUid, Arc<TargetEntry>>>,
}

/// One configured adapter plus the target entries it currently appears in.
struct AdapterSlot {
    adapter: Arc<UpstreamAdapter>,
    registrations: Mutex<Vec<Arc<TargetEntry>>>,
}

/// The adapter fleet and its routing index.
pub struct AdapterRegistry {
    languages: Arc<LanguageRegistry>,
    adapters: HashMap<String, AdapterSlot>,
    sources: RwLock<HashMap<LangUid, Arc<SourceEntry>>>,
    /// Serializes membership changes against each other (not against
    /// selection) so the snapshot is never computed from a half-applied
    /// update.
    membership: Mutex<()>,
    snapshot: RwLock<String>,
}

impl AdapterRegistry {
    /// Builds the fleet from configuration. All adapters start disabled.
    pub fn new(configs: Vec<UpstreamConfig>, languages: Arc<LanguageRegistry>) -> Self {
        let adapters = configs
            .into_iter()
            .map(|config| {
                info!(
                    adapter = %config.name,
                    url = %config.url,
                    load_weight = config.load_weight,
                    "configuring upstream adapter"
                );
                let slot = AdapterSlot {
                    adapter: UpstreamAdapter::new(config),
                    registrations: Mutex::new(Vec::new()),
                };
                (slot.adapter.name().to_string(), slot)
            })
            .collect();

        let registry = Self {
            languages,
            adapters,
            sources: RwLock::new(HashMap::new()),
            membership: Mutex::new(()),
            snapshot: RwLock::new(String::new()),
        };
        // Start with a valid (empty) snapshot rather than an empty string.
        let _guard = registry.membership.lock();
        registry.rebuild_snapshot();
        drop(_guard);
        registry
    }

    /// Installs the observer on every adapter. Must run before `enable_all`.
    pub fn configure_adapters(&self, observer: Arc<dyn AdapterObserver>) -> Result<(), AdapterError> {
        for slot in self.adapters.values() {
            slot.adapter.configure(observer.clone())?;
        }
        Ok(())
    }

    /// Enables every adapter, beginning their dials.
    pub fn enable_all(&self) -> Result<(), AdapterError> {
        for slot in self.adapters.values() {
            slot.adapter.enable()?;
        }
        Ok(())
    }

    /// Disables every adapter, tearing down connections.
    pub fn disable_all(&self) {
        for slot in self.adapters.values() {
            slot.adapter.disable();
        }
    }

    /// Retries every disconnected adapter. Driven by the reconnect loop.
    pub fn reconnect_all(&self) {
        for slot in self.adapters.values() {
            slot.adapter.reconnect();
        }
    }

    /// Number of configured adapters.
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Iterates the configured adapters (for runtime reporting).
    pub fn adapters(&self) -> impl Iterator<Item = &Arc<UpstreamAdapter>> {
        self.adapters.values().map(|slot| &slot.adapter)
    }

    /// Registers a ready adapter under every language pair it reported,
    /// then recomputes the snapshot.
    pub fn on_adapter_ready(
        &self,
        adapter: &Arc<UpstreamAdapter>,
        languages: &BTreeMap<String, Vec<String>>,
    ) {
        let Some(slot) = self.adapters.get(adapter.name()) else {
            warn!(adapter = %adapter.name(), "ready notification for unknown adapter");
            return;
        };

        let _guard = self.membership.lock();
        debug!(adapter = %adapter.name(), "adapter connected");

        let mut registrations = slot.registrations.lock();
        for (source_name, target_names) in languages {
            let source_uid = self.languages.register(source_name);
            for target_name in target_names {
                let target_uid = self.languages.register(target_name);
                let entry = self.target_entry(source_uid, target_uid);
                {
                    let mut routing = entry.routing.write();
                    if !routing.adapters.iter().any(|a| Arc::ptr_eq(a, adapter)) {
                        routing.adapters.push(adapter.clone());
                        recalculate_weights(&mut routing);
                    }
                }
                if !registrations.iter().any(|e| Arc::ptr_eq(e, &entry)) {
                    registrations.push(entry);
                }
            }
        }
        drop(registrations);

        self.rebuild_snapshot();
    }

    /// Removes a disconnected adapter from every pair it was registered
    /// under, then recomputes the snapshot.
    pub fn on_adapter_disconnected(&self, adapter: &Arc<UpstreamAdapter>) {
        let Some(slot) = self.adapters.get(adapter.name()) else {
            warn!(adapter = %adapter.name(), "disconnect notification for unknown adapter");
            return;
        };

        let _guard = self.membership.lock();
        debug!(adapter = %adapter.name(), "adapter disconnected");

        let registrations: Vec<Arc<TargetEntry>> =
            std::mem::take(&mut *slot.registrations.lock());
        for entry in registrations {
            let mut routing = entry.routing.write();
            routing.adapters.retain(|a| !Arc::ptr_eq(a, adapter));
            recalculate_weights(&mut routing);
        }

        self.rebuild_snapshot();
    }

    /// Picks a ready adapter for the pair, or none if the pair is
    /// currently unserved.
    pub fn choose_adapter(&self, source: LangUid, target: LangUid) -> Option<Arc<UpstreamAdapter>> {
        self.target_entry(source, target).choose()
    }

    /// The latest serialized supported-languages answer.
    pub fn supported_languages_json(&self) -> String {
        self.snapshot.read().clone()
    }

    /// Looks up, lazily creating, the entry for a pair. Entries are never
    /// destroyed, which is what makes the returned `Arc` safe to hold
    /// without further coordination.
    fn target_entry(&self, source: LangUid, target: LangUid) -> Arc<TargetEntry> {
        let source_entry = {
            let sources = self.sources.read();
            sources.get(&source).cloned()
        };
        let source_entry = match source_entry {
            Some(entry) => entry,
            None => self
                .sources
                .write()
                .entry(source)
                .or_insert_with(|| {
                    Arc::new(SourceEntry {
                        targets: RwLock::new(HashMap::new()),
                    })
                })
                .clone(),
        };

        let target_entry = {
            let targets = source_entry.targets.read();
            targets.get(&target).cloned()
        };
        match target_entry {
            Some(entry) => entry,
            None => source_entry
                .targets
                .write()
                .entry(target)
                .or_insert_with(TargetEntry::new)
                .clone(),
        }
    }

    /// Serializes the current language pair coverage. Caller holds the
    /// membership mutex.
    fn rebuild_snapshot(&self) {
        let mut languages: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let sources = self.sources.read();
        for (source_uid, source_entry) in sources.iter() {
            let targets = source_entry.targets.read();
            let mut target_names: Vec<String> = targets
                .iter()
                .filter(|(_, entry)| entry.has_adapters())
                .filter_map(|(uid, _)| self.languages.name(*uid))
                .collect();
            if target_names.is_empty() {
                continue;
            }
            target_names.sort();
            if let Some(source_name) = self.languages.name(*source_uid) {
                languages.insert(source_name, target_names);
            }
        }
        drop(sources);

        let response = SuppLangResponse::new(languages);
        match serde_json::to_string(&response) {
            Ok(serialized) => {
                debug!(snapshot = %serialized, "supported languages updated");
                *self.snapshot.write() = serialized;
            }
            Err(e) => warn!(error = %e, "failed to serialize supported languages"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(name: &str, weight: u32) -> UpstreamConfig {
        UpstreamConfig {
            name: name.to_string(),
            url: format!("ws://127.0.0.1:1/{name}"),
            load_weight: weight,
        }
    }

    fn langs(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(src, tgts)| {
                (
                    src.to_string(),
                    tgts.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    fn registry_with(configs: Vec<UpstreamConfig>) -> (AdapterRegistry, Arc<LanguageRegistry>) {
        let languages = Arc::new(LanguageRegistry::new());
        let registry = AdapterRegistry::new(configs, languages.clone());
        (registry, languages)
    }

    fn adapter_named(registry: &AdapterRegistry, name: &str) -> Arc<UpstreamAdapter> {
        registry
            .adapters()
            .find(|a| a.name() == name)
            .cloned()
            .unwrap()
    }

    #[test]
    fn empty_pair_has_no_route() {
        let (registry, languages) = registry_with(vec![upstream("a", 1)]);
        let en = languages.register("en");
        let nl = languages.register("nl");
        assert!(registry.choose_adapter(en, nl).is_none());
    }

    #[test]
    fn single_adapter_is_always_chosen() {
        let (registry, languages) = registry_with(vec![upstream("a", 0)]);
        let adapter = adapter_named(&registry, "a");
        registry.on_adapter_ready(&adapter, &langs(&[("en", &["nl"])]));

        let en = languages.register("en");
        let nl = languages.register("nl");
        // Weight 0 is ignored on the single-adapter path.
        for _ in 0..100 {
            let chosen = registry.choose_adapter(en, nl).unwrap();
            assert!(Arc::ptr_eq(&chosen, &adapter));
        }
    }

    #[test]
    fn zero_weight_adapter_is_never_drawn_among_many() {
        let (registry, languages) = registry_with(vec![upstream("a", 1), upstream("b", 0)]);
        let a = adapter_named(&registry, "a");
        let b = adapter_named(&registry, "b");
        registry.on_adapter_ready(&a, &langs(&[("en", &["nl"])]));
        registry.on_adapter_ready(&b, &langs(&[("en", &["nl"])]));

        let en = languages.register("en");
        let nl = languages.register("nl");
        for _ in 0..1000 {
            let chosen = registry.choose_adapter(en, nl).unwrap();
            assert!(Arc::ptr_eq(&chosen, &a));
        }
    }

    #[test]
    fn all_zero_weights_leave_nothing_drawable() {
        let (registry, languages) = registry_with(vec![upstream("a", 0), upstream("b", 0)]);
        let a = adapter_named(&registry, "a");
        let b = adapter_named(&registry, "b");
        registry.on_adapter_ready(&a, &langs(&[("en", &["nl"])]));
        registry.on_adapter_ready(&b, &langs(&[("en", &["nl"])]));

        let en = languages.register("en");
        let nl = languages.register("nl");
        assert!(registry.choose_adapter(en, nl).is_none());
    }

    #[test]
    fn weighted_draw_matches_configured_ratio() {
        let (registry, languages) = registry_with(vec![upstream("a", 3), upstream("b", 1)]);
        let a = adapter_named(&registry, "a");
        let b = adapter_named(&registry, "b");
        registry.on_adapter_ready(&a, &langs(&[("en", &["nl"])]));
        registry.on_adapter_ready(&b, &langs(&[("en", &["nl"])]));

        let en = languages.register("en");
        let nl = languages.register("nl");
        let total = 10_000;
        let mut hits_a = 0usize;
        for _ in 0..total {
            let chosen = registry.choose_adapter(en, nl).unwrap();
            if Arc::ptr_eq(&chosen, &a) {
                hits_a += 1;
            }
        }
        // Expected share 0.75 within +-2%.
        let share = hits_a as f64 / total as f64;
        assert!((share - 0.75).abs() < 0.02, "share was {share}");
    }

    #[test]
    fn membership_and_registrations_stay_in_sync() {
        let (registry, languages) = registry_with(vec![upstream("a", 1)]);
        let adapter = adapter_named(&registry, "a");
        registry.on_adapter_ready(&adapter, &langs(&[("en", &["nl", "de"])]));

        let slot = registry.adapters.get("a").unwrap();
        assert_eq!(slot.registrations.lock().len(), 2);
        for entry in slot.registrations.lock().iter() {
            assert!(
                entry
                    .routing
                    .read()
                    .adapters
                    .iter()
                    .any(|a| Arc::ptr_eq(a, &adapter))
            );
        }

        registry.on_adapter_disconnected(&adapter);
        assert!(slot.registrations.lock().is_empty());

        let en = languages.register("en");
        let nl = languages.register("nl");
        let de = languages.register("de");
        assert!(registry.choose_adapter(en, nl).is_none());
        assert!(registry.choose_adapter(en, de).is_none());
    }

    #[test]
    fn duplicate_ready_does_not_double_register() {
        let (registry, languages) = registry_with(vec![upstream("a", 1)]);
        let adapter = adapter_named(&registry, "a");
        let pairs = langs(&[("en", &["nl"])]);
        registry.on_adapter_ready(&adapter, &pairs);
        registry.on_adapter_ready(&adapter, &pairs);

        let en = languages.register("en");
        let nl = languages.register("nl");
        let entry = registry.target_entry(en, nl);
        assert_eq!(entry.routing.read().adapters.len(), 1);
        assert_eq!(
            registry.adapters.get("a").unwrap().registrations.lock().len(),
            1
        );
    }

    #[test]
    fn snapshot_tracks_membership() {
        let (registry, _languages) = registry_with(vec![upstream("a", 1), upstream("b", 1)]);
        let a = adapter_named(&registry, "a");
        let b = adapter_named(&registry, "b");

        let empty: SuppLangResponse =
            serde_json::from_str(&registry.supported_languages_json()).unwrap();
        assert!(empty.languages.is_empty());

        registry.on_adapter_ready(&a, &langs(&[("en", &["nl"])]));
        registry.on_adapter_ready(&b, &langs(&[("en", &["de"]), ("nl", &["en"])]));

        let snapshot: SuppLangResponse =
            serde_json::from_str(&registry.supported_languages_json()).unwrap();
        assert!(snapshot.supports("en", "nl"));
        assert!(snapshot.supports("en", "de"));
        assert!(snapshot.supports("nl", "en"));

        registry.on_adapter_disconnected(&b);
        let snapshot: SuppLangResponse =
            serde_json::from_str(&registry.supported_languages_json()).unwrap();
        assert!(snapshot.supports("en", "nl"));
        assert!(!snapshot.supports("en", "de"));
        assert!(!snapshot.supports("nl", "en"));
    }

    #[test]
    fn snapshot_is_idempotent_without_changes() {
        let (registry, _languages) = registry_with(vec![upstream("a", 1)]);
        let adapter = adapter_named(&registry, "a");
        registry.on_adapter_ready(&adapter, &langs(&[("en", &["nl", "de"])]));

        let first = registry.supported_languages_json();
        let _guard = registry.membership.lock();
        registry.rebuild_snapshot();
        drop(_guard);
        let second = registry.supported_languages_json();
        assert_eq!(first, second);
    }

    #[test]
    fn distribution_follows_membership_changes() {
        let (registry, languages) = registry_with(vec![upstream("a", 3), upstream("b", 1)]);
        let a = adapter_named(&registry, "a");
        let b = adapter_named(&registry, "b");
        registry.on_adapter_ready(&a, &langs(&[("en", &["nl"])]));
        registry.on_adapter_ready(&b, &langs(&[("en", &["nl"])]));

        // After `a` drops out, every draw must land on `b`.
        registry.on_adapter_disconnected(&a);
        let en = languages.register("en");
        let nl = languages.register("nl");
        for _ in 0..100 {
            let chosen = registry.choose_adapter(en, nl).unwrap();
            assert!(Arc::ptr_eq(&chosen, &b));
        }
    }
}
