//! The reconcile loop.
//!
//! A [`Watcher`] polls the registry on a fixed interval, filters the
//! listing against the configured allow-lists, diffs it against the
//! persisted [`WatchState`], invokes the pack generator for every
//! outstanding entry, and persists the whole state at the end of the
//! cycle. Per-entry failures degrade throughput, never durability: the
//! successes of a partially failing cycle are always written out.

use std::sync::Arc;

use chrono::Utc;
use packwatch_config::WatchSettings;
use packwatch_registry::{PackageEntry, RegistryClient};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::{
    error::CoreError,
    filter::is_eligible,
    generator::{GenerateOptions, PackGenerator},
    shutdown::Shutdown,
    state::{StateKey, StateStore, WatchState},
    CoreResult,
};

/// Outcome counts for one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub generated: usize,
    pub up_to_date: usize,
    pub filtered: usize,
    pub failed: usize,
    pub would_generate: usize,
    /// Shutdown was observed before the cycle completed.
    pub interrupted: bool,
}

/// The watch daemon's reconcile loop.
///
/// Owns the in-memory [`WatchState`] exclusively for the lifetime of the
/// process; no other component writes it. Collaborators are blocking and
/// are bridged onto the blocking pool one call at a time, keeping state
/// mutation single-writer without locks.
pub struct Watcher {
    settings: WatchSettings,
    registry: Arc<dyn RegistryClient>,
    generator: Arc<dyn PackGenerator>,
    store: StateStore,
    state: WatchState,
}

impl Watcher {
    /// Creates a watcher, preparing directories and loading persisted state.
    ///
    /// # Errors
    ///
    /// Fails when the output directory or the state file's parent cannot be
    /// created, or the state file exists but cannot be read. These are the
    /// unrecoverable startup conditions; a merely corrupted state file is
    /// recovered as empty state by [`StateStore::load`].
    pub fn new(
        settings: WatchSettings,
        registry: Arc<dyn RegistryClient>,
        generator: Arc<dyn PackGenerator>,
    ) -> CoreResult<Self> {
        packwatch_utils::fs::ensure_dir_exists(&settings.output_dir)?;
        if let Some(parent) = settings
            .state_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            packwatch_utils::fs::ensure_dir_exists(parent)?;
        }

        let store = StateStore::new(settings.state_file.clone());
        let state = store.load()?;
        if !state.servers.is_empty() {
            info!(
                servers = state.servers.len(),
                "Restored watch state from {}",
                store.path().display()
            );
        }

        Ok(Self {
            settings,
            registry,
            generator,
            store,
            state,
        })
    }

    /// Runs the loop until shutdown is triggered.
    ///
    /// The first cycle starts immediately; subsequent cycles follow the
    /// configured poll interval. Graceful shutdown is a normal return, not
    /// an error.
    pub async fn run(mut self, mut shutdown: Shutdown) -> CoreResult<()> {
        info!(
            interval = self.settings.poll_interval.as_secs(),
            dry_run = self.settings.dry_run,
            "Starting watch loop for {}",
            self.settings.registry_url
        );

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            let stats = self.run_cycle(&shutdown).await;
            if stats.interrupted {
                break;
            }
        }

        info!("Watch loop stopped");
        Ok(())
    }

    /// Executes one Polling → Reconciling → Persisting cycle.
    async fn run_cycle(&mut self, shutdown: &Shutdown) -> CycleStats {
        let mut stats = CycleStats::default();

        // Polling. The listing is raced against shutdown; an abandoned
        // request finishes on the blocking pool and its result is dropped.
        let registry = Arc::clone(&self.registry);
        let fetch = tokio::task::spawn_blocking(move || registry.list_entries());
        let mut shutdown_rx = shutdown.clone();

        let mut entries = tokio::select! {
            biased;
            _ = shutdown_rx.triggered() => {
                stats.interrupted = true;
                return stats;
            }
            res = fetch => {
                match res {
                    Ok(Ok(entries)) => entries,
                    Ok(Err(err)) => {
                        warn!("Registry listing failed, retrying next tick: {err}");
                        return stats;
                    }
                    Err(err) => {
                        warn!("Registry listing task failed, retrying next tick: {err}");
                        return stats;
                    }
                }
            }
        };

        debug!(count = entries.len(), "Reconciling registry listing");
        entries.sort_by_cached_key(StateKey::from_entry);

        // Reconciling. One entry at a time; shutdown is honored between
        // entries, never by abandoning a generation in flight.
        for entry in &entries {
            if shutdown.is_triggered() {
                stats.interrupted = true;
                break;
            }

            let key = StateKey::from_entry(entry);
            if !is_eligible(
                entry,
                &self.settings.package_types,
                &self.settings.transport_types,
            ) {
                trace!("Skipping {key}: type not in allow-lists");
                stats.filtered += 1;
                continue;
            }

            if !self.state.needs_generation(
                &key,
                entry.updated_at,
                self.settings.force_overwrite,
            ) {
                trace!("Skipping {key}: already up to date");
                stats.up_to_date += 1;
                continue;
            }

            if self.settings.dry_run {
                info!("Would generate pack for {key}");
                stats.would_generate += 1;
                continue;
            }

            match self.generate_entry(entry).await {
                Ok(()) => {
                    self.state.record_generated(entry, Utc::now());
                    stats.generated += 1;
                    info!("Generated pack for {key}");
                }
                Err(err) => {
                    stats.failed += 1;
                    warn!("Pack generation failed for {key}: {err}");
                }
            }
        }

        // Persisting. Always runs, even after per-entry failures or a
        // mid-cycle shutdown. An interrupted cycle does not advance the
        // poll watermark.
        if !stats.interrupted {
            self.state.record_poll(Utc::now());
        }
        if let Err(err) = self.store.save(&self.state) {
            error!(
                "Failed to persist watch state to {}: {err}",
                self.store.path().display()
            );
        }

        if !stats.interrupted {
            info!(
                generated = stats.generated,
                would_generate = stats.would_generate,
                up_to_date = stats.up_to_date,
                filtered = stats.filtered,
                failed = stats.failed,
                "Cycle complete"
            );
        }

        stats
    }

    async fn generate_entry(&self, entry: &PackageEntry) -> CoreResult<()> {
        let generator = Arc::clone(&self.generator);
        let entry = entry.clone();
        let opts = GenerateOptions {
            output_dir: self.settings.output_dir.clone(),
            force_overwrite: self.settings.force_overwrite,
            dry_run: self.settings.dry_run,
        };

        tokio::task::spawn_blocking(move || generator.generate(&entry, &opts))
            .await
            .map_err(|err| CoreError::Custom(format!("Join handle error: {err}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        collections::HashSet,
        path::Path,
        sync::{
            atomic::{AtomicBool, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use chrono::DateTime;
    use packwatch_config::{PackageKind, TransportKind};
    use packwatch_registry::RegistryError;
    use tempfile::{tempdir, TempDir};

    use crate::shutdown;

    struct StaticRegistry {
        entries: Mutex<Vec<PackageEntry>>,
        fail: AtomicBool,
    }

    impl StaticRegistry {
        fn new(entries: Vec<PackageEntry>) -> Arc<Self> {
            Arc::new(Self {
                entries: Mutex::new(entries),
                fail: AtomicBool::new(false),
            })
        }

        fn set_entries(&self, entries: Vec<PackageEntry>) {
            *self.entries.lock().unwrap() = entries;
        }

        fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl RegistryClient for StaticRegistry {
        fn list_entries(&self) -> packwatch_registry::Result<Vec<PackageEntry>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RegistryError::FailedToFetchRemote(
                    "registry offline".to_string(),
                ));
            }
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<String>>,
        fail_keys: Mutex<HashSet<String>>,
    }

    impl RecordingGenerator {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_for(&self, key: &str) {
            self.fail_keys.lock().unwrap().insert(key.to_string());
        }
    }

    impl PackGenerator for RecordingGenerator {
        fn generate(&self, entry: &PackageEntry, _opts: &GenerateOptions) -> CoreResult<()> {
            let key = StateKey::from_entry(entry).to_string();
            self.calls.lock().unwrap().push(key.clone());
            if self.fail_keys.lock().unwrap().contains(&key) {
                return Err(CoreError::Custom("rendering failed".to_string()));
            }
            Ok(())
        }
    }

    fn entry(name: &str, version: &str, updated_at: &str) -> PackageEntry {
        PackageEntry {
            namespace: "acme".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            package_type: PackageKind::Npm,
            transport_type: TransportKind::Stdio,
            updated_at: updated_at.parse().unwrap(),
        }
    }

    fn settings(dir: &Path) -> WatchSettings {
        WatchSettings {
            registry_url: "https://registry.internal/v0/servers".to_string(),
            poll_interval: Duration::from_secs(5),
            output_dir: dir.join("packs"),
            state_file: dir.join("state.json"),
            package_types: Vec::new(),
            transport_types: Vec::new(),
            dry_run: false,
            force_overwrite: false,
        }
    }

    fn watcher(
        dir: &TempDir,
        registry: Arc<StaticRegistry>,
        generator: Arc<RecordingGenerator>,
        adjust: impl FnOnce(&mut WatchSettings),
    ) -> Watcher {
        let mut settings = settings(dir.path());
        adjust(&mut settings);
        Watcher::new(settings, registry, generator).unwrap()
    }

    fn idle_shutdown() -> Shutdown {
        // Keep the handle alive for the duration of the test so the
        // receiver does not observe a dropped-sender shutdown.
        let (handle, shutdown) = shutdown::channel();
        std::mem::forget(handle);
        shutdown
    }

    #[tokio::test]
    async fn test_first_cycle_generates_everything() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-01-01T00:00:00Z"),
        ]);
        let generator = RecordingGenerator::new();
        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});

        let stats = watcher.run_cycle(&idle_shutdown()).await;
        assert_eq!(stats.generated, 2);
        assert_eq!(stats.failed, 0);
        assert!(!stats.interrupted);

        assert_eq!(watcher.state.servers.len(), 2);
        assert!(watcher
            .state
            .servers
            .values()
            .all(|s| s.generated_at.is_some()));

        // persisted and parsable
        let persisted = StateStore::new(dir.path().join("state.json")).load().unwrap();
        assert_eq!(persisted.servers.len(), 2);
        assert!(persisted.last_poll.is_some());
    }

    #[tokio::test]
    async fn test_unchanged_cycle_is_idempotent() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-01-01T00:00:00Z"),
        ]);
        let generator = RecordingGenerator::new();
        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});

        watcher.run_cycle(&idle_shutdown()).await;
        let before = watcher.state.servers.clone();

        let stats = watcher.run_cycle(&idle_shutdown()).await;
        assert_eq!(stats.generated, 0);
        assert_eq!(stats.up_to_date, 2);
        assert_eq!(generator.calls().len(), 2);
        assert_eq!(watcher.state.servers, before);
    }

    #[tokio::test]
    async fn test_updated_entry_is_regenerated() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-01-01T00:00:00Z"),
        ]);
        let generator = RecordingGenerator::new();
        let mut watcher = watcher(&dir, Arc::clone(&registry), Arc::clone(&generator), |_| {});

        watcher.run_cycle(&idle_shutdown()).await;
        let alpha_before = watcher.state.servers["acme/alpha@1.0.0:npm:stdio"].clone();

        registry.set_entries(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-02-01T00:00:00Z"),
        ]);
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.generated, 1);
        assert_eq!(stats.up_to_date, 1);
        assert_eq!(
            watcher.state.servers["acme/alpha@1.0.0:npm:stdio"],
            alpha_before
        );
        let beta = &watcher.state.servers["acme/beta@1.0.0:npm:stdio"];
        assert_eq!(
            beta.updated_at,
            "2026-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[tokio::test]
    async fn test_new_version_is_a_new_key() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("beta", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();
        let mut watcher = watcher(&dir, Arc::clone(&registry), Arc::clone(&generator), |_| {});

        watcher.run_cycle(&idle_shutdown()).await;
        registry.set_entries(vec![entry("beta", "2.0.0", "2026-02-01T00:00:00Z")]);
        watcher.run_cycle(&idle_shutdown()).await;

        // the superseded version's record is kept; the new one is added
        assert!(watcher.state.servers.contains_key("acme/beta@1.0.0:npm:stdio"));
        assert!(watcher.state.servers.contains_key("acme/beta@2.0.0:npm:stdio"));
    }

    #[tokio::test]
    async fn test_force_overwrite_regenerates_unchanged_entries() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, Arc::clone(&registry), Arc::clone(&generator), |_| {});
        watcher.run_cycle(&idle_shutdown()).await;
        let first_generated_at =
            watcher.state.servers["acme/alpha@1.0.0:npm:stdio"].generated_at;

        let mut forced = watcher;
        forced.settings.force_overwrite = true;
        let stats = forced.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.generated, 1);
        assert_eq!(generator.calls().len(), 2);
        let regenerated_at = forced.state.servers["acme/alpha@1.0.0:npm:stdio"].generated_at;
        assert!(regenerated_at >= first_generated_at);
    }

    #[tokio::test]
    async fn test_generation_failure_is_non_fatal_and_unrecorded() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-01-01T00:00:00Z"),
        ]);
        let generator = RecordingGenerator::new();
        generator.fail_for("acme/alpha@1.0.0:npm:stdio");

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.generated, 1);
        assert_eq!(stats.failed, 1);
        assert!(!watcher.state.servers.contains_key("acme/alpha@1.0.0:npm:stdio"));
        assert!(watcher.state.servers.contains_key("acme/beta@1.0.0:npm:stdio"));

        // the partially failing cycle still persisted its successes
        let persisted = StateStore::new(dir.path().join("state.json")).load().unwrap();
        assert_eq!(persisted.servers.len(), 1);
        assert!(persisted.last_poll.is_some());
    }

    #[tokio::test]
    async fn test_failed_entry_is_retried_next_cycle() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();
        generator.fail_for("acme/alpha@1.0.0:npm:stdio");

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});
        watcher.run_cycle(&idle_shutdown()).await;

        generator.fail_keys.lock().unwrap().clear();
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.generated, 1);
        assert_eq!(generator.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_the_cycle() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        registry.set_fail(true);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats, CycleStats::default());
        assert!(generator.calls().is_empty());
        assert!(watcher.state.last_poll.is_none());
        // nothing was persisted for the aborted cycle
        assert!(!dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn test_last_poll_is_monotonic_across_cycles() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(Vec::new());
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, generator, |_| {});
        watcher.run_cycle(&idle_shutdown()).await;
        let first = watcher.state.last_poll.unwrap();
        watcher.run_cycle(&idle_shutdown()).await;
        let second = watcher.state.last_poll.unwrap();

        assert!(second >= first);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_generating_or_recording() {
        let dir = tempdir().unwrap();
        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            entry("beta", "1.0.0", "2026-01-01T00:00:00Z"),
        ]);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |s| {
            s.dry_run = true;
        });
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.would_generate, 2);
        assert_eq!(stats.generated, 0);
        assert!(generator.calls().is_empty());
        assert!(watcher.state.servers.is_empty());

        // dry-run still advances the watermark and persists the state file
        let persisted = StateStore::new(dir.path().join("state.json")).load().unwrap();
        assert!(persisted.last_poll.is_some());
        assert!(persisted.servers.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_state_file_recovers_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), "{{{ definitely not json").unwrap();

        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        // processed as if state were empty, and the file is valid again
        assert_eq!(stats.generated, 1);
        let persisted = StateStore::new(dir.path().join("state.json")).load().unwrap();
        assert_eq!(persisted.servers.len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_entries_never_reach_the_generator() {
        let dir = tempdir().unwrap();
        let mut pypi_http = entry("other", "1.0.0", "2026-01-01T00:00:00Z");
        pypi_http.package_type = PackageKind::Pypi;
        pypi_http.transport_type = TransportKind::Http;

        let registry = StaticRegistry::new(vec![
            entry("alpha", "1.0.0", "2026-01-01T00:00:00Z"),
            pypi_http,
        ]);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |s| {
            s.package_types = vec![PackageKind::Npm];
            s.transport_types = vec![TransportKind::Stdio];
        });
        let stats = watcher.run_cycle(&idle_shutdown()).await;

        assert_eq!(stats.generated, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(generator.calls(), vec!["acme/alpha@1.0.0:npm:stdio"]);
    }

    #[tokio::test]
    async fn test_pretriggered_shutdown_interrupts_before_reconciling() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();

        let mut watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});

        let (handle, shutdown) = shutdown::channel();
        handle.trigger();
        let stats = watcher.run_cycle(&shutdown).await;

        assert!(stats.interrupted);
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_exits_cleanly_on_shutdown() {
        let dir = tempdir().unwrap();
        let registry =
            StaticRegistry::new(vec![entry("alpha", "1.0.0", "2026-01-01T00:00:00Z")]);
        let generator = RecordingGenerator::new();
        let watcher = watcher(&dir, registry, Arc::clone(&generator), |_| {});

        let (handle, shutdown) = shutdown::channel();
        let task = tokio::spawn(watcher.run(shutdown));

        // let the immediate first cycle finish, then ask for shutdown
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.trigger();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watch loop did not stop after shutdown")
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(generator.calls().len(), 1);
    }
}
