//! Сбор метрик контейнера: атомарные счётчики + per-key тайминги.
//!
//! При `enabled = false` все record-операции — no-op, чтобы production
//! конфигурация могла отключить сбор без ветвлений на стороне вызова.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::key::ComponentKey;

/// Атомарные счётчики для thread-safe метрик
#[derive(Default)]
struct AtomicCounters {
    registrations: AtomicU64,
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    errors: AtomicU64,
    validation_failures: AtomicU64,
}

/// Метрики разрешения одного ключа
#[derive(Debug, Clone, Default)]
pub struct KeyMetrics {
    pub resolutions: u64,
    pub total_time: Duration,
    pub cache_hits: u64,
    pub errors: u64,
    pub last_resolution: Option<Instant>,
}

impl KeyMetrics {
    pub fn average_time(&self) -> Duration {
        if self.resolutions > 0 {
            self.total_time / self.resolutions as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Сводная статистика контейнера
#[derive(Debug, Clone)]
pub struct ContainerStats {
    pub registrations: u64,
    pub resolutions: u64,
    pub cache_hits: u64,
    pub errors: u64,
    pub validation_failures: u64,
    pub tracked_keys: usize,
}

impl ContainerStats {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.resolutions > 0 {
            (self.cache_hits as f64 / self.resolutions as f64) * 100.0
        } else {
            0.0
        }
    }
}

pub struct ContainerMetrics {
    enabled: bool,
    counters: AtomicCounters,
    per_key: RwLock<HashMap<ComponentKey, KeyMetrics>>,
}

impl ContainerMetrics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            counters: AtomicCounters::default(),
            per_key: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_registration(&self, _key: &ComponentKey) {
        if !self.enabled {
            return;
        }
        self.counters.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution(&self, key: &ComponentKey, duration: Duration, from_cache: bool) {
        if !self.enabled {
            return;
        }
        self.counters.resolutions.fetch_add(1, Ordering::Relaxed);
        if from_cache {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        }

        let mut per_key = self.per_key.write();
        let metrics = per_key.entry(key.clone()).or_default();
        metrics.resolutions += 1;
        metrics.total_time += duration;
        if from_cache {
            metrics.cache_hits += 1;
        }
        metrics.last_resolution = Some(Instant::now());
    }

    pub fn record_error(&self, key: &ComponentKey) {
        if !self.enabled {
            return;
        }
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        self.per_key.write().entry(key.clone()).or_default().errors += 1;
    }

    pub fn record_validation_failure(&self) {
        if !self.enabled {
            return;
        }
        self.counters
            .validation_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registrations: self.counters.registrations.load(Ordering::Relaxed),
            resolutions: self.counters.resolutions.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            validation_failures: self.counters.validation_failures.load(Ordering::Relaxed),
            tracked_keys: self.per_key.read().len(),
        }
    }

    pub fn key_metrics(&self, key: &ComponentKey) -> Option<KeyMetrics> {
        self.per_key.read().get(key).cloned()
    }

    /// Топ N самых медленных ключей по среднему времени разрешения
    pub fn slowest(&self, limit: usize) -> Vec<(ComponentKey, KeyMetrics)> {
        let mut entries: Vec<_> = self
            .per_key
            .read()
            .iter()
            .map(|(key, metrics)| (key.clone(), metrics.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.average_time().cmp(&a.1.average_time()));
        entries.truncate(limit);
        entries
    }

    pub fn report(&self) -> String {
        let stats = self.stats();
        format!(
            "=== Container Metrics Report ===\n\
             Registrations: {}\n\
             Resolutions: {}\n\
             Cache hits: {} ({:.1}%)\n\
             Errors: {}\n\
             Validation failures: {}\n\
             Tracked keys: {}\n\
             ================================",
            stats.registrations,
            stats.resolutions,
            stats.cache_hits,
            stats.cache_hit_rate(),
            stats.errors,
            stats.validation_failures,
            stats.tracked_keys,
        )
    }

    pub fn reset(&self) {
        self.counters.registrations.store(0, Ordering::Relaxed);
        self.counters.resolutions.store(0, Ordering::Relaxed);
        self.counters.cache_hits.store(0, Ordering::Relaxed);
        self.counters.errors.store(0, Ordering::Relaxed);
        self.counters.validation_failures.store(0, Ordering::Relaxed);
        self.per_key.write().clear();
    }
}
