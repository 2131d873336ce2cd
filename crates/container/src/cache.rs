//! Singleton cache — scoped хранилище уже сконструированных экземпляров.
//!
//! Один кэш на scope; root и child/test scope'ы независимы. Чтение берёт
//! только read lock; запись — insert-if-absent в духе compare-and-set:
//! два потока, гонящиеся за одним lazy singleton'ом, оба выполнят factory,
//! но запишется ровно один экземпляр и оба увидят его (instance-safety
//! важнее call-count-safety).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::key::ComponentKey;
use crate::strategy::AnyInstance;

#[derive(Default)]
pub struct SingletonCache {
    entries: RwLock<HashMap<ComponentKey, AnyInstance>>,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    clears: AtomicU64,
}

/// Статистика использования кэша
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cached: usize,
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub clears: u64,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Найти закэшированный экземпляр; обновляет hit/miss счётчики
    pub fn get(&self, key: &ComponentKey) -> Option<AnyInstance> {
        let found = self.entries.read().get(key).cloned();
        match found {
            Some(instance) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(instance)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Записать экземпляр, если ключ свободен; возвращает победителя гонки
    pub fn insert_if_absent(&self, key: &ComponentKey, candidate: AnyInstance) -> AnyInstance {
        let mut entries = self.entries.write();
        match entries.entry(key.clone()) {
            std::collections::hash_map::Entry::Occupied(existing) => existing.get().clone(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                self.insertions.fetch_add(1, Ordering::Relaxed);
                slot.insert(candidate.clone());
                candidate
            }
        }
    }

    /// Проверка без влияния на статистику
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn remove(&self, key: &ComponentKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.clears.fetch_add(1, Ordering::Relaxed);
        debug!("🧹 singleton cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
        }
    }
}
