//! Binding hierarchy — упорядоченный набор провайдеров для одного ключа.
//!
//! Хранит отображение `priority -> InstantiationStrategy` для одного
//! [`ComponentKey`]. Инвариант: приоритеты уникальны; порядок вставки не
//! имеет значения, обход — по убыванию приоритета. Создаётся при первой
//! декларации биндинга для ключа, уничтожается вместе со scope'ом.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{ContainerError, ContainerResult};
use crate::key::ComponentKey;
use crate::strategy::InstantiationStrategy;

pub struct BindingHierarchy {
    key: ComponentKey,
    entries: BTreeMap<i32, InstantiationStrategy>,
}

impl BindingHierarchy {
    pub fn new(key: ComponentKey) -> Self {
        Self {
            key,
            entries: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// Добавить стратегию на приоритет.
    ///
    /// Занятый приоритет — ошибка без мутации hierarchy: тихая перезапись
    /// маскирует конфликт деклараций.
    pub fn add(&mut self, priority: i32, strategy: InstantiationStrategy) -> ContainerResult<()> {
        if self.entries.contains_key(&priority) {
            return Err(ContainerError::DuplicatePriority {
                key: self.key.to_string(),
                priority,
            });
        }
        self.entries.insert(priority, strategy);
        debug!("🔗 bound {} at priority {}", self.key, priority);
        Ok(())
    }

    /// Убрать стратегию конкретного приоритета. Возвращает, была ли она.
    pub fn prune(&mut self, priority: i32) -> bool {
        let removed = self.entries.remove(&priority).is_some();
        if removed {
            debug!("🧹 pruned priority {} from {}", priority, self.key);
        }
        removed
    }

    pub fn strategy_at(&self, priority: i32) -> Option<&InstantiationStrategy> {
        self.entries.get(&priority)
    }

    /// Запись с максимальным приоритетом
    pub fn highest(&self) -> Option<(i32, &InstantiationStrategy)> {
        self.entries.iter().next_back().map(|(p, s)| (*p, s))
    }

    /// Запись с НАИМЕНЬШИМ приоритетом >= `floor` (включительно)
    pub fn lowest_at_least(&self, floor: i32) -> Option<(i32, &InstantiationStrategy)> {
        self.entries.range(floor..).next().map(|(p, s)| (*p, s))
    }

    /// Запись с НАИБОЛЬШИМ приоритетом < `ceiling` (исключительно)
    pub fn highest_below(&self, ceiling: i32) -> Option<(i32, &InstantiationStrategy)> {
        self.entries.range(..ceiling).next_back().map(|(p, s)| (*p, s))
    }

    /// Обход по убыванию приоритета
    pub fn descending(&self) -> impl Iterator<Item = (i32, &InstantiationStrategy)> {
        self.entries.iter().rev().map(|(p, s)| (*p, s))
    }

    pub fn priorities(&self) -> Vec<i32> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
