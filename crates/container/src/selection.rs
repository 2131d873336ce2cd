//! Политики выбора провайдера из binding hierarchy.
//!
//! Закрытый tagged union вместо иерархии классов: селекция — чистая функция
//! над состоянием hierarchy, без side effects. Политика задаётся per call
//! site, поэтому тестовые override'ы могут форсировать конкретный биндинг
//! через [`ProviderSelection::ExactPriority`].
//!
//! Пустая hierarchy всегда даёт `None` независимо от политики: `None` —
//! это "unbound", а не ошибка; фатальность решает вызывающий.

use crate::hierarchy::BindingHierarchy;
use crate::strategy::InstantiationStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSelection {
    /// Численно наибольший приоритет
    HighestPriority,
    /// Точное совпадение приоритета
    ExactPriority(i32),
    /// Наименьший приоритет >= p (включительно)
    MinimumPriority(i32),
    /// Наибольший приоритет < p (исключительно)
    MaximumPriority(i32),
}

impl ProviderSelection {
    /// Выбрать запись вместе с её приоритетом
    pub fn select_entry<'a>(
        &self,
        hierarchy: &'a BindingHierarchy,
    ) -> Option<(i32, &'a InstantiationStrategy)> {
        match *self {
            ProviderSelection::HighestPriority => hierarchy.highest(),
            ProviderSelection::ExactPriority(p) => {
                hierarchy.strategy_at(p).map(|strategy| (p, strategy))
            }
            ProviderSelection::MinimumPriority(p) => hierarchy.lowest_at_least(p),
            ProviderSelection::MaximumPriority(p) => hierarchy.highest_below(p),
        }
    }

    /// Выбрать стратегию; `None` означает "unbound"
    pub fn select<'a>(&self, hierarchy: &'a BindingHierarchy) -> Option<&'a InstantiationStrategy> {
        self.select_entry(hierarchy).map(|(_, strategy)| strategy)
    }
}
