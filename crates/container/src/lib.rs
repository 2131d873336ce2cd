//! DI контейнер: декларативный граф "что кем предоставляется".
//!
//! Разрешает компоненты в порядке зависимостей, кэширует singleton'ы
//! per scope и навешивает cross-cutting поведение через proxy с цепочками
//! перехватчиков. Граф строится один раз за жизнь процесса из конечного
//! набора деклараций; валидация (циклы, presence) выполняется eager'но
//! до обслуживания первого `get`.
//!
//! Поток данных одного запроса:
//! `get(key)` -> lookup hierarchy -> селекция провайдера -> производство
//! экземпляра -> [singleton cache] -> [proxy] -> экземпляр.

pub mod cache;
pub mod config;
pub mod errors;
pub mod graph;
pub mod hierarchy;
pub mod key;
pub mod metrics;
pub mod provider;
pub mod proxy;
pub mod selection;
pub mod strategy;
pub mod validation;

pub use cache::{CacheStats, SingletonCache};
pub use config::ContainerConfig;
pub use errors::{ContainerError, ContainerResult};
pub use graph::{DependencyContext, DependencyGraph, GraphStats};
pub use hierarchy::BindingHierarchy;
pub use key::{ComponentKey, Qualifier, QualifierKind};
pub use metrics::{ContainerMetrics, ContainerStats, KeyMetrics};
pub use provider::{ComponentProcessor, ComponentProvider, Scope};
pub use proxy::{
    CallValue, InterceptorChain, MethodTable, ProxyBlueprint, ProxyFactory, ProxyInstance,
    ProxyRegistry, ReturnKind, TargetDescriptor,
};
pub use selection::ProviderSelection;
pub use strategy::{AnyInstance, InstantiationStrategy, ObjectContainer};
pub use validation::{CompositeValidator, CycleValidator, GraphValidator, PresenceValidator};
