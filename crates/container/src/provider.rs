//! Component provider — фасад контейнера.
//!
//! Единственная операция для потребителей: `get(key) -> instance`.
//! Фасад связывает lookup по hierarchy, селекцию провайдера,
//! singleton-кэширование, post-processing и proxy-обёртывание; вся
//! содержательная логика живёт в подчинённых модулях.
//!
//! Bootstrap (построение графа + валидация + eager-инстанцирование) —
//! однопоточная фаза; после её завершения `get` безопасен из многих
//! потоков. Мутации hierarchy синхронизированы write lock'ом, так что
//! конкурентные селекции не видят частично применённый add.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use common::structured_logging::OperationTimer;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, SingletonCache};
use crate::config::ContainerConfig;
use crate::errors::{ContainerError, ContainerResult};
use crate::graph::{DependencyContext, DependencyGraph};
use crate::hierarchy::BindingHierarchy;
use crate::key::ComponentKey;
use crate::metrics::{ContainerMetrics, ContainerStats};
use crate::proxy::{ProxyFactory, ProxyRegistry, TargetDescriptor};
use crate::selection::ProviderSelection;
use crate::strategy::{AnyInstance, InstantiationStrategy};
use crate::validation::{CompositeValidator, ValidationContext};

thread_local! {
    /// Ключи, разрешаемые прямо сейчас на этом потоке.
    /// Ловит динамические циклы, невидимые статическому валидатору:
    /// factory может запросить собственный ключ из своего конструктора.
    static RESOLVING: RefCell<Vec<ComponentKey>> = RefCell::new(Vec::new());
}

/// RAII-маркер входа в разрешение ключа
struct ResolveGuard;

impl ResolveGuard {
    fn enter(key: &ComponentKey, max_depth: u32) -> ContainerResult<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|resolving| resolving == key) {
                let mut chain: Vec<String> = stack.iter().map(ToString::to_string).collect();
                chain.push(key.to_string());
                return Err(ContainerError::RuntimeCycle { chain });
            }
            if stack.len() as u32 >= max_depth {
                return Err(ContainerError::DepthExceeded {
                    key: key.to_string(),
                    depth: max_depth,
                });
            }
            stack.push(key.clone());
            Ok(ResolveGuard)
        })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Изолированный binding/cache контекст.
///
/// Child scope (тестовые override'ы) перекрывает биндинги родителя и
/// падает к нему при lookup'е; singleton-кэш и proxy-реестр у каждого
/// scope'а собственные и никогда не разделяются.
pub struct Scope {
    name: String,
    parent: Option<Arc<Scope>>,
    hierarchies: RwLock<HashMap<ComponentKey, BindingHierarchy>>,
    cache: SingletonCache,
    proxies: Arc<ProxyRegistry>,
}

impl Scope {
    fn root(name: String) -> Self {
        Self {
            name,
            parent: None,
            hierarchies: RwLock::new(HashMap::new()),
            cache: SingletonCache::new(),
            proxies: Arc::new(ProxyRegistry::new()),
        }
    }

    fn child_of(parent: Arc<Scope>, name: String) -> Self {
        Self {
            name,
            parent: Some(parent),
            hierarchies: RwLock::new(HashMap::new()),
            cache: SingletonCache::new(),
            proxies: Arc::new(ProxyRegistry::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &SingletonCache {
        &self.cache
    }

    pub fn proxy_registry(&self) -> &Arc<ProxyRegistry> {
        &self.proxies
    }

    /// Склонировать выигравшую стратегию из-под read lock'а.
    /// Hierarchy этого scope'а авторитетна: к родителю падаем только
    /// когда ключ здесь вообще не объявлен.
    fn select_strategy(
        &self,
        key: &ComponentKey,
        policy: ProviderSelection,
    ) -> Option<InstantiationStrategy> {
        {
            let hierarchies = self.hierarchies.read();
            if let Some(hierarchy) = hierarchies.get(key) {
                return policy.select(hierarchy).cloned();
            }
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.select_strategy(key, policy))
    }

    fn is_bound(&self, key: &ComponentKey) -> bool {
        {
            let hierarchies = self.hierarchies.read();
            if let Some(hierarchy) = hierarchies.get(key) {
                return !hierarchy.is_empty();
            }
        }
        self.parent
            .as_ref()
            .map(|parent| parent.is_bound(key))
            .unwrap_or(false)
    }
}

/// Post-processing компонентов — внешний коллаборатор.
/// Контейнер знает только, ТРЕБУЕТСЯ ли обработка (метаданные
/// ObjectContainer), но не что она делает.
pub trait ComponentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Обработать экземпляр; может вернуть замену
    fn process(&self, key: &ComponentKey, instance: AnyInstance) -> anyhow::Result<AnyInstance>;
}

pub struct ComponentProvider {
    config: ContainerConfig,
    scope: Arc<Scope>,
    proxy_factory: ProxyFactory,
    metrics: ContainerMetrics,
    processors: RwLock<Vec<Arc<dyn ComponentProcessor>>>,
    contexts: RwLock<Vec<DependencyContext>>,
    root_key: RwLock<Option<ComponentKey>>,
    graph: RwLock<Option<Arc<DependencyGraph>>>,
    visited: RwLock<HashSet<ComponentKey>>,
    bootstrapped: AtomicBool,
    bootstrapping: AtomicBool,
}

impl Default for ComponentProvider {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

impl ComponentProvider {
    pub fn new(config: ContainerConfig) -> Self {
        let scope = Arc::new(Scope::root(config.name.clone()));
        let proxy_factory = ProxyFactory::new(scope.proxies.clone());
        Self {
            metrics: ContainerMetrics::new(config.enable_metrics),
            proxy_factory,
            scope,
            config,
            processors: RwLock::new(Vec::new()),
            contexts: RwLock::new(Vec::new()),
            root_key: RwLock::new(None),
            graph: RwLock::new(None),
            visited: RwLock::new(HashSet::new()),
            bootstrapped: AtomicBool::new(false),
            bootstrapping: AtomicBool::new(false),
        }
    }

    /// Производный scope для тестовых override'ов: собственный кэш и
    /// proxy-реестр, биндинги родителя доступны через fallback.
    /// Валидацию родитель уже прошёл, поэтому child сразу serving.
    pub fn child(&self, name: impl Into<String>) -> ComponentProvider {
        let scope = Arc::new(Scope::child_of(self.scope.clone(), name.into()));
        let proxy_factory = ProxyFactory::new(scope.proxies.clone());
        ComponentProvider {
            config: self.config.clone(),
            metrics: ContainerMetrics::new(self.config.enable_metrics),
            proxy_factory,
            scope,
            processors: RwLock::new(self.processors.read().clone()),
            contexts: RwLock::new(Vec::new()),
            root_key: RwLock::new(None),
            graph: RwLock::new(None),
            visited: RwLock::new(HashSet::new()),
            bootstrapped: AtomicBool::new(true),
            bootstrapping: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    // === ДЕКЛАРАЦИИ (inbound контракт) ===

    /// Прямой биндинг: (ключ, приоритет, стратегия).
    /// Non-lazy singleton без post-processing кэшируется сразу при bind.
    pub fn bind(
        &self,
        key: &ComponentKey,
        priority: i32,
        strategy: InstantiationStrategy,
    ) -> ContainerResult<()> {
        {
            let mut hierarchies = self.scope.hierarchies.write();
            let hierarchy = hierarchies
                .entry(key.clone())
                .or_insert_with(|| BindingHierarchy::new(key.clone()));
            hierarchy.add(priority, strategy.clone())?;
        }

        if let InstantiationStrategy::Singleton {
            instance,
            post_process: false,
        } = &strategy
        {
            self.scope.cache.insert_if_absent(key, instance.clone());
        }

        self.metrics.record_registration(key);
        Ok(())
    }

    /// Убрать биндинг конкретного приоритета. Сбрасывает кэш ключа,
    /// чтобы мутация была видна последующим селекциям.
    pub fn prune(&self, key: &ComponentKey, priority: i32) -> bool {
        let removed = {
            let mut hierarchies = self.scope.hierarchies.write();
            hierarchies
                .get_mut(key)
                .map(|hierarchy| hierarchy.prune(priority))
                .unwrap_or(false)
        };
        if removed {
            self.scope.cache.remove(key);
        }
        removed
    }

    /// Декларация рёбер зависимостей для графа
    pub fn declare_dependencies(&self, key: &ComponentKey, dependencies: Vec<ComponentKey>) {
        self.contexts
            .write()
            .push(DependencyContext::new(key.clone(), dependencies));
    }

    /// Пометить корневой узел графа (освобождён от проверки входящих рёбер)
    pub fn mark_root(&self, key: &ComponentKey) {
        *self.root_key.write() = Some(key.clone());
    }

    pub fn register_processor(&self, processor: Arc<dyn ComponentProcessor>) {
        debug!("registered component processor '{}'", processor.name());
        self.processors.write().push(processor);
    }

    // === BOOTSTRAP ===

    /// Построить граф, прогнать before-валидацию, инстанцировать все
    /// связанные узлы и прогнать after-валидацию. Вызывается один раз,
    /// до первого конкурентного `get`.
    pub fn bootstrap(&self) -> ContainerResult<()> {
        let timer = OperationTimer::new("container_bootstrap");
        let result = self.run_bootstrap();
        timer.finish_with_result(result.clone());
        result
    }

    fn run_bootstrap(&self) -> ContainerResult<()> {
        self.bootstrapping.store(true, Ordering::Release);
        let result = self.bootstrap_phases();
        self.bootstrapping.store(false, Ordering::Release);
        result
    }

    fn bootstrap_phases(&self) -> ContainerResult<()> {
        let contexts = self.contexts.read().clone();
        let root = self.root_key.read().clone();
        let graph = Arc::new(DependencyGraph::build(contexts, root.as_ref()));

        if self.config.enable_validation {
            let visited = HashSet::new();
            let ctx = ValidationContext {
                graph: &graph,
                visited: &visited,
            };
            if let Err(e) = CompositeValidator::before_configuration().validate(&ctx) {
                self.metrics.record_validation_failure();
                return Err(e);
            }
        }

        *self.graph.write() = Some(graph.clone());

        // фаза инстанцирования: каждый связанный узел разрешается, его
        // транзитивные зависимости посещаются через вложенные get'ы
        let keys: Vec<ComponentKey> = graph.keys().cloned().collect();
        for key in &keys {
            if self.scope.is_bound(key) {
                self.resolve_erased(key, ProviderSelection::HighestPriority)?;
            }
        }

        if self.config.enable_validation {
            let visited = self.visited.read().clone();
            let ctx = ValidationContext {
                graph: &graph,
                visited: &visited,
            };
            if let Err(e) = CompositeValidator::after_configuration().validate(&ctx) {
                self.metrics.record_validation_failure();
                return Err(e);
            }
        }

        self.bootstrapped.store(true, Ordering::Release);
        info!(
            "✅ container '{}' bootstrapped: {} graph nodes",
            self.config.name,
            graph.len()
        );
        Ok(())
    }

    // === РАЗРЕШЕНИЕ (outbound контракт) ===

    pub fn get<T: Any + Send + Sync>(&self, key: &ComponentKey) -> ContainerResult<Arc<T>> {
        self.get_with_policy(key, ProviderSelection::HighestPriority)
    }

    /// Селекция с политикой per call site — тестовые override'ы форсируют
    /// конкретный биндинг через ExactPriority
    pub fn get_with_policy<T: Any + Send + Sync>(
        &self,
        key: &ComponentKey,
        policy: ProviderSelection,
    ) -> ContainerResult<Arc<T>> {
        let erased = self.resolve_erased(key, policy)?;
        erased
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn try_get<T: Any + Send + Sync>(&self, key: &ComponentKey) -> Option<Arc<T>> {
        match self.get::<T>(key) {
            Ok(instance) => Some(instance),
            Err(e) => {
                debug!("try_get {} failed: {}", key, e);
                None
            }
        }
    }

    pub fn is_bound(&self, key: &ComponentKey) -> bool {
        self.scope.is_bound(key)
    }

    /// Type-erased разрешение: полный конвейер одного запроса
    pub fn resolve_erased(
        &self,
        key: &ComponentKey,
        policy: ProviderSelection,
    ) -> ContainerResult<AnyInstance> {
        if !self.bootstrapped.load(Ordering::Acquire)
            && !self.bootstrapping.load(Ordering::Acquire)
            && !self.contexts.read().is_empty()
        {
            warn!("⚠️ get({}) served before bootstrap completed", key);
        }

        let _guard = ResolveGuard::enter(key, self.config.max_dependency_depth)?;
        let started = Instant::now();

        if let Some(cached) = self.scope.cache.get(key) {
            self.visited.write().insert(key.clone());
            self.metrics.record_resolution(key, started.elapsed(), true);
            debug!("✅ singleton cache hit: {}", key);
            return Ok(cached);
        }

        let Some(strategy) = self.scope.select_strategy(key, policy) else {
            self.metrics.record_error(key);
            return Err(ContainerError::UnboundKey {
                key: key.to_string(),
            });
        };

        let produced = strategy.provide(self, key).map_err(|e| {
            self.metrics.record_error(key);
            e
        })?;
        self.visited.write().insert(key.clone());

        let mut instance = produced.instance;
        if produced.requires_post_processing {
            let processors: Vec<_> = self.processors.read().clone();
            for processor in processors {
                instance = processor.process(key, instance).map_err(|e| {
                    self.metrics.record_error(key);
                    ContainerError::InstantiationFailed {
                        key: key.to_string(),
                        message: format!("post-processor '{}' failed: {e:#}", processor.name()),
                    }
                })?;
            }
        }

        // singleton кэшируется только после завершения post-processing;
        // insert-if-absent разруливает гонку конкурентных lazy-разрешений
        let resolved = if produced.is_singleton {
            self.scope.cache.insert_if_absent(key, instance)
        } else {
            instance
        };

        self.metrics.record_resolution(key, started.elapsed(), false);
        debug!("resolved {} via {} strategy", key, strategy.kind_name());
        Ok(resolved)
    }

    // === ДИАГНОСТИКА ===

    /// Является ли экземпляр proxy, созданным этим scope'ом
    pub fn is_proxy(&self, instance: &AnyInstance) -> bool {
        self.scope.proxies.is_proxy(instance)
    }

    /// Идентичность реального типа за proxy; `None` для чужих экземпляров
    pub fn unwrap_proxy(&self, instance: &AnyInstance) -> Option<TargetDescriptor> {
        self.scope.proxies.unwrap_target(instance)
    }

    pub fn proxy_factory(&self) -> &ProxyFactory {
        &self.proxy_factory
    }

    pub fn metrics(&self) -> &ContainerMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> ContainerStats {
        self.metrics.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.scope.cache.stats()
    }

    pub fn dependency_report(&self) -> Option<String> {
        self.graph.read().as_ref().map(|graph| graph.report())
    }
}
