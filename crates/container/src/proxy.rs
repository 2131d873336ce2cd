//! Proxy runtime: перехват вызовов методов без генерации кода.
//!
//! Вместо динамической генерации подтипа — явная dispatch-таблица на
//! целевой тип ([`MethodTable`]): имя метода -> invoker-замыкание над
//! реальным экземпляром плюс объявленный вид возвращаемого значения.
//! Вызовы идут через type-erased [`CallValue`]; typed-обёртки строятся
//! на стороне деклараций.
//!
//! [`ProxyManager`] — ассоциация 1:1 между живым proxy и его таблицей,
//! цепочками перехватчиков и stub-функцией. Реестр ([`ProxyRegistry`])
//! ключуется идентичностью самого proxy-экземпляра (weak backref) и
//! принадлежит scope'у, а не процессу: никакого скрытого глобального
//! состояния между тестами.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{ContainerError, ContainerResult};
use crate::strategy::AnyInstance;

/// Идентичность метода в dispatch-таблице
pub type MethodKey = &'static str;

/// Объявленный вид возвращаемого значения — определяет zero value stub'а
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Int,
    Float,
    Bool,
    Str,
    List,
    Unit,
    Opaque,
}

/// Type-erased значение аргумента/результата вызова
#[derive(Clone)]
pub enum CallValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<CallValue>),
    /// Назначенное "отсутствующее" значение
    Absent,
    Opaque(AnyInstance),
}

impl CallValue {
    /// Zero value для вида возвращаемого значения.
    /// Stub по контракту никогда не ошибается.
    pub fn zero_for(kind: ReturnKind) -> CallValue {
        match kind {
            ReturnKind::Int => CallValue::Int(0),
            ReturnKind::Float => CallValue::Float(0.0),
            ReturnKind::Bool => CallValue::Bool(false),
            ReturnKind::Str => CallValue::Str(String::new()),
            ReturnKind::List => CallValue::List(Vec::new()),
            ReturnKind::Unit | ReturnKind::Opaque => CallValue::Absent,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CallValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CallValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CallValue::Absent)
    }
}

impl fmt::Debug for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallValue::Int(v) => write!(f, "Int({v})"),
            CallValue::Float(v) => write!(f, "Float({v})"),
            CallValue::Bool(v) => write!(f, "Bool({v})"),
            CallValue::Str(v) => write!(f, "Str({v:?})"),
            CallValue::List(v) => write!(f, "List({v:?})"),
            CallValue::Absent => write!(f, "Absent"),
            CallValue::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl PartialEq for CallValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CallValue::Int(a), CallValue::Int(b)) => a == b,
            (CallValue::Float(a), CallValue::Float(b)) => a == b,
            (CallValue::Bool(a), CallValue::Bool(b)) => a == b,
            (CallValue::Str(a), CallValue::Str(b)) => a == b,
            (CallValue::List(a), CallValue::List(b)) => a == b,
            (CallValue::Absent, CallValue::Absent) => true,
            (CallValue::Opaque(a), CallValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Контекст перехваченного вызова, видимый хукам
pub struct MethodCall<'a> {
    pub method: MethodKey,
    pub args: &'a [CallValue],
    pub target_type: &'static str,
}

pub type MethodInvoker =
    Arc<dyn Fn(&AnyInstance, &[CallValue]) -> anyhow::Result<CallValue> + Send + Sync>;
pub type BeforeHook = Arc<dyn Fn(&MethodCall<'_>) -> anyhow::Result<()> + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&MethodCall<'_>, &CallValue) + Send + Sync>;
pub type ErrorHook =
    Arc<dyn Fn(&MethodCall<'_>, &anyhow::Error) -> Option<CallValue> + Send + Sync>;
pub type AroundHook = Arc<dyn Fn(&MethodCall<'_>) -> anyhow::Result<CallValue> + Send + Sync>;
pub type StubFn = Arc<dyn Fn(ReturnKind) -> CallValue + Send + Sync>;

struct MethodSpec {
    returns: ReturnKind,
    invoker: Option<MethodInvoker>,
}

/// Dispatch-таблица целевого типа: объявленные методы и их invoker'ы.
///
/// `sealed` маркирует тип как нерасширяемый: создание proxy над такой
/// таблицей — ошибка конструирования, не первого вызова.
pub struct MethodTable {
    target_id: TypeId,
    target_name: &'static str,
    methods: HashMap<MethodKey, MethodSpec>,
    sealed: bool,
}

impl MethodTable {
    pub fn builder<T: Send + Sync + 'static>() -> MethodTableBuilder<T> {
        MethodTableBuilder {
            methods: HashMap::new(),
            sealed: false,
            _target: PhantomData,
        }
    }

    pub fn target_id(&self) -> TypeId {
        self.target_id
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn has_method(&self, method: MethodKey) -> bool {
        self.methods.contains_key(method)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    fn spec(&self, method: MethodKey) -> Option<&MethodSpec> {
        self.methods.get(method)
    }
}

/// Типобезопасный builder таблицы для конкретного целевого типа
pub struct MethodTableBuilder<T> {
    methods: HashMap<MethodKey, MethodSpec>,
    sealed: bool,
    _target: PhantomData<fn(T)>,
}

impl<T: Send + Sync + 'static> MethodTableBuilder<T> {
    /// Метод с реальной реализацией над целевым экземпляром
    pub fn method<F>(mut self, name: MethodKey, returns: ReturnKind, body: F) -> Self
    where
        F: Fn(&T, &[CallValue]) -> anyhow::Result<CallValue> + Send + Sync + 'static,
    {
        let invoker: MethodInvoker = Arc::new(move |instance, args| {
            let typed = instance
                .downcast_ref::<T>()
                .ok_or_else(|| anyhow!("proxy target is not a {}", type_name::<T>()))?;
            body(typed, args)
        });
        self.methods.insert(
            name,
            MethodSpec {
                returns,
                invoker: Some(invoker),
            },
        );
        self
    }

    /// Абстрактный метод без реализации — вызов уходит в stub,
    /// если нет перехватчика
    pub fn abstract_method(mut self, name: MethodKey, returns: ReturnKind) -> Self {
        self.methods.insert(
            name,
            MethodSpec {
                returns,
                invoker: None,
            },
        );
        self
    }

    /// Пометить целевой тип как нерасширяемый
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn build(self) -> MethodTable {
        MethodTable {
            target_id: TypeId::of::<T>(),
            target_name: type_name::<T>(),
            methods: self.methods,
            sealed: self.sealed,
        }
    }
}

/// Упорядоченная цепочка before/after/error/around хуков одного метода
#[derive(Clone, Default)]
pub struct InterceptorChain {
    before: Vec<BeforeHook>,
    after: Vec<AfterHook>,
    on_error: Vec<ErrorHook>,
    around: Vec<AroundHook>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MethodCall<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MethodCall<'_>, &CallValue) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MethodCall<'_>, &anyhow::Error) -> Option<CallValue> + Send + Sync + 'static,
    {
        self.on_error.push(Arc::new(hook));
        self
    }

    pub fn around<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MethodCall<'_>) -> anyhow::Result<CallValue> + Send + Sync + 'static,
    {
        self.around.push(Arc::new(hook));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.after.is_empty()
            && self.on_error.is_empty()
            && self.around.is_empty()
    }
}

/// Декларация proxy: таблица + цепочки перехвата + stub
#[derive(Clone)]
pub struct ProxyBlueprint {
    table: Arc<MethodTable>,
    chains: HashMap<MethodKey, InterceptorChain>,
    stub: StubFn,
}

impl ProxyBlueprint {
    pub fn new(table: MethodTable) -> Self {
        Self {
            table: Arc::new(table),
            chains: HashMap::new(),
            stub: Arc::new(CallValue::zero_for),
        }
    }

    pub fn intercept(mut self, method: MethodKey, chain: InterceptorChain) -> Self {
        self.chains.insert(method, chain);
        self
    }

    /// Заменить zero-value stub на собственный
    pub fn with_stub(mut self, stub: StubFn) -> Self {
        self.stub = stub;
        self
    }

    pub fn table(&self) -> &MethodTable {
        &self.table
    }
}

/// Идентичность целевого типа proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Ассоциация proxy с его таблицей, цепочками и целевым экземпляром
pub struct ProxyManager {
    table: Arc<MethodTable>,
    chains: HashMap<MethodKey, InterceptorChain>,
    target: Option<AnyInstance>,
    stub: StubFn,
}

impl ProxyManager {
    pub fn target_descriptor(&self) -> TargetDescriptor {
        TargetDescriptor {
            type_id: self.table.target_id(),
            type_name: self.table.target_name(),
        }
    }

    pub fn target_instance(&self) -> Option<&AnyInstance> {
        self.target.as_ref()
    }

    pub fn chain_for(&self, method: MethodKey) -> Option<&InterceptorChain> {
        self.chains.get(method)
    }

    fn dispatch(&self, method: MethodKey, args: &[CallValue]) -> anyhow::Result<CallValue> {
        let spec = self.table.spec(method).ok_or_else(|| {
            anyhow!(
                "method '{}' is not declared on {}",
                method,
                self.table.target_name()
            )
        })?;

        let call = MethodCall {
            method,
            args,
            target_type: self.table.target_name(),
        };

        let chain = match self.chains.get(method) {
            Some(chain) if !chain.is_empty() => chain,
            // без перехватчиков — напрямую в реализацию или stub
            _ => return self.call_real(spec, args),
        };

        // before-хуки в порядке регистрации; ошибка прерывает вызов
        // до исполнения реального метода
        for hook in &chain.before {
            hook(&call)?;
        }

        // ровно один путь реализации: первый зарегистрированный around
        // замещает реальный вызов; остальные around'ы исполняются, но их
        // результат не перекрывает первый
        let outcome = match chain.around.split_first() {
            Some((primary, rest)) => {
                let result = primary(&call);
                for extra in rest {
                    let _ = extra(&call);
                }
                result
            }
            None => self.call_real(spec, args),
        };

        match outcome {
            Ok(value) => {
                for hook in &chain.after {
                    hook(&call, &value);
                }
                Ok(value)
            }
            Err(err) => {
                let mut substitute: Option<CallValue> = None;
                for hook in &chain.on_error {
                    if let Some(replacement) = hook(&call, &err) {
                        if substitute.is_none() {
                            substitute = Some(replacement);
                        }
                    }
                }
                match substitute {
                    Some(value) => Ok(value),
                    None => Err(err),
                }
            }
        }
    }

    fn call_real(&self, spec: &MethodSpec, args: &[CallValue]) -> anyhow::Result<CallValue> {
        match (&spec.invoker, &self.target) {
            (Some(invoker), Some(target)) => invoker(target, args),
            // нет реализации или нет экземпляра — stub; stub не ошибается
            _ => Ok((self.stub)(spec.returns)),
        }
    }
}

/// Живой proxy: все вызовы идут через dispatch менеджера
pub struct ProxyInstance {
    manager: ProxyManager,
}

impl std::fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyInstance").finish_non_exhaustive()
    }
}

impl ProxyInstance {
    pub fn invoke(&self, method: MethodKey, args: &[CallValue]) -> anyhow::Result<CallValue> {
        self.manager.dispatch(method, args)
    }

    pub fn manager(&self) -> &ProxyManager {
        &self.manager
    }
}

fn thin_ptr(instance: &AnyInstance) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// Scope-owned реестр живых proxy.
///
/// Ключ — идентичность самого proxy-экземпляра (не реального объекта);
/// weak backref'ы не продлевают жизнь proxy, которые контейнер не держит.
#[derive(Default)]
pub struct ProxyRegistry {
    entries: RwLock<HashMap<usize, Weak<ProxyInstance>>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, proxy: &Arc<ProxyInstance>) {
        let mut entries = self.entries.write();
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.insert(
            Arc::as_ptr(proxy) as *const () as usize,
            Arc::downgrade(proxy),
        );
    }

    /// Является ли экземпляр proxy, созданным этим реестром
    pub fn is_proxy(&self, instance: &AnyInstance) -> bool {
        self.lookup(instance).is_some()
    }

    /// Менеджер, стоящий за proxy-экземпляром
    pub fn manager_of(&self, instance: &AnyInstance) -> Option<Arc<ProxyInstance>> {
        self.lookup(instance)
    }

    /// Идентичность реального целевого типа за proxy; `None` для
    /// экземпляров, созданных не этим реестром
    pub fn unwrap_target(&self, instance: &AnyInstance) -> Option<TargetDescriptor> {
        self.lookup(instance)
            .map(|proxy| proxy.manager.target_descriptor())
    }

    pub fn live_count(&self) -> usize {
        let mut entries = self.entries.write();
        entries.retain(|_, weak| weak.strong_count() > 0);
        entries.len()
    }

    fn lookup(&self, instance: &AnyInstance) -> Option<Arc<ProxyInstance>> {
        self.entries
            .read()
            .get(&thin_ptr(instance))
            .and_then(Weak::upgrade)
    }
}

/// Фабрика proxy-экземпляров.
///
/// Способность проксировать проверяется здесь, на границе конструирования:
/// sealed-таблица или несовпадение целевого типа — немедленная ошибка.
pub struct ProxyFactory {
    registry: Arc<ProxyRegistry>,
}

impl ProxyFactory {
    pub fn new(registry: Arc<ProxyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProxyRegistry> {
        &self.registry
    }

    pub fn create(
        &self,
        blueprint: &ProxyBlueprint,
        target: Option<AnyInstance>,
    ) -> ContainerResult<Arc<ProxyInstance>> {
        let table = &blueprint.table;

        if table.is_sealed() {
            return Err(ContainerError::ProxyConstruction {
                target: table.target_name().to_string(),
                reason: "target type is sealed and cannot be extended".to_string(),
            });
        }

        if let Some(instance) = &target {
            if (**instance).type_id() != table.target_id() {
                return Err(ContainerError::ProxyConstruction {
                    target: table.target_name().to_string(),
                    reason: "backing instance is not of the target type".to_string(),
                });
            }
        }

        let proxy = Arc::new(ProxyInstance {
            manager: ProxyManager {
                table: table.clone(),
                chains: blueprint.chains.clone(),
                target,
                stub: blueprint.stub.clone(),
            },
        });
        self.registry.register(&proxy);

        debug!(
            "proxy created for {} ({} methods)",
            table.target_name(),
            table.method_count()
        );
        Ok(proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Adder {
        base: i64,
    }

    struct Pricing; // типизированный интерфейс без реализации

    fn adder_table() -> MethodTable {
        MethodTable::builder::<Adder>()
            .method("add", ReturnKind::Int, |adder, args| {
                let operand = args
                    .first()
                    .and_then(CallValue::as_int)
                    .ok_or_else(|| anyhow!("add expects an int argument"))?;
                Ok(CallValue::Int(adder.base + operand))
            })
            .method("fail", ReturnKind::Int, |_, _| anyhow::bail!("real failure"))
            .build()
    }

    fn factory() -> ProxyFactory {
        ProxyFactory::new(Arc::new(ProxyRegistry::new()))
    }

    #[test]
    fn test_unintercepted_method_delegates_to_real_impl() {
        let factory = factory();
        let blueprint = ProxyBlueprint::new(adder_table());
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 10 })))
            .expect("proxy");

        let result = proxy.invoke("add", &[CallValue::Int(5)]).expect("invoke");
        assert_eq!(result, CallValue::Int(15));
    }

    #[test]
    fn test_default_stub_returns_zero_values_and_never_throws() {
        let factory = factory();
        let table = MethodTable::builder::<Pricing>()
            .abstract_method("count", ReturnKind::Int)
            .abstract_method("rate", ReturnKind::Float)
            .abstract_method("active", ReturnKind::Bool)
            .abstract_method("label", ReturnKind::Str)
            .abstract_method("items", ReturnKind::List)
            .abstract_method("touch", ReturnKind::Unit)
            .build();
        let proxy = factory
            .create(&ProxyBlueprint::new(table), None)
            .expect("proxy");

        assert_eq!(proxy.invoke("count", &[]).expect("count"), CallValue::Int(0));
        assert_eq!(
            proxy.invoke("rate", &[]).expect("rate"),
            CallValue::Float(0.0)
        );
        assert_eq!(
            proxy.invoke("active", &[]).expect("active"),
            CallValue::Bool(false)
        );
        assert_eq!(
            proxy.invoke("label", &[]).expect("label"),
            CallValue::Str(String::new())
        );
        assert_eq!(
            proxy.invoke("items", &[]).expect("items"),
            CallValue::List(Vec::new())
        );
        assert!(proxy.invoke("touch", &[]).expect("touch").is_absent());
    }

    #[test]
    fn test_successful_call_runs_before_real_after_in_order() {
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let factory = factory();

        let chain = {
            let before_log = events.clone();
            let after_log = events.clone();
            let error_log = events.clone();
            InterceptorChain::new()
                .before(move |_| {
                    before_log.lock().push("before");
                    Ok(())
                })
                .after(move |_, _| after_log.lock().push("after"))
                .on_error(move |_, _| {
                    error_log.lock().push("on_error");
                    None
                })
        };

        let real_log = events.clone();
        let table = MethodTable::builder::<Adder>()
            .method("add", ReturnKind::Int, move |adder, _| {
                real_log.lock().push("real");
                Ok(CallValue::Int(adder.base))
            })
            .build();

        let blueprint = ProxyBlueprint::new(table).intercept("add", chain);
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 1 })))
            .expect("proxy");

        proxy.invoke("add", &[]).expect("invoke");
        assert_eq!(*events.lock(), vec!["before", "real", "after"]);
    }

    #[test]
    fn test_failing_call_runs_on_error_and_skips_after() {
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let factory = factory();

        let chain = {
            let before_log = events.clone();
            let after_log = events.clone();
            let error_log = events.clone();
            InterceptorChain::new()
                .before(move |_| {
                    before_log.lock().push("before");
                    Ok(())
                })
                .after(move |_, _| after_log.lock().push("after"))
                .on_error(move |_, _| {
                    error_log.lock().push("on_error");
                    None
                })
        };

        let blueprint = ProxyBlueprint::new(adder_table()).intercept("fail", chain);
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 0 })))
            .expect("proxy");

        let err = proxy.invoke("fail", &[]).unwrap_err();
        assert!(err.to_string().contains("real failure"));
        assert_eq!(*events.lock(), vec!["before", "on_error"]);
    }

    #[test]
    fn test_error_hook_substitute_result() {
        let factory = factory();
        let chain = InterceptorChain::new().on_error(|_, _| Some(CallValue::Int(-1)));
        let blueprint = ProxyBlueprint::new(adder_table()).intercept("fail", chain);
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 0 })))
            .expect("proxy");

        let result = proxy.invoke("fail", &[]).expect("substituted");
        assert_eq!(result, CallValue::Int(-1));
    }

    #[test]
    fn test_before_hook_error_aborts_before_real_call() {
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let factory = factory();

        let real_log = events.clone();
        let table = MethodTable::builder::<Adder>()
            .method("add", ReturnKind::Int, move |_, _| {
                real_log.lock().push("real");
                Ok(CallValue::Int(0))
            })
            .build();

        let chain = InterceptorChain::new().before(|_| anyhow::bail!("denied"));
        let blueprint = ProxyBlueprint::new(table).intercept("add", chain);
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 0 })))
            .expect("proxy");

        assert!(proxy.invoke("add", &[]).is_err());
        assert!(events.lock().is_empty(), "real method must not run");
    }

    #[test]
    fn test_first_registered_around_wins_but_all_run() {
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let factory = factory();

        let chain = {
            let first_log = events.clone();
            let second_log = events.clone();
            InterceptorChain::new()
                .around(move |_| {
                    first_log.lock().push("around1");
                    Ok(CallValue::Int(10))
                })
                .around(move |_| {
                    second_log.lock().push("around2");
                    Ok(CallValue::Int(20))
                })
        };

        let blueprint = ProxyBlueprint::new(adder_table()).intercept("add", chain);
        let proxy = factory
            .create(&blueprint, Some(Arc::new(Adder { base: 100 })))
            .expect("proxy");

        let result = proxy.invoke("add", &[CallValue::Int(1)]).expect("invoke");
        // первый зарегистрированный overwrite побеждает; реальный метод
        // не исполняется, второй around оценён, но результат не перекрыл
        assert_eq!(result, CallValue::Int(10));
        assert_eq!(*events.lock(), vec!["around1", "around2"]);
    }

    #[test]
    fn test_sealed_table_fails_at_creation_time() {
        let factory = factory();
        let table = MethodTable::builder::<Adder>()
            .method("add", ReturnKind::Int, |_, _| Ok(CallValue::Int(0)))
            .sealed()
            .build();

        let err = factory
            .create(&ProxyBlueprint::new(table), None)
            .unwrap_err();
        assert!(matches!(err, ContainerError::ProxyConstruction { .. }));
    }

    #[test]
    fn test_mismatched_backing_instance_rejected() {
        let factory = factory();
        let blueprint = ProxyBlueprint::new(adder_table());

        let err = factory
            .create(&blueprint, Some(Arc::new(Pricing)))
            .unwrap_err();
        assert!(matches!(err, ContainerError::ProxyConstruction { .. }));
    }

    #[test]
    fn test_undeclared_method_is_an_error() {
        let factory = factory();
        let proxy = factory
            .create(&ProxyBlueprint::new(adder_table()), None)
            .expect("proxy");

        let err = proxy.invoke("missing", &[]).unwrap_err();
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn test_registry_round_trip_identity() {
        let registry = Arc::new(ProxyRegistry::new());
        let factory = ProxyFactory::new(registry.clone());
        let proxy = factory
            .create(&ProxyBlueprint::new(adder_table()), None)
            .expect("proxy");

        let erased: AnyInstance = proxy;
        assert!(registry.is_proxy(&erased));
        let descriptor = registry.unwrap_target(&erased).expect("descriptor");
        assert!(descriptor.type_name.contains("Adder"));

        // посторонний экземпляр — не proxy
        let plain: AnyInstance = Arc::new(Adder { base: 0 });
        assert!(!registry.is_proxy(&plain));
        assert!(registry.unwrap_target(&plain).is_none());
    }

    #[test]
    fn test_registry_does_not_retain_dropped_proxies() {
        let registry = Arc::new(ProxyRegistry::new());
        let factory = ProxyFactory::new(registry.clone());

        let proxy = factory
            .create(&ProxyBlueprint::new(adder_table()), None)
            .expect("proxy");
        assert_eq!(registry.live_count(), 1);

        drop(proxy);
        assert_eq!(registry.live_count(), 0);
    }
}
