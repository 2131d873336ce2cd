//! Валидация графа зависимостей: два прохода через composite validator.
//!
//! Before-configuration — проверка циклов по чистой топологии, до любых
//! side effects инстанцирования. After-configuration — presence-проверка:
//! сравнение множества реально посещённых ключей с полным набором узлов.
//! Разделение позволяет не выполнять дорогое инстанцирование, пока не
//! подтверждена ацикличность.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::errors::{ContainerError, ContainerResult};
use crate::graph::DependencyGraph;
use crate::key::ComponentKey;

/// Контекст одного валидационного прохода
pub struct ValidationContext<'a> {
    pub graph: &'a DependencyGraph,
    /// Ключи, посещённые фазой инстанцирования (пусто для before-прохода)
    pub visited: &'a HashSet<ComponentKey>,
}

pub trait GraphValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, ctx: &ValidationContext<'_>) -> ContainerResult<()>;
}

/// Fan-out на зарегистрированный набор валидаторов.
/// Первая ошибка прерывает весь проход.
#[derive(Default)]
pub struct CompositeValidator {
    validators: Vec<Box<dyn GraphValidator>>,
}

impl CompositeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: Box<dyn GraphValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn push(&mut self, validator: Box<dyn GraphValidator>) {
        self.validators.push(validator);
    }

    /// Стандартный before-configuration проход
    pub fn before_configuration() -> Self {
        Self::new().with(Box::new(CycleValidator))
    }

    /// Стандартный after-configuration проход
    pub fn after_configuration() -> Self {
        Self::new().with(Box::new(PresenceValidator))
    }

    pub fn validate(&self, ctx: &ValidationContext<'_>) -> ContainerResult<()> {
        for validator in &self.validators {
            debug!("🔍 running {} validator", validator.name());
            if let Err(e) = validator.validate(ctx) {
                error!("❌ {} validation failed: {}", validator.name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Обнаружение циклов BFS-обходом от каждого нелистового некорневого узла.
///
/// Листья и назначенный корень исключены: по построению обхода они не
/// могут участвовать в цикле. O(V*E) в худшем случае приемлемо — граф
/// компонентов маленький и проход выполняется один раз на startup.
pub struct CycleValidator;

impl GraphValidator for CycleValidator {
    fn name(&self) -> &'static str {
        "cycle"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ContainerResult<()> {
        let graph = ctx.graph;
        for index in 0..graph.len() {
            if graph.is_leaf(index) || graph.is_root(index) {
                continue;
            }
            if let Some(cycle) = graph.cycle_through(index) {
                let chain: Vec<String> = cycle
                    .iter()
                    .map(|&i| graph.node(i).key().to_string())
                    .collect();
                return Err(ContainerError::CyclicDependency { chain });
            }
        }
        debug!("✅ no dependency cycles found");
        Ok(())
    }
}

/// Presence-проверка: каждый узел графа должен быть посещён фазой
/// инстанцирования. Непосещённые узлы перечисляются одной ошибкой.
pub struct PresenceValidator;

impl GraphValidator for PresenceValidator {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ContainerResult<()> {
        let mut missing: Vec<String> = ctx
            .graph
            .keys()
            .filter(|key| !ctx.visited.contains(*key))
            .map(ToString::to_string)
            .collect();

        if !missing.is_empty() {
            missing.sort();
            return Err(ContainerError::MissingDependencies { keys: missing });
        }
        debug!("✅ all {} graph nodes were resolved", ctx.graph.len());
        Ok(())
    }
}
