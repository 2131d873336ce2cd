//! Error handling для всех операций контейнера.
//!
//! Structured error taxonomy вместо anyhow-строк: каждый вид отказа несёт
//! имя ключа для диагностики. Конверсия в anyhow::Error доступна через
//! std::error::Error для интеграции с существующим кодом.

use thiserror::Error;

pub type ContainerResult<T> = Result<T, ContainerError>;

/// Основной error type контейнера.
///
/// Политика распространения: контейнер никогда не глотает ошибки — каждый
/// вариант синхронно доходит до вызывающего `get` либо фатален для startup
/// (циклы и presence-валидация).
#[derive(Debug, Error, Clone)]
pub enum ContainerError {
    /// Селекция провайдера вернула null для обязательного запроса
    #[error("no binding registered for {key}")]
    UnboundKey { key: String },

    /// Повторный add на занятый приоритет — тихая перезапись запрещена
    #[error("priority {priority} is already occupied in the hierarchy for {key}")]
    DuplicatePriority { key: String, priority: i32 },

    /// Qualifier нарушает собственные metadata-требования
    #[error("invalid qualifier: {reason}")]
    InvalidQualifier { reason: String },

    /// Статический цикл, найденный before-configuration проходом
    #[error("circular dependency detected: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    /// Узлы, объявленные но так и не разрешённые (after-configuration проход).
    /// Все ключи перечисляются одной ошибкой, а не по первому найденному.
    #[error("declared but never resolved: {}", .keys.join(", "))]
    MissingDependencies { keys: Vec<String> },

    /// Factory/supplier упал при производстве экземпляра
    #[error("failed to instantiate {key}: {message}")]
    InstantiationFailed { key: String, message: String },

    /// Целевой тип нельзя проксировать — проверяется при создании proxy,
    /// а не при первом вызове метода
    #[error("cannot construct proxy for {target}: {reason}")]
    ProxyConstruction { target: String, reason: String },

    /// Динамический цикл: factory рекурсивно запросила собственный ключ
    #[error("runtime resolution cycle: {}", .chain.join(" -> "))]
    RuntimeCycle { chain: Vec<String> },

    /// Глубина цепочки разрешения превысила лимит конфигурации
    #[error("dependency depth {depth} exceeded while resolving {key}")]
    DepthExceeded { key: String, depth: u32 },

    /// Разрешённый экземпляр не приводится к запрошенному типу
    #[error("resolved instance for {key} is not a {expected}")]
    TypeMismatch { key: String, expected: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_renders_chain() {
        let err = ContainerError::CyclicDependency {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency detected: A -> B -> A"
        );
    }

    #[test]
    fn test_missing_dependencies_enumerates_all_keys() {
        let err = ContainerError::MissingDependencies {
            keys: vec!["D".into(), "E".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("D"));
        assert!(msg.contains("E"));
    }

    #[test]
    fn test_error_converts_to_anyhow() {
        let err = ContainerError::UnboundKey { key: "X".into() };
        let any: anyhow::Error = err.into();
        assert!(any.to_string().contains("no binding registered"));
    }
}
