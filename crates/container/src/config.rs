//! Конфигурация контейнера.

/// Конфигурация DI контейнера
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Имя контейнера (попадает в имя root scope'а)
    pub name: String,
    /// Включить валидацию графа зависимостей
    pub enable_validation: bool,
    /// Включить сбор метрик производительности
    pub enable_metrics: bool,
    /// Максимальная глубина цепочки разрешения
    pub max_dependency_depth: u32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "root".to_string(),
            enable_validation: true,
            enable_metrics: true,
            max_dependency_depth: 20,
        }
    }
}

impl ContainerConfig {
    /// Production конфигурация с более строгим лимитом глубины
    pub fn production() -> Self {
        Self {
            max_dependency_depth: 15,
            ..Self::default()
        }
    }

    /// Minimal конфигурация для тестов: без валидации и метрик
    pub fn minimal() -> Self {
        Self {
            name: "minimal".to_string(),
            enable_validation: false,
            enable_metrics: false,
            max_dependency_depth: 10,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
