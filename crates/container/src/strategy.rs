//! Instantiation strategies — варианты производства экземпляров.
//!
//! Закрытый tagged union вместо наследования: каждый вариант явно несёт
//! свои поля, диспетчеризация через match. Стратегия производит
//! [`ObjectContainer`] — экземпляр плюс metadata для кэширования и
//! post-processing; что именно делает post-processing, стратегия не знает.

use std::any::Any;
use std::sync::Arc;

use crate::errors::{ContainerError, ContainerResult};
use crate::key::ComponentKey;
use crate::provider::ComponentProvider;
use crate::proxy::ProxyBlueprint;

/// Type-erased экземпляр компонента
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Supplier получает провайдер для разрешения собственных зависимостей
pub type InstanceSupplier =
    Arc<dyn Fn(&ComponentProvider) -> anyhow::Result<AnyInstance> + Send + Sync>;

#[derive(Clone)]
pub enum InstantiationStrategy {
    /// Готовый экземпляр, известный на момент биндинга
    Singleton {
        instance: AnyInstance,
        post_process: bool,
    },
    /// Singleton, конструируемый supplier'ом при первом запросе
    LazySingleton {
        supplier: InstanceSupplier,
        post_process: bool,
    },
    /// Новый экземпляр на каждый запрос
    Factory {
        supplier: InstanceSupplier,
        post_process: bool,
    },
    /// Proxy над целевым типом с перехватом методов
    ProxyBacked {
        blueprint: ProxyBlueprint,
        target: Option<AnyInstance>,
    },
}

/// Произведённый экземпляр + metadata жизненного цикла
pub struct ObjectContainer {
    pub instance: AnyInstance,
    pub is_singleton: bool,
    pub requires_post_processing: bool,
}

impl std::fmt::Debug for ObjectContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContainer")
            .field("is_singleton", &self.is_singleton)
            .field("requires_post_processing", &self.requires_post_processing)
            .finish_non_exhaustive()
    }
}

impl InstantiationStrategy {
    pub fn singleton<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Singleton {
            instance: Arc::new(value),
            post_process: false,
        }
    }

    pub fn singleton_instance(instance: AnyInstance) -> Self {
        Self::Singleton {
            instance,
            post_process: false,
        }
    }

    pub fn lazy<T, F>(supplier: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentProvider) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::LazySingleton {
            supplier: erase_supplier(supplier),
            post_process: false,
        }
    }

    pub fn factory<T, F>(supplier: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentProvider) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::Factory {
            supplier: erase_supplier(supplier),
            post_process: false,
        }
    }

    pub fn proxy(blueprint: ProxyBlueprint, target: Option<AnyInstance>) -> Self {
        Self::ProxyBacked { blueprint, target }
    }

    /// Пометить, что произведённый экземпляр требует post-processing
    /// перед кэшированием/выдачей. Для proxy не применимо.
    pub fn with_post_processing(self) -> Self {
        match self {
            Self::Singleton { instance, .. } => Self::Singleton {
                instance,
                post_process: true,
            },
            Self::LazySingleton { supplier, .. } => Self::LazySingleton {
                supplier,
                post_process: true,
            },
            Self::Factory { supplier, .. } => Self::Factory {
                supplier,
                post_process: true,
            },
            other => other,
        }
    }

    /// Участвует ли стратегия в singleton-кэшировании
    pub fn is_singleton_shaped(&self) -> bool {
        !matches!(self, Self::Factory { .. })
    }

    pub fn requires_post_processing(&self) -> bool {
        match self {
            Self::Singleton { post_process, .. }
            | Self::LazySingleton { post_process, .. }
            | Self::Factory { post_process, .. } => *post_process,
            Self::ProxyBacked { .. } => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Singleton { .. } => "singleton",
            Self::LazySingleton { .. } => "lazy-singleton",
            Self::Factory { .. } => "factory",
            Self::ProxyBacked { .. } => "proxy",
        }
    }

    /// Произвести экземпляр для ключа.
    ///
    /// Ошибки supplier'ов оборачиваются ключом запроса; сама стратегия
    /// ошибки не глотает и не ретраит.
    pub fn provide(
        &self,
        provider: &ComponentProvider,
        key: &ComponentKey,
    ) -> ContainerResult<ObjectContainer> {
        match self {
            Self::Singleton {
                instance,
                post_process,
            } => Ok(ObjectContainer {
                instance: instance.clone(),
                is_singleton: true,
                requires_post_processing: *post_process,
            }),
            Self::LazySingleton {
                supplier,
                post_process,
            } => {
                let instance = run_supplier(supplier, provider, key)?;
                Ok(ObjectContainer {
                    instance,
                    is_singleton: true,
                    requires_post_processing: *post_process,
                })
            }
            Self::Factory {
                supplier,
                post_process,
            } => {
                let instance = run_supplier(supplier, provider, key)?;
                Ok(ObjectContainer {
                    instance,
                    is_singleton: false,
                    requires_post_processing: *post_process,
                })
            }
            Self::ProxyBacked { blueprint, target } => {
                let proxy = provider.proxy_factory().create(blueprint, target.clone())?;
                let instance: AnyInstance = proxy;
                Ok(ObjectContainer {
                    instance,
                    is_singleton: true,
                    requires_post_processing: false,
                })
            }
        }
    }
}

fn erase_supplier<T, F>(supplier: F) -> InstanceSupplier
where
    T: Send + Sync + 'static,
    F: Fn(&ComponentProvider) -> anyhow::Result<T> + Send + Sync + 'static,
{
    Arc::new(move |provider| {
        let value = supplier(provider)?;
        Ok(Arc::new(value) as AnyInstance)
    })
}

fn run_supplier(
    supplier: &InstanceSupplier,
    provider: &ComponentProvider,
    key: &ComponentKey,
) -> ContainerResult<AnyInstance> {
    supplier(provider).map_err(|e| ContainerError::InstantiationFailed {
        key: key.to_string(),
        message: format!("{e:#}"),
    })
}
