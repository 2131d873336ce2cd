//! Идентификация компонентов: тип + опциональный qualifier.
//!
//! [`ComponentKey`] — неизменяемая value-equal идентичность, по которой
//! компонент запрашивается и биндится. Два ключа равны тогда и только
//! тогда, когда совпадают TypeId и qualifier (включая deep-equal сравнение
//! metadata). Ключи используются как hash-map ключи во всём контейнере.

use std::any::{type_name, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::errors::{ContainerError, ContainerResult};

/// Вид qualifier'а: определяет требования к metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierKind {
    /// Именованный qualifier — ТРЕБУЕТ metadata-ключ `value`
    Named,
    /// Маркерный qualifier с меткой — metadata ЗАПРЕЩЕНА
    Marker(&'static str),
}

/// Qualifier компонента: вид + metadata map.
///
/// Инвариант metadata проверяется при конструировании — ключ, нарушающий
/// требования своего вида, не может существовать.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
    kind: QualifierKind,
    metadata: BTreeMap<String, String>,
}

impl Qualifier {
    /// Именованный qualifier с обязательным `value`
    pub fn named(value: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("value".to_string(), value.into());
        Self {
            kind: QualifierKind::Named,
            metadata,
        }
    }

    /// Маркерный qualifier без metadata
    pub fn marker(label: &'static str) -> Self {
        Self {
            kind: QualifierKind::Marker(label),
            metadata: BTreeMap::new(),
        }
    }

    /// Построить qualifier с произвольной metadata, проверяя инвариант вида
    pub fn with_metadata(
        kind: QualifierKind,
        metadata: BTreeMap<String, String>,
    ) -> ContainerResult<Self> {
        Self::validate(kind, &metadata)?;
        Ok(Self { kind, metadata })
    }

    fn validate(kind: QualifierKind, metadata: &BTreeMap<String, String>) -> ContainerResult<()> {
        match kind {
            QualifierKind::Named => {
                if !metadata.contains_key("value") {
                    return Err(ContainerError::InvalidQualifier {
                        reason: "named qualifier requires a `value` metadata entry".to_string(),
                    });
                }
            }
            QualifierKind::Marker(label) => {
                if !metadata.is_empty() {
                    return Err(ContainerError::InvalidQualifier {
                        reason: format!("marker qualifier `{label}` forbids metadata"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> QualifierKind {
        self.kind
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// `value` именованного qualifier'а, если есть
    pub fn value(&self) -> Option<&str> {
        self.metadata.get("value").map(String::as_str)
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QualifierKind::Named => write!(f, "name={:?}", self.value().unwrap_or("")),
            QualifierKind::Marker(label) => write!(f, "[{label}]"),
        }
    }
}

/// Идентичность запрашиваемого компонента.
///
/// `type_name` не участвует в равенстве — он хранится только для
/// диагностических сообщений.
#[derive(Clone)]
pub struct ComponentKey {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Qualifier>,
}

impl ComponentKey {
    /// Ключ по типу без qualifier'а
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: None,
        }
    }

    /// Ключ по типу с именованным qualifier'ом
    pub fn named<T: ?Sized + 'static>(value: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: Some(Qualifier::named(value)),
        }
    }

    /// Ключ с уже построенным (и потому валидным) qualifier'ом
    pub fn qualified<T: ?Sized + 'static>(qualifier: Qualifier) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            qualifier: Some(qualifier),
        }
    }

    /// Ключ с qualifier'ом, собранным из сырых вида и metadata.
    /// Нарушение инварианта metadata — немедленная ошибка.
    pub fn try_qualified<T: ?Sized + 'static>(
        kind: QualifierKind,
        metadata: BTreeMap<String, String>,
    ) -> ContainerResult<Self> {
        Ok(Self::qualified::<T>(Qualifier::with_metadata(kind, metadata)?))
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Человекочитаемое имя типа для сообщений об ошибках
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn qualifier(&self) -> Option<&Qualifier> {
        self.qualifier.as_ref()
    }
}

impl PartialEq for ComponentKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for ComponentKey {}

impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "ComponentKey({}, {})", self.type_name, q),
            None => write!(f, "ComponentKey({})", self.type_name),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{} ({})", self.type_name, q),
            None => write!(f, "{}", self.type_name),
        }
    }
}
