use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::converter::{Converter, CustomAdapter, CustomConverter, FnConverter, Widening};
use crate::error::EventError;
use crate::types::ValueType;
use crate::value::{Decimal, EventValue, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConverterKey {
    pub source: ValueType,
    pub destination: ValueType,
}

impl ConverterKey {
    pub fn new(source: ValueType, destination: ValueType) -> Self {
        Self { source, destination }
    }

    pub fn of<S: EventValue, D: EventValue>() -> Self {
        Self::new(S::value_type(), D::value_type())
    }
}

impl fmt::Display for ConverterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterOrigin {
    BuiltIn,
    Custom,
}

struct ConverterSlot {
    converter: Arc<dyn Converter>,
    origin: ConverterOrigin,
}

/// Table of conversions between argument representations, keyed by (source, destination).
///
/// `new()` installs the numeric widenings before anything else, so a custom converter can never
/// replace a built-in one. Later registrations for a taken key are rejected and recorded.
pub struct ConverterRegistry {
    slots: HashMap<ConverterKey, ConverterSlot>,
    conflicts: Vec<ConverterKey>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! register_widenings {
    ($registry:expr, $from:ty => [$($to:ty),* $(,)?]) => {
        $( $registry.register_builtin::<$from, $to>(); )*
    };
}

impl ConverterRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self { slots: HashMap::new(), conflicts: Vec::new() }
    }

    fn register_builtins(&mut self) {
        register_widenings!(self, i8 => [i16, i32, i64, f32, f64, Decimal]);
        register_widenings!(self, u8 => [i16, u16, i32, u32, i64, u64, f32, f64, Decimal]);
        register_widenings!(self, i16 => [i32, i64, f32, f64, Decimal]);
        register_widenings!(self, u16 => [i32, u32, i64, u64, f32, f64, Decimal]);
        register_widenings!(self, i32 => [i64, f64, Decimal]);
        register_widenings!(self, u32 => [i64, u64, f64, Decimal]);
        register_widenings!(self, i64 => [Decimal]);
        register_widenings!(self, u64 => [Decimal]);
        register_widenings!(self, f32 => [f64]);
    }

    /// Installs the exact widening `S -> D`. Returns false if the pair was already registered.
    pub fn register_builtin<S, D>(&mut self) -> bool
    where
        S: EventValue,
        D: EventValue + From<S>,
    {
        let key = ConverterKey::of::<S, D>();
        if self.slots.contains_key(&key) {
            return false;
        }
        let converter: Arc<dyn Converter> = Arc::new(Widening::<S, D>::new());
        self.slots.insert(key, ConverterSlot { converter, origin: ConverterOrigin::BuiltIn });
        true
    }

    pub fn register_custom<C: CustomConverter>(&mut self, converter: C) -> Result<(), EventError> {
        let key = ConverterKey::of::<C::Source, C::Destination>();
        self.register_custom_dyn(key, Arc::new(CustomAdapter(converter)))
    }

    pub fn register_fn<F>(
        &mut self,
        source: ValueType,
        destination: ValueType,
        name: impl Into<String>,
        convert: F,
    ) -> Result<(), EventError>
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let key = ConverterKey::new(source.clone(), destination.clone());
        self.register_custom_dyn(key, Arc::new(FnConverter::new(name, source, destination, convert)))
    }

    pub fn register_custom_dyn(
        &mut self,
        key: ConverterKey,
        converter: Arc<dyn Converter>,
    ) -> Result<(), EventError> {
        if let Some(existing) = self.slots.get(&key) {
            let err = EventError::ConverterConflict {
                key: key.clone(),
                existing: existing.converter.name().to_string(),
                rejected: converter.name().to_string(),
            };
            tracing::warn!(%key, "two converters for the same pair of types: {err}");
            self.conflicts.push(key);
            return Err(err);
        }
        self.slots.insert(key, ConverterSlot { converter, origin: ConverterOrigin::Custom });
        Ok(())
    }

    pub fn resolve(&self, source: &ValueType, destination: &ValueType) -> Option<Arc<dyn Converter>> {
        let key = ConverterKey::new(source.clone(), destination.clone());
        self.slots.get(&key).map(|slot| Arc::clone(&slot.converter))
    }

    pub fn contains(&self, source: &ValueType, destination: &ValueType) -> bool {
        self.origin(source, destination).is_some()
    }

    pub fn origin(&self, source: &ValueType, destination: &ValueType) -> Option<ConverterOrigin> {
        let key = ConverterKey::new(source.clone(), destination.clone());
        self.slots.get(&key).map(|slot| slot.origin)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConverterKey> {
        self.slots.keys()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Keys whose second registration was rejected, in rejection order.
    pub fn conflicts(&self) -> &[ConverterKey] {
        &self.conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_only_exact_pairs() {
        let registry = ConverterRegistry::new();
        assert_eq!(registry.len(), 37);
        assert!(registry.contains(&ValueType::I8, &ValueType::Decimal));
        assert!(registry.contains(&ValueType::F32, &ValueType::F64));
        assert!(!registry.contains(&ValueType::I32, &ValueType::F32), "i32 -> f32 rounds");
        assert!(!registry.contains(&ValueType::U64, &ValueType::F64), "u64 -> f64 rounds");
        assert!(!registry.contains(&ValueType::I32, &ValueType::I16), "narrowing is never built in");
        assert!(registry.keys().all(|key| key.source.is_numeric() && key.destination.is_numeric()));
    }

    #[test]
    fn register_builtin_twice_keeps_the_first() {
        let mut registry = ConverterRegistry::empty();
        assert!(registry.register_builtin::<u8, u16>());
        assert!(!registry.register_builtin::<u8, u16>());
        assert_eq!(registry.len(), 1);
    }
}
