use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Type descriptor for event parameters, method parameters and stored argument values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Decimal,
    String,
    Vec2,
    Vec3,
    Entity,
    /// Application type identified by name, stored as [`crate::value::NamedValue`].
    Named(String),
    /// Accepts a value of any type without conversion.
    Any,
}

impl ValueType {
    pub fn named(name: impl Into<String>) -> Self {
        ValueType::Named(name.into())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::I8
                | ValueType::U8
                | ValueType::I16
                | ValueType::U16
                | ValueType::I32
                | ValueType::U32
                | ValueType::I64
                | ValueType::U64
                | ValueType::F32
                | ValueType::F64
                | ValueType::Decimal
        )
    }

    pub fn label(&self) -> &str {
        match self {
            ValueType::Bool => "bool",
            ValueType::I8 => "i8",
            ValueType::U8 => "u8",
            ValueType::I16 => "i16",
            ValueType::U16 => "u16",
            ValueType::I32 => "i32",
            ValueType::U32 => "u32",
            ValueType::I64 => "i64",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Entity => "entity",
            ValueType::Named(name) => name.as_str(),
            ValueType::Any => "any",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Subtype relations between named types.
///
/// Built-in types have no parents. Every type is assignable to [`ValueType::Any`].
#[derive(Debug, Default, Clone)]
pub struct TypeHierarchy {
    parents: HashMap<String, String>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `child` as a direct subtype of `parent`. Returns false (and keeps the existing
    /// relation) if `child` already has a parent or the declaration would create a cycle.
    pub fn declare(&mut self, child: impl Into<String>, parent: impl Into<String>) -> bool {
        let child = child.into();
        let parent = parent.into();
        if self.parents.contains_key(&child) || child == parent || self.ancestors(&parent).any(|a| a == child) {
            return false;
        }
        self.parents.insert(child, parent);
        true
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.parents.get(name).map(String::as_str)
    }

    pub fn ancestors<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut current = self.parent_of(name);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.parent_of(next);
            Some(next)
        })
    }

    /// Whether a value of type `from` can be used where `to` is expected without conversion.
    pub fn is_assignable(&self, from: &ValueType, to: &ValueType) -> bool {
        if from == to || *to == ValueType::Any {
            return true;
        }
        match (from, to) {
            (ValueType::Named(child), ValueType::Named(parent)) => {
                self.ancestors(child).any(|ancestor| ancestor == parent.as_str())
            }
            _ => false,
        }
    }
}
