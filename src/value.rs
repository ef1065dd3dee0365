use bevy_ecs::prelude::Entity;
use glam::{Vec2, Vec3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ValueType;

/// A stored or call-site argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Entity(#[serde(with = "entity_bits")] Entity),
    Named(NamedValue),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::I8(_) => ValueType::I8,
            Value::U8(_) => ValueType::U8,
            Value::I16(_) => ValueType::I16,
            Value::U16(_) => ValueType::U16,
            Value::I32(_) => ValueType::I32,
            Value::U32(_) => ValueType::U32,
            Value::I64(_) => ValueType::I64,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Decimal(_) => ValueType::Decimal,
            Value::String(_) => ValueType::String,
            Value::Vec2(_) => ValueType::Vec2,
            Value::Vec3(_) => ValueType::Vec3,
            Value::Entity(_) => ValueType::Entity,
            Value::Named(named) => ValueType::Named(named.type_name.clone()),
        }
    }

    pub fn as_named(&self) -> Option<&NamedValue> {
        match self {
            Value::Named(named) => Some(named),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}i8"),
            Value::U8(v) => write!(f, "{v}u8"),
            Value::I16(v) => write!(f, "{v}i16"),
            Value::U16(v) => write!(f, "{v}u16"),
            Value::I32(v) => write!(f, "{v}i32"),
            Value::U32(v) => write!(f, "{v}u32"),
            Value::I64(v) => write!(f, "{v}i64"),
            Value::U64(v) => write!(f, "{v}u64"),
            Value::F32(v) => write!(f, "{v}f32"),
            Value::F64(v) => write!(f, "{v}f64"),
            Value::Decimal(v) => write!(f, "{v}m"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Vec2(v) => write!(f, "({}, {})", v.x, v.y),
            Value::Vec3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Entity(entity) => write!(f, "entity#{}", entity.index()),
            Value::Named(named) => write!(f, "{}{}", named.type_name, named.data),
        }
    }
}

/// Fixed-point decimal: `mantissa * 10^-scale`. Every integer up to 64 bits is exact.
///
/// The scale never exceeds [`Decimal::MAX_SCALE`], including for values read from assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDecimal")]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

#[derive(Deserialize)]
struct RawDecimal {
    mantissa: i128,
    scale: u32,
}

impl TryFrom<RawDecimal> for Decimal {
    type Error = String;

    fn try_from(raw: RawDecimal) -> Result<Self, Self::Error> {
        Decimal::new(raw.mantissa, raw.scale)
            .ok_or_else(|| format!("decimal scale {} exceeds {}", raw.scale, Decimal::MAX_SCALE))
    }
}

impl Decimal {
    pub const MAX_SCALE: u32 = 28;

    /// `None` when `scale` is above [`Decimal::MAX_SCALE`].
    pub fn new(mantissa: i128, scale: u32) -> Option<Self> {
        (scale <= Self::MAX_SCALE).then_some(Self { mantissa, scale })
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }
}

macro_rules! decimal_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Decimal {
                fn from(value: $ty) -> Self {
                    Decimal { mantissa: i128::from(value), scale: 0 }
                }
            }
        )*
    };
}

decimal_from_int!(i8, u8, i16, u16, i32, u32, i64, u64);

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale + 1 - digits.len()))
        } else {
            digits
        };
        let (whole, frac) = padded.split_at(padded.len() - scale);
        let sign = if self.mantissa < 0 { "-" } else { "" };
        write!(f, "{sign}{whole}.{frac}")
    }
}

/// Value of an application-defined type, kept as JSON text so every asset format can carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    pub type_name: String,
    pub data: String,
}

impl NamedValue {
    pub fn encode<T: Serialize>(type_name: impl Into<String>, value: &T) -> serde_json::Result<Self> {
        Ok(Self { type_name: type_name.into(), data: serde_json::to_string(value)? })
    }

    /// Like [`NamedValue::encode`], falling back to `null` data when the value cannot be encoded.
    pub fn encode_or_null<T: Serialize>(type_name: &str, value: &T) -> Self {
        Self::encode(type_name, value).unwrap_or_else(|err| {
            tracing::warn!(type_name, "failed to encode named value: {err}");
            Self { type_name: type_name.to_string(), data: "null".to_string() }
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.data)
    }
}

/// Rust types that can travel through an event as a [`Value`].
pub trait EventValue: Sized + 'static {
    fn value_type() -> ValueType;
    fn from_value(value: Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! builtin_event_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl EventValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::$variant
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

builtin_event_value!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Entity => Entity,
);

impl EventValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

/// Implements [`EventValue`] for a serde type under a stable type name.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Damage { amount: u32 }
/// named_event_value!(Damage, "Damage");
/// ```
#[macro_export]
macro_rules! named_event_value {
    ($ty:ty, $name:expr) => {
        impl $crate::value::EventValue for $ty {
            fn value_type() -> $crate::types::ValueType {
                $crate::types::ValueType::named($name)
            }

            fn from_value(value: $crate::value::Value) -> Option<Self> {
                value.as_named()?.decode().ok()
            }

            fn into_value(self) -> $crate::value::Value {
                $crate::value::Value::Named($crate::value::NamedValue::encode_or_null($name, &self))
            }
        }
    };
}

pub(crate) mod entity_bits {
    use bevy_ecs::prelude::Entity;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(entity: &Entity, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(entity.to_bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Entity, D::Error> {
        let bits = u64::deserialize(deserializer)?;
        Entity::try_from_bits(bits).map_err(|_| D::Error::custom(format!("invalid entity bits {bits}")))
    }
}
