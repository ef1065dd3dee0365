use std::marker::PhantomData;

use crate::error::EventError;
use crate::types::ValueType;
use crate::value::{EventValue, Value};

/// Turns a value of one representation into another.
///
/// A converter serves exactly one (source, destination) pair; the registry picks it once, when a
/// listener resolves, so `convert` never dispatches on types beyond unpacking its own source.
pub trait Converter: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn convert(&self, value: Value) -> Result<Value, EventError>;
}

/// Exact numeric widening. `D: From<S>` only exists for lossless pairs.
pub struct Widening<S, D> {
    _pair: PhantomData<fn(S) -> D>,
}

impl<S, D> Widening<S, D> {
    pub fn new() -> Self {
        Self { _pair: PhantomData }
    }
}

impl<S, D> Default for Widening<S, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, D> Converter for Widening<S, D>
where
    S: EventValue,
    D: EventValue + From<S>,
{
    fn name(&self) -> &str {
        "widening"
    }

    fn convert(&self, value: Value) -> Result<Value, EventError> {
        match S::from_value(value) {
            Some(source) => Ok(D::from(source).into_value()),
            None => Err(EventError::ConversionFailed {
                from: S::value_type(),
                to: D::value_type(),
                reason: "source value has a different representation".to_string(),
            }),
        }
    }
}

/// Application-defined conversion between two event value types.
///
/// ```ignore
/// struct FlattenToPlane;
///
/// impl CustomConverter for FlattenToPlane {
///     type Source = Vec3;
///     type Destination = Vec2;
///
///     fn convert(&self, source: Vec3) -> anyhow::Result<Vec2> {
///         Ok(source.truncate())
///     }
/// }
/// ```
///
/// The built-in table only holds exact widenings. Rounding integer to float pairs
/// (i32/u32 -> f32, i64/u64 -> f32 and f64) are left to the application:
///
/// ```ignore
/// struct LossyWidening;
///
/// impl CustomConverter for LossyWidening {
///     type Source = i64;
///     type Destination = f64;
///
///     fn convert(&self, source: i64) -> anyhow::Result<f64> {
///         Ok(source as f64)
///     }
/// }
///
/// builder.converter(LossyWidening);
/// ```
pub trait CustomConverter: Send + Sync + 'static {
    type Source: EventValue;
    type Destination: EventValue;

    fn convert(&self, source: Self::Source) -> anyhow::Result<Self::Destination>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub(crate) struct CustomAdapter<C>(pub(crate) C);

impl<C: CustomConverter> Converter for CustomAdapter<C> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn convert(&self, value: Value) -> Result<Value, EventError> {
        let failed = |reason: String| EventError::ConversionFailed {
            from: C::Source::value_type(),
            to: C::Destination::value_type(),
            reason,
        };
        let source = C::Source::from_value(value)
            .ok_or_else(|| failed("source value has a different representation".to_string()))?;
        self.0.convert(source).map(EventValue::into_value).map_err(|err| failed(format!("{err:#}")))
    }
}

/// Converter backed by a plain function, for pairs whose types are only known by name.
pub struct FnConverter<F> {
    name: String,
    from: ValueType,
    to: ValueType,
    convert: F,
}

impl<F> FnConverter<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, from: ValueType, to: ValueType, convert: F) -> Self {
        Self { name: name.into(), from, to, convert }
    }

    pub fn source(&self) -> &ValueType {
        &self.from
    }

    pub fn destination(&self) -> &ValueType {
        &self.to
    }
}

impl<F> Converter for FnConverter<F>
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(&self, value: Value) -> Result<Value, EventError> {
        let converted = (self.convert)(value).map_err(|err| EventError::ConversionFailed {
            from: self.from.clone(),
            to: self.to.clone(),
            reason: format!("{err:#}"),
        })?;
        if converted.value_type() != self.to {
            return Err(EventError::ConversionFailed {
                from: self.from.clone(),
                to: self.to.clone(),
                reason: format!("{} produced a {} value", self.name, converted.value_type()),
            });
        }
        Ok(converted)
    }
}
