use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::converter::Converter;
use crate::converter_registry::ConverterRegistry;
use crate::error::EventError;
use crate::types::{TypeHierarchy, ValueType};
use crate::value::{EventValue, Value};

/// One configured argument of a persistent listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentArgument {
    /// The parameter type the argument is presented as.
    pub target_type: ValueType,
    pub source: ArgumentSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentSource {
    /// Value stored with the listener.
    Constant { declared_type: ValueType, value: Value },
    /// Value passed to the event at `index`.
    CallSite { index: usize },
}

impl PersistentArgument {
    /// Stored value presented as its own type.
    pub fn constant(value: Value) -> Self {
        let declared_type = value.value_type();
        Self { target_type: declared_type.clone(), source: ArgumentSource::Constant { declared_type, value } }
    }

    pub fn constant_of<T: EventValue>(value: T) -> Self {
        Self::constant(value.into_value())
    }

    pub fn call_site(index: usize, target_type: ValueType) -> Self {
        Self { target_type, source: ArgumentSource::CallSite { index } }
    }

    pub fn targeting(mut self, target_type: ValueType) -> Self {
        self.target_type = target_type;
        self
    }

    pub fn is_call_site(&self) -> bool {
        matches!(self.source, ArgumentSource::CallSite { .. })
    }

    /// Type of the value before conversion, if it can be known without the event.
    pub fn source_type(&self) -> Option<&ValueType> {
        match &self.source {
            ArgumentSource::Constant { declared_type, .. } => Some(declared_type),
            ArgumentSource::CallSite { .. } => None,
        }
    }

    /// Checks the argument against an event signature without a method to call.
    pub fn check(
        &self,
        position: usize,
        event_params: &[ValueType],
        converters: &ConverterRegistry,
        types: &TypeHierarchy,
    ) -> Result<(), EventError> {
        let binder = Binder { converters, types, event_params };
        binder.plan(position, self, &self.target_type).map(|_| ())
    }
}

/// Resolved form of an argument, cached by a ready listener.
pub(crate) enum ArgumentPlan {
    Constant(Value),
    CallSite { position: usize, index: usize, converter: Option<Arc<dyn Converter>> },
}

impl ArgumentPlan {
    pub(crate) fn produce(&self, call_site: &[Value]) -> Result<Value, EventError> {
        match self {
            ArgumentPlan::Constant(value) => Ok(value.clone()),
            ArgumentPlan::CallSite { position, index, converter } => {
                let value = call_site.get(*index).cloned().ok_or(EventError::ParamIndexOutOfRange {
                    index: *position,
                    param: *index,
                    available: call_site.len(),
                })?;
                match converter {
                    Some(converter) => converter.convert(value),
                    None => Ok(value),
                }
            }
        }
    }
}

pub(crate) struct Binder<'a> {
    pub converters: &'a ConverterRegistry,
    pub types: &'a TypeHierarchy,
    pub event_params: &'a [ValueType],
}

impl Binder<'_> {
    pub(crate) fn plan(
        &self,
        position: usize,
        argument: &PersistentArgument,
        param_type: &ValueType,
    ) -> Result<ArgumentPlan, EventError> {
        if argument.target_type != *param_type {
            return Err(EventError::TargetTypeMismatch {
                index: position,
                declared: argument.target_type.clone(),
                expected: param_type.clone(),
            });
        }
        match &argument.source {
            ArgumentSource::Constant { declared_type, value } => {
                let actual = value.value_type();
                if actual != *declared_type {
                    return Err(EventError::ValueTypeMismatch {
                        index: position,
                        declared: declared_type.clone(),
                        actual,
                    });
                }
                let value = match self.bind(declared_type, param_type)? {
                    Some(converter) => converter.convert(value.clone())?,
                    None => value.clone(),
                };
                Ok(ArgumentPlan::Constant(value))
            }
            ArgumentSource::CallSite { index } => {
                let source_type = self.event_params.get(*index).ok_or(EventError::ParamIndexOutOfRange {
                    index: position,
                    param: *index,
                    available: self.event_params.len(),
                })?;
                let converter = self.bind(source_type, param_type)?;
                Ok(ArgumentPlan::CallSite { position, index: *index, converter })
            }
        }
    }

    /// `None` when the value passes through unchanged.
    pub(crate) fn bind(&self, from: &ValueType, to: &ValueType) -> Result<Option<Arc<dyn Converter>>, EventError> {
        if from == to {
            return Ok(None);
        }
        if let Some(converter) = self.converters.resolve(from, to) {
            return Ok(Some(converter));
        }
        if self.types.is_assignable(from, to) {
            return Ok(None);
        }
        Err(EventError::NoConversion { from: from.clone(), to: to.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(argument: &PersistentArgument, event_params: &[ValueType]) -> Result<(), EventError> {
        argument.check(0, event_params, &ConverterRegistry::new(), &TypeHierarchy::new())
    }

    #[test]
    fn constants_convert_through_builtins() {
        let argument = PersistentArgument::constant_of(-128i8).targeting(ValueType::I32);
        let binder =
            Binder { converters: &ConverterRegistry::new(), types: &TypeHierarchy::new(), event_params: &[] };
        let plan = binder.plan(0, &argument, &ValueType::I32).expect("i8 widens to i32");
        assert_eq!(plan.produce(&[]).expect("constant"), Value::I32(-128));
    }

    #[test]
    fn call_site_index_must_exist_in_signature() {
        let argument = PersistentArgument::call_site(2, ValueType::I32);
        let err = check(&argument, &[ValueType::I32]).unwrap_err();
        assert!(matches!(err, EventError::ParamIndexOutOfRange { param: 2, available: 1, .. }), "got {err}");
    }

    #[test]
    fn mismatched_declared_type_is_reported() {
        let mut argument = PersistentArgument::constant_of(3u8);
        argument.source = ArgumentSource::Constant { declared_type: ValueType::U16, value: Value::U8(3) };
        argument.target_type = ValueType::U16;
        let err = check(&argument, &[]).unwrap_err();
        assert!(matches!(err, EventError::ValueTypeMismatch { .. }), "got {err}");
    }

    #[test]
    fn unrelated_types_have_no_conversion() {
        let argument = PersistentArgument::call_site(0, ValueType::String);
        let err = check(&argument, &[ValueType::F32]).unwrap_err();
        assert!(matches!(err, EventError::NoConversion { .. }), "got {err}");
        assert!(check(&PersistentArgument::call_site(0, ValueType::Any), &[ValueType::F32]).is_ok());
    }
}
