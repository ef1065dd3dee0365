use bevy_ecs::prelude::Entity;

use crate::converter_registry::ConverterKey;
use crate::method::MethodId;
use crate::types::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stale or inconsistent listener data. The listener stays inert until reinitialized.
    Configuration,
    /// Duplicate converter registration. The first registration is kept.
    Conflict,
    /// Failure while calling a resolved listener.
    Invocation,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("listener has no method assigned")]
    MissingMethod,

    #[error("unknown method {0}")]
    UnknownMethod(MethodId),

    #[error("method {method} needs a {expected} target")]
    TargetKindMismatch { method: MethodId, expected: &'static str },

    #[error("method {method} takes {expected} arguments, listener supplies {actual}")]
    ArgumentCount { method: MethodId, expected: usize, actual: usize },

    #[error("argument {index} targets {declared} but the method parameter is {expected}")]
    TargetTypeMismatch { index: usize, declared: ValueType, expected: ValueType },

    #[error("argument {index} stores a {actual} value but declares {declared}")]
    ValueTypeMismatch { index: usize, declared: ValueType, actual: ValueType },

    #[error("argument {index} reads call-site parameter {param} but the event declares {available}")]
    ParamIndexOutOfRange { index: usize, param: usize, available: usize },

    #[error("no conversion available from {from} to {to}")]
    NoConversion { from: ValueType, to: ValueType },

    #[error("converter for {key} already registered as {existing}, rejected {rejected}")]
    ConverterConflict { key: ConverterKey, existing: String, rejected: String },

    #[error("conversion from {from} to {to} failed: {reason}")]
    ConversionFailed { from: ValueType, to: ValueType, reason: String },

    #[error("argument {index} expected a {expected} value")]
    ArgumentValue { index: usize, expected: ValueType },

    #[error("entity {entity:?} has no {component} component")]
    MissingComponent { entity: Entity, component: String },

    #[error("method {method} failed: {source}")]
    Method {
        method: MethodId,
        #[source]
        source: anyhow::Error,
    },
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::ConverterConflict { .. } => ErrorKind::Conflict,
            EventError::ConversionFailed { .. }
            | EventError::ArgumentValue { .. }
            | EventError::MissingComponent { .. }
            | EventError::Method { .. } => ErrorKind::Invocation,
            _ => ErrorKind::Configuration,
        }
    }
}
