pub mod argument;
pub mod asset;
pub mod cli;
pub mod config;
pub mod converter;
pub mod converter_registry;
pub mod error;
pub mod event;
pub mod listener;
pub mod logging;
pub mod method;
pub mod runtime;
pub mod types;
pub mod value;

pub use argument::{ArgumentSource, PersistentArgument};
pub use asset::EventAsset;
pub use config::{EventsConfig, ExecutionMode};
pub use converter::{Converter, CustomConverter};
pub use converter_registry::{ConverterKey, ConverterRegistry};
pub use error::{ErrorKind, EventError};
pub use event::{DynamicListenerId, Event, EventArgs, EventParam, EventSignature, PersistentCalls};
pub use listener::{CallState, Invocation, ListenerStatus, ListenerTarget, PersistentListener};
pub use method::{MethodId, MethodRegistry};
pub use runtime::{EventModule, EventRuntime, RuntimeBuilder};
pub use types::{TypeHierarchy, ValueType};
pub use value::{Decimal, EventValue, NamedValue, Value};
