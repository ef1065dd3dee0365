use bevy_ecs::prelude::World;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::{smallvec, SmallVec};
use std::fmt;

use crate::listener::{Invocation, PersistentListener};
use crate::runtime::EventRuntime;
use crate::types::ValueType;
use crate::value::{EventValue, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParam {
    pub name: String,
    pub value_type: ValueType,
}

/// Names and types of the values an event passes to its listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSignature {
    names: Vec<String>,
    types: Vec<ValueType>,
}

impl EventSignature {
    pub fn new(params: impl IntoIterator<Item = EventParam>) -> Self {
        let (names, types) = params.into_iter().map(|param| (param.name, param.value_type)).unzip();
        Self { names, types }
    }

    /// Signature with positional names (`arg0`, `arg1`, ...) unless `names` covers a position.
    pub fn from_types(types: Vec<ValueType>, names: &[String]) -> Self {
        let names =
            (0..types.len()).map(|i| names.get(i).cloned().unwrap_or_else(|| format!("arg{i}"))).collect();
        Self { names, types }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> &[ValueType] {
        &self.types
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn param_type(&self, index: usize) -> Option<&ValueType> {
        self.types.get(index)
    }

    pub fn param_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn params(&self) -> impl Iterator<Item = EventParam> + '_ {
        self.names
            .iter()
            .zip(&self.types)
            .map(|(name, value_type)| EventParam { name: name.clone(), value_type: value_type.clone() })
    }

    /// Parameters whose value can feed an argument of `argument_type`, as `(index, name)`.
    pub fn matching_params(&self, argument_type: &ValueType, runtime: &EventRuntime) -> Vec<(usize, &str)> {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, param_type)| runtime.can_bind(param_type, argument_type))
            .map(|(index, _)| (index, self.names[index].as_str()))
            .collect()
    }
}

/// Call-site argument tuples: `()`, `(A,)`, `(A, B)`, up to four values.
pub trait EventArgs: 'static {
    fn param_types() -> Vec<ValueType>;
    fn to_values(&self) -> SmallVec<[Value; 4]>;
}

impl EventArgs for () {
    fn param_types() -> Vec<ValueType> {
        Vec::new()
    }

    fn to_values(&self) -> SmallVec<[Value; 4]> {
        SmallVec::new()
    }
}

macro_rules! impl_event_args {
    ($($arg:ident $index:tt),*) => {
        impl<$($arg: EventValue + Clone),*> EventArgs for ($($arg,)*) {
            fn param_types() -> Vec<ValueType> {
                vec![$($arg::value_type()),*]
            }

            fn to_values(&self) -> SmallVec<[Value; 4]> {
                smallvec![$(self.$index.clone().into_value()),*]
            }
        }
    };
}

impl_event_args!(A0 0);
impl_event_args!(A0 0, A1 1);
impl_event_args!(A0 0, A1 1, A2 2);
impl_event_args!(A0 0, A1 1, A2 2, A3 3);

/// Ordered persistent listeners of one event. Serializes as a plain list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistentCalls {
    listeners: Vec<PersistentListener>,
}

impl PersistentCalls {
    pub fn new(listeners: Vec<PersistentListener>) -> Self {
        Self { listeners }
    }

    pub fn listeners(&self) -> &[PersistentListener] {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut [PersistentListener] {
        &mut self.listeners
    }

    pub fn push(&mut self, listener: PersistentListener) {
        self.listeners.push(listener);
    }

    pub fn remove(&mut self, index: usize) -> Option<PersistentListener> {
        (index < self.listeners.len()).then(|| self.listeners.remove(index))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn reinitialize_all(&mut self) {
        for listener in &mut self.listeners {
            listener.reinitialize();
        }
    }

    pub fn into_listeners(self) -> Vec<PersistentListener> {
        self.listeners
    }

    /// Calls every listener in order. A failing listener is logged and the rest still run.
    ///
    /// # Panics
    /// If `call_site` does not match `event_params` in length and types.
    pub fn invoke(
        &mut self,
        runtime: &EventRuntime,
        world: &mut World,
        event_params: &[ValueType],
        call_site: &[Value],
    ) {
        assert_eq!(
            call_site.len(),
            event_params.len(),
            "event invoked with {} values, its signature declares {}",
            call_site.len(),
            event_params.len()
        );
        for (value, param) in call_site.iter().zip(event_params) {
            let actual = value.value_type();
            assert!(
                runtime.is_assignable(&actual, param),
                "event parameter {param} invoked with a {actual} value"
            );
        }

        for (index, listener) in self.listeners.iter_mut().enumerate() {
            match listener.invoke(runtime, world, event_params, call_site) {
                Ok(Invocation::Fired) => {}
                Ok(outcome) => tracing::trace!(listener = index, ?outcome, "listener skipped"),
                Err(err) => tracing::warn!(
                    listener = index,
                    method = ?listener.method(),
                    "listener invocation failed: {err}"
                ),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DynamicListenerId(u64);

struct DynamicListener<Args> {
    id: DynamicListenerId,
    callback: Box<dyn FnMut(&Args)>,
}

/// An event with persistent listeners (data) and dynamic listeners (in-process callbacks).
///
/// Only the persistent listeners are serialized.
pub struct Event<Args: EventArgs = ()> {
    signature: EventSignature,
    persistent: PersistentCalls,
    dynamic: Vec<DynamicListener<Args>>,
    next_dynamic_id: u64,
}

impl<Args: EventArgs> Default for Event<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: EventArgs> Event<Args> {
    pub fn new() -> Self {
        Self::from_calls(PersistentCalls::default())
    }

    pub fn from_calls(persistent: PersistentCalls) -> Self {
        Self {
            signature: EventSignature::from_types(Args::param_types(), &[]),
            persistent,
            dynamic: Vec::new(),
            next_dynamic_id: 0,
        }
    }

    pub fn with_param_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.signature = EventSignature::from_types(Args::param_types(), &names);
        self
    }

    pub fn signature(&self) -> &EventSignature {
        &self.signature
    }

    pub fn persistent(&self) -> &PersistentCalls {
        &self.persistent
    }

    pub fn persistent_mut(&mut self) -> &mut PersistentCalls {
        &mut self.persistent
    }

    pub fn add_persistent(&mut self, listener: PersistentListener) {
        self.persistent.push(listener);
    }

    pub fn with_persistent(mut self, listener: PersistentListener) -> Self {
        self.add_persistent(listener);
        self
    }

    pub fn add_listener(&mut self, callback: impl FnMut(&Args) + 'static) -> DynamicListenerId {
        let id = DynamicListenerId(self.next_dynamic_id);
        self.next_dynamic_id += 1;
        self.dynamic.push(DynamicListener { id, callback: Box::new(callback) });
        id
    }

    pub fn remove_listener(&mut self, id: DynamicListenerId) -> bool {
        let before = self.dynamic.len();
        self.dynamic.retain(|listener| listener.id != id);
        self.dynamic.len() != before
    }

    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }

    /// Fires persistent listeners in stored order, then dynamic listeners in registration order.
    pub fn invoke(&mut self, runtime: &EventRuntime, world: &mut World, args: Args) {
        let values = args.to_values();
        self.persistent.invoke(runtime, world, self.signature.types(), &values);
        for listener in &mut self.dynamic {
            (listener.callback)(&args);
        }
    }
}

impl<Args: EventArgs> fmt::Debug for Event<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signature", &self.signature)
            .field("persistent", &self.persistent)
            .field("dynamic", &self.dynamic.len())
            .finish()
    }
}

impl<Args: EventArgs> Serialize for Event<Args> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.persistent.serialize(serializer)
    }
}

impl<'de, Args: EventArgs> Deserialize<'de> for Event<Args> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PersistentCalls::deserialize(deserializer).map(Self::from_calls)
    }
}
