use bevy_ecs::prelude::{Component, Entity, World};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::EventError;
use crate::types::ValueType;
use crate::value::{EventValue, Value};

/// Arguments handed to a method, already converted to its parameter types.
pub type ArgList = SmallVec<[Value; 4]>;

type CallFn = dyn Fn(&mut World, Option<Entity>, ArgList) -> Result<(), EventError> + Send + Sync;

/// Declaring type, name and parameter signature of a listener method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId {
    pub declaring_type: String,
    pub name: String,
    #[serde(default)]
    pub params: Vec<ValueType>,
}

impl MethodId {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        params: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        Self { declaring_type: declaring_type.into(), name: name.into(), params: params.into_iter().collect() }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.declaring_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Called on a component of the listener's target entity.
    Component,
    /// Called without a target.
    Static,
}

impl MethodKind {
    pub fn label(self) -> &'static str {
        match self {
            MethodKind::Component => "component",
            MethodKind::Static => "static",
        }
    }
}

pub struct MethodEntry {
    id: MethodId,
    kind: MethodKind,
    call: Box<CallFn>,
}

impl MethodEntry {
    pub fn id(&self) -> &MethodId {
        &self.id
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn params(&self) -> &[ValueType] {
        &self.id.params
    }

    pub(crate) fn call(&self, world: &mut World, target: Option<Entity>, args: ArgList) -> Result<(), EventError> {
        (self.call)(world, target, args)
    }
}

/// What a listener method may return.
pub trait MethodOutput {
    fn into_result(self) -> anyhow::Result<()>;
}

impl MethodOutput for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> MethodOutput for Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// Functions callable on a component `T`: `Fn(&mut T, A0, A1, ...)`.
pub trait IntoMethod<T, Marker>: Send + Sync + 'static {
    fn param_types() -> Vec<ValueType>;
    fn into_call(self, id: MethodId) -> Box<CallFn>;
}

/// Functions callable without a target: `Fn(A0, A1, ...)`.
pub trait IntoStaticMethod<Marker>: Send + Sync + 'static {
    fn param_types() -> Vec<ValueType>;
    fn into_call(self, id: MethodId) -> Box<CallFn>;
}

fn take_arg<A: EventValue>(args: &mut impl Iterator<Item = Value>, index: usize) -> Result<A, EventError> {
    args.next()
        .and_then(A::from_value)
        .ok_or_else(|| EventError::ArgumentValue { index, expected: A::value_type() })
}

macro_rules! impl_method_arity {
    ($($arg:ident $index:tt),*) => {
        impl<T, F, R, $($arg,)*> IntoMethod<T, ($($arg,)*)> for F
        where
            T: Component,
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            R: MethodOutput,
            $($arg: EventValue,)*
        {
            fn param_types() -> Vec<ValueType> {
                vec![$($arg::value_type()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_call(self, id: MethodId) -> Box<CallFn> {
                Box::new(move |world: &mut World, target: Option<Entity>, args: ArgList| {
                    let Some(entity) = target else {
                        return Err(EventError::TargetKindMismatch { method: id.clone(), expected: "component" });
                    };
                    let mut args = args.into_iter();
                    $(let $arg = take_arg::<$arg>(&mut args, $index)?;)*
                    let mut component = world.get_mut::<T>(entity).ok_or_else(|| {
                        EventError::MissingComponent { entity, component: id.declaring_type.clone() }
                    })?;
                    (self)(&mut *component, $($arg),*)
                        .into_result()
                        .map_err(|source| EventError::Method { method: id.clone(), source })
                })
            }
        }

        impl<F, R, $($arg,)*> IntoStaticMethod<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: MethodOutput,
            $($arg: EventValue,)*
        {
            fn param_types() -> Vec<ValueType> {
                vec![$($arg::value_type()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_call(self, id: MethodId) -> Box<CallFn> {
                Box::new(move |_world: &mut World, _target: Option<Entity>, args: ArgList| {
                    let mut args = args.into_iter();
                    $(let $arg = take_arg::<$arg>(&mut args, $index)?;)*
                    (self)($($arg),*)
                        .into_result()
                        .map_err(|source| EventError::Method { method: id.clone(), source })
                })
            }
        }
    };
}

impl_method_arity!();
impl_method_arity!(A0 0);
impl_method_arity!(A0 0, A1 1);
impl_method_arity!(A0 0, A1 1, A2 2);
impl_method_arity!(A0 0, A1 1, A2 2, A3 3);

/// Methods that persistent listeners can name, keyed by [`MethodId`].
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<MethodId, Arc<MethodEntry>>,
    by_type: BTreeMap<String, Vec<MethodId>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component<T: Component>(&mut self, type_name: impl Into<String>) -> ComponentMethods<'_, T> {
        ComponentMethods { registry: self, type_name: type_name.into(), _component: PhantomData }
    }

    pub fn static_type(&mut self, type_name: impl Into<String>) -> StaticMethods<'_> {
        StaticMethods { registry: self, type_name: type_name.into() }
    }

    pub fn register_component_method<T, M, F>(&mut self, type_name: &str, name: &str, method: F) -> MethodId
    where
        T: Component,
        F: IntoMethod<T, M>,
    {
        let id = MethodId::new(type_name, name, F::param_types());
        let call = method.into_call(id.clone());
        self.insert(MethodEntry { id: id.clone(), kind: MethodKind::Component, call });
        id
    }

    pub fn register_static_method<M, F>(&mut self, type_name: &str, name: &str, method: F) -> MethodId
    where
        F: IntoStaticMethod<M>,
    {
        let id = MethodId::new(type_name, name, F::param_types());
        let call = method.into_call(id.clone());
        self.insert(MethodEntry { id: id.clone(), kind: MethodKind::Static, call });
        id
    }

    fn insert(&mut self, entry: MethodEntry) {
        if self.methods.contains_key(&entry.id) {
            tracing::warn!(method = %entry.id, "method registered twice, keeping the first registration");
            return;
        }
        self.by_type.entry(entry.id.declaring_type.clone()).or_default().push(entry.id.clone());
        self.methods.insert(entry.id.clone(), Arc::new(entry));
    }

    pub fn get(&self, id: &MethodId) -> Option<Arc<MethodEntry>> {
        self.methods.get(id).cloned()
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.methods.contains_key(id)
    }

    /// Methods declared by `type_name`, in registration order.
    pub fn methods_of(&self, type_name: &str) -> &[MethodId] {
        self.by_type.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn declaring_types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

pub struct ComponentMethods<'a, T> {
    registry: &'a mut MethodRegistry,
    type_name: String,
    _component: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentMethods<'_, T> {
    pub fn method<M, F: IntoMethod<T, M>>(self, name: &str, method: F) -> Self {
        self.registry.register_component_method::<T, M, F>(&self.type_name, name, method);
        self
    }
}

pub struct StaticMethods<'a> {
    registry: &'a mut MethodRegistry,
    type_name: String,
}

impl StaticMethods<'_> {
    pub fn function<M, F: IntoStaticMethod<M>>(self, name: &str, function: F) -> Self {
        self.registry.register_static_method::<M, F>(&self.type_name, name, function);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[derive(Component, Default)]
    struct Lamp {
        brightness: f32,
        toggles: u32,
    }

    #[test]
    fn component_methods_receive_typed_arguments() {
        let mut registry = MethodRegistry::new();
        registry
            .component::<Lamp>("Lamp")
            .method("toggle", |lamp: &mut Lamp| lamp.toggles += 1)
            .method("set_brightness", |lamp: &mut Lamp, value: f32| lamp.brightness = value);

        let id = MethodId::new("Lamp", "set_brightness", [ValueType::F32]);
        let entry = registry.get(&id).expect("set_brightness registered");
        assert_eq!(entry.kind(), MethodKind::Component);
        assert_eq!(registry.methods_of("Lamp").len(), 2);

        let mut world = World::new();
        let lamp = world.spawn(Lamp::default()).id();
        entry.call(&mut world, Some(lamp), smallvec![Value::F32(0.5)]).expect("call succeeds");
        assert_eq!(world.get::<Lamp>(lamp).expect("lamp").brightness, 0.5);

        let err = entry.call(&mut world, Some(lamp), smallvec![Value::I32(1)]).unwrap_err();
        assert!(matches!(err, EventError::ArgumentValue { index: 0, .. }), "unexpected error {err}");
    }

    #[test]
    fn method_errors_carry_the_method_id() {
        let mut registry = MethodRegistry::new();
        let id = registry.register_static_method("Checks", "fail", |code: i32| -> anyhow::Result<()> {
            anyhow::bail!("code {code}")
        });
        let entry = registry.get(&id).expect("fail registered");
        let mut world = World::new();
        let err = entry.call(&mut world, None, smallvec![Value::I32(7)]).unwrap_err();
        assert!(err.to_string().contains("Checks::fail(i32)"), "got {err}");
        assert!(err.to_string().contains("code 7"), "got {err}");
    }
}
