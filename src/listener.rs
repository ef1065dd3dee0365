use bevy_ecs::prelude::{Entity, World};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::argument::{ArgumentPlan, Binder, PersistentArgument};
use crate::config::ExecutionMode;
use crate::converter_registry::ConverterRegistry;
use crate::error::EventError;
use crate::method::{ArgList, MethodEntry, MethodId, MethodKind};
use crate::runtime::EventRuntime;
use crate::types::{TypeHierarchy, ValueType};
use crate::value::{entity_bits, Value};

/// When a persistent listener is allowed to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    EditorAndRuntime,
    #[default]
    RuntimeOnly,
    Off,
}

impl CallState {
    pub const ALL: [CallState; 3] = [CallState::EditorAndRuntime, CallState::RuntimeOnly, CallState::Off];

    pub fn allows(self, mode: ExecutionMode) -> bool {
        match self {
            CallState::EditorAndRuntime => true,
            CallState::RuntimeOnly => mode == ExecutionMode::Runtime,
            CallState::Off => false,
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            CallState::EditorAndRuntime => "E|R",
            CallState::RuntimeOnly => "R",
            CallState::Off => "Off",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CallState::EditorAndRuntime => "Editor and Runtime",
            CallState::RuntimeOnly => "Runtime Only",
            CallState::Off => "Off",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerTarget {
    Component {
        #[serde(with = "entity_bits")]
        entity: Entity,
    },
    Static,
}

impl fmt::Display for ListenerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerTarget::Component { entity } => write!(f, "entity#{}", entity.index()),
            ListenerTarget::Static => f.write_str("static"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Uninitialized,
    Ready,
    Inert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Fired,
    /// The call state excludes the runtime's execution mode.
    Disabled,
    /// Resolution failed; the listener waits for `reinitialize`.
    Inert,
}

struct ResolvedCall {
    method: Arc<MethodEntry>,
    target: Option<Entity>,
    plans: Vec<ArgumentPlan>,
}

#[derive(Default)]
enum ListenerState {
    #[default]
    Uninitialized,
    Ready(ResolvedCall),
    Inert(EventError),
}

impl fmt::Debug for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerState::Uninitialized => f.write_str("Uninitialized"),
            ListenerState::Ready(call) => write!(f, "Ready({})", call.method.id()),
            ListenerState::Inert(err) => write!(f, "Inert({err})"),
        }
    }
}

/// A serialized method binding fired by an event.
///
/// Resolution (method lookup, argument binding, converter selection) happens on the first
/// invocation and is cached. Every setter that changes the target, the method or the arguments
/// drops the cache; code that edits listener data any other way must call [`reinitialize`].
///
/// [`reinitialize`]: PersistentListener::reinitialize
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistentListener {
    #[serde(default)]
    call_state: CallState,
    target: ListenerTarget,
    #[serde(default)]
    method: Option<MethodId>,
    #[serde(default)]
    arguments: Vec<PersistentArgument>,
    #[serde(skip)]
    state: ListenerState,
}

impl Clone for PersistentListener {
    fn clone(&self) -> Self {
        Self {
            call_state: self.call_state,
            target: self.target,
            method: self.method.clone(),
            arguments: self.arguments.clone(),
            state: ListenerState::Uninitialized,
        }
    }
}

impl PersistentListener {
    pub fn new(target: ListenerTarget, method: Option<MethodId>) -> Self {
        Self {
            call_state: CallState::default(),
            target,
            method,
            arguments: Vec::new(),
            state: ListenerState::Uninitialized,
        }
    }

    pub fn component(entity: Entity, method: MethodId) -> Self {
        Self::new(ListenerTarget::Component { entity }, Some(method))
    }

    pub fn static_call(method: MethodId) -> Self {
        Self::new(ListenerTarget::Static, Some(method))
    }

    pub fn with_argument(mut self, argument: PersistentArgument) -> Self {
        self.push_argument(argument);
        self
    }

    pub fn with_call_state(mut self, call_state: CallState) -> Self {
        self.call_state = call_state;
        self
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn target(&self) -> ListenerTarget {
        self.target
    }

    pub fn method(&self) -> Option<&MethodId> {
        self.method.as_ref()
    }

    pub fn arguments(&self) -> &[PersistentArgument] {
        &self.arguments
    }

    /// Call state is read on every invocation, so changing it keeps the cache.
    pub fn set_call_state(&mut self, call_state: CallState) {
        self.call_state = call_state;
    }

    pub fn set_target(&mut self, target: ListenerTarget) {
        self.target = target;
        self.reinitialize();
    }

    pub fn set_method(&mut self, method: Option<MethodId>) {
        self.method = method;
        self.reinitialize();
    }

    pub fn set_arguments(&mut self, arguments: Vec<PersistentArgument>) {
        self.arguments = arguments;
        self.reinitialize();
    }

    pub fn push_argument(&mut self, argument: PersistentArgument) {
        self.arguments.push(argument);
        self.reinitialize();
    }

    pub fn arguments_mut(&mut self) -> &mut Vec<PersistentArgument> {
        self.reinitialize();
        &mut self.arguments
    }

    /// Drops the resolution cache; the next invocation resolves again.
    pub fn reinitialize(&mut self) {
        if !matches!(self.state, ListenerState::Uninitialized) {
            tracing::debug!(method = ?self.method, "listener reinitialized");
        }
        self.state = ListenerState::Uninitialized;
    }

    pub fn status(&self) -> ListenerStatus {
        match self.state {
            ListenerState::Uninitialized => ListenerStatus::Uninitialized,
            ListenerState::Ready(_) => ListenerStatus::Ready,
            ListenerState::Inert(_) => ListenerStatus::Inert,
        }
    }

    /// Why the last resolution failed, while the listener is inert.
    pub fn inert_reason(&self) -> Option<&EventError> {
        match &self.state {
            ListenerState::Inert(err) => Some(err),
            _ => None,
        }
    }

    /// Resolves (if needed) and calls the listener's method.
    ///
    /// Resolution failures are logged once and leave the listener inert; the returned error is
    /// reserved for failures of this particular call.
    pub fn invoke(
        &mut self,
        runtime: &EventRuntime,
        world: &mut World,
        event_params: &[ValueType],
        call_site: &[Value],
    ) -> Result<Invocation, EventError> {
        if let ListenerState::Uninitialized = self.state {
            self.state = match self.resolve(runtime, event_params) {
                Ok(call) => {
                    tracing::debug!(method = %call.method.id(), "listener resolved");
                    ListenerState::Ready(call)
                }
                Err(err) => {
                    tracing::warn!(
                        method = ?self.method,
                        target = %self.target,
                        "listener resolution failed: {err}"
                    );
                    ListenerState::Inert(err)
                }
            };
        }
        let call = match &self.state {
            ListenerState::Ready(call) => call,
            _ => return Ok(Invocation::Inert),
        };
        if !self.call_state.allows(runtime.mode()) {
            return Ok(Invocation::Disabled);
        }
        let args = call.plans.iter().map(|plan| plan.produce(call_site)).collect::<Result<ArgList, _>>()?;
        call.method.call(world, call.target, args)?;
        Ok(Invocation::Fired)
    }

    fn resolve(&self, runtime: &EventRuntime, event_params: &[ValueType]) -> Result<ResolvedCall, EventError> {
        let id = self.method.as_ref().ok_or(EventError::MissingMethod)?;
        let method = runtime.methods().get(id).ok_or_else(|| EventError::UnknownMethod(id.clone()))?;
        let target = match (method.kind(), self.target) {
            (MethodKind::Component, ListenerTarget::Component { entity }) => Some(entity),
            (MethodKind::Static, ListenerTarget::Static) => None,
            (kind, _) => {
                return Err(EventError::TargetKindMismatch { method: id.clone(), expected: kind.label() })
            }
        };
        if self.arguments.len() != method.params().len() {
            return Err(EventError::ArgumentCount {
                method: id.clone(),
                expected: method.params().len(),
                actual: self.arguments.len(),
            });
        }
        let binder = Binder { converters: runtime.converters(), types: runtime.types(), event_params };
        let plans = self
            .arguments
            .iter()
            .zip(method.params())
            .enumerate()
            .map(|(position, (argument, param))| binder.plan(position, argument, param))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ResolvedCall { method, target, plans })
    }

    /// Configuration problems that can be found without a method registry.
    pub fn check_arguments(
        &self,
        event_params: &[ValueType],
        converters: &ConverterRegistry,
        types: &TypeHierarchy,
    ) -> Vec<EventError> {
        let mut problems = Vec::new();
        if self.method.is_none() {
            problems.push(EventError::MissingMethod);
        }
        if let Some(method) = &self.method {
            if method.params.len() != self.arguments.len() {
                problems.push(EventError::ArgumentCount {
                    method: method.clone(),
                    expected: method.params.len(),
                    actual: self.arguments.len(),
                });
            }
            for (position, (argument, param)) in self.arguments.iter().zip(&method.params).enumerate() {
                if argument.target_type != *param {
                    problems.push(EventError::TargetTypeMismatch {
                        index: position,
                        declared: argument.target_type.clone(),
                        expected: param.clone(),
                    });
                }
            }
        }
        for (position, argument) in self.arguments.iter().enumerate() {
            if let Err(err) = argument.check(position, event_params, converters, types) {
                problems.push(err);
            }
        }
        problems
    }
}
