use anyhow::Result;

use crate::config::{EventsConfig, ExecutionMode};
use crate::converter::CustomConverter;
use crate::converter_registry::ConverterRegistry;
use crate::method::MethodRegistry;
use crate::types::{TypeHierarchy, ValueType};

/// A unit of startup registration: converters, listener methods and named types.
pub trait EventModule {
    fn name(&self) -> &'static str;

    fn register(&self, builder: &mut RuntimeBuilder) -> Result<()>;
}

/// Collects registrations before the runtime is frozen.
pub struct RuntimeBuilder {
    converters: ConverterRegistry,
    methods: MethodRegistry,
    types: TypeHierarchy,
    mode: ExecutionMode,
    modules: Vec<&'static str>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            converters: ConverterRegistry::new(),
            methods: MethodRegistry::new(),
            types: TypeHierarchy::new(),
            mode: ExecutionMode::default(),
            modules: Vec::new(),
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        Self::new().with_mode(config.execution_mode)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Runs a module's registrations. A failing module is logged and skipped.
    pub fn with_module(mut self, module: &dyn EventModule) -> Self {
        self.add_module(module);
        self
    }

    pub fn add_module(&mut self, module: &dyn EventModule) -> bool {
        match module.register(self) {
            Ok(()) => {
                self.modules.push(module.name());
                true
            }
            Err(err) => {
                tracing::warn!(module = module.name(), "event module registration failed: {err:?}");
                false
            }
        }
    }

    /// Registers a custom converter; conflicts are logged and otherwise ignored.
    pub fn converter<C: CustomConverter>(&mut self, converter: C) -> &mut Self {
        let _ = self.converters.register_custom(converter);
        self
    }

    pub fn converters_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.converters
    }

    pub fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    pub fn types_mut(&mut self) -> &mut TypeHierarchy {
        &mut self.types
    }

    pub fn build(self) -> EventRuntime {
        tracing::debug!(
            converters = self.converters.len(),
            methods = self.methods.len(),
            modules = ?self.modules,
            mode = %self.mode,
            "event runtime ready"
        );
        EventRuntime {
            converters: self.converters,
            methods: self.methods,
            types: self.types,
            mode: self.mode,
            modules: self.modules,
        }
    }
}

/// Registries shared by every event invocation. Read-only once built.
pub struct EventRuntime {
    converters: ConverterRegistry,
    methods: MethodRegistry,
    types: TypeHierarchy,
    mode: ExecutionMode,
    modules: Vec<&'static str>,
}

impl EventRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn types(&self) -> &TypeHierarchy {
        &self.types
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn modules(&self) -> &[&'static str] {
        &self.modules
    }

    pub fn is_assignable(&self, from: &ValueType, to: &ValueType) -> bool {
        self.types.is_assignable(from, to)
    }

    /// Whether a value of type `from` can feed an argument of type `to`, directly or converted.
    pub fn can_bind(&self, from: &ValueType, to: &ValueType) -> bool {
        from == to || self.converters.contains(from, to) || self.types.is_assignable(from, to)
    }
}
