use anyhow::{bail, Context, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::converter_registry::ConverterRegistry;
use crate::error::EventError;
use crate::event::{Event, EventArgs, EventParam, EventSignature, PersistentCalls};
use crate::listener::PersistentListener;
use crate::types::{TypeHierarchy, ValueType};

pub const BINARY_EXTENSION: &str = "kevents";

/// A named event's declared parameters and persistent listeners, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAsset {
    pub name: String,
    #[serde(default)]
    pub params: Vec<EventParam>,
    #[serde(default)]
    pub listeners: Vec<PersistentListener>,
}

#[derive(Debug)]
pub struct ListenerIssue {
    pub listener: usize,
    pub error: EventError,
}

impl EventAsset {
    pub fn from_event<Args: EventArgs>(name: impl Into<String>, event: &Event<Args>) -> Self {
        Self {
            name: name.into(),
            params: event.signature().params().collect(),
            listeners: event.persistent().listeners().to_vec(),
        }
    }

    pub fn signature(&self) -> EventSignature {
        EventSignature::new(self.params.iter().cloned())
    }

    pub fn param_types(&self) -> Vec<ValueType> {
        self.params.iter().map(|param| param.value_type.clone()).collect()
    }

    pub fn into_event<Args: EventArgs>(self) -> Result<Event<Args>> {
        let expected = Args::param_types();
        let declared = self.param_types();
        if expected != declared {
            bail!(
                "event '{}' declares parameters ({}) but was loaded as ({})",
                self.name,
                join_types(&declared),
                join_types(&expected)
            );
        }
        let names: Vec<String> = self.params.into_iter().map(|param| param.name).collect();
        Ok(Event::from_calls(PersistentCalls::new(self.listeners)).with_param_names(names))
    }

    /// Configuration problems of every listener that can be found without a method registry.
    ///
    /// Bindings through named subtypes or custom converters only check out when `types` and
    /// `converters` are the ones the host runtime registers.
    pub fn validate(&self, converters: &ConverterRegistry, types: &TypeHierarchy) -> Vec<ListenerIssue> {
        let params = self.param_types();
        self.listeners
            .iter()
            .enumerate()
            .flat_map(|(listener, entry)| {
                entry
                    .check_arguments(&params, converters, types)
                    .into_iter()
                    .map(move |error| ListenerIssue { listener, error })
            })
            .collect()
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading event asset {}", path.display()))?;
        if is_binary(path) {
            bincode_options()
                .deserialize(&bytes)
                .with_context(|| format!("Decoding binary event asset {}", path.display()))
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("Parsing event asset {}", path.display()))
        }
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating event asset directory {}", parent.display()))?;
        }
        let bytes = if is_binary(path) {
            bincode_options().serialize(self).context("Encoding binary event asset")?
        } else {
            serde_json::to_vec_pretty(self).context("Encoding event asset")?
        };
        fs::write(path, bytes).with_context(|| format!("Writing event asset {}", path.display()))?;
        Ok(())
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case(BINARY_EXTENSION))
}

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

fn join_types(types: &[ValueType]) -> String {
    types.iter().map(ValueType::to_string).collect::<Vec<_>>().join(", ")
}
