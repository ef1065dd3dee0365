use crate::config::{EventsConfigOverrides, ExecutionMode};
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;

/// Global `--flag value` options; everything after the first non-flag argument is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    mode: Option<ExecutionMode>,
    log: Option<String>,
    config: Option<PathBuf>,
}

impl CliOverrides {
    /// Parses leading flags and returns the remaining positional arguments.
    pub fn parse<I, S>(args: I) -> Result<(Self, Vec<String>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut rest = Vec::new();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw) = iter.next() {
            let flag = raw.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                rest.push(flag.to_string());
                rest.extend(iter.by_ref().map(|arg| arg.as_ref().to_string()));
                break;
            };
            if key == "help" {
                rest.push(flag.to_string());
                continue;
            }
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "mode" => {
                    overrides.mode =
                        Some(value.parse::<ExecutionMode>().with_context(|| format!("Invalid mode '{value}'"))?);
                }
                "log" => overrides.log = Some(value),
                "config" => overrides.config = Some(PathBuf::from(value)),
                _ => bail!("Unknown flag '{flag}'. Supported flags: --mode, --log, --config."),
            }
        }
        Ok((overrides, rest))
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }

    pub fn into_config_overrides(self) -> EventsConfigOverrides {
        EventsConfigOverrides { execution_mode: self.mode, log_filter: self.log }
    }
}
