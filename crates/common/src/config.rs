//! Confirmation core configuration.
//!
//! Values are layered the usual way: built-in defaults, then an optional `confirm.toml`, then
//! `CONFIRM_` prefixed environment variables (nested keys separated by `__`, e.g.
//! `CONFIRM_TEZOS__STEP_PERCENT=15`).

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::Path, time::Duration};

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "confirm.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "CONFIRM_";

/// Gas limit of a plain value transfer on EVM chains.
pub const DEFAULT_TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Step used to derive the slow and fast fee tiers from a baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStepConfig {
    /// Step size as a percentage of the baseline.
    pub step_percent: u64,
    /// Lower bound of the step, in atomic units, so tiny baselines still get distinct tiers.
    pub min_step: u64,
}

/// Configuration of the estimation pipelines and the form controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmConfig {
    /// Quiet period after the last edit of a field before a recomputation is triggered.
    pub debounce_ms: u64,
    /// Tier step for Tezos fees, in mutez.
    pub tezos: FeeStepConfig,
    /// Tier step for EVM gas prices, in wei.
    pub evm: FeeStepConfig,
    /// Gas limit used for plain value transfers when nothing else is known.
    pub transfer_gas_limit: u64,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            tezos: FeeStepConfig { step_percent: 10, min_step: 1 },
            evm: FeeStepConfig { step_percent: 10, min_step: 1 },
            transfer_gas_limit: DEFAULT_TRANSFER_GAS_LIMIT,
        }
    }
}

impl ConfirmConfig {
    /// Returns the debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Loads the configuration from the current directory and the environment.
    pub fn load() -> Result<Self, ExtractConfigError> {
        Self::load_with_root(".")
    }

    /// Loads the configuration from `root/confirm.toml` and the environment.
    pub fn load_with_root(root: impl AsRef<Path>) -> Result<Self, ExtractConfigError> {
        Self::from_provider(Self::figment_with_root(root))
    }

    /// Extracts a configuration from any figment provider.
    pub fn from_provider<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        let config: Self = Figment::from(provider).extract().map_err(ExtractConfigError::new)?;
        trace!(target: "confirm::config", ?config, "loaded config");
        Ok(config)
    }

    /// Returns the default figment: defaults, then `confirm.toml`, then the environment.
    pub fn figment_with_root(root: impl AsRef<Path>) -> Figment {
        Figment::from(Self::default())
            .merge(Toml::file(root.as_ref().join(CONFIG_FILE_NAME)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

impl Provider for ConfirmConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("Confirm Config")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}

/// Represents a failed attempt to extract [`ConfirmConfig`] from a [`Figment`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractConfigError {
    error: figment::Error,
}

impl ExtractConfigError {
    /// Wraps the figment error.
    pub fn new(error: figment::Error) -> Self {
        Self { error }
    }
}

impl fmt::Display for ExtractConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut unique = HashSet::with_capacity(self.error.count());
        writeln!(f, "failed to extract confirm config:")?;
        for err in self.error.clone() {
            let line = if err.path.is_empty() {
                err.to_string()
            } else {
                format!("{err} for setting `{}`", err.path.join("."))
            };
            if unique.insert(line.clone()) {
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ExtractConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}
