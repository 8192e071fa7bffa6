// Copyright 2024-2026 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Renders a config value with secrets redacted, the way every Golem
/// service config is logged on startup. Unlike `Debug`, this is meant to be
/// safe to ship to shared logs.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;

    fn to_safe_string_indented(&self) -> String {
        self.to_safe_string()
            .lines()
            .map(|line| format!("  {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Loads a `T` from a TOML file, overridable by environment variables using
/// the double-underscore nesting convention (`WORKSPACE_INFO__SECTION__FIELD`).
pub struct ConfigLoader<T> {
    config_file_name: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: for<'de> Deserialize<'de> + Default + Serialize,
{
    pub fn new(config_file_name: &Path) -> Self {
        Self {
            config_file_name: config_file_name.to_path_buf(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn load(&self) -> figment::Result<T> {
        Figment::from(figment::providers::Serialized::defaults(T::default()))
            .merge(Toml::file(&self.config_file_name))
            .merge(Env::prefixed("WORKSPACE_INFO__").split("__"))
            .extract()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkspaceManagerConfig {
    pub address: String,
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,
}

impl Default for WorkspaceManagerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            reconnect_interval: Duration::from_secs(2),
        }
    }
}

impl SafeDisplay for WorkspaceManagerConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "address: {}", self.address);
        let _ = writeln!(
            &mut result,
            "reconnect interval: {:?}",
            self.reconnect_interval
        );
        result
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
        }
    }
}

impl SafeDisplay for RefreshConfig {
    fn to_safe_string(&self) -> String {
        format!("interval: {:?}\n", self.interval)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkspaceInfoConfig {
    pub workspace_manager: WorkspaceManagerConfig,
    pub refresh: RefreshConfig,
}

impl WorkspaceInfoConfig {
    /// Validates the configuration, surfacing configuration errors fatally
    /// at construction time rather than inside the stream consumer
    /// (spec.md 7, "Configuration errors").
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_manager.address.trim().is_empty() {
            return Err(ConfigError::MissingWorkspaceManagerAddress);
        }
        Ok(())
    }
}

impl SafeDisplay for WorkspaceInfoConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "workspace manager:");
        let _ = writeln!(
            &mut result,
            "{}",
            self.workspace_manager.to_safe_string_indented()
        );
        let _ = writeln!(&mut result, "refresh:");
        let _ = writeln!(&mut result, "{}", self.refresh.to_safe_string_indented());
        result
    }
}

pub fn make_config_loader() -> ConfigLoader<WorkspaceInfoConfig> {
    ConfigLoader::new(&PathBuf::from("config/workspace-info.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_r::test;

    #[test]
    fn validate_rejects_empty_address() {
        let config = WorkspaceInfoConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingWorkspaceManagerAddress)
        ));
    }

    #[test]
    fn validate_accepts_configured_address() {
        let mut config = WorkspaceInfoConfig::default();
        config.workspace_manager.address = "workspace-manager:7200".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn safe_display_includes_address() {
        let mut config = WorkspaceInfoConfig::default();
        config.workspace_manager.address = "workspace-manager:7200".to_string();
        assert!(config
            .to_safe_string()
            .contains("workspace-manager:7200"));
    }
}
