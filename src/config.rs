// zbxctl - CLI for Zabbix web scenario and trigger maintenance
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const ENV_URL: &str = "ZABBIX_URL";
pub const ENV_TOKEN: &str = "ZABBIX_TOKEN";
pub const ENV_USER: &str = "ZABBIX_USER";
pub const ENV_PASSWORD: &str = "ZABBIX_PASSWORD";

const LOCAL_FILE: &str = ".zbxctl.yaml";
const USER_FILE: &str = "config.yaml";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    User,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a writable config directory for the current user")]
    MissingConfigDir,
    #[error("Zabbix URL is required; set it with `zbxctl configure --url <url>` or ZABBIX_URL")]
    MissingUrl,
    #[error(
        "Zabbix credentials are required: configure either a token or a user and password (`zbxctl configure ...`)"
    )]
    MissingCredentials,
}

/// How the client authenticates against the API.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Pre-issued API token, sent as a bearer header.
    StaticToken(String),
    /// `user.login` exchange performed once when the client is built.
    LoginSession { user: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::StaticToken(_) => f.debug_tuple("StaticToken").field(&"*****").finish(),
            Credential::LoginSession { user, .. } => f
                .debug_struct("LoginSession")
                .field("user", user)
                .field("password", &"*****")
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct EffectiveConfig {
    pub base_url: String,
    pub credential: Credential,
}

/// Location of the settings file for `scope`. `ZBXCTL_CONFIG_DIR`, when set
/// and non-empty, replaces the platform config directory for the user scope.
pub fn config_path(scope: Scope, cwd: &Path) -> Result<PathBuf> {
    let path = match scope {
        Scope::Local => cwd.join(LOCAL_FILE),
        Scope::User => match env::var_os("ZBXCTL_CONFIG_DIR").filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir).join(USER_FILE),
            None => config_dir()
                .ok_or(ConfigError::MissingConfigDir)?
                .join("zbxctl")
                .join(USER_FILE),
        },
    };
    Ok(path)
}

/// User settings with the project-local file layered on top.
pub fn load(cwd: &Path) -> Result<Config> {
    Ok(merge(load_scope(Scope::User, cwd)?, load_scope(Scope::Local, cwd)?))
}

/// Settings stored in a single scope; a missing file yields empty settings.
pub fn load_scope(scope: Scope, cwd: &Path) -> Result<Config> {
    let path = config_path(scope, cwd)?;
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    serde_yaml::from_str::<Option<Config>>(&text)
        .map(Option::unwrap_or_default)
        .with_context(|| format!("parsing {}", path.display()))
}

pub fn save(scope: Scope, config: &Config, cwd: &Path) -> Result<PathBuf> {
    let path = config_path(scope, cwd)?;
    let dir = path.parent().unwrap_or(cwd);
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let yaml = serde_yaml::to_string(config).context("serializing settings")?;
    fs::write(&path, yaml).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Reads the `ZABBIX_*` variables; unset and empty variables are left out.
pub fn from_env() -> Config {
    let var = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
    Config {
        url: var(ENV_URL),
        token: var(ENV_TOKEN),
        user: var(ENV_USER),
        password: var(ENV_PASSWORD),
    }
}

/// Merges files, environment and command-line overrides (highest wins) and
/// picks the credential strategy. A token takes precedence over user/password.
pub fn resolve(cwd: &Path, overrides: Config) -> Result<EffectiveConfig> {
    let merged = merge(merge(load(cwd)?, from_env()), overrides);

    let base_url = non_empty(merged.url)
        .ok_or(ConfigError::MissingUrl)?
        .trim()
        .to_string();

    let credential = match (
        non_empty(merged.token),
        non_empty(merged.user),
        non_empty(merged.password),
    ) {
        (Some(token), _, _) => Credential::StaticToken(token.trim().to_string()),
        (None, Some(user), Some(password)) => Credential::LoginSession { user, password },
        _ => return Err(ConfigError::MissingCredentials.into()),
    };

    Ok(EffectiveConfig {
        base_url,
        credential,
    })
}

/// Copy of `config` with secrets replaced, for display.
pub fn masked(config: &Config) -> Config {
    let mut masked = config.clone();
    if masked.token.is_some() {
        masked.token = Some("*****".into());
    }
    if masked.password.is_some() {
        masked.password = Some("*****".into());
    }
    masked
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn merge(lower: Config, higher: Config) -> Config {
    Config {
        url: non_empty(higher.url).or(lower.url),
        token: non_empty(higher.token).or(lower.token),
        user: non_empty(higher.user).or(lower.user),
        password: non_empty(higher.password).or(lower.password),
    }
}
