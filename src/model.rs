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

//! Request and result shapes for the Zabbix API methods zbxctl calls.
//!
//! Zabbix returns ids and numbers as strings; the read side is lenient about
//! that and about fields missing from a narrowed `output`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Seconds each imported step may take.
pub const IMPORT_STEP_TIMEOUT: &str = "30s";
/// Retry count applied to every imported scenario.
pub const IMPORT_RETRIES: u32 = 5;
pub const DEFAULT_DELAY: &str = "60s";
pub const DEFAULT_AGENT: &str = "Mozilla/5.0";
/// Polling interval forced by a timeout update.
pub const UPDATE_DELAY: &str = "1m";
/// Severity of generated triggers ("High").
pub const TRIGGER_SEVERITY: u8 = 4;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostRef {
    pub hostid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebScenario {
    #[serde(default)]
    pub httptestid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub delay: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub httpstepid: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "step_number"
    )]
    pub no: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_codes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub required: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,
}

/// `httptest.create` parameters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewWebScenario {
    pub name: String,
    pub hostid: String,
    pub delay: String,
    pub retries: u32,
    pub agent: String,
    pub steps: Vec<Step>,
}

/// `httptest.update` parameters for a timeout change.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScenarioTimeoutUpdate {
    pub httptestid: String,
    pub steps: Vec<Step>,
    pub delay: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Trigger {
    pub triggerid: String,
    #[serde(default)]
    pub description: String,
}

/// `trigger.create` parameters. `priority` is forwarded as the text found in
/// the CSV file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewTrigger {
    pub description: String,
    pub expression: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ManualCloseUpdate {
    pub triggerid: String,
    pub manual_close: u8,
}

fn step_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid step number `{text}`"))),
    }
}
