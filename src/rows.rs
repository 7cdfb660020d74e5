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

//! Flat CSV rows for scenario and trigger files.
//!
//! The scenario file keeps every step in one `step_details` cell. The legacy
//! encoding, `name (url - status_codes - required)` joined with ` | `, does
//! not escape its delimiters and only the name and URL survive a re-import.
//! The JSON encoding stores the same cell as an array of step objects.

use crate::model::{IMPORT_STEP_TIMEOUT, Step, TRIGGER_SEVERITY, WebScenario};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const STEP_SEPARATOR: &str = " | ";
const NAME_SEPARATOR: &str = " (";
const FIELD_SEPARATOR: &str = " - ";
const UNKNOWN_URL: &str = "Unknown URL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StepEncoding {
    #[default]
    Legacy,
    Json,
}

#[derive(Debug, Error)]
pub enum StepFormatError {
    #[error("step `{0}` has no ` (` between its name and URL")]
    MissingUrl(String),
    #[error("step details are not a JSON step list")]
    Json(#[from] serde_json::Error),
}

/// One line of the web scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioRow {
    #[serde(default)]
    pub httptestid: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub delay: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub steps: Option<usize>,
    #[serde(default)]
    pub step_details: String,
}

/// One line of the trigger file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRow {
    pub name: String,
    pub problem_expression: String,
    #[serde(default)]
    pub recovery_expression: Option<String>,
    #[serde(default)]
    pub severity: String,
}

#[derive(Serialize, Deserialize)]
struct JsonStep {
    name: String,
    url: String,
    #[serde(default)]
    status_codes: String,
    #[serde(default)]
    required: String,
}

impl ScenarioRow {
    pub fn from_scenario(
        scenario: &WebScenario,
        encoding: StepEncoding,
    ) -> Result<Self, StepFormatError> {
        Ok(Self {
            httptestid: Some(scenario.httptestid.clone()),
            name: scenario.name.clone(),
            delay: Some(scenario.delay.clone()),
            agent: Some(scenario.agent.clone()),
            http_proxy: Some(scenario.http_proxy.clone()),
            steps: Some(scenario.steps.len()),
            step_details: encode_steps(&scenario.steps, encoding)?,
        })
    }
}

impl TriggerRow {
    /// Builds the "scenario is failing" trigger for `scenario` on `host`.
    pub fn for_scenario(host: &str, scenario: &WebScenario) -> Self {
        let url = scenario
            .steps
            .first()
            .map(|step| step.url.as_str())
            .unwrap_or(UNKNOWN_URL);
        let name = &scenario.name;
        Self {
            name: format!("{name} ({url})"),
            problem_expression: format!(
                "(last(/{host}/web.test.error[{name}],#1)<>\"\") and last(/{host}/web.test.fail[{name}],#1)>=1"
            ),
            recovery_expression: None,
            severity: TRIGGER_SEVERITY.to_string(),
        }
    }
}

pub fn encode_steps(steps: &[Step], encoding: StepEncoding) -> Result<String, StepFormatError> {
    match encoding {
        StepEncoding::Legacy => Ok(steps
            .iter()
            .map(|s| format!("{} ({} - {} - {})", s.name, s.url, s.status_codes, s.required))
            .collect::<Vec<_>>()
            .join(STEP_SEPARATOR)),
        StepEncoding::Json => {
            let steps: Vec<JsonStep> = steps
                .iter()
                .map(|s| JsonStep {
                    name: s.name.clone(),
                    url: s.url.clone(),
                    status_codes: s.status_codes.clone(),
                    required: s.required.clone(),
                })
                .collect();
            Ok(serde_json::to_string(&steps)?)
        }
    }
}

/// Rebuilds steps for `httptest.create`: numbered 1..n in cell order, each
/// with the import timeout.
pub fn decode_steps(cell: &str, encoding: StepEncoding) -> Result<Vec<Step>, StepFormatError> {
    let parsed: Vec<JsonStep> = match encoding {
        StepEncoding::Legacy => cell
            .split(STEP_SEPARATOR)
            .filter(|token| !token.is_empty())
            .map(parse_legacy_step)
            .collect::<Result<_, _>>()?,
        StepEncoding::Json if cell.trim().is_empty() => Vec::new(),
        StepEncoding::Json => serde_json::from_str(cell)?,
    };

    Ok(parsed
        .into_iter()
        .zip(1..)
        .map(|(step, no)| Step {
            httpstepid: None,
            no: Some(no),
            name: step.name,
            url: step.url,
            status_codes: step.status_codes,
            required: step.required,
            timeout: IMPORT_STEP_TIMEOUT.to_string(),
        })
        .collect())
}

fn parse_legacy_step(token: &str) -> Result<JsonStep, StepFormatError> {
    let (name, rest) = token
        .split_once(NAME_SEPARATOR)
        .ok_or_else(|| StepFormatError::MissingUrl(token.to_string()))?;
    let url = rest.split(FIELD_SEPARATOR).next().unwrap_or_default();
    Ok(JsonStep {
        name: name.to_string(),
        url: url.to_string(),
        status_codes: String::new(),
        required: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_steps() -> Vec<Step> {
        ["A", "B"]
            .iter()
            .map(|name| Step {
                name: (*name).into(),
                url: format!("http://x/{}", name.to_lowercase()),
                status_codes: "200".into(),
                required: "OK".into(),
                ..Step::default()
            })
            .collect()
    }

    #[test]
    fn legacy_encoding_matches_column_contract() {
        let cell = encode_steps(&two_steps(), StepEncoding::Legacy).unwrap();
        assert_eq!(cell, "A (http://x/a - 200 - OK) | B (http://x/b - 200 - OK)");
    }

    #[test]
    fn legacy_decoding_keeps_order_and_drops_match_criteria() {
        let steps = decode_steps(
            "A (http://x/a - 200 - OK) | B (http://x/b - 200 - OK)",
            StepEncoding::Legacy,
        )
        .unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps
                .iter()
                .map(|s| (s.no, s.name.as_str(), s.url.as_str(), s.timeout.as_str()))
                .collect::<Vec<_>>(),
            vec![
                (Some(1), "A", "http://x/a", "30s"),
                (Some(2), "B", "http://x/b", "30s"),
            ]
        );
        // status codes and required text do not survive the legacy format
        assert!(steps.iter().all(|s| s.status_codes.is_empty() && s.required.is_empty()));
    }

    #[test]
    fn legacy_decoding_skips_empty_tokens_and_rejects_bare_names() {
        assert!(decode_steps("", StepEncoding::Legacy).unwrap().is_empty());

        let err = decode_steps("A (http://x/a -  - ) | just-a-name", StepEncoding::Legacy)
            .unwrap_err();
        assert!(matches!(err, StepFormatError::MissingUrl(token) if token == "just-a-name"));
    }

    #[test]
    fn json_encoding_preserves_match_criteria() {
        let cell = encode_steps(&two_steps(), StepEncoding::Json).unwrap();
        let steps = decode_steps(&cell, StepEncoding::Json).unwrap();

        assert_eq!(steps[1].name, "B");
        assert_eq!(steps[1].no, Some(2));
        assert_eq!(steps[1].status_codes, "200");
        assert_eq!(steps[1].required, "OK");
        assert_eq!(steps[1].timeout, "30s");
    }

    #[test]
    fn trigger_row_references_first_step_url() {
        let scenario = WebScenario {
            name: "Portal".into(),
            steps: two_steps(),
            ..WebScenario::default()
        };
        let row = TriggerRow::for_scenario("web-1", &scenario);

        assert_eq!(row.name, "Portal (http://x/a)");
        assert_eq!(
            row.problem_expression,
            "(last(/web-1/web.test.error[Portal],#1)<>\"\") and last(/web-1/web.test.fail[Portal],#1)>=1"
        );
        assert_eq!(row.recovery_expression, None);
        assert_eq!(row.severity, "4");
    }

    #[test]
    fn trigger_row_without_steps_uses_placeholder_url() {
        let scenario = WebScenario {
            name: "Empty".into(),
            ..WebScenario::default()
        };
        assert_eq!(
            TriggerRow::for_scenario("web-1", &scenario).name,
            "Empty (Unknown URL)"
        );
    }
}
