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

use crate::client::ApiClient;
use crate::model::{
    DEFAULT_AGENT, DEFAULT_DELAY, IMPORT_RETRIES, NewWebScenario, ScenarioTimeoutUpdate,
    UPDATE_DELAY, WebScenario,
};
use crate::rows::{ScenarioRow, StepEncoding, TriggerRow, decode_steps};
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

impl ApiClient {
    /// Web scenarios of `host_name` with their steps; empty if the host does
    /// not resolve.
    pub fn get_web_scenarios(&self, host_name: &str) -> Result<Vec<WebScenario>> {
        let Some(host_id) = self.resolve_host(host_name)? else {
            return Ok(Vec::new());
        };

        let scenarios = self.call_as(
            "httptest.get",
            &json!({
                "hostids": host_id,
                "output": ["httptestid", "name", "delay", "agent", "http_proxy"],
                "selectSteps": ["name", "url", "status_codes", "required"],
            }),
        )?;
        Ok(scenarios)
    }

    /// Writes the host's scenarios and one derived trigger per scenario.
    /// Nothing is written when the host has no scenarios.
    pub fn export_to_csv(
        &self,
        host_name: &str,
        scenario_file: &Path,
        trigger_file: &Path,
        encoding: StepEncoding,
    ) -> Result<usize> {
        let scenarios = self.get_web_scenarios(host_name)?;
        if scenarios.is_empty() {
            warn!(host = host_name, "no web scenarios found");
            return Ok(0);
        }

        let rows = scenarios
            .iter()
            .map(|scenario| ScenarioRow::from_scenario(scenario, encoding))
            .collect::<Result<Vec<_>, _>>()
            .context("encoding step details")?;
        write_rows(scenario_file, &rows)?;

        let triggers: Vec<TriggerRow> = scenarios
            .iter()
            .map(|scenario| TriggerRow::for_scenario(host_name, scenario))
            .collect();
        write_rows(trigger_file, &triggers)?;

        info!(
            host = host_name,
            scenarios = scenarios.len(),
            scenario_file = %scenario_file.display(),
            trigger_file = %trigger_file.display(),
            "exported web scenarios and triggers"
        );
        Ok(scenarios.len())
    }

    /// Creates one web scenario per row of `scenario_file` on `host_name`.
    pub fn import_scenarios_from_csv(
        &self,
        host_name: &str,
        scenario_file: &Path,
        encoding: StepEncoding,
    ) -> Result<usize> {
        let Some(host_id) = self.resolve_host(host_name)? else {
            return Ok(0);
        };

        let mut reader = csv::Reader::from_path(scenario_file)
            .with_context(|| format!("opening {}", scenario_file.display()))?;
        let mut created = 0;
        for (line, row) in reader.deserialize::<ScenarioRow>().enumerate() {
            let row = row.with_context(|| {
                format!("reading row {} of {}", line + 1, scenario_file.display())
            })?;
            let steps = decode_steps(&row.step_details, encoding)
                .with_context(|| format!("parsing steps of scenario `{}`", row.name))?;

            let params = NewWebScenario {
                name: row.name.clone(),
                hostid: host_id.clone(),
                delay: or_default(row.delay, DEFAULT_DELAY),
                retries: IMPORT_RETRIES,
                agent: or_default(row.agent, DEFAULT_AGENT),
                steps,
            };
            self.call("httptest.create", &params)?;
            info!(host = host_name, scenario = %row.name, "added web scenario");
            created += 1;
        }
        Ok(created)
    }

    /// Sets every step timeout of every scenario on the host. The scenario
    /// delay is reset to one minute in the same update.
    pub fn update_web_scenario_timeout(&self, host_name: &str, timeout: &str) -> Result<usize> {
        let Some(host_id) = self.resolve_host(host_name)? else {
            return Ok(0);
        };

        let scenarios: Vec<WebScenario> = self.call_as(
            "httptest.get",
            &json!({
                "hostids": host_id,
                "output": ["httptestid", "name"],
                "selectSteps": ["httpstepid", "no", "name", "url", "timeout"],
            }),
        )?;

        for scenario in &scenarios {
            let steps = scenario
                .steps
                .iter()
                .cloned()
                .map(|mut step| {
                    step.timeout = timeout.to_string();
                    step
                })
                .collect();
            let params = ScenarioTimeoutUpdate {
                httptestid: scenario.httptestid.clone(),
                steps,
                delay: UPDATE_DELAY.to_string(),
            };
            self.call("httptest.update", &params)?;
            info!(host = host_name, scenario = %scenario.name, timeout, "updated web scenario timeout");
        }
        Ok(scenarios.len())
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn write_rows<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
