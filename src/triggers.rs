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
use crate::model::{ManualCloseUpdate, NewTrigger, Trigger};
use crate::rows::TriggerRow;
use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

impl ApiClient {
    /// Creates one trigger per row of `trigger_file`. The trigger is tied to
    /// the host only through the host name inside its expression.
    pub fn import_triggers_from_csv(&self, host_name: &str, trigger_file: &Path) -> Result<usize> {
        if self.resolve_host(host_name)?.is_none() {
            return Ok(0);
        }

        let mut reader = csv::Reader::from_path(trigger_file)
            .with_context(|| format!("opening {}", trigger_file.display()))?;
        let mut created = 0;
        for (line, row) in reader.deserialize::<TriggerRow>().enumerate() {
            let row = row.with_context(|| {
                format!("reading row {} of {}", line + 1, trigger_file.display())
            })?;
            if !is_known_severity(&row.severity) {
                warn!(trigger = %row.name, severity = %row.severity, "severity is not a number between 0 and 5; sending as-is");
            }

            let params = NewTrigger {
                description: row.name.clone(),
                expression: row.problem_expression,
                priority: row.severity,
            };
            self.call("trigger.create", &params)?;
            info!(host = host_name, trigger = %row.name, "added trigger");
            created += 1;
        }
        Ok(created)
    }

    /// Turns on manual close for every trigger of `host_name`, whatever its
    /// current setting.
    pub fn enable_manual_close_triggers(&self, host_name: &str) -> Result<usize> {
        let triggers: Vec<Trigger> = self.call_as(
            "trigger.get",
            &json!({ "host": host_name, "output": ["triggerid", "description", "manual_close"] }),
        )?;

        for trigger in &triggers {
            let params = ManualCloseUpdate {
                triggerid: trigger.triggerid.clone(),
                manual_close: 1,
            };
            self.call("trigger.update", &params)?;
            info!(host = host_name, trigger = %trigger.description, "enabled manual close");
        }
        Ok(triggers.len())
    }
}

fn is_known_severity(raw: &str) -> bool {
    matches!(raw.trim().parse::<u8>(), Ok(0..=5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::hosts::tests::{client_for, mock_host};
    use httpmock::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const TRIGGERS_CSV: &str = "name,problem_expression,recovery_expression,severity\n\
        Portal (http://x/a),\"last(/web-1/web.test.fail[Portal],#1)>=1\",,4\n\
        Shop (http://x/c),\"last(/web-1/web.test.fail[Shop],#1)>=1\",,High\n\
        Blog (http://x/d),\"last(/web-1/web.test.fail[Blog],#1)>=1\",,2\n";

    fn reply(result: serde_json::Value) -> serde_json::Value {
        json!({ "jsonrpc": "2.0", "result": result, "id": 1 })
    }

    #[test]
    fn severity_check() {
        assert!(is_known_severity("4"));
        assert!(is_known_severity(" 0 "));
        assert!(!is_known_severity("6"));
        assert!(!is_known_severity("High"));
    }

    #[test]
    fn imports_triggers_with_severity_as_text() {
        let server = MockServer::start();
        mock_host(&server, "web-1", &["10501"]);
        let portal = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Portal (http://x/a)", "expression": "last(/web-1/web.test.fail[Portal],#1)>=1", "priority": "4"}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["1"]})));
        });
        let shop = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Shop (http://x/c)", "priority": "High"}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["2"]})));
        });
        let blog = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Blog (http://x/d)", "priority": "2"}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["3"]})));
        });
        let dir = tempdir().unwrap();
        let file = dir.path().join("t.csv");
        fs::write(&file, TRIGGERS_CSV).unwrap();

        let created = client_for(&server)
            .import_triggers_from_csv("web-1", &file)
            .unwrap();

        assert_eq!(created, 3);
        portal.assert_hits(1);
        shop.assert_hits(1);
        blog.assert_hits(1);
    }

    #[test]
    fn trigger_import_stops_at_first_api_error() {
        let server = MockServer::start();
        mock_host(&server, "web-1", &["10501"]);
        let portal = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Portal (http://x/a)"}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["1"]})));
        });
        let shop = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Shop (http://x/c)"}}"#,
            );
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "error": {"code": -32602, "message": "Invalid params.", "data": "Incorrect value for field \"priority\"."},
                "id": 1
            }));
        });
        let blog = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.create", "params": {"description": "Blog (http://x/d)"}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["3"]})));
        });
        let dir = tempdir().unwrap();
        let file = dir.path().join("t.csv");
        fs::write(&file, TRIGGERS_CSV).unwrap();

        let err = client_for(&server)
            .import_triggers_from_csv("web-1", &file)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Call { method, .. }) if method == "trigger.create"
        ));
        portal.assert_hits(1);
        shop.assert_hits(1);
        blog.assert_hits(0);
    }

    #[test]
    fn trigger_import_skips_unknown_host() {
        let server = MockServer::start();
        mock_host(&server, "ghost", &[]);
        let create = server.mock(|when, then| {
            when.json_body_partial(r#"{"method": "trigger.create"}"#);
            then.status(200).json_body(reply(json!({"triggerids": ["1"]})));
        });
        let dir = tempdir().unwrap();
        let file = dir.path().join("t.csv");
        fs::write(&file, TRIGGERS_CSV).unwrap();

        let created = client_for(&server)
            .import_triggers_from_csv("ghost", &file)
            .unwrap();

        assert_eq!(created, 0);
        create.assert_hits(0);
    }

    #[test]
    fn manual_close_updates_every_trigger_by_host_name() {
        let server = MockServer::start();
        let host_lookup = mock_host(&server, "web-1", &["10501"]);
        let get = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.get", "params": {"host": "web-1", "output": ["triggerid", "description", "manual_close"]}}"#,
            );
            then.status(200).json_body(reply(json!([
                {"triggerid": "100", "description": "Portal down", "manual_close": "0"},
                {"triggerid": "101", "description": "Shop down", "manual_close": "1"}
            ])));
        });
        let first = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.update", "params": {"triggerid": "100", "manual_close": 1}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["100"]})));
        });
        let second = server.mock(|when, then| {
            when.json_body_partial(
                r#"{"method": "trigger.update", "params": {"triggerid": "101", "manual_close": 1}}"#,
            );
            then.status(200).json_body(reply(json!({"triggerids": ["101"]})));
        });

        let updated = client_for(&server)
            .enable_manual_close_triggers("web-1")
            .unwrap();

        assert_eq!(updated, 2);
        get.assert_hits(1);
        first.assert_hits(1);
        second.assert_hits(1);
        host_lookup.assert_hits(0);
    }

    #[test]
    fn manual_close_stops_at_first_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.json_body_partial(r#"{"method": "trigger.get"}"#);
            then.status(200).json_body(reply(json!([
                {"triggerid": "100", "description": "Portal down"},
                {"triggerid": "101", "description": "Shop down"}
            ])));
        });
        let first = server.mock(|when, then| {
            when.json_body_partial(r#"{"method": "trigger.update", "params": {"triggerid": "100"}}"#);
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "error": {"code": -32500, "message": "Application error.", "data": "No permissions to referred object or it does not exist!"},
                "id": 1
            }));
        });
        let second = server.mock(|when, then| {
            when.json_body_partial(r#"{"method": "trigger.update", "params": {"triggerid": "101"}}"#);
            then.status(200).json_body(reply(json!({"triggerids": ["101"]})));
        });

        let err = client_for(&server)
            .enable_manual_close_triggers("web-1")
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Call { method, .. }) if method == "trigger.update"
        ));
        first.assert_hits(1);
        second.assert_hits(0);
    }
}

