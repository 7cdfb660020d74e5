use crate::client::{ApiClient, ApiError};
use crate::model::HostRef;
use serde_json::json;
use tracing::error;

impl ApiClient {
    /// Looks up the id of the host whose technical name is exactly `name`.
    ///
    /// Not finding exactly one host is logged and reported as `None`; callers
    /// return early instead of failing.
    pub fn resolve_host(&self, name: &str) -> Result<Option<String>, ApiError> {
        let hosts: Vec<HostRef> = self.call_as(
            "host.get",
            &json!({ "filter": { "host": name }, "output": ["hostid"] }),
        )?;

        match hosts.as_slice() {
            [host] => Ok(Some(host.hostid.clone())),
            [] => {
                error!(host = name, "host not found");
                Ok(None)
            }
            _ => {
                error!(host = name, matches = hosts.len(), "host name is ambiguous");
                Ok(None)
            }
        }
    }
}
