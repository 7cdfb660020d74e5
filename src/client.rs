use crate::config::Credential;
use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use thiserror::Error;
use tracing::{debug, error, info};

const ENDPOINT: &str = "api_jsonrpc.php";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("login failed: {0}")]
    Login(String),
    #[error("API call to {method} failed: {detail}")]
    Call { method: String, detail: String },
    #[error("malformed response to {method}: {reason}")]
    Malformed { method: String, reason: String },
    #[error("could not decode result of {method}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("sending {method} request")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: String,
}

impl RpcError {
    fn detail(&self) -> String {
        if self.data.is_empty() {
            self.message.clone()
        } else {
            self.data.clone()
        }
    }
}

#[derive(Debug, Clone)]
enum Auth {
    /// Only used for the `user.login` exchange itself.
    Anonymous,
    Bearer(String),
    Session(String),
}

#[derive(Serialize)]
struct Envelope<'a, P: Serialize + ?Sized> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a P,
    auth: Option<&'a str>,
    id: u64,
}

#[derive(Debug)]
pub struct ApiClient {
    endpoint: Url,
    http: Client,
    auth: Auth,
    next_id: Cell<u64>,
}

impl ApiClient {
    /// Builds the client and establishes its auth context. A static token
    /// needs no round trip; a login session costs exactly one `user.login`.
    pub fn connect(base_url: &str, credential: &Credential) -> Result<Self> {
        let endpoint = endpoint_url(base_url)?;
        let http = Client::builder()
            .user_agent(concat!("zbxctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;

        let mut client = Self {
            endpoint,
            http,
            auth: Auth::Anonymous,
            next_id: Cell::new(1),
        };

        client.auth = match credential {
            Credential::StaticToken(token) => Auth::Bearer(token.clone()),
            Credential::LoginSession { user, password } => {
                Auth::Session(client.login(user, password)?)
            }
        };
        Ok(client)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn login(&self, user: &str, password: &str) -> Result<String, ApiError> {
        let params = serde_json::json!({ "username": user, "password": password });
        match self.post("user.login", &params)? {
            Reply::Result(Value::String(session)) => {
                info!(user, "logged in to Zabbix API");
                Ok(session)
            }
            Reply::Result(other) => Err(ApiError::Login(format!(
                "unexpected session id in login response: {other}"
            ))),
            Reply::Error(err) => {
                error!(user, detail = %err.detail(), "login failed");
                Err(ApiError::Login(err.detail()))
            }
        }
    }

    /// Invokes `method` and returns its `result` verbatim.
    pub fn call<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> Result<Value, ApiError> {
        match self.post(method, params)? {
            Reply::Result(result) => Ok(result),
            Reply::Error(err) => {
                error!(method, code = err.code, detail = %err.detail(), "API call failed");
                Err(ApiError::Call {
                    method: method.to_string(),
                    detail: err.detail(),
                })
            }
        }
    }

    /// Like [`ApiClient::call`], decoding the result into `T`.
    pub fn call_as<T, P>(&self, method: &str, params: &P) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let value = self.call(method, params)?;
        serde_json::from_value(value).map_err(|source| ApiError::Decode {
            method: method.to_string(),
            source,
        })
    }

    fn post<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> Result<Reply, ApiError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let envelope = Envelope {
            jsonrpc: "2.0",
            method,
            params,
            auth: match &self.auth {
                Auth::Session(session) => Some(session.as_str()),
                Auth::Anonymous | Auth::Bearer(_) => None,
            },
            id,
        };

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json-rpc"))
            .json(&envelope);

        if let Auth::Bearer(token) = &self.auth {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        debug!(method, id, "calling Zabbix API");
        let transport = |source| ApiError::Transport {
            method: method.to_string(),
            source,
        };
        let body = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(transport)?;

        Reply::parse(method, &body)
    }
}

enum Reply {
    Result(Value),
    Error(RpcError),
}

impl Reply {
    fn parse(method: &str, body: &str) -> Result<Self, ApiError> {
        let malformed = |reason: String| ApiError::Malformed {
            method: method.to_string(),
            reason,
        };
        let mut map: Map<String, Value> =
            serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;

        if let Some(result) = map.remove("result") {
            return Ok(Reply::Result(result));
        }
        match map.remove("error") {
            Some(err) => serde_json::from_value(err)
                .map(Reply::Error)
                .map_err(|e| malformed(format!("unreadable error object: {e}"))),
            None => Err(malformed("response has neither result nor error".into())),
        }
    }
}

fn endpoint_url(base_url: &str) -> Result<Url> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let full = if trimmed.ends_with(ENDPOINT) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{ENDPOINT}")
    };
    Url::parse(&full).with_context(|| format!("parsing Zabbix URL `{base_url}`"))
}
