//! Admin login over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use subastas_core::constants::ADMIN_LOGIN_PATH;
use subastas_core::wire::AdminLoginRequest;
use subastas_core::RegistrationOutcome;

use crate::error::TransportError;

/// Call/response login for operators.
#[async_trait]
pub trait AdminTransport: Send + Sync {
    /// Authenticate. `Ok` carries the server's structured verdict, whatever
    /// it is; `Err` means no structured answer was obtained.
    async fn login(&self, request: &AdminLoginRequest) -> Result<RegistrationOutcome, TransportError>;
}

/// `POST <base>/api/login-admin` with a JSON body.
pub struct HttpAdminTransport {
    client: Client,
    endpoint: String,
}

impl HttpAdminTransport {
    /// Client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("build client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}{ADMIN_LOGIN_PATH}", base_url.trim_end_matches('/')),
        })
    }

    /// Full login URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AdminTransport for HttpAdminTransport {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, user_id = %request.user_id))]
    async fn login(&self, request: &AdminLoginRequest) -> Result<RegistrationOutcome, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Http(format!("read body: {e}")))?;
        debug!(status = status.as_u16(), len = body.len(), "admin login answered");

        // The server answers rejections with a JSON body and a non-2xx status;
        // any JSON object is a structured verdict.
        match serde_json::from_str::<Value>(&body) {
            Ok(value @ Value::Object(_)) => Ok(RegistrationOutcome::from_reply(&value)),
            _ => Err(TransportError::Decode(format!(
                "status {status} with non-JSON body"
            ))),
        }
    }
}
