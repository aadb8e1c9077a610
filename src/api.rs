//! HTTP client for the ticket desk API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::models::{Department, NewTicket, Reason, TicketRecord, UserProfile};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Anything that can produce the viewer's current ticket list.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch_tickets(&self) -> Result<Vec<TicketRecord>, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        ApiClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.url(endpoint));
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Token {}", token));
        }
        builder
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "api response");

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let builder = self
            .request(Method::POST, "/login/")
            .json(&json!({ "email": email, "password": password }));
        self.send(builder).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let _: serde_json::Value = self.send(self.request(Method::POST, "/logout/")).await?;
        Ok(())
    }

    pub async fn tickets(&self) -> Result<Vec<TicketRecord>, ApiError> {
        self.send(self.request(Method::GET, "/tickets/")).await
    }

    pub async fn ticket(&self, id: i64) -> Result<TicketRecord, ApiError> {
        self.send(self.request(Method::GET, &format!("/tickets/{}/", id)))
            .await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<TicketRecord, ApiError> {
        self.send(self.request(Method::POST, "/tickets/").json(ticket))
            .await
    }

    pub async fn departments(&self) -> Result<Vec<Department>, ApiError> {
        self.send(self.request(Method::GET, "/departamentos/"))
            .await
    }

    /// Reasons of one department, or all of them.
    pub async fn reasons(&self, department_id: Option<i64>) -> Result<Vec<Reason>, ApiError> {
        self.send(self.request(Method::GET, &reasons_endpoint(department_id)))
            .await
    }

    pub async fn update_status(&self, id: i64, status: &str) -> Result<TicketRecord, ApiError> {
        let builder = self
            .request(Method::POST, &format!("/tickets/{}/update_estado/", id))
            .json(&json!({ "estado": status }));
        self.send(builder).await
    }

    pub async fn update_priority(&self, id: i64, priority: &str) -> Result<TicketRecord, ApiError> {
        let builder = self
            .request(Method::POST, &format!("/tickets/{}/update_prioridad/", id))
            .json(&json!({ "prioridad": priority }));
        self.send(builder).await
    }
}

#[async_trait]
impl TicketSource for ApiClient {
    async fn fetch_tickets(&self) -> Result<Vec<TicketRecord>, ApiError> {
        self.tickets().await
    }
}

fn reasons_endpoint(department_id: Option<i64>) -> String {
    match department_id {
        Some(id) => format!("/motivos/?departamento={}", id),
        None => "/motivos/".to_string(),
    }
}

/// Server errors come as `{"error": "..."}`; anything else gets a generic text.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("Error {}", status.as_u16()))
}
