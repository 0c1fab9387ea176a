use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use crate::config::ApiConfig;
use crate::remote::dto::{
    ApiErrorBody, ApiErrorDetail, CreateUserRequest, RemoteUser, UserListResponse,
};
use crate::remote::{ApiError, UserApi};

/// HTTP client for the identity platform's backend API.
#[derive(Clone)]
pub struct ClerkClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl ClerkClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("user-migrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let errors = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => parsed.errors,
        Err(_) if body.trim().is_empty() => Vec::new(),
        Err(_) => vec![ApiErrorDetail {
            code: String::new(),
            message: body,
            long_message: None,
        }],
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        errors,
    })
}

#[async_trait]
impl UserApi for ClerkClient {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<RemoteUser, ApiError> {
        let resp = self
            .http
            .post(self.url("/users"))
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await?;
        let user: RemoteUser = error_for_status(resp).await?.json().await?;
        debug!(external_id = %request.external_id, remote_id = %user.id, "user created");
        Ok(user)
    }

    async fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<RemoteUser>, ApiError> {
        let resp = self
            .http
            .get(self.url("/users"))
            .bearer_auth(&self.secret_key)
            .query(&[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("order_by", "+created_at".to_string()),
            ])
            .send()
            .await?;
        let list: UserListResponse = error_for_status(resp).await?.json().await?;
        Ok(list.into_users())
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(self.url(&format!("/users/{}", id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        error_for_status(resp).await?;
        Ok(())
    }
}
