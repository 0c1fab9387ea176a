//! In-memory stand-in for the remote API used by driver tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::remote::{ApiError, ApiErrorDetail, CreateUserRequest, RemoteUser, UserApi};

#[derive(Default)]
struct FakeInner {
    users: Vec<RemoteUser>,
    scripted: HashMap<String, VecDeque<ApiError>>,
    persistent: HashMap<String, ApiError>,
    calls: Vec<CreateUserRequest>,
    deleted: Vec<String>,
    concurrent: usize,
    max_concurrent: usize,
    next_id: usize,
}

#[derive(Default)]
pub struct FakeUserApi {
    inner: Mutex<FakeInner>,
    latency: Duration,
}

pub fn rate_limited() -> ApiError {
    ApiError::Status {
        status: 429,
        errors: vec![ApiErrorDetail {
            code: "too_many_requests".into(),
            message: "Too many requests".into(),
            long_message: None,
        }],
    }
}

pub fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        errors: vec![],
    }
}

fn conflict() -> ApiError {
    ApiError::Status {
        status: 422,
        errors: vec![ApiErrorDetail {
            code: "form_identifier_exists".into(),
            message: "That email address is taken. Please try another.".into(),
            long_message: None,
        }],
    }
}

impl FakeUserApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Errors returned, in order, by the next create calls for `external_id`.
    pub fn script(&self, external_id: &str, errors: Vec<ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .scripted
            .entry(external_id.to_string())
            .or_default()
            .extend(errors);
    }

    /// Error returned by every create call for `external_id`.
    pub fn fail_always(&self, external_id: &str, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.persistent.insert(external_id.to_string(), error);
    }

    pub fn seed_user(&self, id: &str, external_id: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.users.push(RemoteUser {
            id: id.to_string(),
            external_id: external_id.map(str::to_string),
        });
    }

    pub fn calls(&self) -> Vec<CreateUserRequest> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, external_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.external_id == external_id)
            .count()
    }

    pub fn users(&self) -> Vec<RemoteUser> {
        self.inner.lock().unwrap().users.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.inner.lock().unwrap().deleted.clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().unwrap().max_concurrent
    }
}

#[async_trait]
impl UserApi for FakeUserApi {
    async fn create_user(&self, request: &CreateUserRequest) -> Result<RemoteUser, ApiError> {
        let scripted = {
            let mut inner = self.inner.lock().unwrap();
            inner.concurrent += 1;
            inner.max_concurrent = inner.max_concurrent.max(inner.concurrent);
            inner.calls.push(request.clone());
            match inner.persistent.get(&request.external_id) {
                Some(err) => Some(err.clone()),
                None => inner
                    .scripted
                    .get_mut(&request.external_id)
                    .and_then(VecDeque::pop_front),
            }
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.concurrent -= 1;
        if let Some(err) = scripted {
            return Err(err);
        }
        let exists = inner
            .users
            .iter()
            .any(|u| u.external_id.as_deref() == Some(request.external_id.as_str()));
        if exists {
            return Err(conflict());
        }
        inner.next_id += 1;
        let user = RemoteUser {
            id: format!("user_{}", inner.next_id),
            external_id: Some(request.external_id.clone()),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<RemoteUser>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        let scripted = {
            let mut inner = self.inner.lock().unwrap();
            match inner.persistent.get(id) {
                Some(err) => Some(err.clone()),
                None => inner.scripted.get_mut(id).and_then(VecDeque::pop_front),
            }
        };
        if let Some(err) = scripted {
            return Err(err);
        }
        let mut inner = self.inner.lock().unwrap();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Err(ApiError::Status {
                status: 404,
                errors: vec![],
            });
        }
        inner.deleted.push(id.to_string());
        Ok(())
    }
}
