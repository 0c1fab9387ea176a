use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::users::{PasswordHasher, UserRecord};

/// Body of `POST /users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUserRequest {
    pub external_id: String,
    pub email_address: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hasher: Option<PasswordHasher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_password_requirement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsafe_metadata: Option<Map<String, Value>>,
}

impl CreateUserRequest {
    /// True when the request imports a password digest rather than skipping
    /// the password requirement.
    pub fn is_digest_import(&self) -> bool {
        self.password_digest.is_some()
    }
}

impl From<&UserRecord> for CreateUserRequest {
    fn from(user: &UserRecord) -> Self {
        let (password_digest, password_hasher, skip_password_requirement) = match &user.password {
            Some(p) => (Some(p.digest.clone()), Some(p.hasher), None),
            None => (None, None, Some(true)),
        };
        Self {
            external_id: user.user_id.clone(),
            email_address: vec![user.email.clone()],
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            totp_secret: user.totp_secret.clone(),
            password_digest,
            password_hasher,
            skip_password_requirement,
            public_metadata: user.public_metadata.clone(),
            private_metadata: user.private_metadata.clone(),
            unsafe_metadata: user.unsafe_metadata.clone(),
        }
    }
}

/// Subset of the remote user object the tool cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// `GET /users` answers either a bare array or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserListResponse {
    Plain(Vec<RemoteUser>),
    Paginated { data: Vec<RemoteUser> },
}

impl UserListResponse {
    pub(crate) fn into_users(self) -> Vec<RemoteUser> {
        match self {
            UserListResponse::Plain(users) => users,
            UserListResponse::Paginated { data } => data,
        }
    }
}

/// One entry of the remote error envelope `{"errors": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[cfg(test)]
mod remote_dto_tests {
    use super::*;

    #[test]
    fn digest_path_carries_password_and_hasher() {
        let user =
            UserRecord::new("1", "a@x.com").with_password("$2a$10$x", PasswordHasher::Bcrypt);
        let req = CreateUserRequest::from(&user);
        assert!(req.is_digest_import());
        assert_eq!(req.password_hasher, Some(PasswordHasher::Bcrypt));
        assert_eq!(req.skip_password_requirement, None);

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["password_hasher"], "bcrypt");
        assert_eq!(json["email_address"][0], "a@x.com");
        assert!(json.get("skip_password_requirement").is_none());
    }

    #[test]
    fn passwordless_path_skips_password_requirement() {
        let req = CreateUserRequest::from(&UserRecord::new("2", "b@x.com"));
        assert!(!req.is_digest_import());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["skip_password_requirement"], true);
        assert_eq!(json["external_id"], "2");
        assert!(json.get("password_digest").is_none());
        assert!(json.get("password_hasher").is_none());
    }

    #[test]
    fn user_list_accepts_both_shapes() {
        let plain: UserListResponse = serde_json::from_str(r#"[{"id":"user_1"}]"#).unwrap();
        assert_eq!(plain.into_users()[0].id, "user_1");
        let paged: UserListResponse =
            serde_json::from_str(r#"{"data":[{"id":"user_2","external_id":"7"}],"total_count":1}"#)
                .unwrap();
        let users = paged.into_users();
        assert_eq!(users[0].external_id.as_deref(), Some("7"));
    }
}
