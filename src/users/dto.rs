use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Hashing algorithms the identity platform accepts for digest imports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PasswordHasher {
    #[serde(rename = "argon2i")]
    Argon2i,
    #[serde(rename = "argon2id")]
    Argon2id,
    #[serde(rename = "bcrypt")]
    Bcrypt,
    #[serde(rename = "md5")]
    Md5,
    #[serde(rename = "pbkdf2_sha256")]
    Pbkdf2Sha256,
    #[serde(rename = "pbkdf2_sha256_django")]
    Pbkdf2Sha256Django,
    #[serde(rename = "pbkdf2_sha1")]
    Pbkdf2Sha1,
    #[serde(rename = "scrypt_firebase")]
    ScryptFirebase,
}

impl PasswordHasher {
    pub const ALL: [PasswordHasher; 8] = [
        PasswordHasher::Argon2i,
        PasswordHasher::Argon2id,
        PasswordHasher::Bcrypt,
        PasswordHasher::Md5,
        PasswordHasher::Pbkdf2Sha256,
        PasswordHasher::Pbkdf2Sha256Django,
        PasswordHasher::Pbkdf2Sha1,
        PasswordHasher::ScryptFirebase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PasswordHasher::Argon2i => "argon2i",
            PasswordHasher::Argon2id => "argon2id",
            PasswordHasher::Bcrypt => "bcrypt",
            PasswordHasher::Md5 => "md5",
            PasswordHasher::Pbkdf2Sha256 => "pbkdf2_sha256",
            PasswordHasher::Pbkdf2Sha256Django => "pbkdf2_sha256_django",
            PasswordHasher::Pbkdf2Sha1 => "pbkdf2_sha1",
            PasswordHasher::ScryptFirebase => "scrypt_firebase",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.as_str() == tag)
    }
}

/// Pre-hashed password plus the algorithm that produced it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PasswordDigest {
    #[serde(rename = "password")]
    pub digest: String,
    #[serde(rename = "passwordHasher")]
    pub hasher: PasswordHasher,
}

/// Canonical user record, after source remapping and validation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
    #[serde(flatten)]
    pub password: Option<PasswordDigest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsafe_metadata: Option<Map<String, Value>>,
}

impl UserRecord {
    /// Minimal passwordless record.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            username: None,
            totp_secret: None,
            password: None,
            public_metadata: None,
            private_metadata: None,
            unsafe_metadata: None,
        }
    }

    pub fn with_password(mut self, digest: impl Into<String>, hasher: PasswordHasher) -> Self {
        self.password = Some(PasswordDigest {
            digest: digest.into(),
            hasher,
        });
        self
    }
}

/// A validated record together with its 0-based row in the input file.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub row: usize,
    pub record: UserRecord,
}

#[cfg(test)]
mod dto_tests {
    use super::*;

    #[test]
    fn hasher_tags_roundtrip_through_parse() {
        for hasher in PasswordHasher::ALL {
            assert_eq!(PasswordHasher::parse(hasher.as_str()), Some(hasher));
        }
        assert_eq!(PasswordHasher::parse("sha512"), None);
        assert_eq!(PasswordHasher::parse("BCRYPT"), None);
    }

    #[test]
    fn record_serializes_flat_camel_case() {
        let record =
            UserRecord::new("1", "a@x.com").with_password("$2a$10$abc", PasswordHasher::Bcrypt);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "1");
        assert_eq!(json["password"], "$2a$10$abc");
        assert_eq!(json["passwordHasher"], "bcrypt");
        assert!(json.get("firstName").is_none());
    }
}
