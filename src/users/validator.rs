use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::users::dto::{PasswordDigest, PasswordHasher, UserRecord};
use crate::users::sources::SourcePlatform;

/// Raw field map as read from one CSV row or JSON object.
pub type RawRow = Map<String, Value>;

/// Why a row could not be turned into a [`UserRecord`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid email `{0}`")]
    InvalidEmail(String),
    #[error("invalid value `{value}` for `{field}`")]
    InvalidEnum { field: &'static str, value: String },
    #[error("`{field}` must be {expected}")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("`password` is set but `passwordHasher` is missing")]
    PasswordWithoutHasher,
}

impl ValidationError {
    /// Canonical field the failure is attached to.
    pub fn path(&self) -> &'static str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::InvalidEmail(_) => "email",
            ValidationError::InvalidEnum { field, .. } => field,
            ValidationError::InvalidType { field, .. } => field,
            ValidationError::PasswordWithoutHasher => "passwordHasher",
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Remap source field names to canonical ones, drop placeholder values and
/// fill in the source defaults.
pub fn normalize(raw: &RawRow, source: SourcePlatform) -> RawRow {
    let mut fields = Map::new();
    for (key, value) in raw {
        if is_placeholder(value) {
            continue;
        }
        let name = source.canonical_name(key);
        // first non-empty source column wins when two map to the same field
        if !fields.contains_key(name) {
            fields.insert(name.to_string(), value.clone());
        }
    }
    for (key, value) in source.defaults() {
        fields
            .entry(key.to_string())
            .or_insert_with(|| Value::String(value.to_string()));
    }
    fields
}

fn string_field(
    fields: &RawRow,
    name: &'static str,
) -> Result<Option<String>, ValidationError> {
    match fields.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ValidationError::InvalidType {
            field: name,
            expected: "a string",
        }),
    }
}

fn user_id_field(fields: &RawRow) -> Result<String, ValidationError> {
    match fields.get("userId") {
        None => Err(ValidationError::MissingField("userId")),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ValidationError::InvalidType {
            field: "userId",
            expected: "a string or number",
        }),
    }
}

fn email_field(fields: &RawRow) -> Result<String, ValidationError> {
    let email = match fields.get("email") {
        None => return Err(ValidationError::MissingField("email")),
        // CSV exports join several addresses into one cell
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("email"))?
            .to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
            .ok_or(ValidationError::MissingField("email"))?
            .to_string(),
        Some(_) => {
            return Err(ValidationError::InvalidType {
                field: "email",
                expected: "a string or list of strings",
            })
        }
    };
    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail(email));
    }
    Ok(email)
}

fn metadata_field(
    fields: &RawRow,
    name: &'static str,
) -> Result<Option<Map<String, Value>>, ValidationError> {
    let invalid = ValidationError::InvalidType {
        field: name,
        expected: "a JSON object",
    };
    match fields.get(name) {
        None => Ok(None),
        Some(Value::Object(o)) => Ok(Some(o.clone())),
        // CSV cells carry metadata as serialized JSON
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(o)) if o.is_empty() => Ok(None),
            Ok(Value::Object(o)) => Ok(Some(o)),
            _ => Err(invalid),
        },
        Some(_) => Err(invalid),
    }
}

fn password_field(fields: &RawRow) -> Result<Option<PasswordDigest>, ValidationError> {
    let Some(digest) = string_field(fields, "password")? else {
        return Ok(None);
    };
    let tag = string_field(fields, "passwordHasher")?
        .ok_or(ValidationError::PasswordWithoutHasher)?;
    let hasher = PasswordHasher::parse(&tag).ok_or(ValidationError::InvalidEnum {
        field: "passwordHasher",
        value: tag,
    })?;
    Ok(Some(PasswordDigest { digest, hasher }))
}

/// Check an already normalized field map against the canonical schema.
pub fn check_schema(fields: &RawRow) -> Result<UserRecord, ValidationError> {
    let user_id = user_id_field(fields)?;
    if user_id.is_empty() {
        return Err(ValidationError::MissingField("userId"));
    }
    let email = email_field(fields)?;

    Ok(UserRecord {
        user_id,
        email,
        first_name: string_field(fields, "firstName")?,
        last_name: string_field(fields, "lastName")?,
        username: string_field(fields, "username")?,
        totp_secret: string_field(fields, "totpSecret")?,
        password: password_field(fields)?,
        public_metadata: metadata_field(fields, "publicMetadata")?,
        private_metadata: metadata_field(fields, "privateMetadata")?,
        unsafe_metadata: metadata_field(fields, "unsafeMetadata")?,
    })
}

/// Remap a raw row from `source` and validate it.
pub fn validate(raw: &RawRow, source: SourcePlatform) -> Result<UserRecord, ValidationError> {
    check_schema(&normalize(raw, source))
}
