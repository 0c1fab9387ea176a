use std::fmt;
use std::str::FromStr;

/// Platforms a user export can come from. Each one carries a compiled-in
/// field remapping table into the canonical record shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SourcePlatform {
    Clerk,
    Authjs,
    Supabase,
    Auth0,
}

// (source field, canonical field)
const CLERK_FIELDS: &[(&str, &str)] = &[
    ("id", "userId"),
    ("email_addresses", "email"),
    ("primary_email_address", "email"),
    ("first_name", "firstName"),
    ("last_name", "lastName"),
    ("username", "username"),
    ("phone_number", "phone"),
    ("primary_phone_number", "phone"),
    ("password_digest", "password"),
    ("password_hasher", "passwordHasher"),
    ("totp_secret", "totpSecret"),
    ("public_metadata", "publicMetadata"),
    ("private_metadata", "privateMetadata"),
    ("unsafe_metadata", "unsafeMetadata"),
];

const AUTHJS_FIELDS: &[(&str, &str)] = &[
    ("id", "userId"),
    ("email_addresses", "email"),
    ("first_name", "firstName"),
    ("last_name", "lastName"),
];

const SUPABASE_FIELDS: &[(&str, &str)] = &[
    ("id", "userId"),
    ("email", "email"),
    ("first_name", "firstName"),
    ("last_name", "lastName"),
    ("encrypted_password", "password"),
    ("phone", "phone"),
    ("raw_user_meta_data", "publicMetadata"),
];

const AUTH0_FIELDS: &[(&str, &str)] = &[
    ("id", "userId"),
    ("user_id", "userId"),
    ("email", "email"),
    ("given_name", "firstName"),
    ("family_name", "lastName"),
    ("nickname", "username"),
    ("phone_number", "phone"),
    ("passwordHash", "password"),
    ("user_metadata", "publicMetadata"),
    ("app_metadata", "privateMetadata"),
];

const BCRYPT_DEFAULT: &[(&str, &str)] = &[("passwordHasher", "bcrypt")];

impl SourcePlatform {
    pub const ALL: [SourcePlatform; 4] = [
        SourcePlatform::Clerk,
        SourcePlatform::Authjs,
        SourcePlatform::Supabase,
        SourcePlatform::Auth0,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SourcePlatform::Clerk => "clerk",
            SourcePlatform::Authjs => "authjs",
            SourcePlatform::Supabase => "supabase",
            SourcePlatform::Auth0 => "auth0",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourcePlatform::Clerk => "Clerk",
            SourcePlatform::Authjs => "Auth.js (Next-Auth)",
            SourcePlatform::Supabase => "Supabase",
            SourcePlatform::Auth0 => "Auth0",
        }
    }

    fn fields(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            SourcePlatform::Clerk => CLERK_FIELDS,
            SourcePlatform::Authjs => AUTHJS_FIELDS,
            SourcePlatform::Supabase => SUPABASE_FIELDS,
            SourcePlatform::Auth0 => AUTH0_FIELDS,
        }
    }

    /// Canonical name for a source field. Fields the table does not know keep
    /// their original name, so already-canonical exports pass through.
    pub fn canonical_name<'a>(&self, field: &'a str) -> &'a str {
        self.fields()
            .iter()
            .find(|(from, _)| *from == field)
            .map(|(_, to)| *to)
            .unwrap_or(field)
    }

    /// Values filled in when the export leaves a canonical field absent.
    pub fn defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            SourcePlatform::Supabase | SourcePlatform::Auth0 => BCRYPT_DEFAULT,
            SourcePlatform::Clerk | SourcePlatform::Authjs => &[],
        }
    }
}

impl fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SourcePlatform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| anyhow::anyhow!("unknown source platform: {}", s))
    }
}

#[cfg(test)]
mod source_tests {
    use super::*;

    #[test]
    fn known_fields_are_remapped() {
        assert_eq!(SourcePlatform::Supabase.canonical_name("encrypted_password"), "password");
        assert_eq!(SourcePlatform::Auth0.canonical_name("given_name"), "firstName");
        assert_eq!(SourcePlatform::Clerk.canonical_name("password_digest"), "password");
        assert_eq!(SourcePlatform::Authjs.canonical_name("id"), "userId");
    }

    #[test]
    fn unknown_fields_pass_through() {
        assert_eq!(SourcePlatform::Authjs.canonical_name("email"), "email");
        assert_eq!(SourcePlatform::Clerk.canonical_name("userId"), "userId");
        assert_eq!(SourcePlatform::Supabase.canonical_name("whatever"), "whatever");
    }

    #[test]
    fn bcrypt_default_only_for_hashing_sources() {
        assert_eq!(SourcePlatform::Supabase.defaults(), &[("passwordHasher", "bcrypt")]);
        assert_eq!(SourcePlatform::Auth0.defaults(), &[("passwordHasher", "bcrypt")]);
        assert!(SourcePlatform::Clerk.defaults().is_empty());
        assert!(SourcePlatform::Authjs.defaults().is_empty());
    }

    #[test]
    fn parses_keys_case_insensitively() {
        assert_eq!("Auth0".parse::<SourcePlatform>().unwrap(), SourcePlatform::Auth0);
        assert_eq!(" supabase ".parse::<SourcePlatform>().unwrap(), SourcePlatform::Supabase);
        assert!("firebase".parse::<SourcePlatform>().is_err());
    }
}
