pub mod dto;
pub mod loader;
pub mod sources;
pub mod validator;

pub use dto::{PasswordHasher, PendingRecord, UserRecord};
pub use sources::SourcePlatform;
