use thiserror::Error;

/// Payload validation failures. Each variant maps to the stable error code
/// returned in HTTP 400 bodies.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("request body must be a JSON object")]
    InvalidBody,

    #[error("name is required and must be a non-empty string")]
    MissingName,

    #[error("id must be a non-empty string")]
    InvalidId,

    #[error("type must be a string")]
    InvalidType,

    #[error("description must be a string")]
    InvalidDescription,

    #[error("tags must be an array of at most 10 non-empty strings of up to 32 characters")]
    InvalidTags,

    #[error("public must be a boolean")]
    InvalidPublic,

    #[error("owner must be a string")]
    InvalidOwner,

    #[error("metadata must be an object")]
    InvalidMetadata,
}

impl InputError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBody => "invalid_body",
            Self::MissingName => "missing_name",
            Self::InvalidId => "invalid_id",
            Self::InvalidType => "invalid_type",
            Self::InvalidDescription => "invalid_description",
            Self::InvalidTags => "invalid_tags",
            Self::InvalidPublic => "invalid_public",
            Self::InvalidOwner => "invalid_owner",
            Self::InvalidMetadata => "invalid_metadata",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate resource id: {0}")]
    DuplicateId(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "store-redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the storage engine itself, as opposed to
    /// client-side errors.
    pub fn is_backend(&self) -> bool {
        match self {
            Self::InvalidInput(_) | Self::NotFound(_) | Self::DuplicateId(_) => false,
            Self::BackendUnavailable(_)
            | Self::Sqlite(_)
            | Self::Json(_)
            | Self::Io(_)
            | Self::Config(_) => true,
            #[cfg(feature = "store-redis")]
            Self::Redis(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
