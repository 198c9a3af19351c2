use thiserror::Error;

/// Rejections raised while validating caller input, before any model is contacted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("patient name must be between 1 and 100 characters")]
    InvalidName,

    #[error("patient age must be between 0 and 120, got {0}")]
    AgeOutOfRange(i64),

    #[error("CAC score must be a non-negative number, got {0}")]
    InvalidScore(f64),

    #[error("content type must be one of: risk_assessment, lifestyle, medication (got '{0}')")]
    UnknownContentType(String),

    #[error("template name must be between 1 and 100 characters")]
    InvalidTemplateName,

    #[error("template content cannot be empty")]
    EmptyTemplateContent,
}

/// Failures talking to the inference runtime.
#[derive(Error, Debug, Clone)]
pub enum InferenceError {
    #[error("inference request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to inference service at {0}")]
    Connection(String),

    #[error("inference service returned an empty response")]
    EmptyResponse,

    #[error("inference service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("unexpected inference response: {0}")]
    MalformedResponse(String),

    #[error("http client error: {0}")]
    Http(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored row is invalid: {0}")]
    CorruptRow(String),
}

/// Terminal outcome of a generation run that did not produce a record.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("content generation failed with {model}: {source}")]
    Inference {
        model: String,
        #[source]
        source: InferenceError,
    },

    #[error("generation with {requested} failed ({first}); default model {fallback} also failed: {source}")]
    FallbackFailed {
        requested: String,
        first: InferenceError,
        fallback: String,
        #[source]
        source: InferenceError,
    },

    #[error("failed to persist education record: {0}")]
    Storage(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
