use thiserror::Error;

/// Errors produced while parsing and validating a composite data identifier.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Structural failure: wrong field count, bad token, non-numeric field
    #[error("malformed identifier: {reason}")]
    Malformed { reason: String },

    /// A field required by the requested modality was left empty
    #[error("missing field '{field}' (required for this modality)")]
    MissingField { field: &'static str },

    /// The specimen is not present in the metadata registry
    #[error("unknown specimen: {specimen_id}")]
    UnknownSpecimen { specimen_id: String },

    /// Syntactically valid, but not offered by this specimen's metadata
    #[error("unsupported {field} '{value}' (allowed: {})", .allowed.join(", "))]
    UnsupportedCombination {
        field: &'static str,
        value: String,
        allowed: Vec<String>,
    },
}

/// Errors from the storage backend adapters.
///
/// Kept `Clone` so in-flight open results can be shared between waiters
/// (singleflight), which is why `Io` carries a message rather than the
/// source `std::io::Error`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O error while reading the backing store
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested box lies entirely outside the volume
    #[error("origin {origin:?} out of bounds for volume {volume:?}")]
    OutOfBounds { origin: [i64; 3], volume: [u64; 3] },

    /// No dataset exists for the requested resolution level / channel
    #[error("no dataset for level {level}, channel {channel}")]
    DatasetMissing { level: u32, channel: u32 },

    /// The backing file exists but its contents are invalid
    #[error("corrupt store at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// The store uses a layout or codec this reader does not implement
    #[error("unsupported store feature: {reason}")]
    Unsupported { reason: String },
}

/// Errors from the wire encoder.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// Encoding not registered for this payload kind.
    ///
    /// The parser validates encodings against the registry before extraction,
    /// so hitting this indicates a parser/registry desynchronization bug.
    #[error("encoding '{encoding}' is not implemented for this payload")]
    UnsupportedEncoding { encoding: String },

    /// The codec itself failed
    #[error("encode failed: {message}")]
    Encode { message: String },
}

/// Errors from the tile extractor, already classified for the caller.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Valid request, but no data at that coordinate / region
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// I/O or decode failure inside the backing store (data integrity class)
    #[error("storage failure: {0}")]
    Storage(StoreError),

    /// Encoder rejected the payload (internal invariant violation)
    #[error("encoder failure: {0}")]
    Encode(#[from] EncodeError),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<StoreError> for ExtractError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfBounds { .. } | StoreError::DatasetMissing { .. } => {
                ExtractError::NotFound {
                    reason: err.to_string(),
                }
            }
            other => ExtractError::Storage(other),
        }
    }
}

/// Top-level error for a single data request.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl DataError {
    /// Whether this error is a not-found-class result (vs. a client error or
    /// an internal failure). Used by the HTTP layer for status mapping.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DataError::Parse(ParseError::UnknownSpecimen { .. })
                | DataError::Extract(ExtractError::NotFound { .. })
        )
    }
}
