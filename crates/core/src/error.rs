/// All errors a cloud service client can return through the narrow
/// [`crate::client`] interfaces.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with a non-success HTTP status.
    #[error("{operation} returned http status {status}")]
    Http {
        operation: &'static str,
        status: u16,
    },

    /// The request never produced an HTTP answer (DNS, connect, timeout).
    #[error("{operation} transport failure: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// The service answered but the body did not parse as expected.
    #[error("{operation} returned a malformed response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

/// A discovery query failed terminally: every retry attempt was consumed.
///
/// This fails the whole discovery run; there is no partial-page skipping.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ServiceError,
    },
}

/// Errors raised by the backup ledger.
///
/// Load-side errors reject the whole file, never individual rows: a
/// partial or garbled ledger must not drive a rollback.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot access ledger {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger {path} has no header row")]
    Empty { path: String },

    #[error("ledger {path} is missing required column '{column}'")]
    MissingColumn {
        path: String,
        column: &'static str,
    },

    #[error("ledger {path} row {row}: {message}")]
    MalformedRow {
        path: String,
        row: usize,
        message: String,
    },
}
