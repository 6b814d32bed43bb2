use thiserror::Error;

use crate::convert::ConversionError;
use crate::grammar::GrammarDiagnostics;
use crate::store::StoreError;

/// Request-scoped failure taxonomy. Each variant maps to one HTTP outcome in
/// `net::response`; startup failures are not represented here, they abort the
/// process before requests are accepted.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Malformed coordinates, non-text body, oversized or empty payload.
    #[error("{0}")]
    Input(String),

    /// The document conforms to neither accepted grammar version.
    #[error("input doesn't conform to either the v1.1 or the v1.0 track grammar")]
    Grammar(GrammarDiagnostics),

    /// The store already holds a document with identical geometry.
    #[error("a track with identical geometry is already stored")]
    Conflict,

    /// A grammar-accepted document the converter could not handle. A defect,
    /// not a client error.
    #[error("accepted document could not be converted: {0}")]
    Conversion(#[from] ConversionError),

    /// The store could not be reached or failed mid-call.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TrackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateGeometry => TrackError::Conflict,
            other => TrackError::Store(other),
        }
    }
}
