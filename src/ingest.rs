use tracing::{info, instrument};

use crate::convert;
use crate::error::TrackError;
use crate::grammar::{GrammarSet, ValidationResult};
use crate::store::GeoStore;

/// Ingestion pipeline: payload guards, grammar check, forward conversion,
/// then exactly one insert into the store.
#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn ingest<S: GeoStore>(
    grammars: &GrammarSet,
    store: &S,
    body: &[u8],
    max_bytes: usize,
) -> Result<(), TrackError> {
    // The HTTP layer enforces the same ceiling; this guard keeps the
    // pipeline safe when called from anywhere else.
    if body.len() > max_bytes {
        return Err(TrackError::Input(format!(
            "document of {} bytes exceeds the {max_bytes} byte limit",
            body.len()
        )));
    }
    let document = std::str::from_utf8(body)
        .map_err(|_| TrackError::Input("request body is not UTF-8 text".to_string()))?;
    if document.trim().is_empty() {
        return Err(TrackError::Input("request body is empty".to_string()));
    }

    if let ValidationResult::Invalid(diagnostics) = grammars.check(document) {
        return Err(TrackError::Grammar(diagnostics));
    }

    // Grammar said yes, so a parse failure past this point is a defect, not
    // a client error; `TrackError::Conversion` maps to a server error.
    let collection = convert::to_feature_collection(document)?;
    if collection.features.is_empty() {
        return Err(TrackError::Input(
            "document contains no geolocated content".to_string(),
        ));
    }

    store.insert(&collection).await?;
    info!(
        features = collection.features.len(),
        "inserted track document into the store"
    );
    Ok(())
}
