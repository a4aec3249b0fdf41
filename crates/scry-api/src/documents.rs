//! Handler for `GET /documents`.

use axum::{Json, extract::State};
use scry_core::{ledger::SearchLedger, types::Document};

use crate::{ApiError, AppState};

/// `GET /documents` — the bootstrap listing.
pub async fn list<L>(
  State(state): State<AppState<L>>,
) -> Result<Json<Vec<Document>>, ApiError>
where
  L: SearchLedger,
{
  let documents = state
    .ledger
    .list_documents()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(documents))
}
