//! `GET /markets` and `GET /markets/{symbol}/book`.

use crate::api::state::AppState;
use crate::book::types::BookLevelView;
use crate::error::{EngineError, ValidationError};
use crate::market::Market;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub async fn list_markets(State(state): State<AppState>) -> Json<Vec<Arc<Market>>> {
    Json(state.registry.list())
}

#[derive(Debug, Deserialize)]
pub struct BookQuery {
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct BookView {
    pub symbol: String,
    pub best_bid: Option<crate::fixed::Fixed18>,
    pub best_ask: Option<crate::fixed::Fixed18>,
    pub bids: Vec<BookLevelView>,
    pub asks: Vec<BookLevelView>,
}

pub async fn market_book(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<BookQuery>,
) -> Result<Json<BookView>, EngineError> {
    let market = state
        .registry
        .get_by_symbol(&symbol)
        .ok_or_else(|| ValidationError::MarketNotAllowed(symbol.clone()))?;
    let book = state
        .book_for(&market.market_id)
        .await
        .ok_or_else(|| ValidationError::MarketNotAllowed(symbol.clone()))?;
    let snapshot = book.snapshot();
    let depth = query.depth.max(1);
    Ok(Json(BookView {
        symbol,
        best_bid: snapshot.best_bid,
        best_ask: snapshot.best_ask,
        bids: snapshot.bids.iter().take(depth).copied().collect(),
        asks: snapshot.asks.iter().take(depth).copied().collect(),
    }))
}
