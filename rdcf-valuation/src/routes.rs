//! HTTP routes for the valuation service.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use rdcf_common::config::TerminalDiscounting;
use rdcf_common::logging::generate_trace_id;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

use crate::data::MarketSnapshot;
use crate::error::ServiceError;
use crate::valuation::{
    OvervaluationResult, ParameterRange, Projection, ValuationParams, ValuationResult,
    PARAMETER_RANGES,
};
use crate::ValuationState;

/// Build the application router.
pub fn build_router(state: Arc<ValuationState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/valuation/defaults", get(get_defaults))
        .route("/api/v1/valuation/intrinsic-pe", post(intrinsic_pe))
        .route("/api/v1/valuation/overvaluation", post(overvaluation))
        .route("/api/v1/valuation/:symbol", post(value_symbol))
        .route("/api/v1/market/:symbol", get(get_market_snapshot))
        .with_state(state)
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub provider: String,
}

#[derive(Debug, Serialize)]
pub struct DefaultsResponse {
    pub params: ValuationParams,
    pub ranges: Vec<ParameterRange>,
    pub round_explicit_cash_flows: bool,
    pub terminal_discounting: TerminalDiscounting,
}

/// Valuation parameters where every field is optional; missing fields take
/// the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamsRequest {
    pub cost_of_capital_pct: Option<f64>,
    pub pre_tax_roce_pct: Option<f64>,
    pub explicit_growth_pct: Option<f64>,
    pub explicit_growth_years: Option<u32>,
    pub fade_period_years: Option<u32>,
    pub terminal_growth_pct: Option<f64>,
}

impl ParamsRequest {
    pub fn resolve(&self, defaults: &ValuationParams) -> ValuationParams {
        ValuationParams {
            cost_of_capital_pct: self.cost_of_capital_pct.unwrap_or(defaults.cost_of_capital_pct),
            pre_tax_roce_pct: self.pre_tax_roce_pct.unwrap_or(defaults.pre_tax_roce_pct),
            explicit_growth_pct: self.explicit_growth_pct.unwrap_or(defaults.explicit_growth_pct),
            explicit_growth_years: self
                .explicit_growth_years
                .unwrap_or(defaults.explicit_growth_years),
            fade_period_years: self.fade_period_years.unwrap_or(defaults.fade_period_years),
            terminal_growth_pct: self.terminal_growth_pct.unwrap_or(defaults.terminal_growth_pct),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    /// Include the year-by-year projection in the response
    #[serde(default)]
    pub ledger: bool,
}

#[derive(Debug, Serialize)]
pub struct IntrinsicPeResponse {
    pub trace_id: String,
    pub params: ValuationParams,
    pub intrinsic_pe: f64,
    /// Intrinsic PE rounded to 2 decimals
    pub display_pe: f64,
    pub total_discounted_value: f64,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
}

impl IntrinsicPeResponse {
    fn new(
        trace_id: String,
        params: ValuationParams,
        result: ValuationResult,
        include_ledger: bool,
    ) -> Self {
        Self {
            trace_id,
            warnings: params.range_warnings(),
            params,
            intrinsic_pe: result.intrinsic_pe,
            display_pe: result.display_pe(),
            total_discounted_value: result.total_discounted_value,
            projection: include_ledger.then_some(result.projection),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OvervaluationRequest {
    pub current_pe: f64,
    pub forward_pe: f64,
    pub intrinsic_pe: f64,
}

#[derive(Debug, Serialize)]
pub struct OvervaluationResponse {
    #[serde(flatten)]
    pub result: OvervaluationResult,
    /// Percentage truncated toward zero, as displayed
    pub display_percent: i64,
}

impl From<OvervaluationResult> for OvervaluationResponse {
    fn from(result: OvervaluationResult) -> Self {
        Self {
            display_percent: result.truncated_percent(),
            result,
        }
    }
}

/// Body of a per-symbol valuation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolValuationRequest {
    #[serde(default)]
    pub params: ParamsRequest,
    /// Replace the pre-tax RoCE with the company's five-year median
    #[serde(default)]
    pub use_historical_roce: bool,
}

#[derive(Debug, Serialize)]
pub struct SymbolValuationResponse {
    pub trace_id: String,
    pub snapshot: MarketSnapshot,
    pub valuation: IntrinsicPeResponse,
    pub overvaluation: OvervaluationResponse,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<ValuationState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "rdcf-valuation".to_string(),
        provider: state.provider.name().to_string(),
    })
}

/// Default parameters and the ranges the input form offers
pub async fn get_defaults(State(state): State<Arc<ValuationState>>) -> Json<DefaultsResponse> {
    let defaults = &state.config.valuation;
    Json(DefaultsResponse {
        params: ValuationParams::from(defaults),
        ranges: PARAMETER_RANGES.to_vec(),
        round_explicit_cash_flows: defaults.round_explicit_cash_flows,
        terminal_discounting: defaults.terminal_discounting,
    })
}

/// Evaluate the growth-fade model for the given parameters
pub async fn intrinsic_pe(
    State(state): State<Arc<ValuationState>>,
    Query(query): Query<LedgerQuery>,
    payload: Result<Json<ParamsRequest>, JsonRejection>,
) -> Result<Json<IntrinsicPeResponse>, ServiceError> {
    let Json(request) = payload?;
    let trace_id = generate_trace_id();
    let span = tracing::info_span!("intrinsic_pe", trace_id = %trace_id);
    let _enter = span.enter();

    let params = request.resolve(&state.default_params());
    let result = state.engine.evaluate(&params.to_config())?;

    tracing::info!(intrinsic_pe = result.intrinsic_pe, "Valuation evaluated");

    Ok(Json(IntrinsicPeResponse::new(
        trace_id,
        params,
        result,
        query.ledger,
    )))
}

/// Score observed multiples against an intrinsic PE
pub async fn overvaluation(
    State(state): State<Arc<ValuationState>>,
    payload: Result<Json<OvervaluationRequest>, JsonRejection>,
) -> Result<Json<OvervaluationResponse>, ServiceError> {
    let Json(request) = payload?;
    let result = state.scorer.score(
        request.current_pe,
        request.forward_pe,
        request.intrinsic_pe,
    )?;

    Ok(Json(result.into()))
}

/// Fetch the fundamentals snapshot for a symbol
pub async fn get_market_snapshot(
    State(state): State<Arc<ValuationState>>,
    Path(symbol): Path<String>,
) -> Result<Json<MarketSnapshot>, ServiceError> {
    let trace_id = generate_trace_id();
    let span = tracing::info_span!("market_snapshot", trace_id = %trace_id, symbol = %symbol);

    let snapshot = state.provider.fetch(&symbol).instrument(span).await?;
    Ok(Json(snapshot))
}

/// Fetch a symbol's fundamentals, evaluate the model and score the multiples
pub async fn value_symbol(
    State(state): State<Arc<ValuationState>>,
    Path(symbol): Path<String>,
    Query(query): Query<LedgerQuery>,
    body: Bytes,
) -> Result<Json<SymbolValuationResponse>, ServiceError> {
    let request: SymbolValuationRequest = optional_json(&body)?;
    let trace_id = generate_trace_id();
    let span = tracing::info_span!("value_symbol", trace_id = %trace_id, symbol = %symbol);

    let snapshot = state
        .provider
        .fetch(&symbol)
        .instrument(span.clone())
        .await?;
    let _enter = span.enter();

    let mut params = request.params.resolve(&state.default_params());
    if request.use_historical_roce {
        params.pre_tax_roce_pct = snapshot.historical_roce;
    }

    let result = state.engine.evaluate(&params.to_config())?;
    let overvaluation = state
        .scorer
        .score(snapshot.current_pe, snapshot.forward_pe, result.intrinsic_pe)?;

    tracing::info!(
        intrinsic_pe = result.intrinsic_pe,
        percent_overvalued = overvaluation.percent_overvalued,
        reference = %overvaluation.reference,
        "Symbol valued"
    );

    Ok(Json(SymbolValuationResponse {
        valuation: IntrinsicPeResponse::new(trace_id.clone(), params, result, query.ledger),
        overvaluation: overvaluation.into(),
        trace_id,
        snapshot,
    }))
}

/// Parse an optional JSON body. An absent or blank body gives the default;
/// anything else must deserialize.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServiceError::InvalidRequest(format!("malformed JSON body: {}", e)))
}
