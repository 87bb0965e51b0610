use crate::config::{AppConfig, MAX_LOOKBACK_DAYS, MIN_LOOKBACK_DAYS};
use crate::errors::{EngineError, EngineResult};
use crate::feeds::yahoo::Quote;
use crate::models::grid::{build_grid, SensitivityGrid};
use crate::models::volatility::historical_volatility;
use crate::models::{PricingInputs, PricingModel, PricingResult};
use crate::state::{AppState, CounterSnapshot, Counters};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Error body returned by every route: `{"error": "..."}`.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_upstream_error() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Count and log a failed request before it becomes a response.
fn reject(state: &AppState, route: &str, e: EngineError) -> ApiError {
    Counters::bump(&state.counters.requests_failed, 1);
    if e.is_client_error() {
        tracing::debug!(route, error = %e, "request rejected");
    } else {
        tracing::warn!(route, error = %e, "request failed");
    }
    ApiError(e)
}

fn respond<T>(state: &AppState, route: &'static str, result: EngineResult<T>) -> ApiResult<T> {
    result.map(Json).map_err(|e| reject(state, route, e))
}

/// `Query` whose rejection uses the same JSON error body as the handlers.
pub struct ApiQuery<T>(pub T);

impl<T> FromRequestParts<Arc<AppState>> for ApiQuery<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(reject(
                state,
                parts.uri.path(),
                EngineError::InvalidInput(rejection.body_text()),
            )),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct GridQuery {
    pub spot: f64,
    pub strike: f64,
    pub time_to_maturity: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub grid_size: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DashboardQuery {
    pub ticker: Option<String>,
    pub strike: f64,
    pub time_to_maturity: f64,
    pub volatility: Option<f64>,
    pub risk_free_rate: Option<f64>,
    #[serde(default)]
    pub estimate_volatility: bool,
    #[serde(default)]
    pub estimate_rate: bool,
    pub lookback_days: Option<u32>,
    pub grid_size: Option<usize>,
}

/// Where a dashboard input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Estimated,
    Input,
    Default,
}

#[derive(Debug, serde::Serialize)]
pub struct DashboardResponse {
    pub quote: Quote,
    pub inputs: PricingInputs,
    pub volatility_source: ValueSource,
    pub rate_source: ValueSource,
    pub result: PricingResult,
    pub grid: SensitivityGrid,
}

/// Requested grid size, or the configured default, within `MAX_GRID_SIZE`.
fn grid_size_for(cfg: &AppConfig, requested: Option<usize>) -> EngineResult<usize> {
    let grid_size = requested.unwrap_or(cfg.grid_size);
    if grid_size > cfg.max_grid_size {
        return Err(EngineError::InvalidArgument(format!(
            "grid_size {grid_size} exceeds the maximum of {}",
            cfg.max_grid_size
        )));
    }
    Ok(grid_size)
}

/// Run the grid sweep off the async workers.
async fn grid_blocking(
    state: &Arc<AppState>,
    inputs: PricingInputs,
    grid_size: usize,
) -> EngineResult<SensitivityGrid> {
    let model = Arc::clone(&state.model);
    let grid = tokio::task::spawn_blocking(move || build_grid(&*model, &inputs, grid_size))
        .await
        .map_err(|e| EngineError::Model(format!("grid task: {e}")))??;

    let (rows, cols) = grid.dimensions();
    Counters::bump(&state.counters.grids_built, 1);
    Counters::bump(&state.counters.grid_cells_priced, (rows * cols) as u64);
    Ok(grid)
}

/// Pick the estimate if it succeeded, else the caller's value, else the default.
fn resolve(
    state: &AppState,
    what: &'static str,
    estimate: Option<EngineResult<f64>>,
    input: Option<f64>,
    default: f64,
) -> (f64, ValueSource) {
    match estimate {
        Some(Ok(value)) => return (value, ValueSource::Estimated),
        Some(Err(e)) => {
            Counters::bump(&state.counters.estimates_fallen_back, 1);
            tracing::warn!(input = what, error = %e, "estimate failed, falling back");
        }
        None => {}
    }
    match input {
        Some(value) => (value, ValueSource::Input),
        None => (default, ValueSource::Default),
    }
}

/// GET /api/price -- single call/put pair
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    ApiQuery(inputs): ApiQuery<PricingInputs>,
) -> ApiResult<PricingResult> {
    let result = state.model.price(&inputs);
    if result.is_ok() {
        Counters::bump(&state.counters.prices_computed, 1);
    }
    respond(&state, "price", result)
}

/// GET /api/grid -- spot x volatility sensitivity grid
pub async fn get_grid(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<GridQuery>,
) -> ApiResult<SensitivityGrid> {
    let grid_size = match grid_size_for(&state.config, q.grid_size) {
        Ok(n) => n,
        Err(e) => return Err(reject(&state, "grid", e)),
    };
    let inputs = PricingInputs {
        spot: q.spot,
        strike: q.strike,
        time_to_maturity: q.time_to_maturity,
        volatility: q.volatility,
        risk_free_rate: q.risk_free_rate,
    };
    let result = grid_blocking(&state, inputs, grid_size).await;
    respond(&state, "grid", result)
}

/// GET /api/quote/{ticker} -- live spot quote
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> ApiResult<Quote> {
    let result = state.market_data.fetch_quote(&ticker.to_uppercase()).await;
    if result.is_ok() {
        Counters::bump(&state.counters.quotes_fetched, 1);
    }
    respond(&state, "quote", result)
}

/// GET /api/dashboard -- quote, resolved inputs, prices and grid in one call
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<DashboardQuery>,
) -> ApiResult<DashboardResponse> {
    let result = build_dashboard(&state, q).await;
    respond(&state, "dashboard", result)
}

async fn build_dashboard(state: &Arc<AppState>, q: DashboardQuery) -> EngineResult<DashboardResponse> {
    let cfg = &state.config;
    let ticker = q
        .ticker
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| cfg.default_ticker.clone());
    // Checked before any market data is fetched
    let grid_size = grid_size_for(cfg, q.grid_size)?;
    let lookback = q
        .lookback_days
        .unwrap_or(cfg.vol_lookback_days)
        .clamp(MIN_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS);

    let vol_estimate = async {
        if !q.estimate_volatility {
            return None;
        }
        let estimate = state
            .market_data
            .fetch_closes(&ticker, lookback)
            .await
            .and_then(|closes| historical_volatility(&closes));
        Some(estimate)
    };
    let rate_estimate = async {
        if !q.estimate_rate {
            return None;
        }
        Some(state.market_data.fetch_risk_free_rate(&cfg.risk_free_symbol).await)
    };

    let (quote, vol_estimate, rate_estimate) = tokio::join!(
        state.market_data.fetch_quote(&ticker),
        vol_estimate,
        rate_estimate
    );

    // No spot price means nothing to price
    let quote = quote?;
    Counters::bump(&state.counters.quotes_fetched, 1);

    let (volatility, volatility_source) = resolve(
        state,
        "volatility",
        vol_estimate,
        q.volatility,
        cfg.default_volatility,
    );
    let (risk_free_rate, rate_source) = resolve(
        state,
        "risk_free_rate",
        rate_estimate,
        q.risk_free_rate,
        cfg.default_risk_free_rate,
    );

    let inputs = PricingInputs {
        spot: quote.price,
        strike: q.strike,
        time_to_maturity: q.time_to_maturity,
        volatility,
        risk_free_rate,
    };

    let result = state.model.price(&inputs)?;
    Counters::bump(&state.counters.prices_computed, 1);
    let grid = grid_blocking(state, inputs, grid_size).await?;

    tracing::info!(
        ticker = %quote.symbol,
        spot = inputs.spot,
        strike = inputs.strike,
        volatility,
        risk_free_rate,
        call = result.call_price,
        put = result.put_price,
        "dashboard priced"
    );

    Ok(DashboardResponse {
        quote,
        inputs,
        volatility_source,
        rate_source,
        result,
        grid,
    })
}

/// GET /api/counters -- request counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
