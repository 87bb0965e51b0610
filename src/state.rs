use crate::config::AppConfig;
use crate::feeds::yahoo::MarketDataClient;
use crate::models::black_scholes::BlackScholes;
use crate::models::PricingModel;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Shared Application State ──

/// Shared across all handlers via Arc. Everything here is either immutable
/// after startup or lock-free.
pub struct AppState {
    pub config: AppConfig,
    pub market_data: MarketDataClient,
    pub model: Arc<dyn PricingModel>,
    pub counters: Counters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let market_data = MarketDataClient::new(&config.market_data_base_url);
        Arc::new(Self {
            config,
            market_data,
            model: Arc::new(BlackScholes::new()),
            counters: Counters::default(),
        })
    }
}

// ── Performance Counters (lock-free) ──

#[derive(Default)]
pub struct Counters {
    pub prices_computed: AtomicU64,
    pub grids_built: AtomicU64,
    pub grid_cells_priced: AtomicU64,
    pub quotes_fetched: AtomicU64,
    pub estimates_fallen_back: AtomicU64,
    pub requests_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub prices_computed: u64,
    pub grids_built: u64,
    pub grid_cells_priced: u64,
    pub quotes_fetched: u64,
    pub estimates_fallen_back: u64,
    pub requests_failed: u64,
}

impl Counters {
    #[inline]
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            prices_computed: self.prices_computed.load(Ordering::Relaxed),
            grids_built: self.grids_built.load(Ordering::Relaxed),
            grid_cells_priced: self.grid_cells_priced.load(Ordering::Relaxed),
            quotes_fetched: self.quotes_fetched.load(Ordering::Relaxed),
            estimates_fallen_back: self.estimates_fallen_back.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }
}
