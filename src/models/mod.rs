pub mod black_scholes;
pub mod grid;
pub mod volatility;

use crate::errors::{EngineError, EngineResult};

/// All pricing models implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync required so the grid can fan cells out across threads.
pub trait PricingModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Price a European call and put. Invalid inputs are rejected before any
    /// arithmetic; a success never carries a NaN or infinite price.
    fn price(&self, inputs: &PricingInputs) -> EngineResult<PricingResult>;
}

/// Model inputs for a single European option pair. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricingInputs {
    pub spot: f64,
    pub strike: f64,
    /// Years until expiry
    pub time_to_maturity: f64,
    /// Annualized std-dev of log returns
    pub volatility: f64,
    /// Annualized, continuously compounded
    pub risk_free_rate: f64,
}

impl PricingInputs {
    /// Check spot, strike, time and volatility are finite and strictly
    /// positive, and that the rate is finite (any sign).
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("spot", self.spot),
            ("strike", self.strike),
            ("time_to_maturity", self.time_to_maturity),
            ("volatility", self.volatility),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "{field} must be positive and finite, got {value}"
                )));
            }
        }

        if !self.risk_free_rate.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }

        Ok(())
    }

    /// Same inputs with spot and volatility replaced (one grid cell).
    #[inline]
    pub fn with_spot_and_vol(&self, spot: f64, volatility: f64) -> Self {
        Self {
            spot,
            volatility,
            ..*self
        }
    }
}

/// Call and put prices for one set of inputs. Prices are not clamped, so a
/// deep out-of-the-money leg may come out a hair below zero.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub call_price: f64,
    pub put_price: f64,
}
