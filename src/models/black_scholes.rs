use crate::errors::{EngineError, EngineResult};
use crate::models::{PricingInputs, PricingModel, PricingResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// call = S*Phi(d1) - K*exp(-r*T)*Phi(d2)
/// put  = K*exp(-r*T)*Phi(-d2) - S*Phi(-d1)
///
/// Phi comes from statrs (erf-based). No allocations.
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingModel for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn price(&self, inputs: &PricingInputs) -> EngineResult<PricingResult> {
        inputs.validate()?;

        let PricingInputs {
            spot: s,
            strike: k,
            time_to_maturity: t,
            volatility: sigma,
            risk_free_rate: r,
        } = *inputs;

        let sigma_sqrt_t = sigma * t.sqrt();
        let d1 = ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;
        let discounted_strike = k * (-r * t).exp();

        let call_price = s * self.normal.cdf(d1) - discounted_strike * self.normal.cdf(d2);
        let put_price = discounted_strike * self.normal.cdf(-d2) - s * self.normal.cdf(-d1);

        // Finite inputs can still overflow at extreme magnitudes
        if !call_price.is_finite() || !put_price.is_finite() {
            return Err(EngineError::Model(format!(
                "non-finite price (call={call_price}, put={put_price}) for {inputs:?}"
            )));
        }

        Ok(PricingResult {
            call_price,
            put_price,
        })
    }
}
