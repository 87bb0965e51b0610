use crate::errors::{EngineError, EngineResult};

/// Trading days used to annualize daily log-return volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annualized historical volatility from a series of daily closes.
///
/// sigma = stdev(ln(P_t / P_{t-1})) * sqrt(252), sample stdev (n - 1).
///
/// Returns are taken between consecutive days first; any return touching a
/// missing, non-finite or non-positive close is dropped, so a gap removes
/// both returns next to it. Needs at least two returns.
pub fn historical_volatility(closes: &[Option<f64>]) -> EngineResult<f64> {
    let usable = |p: Option<f64>| p.filter(|v| v.is_finite() && *v > 0.0);
    let returns: Vec<f64> = closes
        .windows(2)
        .filter_map(|w| Some((usable(w[1])? / usable(w[0])?).ln()))
        .collect();

    if returns.len() < 2 {
        return Err(EngineError::InvalidInput(format!(
            "need at least 2 log returns for volatility, got {}",
            returns.len()
        )));
    }

    let sigma = sample_std_dev(&returns) * TRADING_DAYS_PER_YEAR.sqrt();

    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "estimated volatility must be positive, got {sigma}"
        )));
    }

    Ok(sigma)
}

/// Treasury yields are quoted in percent (4.25 means 4.25%).
#[inline]
pub fn rate_from_treasury_yield(quote: f64) -> EngineResult<f64> {
    if !quote.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "treasury yield must be finite, got {quote}"
        )));
    }
    Ok(quote / 100.0)
}

/// Sample standard deviation (n - 1 denominator). Caller guarantees n >= 2.
#[inline]
fn sample_std_dev(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;

    let mut var_sum: f64 = 0.0;
    for &x in data {
        let d = x - mean;
        var_sum += d * d;
    }

    (var_sum / (n - 1.0)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn some(prices: &[f64]) -> Vec<Option<f64>> {
        prices.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_alternating_returns() {
        // returns: +ln(1.1), -ln(1.1), +ln(1.1), -ln(1.1)
        let closes = [100.0, 110.0, 100.0, 110.0, 100.0];
        let r = 1.1f64.ln();
        // mean 0, sample var = 4 r^2 / 3
        let expected = (4.0 * r * r / 3.0).sqrt() * 252f64.sqrt();
        let sigma = historical_volatility(&some(&closes)).unwrap();
        assert_abs_diff_eq!(sigma, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_series_has_zero_vol() {
        let closes = [100.0; 10];
        assert!(matches!(
            historical_volatility(&some(&closes)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_too_few_points() {
        assert!(historical_volatility(&[]).is_err());
        assert!(historical_volatility(&some(&[100.0])).is_err());
        assert!(historical_volatility(&some(&[100.0, 101.0])).is_err());
    }

    #[test]
    fn test_gap_drops_both_adjacent_returns() {
        // Only 102->99, 99->101 and 101->98.5 survive; nothing bridges a gap
        let gappy = [
            Some(100.0),
            None,
            Some(102.0),
            Some(99.0),
            Some(101.0),
            Some(98.5),
            Some(f64::NAN),
            Some(97.0),
        ];
        let contiguous = some(&[102.0, 99.0, 101.0, 98.5]);
        assert_eq!(
            historical_volatility(&gappy).unwrap(),
            historical_volatility(&contiguous).unwrap()
        );
    }

    #[test]
    fn test_isolated_points_give_no_returns() {
        let closes = [Some(100.0), None, Some(101.0), Some(0.0), Some(102.0)];
        assert!(matches!(
            historical_volatility(&closes),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_scale_invariant() {
        let a = [50.0, 51.0, 49.5, 52.0, 50.5, 53.0];
        let b: Vec<f64> = a.iter().map(|p| p * 1000.0).collect();
        assert_abs_diff_eq!(
            historical_volatility(&some(&a)).unwrap(),
            historical_volatility(&some(&b)).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_treasury_yield_conversion() {
        assert_abs_diff_eq!(rate_from_treasury_yield(4.25).unwrap(), 0.0425, epsilon = 1e-15);
        assert_abs_diff_eq!(rate_from_treasury_yield(-0.3).unwrap(), -0.003, epsilon = 1e-15);
        assert!(rate_from_treasury_yield(f64::NAN).is_err());
    }
}
