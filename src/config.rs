use crate::errors::{EngineError, EngineResult};
use crate::models::grid::MAX_GRID_CELLS;

/// Shortest and longest lookback window accepted for volatility estimation.
pub const MIN_LOOKBACK_DAYS: u32 = 30;
pub const MAX_LOOKBACK_DAYS: u32 = 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub grid_size: usize,
    /// Largest grid_size a request may ask for
    pub max_grid_size: usize,
    pub market_data_base_url: String,
    pub default_ticker: String,
    pub risk_free_symbol: String,
    pub vol_lookback_days: u32,
    pub default_volatility: f64,
    pub default_risk_free_rate: f64,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let server_port = var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| EngineError::Config(format!("SERVER_PORT: {e}")))?;

        let grid_size = var_or("GRID_SIZE", "10")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("GRID_SIZE: {e}")))?;
        if grid_size < 2 {
            return Err(EngineError::Config(format!(
                "GRID_SIZE: must be at least 2, got {grid_size}"
            )));
        }

        let max_grid_size = var_or("MAX_GRID_SIZE", "200")
            .parse::<usize>()
            .map_err(|e| EngineError::Config(format!("MAX_GRID_SIZE: {e}")))?;
        let within_cap = max_grid_size
            .checked_mul(max_grid_size)
            .is_some_and(|cells| cells <= MAX_GRID_CELLS);
        if !within_cap {
            return Err(EngineError::Config(format!(
                "MAX_GRID_SIZE: {max_grid_size} squared exceeds {MAX_GRID_CELLS} cells"
            )));
        }
        if grid_size > max_grid_size {
            return Err(EngineError::Config(format!(
                "GRID_SIZE: {grid_size} exceeds MAX_GRID_SIZE {max_grid_size}"
            )));
        }

        let vol_lookback_days = var_or("VOL_LOOKBACK_DAYS", "90")
            .parse::<u32>()
            .map_err(|e| EngineError::Config(format!("VOL_LOOKBACK_DAYS: {e}")))?;
        if !(MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&vol_lookback_days) {
            return Err(EngineError::Config(format!(
                "VOL_LOOKBACK_DAYS: must be within {MIN_LOOKBACK_DAYS}..={MAX_LOOKBACK_DAYS}, got {vol_lookback_days}"
            )));
        }

        let default_volatility = var_or("DEFAULT_VOLATILITY", "0.2")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_VOLATILITY: {e}")))?;
        if !(default_volatility.is_finite() && default_volatility > 0.0) {
            return Err(EngineError::Config(format!(
                "DEFAULT_VOLATILITY: must be positive, got {default_volatility}"
            )));
        }

        let default_risk_free_rate = var_or("DEFAULT_RISK_FREE_RATE", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("DEFAULT_RISK_FREE_RATE: {e}")))?;
        if !default_risk_free_rate.is_finite() {
            return Err(EngineError::Config(
                "DEFAULT_RISK_FREE_RATE: must be finite".into(),
            ));
        }

        Ok(Self {
            server_port,
            grid_size,
            max_grid_size,
            market_data_base_url: var_or(
                "MARKET_DATA_BASE_URL",
                "https://query1.finance.yahoo.com",
            ),
            default_ticker: var_or("DEFAULT_TICKER", "AAPL").to_uppercase(),
            risk_free_symbol: var_or("RISK_FREE_SYMBOL", "^TNX"),
            vol_lookback_days,
            default_volatility,
            default_risk_free_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> EngineResult<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.server_port, 3001);
        assert_eq!(cfg.grid_size, 10);
        assert_eq!(cfg.max_grid_size, 200);
        assert_eq!(cfg.vol_lookback_days, 90);
        assert_eq!(cfg.default_ticker, "AAPL");
        assert_eq!(cfg.risk_free_symbol, "^TNX");
        assert_eq!(cfg.market_data_base_url, "https://query1.finance.yahoo.com");
        assert_eq!(cfg.default_volatility, 0.2);
        assert_eq!(cfg.default_risk_free_rate, 0.05);
    }

    #[test]
    fn test_overrides() {
        let cfg = config_from(&[
            ("SERVER_PORT", "8080"),
            ("GRID_SIZE", "25"),
            ("VOL_LOOKBACK_DAYS", "180"),
            ("DEFAULT_RISK_FREE_RATE", "-0.005"),
            ("DEFAULT_TICKER", "msft"),
        ])
        .unwrap();
        assert_eq!(cfg.default_ticker, "MSFT");
        assert_eq!(cfg.server_port, 8080);
        assert_eq!(cfg.grid_size, 25);
        assert_eq!(cfg.vol_lookback_days, 180);
        assert_eq!(cfg.default_risk_free_rate, -0.005);
    }

    #[test]
    fn test_grid_size_below_two_rejected() {
        let err = config_from(&[("GRID_SIZE", "1")]).unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.contains("GRID_SIZE")));
    }

    #[test]
    fn test_grid_size_limits() {
        let cfg = config_from(&[("MAX_GRID_SIZE", "50"), ("GRID_SIZE", "50")]).unwrap();
        assert_eq!(cfg.max_grid_size, 50);

        let err = config_from(&[("MAX_GRID_SIZE", "50"), ("GRID_SIZE", "51")]).unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.starts_with("GRID_SIZE")));

        let err = config_from(&[("MAX_GRID_SIZE", "100000")]).unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.starts_with("MAX_GRID_SIZE")));
    }

    #[test]
    fn test_unparseable_port_rejected() {
        let err = config_from(&[("SERVER_PORT", "http")]).unwrap_err();
        assert!(matches!(err, EngineError::Config(ref m) if m.starts_with("SERVER_PORT")));
    }

    #[test]
    fn test_lookback_out_of_range_rejected() {
        assert!(config_from(&[("VOL_LOOKBACK_DAYS", "7")]).is_err());
        assert!(config_from(&[("VOL_LOOKBACK_DAYS", "400")]).is_err());
    }

    #[test]
    fn test_zero_default_volatility_rejected() {
        assert!(config_from(&[("DEFAULT_VOLATILITY", "0")]).is_err());
    }
}
