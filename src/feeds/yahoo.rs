use crate::errors::{EngineError, EngineResult};
use crate::models::volatility::rate_from_treasury_yield;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Yahoo-Finance compatible chart API client. All methods return Result,
/// never panic. The caller decides whether a failure falls back or aborts.
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

/// Latest price snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub price: f64,
    pub as_of: String,
}

// Response shape (trimmed):
// {
//   "chart": {
//     "result": [{
//       "meta": { "symbol": "AAPL", "currency": "USD", "longName": "Apple Inc.",
//                 "regularMarketPrice": 229.87, "regularMarketTime": 1760731200 },
//       "timestamp": [1760385600, ...],
//       "indicators": { "quote": [{ "close": [247.66, null, ...] }] }
//     }],
//     "error": null
//   }
// }

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<QuoteIndicator>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteIndicator {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Daily closes in session order. Null entries stay as `None` so the
    /// volatility estimate never takes a return across a gap.
    pub fn closes(&self) -> Vec<Option<f64>> {
        self.indicators
            .quote
            .first()
            .map(|q| q.close.clone())
            .unwrap_or_default()
    }

    #[inline]
    pub fn last_close(&self) -> Option<f64> {
        self.indicators
            .quote
            .first()
            .and_then(|q| q.close.iter().rev().flatten().next().copied())
    }

    /// Build a quote: market price from meta, else the last close.
    pub fn to_quote(&self, requested: &str) -> EngineResult<Quote> {
        let price = self
            .meta
            .regular_market_price
            .or_else(|| self.last_close())
            .ok_or_else(|| EngineError::MarketData(format!("no price for {requested}")))?;

        if price <= 0.0 || !price.is_finite() {
            return Err(EngineError::MarketData(format!(
                "invalid price for {requested}: {price}"
            )));
        }

        let as_of = self
            .meta
            .regular_market_time
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(chrono::Utc::now)
            .to_rfc3339();

        Ok(Quote {
            symbol: self
                .meta
                .symbol
                .clone()
                .unwrap_or_else(|| requested.to_string()),
            name: self.meta.long_name.clone().or_else(|| self.meta.short_name.clone()),
            currency: self.meta.currency.clone(),
            price,
            as_of,
        })
    }
}

/// Decode a chart response body into its first result.
pub fn parse_chart(body: &str, symbol: &str) -> EngineResult<ChartResult> {
    let resp: ChartResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::Parse(format!("chart {symbol}: {e}")))?;

    if let Some(err) = resp.chart.error {
        return Err(EngineError::MarketData(format!(
            "{symbol}: {} {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    resp.chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| EngineError::MarketData(format!("no chart data for {symbol}")))
}

impl MarketDataClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .pool_max_idle_per_host(4)
                .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str, query: &[(&str, String)]) -> EngineResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| EngineError::Config(format!("market data base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| EngineError::Config(format!("market data base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("interval", "1d");
        Ok(url)
    }

    async fn get_chart(&self, symbol: &str, query: &[(&str, String)]) -> EngineResult<ChartResult> {
        let url = self.chart_url(symbol, query)?;
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::MarketDataApi {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        parse_chart(&body, symbol)
    }

    /// Latest price for `symbol`.
    pub async fn fetch_quote(&self, symbol: &str) -> EngineResult<Quote> {
        let chart = self.get_chart(symbol, &[("range", "5d".to_string())]).await?;
        let quote = chart.to_quote(symbol)?;
        tracing::debug!(symbol = %quote.symbol, price = quote.price, "quote fetched");
        Ok(quote)
    }

    /// Daily closes over the last `days` calendar days.
    pub async fn fetch_closes(&self, symbol: &str, days: u32) -> EngineResult<Vec<Option<f64>>> {
        let now = chrono::Utc::now();
        let start = now - chrono::Duration::days(i64::from(days));
        let query = [
            ("period1", start.timestamp().to_string()),
            ("period2", now.timestamp().to_string()),
        ];
        let closes = self.get_chart(symbol, &query).await?.closes();
        tracing::debug!(symbol, days, points = closes.len(), "price history fetched");
        Ok(closes)
    }

    /// Risk-free rate from the last close of a treasury yield index.
    pub async fn fetch_risk_free_rate(&self, symbol: &str) -> EngineResult<f64> {
        let chart = self.get_chart(symbol, &[("range", "5d".to_string())]).await?;
        let quote = chart
            .last_close()
            .or(chart.meta.regular_market_price)
            .ok_or_else(|| EngineError::MarketData(format!("no yield for {symbol}")))?;
        rate_from_treasury_yield(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPL: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "currency": "USD",
                    "longName": "Apple Inc.",
                    "shortName": "Apple",
                    "regularMarketPrice": 229.87,
                    "regularMarketTime": 1760731200
                },
                "timestamp": [1760385600, 1760472000, 1760558400, 1760644800],
                "indicators": { "quote": [{ "close": [247.66, null, 249.34, 252.29] }] }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_closes_keep_gaps() {
        let chart = parse_chart(AAPL, "AAPL").unwrap();
        assert_eq!(
            chart.closes(),
            vec![Some(247.66), None, Some(249.34), Some(252.29)]
        );
        assert_eq!(chart.last_close(), Some(252.29));
    }

    #[test]
    fn test_quote_prefers_market_price() {
        let quote = parse_chart(AAPL, "AAPL").unwrap().to_quote("AAPL").unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.name.as_deref(), Some("Apple Inc."));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
        assert_eq!(quote.price, 229.87);
        assert!(quote.as_of.starts_with("2025-10-17"), "as_of={}", quote.as_of);
    }

    #[test]
    fn test_quote_falls_back_to_last_close() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"^TNX"},
            "indicators":{"quote":[{"close":[4.01,4.05,null]}]}}],"error":null}}"#;
        let chart = parse_chart(body, "^TNX").unwrap();
        let quote = chart.to_quote("^TNX").unwrap();
        assert_eq!(quote.price, 4.05);
        assert!(quote.name.is_none());
    }

    #[test]
    fn test_missing_price_is_market_data_error() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"XYZ"}}],"error":null}}"#;
        let chart = parse_chart(body, "XYZ").unwrap();
        assert!(chart.closes().is_empty());
        assert!(matches!(chart.to_quote("XYZ"), Err(EngineError::MarketData(_))));
    }

    #[test]
    fn test_api_error_is_market_data_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found",
            "description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(body, "NOPE").unwrap_err();
        assert!(matches!(err, EngineError::MarketData(ref m) if m.contains("Not Found")));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(parse_chart("<html>", "AAPL"), Err(EngineError::Parse(_))));
    }

    #[test]
    fn test_chart_url_encodes_symbol() {
        let client = MarketDataClient::new("https://query1.finance.yahoo.com/");
        let url = client.chart_url("^TNX", &[("range", "5d".to_string())]).unwrap();
        assert_eq!(url.host_str(), Some("query1.finance.yahoo.com"));
        assert!(url.path().starts_with("/v8/finance/chart/"));
        assert!(url.path().ends_with("TNX"));
        assert_eq!(url.query(), Some("range=5d&interval=1d"));
    }
}
