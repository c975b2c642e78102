use crate::domain::contract::{self, Rejection};
use crate::domain::forecast::Forecast;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_forecast(text: &str) -> Result<Forecast, Rejection> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    contract::validate(&json_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forecast_json() -> String {
        json!({
            "stockCode": "TCS",
            "stockName": "Tata Consultancy Services",
            "currentPrice": "3,225",
            "priceChange": 12.5,
            "priceChangePercentage": "0.39%",
            "predictedPriceIn30Days": 3300,
            "predictedPriceIn90Days": 3400,
            "predictedPriceIn180Days": 3550,
            "signal": "HOLD",
            "accuracy": "80%",
            "result": "Fairly valued versus median P/E."
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_forecast_accepts_plain_json() {
        let forecast = parse_forecast(&forecast_json()).unwrap();
        assert_eq!(forecast.current_price, 3225.0);
        assert_eq!(forecast.accuracy, 80);
    }

    #[test]
    fn parse_forecast_accepts_fenced_json() {
        let fenced = format!("```json\n{}\n```", forecast_json());
        let forecast = parse_forecast(&fenced).unwrap();
        assert_eq!(forecast.stock_code, "TCS");
    }

    #[test]
    fn parse_forecast_rejects_prose() {
        assert!(matches!(
            parse_forecast("I cannot help with that."),
            Err(Rejection::Malformed(_))
        ));
    }
}
