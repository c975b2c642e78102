use crate::domain::forecast::Forecast;
use crate::domain::numeric::{to_float, to_int};
use serde::Deserialize;
use serde_json::Value;

/// Loosely typed model output. Numeric fields stay as raw JSON values until
/// they have been through the normalizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmForecast {
    pub stock_code: String,
    pub stock_name: String,
    #[serde(default)]
    pub current_price: Value,
    #[serde(default)]
    pub price_change: Value,
    #[serde(default)]
    pub price_change_percentage: Value,
    #[serde(default)]
    pub predicted_price_in_30_days: Value,
    #[serde(default)]
    pub predicted_price_in_90_days: Value,
    #[serde(default)]
    pub predicted_price_in_180_days: Value,
    pub signal: String,
    #[serde(default)]
    pub accuracy: Value,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Malformed(String),
    InvalidNumericFields { fields: Vec<&'static str> },
}

/// Parses and validates a JSON document produced by the model.
pub fn validate(raw_json: &str) -> Result<Forecast, Rejection> {
    let parsed = serde_json::from_str::<LlmForecast>(raw_json)
        .map_err(|e| Rejection::Malformed(format!("LLM output does not match forecast schema: {e}")))?;
    parsed.validate_and_into_forecast()
}

impl LlmForecast {
    /// All-or-nothing: any numeric field that does not resolve to a finite
    /// number rejects the whole forecast.
    pub fn validate_and_into_forecast(self) -> Result<Forecast, Rejection> {
        let mut invalid = Vec::new();

        let mut float = |name: &'static str, value: &Value| {
            let f = to_float(value);
            if !f.is_finite() {
                invalid.push(name);
            }
            f
        };
        let current_price = float("currentPrice", &self.current_price);
        let price_change = float("priceChange", &self.price_change);
        let price_change_percentage = float("priceChangePercentage", &self.price_change_percentage);
        let predicted_price_in_30_days = float("predictedPriceIn30Days", &self.predicted_price_in_30_days);
        let predicted_price_in_90_days = float("predictedPriceIn90Days", &self.predicted_price_in_90_days);
        let predicted_price_in_180_days =
            float("predictedPriceIn180Days", &self.predicted_price_in_180_days);

        let accuracy = to_int(&self.accuracy).and_then(|i| i32::try_from(i).ok());
        if accuracy.is_none() {
            invalid.push("accuracy");
        }

        let Some(accuracy) = accuracy.filter(|_| invalid.is_empty()) else {
            return Err(Rejection::InvalidNumericFields { fields: invalid });
        };

        Ok(Forecast {
            stock_code: self.stock_code.trim().to_string(),
            stock_name: self.stock_name.trim().to_string(),
            current_price,
            price_change,
            price_change_percentage,
            predicted_price_in_30_days,
            predicted_price_in_90_days,
            predicted_price_in_180_days,
            signal: self.signal,
            accuracy,
            result: self.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "stockCode": "ABCD",
            "stockName": "Abcd Industries Ltd",
            "currentPrice": 1234.5,
            "priceChange": -12.25,
            "priceChangePercentage": -0.98,
            "predictedPriceIn30Days": 1250.0,
            "predictedPriceIn90Days": 1300.0,
            "predictedPriceIn180Days": 1400.0,
            "signal": "BUY",
            "accuracy": 85,
            "result": "Strong ROCE with low leverage."
        })
    }

    #[test]
    fn accepts_native_numbers() {
        let forecast = validate(&valid().to_string()).unwrap();
        assert_eq!(forecast.stock_code, "ABCD");
        assert_eq!(forecast.current_price, 1234.5);
        assert_eq!(forecast.accuracy, 85);
        assert_eq!(forecast.signal, "BUY");
    }

    #[test]
    fn normalizes_formatted_strings() {
        let mut v = valid();
        v["currentPrice"] = json!("1,234.50");
        v["priceChangePercentage"] = json!("-0.98%");
        v["accuracy"] = json!("85%");
        let forecast = validate(&v.to_string()).unwrap();
        assert_eq!(forecast.current_price, 1234.5);
        assert_eq!(forecast.price_change_percentage, -0.98);
        assert_eq!(forecast.accuracy, 85);
    }

    #[test]
    fn rejects_single_bad_numeric_field() {
        let mut v = valid();
        v["accuracy"] = json!("high");
        assert_eq!(
            validate(&v.to_string()),
            Err(Rejection::InvalidNumericFields {
                fields: vec!["accuracy"]
            })
        );
    }

    #[test]
    fn reports_every_bad_field() {
        let mut v = valid();
        v["currentPrice"] = json!("n/a");
        v.as_object_mut().unwrap().remove("predictedPriceIn90Days");
        let Err(Rejection::InvalidNumericFields { fields }) = validate(&v.to_string()) else {
            panic!("expected numeric rejection");
        };
        assert_eq!(fields, vec!["currentPrice", "predictedPriceIn90Days"]);
    }

    #[test]
    fn signal_is_not_enumerated() {
        let mut v = valid();
        v["signal"] = json!("ACCUMULATE");
        assert_eq!(validate(&v.to_string()).unwrap().signal, "ACCUMULATE");
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(validate("{\"stockCode\": "), Err(Rejection::Malformed(_))));
        assert!(matches!(validate("[]"), Err(Rejection::Malformed(_))));
    }

    #[test]
    fn rejects_missing_text_fields() {
        let mut v = valid();
        v.as_object_mut().unwrap().remove("stockName");
        assert!(matches!(validate(&v.to_string()), Err(Rejection::Malformed(_))));
    }
}
