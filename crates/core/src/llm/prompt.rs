use crate::domain::forecast::SIGNALS;
use crate::scrape::sections::RawSections;
use serde_json::{json, Value};

pub const REQUIRED_FIELDS: [&str; 11] = [
    "stockCode",
    "stockName",
    "currentPrice",
    "priceChange",
    "priceChangePercentage",
    "predictedPriceIn30Days",
    "predictedPriceIn90Days",
    "predictedPriceIn180Days",
    "signal",
    "accuracy",
    "result",
];

pub fn system_instruction() -> String {
    [
        "Role: You are an expert Fundamental Equity Analyst specializing in the Indian Stock Market.",
        "Your goal is to analyze data extracted from a Screener.in company page to determine price movement potential.",
        "",
        "Task:",
        "1. Data Extraction: Identify the stock name, code, current price, and historical performance.",
        "2. Analysis: Evaluate the stock across 5 dimensions: Profitability (ROCE/ROE), Growth (Sales vs Profit), \
         Solvency (Debt/Equity/Pledging), Valuation (P/E vs Median/Industry), and Quality of Earnings (CFO vs Net Profit).",
        "3. Prediction: Based on the valuation gap (Current P/E vs Median P/E) and the PEG ratio, \
         calculate estimated price targets for 30, 90, and 180 days.",
        "",
        "Schema Mapping Instructions:",
        "- stockCode & stockName: Extract from the page header.",
        "- currentPrice: The 'Current Price' value, as a JSON number.",
        "- priceChange: Price change in a day, available in the company info section, as a JSON number.",
        "- priceChangePercentage: Percentage change in a day, as a JSON number without a percent sign.",
        "- signal: Must be \"STRONG BUY\", \"BUY\", \"HOLD\", \"SELL\", or \"STRONG SELL\".",
        "- accuracy: An integer percentage (e.g. 85) based on the availability and consistency of 10-year historical data.",
        "- predictedPriceInXDays: Calculate these by applying the growth rate and valuation mean reversion.",
        "- result: Provide a concise 3-4 sentence fundamental justification for the signal.",
        "All numeric fields must be JSON numbers, never strings with commas or percent signs.",
        "",
        "Constraint: Do not provide financial advice. All predictions are mathematical projections \
         based on the provided fundamental metrics.",
    ]
    .join("\n")
}

pub fn user_message(sections: &RawSections) -> String {
    sections
        .labeled()
        .map(|(label, text)| format!("{label}: {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Response schema in the provider's OpenAPI subset.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "required": REQUIRED_FIELDS,
        "propertyOrdering": REQUIRED_FIELDS,
        "properties": {
            "stockCode": {"type": "STRING"},
            "stockName": {"type": "STRING"},
            "currentPrice": {"type": "NUMBER"},
            "priceChange": {"type": "NUMBER"},
            "priceChangePercentage": {"type": "NUMBER"},
            "predictedPriceIn30Days": {"type": "NUMBER"},
            "predictedPriceIn90Days": {"type": "NUMBER"},
            "predictedPriceIn180Days": {"type": "NUMBER"},
            "signal": {"type": "STRING", "format": "enum", "enum": SIGNALS},
            "accuracy": {"type": "NUMBER"},
            "result": {"type": "STRING"}
        }
    })
}
