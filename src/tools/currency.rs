/// Currency Converter Tool
///
/// Converts an amount between two ISO 4217 currencies using a freshly fetched
/// rate table. Every failure the caller can act on (bad arguments, rates API
/// down, unknown code) is returned as a tool-level error result so the calling
/// model sees the message.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::core::protocol::{CallToolRequest, CallToolResult, ListToolsResult, ToolDescription};
use crate::core::server::{CallError, Servlet, ToolRegistry};
use crate::tools::rates::{FetchError, HttpRateSource, RateSource};

pub const TOOL_NAME: &str = "currency-converter";

/// Failures of a single conversion. The display text is what the caller sees.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("No arguments")]
    NoArguments,

    #[error("Invalid argument: {0}")]
    InvalidArguments(String),

    #[error("Failed to fetch latest rates")]
    FetchFailed(#[source] FetchError),

    #[error("Failed to fetch latest rates (2)")]
    FetchRejected,

    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),
}

/// Validated arguments of one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl Conversion {
    /// Extract `amount`, `from` and `to` from the call arguments.
    ///
    /// `amount` may be a JSON number or a string holding one.
    pub fn from_arguments(args: &Map<String, Value>) -> Result<Self, ConversionError> {
        let amount = match args.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
        .ok_or_else(|| ConversionError::InvalidArguments("amount must be a number".into()))?;

        Ok(Self {
            amount,
            from: currency_code(args, "from")?,
            to: currency_code(args, "to")?,
        })
    }
}

fn currency_code(args: &Map<String, Value>, key: &str) -> Result<String, ConversionError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConversionError::InvalidArguments(format!("{key} must be a string")))
}

/// Convert through the snapshot's base currency.
pub fn convert(amount: f64, from_rate: f64, to_rate: f64) -> f64 {
    (amount / from_rate) * to_rate
}

/// Fixed six decimal places, e.g. `90.000000`.
pub fn format_amount(value: f64) -> String {
    format!("{value:.6}")
}

/// The tool's static descriptor.
pub fn describe() -> ListToolsResult {
    ListToolsResult {
        tools: vec![ToolDescription {
            name: TOOL_NAME.to_string(),
            description: "Currency converter".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "amount": {
                        "type": "number",
                        "description": "The amount of currency to convert."
                    },
                    "from": {
                        "type": "string",
                        "description": "The input type of currency to convert, the three letter ISO 4217 code, for example: USD or CAD or EUR."
                    },
                    "to": {
                        "type": "string",
                        "description": "The output type of currency to convert to, the three letter ISO 4217 code, for example: USD or CAD or EUR."
                    }
                },
                "required": ["amount", "to", "from"]
            }),
        }],
    }
}

/// Run one conversion: validate, fetch, look up, compute.
pub async fn run(
    rates: &dyn RateSource,
    arguments: Option<&Map<String, Value>>,
) -> Result<f64, ConversionError> {
    let args = arguments.ok_or(ConversionError::NoArguments)?;
    let conversion = Conversion::from_arguments(args)?;

    let snapshot = rates.latest().await.map_err(ConversionError::FetchFailed)?;
    if !snapshot.success {
        return Err(ConversionError::FetchRejected);
    }

    let from_rate = snapshot
        .rate(&conversion.from)
        .ok_or_else(|| ConversionError::UnknownCurrency(conversion.from.clone()))?;
    let to_rate = snapshot
        .rate(&conversion.to)
        .ok_or_else(|| ConversionError::UnknownCurrency(conversion.to.clone()))?;

    Ok(convert(conversion.amount, from_rate, to_rate))
}

/// Handle a tool invocation, folding every conversion failure into an error result.
pub async fn call(rates: &dyn RateSource, input: CallToolRequest) -> CallToolResult {
    match run(rates, input.params.arguments.as_ref()).await {
        Ok(value) => CallToolResult::text(format_amount(value)),
        Err(e) => {
            match &e {
                ConversionError::FetchFailed(source) => {
                    tracing::warn!(error = %source, "rate fetch failed")
                }
                other => tracing::debug!(error = %other, "conversion rejected"),
            }
            CallToolResult::error(e.to_string())
        }
    }
}

/// Servlet exposing the converter to the tool registry.
pub struct CurrencyConverter {
    rates: Arc<dyn RateSource>,
}

impl CurrencyConverter {
    pub fn new(rates: Arc<dyn RateSource>) -> Self {
        Self { rates }
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::new(Arc::new(HttpRateSource::new()))
    }
}

#[async_trait]
impl Servlet for CurrencyConverter {
    fn describe(&self) -> ListToolsResult {
        describe()
    }

    async fn call(&self, input: CallToolRequest) -> Result<CallToolResult, CallError> {
        if input.params.name != TOOL_NAME {
            return Err(CallError::UnknownTool(input.params.name));
        }
        Ok(call(self.rates.as_ref(), input).await)
    }
}

/// Register the converter backed by the live rates API.
pub fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(CurrencyConverter::default()));
}
