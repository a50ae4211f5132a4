use serde::{Deserialize, Serialize};

use crate::rag::Provenance;

/// One forecast request. Created per API call by the external request
/// layer, consumed once, never persisted by the core.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    #[serde(default = "new_request_id")]
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub financial_doc_urls: Vec<String>,
    #[serde(default)]
    pub transcript_urls: Vec<String>,
}

impl ForecastRequest {
    pub fn new(
        query: impl Into<String>,
        financial_doc_urls: Vec<String>,
        transcript_urls: Vec<String>,
    ) -> Self {
        Self {
            id: new_request_id(),
            query: query.into(),
            financial_doc_urls,
            transcript_urls,
        }
    }

    pub fn url_count(&self) -> usize {
        self.financial_doc_urls.len() + self.transcript_urls.len()
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialTrends {
    #[serde(default = "unclear")]
    pub revenue: String,
    #[serde(default = "unclear")]
    pub net_profit: String,
    #[serde(default = "unclear")]
    pub operating_margin: String,
}

impl Default for FinancialTrends {
    fn default() -> Self {
        Self {
            revenue: unclear(),
            net_profit: unclear(),
            operating_margin: unclear(),
        }
    }
}

fn unclear() -> String {
    "unclear".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(default = "low")]
    pub level: String,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Default for Confidence {
    fn default() -> Self {
        Self {
            level: low(),
            reasons: Vec::new(),
        }
    }
}

fn low() -> String {
    "low".to_string()
}

/// The model-produced part of a forecast, parsed from generation output.
/// Everything defaults except the forecast text itself; its absence means
/// the output did not match the schema.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelForecast {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub period_analyzed: Vec<String>,
    #[serde(default)]
    pub financial_trends: FinancialTrends,
    #[serde(default)]
    pub management_themes: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    pub qualitative_forecast_next_quarter: String,
    #[serde(default)]
    pub confidence: Confidence,
}

/// Structured response, immutable after construction.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub request_id: String,
    pub company: String,
    pub period_analyzed: Vec<String>,
    pub financial_trends: FinancialTrends,
    pub management_themes: Vec<String>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    pub qualitative_forecast_next_quarter: String,
    pub confidence: Confidence,
    /// Exact chunk provenances included in the prompt context.
    pub sources: Vec<Provenance>,
    /// Sources dropped along the way and why.
    pub warnings: Vec<String>,
    pub model_used: String,
}

impl ForecastResponse {
    pub fn from_model(
        request_id: String,
        forecast: ModelForecast,
        sources: Vec<Provenance>,
        warnings: Vec<String>,
        model_used: String,
    ) -> Self {
        Self {
            request_id,
            company: forecast.company,
            period_analyzed: forecast.period_analyzed,
            financial_trends: forecast.financial_trends,
            management_themes: forecast.management_themes,
            risks: forecast.risks,
            opportunities: forecast.opportunities,
            qualitative_forecast_next_quarter: forecast.qualitative_forecast_next_quarter,
            confidence: forecast.confidence,
            sources,
            warnings,
            model_used,
        }
    }
}
