//! Prompt template and loose JSON recovery for generation output.

use regex::Regex;
use serde_json::Value;

use crate::core::errors::{ForecastError, Result};

use super::types::ModelForecast;

/// Hard character cap on the user prompt; the tail is kept because the
/// structured pieces come last.
const MAX_PROMPT_CHARS: usize = 12_000;

pub const SYSTEM_PROMPT: &str = r#"You are a financial forecasting agent.

Your goal:
Given structured financial metrics and key management-commentary snippets
retrieved from quarterly reports and earnings-call transcripts, produce a
concise, investor-style qualitative outlook for the next quarter.

Ground rules:
- Use ONLY facts that can be reasonably inferred from the provided inputs.
- If a specific metric is missing, do NOT invent an exact number; speak in
  directions and trends: "increasing", "declining", "stable", "volatile".
- Be specific and differentiated across revenue, profit and margin.

Output format:
- Return a single JSON object, nothing else. No markdown fences, no prose.
- The JSON MUST follow this schema and key order:

{
  "company": "string",
  "period_analyzed": ["string"],
  "financial_trends": {
     "revenue": "string",
     "net_profit": "string",
     "operating_margin": "string"
  },
  "management_themes": ["string"],
  "risks": ["string"],
  "opportunities": ["string"],
  "qualitative_forecast_next_quarter": "string",
  "confidence": {
     "level": "low|medium|high",
     "reasons": ["string"]
  }
}

Do NOT add keys outside this schema or leave fields empty; if something is
genuinely unknown, say so explicitly in the string."#;

pub const REFORMAT_INSTRUCTION: &str = "Your previous reply did not parse as the required JSON \
object. Reply again with ONLY the JSON object matching the schema from the system prompt - no \
markdown, no commentary.";

pub fn build_user_prompt(query: &str, metrics_json: &str, context: &str) -> String {
    let parts = [
        format!("Task: {query}"),
        String::new(),
        "Structured financial metrics extracted from quarterly financial statements \
         (already parsed for you):"
            .to_string(),
        metrics_json.to_string(),
        String::new(),
        "Key management commentary retrieved from the supplied documents, ranked by \
         relevance, with source citations:"
            .to_string(),
        context.to_string(),
        String::new(),
        "Now, using ONLY the information above and following the schema from the system \
         prompt, produce the final JSON forecast object."
            .to_string(),
    ];
    let prompt = parts.join("\n");

    // Keep the tail on overflow: the structured pieces sit at the end.
    let total = prompt.chars().count();
    if total > MAX_PROMPT_CHARS {
        prompt.chars().skip(total - MAX_PROMPT_CHARS).collect()
    } else {
        prompt
    }
}

/// Recover a JSON object from a model reply. Handles pure JSON, JSON with
/// surrounding prose and JSON wrapped in markdown fences.
pub fn parse_json_loose(text: &str) -> Result<Value> {
    let mut candidate = text.trim().to_string();

    if let Ok(fence) = Regex::new(r"(?si)```(?:json)?(.*?)```") {
        if let Some(captures) = fence.captures(&candidate) {
            if let Some(inner) = captures.get(1) {
                candidate = inner.as_str().trim().to_string();
            }
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let (Some(open), Some(close)) = (candidate.find('{'), candidate.rfind('}')) {
        if open < close {
            if let Ok(value) = serde_json::from_str::<Value>(&candidate[open..=close]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(ForecastError::MalformedOutput(
        "no JSON object found in model output".to_string(),
    ))
}

/// Parse a model reply into the forecast schema.
pub fn parse_forecast(text: &str) -> Result<ModelForecast> {
    let value = parse_json_loose(text)?;
    serde_json::from_value(value)
        .map_err(|e| ForecastError::MalformedOutput(format!("output does not match schema: {e}")))
}
