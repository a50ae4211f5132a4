//! Hard financial metrics from quarterly report text.
//!
//! Best-effort regex extraction of headline figures (INR crore amounts,
//! margin percentages) to give the generator structured anchors alongside
//! the retrieved transcript context. Missing figures stay `None`; the
//! prompt tells the model not to invent numbers for them.

use regex::RegexBuilder;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinancialMetrics {
    pub total_revenue_inr_cr: Option<String>,
    pub net_profit_inr_cr: Option<String>,
    pub operating_margin_pct: Option<String>,
}

impl FinancialMetrics {
    pub fn is_empty(&self) -> bool {
        self.total_revenue_inr_cr.is_none()
            && self.net_profit_inr_cr.is_none()
            && self.operating_margin_pct.is_none()
    }
}

/// Metrics for one source document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentMetrics {
    pub url: String,
    pub metrics: FinancialMetrics,
}

const REVENUE_PATTERNS: &[&str] = &[
    r"total\s+revenue[^0-9₹]{0,20}₹?\s*([\d,]+\.?\d*)\s*crore",
    r"revenue[^0-9₹]{0,20}₹?\s*([\d,]+\.?\d*)\s*crore",
];

const NET_PROFIT_PATTERNS: &[&str] = &[
    r"net\s+profit[^0-9₹]{0,20}₹?\s*([\d,]+\.?\d*)\s*crore",
    r"profit\s+after\s+tax[^0-9₹]{0,20}₹?\s*([\d,]+\.?\d*)\s*crore",
];

const MARGIN_PATTERNS: &[&str] = &[
    r"operating\s+margin[^\d]{0,10}([\d.]+)\s*%",
    r"ebit\s+margin[^\d]{0,10}([\d.]+)\s*%",
];

pub fn extract_financial_metrics(text: &str) -> FinancialMetrics {
    FinancialMetrics {
        total_revenue_inr_cr: find_first(REVENUE_PATTERNS, text),
        net_profit_inr_cr: find_first(NET_PROFIT_PATTERNS, text),
        operating_margin_pct: find_first(MARGIN_PATTERNS, text),
    }
}

fn find_first(patterns: &[&str], text: &str) -> Option<String> {
    for pattern in patterns {
        let Ok(re) = RegexBuilder::new(pattern).case_insensitive(true).build() else {
            continue;
        };
        if let Some(captures) = re.captures(text) {
            if let Some(value) = captures.get(1) {
                return Some(value.as_str().to_string());
            }
        }
    }
    None
}
