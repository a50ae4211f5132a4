pub mod metrics;

pub use metrics::{extract_financial_metrics, DocumentMetrics, FinancialMetrics};
