use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{ForecastAgent, ForecastRequest, TracingAuditSink};
use crate::cache::{DocumentCache, DocumentFetcher};
use crate::core::config::Settings;
use crate::core::errors::{ForecastError, Result};
use crate::llm::{ChatMessage, ChatOptions, LlmProvider};

const VALID_FORECAST: &str = r#"{
    "company": "Acme IT Services",
    "period_analyzed": ["Q1 FY26"],
    "financial_trends": {
        "revenue": "increasing, driven by BFSI demand",
        "net_profit": "stable",
        "operating_margin": "improving"
    },
    "management_themes": ["GenAI ramp"],
    "risks": ["macro softness"],
    "opportunities": ["large deal pipeline"],
    "qualitative_forecast_next_quarter": "Modest sequential growth expected next quarter.",
    "confidence": {"level": "medium", "reasons": ["transcript coverage"]}
}"#;

/// Serves canned payloads per URL and counts network calls.
struct MapFetcher {
    pages: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MapFetcher {
    fn new(pages: &[(&str, &[u8])]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ForecastError::fetch(url, "unreachable"))
    }
}

/// Deterministic keyword-count embeddings plus scripted chat replies.
/// Once the script runs out, the last reply repeats.
struct ScriptedProvider {
    replies: Vec<Result<String>>,
    chat_calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies,
            chat_calls: AtomicUsize::new(0),
        }
    }

    fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    fn clone_reply(reply: &Result<String>) -> Result<String> {
        match reply {
            Ok(s) => Ok(s.clone()),
            Err(e) => Err(ForecastError::Generation(e.to_string())),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _model_id: &str,
        _options: &ChatOptions,
    ) -> Result<String> {
        let call = self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(call)
            .or_else(|| self.replies.last())
            .expect("scripted provider needs at least one reply");
        Self::clone_reply(reply)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>> {
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                vec![
                    lower.matches("revenue").count() as f32,
                    lower.matches("margin").count() as f32,
                    lower.matches("attrition").count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

struct Harness {
    agent: ForecastAgent,
    fetcher: Arc<MapFetcher>,
    provider: Arc<ScriptedProvider>,
    _cache_dir: tempfile::TempDir,
}

fn harness(fetcher: MapFetcher, provider: ScriptedProvider) -> Harness {
    let mut settings = Settings::default();
    settings.rag.chunk_size = 80;
    settings.rag.chunk_overlap = 10;
    settings.rag.max_context_length = 2000;

    let cache_dir = tempfile::tempdir().expect("tempdir");
    let fetcher = Arc::new(fetcher);
    let provider = Arc::new(provider);
    let cache = Arc::new(
        DocumentCache::new(cache_dir.path().to_path_buf(), fetcher.clone()).expect("cache"),
    );

    let agent = ForecastAgent::new(
        settings,
        cache,
        provider.clone(),
        Arc::new(TracingAuditSink),
    );
    Harness {
        agent,
        fetcher,
        provider,
        _cache_dir: cache_dir,
    }
}

fn report_body() -> Vec<u8> {
    // Three distinct topics, each long enough for its own chunk at the
    // test chunk size of 80 characters.
    let text = "Total revenue of ₹ 64,479 crore this quarter, with revenue growth of 8 percent \
                led by BFSI and retail demand across markets. \
                Operating margin stood at 24.5 % supported by pricing discipline and improved \
                utilisation across delivery centres. \
                Attrition eased to 12 percent while headcount additions resumed across \
                engineering and consulting practices.";
    text.as_bytes().to_vec()
}

#[tokio::test]
async fn scenario_financial_report_produces_grounded_forecast() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = ForecastRequest::new(
        "What was revenue growth?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec![],
    );
    let response = h.agent.run(request).await.expect("forecast");

    assert!(!response.qualitative_forecast_next_quarter.is_empty());
    assert!(!response.sources.is_empty());
    assert!(response.warnings.is_empty());
    assert_eq!(response.model_used, "llama3.2");
    assert_eq!(h.provider.chat_calls(), 1);
}

#[tokio::test]
async fn scenario_all_urls_unreachable_fails_with_no_documents() {
    let h = harness(
        MapFetcher::new(&[]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://down.example.com/a.txt".to_string()],
        vec!["https://down.example.com/b.txt".to_string()],
    );
    let err = h.agent.run(request).await.expect_err("must fail");

    match err {
        ForecastError::NoDocumentsAvailable(detail) => {
            assert!(detail.contains("a.txt"));
            assert!(detail.contains("b.txt"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // No generation happens for a failed request.
    assert_eq!(h.provider.chat_calls(), 0);
}

#[tokio::test]
async fn scenario_malformed_output_twice_fails_after_one_retry() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::always("The outlook is positive, trust me."),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec![],
    );
    let err = h.agent.run(request).await.expect_err("must fail");

    assert!(matches!(err, ForecastError::MalformedOutput(_)));
    assert_eq!(h.provider.chat_calls(), 2);
}

#[tokio::test]
async fn scenario_resubmission_hits_cache_with_identical_ranking() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = || {
        ForecastRequest::new(
            "What was revenue growth?",
            vec!["https://example.com/q1-report.txt".to_string()],
            vec![],
        )
    };

    let first = h.agent.run(request()).await.expect("first run");
    let calls_after_first = h.fetcher.calls();
    let second = h.agent.run(request()).await.expect("second run");

    // Zero additional network calls, identical retrieval ranking.
    assert_eq!(h.fetcher.calls(), calls_after_first);
    assert_eq!(first.sources, second.sources);
}

#[tokio::test]
async fn partial_fetch_failure_proceeds_with_warning() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec!["https://down.example.com/call.txt".to_string()],
    );
    let response = h.agent.run(request).await.expect("forecast");

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("call.txt"));
    assert!(!response.sources.is_empty());
}

#[tokio::test]
async fn generation_failure_retries_once_with_halved_context() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::new(vec![
            Err(ForecastError::Generation("backend overloaded".to_string())),
            Ok(VALID_FORECAST.to_string()),
        ]),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec![],
    );
    let response = h.agent.run(request).await.expect("retry should recover");

    assert_eq!(h.provider.chat_calls(), 2);
    assert!(!response.qualitative_forecast_next_quarter.is_empty());
}

#[tokio::test]
async fn generation_failure_twice_is_fatal() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::new(vec![Err(ForecastError::Generation(
            "backend overloaded".to_string(),
        ))]),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec![],
    );
    let err = h.agent.run(request).await.expect_err("must fail");

    assert!(matches!(err, ForecastError::Generation(_)));
    assert_eq!(h.provider.chat_calls(), 2);
}

#[tokio::test]
async fn reformat_retry_recovers_a_parsable_forecast() {
    let h = harness(
        MapFetcher::new(&[("https://example.com/q1-report.txt", &report_body())]),
        ScriptedProvider::new(vec![
            Ok("Sure! Here it is, in plain words.".to_string()),
            Ok(VALID_FORECAST.to_string()),
        ]),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec![],
    );
    let response = h.agent.run(request).await.expect("reformat should recover");

    assert_eq!(h.provider.chat_calls(), 2);
    assert_eq!(response.company, "Acme IT Services");
}

#[tokio::test]
async fn empty_request_is_rejected() {
    let h = harness(
        MapFetcher::new(&[]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = ForecastRequest::new("Outlook?", vec![], vec![]);
    let err = h.agent.run(request).await.expect_err("must fail");
    assert!(matches!(err, ForecastError::NoDocumentsAvailable(_)));
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn unextractable_document_is_dropped_with_warning() {
    let h = harness(
        MapFetcher::new(&[
            ("https://example.com/q1-report.txt", &report_body()[..]),
            ("https://example.com/blank.html", b"<html><body>  </body></html>"),
        ]),
        ScriptedProvider::always(VALID_FORECAST),
    );

    let request = ForecastRequest::new(
        "Outlook?",
        vec!["https://example.com/q1-report.txt".to_string()],
        vec!["https://example.com/blank.html".to_string()],
    );
    let response = h.agent.run(request).await.expect("forecast");

    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("blank.html"));
}
