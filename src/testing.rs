//! Scripted chat models shared by the unit tests.

use crate::client::{ChatModel, ChatRequest};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// A well-formed grader response with the given overall score
pub fn graded_output(overall: f64) -> String {
    json!({
        "quantitative": {
            "communicationScore": 80,
            "communicationJustification": "Opened with a clear agenda",
            "persuasivenessScore": 70,
            "professionalismScore": 90,
            "callObjectiveScore": 50,
            "languageQualityScore": 75,
            "overallScore": overall
        },
        "languageAnalysis": {
            "fillerWords": { "count": 2, "instances": ["um", "like"], "percentage": 1.5, "citation": ["line 3"] },
            "weakWords": { "count": 1, "instances": ["maybe"], "percentage": 0.5, "citation": ["line 7"] },
            "sentenceStarters": { "mostUsed": ["So"], "repetitionCount": 3, "varietyScore": 65, "citation": [] }
        }
    })
    .to_string()
}

pub fn rate_limited() -> ProviderError {
    ProviderError::Api {
        status: 429,
        message: "Rate limit reached for requests".to_string(),
        code: Some("rate_limit_exceeded".to_string()),
    }
}

pub fn server_error() -> ProviderError {
    ProviderError::Api {
        status: 500,
        message: "The server had an error while processing your request".to_string(),
        code: None,
    }
}

/// Replies from a fixed script, then with [`graded_output`] once it runs out
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest, _api_key: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(graded_output(70.0)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Start(usize),
    End(usize),
}

/// Records call start/end order and concurrency; call `n` takes
/// `(n % 3 + 1) * 10ms` and calls listed in `panic_on` panic mid-flight
#[derive(Default)]
pub struct RecordingModel {
    next_call: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    events: Mutex<Vec<CallEvent>>,
    panic_on: Vec<usize>,
}

impl RecordingModel {
    pub fn panicking_on(panic_on: Vec<usize>) -> Self {
        Self {
            panic_on,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, _request: &ChatRequest, _api_key: &str) -> Result<String, ProviderError> {
        let call = self.next_call.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        self.events.lock().unwrap().push(CallEvent::Start(call));

        tokio::time::sleep(Duration::from_millis((call as u64 % 3 + 1) * 10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(CallEvent::End(call));
        if self.panic_on.contains(&call) {
            panic!("simulated orchestration failure on call {call}");
        }
        Ok(graded_output(call as f64))
    }
}
