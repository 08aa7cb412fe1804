use crate::client::{ChatModel, ChatRequest};
use crate::config::{JudgeConfig, QuantitativeConfig};
use crate::error::ProviderError;
use crate::extract::extract_json;
use crate::models::{IterationResult, QualitativeEvaluation, QualitativeRequest, Validation};
use crate::prompts::{JUDGE_SYSTEM_PROMPT, judge_user_prompt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Backoff schedule for rate-limited calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl From<&QuantitativeConfig> for RetryPolicy {
    fn from(config: &QuantitativeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt + 1`: `2^attempt * base_delay` plus
    /// jitter drawn from `[0, max_jitter)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter = self.max_jitter.mul_f64(rand::random::<f64>());
        backoff + jitter
    }
}

/// Runs single model calls for both kinds of evaluation
pub struct Evaluator {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
    judge: JudgeConfig,
}

impl Evaluator {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy, judge: JudgeConfig) -> Self {
        Self {
            model,
            retry,
            judge,
        }
    }

    /// Plain generation for the prompt under test
    pub async fn generate_output(
        &self,
        request: &ChatRequest,
        api_key: &str,
    ) -> Result<String, ProviderError> {
        self.model.complete(request, api_key).await
    }

    /// Run one quantitative iteration.
    ///
    /// Rate-limited calls are retried up to `max_retries` times with
    /// exponential backoff. Any other failure, and any output that does not
    /// parse into the iteration schema, yields a placeholder. Never fails.
    pub async fn run_iteration(
        &self,
        iteration: usize,
        request: &ChatRequest,
        api_key: &str,
    ) -> IterationResult {
        let mut attempt = 0;
        loop {
            match self.model.complete(request, api_key).await {
                Ok(output) => return Self::parse_iteration(iteration, &output),
                Err(err) if err.is_rate_limited() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        iteration = iteration + 1,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        iteration = iteration + 1,
                        attempt = attempt + 1,
                        error = %err,
                        "Model call failed, using placeholder"
                    );
                    return IterationResult::placeholder(iteration, Some(err.to_string()));
                }
            }
        }
    }

    /// Parse and validate one iteration's output; malformed output is not retried
    fn parse_iteration(iteration: usize, output: &str) -> IterationResult {
        let parsed = match extract_json(output) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(iteration = iteration + 1, "Parse error: {}", err);
                return IterationResult::placeholder(iteration, Some(err.to_string()));
            }
        };

        match IterationResult::validate(iteration, parsed) {
            Validation::Valid(result) => {
                debug!(iteration = iteration + 1, "Iteration parsed");
                result
            }
            Validation::Invalid(reason) => {
                warn!(iteration = iteration + 1, %reason, "Unexpected response shape");
                IterationResult::placeholder(iteration, Some(reason))
            }
        }
    }

    /// Ask the judge model to critique a system/user prompt pair given the
    /// output they produced
    pub async fn judge_prompts(
        &self,
        request: &QualitativeRequest,
        api_key: &str,
    ) -> Result<QualitativeEvaluation, ProviderError> {
        let chat = ChatRequest {
            model: self.judge.model.clone(),
            system_prompt: JUDGE_SYSTEM_PROMPT.to_string(),
            user_prompt: judge_user_prompt(
                &request.system_prompt,
                &request.original_prompt,
                &request.llm_output,
            ),
            temperature: self.judge.temperature,
            json_response: true,
        };

        let content = self.model.complete(&chat, api_key).await?;
        Ok(Self::parse_judgement(&content))
    }

    /// Any recovered JSON object is accepted as the judgement, loosely typed
    /// fields included; only output with no object in it gets the fallback
    fn parse_judgement(content: &str) -> QualitativeEvaluation {
        let parsed = extract_json(content)
            .ok()
            .and_then(|value| serde_json::from_value(value).ok());

        match parsed {
            Some(evaluation) => evaluation,
            None => {
                warn!("Could not parse judge response, returning fallback");
                QualitativeEvaluation::fallback(content)
            }
        }
    }
}
