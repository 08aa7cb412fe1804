use crate::client::ChatRequest;
use crate::config::{ProviderConfig, QuantitativeConfig};
use crate::evaluation::Evaluator;
use crate::models::{EvaluationRequest, EvaluationResults, IterationResult, ProgressEvent};
use crate::stats::aggregate;
use crate::stream::RunEvent;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Upper bound on iterations in flight at once
pub const MAX_BATCH_SIZE: usize = 10;

/// Clamp a requested batch size into `[1, MAX_BATCH_SIZE]`
pub fn clamp_batch_size(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BATCH_SIZE)
}

/// Split `iterations` into consecutive index ranges of at most `batch_size`
pub fn plan_batches(iterations: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = clamp_batch_size(batch_size);
    (0..iterations.div_ceil(batch_size))
        .map(|batch| {
            let start = batch * batch_size;
            start..(start + batch_size).min(iterations)
        })
        .collect()
}

/// Schedules the iterations of a quantitative run in bounded batches
pub struct Runner {
    evaluator: Arc<Evaluator>,
    default_model: String,
    temperature: f32,
    default_batch_size: usize,
    batch_pause: Duration,
}

impl Runner {
    pub fn new(
        evaluator: Arc<Evaluator>,
        provider: &ProviderConfig,
        quantitative: &QuantitativeConfig,
    ) -> Self {
        Self {
            evaluator,
            default_model: provider.default_model.clone(),
            temperature: provider.temperature,
            default_batch_size: quantitative.default_batch_size,
            batch_pause: quantitative.batch_pause(),
        }
    }

    /// The chat request every iteration of `request` sends
    pub fn chat_request(&self, request: &EvaluationRequest) -> ChatRequest {
        ChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            system_prompt: request.system_prompt.clone(),
            user_prompt: request.user_prompt.clone(),
            temperature: self.temperature,
            json_response: false,
        }
    }

    /// Run every iteration of `request`, reporting on `events`.
    ///
    /// Batches run strictly one after another; the iterations inside a batch
    /// run concurrently and each one settles to a success or a placeholder.
    /// A progress event follows every settled iteration, then the final
    /// results and the done marker. Results are ordered by iteration index.
    pub async fn run(
        &self,
        request: &EvaluationRequest,
        api_key: &str,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) -> EvaluationResults {
        let chat = self.chat_request(request);
        let total = request.iterations;
        let batch_size = clamp_batch_size(request.batch_size.unwrap_or(self.default_batch_size));
        let batches = plan_batches(total, batch_size);
        let total_batches = batches.len();

        info!(
            model = %chat.model,
            iterations = total,
            batch_size,
            total_batches,
            "Starting quantitative evaluation"
        );

        let mut results: Vec<IterationResult> = Vec::with_capacity(total);
        let mut completed = 0;

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let batch_num = batch_index + 1;
            info!(batch = batch_num, total_batches, "Launching batch {:?}", batch);

            let chat = &chat;
            let mut pending: FuturesUnordered<_> = batch
                .map(move |iteration| async move {
                    let outcome =
                        AssertUnwindSafe(self.evaluator.run_iteration(iteration, chat, api_key))
                            .catch_unwind()
                            .await;
                    (iteration, outcome)
                })
                .collect();

            while let Some((iteration, outcome)) = pending.next().await {
                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        error!(batch = batch_num, iteration = iteration + 1, "Error processing batch");
                        IterationResult::placeholder(iteration, Some(format!("Batch {} failed", batch_num)))
                    }
                };

                completed += 1;
                let progress = ProgressEvent::new(
                    completed,
                    total,
                    batch_num,
                    total_batches,
                    result.error.clone(),
                );
                results.push(result);
                emit(events, RunEvent::Progress(progress));
            }

            if batch_num < total_batches {
                sleep(self.batch_pause).await;
            }
        }

        results.sort_by_key(|r| r.iteration);
        let final_results = aggregate(total, results);

        info!(
            iterations = total,
            placeholders = final_results.placeholder_count(),
            "Quantitative evaluation finished"
        );

        emit(events, RunEvent::Final(final_results.clone()));
        emit(events, RunEvent::Done);

        final_results
    }
}

/// Forward an event without waiting on the listener; a departed listener
/// does not stop the run. A run emits `iterations + 2` events, so the
/// unbounded queue stays small.
fn emit(events: &mpsc::UnboundedSender<RunEvent>, event: RunEvent) {
    if events.send(event).is_err() {
        debug!("Event listener closed");
    }
}
