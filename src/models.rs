use crate::stats::{Metric, StatisticalSummary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A request for a quantitative run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Model identifier; the configured default when absent
    #[serde(default, alias = "modelId")]
    pub model: Option<String>,
    #[serde(alias = "iterationCount")]
    pub iterations: usize,
    /// Requested concurrency; clamped to [1, 10] by the runner
    #[serde(default)]
    pub batch_size: Option<usize>,
}

/// Provenance of an iteration result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    /// Parsed from a genuine model response
    Success,
    /// Zero-valued stand-in
    Placeholder,
}

/// The six scores a grader returns, each nominally in [0, 100]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuantitativeScores {
    #[serde(deserialize_with = "lenient::number")]
    pub communication_score: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub communication_justification: String,
    #[serde(deserialize_with = "lenient::number")]
    pub persuasiveness_score: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub persuasiveness_justification: String,
    #[serde(deserialize_with = "lenient::number")]
    pub professionalism_score: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub professionalism_justification: String,
    #[serde(deserialize_with = "lenient::number")]
    pub call_objective_score: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub call_objective_justification: String,
    #[serde(deserialize_with = "lenient::number")]
    pub language_quality_score: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub language_quality_justification: String,
    #[serde(deserialize_with = "lenient::number")]
    pub overall_score: f64,
}

/// Occurrences of a class of words (filler, weak)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordUsage {
    #[serde(deserialize_with = "lenient::number")]
    pub count: f64,
    #[serde(deserialize_with = "lenient::list")]
    pub instances: Vec<Value>,
    #[serde(deserialize_with = "lenient::number")]
    pub percentage: f64,
    #[serde(deserialize_with = "lenient::list")]
    pub citation: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentenceStarters {
    #[serde(deserialize_with = "lenient::list")]
    pub most_used: Vec<Value>,
    #[serde(deserialize_with = "lenient::number")]
    pub repetition_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub variety_score: f64,
    #[serde(deserialize_with = "lenient::list")]
    pub citation: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LanguageAnalysis {
    #[serde(deserialize_with = "lenient::section")]
    pub filler_words: WordUsage,
    #[serde(deserialize_with = "lenient::section")]
    pub weak_words: WordUsage,
    #[serde(deserialize_with = "lenient::section")]
    pub sentence_starters: SentenceStarters,
}

/// Field readers for model-written JSON, which is loosely typed.
///
/// Nothing here fails: a value of an unexpected shape reads as the field's
/// default, and `null` always does.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// A number, or a string holding one (`"85"`)
    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64().unwrap_or_default(),
            Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().unwrap_or_default(),
            _ => 0.0,
        })
    }

    /// A string; other scalars keep their JSON text
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// An array; a lone value becomes a one-element list
    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Like [`list`], with every item rendered as text
    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(list(deserializer)?
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect())
    }

    /// A nested object; anything else reads as the default
    pub fn section<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}

/// The outcome of one iteration of a quantitative run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    /// Zero-based index of the iteration within its run
    pub iteration: usize,
    pub status: IterationStatus,
    /// Why a placeholder was substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub quantitative: QuantitativeScores,
    pub language_analysis: LanguageAnalysis,
    /// Any other top-level keys the model returned (qualitative notes, recommendations)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of checking a parsed model response against the iteration schema
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(IterationResult),
    Invalid(String),
}

const RESERVED_KEYS: [&str; 5] = [
    "iteration",
    "status",
    "error",
    "quantitative",
    "languageAnalysis",
];

impl IterationResult {
    /// Deterministic stand-in used whenever a genuine result is unavailable
    pub fn placeholder(iteration: usize, error: Option<String>) -> Self {
        Self {
            iteration,
            status: IterationStatus::Placeholder,
            error,
            quantitative: QuantitativeScores {
                communication_justification: "Sample communication assessment".to_string(),
                persuasiveness_justification: "Sample persuasiveness assessment".to_string(),
                professionalism_justification: "Sample professionalism assessment".to_string(),
                call_objective_justification: "Sample objective assessment".to_string(),
                language_quality_justification: "Sample language quality assessment".to_string(),
                ..QuantitativeScores::default()
            },
            language_analysis: LanguageAnalysis::default(),
            extra: Map::new(),
        }
    }

    /// Check a parsed model response and convert it into a typed result.
    ///
    /// `quantitative` and `languageAnalysis` must both be objects; that is
    /// the only way a response is rejected. Fields inside them are read
    /// leniently and default to zero or empty when missing or malformed.
    pub fn validate(iteration: usize, value: Value) -> Validation {
        let Value::Object(mut object) = value else {
            return Validation::Invalid("response is not a JSON object".to_string());
        };

        let quantitative = match object.remove("quantitative") {
            Some(v @ Value::Object(_)) => v,
            Some(_) => return Validation::Invalid("`quantitative` is not an object".to_string()),
            None => return Validation::Invalid("missing `quantitative`".to_string()),
        };
        let language_analysis = match object.remove("languageAnalysis") {
            Some(v @ Value::Object(_)) => v,
            Some(_) => {
                return Validation::Invalid("`languageAnalysis` is not an object".to_string());
            }
            None => return Validation::Invalid("missing `languageAnalysis`".to_string()),
        };

        let quantitative: QuantitativeScores =
            serde_json::from_value(quantitative).unwrap_or_default();
        let language_analysis: LanguageAnalysis =
            serde_json::from_value(language_analysis).unwrap_or_default();

        object.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        Validation::Valid(Self {
            iteration,
            status: IterationStatus::Success,
            error: None,
            quantitative,
            language_analysis,
            extra: object,
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.status == IterationStatus::Placeholder
    }
}

/// Progress notification emitted after every settled iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Percentage of iterations settled, rounded to the nearest integer
    pub progress: u8,
    pub completed: usize,
    pub total: usize,
    /// One-based index of the batch the iteration belonged to
    pub batch_index: usize,
    pub total_batches: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(
        completed: usize,
        total: usize,
        batch_index: usize,
        total_batches: usize,
        error: Option<String>,
    ) -> Self {
        let progress = if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };

        Self {
            progress,
            completed,
            total,
            batch_index,
            total_batches,
            error,
        }
    }
}

/// Everything a finished quantitative run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResults {
    pub iterations: usize,
    /// One entry per requested iteration, ordered by iteration index
    pub raw_results: Vec<IterationResult>,
    pub statistics: BTreeMap<Metric, StatisticalSummary>,
}

impl EvaluationResults {
    pub fn placeholder_count(&self) -> usize {
        self.raw_results.iter().filter(|r| r.is_placeholder()).count()
    }
}

/// Body of `POST /api/llm-output`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOutputRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOutputResponse {
    pub output: String,
}

/// Body of `POST /api/qualitative-evaluation`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitativeRequest {
    pub original_prompt: String,
    pub llm_output: String,
    pub system_prompt: String,
}

/// The judge's critique of a system/user prompt pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualitativeEvaluation {
    #[serde(deserialize_with = "lenient::text")]
    pub output_quality: String,
    #[serde(deserialize_with = "lenient::text")]
    pub objective_fulfillment: String,
    #[serde(deserialize_with = "lenient::text")]
    pub hallucination_check: String,
    #[serde(deserialize_with = "lenient::text")]
    pub reflection: String,
    #[serde(deserialize_with = "lenient::number")]
    pub overall_score: f64,
    #[serde(deserialize_with = "lenient::strings")]
    pub recommendations: Vec<String>,
    /// Any other keys the judge returned, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QualitativeEvaluation {
    /// Returned when the judge's answer cannot be parsed; the raw text is kept
    /// as the reflection
    pub fn fallback(raw: &str) -> Self {
        let unparsed = "Unable to parse evaluation response".to_string();
        Self {
            output_quality: unparsed.clone(),
            objective_fulfillment: unparsed.clone(),
            hallucination_check: unparsed,
            reflection: raw.to_string(),
            overall_score: 5.0,
            recommendations: vec!["Please try again with a different prompt".to_string()],
            extra: Map::new(),
        }
    }
}
