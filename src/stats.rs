//! Descriptive statistics over a run's iteration results.

use crate::models::{EvaluationResults, IterationResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Summary of one metric across every iteration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalSummary {
    pub mean: f64,
    pub median: f64,
    /// Every value sharing the highest frequency, ascending
    pub mode: Vec<f64>,
    pub standard_deviation: f64,
    /// Population variance (divides by N)
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

impl StatisticalSummary {
    /// Summary reported for a metric with no samples
    pub fn zero() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            mode: Vec::new(),
            standard_deviation: 0.0,
            variance: 0.0,
            min: 0.0,
            max: 0.0,
            range: 0.0,
        }
    }
}

/// Summarize `samples`; `None` when there are none
pub fn summarize(samples: &[f64]) -> Option<StatisticalSummary> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = calculate_mean(samples);
    let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    Some(StatisticalSummary {
        mean,
        median: calculate_median(&sorted),
        mode: calculate_mode(&sorted),
        standard_deviation: variance.sqrt(),
        variance,
        min,
        max,
        range: max - min,
    })
}

fn calculate_mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn calculate_median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// All values tied at the maximum frequency. Expects sorted input.
fn calculate_mode(sorted: &[f64]) -> Vec<f64> {
    let mut frequency: HashMap<u64, usize> = HashMap::new();
    for &value in sorted {
        // fold -0.0 into 0.0
        let value = if value == 0.0 { 0.0 } else { value };
        *frequency.entry(value.to_bits()).or_insert(0) += 1;
    }

    let Some(&max_frequency) = frequency.values().max() else {
        return Vec::new();
    };

    let mut mode: Vec<f64> = frequency
        .into_iter()
        .filter(|&(_, count)| count == max_frequency)
        .map(|(bits, _)| f64::from_bits(bits))
        .collect();
    mode.sort_by(f64::total_cmp);
    mode
}

/// The nine metrics summarized for every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    CommunicationScore,
    PersuasivenessScore,
    ProfessionalismScore,
    CallObjectiveScore,
    LanguageQualityScore,
    OverallScore,
    FillerWordsPercentage,
    WeakWordsPercentage,
    VarietyScore,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::CommunicationScore,
        Metric::PersuasivenessScore,
        Metric::ProfessionalismScore,
        Metric::CallObjectiveScore,
        Metric::LanguageQualityScore,
        Metric::OverallScore,
        Metric::FillerWordsPercentage,
        Metric::WeakWordsPercentage,
        Metric::VarietyScore,
    ];

    /// Wire name, as used for keys in the results' statistics map
    pub fn name(self) -> &'static str {
        match self {
            Metric::CommunicationScore => "communicationScore",
            Metric::PersuasivenessScore => "persuasivenessScore",
            Metric::ProfessionalismScore => "professionalismScore",
            Metric::CallObjectiveScore => "callObjectiveScore",
            Metric::LanguageQualityScore => "languageQualityScore",
            Metric::OverallScore => "overallScore",
            Metric::FillerWordsPercentage => "fillerWordsPercentage",
            Metric::WeakWordsPercentage => "weakWordsPercentage",
            Metric::VarietyScore => "varietyScore",
        }
    }

    /// Read this metric from one iteration
    pub fn value(self, result: &IterationResult) -> f64 {
        let scores = &result.quantitative;
        let language = &result.language_analysis;
        match self {
            Metric::CommunicationScore => scores.communication_score,
            Metric::PersuasivenessScore => scores.persuasiveness_score,
            Metric::ProfessionalismScore => scores.professionalism_score,
            Metric::CallObjectiveScore => scores.call_objective_score,
            Metric::LanguageQualityScore => scores.language_quality_score,
            Metric::OverallScore => scores.overall_score,
            Metric::FillerWordsPercentage => language.filler_words.percentage,
            Metric::WeakWordsPercentage => language.weak_words.percentage,
            Metric::VarietyScore => language.sentence_starters.variety_score,
        }
    }
}

/// Combine a run's iteration results with a summary for every tracked metric
pub fn aggregate(iterations: usize, raw_results: Vec<IterationResult>) -> EvaluationResults {
    let statistics: BTreeMap<Metric, StatisticalSummary> = Metric::ALL
        .into_iter()
        .map(|metric| {
            let samples: Vec<f64> = raw_results.iter().map(|r| metric.value(r)).collect();
            let summary = summarize(&samples).unwrap_or_else(StatisticalSummary::zero);
            (metric, summary)
        })
        .collect();

    EvaluationResults {
        iterations,
        raw_results,
        statistics,
    }
}
