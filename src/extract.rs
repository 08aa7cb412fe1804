//! Recovering a JSON object from free-form model output.

use crate::error::ExtractionError;
use serde_json::Value;

const FENCE: &str = "```";

/// Parse the JSON a model was asked to return.
///
/// Tried in order, first success wins: the whole text, the interior of each
/// fenced code block (optionally tagged `json`) that holds an object, then
/// the span from the first `{` to the last `}`. The result is not
/// shape-checked.
pub fn extract_json(text: &str) -> Result<Value, ExtractionError> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let fenced = fenced_blocks(text)
        .filter_map(|block| serde_json::from_str::<Value>(block).ok())
        .find(Value::is_object);
    if let Some(value) = fenced {
        return Ok(value);
    }

    embedded_object(text)
}

/// Interior of every span between consecutive ``` fences, in order, with a
/// leading `json` tag removed
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    let segments: Vec<&str> = text.split(FENCE).collect();
    // the text after the last fence is not enclosed
    let enclosed = segments.len().saturating_sub(1);

    segments
        .into_iter()
        .take(enclosed)
        .skip(1)
        .map(|inner| inner.strip_prefix("json").unwrap_or(inner).trim())
}

fn embedded_object(text: &str) -> Result<Value, ExtractionError> {
    let start = text.find('{').ok_or(ExtractionError)?;
    let end = text.rfind('}').ok_or(ExtractionError)?;
    if end <= start {
        return Err(ExtractionError);
    }

    serde_json::from_str(&text[start..=end]).map_err(|_| ExtractionError)
}
