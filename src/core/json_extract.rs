//! Helpers for turning free-form model replies into JSON values.
//!
//! Models often wrap JSON in markdown fences or add a sentence before it,
//! and they are loose about numbers ("$1,200", "14 days"). The readers here
//! fill defaults instead of failing on every such variation.

use crate::utils::error::{ProcureError, Result};
use serde_json::Value;

const EXCERPT_LEN: usize = 200;

/// Removes a surrounding ```` ``` ```` / ```` ```json ```` fence if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // 跳過語言標記（```json）
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn outermost_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

pub fn extract_json(text: &str) -> Result<Value> {
    let stripped = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }

    // 先試開頭括號出現較早的那一種，`[{...}]` 才不會只取到內層物件
    let mut candidates = [('{', '}'), ('[', ']')];
    candidates.sort_by_key(|(open, _)| stripped.find(*open).unwrap_or(usize::MAX));

    for (open, close) in candidates {
        if let Some(span) = outermost_span(stripped, open, close) {
            if let Ok(value) = serde_json::from_str::<Value>(span) {
                tracing::debug!("Recovered JSON from surrounding prose");
                return Ok(value);
            }
        }
    }

    let excerpt: String = stripped.chars().take(EXCERPT_LEN).collect();
    Err(ProcureError::model_output(format!(
        "no JSON object found in response: {}",
        excerpt
    )))
}

/// 取第一個存在的鍵，`leadTime` 與 `lead_time_days` 都能接受
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
}

pub fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    match field(value, keys)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 解析字串中的第一個數字，忽略貨幣符號與千分位
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit() || c == '.')?;
    let number: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse::<f64>().ok()
}

pub fn f64_field(value: &Value, keys: &[&str]) -> Option<f64> {
    match field(value, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

pub fn u32_field(value: &Value, keys: &[&str]) -> Option<u32> {
    f64_field(value, keys)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.round().min(u32::MAX as f64) as u32)
}

pub fn array_field<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    match field(value, keys) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// 接受 `{ "<key>": [...] }` 或最外層直接是陣列
pub fn list_or_field<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        other => array_field(other, keys),
    }
}
