//! Extraction of a [`TriageReport`] from raw response text.
//!
//! Strategies run in order, each only if the previous one failed:
//!
//! 1. Direct: the whole text is the report.
//! 2. FencedBlock: the text is a single ```json fenced block.
//! 3. BalancedScan: the first balanced `{...}` region mentioning
//!    `triage_urgency`.
//! 4. Partial: last-chance only. Candidates from the steps above, plus
//!    truncated JSON with its open strings and brackets closed, are accepted
//!    with optional fields missing. The discriminator is still required.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use super::errors::ParseError;
use super::report::{Confidence, ToolVerificationData, TriageReport, TriageUrgency, URGENCY_FIELD};

const DIFFERENTIAL_FIELD: &str = "differential_diagnosis";
const CONFIDENCE_FIELD: &str = "confidence_score";
const EVIDENCE_FIELD: &str = "evidence_summary";
const TOOL_DATA_FIELD: &str = "tool_verification_data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Direct,
    FencedBlock,
    BalancedScan,
    Partial,
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::FencedBlock => "fenced block",
            Self::BalancedScan => "balanced scan",
            Self::Partial => "partial",
        };
        f.write_str(name)
    }
}

/// A failed strategy and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseAttempt {
    pub strategy: ParseStrategy,
    pub reason: String,
}

impl ParseAttempt {
    pub fn new(strategy: ParseStrategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

/// An accepted report and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    pub report: TriageReport,
    pub strategy: ParseStrategy,
    /// The JSON text the report was read from.
    pub json: String,
    /// True when the JSON had to be closed before it would parse.
    pub repaired: bool,
    /// Strategies that failed before this one succeeded.
    pub failed_attempts: Vec<ParseAttempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    Strict,
    Partial,
}

enum Rejection {
    Discriminator(ParseError),
    Other(String),
}

impl Rejection {
    fn reason(&self) -> String {
        match self {
            Self::Discriminator(e) => e.to_string(),
            Self::Other(reason) => reason.clone(),
        }
    }
}

/// Stateless response parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Runs the strict fallback chain.
    pub fn parse(&self, raw_text: &str) -> Result<ParsedReport, ParseError> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut attempts = Vec::new();
        for (strategy, candidate) in strict_candidates(text) {
            let Some(candidate) = candidate else {
                attempts.push(ParseAttempt::new(strategy, candidate_missing_reason(strategy)));
                continue;
            };
            match evaluate(candidate, Strictness::Strict) {
                Ok(report) => {
                    return Ok(ParsedReport {
                        report,
                        strategy,
                        json: candidate.to_string(),
                        repaired: false,
                        failed_attempts: attempts,
                    })
                }
                Err(rejection) => attempts.push(ParseAttempt::new(strategy, rejection.reason())),
            }
        }

        Err(ParseError::Exhausted { attempts })
    }

    /// Runs the strict chain, then accepts a partial report if that fails.
    ///
    /// A candidate whose discriminator is missing or invalid is never
    /// accepted; if that is the only kind of candidate found, the
    /// discriminator error is returned.
    pub fn parse_last_chance(&self, raw_text: &str) -> Result<ParsedReport, ParseError> {
        let mut attempts = match self.parse(raw_text) {
            Ok(parsed) => return Ok(parsed),
            Err(ParseError::Exhausted { attempts }) => attempts,
            Err(other) => return Err(other),
        };

        let text = raw_text.trim();
        let mut discriminator_error = None;

        for (candidate, repaired) in partial_candidates(text) {
            match evaluate(&candidate, Strictness::Partial) {
                Ok(report) => {
                    return Ok(ParsedReport {
                        report,
                        strategy: ParseStrategy::Partial,
                        json: candidate,
                        repaired,
                        failed_attempts: attempts,
                    })
                }
                Err(Rejection::Discriminator(e)) => {
                    attempts.push(ParseAttempt::new(ParseStrategy::Partial, e.to_string()));
                    discriminator_error.get_or_insert(e);
                }
                Err(Rejection::Other(reason)) => {
                    attempts.push(ParseAttempt::new(ParseStrategy::Partial, reason));
                }
            }
        }

        Err(discriminator_error.unwrap_or(ParseError::Exhausted { attempts }))
    }
}

fn strict_candidates(text: &str) -> [(ParseStrategy, Option<&str>); 3] {
    [
        (ParseStrategy::Direct, Some(text)),
        (ParseStrategy::FencedBlock, strip_fence(text)),
        (ParseStrategy::BalancedScan, find_discriminated_object(text)),
    ]
}

fn candidate_missing_reason(strategy: ParseStrategy) -> &'static str {
    match strategy {
        ParseStrategy::FencedBlock => "text is not a fenced json block",
        ParseStrategy::BalancedScan => "no balanced object mentions triage_urgency",
        _ => "no candidate",
    }
}

/// Candidates for partial acceptance, deduplicated, in preference order.
fn partial_candidates(text: &str) -> Vec<(String, bool)> {
    let mut candidates: Vec<(String, bool)> = Vec::new();
    let mut push = |candidate: String, repaired: bool| {
        if !candidates.iter().any(|(c, _)| *c == candidate) {
            candidates.push((candidate, repaired));
        }
    };

    for (_, candidate) in strict_candidates(text) {
        if let Some(candidate) = candidate {
            push(candidate.to_string(), false);
        }
    }

    let unfenced = strip_fence(text).unwrap_or(text);
    for repaired in repair_json(unfenced) {
        push(repaired, true);
    }

    candidates
}

/// Body of a single ```json (or unlabeled) fenced block wrapping the text.
///
/// A missing closing fence is tolerated so truncated replies still unwrap.
fn strip_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let (label, body) = rest.split_once('\n').unwrap_or((rest, ""));
    let label = label.trim();
    if !label.is_empty() && !label.eq_ignore_ascii_case("json") {
        return None;
    }
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    Some(body.trim())
}

/// First balanced object that mentions the discriminator key.
///
/// Single pass over the text. Quotes only open strings inside an object, so
/// stray quotes in surrounding prose do not swallow the payload. When an
/// outer object never closes, the earliest closed region inside it wins.
fn find_discriminated_object(text: &str) -> Option<&str> {
    let key = format!("\"{}\"", URGENCY_FIELD);
    let key_starts: Vec<usize> = text.match_indices(key.as_str()).map(|(i, _)| i).collect();
    let mentions_key = |start: usize, end: usize| {
        let next = key_starts.partition_point(|&k| k < start);
        key_starts.get(next).is_some_and(|&k| k + key.len() <= end)
    };

    let mut open: Vec<usize> = Vec::new();
    let mut best: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if !open.is_empty() => in_string = true,
            '{' => open.push(i),
            '}' => {
                let Some(start) = open.pop() else {
                    continue;
                };
                if !mentions_key(start, i) {
                    continue;
                }
                if open.is_empty() {
                    return Some(&text[start..=i]);
                }
                if best.map_or(true, |(s, _)| start < s) {
                    best = Some((start, i));
                }
            }
            _ => {}
        }
    }

    best.map(|(start, end)| &text[start..=end])
}

/// Most cut-back variants offered for a truncated object.
const MAX_REPAIR_CUTS: usize = 4;

/// Closes a truncated JSON object starting at the first `{`.
///
/// Yields the text with its open string and brackets closed, then versions
/// cut back at the last few top-level separators, most complete first.
fn repair_json(text: &str) -> Vec<String> {
    let Some(start) = text.find('{') else {
        return Vec::new();
    };
    let body = &text[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut cuts: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    return vec![body[..=i].to_string()];
                }
            }
            // Only separators of the outer object; a cut there closes with a single brace.
            ',' if stack.len() == 1 => cuts.push(i),
            _ => {}
        }
    }

    let mut repaired = Vec::with_capacity(1 + cuts.len().min(MAX_REPAIR_CUTS));

    let mut full = body.to_string();
    if in_string {
        if escaped {
            full.pop();
        }
        full.push('"');
    }
    let trimmed = full.trim_end();
    let mut full = trimmed.strip_suffix(',').unwrap_or(trimmed).to_string();
    if full.ends_with(':') {
        full.push_str("null");
    }
    full.extend(stack.iter().rev());
    repaired.push(full);

    for &pos in cuts.iter().rev().take(MAX_REPAIR_CUTS) {
        let mut cut = body[..pos].trim_end().to_string();
        cut.push('}');
        repaired.push(cut);
    }

    repaired
}

fn evaluate(candidate: &str, strictness: Strictness) -> Result<TriageReport, Rejection> {
    let value: Value = serde_json::from_str(candidate).map_err(|e| Rejection::Other(format!("invalid json: {}", e)))?;
    let Value::Object(map) = value else {
        return Err(Rejection::Other("top-level value is not an object".to_string()));
    };
    build_report(map, strictness)
}

fn build_report(mut map: Map<String, Value>, strictness: Strictness) -> Result<TriageReport, Rejection> {
    let triage_urgency = match map.get(URGENCY_FIELD) {
        None | Some(Value::Null) => return Err(Rejection::Discriminator(ParseError::MissingDiscriminator)),
        Some(Value::String(s)) => s.parse::<TriageUrgency>().map_err(Rejection::Discriminator)?,
        Some(other) => {
            return Err(Rejection::Discriminator(ParseError::InvalidDiscriminator(
                other.to_string(),
            )))
        }
    };

    let differential = differential(map.get(DIFFERENTIAL_FIELD));
    let confidence = confidence(map.get(CONFIDENCE_FIELD));
    let evidence = evidence(map.get(EVIDENCE_FIELD));
    let tool_data = tool_data(map.remove(TOOL_DATA_FIELD));

    let (differential_diagnosis, confidence_score, evidence_summary, tool_verification_data) =
        match strictness {
            Strictness::Strict => (
                required(DIFFERENTIAL_FIELD, differential)?,
                Some(required(CONFIDENCE_FIELD, confidence)?),
                Some(required(EVIDENCE_FIELD, evidence)?),
                tool_data.map_err(Rejection::Other)?.unwrap_or_default(),
            ),
            Strictness::Partial => (
                differential.ok().flatten().unwrap_or_default(),
                confidence.ok().flatten(),
                evidence.ok().flatten(),
                tool_data.ok().flatten().unwrap_or_default(),
            ),
        };

    Ok(TriageReport {
        differential_diagnosis,
        triage_urgency,
        confidence_score,
        evidence_summary,
        tool_verification_data,
    })
}

fn required<T>(field: &str, value: Result<Option<T>, String>) -> Result<T, Rejection> {
    match value {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(Rejection::Other(format!("missing required field: {}", field))),
        Err(reason) => Err(Rejection::Other(reason)),
    }
}

fn differential(value: Option<&Value>) -> Result<Option<Vec<String>>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        Some(_) => Err(format!("{} is not a list", DIFFERENTIAL_FIELD)),
    }
}

fn confidence(value: Option<&Value>) -> Result<Option<Confidence>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let raw = n.as_f64().unwrap_or(f64::NAN);
            Confidence::new(raw)
                .map(Some)
                .ok_or_else(|| format!("{} {} is outside [0, 1]", CONFIDENCE_FIELD, n))
        }
        Some(_) => Err(format!("{} is not a number", CONFIDENCE_FIELD)),
    }
}

fn evidence(value: Option<&Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{} is not a string", EVIDENCE_FIELD)),
    }
}

fn tool_data(value: Option<Value>) -> Result<Option<ToolVerificationData>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(ToolVerificationData::from(map))),
        Some(_) => Err(format!("{} is not an object", TOOL_DATA_FIELD)),
    }
}
