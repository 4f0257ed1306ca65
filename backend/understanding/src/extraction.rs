//! Reading extraction: turns the OCR lines of one image into one reading.
//!
//! Three heuristics run in priority order, each over every line before the
//! next one is tried:
//!
//! 1. a bare 4–6 digit run bounded by non-digits (`digit_pattern`)
//! 2. a 3–6 digit run, optionally followed by a unit such as `kWh` (`unit_pattern`)
//! 3. the longest number of at least three characters (`longest_number`)
//!
//! A heuristic never stitches digits from different lines together.

use meterline_core::{DetectedLine, ExtractionMethod, ExtractionResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4,6}(?:\.[0-9]{1,2})?)(?:[^0-9]|$)").unwrap()
});

static UNIT_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9]{3,6}(?:\.[0-9]{1,2})?)\s*(kwh|m³|m3|cubic|units?)?").unwrap()
});

static ANY_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());

/// Shortest run, in characters, the longest-number fallback accepts.
const MIN_FALLBACK_LEN: usize = 3;

/// Run the strategy chain over one image's lines.
pub fn extract_reading(lines: &[DetectedLine]) -> ExtractionResult {
    if lines.is_empty() {
        debug!("No text detected in image");
        return ExtractionResult::empty(ExtractionMethod::NoText);
    }

    if let Some(result) = digit_pattern(lines) {
        return result;
    }
    if let Some(result) = unit_pattern(lines) {
        return result;
    }
    if let Some(result) = longest_number(lines) {
        return result;
    }

    info!(lines = lines.len(), "Could not extract a meter reading");
    ExtractionResult::empty(ExtractionMethod::Failed)
}

fn digit_pattern(lines: &[DetectedLine]) -> Option<ExtractionResult> {
    lines.iter().find_map(|line| {
        let run = DIGIT_RUN_RE.captures(&line.text)?.get(1)?.as_str();
        let value = parse_reading(run)?;
        info!(reading = value, confidence = line.confidence, "Extracted reading");
        Some(ExtractionResult::found(
            value,
            line.confidence,
            ExtractionMethod::DigitPattern,
        ))
    })
}

fn unit_pattern(lines: &[DetectedLine]) -> Option<ExtractionResult> {
    lines.iter().find_map(|line| {
        let caps = UNIT_RUN_RE.captures(&line.text)?;
        let value = parse_reading(caps.get(1)?.as_str())?;
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        info!(reading = value, unit, confidence = line.confidence, "Extracted reading with unit");
        Some(ExtractionResult::found(
            value,
            line.confidence,
            ExtractionMethod::UnitPattern,
        ))
    })
}

fn longest_number(lines: &[DetectedLine]) -> Option<ExtractionResult> {
    let mut best: Option<(usize, f64, f64)> = None;

    for line in lines {
        for m in ANY_NUMBER_RE.find_iter(&line.text) {
            let len = m.as_str().len();
            if len < MIN_FALLBACK_LEN {
                continue;
            }
            // Strictly longer only, so the earliest run wins a tie.
            if best.map_or(true, |(best_len, _, _)| len > best_len) {
                if let Some(value) = parse_reading(m.as_str()) {
                    best = Some((len, value, line.confidence));
                }
            }
        }
    }

    let (_, value, confidence) = best?;
    info!(reading = value, confidence, "Fallback: using longest number");
    Some(ExtractionResult::found(
        value,
        confidence,
        ExtractionMethod::LongestNumber,
    ))
}

/// Parse a digit run as a decimal, keeping at most two fractional digits.
/// Extra fractional digits are truncated.
pub fn parse_reading(run: &str) -> Option<f64> {
    let (whole, fraction) = match run.split_once('.') {
        Some((whole, fraction)) => (whole, &fraction[..fraction.len().min(2)]),
        None => (run, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.is_empty() {
        whole.parse().ok()
    } else {
        format!("{whole}.{fraction}").parse().ok()
    }
}
