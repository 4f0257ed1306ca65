//! Picks one reading out of the per-image results of a request.

use meterline_core::{ExtractionResult, FinalReading, ImageOcrRecord};
use tracing::info;

/// Highest-confidence non-null reading; earliest image wins a tie.
pub fn select_reading(records: &[ImageOcrRecord]) -> FinalReading {
    select_from_results(records.iter().map(|r| &r.result))
}

/// Same rule over bare extraction results, in arrival order.
pub fn select_from_results<'a, I>(results: I) -> FinalReading
where
    I: IntoIterator<Item = &'a ExtractionResult>,
{
    let mut best: Option<FinalReading> = None;

    for result in results {
        let Some(value) = result.value() else {
            continue;
        };
        if best.map_or(true, |b| result.confidence() > b.confidence) {
            best = Some(FinalReading {
                value: Some(value),
                confidence: result.confidence(),
            });
        }
    }

    match best {
        Some(reading) => {
            info!(
                reading = reading.value,
                confidence = reading.confidence,
                "Final meter reading selected"
            );
            reading
        }
        None => FinalReading::none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterline_core::ExtractionMethod;

    fn found(value: f64, confidence: f64) -> ExtractionResult {
        ExtractionResult::found(value, confidence, ExtractionMethod::DigitPattern)
    }

    #[test]
    fn picks_highest_confidence() {
        let results = [
            found(100.0, 40.0),
            found(200.0, 90.0),
            ExtractionResult::empty(ExtractionMethod::Failed),
        ];
        let reading = select_from_results(&results);
        assert_eq!(reading.value, Some(200.0));
        assert_eq!(reading.confidence, 90.0);
    }

    #[test]
    fn all_null_gives_empty_reading() {
        let results = [
            ExtractionResult::empty(ExtractionMethod::NoText),
            ExtractionResult::engine_error("unavailable"),
        ];
        assert_eq!(select_from_results(&results), FinalReading::none());
    }

    #[test]
    fn tie_goes_to_earliest_image() {
        let results = [found(111.0, 75.0), found(222.0, 75.0)];
        assert_eq!(select_from_results(&results).value, Some(111.0));
    }

    #[test]
    fn null_results_are_skipped() {
        let results = [ExtractionResult::engine_error("x"), found(5000.0, 12.0)];
        let reading = select_from_results(&results);
        assert_eq!(reading.value, Some(5000.0));
        assert_eq!(reading.confidence, 12.0);
    }

    #[test]
    fn empty_request_gives_empty_reading() {
        assert_eq!(select_reading(&[]), FinalReading::none());
    }
}
