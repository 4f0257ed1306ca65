//! Confidence-gated reply classification and the yes/no handshake.

use meterline_config::ThresholdConfig;
use meterline_core::{FinalReading, ReadingStatus, ResponseIntent};

/// Intercept a confirm/deny reply. Runs before any media is looked at.
pub fn handshake_intent(body: &str) -> Option<ResponseIntent> {
    match body.trim().to_lowercase().as_str() {
        "yes" | "y" => Some(ResponseIntent::ConfirmedByUser),
        "no" | "n" => Some(ResponseIntent::DeniedByUser),
        _ => None,
    }
}

/// Classify a message that was not a handshake reply.
///
/// `has_image` is true when any `image/*` attachment was present, even if it
/// could not be fetched or stored.
pub fn classify(
    reading: &FinalReading,
    has_image: bool,
    body: &str,
    thresholds: &ThresholdConfig,
) -> ResponseIntent {
    if !has_image {
        return if body.trim().is_empty() {
            ResponseIntent::EmptyPrompt
        } else {
            ResponseIntent::TextOnlyAck
        };
    }

    if reading.value.is_none() {
        return ResponseIntent::Rejected;
    }

    let confidence = reading.confidence;
    if confidence > thresholds.high {
        return ResponseIntent::HighConfidenceAccepted;
    }
    match thresholds.low {
        Some(low) if confidence <= low => ResponseIntent::Rejected,
        _ => ResponseIntent::LowConfidenceNeedsConfirmation,
    }
}

/// Initial lifecycle status of the record persisted for `intent`.
pub fn status_for(intent: ResponseIntent) -> ReadingStatus {
    match intent {
        ResponseIntent::HighConfidenceAccepted => ReadingStatus::Accepted,
        ResponseIntent::LowConfidenceNeedsConfirmation => ReadingStatus::Pending,
        ResponseIntent::Rejected => ReadingStatus::Rejected,
        ResponseIntent::ConfirmedByUser => ReadingStatus::Confirmed,
        ResponseIntent::DeniedByUser => ReadingStatus::Denied,
        ResponseIntent::TextOnlyAck | ResponseIntent::EmptyPrompt => ReadingStatus::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: f64, confidence: f64) -> FinalReading {
        FinalReading {
            value: Some(value),
            confidence,
        }
    }

    #[test]
    fn handshake_tokens_ignore_case_and_space() {
        for body in ["Yes", " y ", "YES", "y\n"] {
            assert_eq!(handshake_intent(body), Some(ResponseIntent::ConfirmedByUser));
        }
        for body in ["no", "N", "  No  "] {
            assert_eq!(handshake_intent(body), Some(ResponseIntent::DeniedByUser));
        }
        for body in ["", "yes please", "nope", "ok"] {
            assert_eq!(handshake_intent(body), None);
        }
    }

    #[test]
    fn no_image_depends_on_text() {
        let t = ThresholdConfig::default();
        assert_eq!(classify(&FinalReading::none(), false, "hello", &t), ResponseIntent::TextOnlyAck);
        assert_eq!(classify(&FinalReading::none(), false, "   ", &t), ResponseIntent::EmptyPrompt);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = ThresholdConfig::default();
        assert_eq!(classify(&reading(1.0, 95.0), true, "", &t), ResponseIntent::HighConfidenceAccepted);
        assert_eq!(
            classify(&reading(1.0, 70.0), true, "", &t),
            ResponseIntent::LowConfidenceNeedsConfirmation
        );
        assert_eq!(
            classify(&reading(1.0, 50.1), true, "", &t),
            ResponseIntent::LowConfidenceNeedsConfirmation
        );
        assert_eq!(classify(&reading(1.0, 50.0), true, "", &t), ResponseIntent::Rejected);
        assert_eq!(classify(&FinalReading::none(), true, "", &t), ResponseIntent::Rejected);
    }

    #[test]
    fn without_low_tier_everything_below_high_asks() {
        let t = ThresholdConfig { high: 70.0, low: None };
        assert_eq!(
            classify(&reading(1.0, 3.0), true, "", &t),
            ResponseIntent::LowConfidenceNeedsConfirmation
        );
    }

    #[test]
    fn statuses() {
        assert_eq!(status_for(ResponseIntent::LowConfidenceNeedsConfirmation), ReadingStatus::Pending);
        assert_eq!(status_for(ResponseIntent::TextOnlyAck), ReadingStatus::None);
    }
}
