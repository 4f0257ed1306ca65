//! TwiML reply rendering.

use meterline_core::ResponseIntent;
use meterline_pipeline::Outcome;

const XML_PROLOG: &str = "<?xml version='1.0' encoding='UTF-8'?>";

/// How replies are worded.
#[derive(Debug, Clone)]
pub struct ReplySettings {
    /// Appended to every rendered reading, e.g. `kWh`.
    pub unit_label: String,
    /// Send the stored photos back as media messages.
    pub echo_media: bool,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            unit_label: "kWh".to_string(),
            echo_media: true,
        }
    }
}

/// Escape text for use inside an XML element or attribute.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Human-readable text for an outcome.
pub fn reply_text(outcome: &Outcome, settings: &ReplySettings) -> String {
    let unit = &settings.unit_label;
    let confidence = outcome.reading.confidence;
    match (outcome.intent, outcome.reading.value) {
        (ResponseIntent::HighConfidenceAccepted, Some(value)) => format!(
            "✅ Meter reading received: {value:.2} {unit} (Confidence: {confidence:.0}%)"
        ),
        (ResponseIntent::LowConfidenceNeedsConfirmation, Some(value)) => format!(
            "⚠️ Detected reading: {value:.2} {unit} (Low confidence: {confidence:.0}%). \
             Reply YES to confirm or NO and resend a clearer image."
        ),
        (ResponseIntent::ConfirmedByUser, _) => match &outcome.resolved {
            Some(p) => format!("✅ Thanks! Reading {:.2} {unit} confirmed.", p.value),
            None => "✅ Thanks! There is no reading waiting for confirmation.".to_string(),
        },
        (ResponseIntent::DeniedByUser, _) => match &outcome.resolved {
            Some(p) => format!(
                "👍 Reading {:.2} {unit} discarded. Please send a clearer image of the meter display.",
                p.value
            ),
            None => "👍 Noted. Send a photo of your meter to submit a reading.".to_string(),
        },
        (ResponseIntent::TextOnlyAck, _) => {
            "📩 Message received. Send a photo of your meter to submit a reading.".to_string()
        }
        (ResponseIntent::EmptyPrompt, _) => {
            "📷 Please send a photo of your meter display to submit a reading.".to_string()
        }
        _ => "❌ Could not read meter. Please send a clearer image with the meter display visible."
            .to_string(),
    }
}

/// Render the full TwiML document for an outcome.
pub fn render_reply(outcome: &Outcome, settings: &ReplySettings) -> String {
    let mut xml = String::from(XML_PROLOG);
    xml.push_str("<Response>");
    xml.push_str("<Message>");
    xml.push_str(&escape_xml(&reply_text(outcome, settings)));
    xml.push_str("</Message>");
    if settings.echo_media {
        for media in &outcome.media {
            xml.push_str("<Message><Media>");
            xml.push_str(&escape_xml(&media.public_url));
            xml.push_str("</Media></Message>");
        }
    }
    xml.push_str("</Response>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterline_core::{FinalReading, StoredMedia};

    fn outcome(intent: ResponseIntent, value: Option<f64>, confidence: f64, urls: &[&str]) -> Outcome {
        Outcome {
            intent,
            reading: FinalReading { value, confidence },
            media: urls
                .iter()
                .map(|u| StoredMedia {
                    key: "k".into(),
                    public_url: u.to_string(),
                })
                .collect(),
            resolved: None,
            record_id: None,
        }
    }

    #[test]
    fn accepted_reply_formats_value_and_confidence() {
        let o = outcome(ResponseIntent::HighConfidenceAccepted, Some(4821.0), 85.4, &[]);
        assert_eq!(
            render_reply(&o, &ReplySettings::default()),
            "<?xml version='1.0' encoding='UTF-8'?><Response><Message>✅ Meter reading received: \
             4821.00 kWh (Confidence: 85%)</Message></Response>"
        );
    }

    #[test]
    fn echoes_media_with_escaping() {
        let o = outcome(
            ResponseIntent::Rejected,
            None,
            0.0,
            &["https://cdn.test/a.jpeg?x=1&y=2"],
        );
        let xml = render_reply(&o, &ReplySettings::default());
        assert!(xml.contains("Could not read meter"));
        assert!(xml.contains("<Message><Media>https://cdn.test/a.jpeg?x=1&amp;y=2</Media></Message>"));
    }

    #[test]
    fn echo_can_be_disabled() {
        let o = outcome(ResponseIntent::Rejected, None, 0.0, &["https://cdn.test/a.jpeg"]);
        let settings = ReplySettings {
            echo_media: false,
            ..Default::default()
        };
        assert!(!render_reply(&o, &settings).contains("<Media>"));
    }

    #[test]
    fn unit_label_is_escaped() {
        let o = outcome(ResponseIntent::LowConfidenceNeedsConfirmation, Some(12.5), 60.0, &[]);
        let settings = ReplySettings {
            unit_label: "m<3>".into(),
            echo_media: true,
        };
        let xml = render_reply(&o, &settings);
        assert!(xml.contains("12.50 m&lt;3&gt;"));
        assert!(xml.contains("Low confidence: 60%"));
    }

    #[test]
    fn confirmation_without_pending_reading() {
        let o = outcome(ResponseIntent::ConfirmedByUser, None, 0.0, &[]);
        assert!(reply_text(&o, &ReplySettings::default()).contains("no reading waiting"));
    }

    #[test]
    fn escape_covers_all_specials() {
        assert_eq!(escape_xml(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&apos;&amp;&apos;&lt;/a&gt;");
    }
}
