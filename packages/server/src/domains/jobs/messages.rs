//! Worker-facing message texts.
//!
//! Every text carries an English line and a Hindi line. Prompts attach the
//! example image for the type being asked for, when one is configured.

use crate::domains::jobs::photo_types::{type_prompt, ExampleImages, PhotoType};
use crate::domains::validation::Verdict;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub media_url: Option<String>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media_url: None,
        }
    }

    fn with_media(mut self, media_url: Option<String>) -> Self {
        self.media_url = media_url;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Messages {
    examples: ExampleImages,
}

impl Messages {
    pub fn new(examples: ExampleImages) -> Self {
        Self { examples }
    }

    /// Prompt text and example image for `photo_type`, or for the fallback
    /// type when nothing is expected.
    fn prompt(&self, photo_type: Option<&PhotoType>) -> (String, Option<String>) {
        let photo_type = photo_type.cloned().unwrap_or_else(PhotoType::fallback);
        (type_prompt(&photo_type), self.examples.example_url(&photo_type))
    }

    pub fn no_active_job(&self) -> OutboundMessage {
        OutboundMessage::text(
            "No active job assigned yet. Please contact your supervisor.\n\
             कोई सक्रिय जॉब असाइन नहीं है। कृपया सुपरवाइज़र से संपर्क करें।",
        )
    }

    pub fn all_sectors_complete(&self) -> OutboundMessage {
        OutboundMessage::text(
            "✅ All assigned sectors complete for this site.\n\
             ✅ सभी सेक्टर पूरे हो गए हैं। धन्यवाद!",
        )
    }

    pub fn send_photo(&self, expected: Option<&PhotoType>) -> OutboundMessage {
        let (prompt, example) = self.prompt(expected);
        OutboundMessage::text(format!(
            "{}\nSend 1 image at a time.\nएक समय में सिर्फ 1 फोटो भेजें।",
            prompt
        ))
        .with_media(example)
    }

    pub fn invalid_image(&self, expected: Option<&PhotoType>) -> OutboundMessage {
        let (prompt, example) = self.prompt(expected);
        OutboundMessage::text(format!(
            "Please send a valid image. {}\nकृपया सही इमेज भेजें।",
            prompt
        ))
        .with_media(example)
    }

    pub fn download_failed(&self, expected: Option<&PhotoType>) -> OutboundMessage {
        let (prompt, example) = self.prompt(expected);
        OutboundMessage::text(format!(
            "❌ Could not download the image. Please resend.\n\
             इमेज डाउनलोड नहीं हो सकी, दोबारा भेजें।\n{}",
            prompt
        ))
        .with_media(example)
    }

    pub fn save_failed(&self) -> OutboundMessage {
        OutboundMessage::text(
            "❌ Could not save the image. Please resend later.\n\
             इमेज सेव नहीं हो पाई, बाद में दोबारा भेजें।",
        )
    }

    pub fn processing(&self) -> OutboundMessage {
        OutboundMessage::text(
            "📥 Got the photo. Processing… please wait for the next instruction.\n\
             📥 फोटो मिल गई। प्रोसेस हो रही है, अगला निर्देश जल्दी मिलेगा।",
        )
    }

    /// Sent instead of silence when background processing fails and the
    /// retake policy is enabled.
    pub fn processing_failed(&self, expected: Option<&PhotoType>) -> OutboundMessage {
        let (prompt, example) = self.prompt(expected);
        OutboundMessage::text(format!(
            "❌ Could not process the photo. Please resend.\n\
             फोटो प्रोसेस नहीं हो सकी, दोबारा भेजें।\n{}",
            prompt
        ))
        .with_media(example)
    }

    /// Reply after a verdict has been applied.
    ///
    /// `expected` is the type asked for before the photo was evaluated;
    /// `next_expected` is read from the job after any advance.
    pub fn verdict_reply(
        &self,
        verdict: &Verdict,
        expected: Option<&PhotoType>,
        next_expected: Option<&PhotoType>,
        job_done: bool,
    ) -> OutboundMessage {
        if verdict.is_pass() {
            return match next_expected {
                Some(next) => {
                    let (prompt, example) = self.prompt(Some(next));
                    OutboundMessage::text(format!(
                        "✅ {} verified.\nNext: {}\nअब अगली फोटो भेजें।",
                        verdict.photo_type, prompt
                    ))
                    .with_media(example)
                }
                None => {
                    let mut text = "✅ Received and verified. Sector complete.\n\
                                    ✅ सेक्टर पूरा हो गया। धन्यवाद!"
                        .to_string();
                    if job_done {
                        text.push_str("\n✅ All assigned sectors complete for this site.");
                    }
                    OutboundMessage::text(text)
                }
            };
        }

        let retake_type = expected.unwrap_or(&verdict.photo_type);
        let (prompt, example) = self.prompt(Some(retake_type));
        OutboundMessage::text(format!(
            "❌ {} failed: {}.\nPlease retake and resend.\n{}\nकृपया दोबारा साफ फोटो भेजें।",
            verdict.photo_type,
            verdict.reason_text(),
            prompt
        ))
        .with_media(example)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::validation::VerdictStatus;

    fn messages() -> Messages {
        Messages::new(ExampleImages::new(Some("https://cdn.test/ex".to_string())))
    }

    fn verdict(t: PhotoType, status: VerdictStatus, reasons: &[&str]) -> Verdict {
        Verdict {
            photo_type: t,
            status,
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn pass_with_next_type_prompts_for_it() {
        let msg = messages().verdict_reply(
            &verdict(PhotoType::labelling(), VerdictStatus::Pass, &[]),
            Some(&PhotoType::labelling()),
            Some(&PhotoType::azimuth()),
            false,
        );
        assert!(msg.text.starts_with("✅ LABELLING verified."));
        assert!(msg.text.contains("AZIMUTH"));
        assert_eq!(msg.media_url.as_deref(), Some("https://cdn.test/ex/azimuth.jpg"));
    }

    #[test]
    fn sector_complete_adds_job_line_only_when_done() {
        let pass = verdict(PhotoType::azimuth(), VerdictStatus::Pass, &[]);
        let open = messages().verdict_reply(&pass, Some(&PhotoType::azimuth()), None, false);
        assert!(open.text.contains("Sector complete"));
        assert!(!open.text.contains("All assigned sectors complete"));
        assert!(open.media_url.is_none());

        let done = messages().verdict_reply(&pass, Some(&PhotoType::azimuth()), None, true);
        assert!(done.text.contains("Sector complete"));
        assert!(done.text.contains("All assigned sectors complete"));
    }

    #[test]
    fn failure_names_reasons_and_reprompts_expected_type() {
        let msg = messages().verdict_reply(
            &verdict(PhotoType::azimuth(), VerdictStatus::Fail, &["blurry", "duplicate"]),
            Some(&PhotoType::labelling()),
            Some(&PhotoType::labelling()),
            false,
        );
        assert!(msg.text.starts_with("❌ AZIMUTH failed: blurry; duplicate."));
        assert!(msg.text.contains("LABEL"));
        assert_eq!(
            msg.media_url.as_deref(),
            Some("https://cdn.test/ex/labelling.jpg")
        );
    }

    #[test]
    fn failure_without_expected_type_uses_detected_type() {
        let msg = messages().verdict_reply(
            &verdict(PhotoType::azimuth(), VerdictStatus::Fail, &[]),
            None,
            None,
            false,
        );
        assert!(msg.text.contains("needs retake"));
        assert_eq!(msg.media_url.as_deref(), Some("https://cdn.test/ex/azimuth.jpg"));
    }

    #[test]
    fn prompts_fall_back_to_labelling() {
        let msg = Messages::default().send_photo(None);
        assert!(msg.text.contains("LABEL"));
        assert!(msg.text.contains("Send 1 image at a time."));
        assert!(msg.media_url.is_none());
    }
}
