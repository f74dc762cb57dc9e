//! Language identification for picking the synthesis voice

use crate::{Error, Result};

/// Default language when detection fails
pub const DEFAULT_LANGUAGE: &str = "en";

/// Infers the ISO 639-1 language code of a text
pub trait LanguageDetector: Send + Sync {
    /// Detect the language of `text`
    ///
    /// Short or mixed-language text may be misclassified.
    ///
    /// # Errors
    ///
    /// Returns `Error::LanguageUndetected` if no language can be inferred
    fn detect(&self, text: &str) -> Result<String>;
}

/// Detect the language of `text`, falling back to `default` on failure
pub fn detect_or_default(detector: &dyn LanguageDetector, text: &str, default: &str) -> String {
    detector.detect(text).unwrap_or_else(|e| {
        tracing::warn!(error = %e, default, "language detection failed, using default");
        default.to_string()
    })
}

/// Trigram-based detector using `whatlang`
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::LanguageUndetected("empty text".to_string()));
        }

        let info = whatlang::detect(text)
            .ok_or_else(|| Error::LanguageUndetected("no language matched".to_string()))?;

        let code = info.lang().code();
        let iso = iso_639_1(code).ok_or_else(|| {
            Error::LanguageUndetected(format!("no two-letter code for '{code}'"))
        })?;

        tracing::debug!(
            language = iso,
            confidence = info.confidence(),
            reliable = info.is_reliable(),
            "language detected"
        );
        Ok(iso.to_string())
    }
}

/// Map a `whatlang` ISO 639-3 code to ISO 639-1
fn iso_639_1(code: &str) -> Option<&'static str> {
    let iso = match code {
        "afr" => "af",
        "aka" => "ak",
        "amh" => "am",
        "ara" => "ar",
        "aze" => "az",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "he",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "hye" => "hy",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jv",
        "jpn" => "ja",
        "kan" => "kn",
        "kat" => "ka",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "nb",
        "ori" => "or",
        "pan" => "pa",
        "pes" => "fa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "sna" => "sn",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tuk" => "tk",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "uzb" => "uz",
        "vie" => "vi",
        "yid" => "yi",
        "zul" => "zu",
        _ => return None,
    };
    Some(iso)
}
