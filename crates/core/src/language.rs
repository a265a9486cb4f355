//! Language definitions for the 22 scheduled Indian languages plus English
//!
//! Languages are identified by their ISO 639-3 tag on the wire; the closed
//! enum keeps unsupported tags out of the rest of the system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Supported languages, tagged by ISO 639-3 code in serialized form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "hin")]
    Hindi,
    #[serde(rename = "tel")]
    Telugu,
    #[serde(rename = "tam")]
    Tamil,
    #[serde(rename = "kan")]
    Kannada,
    #[serde(rename = "mar")]
    Marathi,
    #[serde(rename = "ben")]
    Bengali,
    #[serde(rename = "guj")]
    Gujarati,
    #[serde(rename = "pan")]
    Punjabi,
    #[serde(rename = "mal")]
    Malayalam,
    #[serde(rename = "asm")]
    Assamese,
    #[serde(rename = "ori")]
    Odia,
    #[serde(rename = "urd")]
    Urdu,
    #[serde(rename = "kas")]
    Kashmiri,
    #[serde(rename = "kok")]
    Konkani,
    #[serde(rename = "nep")]
    Nepali,
    #[serde(rename = "brx")]
    Bodo,
    #[serde(rename = "doi")]
    Dogri,
    #[serde(rename = "mai")]
    Maithili,
    #[serde(rename = "mni")]
    Manipuri,
    #[serde(rename = "sat")]
    Santali,
    #[serde(rename = "snd")]
    Sindhi,
    #[serde(rename = "san")]
    Sanskrit,
    #[serde(rename = "eng")]
    English,
}

impl Language {
    /// All supported languages
    pub const ALL: [Language; 23] = [
        Language::Hindi,
        Language::Telugu,
        Language::Tamil,
        Language::Kannada,
        Language::Marathi,
        Language::Bengali,
        Language::Gujarati,
        Language::Punjabi,
        Language::Malayalam,
        Language::Assamese,
        Language::Odia,
        Language::Urdu,
        Language::Kashmiri,
        Language::Konkani,
        Language::Nepali,
        Language::Bodo,
        Language::Dogri,
        Language::Maithili,
        Language::Manipuri,
        Language::Santali,
        Language::Sindhi,
        Language::Sanskrit,
        Language::English,
    ];

    /// ISO 639-3 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Hindi => "hin",
            Language::Telugu => "tel",
            Language::Tamil => "tam",
            Language::Kannada => "kan",
            Language::Marathi => "mar",
            Language::Bengali => "ben",
            Language::Gujarati => "guj",
            Language::Punjabi => "pan",
            Language::Malayalam => "mal",
            Language::Assamese => "asm",
            Language::Odia => "ori",
            Language::Urdu => "urd",
            Language::Kashmiri => "kas",
            Language::Konkani => "kok",
            Language::Nepali => "nep",
            Language::Bodo => "brx",
            Language::Dogri => "doi",
            Language::Maithili => "mai",
            Language::Manipuri => "mni",
            Language::Santali => "sat",
            Language::Sindhi => "snd",
            Language::Sanskrit => "san",
            Language::English => "eng",
        }
    }

    /// Parse an ISO 639-3 code
    pub fn from_code(code: &str) -> Option<Language> {
        Language::ALL.iter().copied().find(|l| l.code() == code)
    }

    /// English display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Hindi => "Hindi",
            Language::Telugu => "Telugu",
            Language::Tamil => "Tamil",
            Language::Kannada => "Kannada",
            Language::Marathi => "Marathi",
            Language::Bengali => "Bengali",
            Language::Gujarati => "Gujarati",
            Language::Punjabi => "Punjabi",
            Language::Malayalam => "Malayalam",
            Language::Assamese => "Assamese",
            Language::Odia => "Odia",
            Language::Urdu => "Urdu",
            Language::Kashmiri => "Kashmiri",
            Language::Konkani => "Konkani",
            Language::Nepali => "Nepali",
            Language::Bodo => "Bodo",
            Language::Dogri => "Dogri",
            Language::Maithili => "Maithili",
            Language::Manipuri => "Manipuri",
            Language::Santali => "Santali",
            Language::Sindhi => "Sindhi",
            Language::Sanskrit => "Sanskrit",
            Language::English => "English",
        }
    }

    /// Name in the language's own script, used for voice announcements
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::Hindi => "हिन्दी",
            Language::Telugu => "తెలుగు",
            Language::Tamil => "தமிழ்",
            Language::Kannada => "ಕನ್ನಡ",
            Language::Marathi => "मराठी",
            Language::Bengali => "বাংলা",
            Language::Gujarati => "ગુજરાતી",
            Language::Punjabi => "ਪੰਜਾਬੀ",
            Language::Malayalam => "മലയാളം",
            Language::Assamese => "অসমীয়া",
            Language::Odia => "ଓଡ଼ିଆ",
            Language::Urdu => "اردو",
            Language::Kashmiri => "كٲشُر",
            Language::Konkani => "कोंकणी",
            Language::Nepali => "नेपाली",
            Language::Bodo => "बर'",
            Language::Dogri => "डोगरी",
            Language::Maithili => "मैथिली",
            Language::Manipuri => "মৈতৈলোন্",
            Language::Santali => "ᱥᱟᱱᱛᱟᱲᱤ",
            Language::Sindhi => "سنڌي",
            Language::Sanskrit => "संस्कृतम्",
            Language::English => "English",
        }
    }

    /// Check whether an ISO 639-3 tag names a supported language
    pub fn is_supported(code: &str) -> bool {
        Language::from_code(code).is_some()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(s)
            .ok_or_else(|| Error::Validation(format!("unsupported language tag '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(Language::from_code("fra").is_none());
        assert!(!Language::is_supported("xx"));
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_serde_uses_iso_codes() {
        let json = serde_json::to_string(&Language::Telugu).unwrap();
        assert_eq!(json, "\"tel\"");
        let lang: Language = serde_json::from_str("\"hin\"").unwrap();
        assert_eq!(lang, Language::Hindi);
    }
}
