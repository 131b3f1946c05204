use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compression aggressiveness, mapped 1:1 onto a Ghostscript `-dPDFSETTINGS` preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QualityProfile {
    /// Highest compression.
    #[default]
    Low,
    Balanced,
    High,
    /// Lowest compression.
    VeryHigh,
}

impl QualityProfile {
    pub const ALL: [QualityProfile; 4] = [
        QualityProfile::Low,
        QualityProfile::Balanced,
        QualityProfile::High,
        QualityProfile::VeryHigh,
    ];

    /// Order used by the staged target-size mode: least aggressive first.
    pub const FALLBACK_ORDER: [QualityProfile; 4] = [
        QualityProfile::VeryHigh,
        QualityProfile::High,
        QualityProfile::Balanced,
        QualityProfile::Low,
    ];

    pub fn preset(self) -> &'static str {
        match self {
            QualityProfile::Low => "screen",
            QualityProfile::Balanced => "ebook",
            QualityProfile::High => "printer",
            QualityProfile::VeryHigh => "prepress",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QualityProfile::Low => "Low Quality",
            QualityProfile::Balanced => "Balanced Quality",
            QualityProfile::High => "High Quality",
            QualityProfile::VeryHigh => "Very High Quality",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            QualityProfile::Low => "low",
            QualityProfile::Balanced => "balanced",
            QualityProfile::High => "high",
            QualityProfile::VeryHigh => "very-high",
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQuality(pub String);

impl fmt::Display for UnknownQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown quality '{}' (expected one of: low, balanced, high, very-high)",
            self.0
        )
    }
}

impl std::error::Error for UnknownQuality {}

impl FromStr for QualityProfile {
    type Err = UnknownQuality;

    /// Accepts the short name, the preset token or the human label, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        QualityProfile::ALL
            .into_iter()
            .find(|q| {
                wanted == q.short_name()
                    || wanted == q.preset()
                    || wanted == q.label().to_lowercase()
                    || wanted == q.short_name().replace('-', "")
            })
            .ok_or_else(|| UnknownQuality(s.to_string()))
    }
}

impl TryFrom<String> for QualityProfile {
    type Error = UnknownQuality;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QualityProfile> for String {
    fn from(quality: QualityProfile) -> Self {
        quality.short_name().to_string()
    }
}
