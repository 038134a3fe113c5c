use serde::{Deserialize, Serialize};

/// Vision-модель, распознающая чек.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionProviderKind {
    Claude,
    Gemini,
    Grok,
}

impl VisionProviderKind {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "claude" => Ok(VisionProviderKind::Claude),
            "gemini" => Ok(VisionProviderKind::Gemini),
            "grok" => Ok(VisionProviderKind::Grok),
            _ => Err(format!("Unknown vision provider: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisionProviderKind::Claude => "claude",
            VisionProviderKind::Gemini => "gemini",
            VisionProviderKind::Grok => "grok",
        }
    }

    pub fn all() -> &'static [VisionProviderKind] {
        &[
            VisionProviderKind::Claude,
            VisionProviderKind::Gemini,
            VisionProviderKind::Grok,
        ]
    }
}

impl std::fmt::Display for VisionProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
