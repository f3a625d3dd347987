use std::fmt;

/// Stable identifier for a provider implementation (for example `dashscope`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Creates a provider id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the provider id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Output framing requested for image generation.
///
/// Parsing is lenient: any label outside the supported set falls back to
/// `Square`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
    Standard,
    StandardPortrait,
}

impl AspectRatio {
    pub fn parse(label: &str) -> Self {
        match label.trim() {
            "16:9" => Self::Landscape,
            "9:16" => Self::Portrait,
            "4:3" => Self::Standard,
            "3:4" => Self::StandardPortrait,
            _ => Self::Square,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
        }
    }

    /// Pixel size in the `W*H` form the image synthesis API expects.
    pub fn provider_size(&self) -> &'static str {
        match self {
            Self::Square => "1024*1024",
            Self::Landscape => "1792*1024",
            Self::Portrait => "1024*1792",
            Self::Standard => "1024*768",
            Self::StandardPortrait => "768*1024",
        }
    }
}

impl From<String> for AspectRatio {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
