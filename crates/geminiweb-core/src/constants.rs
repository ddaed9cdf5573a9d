//! Endpoints, cookie names, fixed headers, and the model catalogue.

use std::fmt;

pub const LANDING_URL: &str = "https://www.google.com";
pub const APP_URL: &str = "https://gemini.google.com/app";
pub const GENERATE_URL: &str =
    "https://gemini.google.com/_/BardChatUi/data/assistant.lamda.BardFrontendService/StreamGenerate";
pub const ROTATE_COOKIES_URL: &str = "https://accounts.google.com/RotateCookies";

/// Primary identity cookie. Required to start a session.
pub const IDENTITY_COOKIE: &str = "__Secure-1PSID";
/// Short-lived cookie refreshed by the rotation endpoint.
pub const SECONDARY_COOKIE: &str = "__Secure-1PSIDTS";

/// Marker the app page embeds the access token under.
pub const ACCESS_TOKEN_PATTERN: &str = r#""SNlM0e":"(.*?)""#;
pub const ROTATED_COOKIE_PATTERN: &str = r"__Secure-1PSIDTS=([^;]+)";
pub const ROTATE_COOKIES_BODY: &str = r#"[000,"-0000000000000000000"]"#;

pub const CARD_CONTENT_PATTERN: &str = r"^http://googleusercontent\.com/card_content/\d+";
pub const IMMERSIVE_CHIP_PATTERN: &str = r"http://googleusercontent\.com/immersive_entry_chip/\d+";
pub const FENCED_CODE_PATTERN: &str = r"(?s)```([\w+#.-]*)[ \t]*\r?\n(.*?)```";

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const MODEL_HEADER: &str = "x-goog-ext-525001261-jspb";

/// Headers sent with every request to the app and generate endpoints.
pub fn gemini_headers() -> Vec<(String, String)> {
    [
        ("Content-Type", "application/x-www-form-urlencoded;charset=utf-8"),
        ("Host", "gemini.google.com"),
        ("Origin", "https://gemini.google.com"),
        ("Referer", "https://gemini.google.com/"),
        ("User-Agent", USER_AGENT),
        ("X-Same-Domain", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn rotate_cookies_headers() -> Vec<(String, String)> {
    vec![("Content-Type".to_string(), "application/json".to_string())]
}

/// Backend models selectable per turn.
///
/// Each variant pairs a display name with the opaque capability tag the
/// generate endpoint expects in [`MODEL_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Model {
    #[default]
    Unspecified,
    Gemini25Flash,
    Gemini25Pro,
    Gemini20Flash,
    Gemini20FlashThinking,
}

impl Model {
    pub const ALL: [Model; 5] = [
        Model::Unspecified,
        Model::Gemini25Flash,
        Model::Gemini25Pro,
        Model::Gemini20Flash,
        Model::Gemini20FlashThinking,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Model::Unspecified => "unspecified",
            Model::Gemini25Flash => "gemini-2.5-flash",
            Model::Gemini25Pro => "gemini-2.5-pro",
            Model::Gemini20Flash => "gemini-2.0-flash",
            Model::Gemini20FlashThinking => "gemini-2.0-flash-thinking",
        }
    }

    fn capability_tag(self) -> Option<&'static str> {
        match self {
            Model::Unspecified => None,
            Model::Gemini25Flash => Some(r#"[1,null,null,null,"71c2d248d3b102ff",null,null,0,[4]]"#),
            Model::Gemini25Pro => Some(r#"[1,null,null,null,"4af6c7f5da75d65d",null,null,0,[4]]"#),
            Model::Gemini20Flash => Some(r#"[1,null,null,null,"f299729663a2343f"]"#),
            Model::Gemini20FlashThinking => Some(r#"[null,null,null,null,"7ca48d02d802f20a"]"#),
        }
    }

    /// Fixed header fragment for this model. Empty for `Unspecified`.
    pub fn headers(self) -> Vec<(String, String)> {
        self.capability_tag()
            .map(|tag| vec![(MODEL_HEADER.to_string(), tag.to_string())])
            .unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Option<Model> {
        Model::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
