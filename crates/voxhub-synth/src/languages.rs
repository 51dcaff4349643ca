use serde::{Deserialize, Serialize};

/// A language the conversion endpoint speaks well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub code: String,
    pub name: String,
    pub native_name: String,
    pub voice_gender: String,
    pub recommended_speed: f64,
    pub quality: String,
}

impl Language {
    fn new(
        code: &str,
        name: &str,
        native_name: &str,
        recommended_speed: f64,
        quality: &str,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            native_name: native_name.into(),
            voice_gender: "female".into(),
            recommended_speed,
            quality: quality.into(),
        }
    }
}

/// Languages advertised to clients, best supported first.
pub fn supported_languages() -> Vec<Language> {
    vec![
        Language::new("id", "Bahasa Indonesia", "Bahasa Indonesia", 1.0, "natural"),
        Language::new("en", "English", "English", 1.0, "good"),
        Language::new("ja", "Japanese", "日本語", 0.9, "good"),
        Language::new("ko", "Korean", "한국어", 1.0, "good"),
    ]
}
