use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of languages the demo ships base speakers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ZH")]
    Zh,
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "EN_NEWEST")]
    EnNewest,
    #[serde(rename = "ES")]
    Es,
    #[serde(rename = "FR")]
    Fr,
    #[serde(rename = "JP")]
    Jp,
    #[serde(rename = "KR")]
    Kr,
}

impl Language {
    /// Warm-up and UI ordering. Every entry must have a loadable engine and
    /// base-speaker embeddings, otherwise startup fails.
    pub const ALL: [Language; 7] = [
        Language::Zh,
        Language::En,
        Language::EnNewest,
        Language::Es,
        Language::Fr,
        Language::Jp,
        Language::Kr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "ZH",
            Language::En => "EN",
            Language::EnNewest => "EN_NEWEST",
            Language::Es => "ES",
            Language::Fr => "FR",
            Language::Jp => "JP",
            Language::Kr => "KR",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ZH" => Ok(Language::Zh),
            "EN" => Ok(Language::En),
            "EN_NEWEST" => Ok(Language::EnNewest),
            "ES" => Ok(Language::Es),
            "FR" => Ok(Language::Fr),
            "JP" => Ok(Language::Jp),
            "KR" => Ok(Language::Kr),
            other => Err(anyhow::anyhow!("unknown language key: {other}")),
        }
    }
}

/// A speaker scoped to one language. `id` is what the engine consumes,
/// `key` addresses the speaker's source tone-color embedding file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub key: String,
    pub id: i64,
}

impl Speaker {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        let name = name.into();
        let key = normalize_speaker_key(&name);
        Self { name, key, id }
    }
}

/// Embedding files are named after the lowercased, hyphenated speaker name.
pub fn normalize_speaker_key(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trips_through_str() {
        for lang in Language::ALL {
            assert_eq!(lang.as_str().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn language_parse_is_case_insensitive() {
        assert_eq!("en_newest".parse::<Language>().unwrap(), Language::EnNewest);
        assert!("DE".parse::<Language>().is_err());
    }

    #[test]
    fn speaker_key_is_normalized() {
        let s = Speaker::new("EN_Default", 0);
        assert_eq!(s.key, "en-default");
        assert_eq!(s.name, "EN_Default");
    }
}
