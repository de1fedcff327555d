//! Message catalogs and language negotiation.
//!
//! Catalogs are flat JSON objects (message id to text) compiled into the binary.
//! Lookups fall back to English, then to the id itself, so a missing entry shows up
//! as its id instead of failing the page.
use std::{collections::HashMap, sync::Arc};

use axum::http::{HeaderMap, header::ACCEPT_LANGUAGE};
use serde::Serialize;

/// Serialized as its code, `"en"` or `"ko"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ko,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ko];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
        }
    }

    /// Name of the language in the language itself.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "한국어",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code.split(['-', '_']).next()?.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|lang| lang.code() == primary)
    }

    /// First supported language of an `Accept-Language` header, honouring q-values.
    pub fn from_accept_language(header: &str) -> Option<Self> {
        let mut ranges: Vec<(f32, &str)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let tag = pieces.next()?.trim();
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse().ok())
                    .unwrap_or(1.0);
                Some((quality, tag))
            })
            .filter(|(quality, _)| *quality > 0.0)
            .collect();

        // stable, so equal weights keep header order
        ranges.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranges.into_iter().find_map(|(_, tag)| Self::from_code(tag))
    }

    /// Session choice, then the browser, then the configured default.
    pub fn negotiate(session: Option<&str>, headers: &HeaderMap, default: Language) -> Self {
        session
            .and_then(Self::from_code)
            .or_else(|| {
                headers
                    .get(ACCEPT_LANGUAGE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(Self::from_accept_language)
            })
            .unwrap_or(default)
    }
}

pub struct Locales {
    catalogs: HashMap<Language, HashMap<String, String>>,
}

impl Locales {
    pub fn load() -> Result<Self, serde_json::Error> {
        let mut catalogs = HashMap::new();
        catalogs.insert(
            Language::En,
            serde_json::from_str(include_str!("../locales/en.json"))?,
        );
        catalogs.insert(
            Language::Ko,
            serde_json::from_str(include_str!("../locales/ko.json"))?,
        );

        Ok(Self { catalogs })
    }

    fn lookup(&self, lang: Language, id: &str) -> Option<&str> {
        self.catalogs
            .get(&lang)
            .and_then(|catalog| catalog.get(id))
            .map(String::as_str)
    }
}

#[derive(Clone)]
pub struct Translator {
    lang: Language,
    locales: Arc<Locales>,
}

impl Translator {
    pub fn new(lang: Language, locales: Arc<Locales>) -> Self {
        Self { lang, locales }
    }

    pub fn language(&self) -> Language {
        self.lang
    }

    pub fn t<'a>(&'a self, id: &'a str) -> &'a str {
        self.locales
            .lookup(self.lang, id)
            .or_else(|| self.locales.lookup(Language::En, id))
            .unwrap_or(id)
    }

    /// Translates and fills `{name}` placeholders.
    pub fn tf(&self, id: &str, args: &[(&str, &str)]) -> String {
        args.iter()
            .fold(self.t(id).to_string(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}
