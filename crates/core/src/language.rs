use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

fn re_language_code() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^[a-z]{2,3}(?:_[a-z]+)?$").expect("invalid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("Language set must not be empty")]
    Empty,
    #[error("Invalid language code: '{0}'")]
    InvalidCode(String),
}

/// A recognition language code such as `en`, `ko` or `ch_sim`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn new(code: &str) -> Result<Self, LanguageError> {
        let code = code.trim().to_ascii_lowercase();
        if re_language_code().is_match(&code) {
            Ok(Language(code))
        } else {
            Err(LanguageError::InvalidCode(code))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = LanguageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::new(s)
    }
}

impl TryFrom<String> for Language {
    type Error = LanguageError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::new(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}

/// Ordered, duplicate-free, non-empty list of languages handed to the engine.
///
/// Order is preserved because some engines treat the first language as the
/// primary script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Language>", into = "Vec<Language>")]
pub struct LanguageSet(Vec<Language>);

impl LanguageSet {
    pub fn new<I>(languages: I) -> Result<Self, LanguageError>
    where
        I: IntoIterator<Item = Language>,
    {
        let mut unique: Vec<Language> = Vec::new();
        for language in languages {
            if !unique.contains(&language) {
                unique.push(language);
            }
        }
        if unique.is_empty() {
            return Err(LanguageError::Empty);
        }
        Ok(LanguageSet(unique))
    }

    /// Parse a comma-separated list, e.g. `en,ko`. Blank segments are ignored.
    pub fn parse_list(list: &str) -> Result<Self, LanguageError> {
        let languages = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Language::new)
            .collect::<Result<Vec<_>, _>>()?;
        LanguageSet::new(languages)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed set; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Language] {
        &self.0
    }
}

impl Default for LanguageSet {
    /// English + Korean, the deployment's historical default.
    fn default() -> Self {
        LanguageSet(vec![Language("en".into()), Language("ko".into())])
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.0.iter().map(Language::as_str).collect();
        f.write_str(&codes.join(","))
    }
}

impl FromStr for LanguageSet {
    type Err = LanguageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageSet::parse_list(s)
    }
}

impl TryFrom<Vec<Language>> for LanguageSet {
    type Error = LanguageError;
    fn try_from(value: Vec<Language>) -> Result<Self, Self::Error> {
        LanguageSet::new(value)
    }
}

impl From<LanguageSet> for Vec<Language> {
    fn from(set: LanguageSet) -> Self {
        set.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_codes() {
        for code in ["en", "ko", "ja", "ch_sim", "ch_tra", "rs_cyrillic", "eng"] {
            assert!(Language::new(code).is_ok(), "{code} should be valid");
        }
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(Language::new(" EN ").unwrap().as_str(), "en");
    }

    #[test]
    fn rejects_malformed_codes() {
        assert_eq!(
            Language::new("e"),
            Err(LanguageError::InvalidCode("e".into()))
        );
        assert!(Language::new("en-US").is_err());
        assert!(Language::new("../etc").is_err());
        assert!(Language::new("").is_err());
    }

    #[test]
    fn set_keeps_order_and_drops_duplicates() {
        let set = LanguageSet::parse_list("ko,en,ko").unwrap();
        assert_eq!(set.to_string(), "ko,en");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert_eq!(LanguageSet::parse_list(""), Err(LanguageError::Empty));
        assert_eq!(LanguageSet::parse_list(" , ,"), Err(LanguageError::Empty));
        assert_eq!(LanguageSet::new(Vec::new()), Err(LanguageError::Empty));
    }

    #[test]
    fn deserializes_from_string_list() {
        let set: LanguageSet = serde_json::from_str(r#"["en", "ko"]"#).unwrap();
        assert_eq!(set, LanguageSet::default());

        let empty: Result<LanguageSet, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
        let bad: Result<LanguageSet, _> = serde_json::from_str(r#"["en", "x"]"#);
        assert!(bad.is_err());
    }
}
