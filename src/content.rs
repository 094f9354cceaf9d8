use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;

use crate::error::{Error, Result, read_to_string};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum Encoding {
    Html,
    #[default]
    Markdown,
    Latex,
    Plaintext,
    Unknown(String),
}

impl From<String> for Encoding {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for Encoding {
    fn from(value: &str) -> Self {
        match value {
            "html" => Self::Html,
            "markdown" => Self::Markdown,
            "latex" => Self::Latex,
            "plaintext" => Self::Plaintext,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Markdown => f.write_str("markdown"),
            Self::Latex => f.write_str("latex"),
            Self::Plaintext => f.write_str("plaintext"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct ContentFragment {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub encoding: Encoding,
}

impl ContentFragment {
    pub fn new(value: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            value: value.into(),
            encoding,
        }
    }

    pub fn html(value: impl Into<String>) -> Self {
        Self::new(value, Encoding::Html)
    }

    pub fn markdown(value: impl Into<String>) -> Self {
        Self::new(value, Encoding::Markdown)
    }

    /// Reads a fragment from disk. Without an explicit encoding it is guessed
    /// from the file extension, falling back to markdown.
    pub fn load(path: &Path, encoding: Option<Encoding>) -> Result<Self> {
        let encoding = encoding.unwrap_or_else(|| Encoding::for_path(path));
        Ok(Self::new(read_to_string(path)?, encoding))
    }
}

impl Encoding {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("html" | "htm") => Self::Html,
            Some("tex") => Self::Latex,
            Some("txt") => Self::Plaintext,
            _ => Self::Markdown,
        }
    }
}

/// Figure numbers keyed by reference id, supplied by the page that owns the
/// figures being referenced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FigureNumbers(HashMap<String, u32>);

impl FigureNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, number: u32) {
        self.0.insert(id.into(), number);
    }

    pub fn get(&self, id: &str) -> Option<u32> {
        self.0.get(id).copied().filter(|number| *number >= 1)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Error::Figures)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_to_string(path)?)
    }
}

impl Hash for FigureNumbers {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_unstable();
        entries.hash(state);
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for FigureNumbers {
    fn from_iter<T: IntoIterator<Item = (K, u32)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(id, n)| (id.into(), n)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub explanation: ContentFragment,
    #[serde(default)]
    pub exam_board: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl GlossaryTerm {
    pub fn new(id: impl Into<String>, value: impl Into<String>, explanation: &str) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            explanation: ContentFragment::markdown(explanation),
            exam_board: None,
            tags: Vec::new(),
        }
    }

    /// Term id with `|` replaced by `-`, the form used in element ids.
    pub fn css_id(&self) -> String {
        css_friendly(&self.id)
    }

    fn applies_to(&self, exam_board: &str) -> bool {
        match self.exam_board.as_deref() {
            None | Some("") => true,
            Some(board) => board == exam_board,
        }
    }
}

pub(crate) fn css_friendly(id: &str) -> String {
    id.replace('|', "-")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryTerms {
    terms: Vec<GlossaryTerm>,
    fingerprint: u64,
}

impl GlossaryTerms {
    pub fn new(terms: Vec<GlossaryTerm>) -> Self {
        let mut hasher = DefaultHasher::new();
        terms.hash(&mut hasher);
        Self {
            terms,
            fingerprint: hasher.finish(),
        }
    }

    /// Hash of every term, computed once at load.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(contents)?))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json_str(&read_to_string(path)?)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlossaryTerm> {
        self.terms.iter()
    }

    /// Looks a term up by the id written in content (`termId` or
    /// `termId|examBoard`).
    pub fn resolve(&self, id: &str, exam_board: &str) -> Option<&GlossaryTerm> {
        let with_board = format!("{id}|{exam_board}");
        pick_candidate(
            id,
            self.terms.iter().filter(|term| {
                term.applies_to(exam_board)
                    && (term.id == id || (!exam_board.is_empty() && term.id == with_board))
            }),
        )
    }

    /// Same as [`GlossaryTerms::resolve`] but for the CSS-friendly id carried by
    /// `glossary-term-` marker elements.
    pub fn resolve_css(&self, css_id: &str, exam_board: &str) -> Option<&GlossaryTerm> {
        let with_board = format!("{css_id}-{}", css_friendly(exam_board));
        pick_candidate(
            css_id,
            self.terms.iter().filter(|term| {
                let candidate = term.css_id();
                term.applies_to(exam_board)
                    && (candidate == css_id || (!exam_board.is_empty() && candidate == with_board))
            }),
        )
    }
}

impl Default for GlossaryTerms {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn pick_candidate<'a>(
    requested: &str,
    mut candidates: impl Iterator<Item = &'a GlossaryTerm>,
) -> Option<&'a GlossaryTerm> {
    let first = candidates.next()?;
    let others: Vec<&str> = candidates.map(|term| term.id.as_str()).collect();
    if !others.is_empty() {
        tracing::warn!(
            requested,
            chosen = first.id.as_str(),
            ?others,
            "more than one candidate glossary term found"
        );
    }
    Some(first)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn board_term(id: &str, board: &str) -> GlossaryTerm {
        GlossaryTerm {
            exam_board: Some(board.to_string()),
            ..GlossaryTerm::new(id, id, "explanation")
        }
    }

    #[test]
    fn resolve__should_find_term_by_plain_id() {
        // Given
        let terms = GlossaryTerms::new(vec![GlossaryTerm::new("algo", "Algorithm", "steps")]);

        // When
        let term = terms.resolve("algo", "");

        // Then
        assert_eq!(term.map(|term| term.value.as_str()), Some("Algorithm"));
    }

    #[test]
    fn resolve__should_prefer_exam_board_variant_when_user_has_board() {
        // Given
        let terms = GlossaryTerms::new(vec![
            board_term("bits|ocr", "ocr"),
            board_term("bits|aqa", "aqa"),
        ]);

        // When
        let term = terms.resolve("bits", "aqa");

        // Then
        assert_eq!(term.map(|term| term.id.as_str()), Some("bits|aqa"));
    }

    #[test]
    fn resolve__should_pick_first_of_ambiguous_candidates() {
        // Given
        let terms = GlossaryTerms::new(vec![
            GlossaryTerm::new("algo", "First", "a"),
            GlossaryTerm::new("algo", "Second", "b"),
        ]);

        // When
        let term = terms.resolve("algo", "");

        // Then
        assert_eq!(term.map(|term| term.value.as_str()), Some("First"));
    }

    #[test]
    fn resolve__should_return_none_for_unknown_id() {
        let terms = GlossaryTerms::new(vec![GlossaryTerm::new("algo", "Algorithm", "a")]);

        assert!(terms.resolve("heap", "").is_none());
    }

    #[test]
    fn resolve_css__should_match_pipe_delimited_ids() {
        // Given
        let terms = GlossaryTerms::new(vec![GlossaryTerm::new(
            "glossary-demo|boolean-algebra",
            "Boolean algebra",
            "a",
        )]);

        // When
        let term = terms.resolve_css("glossary-demo-boolean-algebra", "");

        // Then
        assert!(term.is_some());
    }

    #[test]
    fn from_json_str__should_parse_api_terms() {
        // Given
        let json = r#"[
            {"id": "algo|aqa", "value": "Algorithm", "examBoard": "aqa",
             "explanation": {"value": "A sequence of steps", "encoding": "markdown"},
             "tags": ["computer_science"]}
        ]"#;

        // When
        let terms = GlossaryTerms::from_json_str(json).expect("parse terms");

        // Then
        let term = terms.iter().next().expect("one term");
        assert_eq!(term.exam_board.as_deref(), Some("aqa"));
        assert_eq!(term.explanation.encoding, Encoding::Markdown);
        assert_eq!(term.css_id(), "algo-aqa");
    }

    #[test]
    fn figure_numbers__should_parse_toml_table() {
        // Given
        let contents = "fig1 = 3\nfig2 = 4\n";

        // When
        let figures = FigureNumbers::from_toml_str(contents).expect("parse figures");

        // Then
        assert_eq!(figures.get("fig1"), Some(3));
        assert_eq!(figures.get("missing"), None);
    }

    #[test]
    fn encoding_for_path__should_guess_from_extension() {
        assert_eq!(Encoding::for_path(Path::new("a/b.html")), Encoding::Html);
        assert_eq!(Encoding::for_path(Path::new("notes.tex")), Encoding::Latex);
        assert_eq!(Encoding::for_path(Path::new("README")), Encoding::Markdown);
    }

    #[test]
    fn encoding__should_keep_unknown_names() {
        assert_eq!(Encoding::from("svg"), Encoding::Unknown("svg".to_string()));
        assert_eq!(Encoding::from("html").to_string(), "html");
    }
}
