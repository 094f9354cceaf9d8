//! Questions answered in place, through entry zones written into the content
//! of an inline region.

use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum InlineQuestionType {
    #[serde(rename = "isaacNumericQuestion")]
    Numeric,
    #[serde(rename = "isaacStringMatchQuestion")]
    StringMatch,
    #[serde(rename = "isaacRegexMatchQuestion")]
    RegexMatch,
    #[serde(rename = "isaacMultiChoiceQuestion")]
    MultiChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Correctness {
    Correct,
    Incorrect,
    NotAnswered,
    #[default]
    NotSubmitted,
}

impl Correctness {
    pub fn css_class(self) -> &'static str {
        match self {
            Correctness::Correct => "is-valid",
            Correctness::Incorrect => "is-invalid",
            Correctness::NotAnswered => "is-unanswered",
            Correctness::NotSubmitted => "",
        }
    }
}

/// One option of a multiple choice entry zone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InlineChoice {
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl InlineChoice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// What an entry zone needs to draw itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineEntry {
    pub question_id: String,
    pub kind: InlineQuestionType,
    pub value: Option<String>,
    pub correctness: Correctness,
    pub choices: Vec<InlineChoice>,
    pub readonly: bool,
}

/// State an inline region shares with the entry zones inside its content.
/// Entry zones are looked up by input id: the zone's id with `_` replaced by
/// `-`, suffixed with `-input`.
pub trait InlineQuestionContext {
    fn entry(&self, input_id: &str) -> Option<InlineEntry>;

    fn update_attempt(&self, input_id: &str, value: &str);
}

/// A submitted answer and its marking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marked {
    pub answer: Option<String>,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineQuestion {
    pub id: String,
    pub kind: InlineQuestionType,
    pub choices: Vec<InlineChoice>,
    pub attempt: Option<String>,
    pub modified: bool,
    pub validation: Option<Marked>,
    pub best_attempt: Option<Marked>,
}

impl InlineQuestion {
    pub fn new(id: impl Into<String>, kind: InlineQuestionType) -> Self {
        Self {
            id: id.into(),
            kind,
            choices: Vec::new(),
            attempt: None,
            modified: false,
            validation: None,
            best_attempt: None,
        }
    }

    pub fn with_choices(mut self, choices: Vec<InlineChoice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_best_attempt(mut self, answer: impl Into<String>, correct: bool) -> Self {
        self.best_attempt = Some(Marked {
            answer: Some(answer.into()),
            correct,
        });
        self
    }

    /// Unsubmitted edits hide any marking. A fresh marking wins over the best
    /// earlier attempt; empty answers count as unanswered when freshly marked
    /// and as never submitted otherwise.
    pub fn correctness(&self) -> Correctness {
        let empty = |marked: &Marked| marked.answer.as_deref().is_none_or(str::is_empty);
        if self.modified {
            return Correctness::NotSubmitted;
        }
        match (&self.validation, &self.best_attempt) {
            (Some(marked), _) if marked.correct => Correctness::Correct,
            (Some(marked), _) if empty(marked) => Correctness::NotAnswered,
            (Some(_), _) => Correctness::Incorrect,
            (None, Some(marked)) if marked.correct => Correctness::Correct,
            (None, Some(marked)) if empty(marked) => Correctness::NotSubmitted,
            (None, Some(_)) => Correctness::Incorrect,
            (None, None) => Correctness::NotSubmitted,
        }
    }

    /// Value shown in the zone: the current attempt, else the best attempt.
    pub fn value(&self) -> Option<String> {
        self.attempt
            .clone()
            .or_else(|| self.best_attempt.as_ref().and_then(|marked| marked.answer.clone()))
    }
}

/// In-memory inline region: the questions of one region keyed by input id.
#[derive(Debug, Default)]
pub struct InlineRegion {
    readonly: bool,
    questions: RefCell<HashMap<String, InlineQuestion>>,
}

impl InlineRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_question(self, input_id: impl Into<String>, question: InlineQuestion) -> Self {
        self.questions.borrow_mut().insert(input_id.into(), question);
        self
    }

    pub fn question(&self, input_id: &str) -> Option<InlineQuestion> {
        self.questions.borrow().get(input_id).cloned()
    }

    /// Ids of questions edited since they were last marked.
    pub fn modified_question_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .questions
            .borrow()
            .values()
            .filter(|question| question.modified)
            .map(|question| question.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Records the marking of the current attempt of `input_id`.
    pub fn mark(&self, input_id: &str, correct: bool) {
        let mut questions = self.questions.borrow_mut();
        let Some(question) = questions.get_mut(input_id) else {
            tracing::warn!(input = input_id, "marking unknown inline question");
            return;
        };
        question.validation = Some(Marked {
            answer: question.attempt.clone(),
            correct,
        });
        question.modified = false;
    }
}

impl InlineQuestionContext for InlineRegion {
    fn entry(&self, input_id: &str) -> Option<InlineEntry> {
        self.questions.borrow().get(input_id).map(|question| InlineEntry {
            question_id: question.id.clone(),
            kind: question.kind,
            value: question.value(),
            correctness: question.correctness(),
            choices: question.choices.clone(),
            readonly: self.readonly,
        })
    }

    fn update_attempt(&self, input_id: &str, value: &str) {
        if self.readonly {
            tracing::debug!(input = input_id, "ignoring entry in readonly region");
            return;
        }
        match self.questions.borrow_mut().get_mut(input_id) {
            Some(question) => {
                question.attempt = Some(value.to_string());
                question.modified = true;
            }
            None => tracing::warn!(input = input_id, "entry for unknown inline question"),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    fn region() -> InlineRegion {
        InlineRegion::new()
            .with_question(
                "inline-question-a-input",
                InlineQuestion::new("q|a", InlineQuestionType::Numeric),
            )
            .with_question(
                "inline-question-b-input",
                InlineQuestion::new("q|b", InlineQuestionType::StringMatch).with_best_attempt("cat", true),
            )
    }

    #[test]
    fn correctness__should_follow_marking_then_best_attempt() {
        // Given
        let mut question = InlineQuestion::new("q", InlineQuestionType::StringMatch);

        // Then
        assert_eq!(question.correctness(), Correctness::NotSubmitted);
        question.best_attempt = Some(Marked {
            answer: Some(String::new()),
            correct: false,
        });
        assert_eq!(question.correctness(), Correctness::NotSubmitted);
        question.best_attempt = Some(Marked {
            answer: Some("dog".to_string()),
            correct: false,
        });
        assert_eq!(question.correctness(), Correctness::Incorrect);
        question.validation = Some(Marked {
            answer: None,
            correct: false,
        });
        assert_eq!(question.correctness(), Correctness::NotAnswered);
        question.validation = Some(Marked {
            answer: Some("cat".to_string()),
            correct: true,
        });
        assert_eq!(question.correctness(), Correctness::Correct);
        question.modified = true;
        assert_eq!(question.correctness(), Correctness::NotSubmitted);
    }

    #[test]
    fn correctness__should_map_to_bootstrap_classes() {
        assert_eq!(Correctness::Correct.css_class(), "is-valid");
        assert_eq!(Correctness::Incorrect.css_class(), "is-invalid");
        assert_eq!(Correctness::NotAnswered.css_class(), "is-unanswered");
        assert_eq!(Correctness::NotSubmitted.css_class(), "");
    }

    #[test]
    fn update_attempt__should_hide_marking_until_marked_again() {
        // Given
        let region = region();

        // When
        region.update_attempt("inline-question-b-input", "dog");
        let edited = region.entry("inline-question-b-input");
        region.mark("inline-question-b-input", false);
        let marked = region.entry("inline-question-b-input");

        // Then
        let edited = edited.expect("known entry");
        assert_eq!(edited.value.as_deref(), Some("dog"));
        assert_eq!(edited.correctness, Correctness::NotSubmitted);
        assert_eq!(marked.expect("known entry").correctness, Correctness::Incorrect);
        assert!(region.modified_question_ids().is_empty());
    }

    #[test]
    fn update_attempt__should_track_modified_questions() {
        // Given
        let region = region();

        // When
        region.update_attempt("inline-question-a-input", "4.2");
        region.update_attempt("inline-question-missing-input", "x");

        // Then
        assert_eq!(region.modified_question_ids(), vec!["q|a".to_string()]);
    }

    #[test]
    fn update_attempt__should_ignore_entries_when_readonly() {
        // Given
        let region = region().with_readonly(true);

        // When
        region.update_attempt("inline-question-a-input", "4.2");

        // Then
        let entry = region.entry("inline-question-a-input").expect("known entry");
        assert!(entry.readonly);
        assert_eq!(entry.value, None);
    }

    #[test]
    fn entry__should_show_best_attempt_before_any_edit() {
        let entry = region().entry("inline-question-b-input").expect("known entry");
        assert_eq!(entry.value.as_deref(), Some("cat"));
        assert_eq!(entry.correctness, Correctness::Correct);
    }

    #[test]
    fn inline_question_type__should_deserialise_api_names() {
        let kind: InlineQuestionType = serde_json::from_str(r#""isaacMultiChoiceQuestion""#).expect("parse type");
        assert_eq!(kind, InlineQuestionType::MultiChoice);
    }
}
