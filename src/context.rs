use std::hash::{DefaultHasher, Hash, Hasher};

use crate::cache::ContentCache;
use crate::cloze::DropRegionContext;
use crate::config::RenderConfig;
use crate::content::{FigureNumbers, GlossaryTerms};
use crate::inline_questions::InlineQuestionContext;
use crate::math::MathScanner;

/// Everything a render pass reads from its surroundings. Cheap to copy; nested
/// renders get an adjusted copy rather than shared mutable state.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a RenderConfig,
    pub figures: &'a FigureNumbers,
    /// `None` while the glossary has not been loaded.
    pub glossary: Option<&'a GlossaryTerms>,
    /// Present only when rendering inside a cloze question.
    pub drop_regions: Option<&'a dyn DropRegionContext>,
    /// Present only when rendering inside an inline region.
    pub inline_questions: Option<&'a dyn InlineQuestionContext>,
    pub cache: Option<&'a ContentCache>,
    /// Set inside an expandable table so nested tables don't get their own
    /// expand control.
    pub expandable_parent: bool,
    pub depth: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(config: &'a RenderConfig, figures: &'a FigureNumbers) -> Self {
        Self {
            config,
            figures,
            glossary: None,
            drop_regions: None,
            inline_questions: None,
            cache: None,
            expandable_parent: false,
            depth: 0,
        }
    }

    pub fn with_glossary(self, glossary: &'a GlossaryTerms) -> Self {
        Self {
            glossary: Some(glossary),
            ..self
        }
    }

    pub fn with_drop_regions(self, drop_regions: &'a dyn DropRegionContext) -> Self {
        Self {
            drop_regions: Some(drop_regions),
            ..self
        }
    }

    pub fn with_inline_questions(self, inline_questions: &'a dyn InlineQuestionContext) -> Self {
        Self {
            inline_questions: Some(inline_questions),
            ..self
        }
    }

    pub fn with_cache(self, cache: &'a ContentCache) -> Self {
        Self {
            cache: Some(cache),
            ..self
        }
    }

    /// Context for content embedded in the content currently rendering.
    pub fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    pub fn within_expandable(self) -> Self {
        Self {
            expandable_parent: true,
            ..self
        }
    }

    pub fn too_deep(&self) -> bool {
        self.depth > self.config.max_depth
    }

    pub fn exam_board(&self) -> &'a str {
        self.config.exam_board_tag()
    }

    /// Hash of everything apart from the source text that can change
    /// rendered markdown.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.config.hash(&mut hasher);
        self.figures.hash(&mut hasher);
        self.glossary.map(GlossaryTerms::fingerprint).hash(&mut hasher);
        self.drop_regions.is_some().hash(&mut hasher);
        self.inline_questions.is_some().hash(&mut hasher);
        self.expandable_parent.hash(&mut hasher);
        self.depth.hash(&mut hasher);
        hasher.finish()
    }

    pub fn math_scanner(&self) -> MathScanner<'a> {
        MathScanner::new(self.config.macro_set(), self.figures)
            .with_accessible_text(self.config.accessible_text)
            .with_prefer_mathml(self.config.prefer_mathml)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn nested__should_increase_depth_until_limit() {
        // Given
        let config = RenderConfig {
            max_depth: 1,
            ..RenderConfig::default()
        };
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(&config, &figures);

        // When
        let once = cx.nested();
        let twice = once.nested();

        // Then
        assert!(!once.too_deep());
        assert!(twice.too_deep());
    }

    #[test]
    fn within_expandable__should_only_mark_copies() {
        // Given
        let config = RenderConfig::default();
        let figures = FigureNumbers::new();
        let cx = RenderContext::new(&config, &figures);

        // When
        let inner = cx.within_expandable();

        // Then
        assert!(inner.expandable_parent);
        assert!(!cx.expandable_parent);
    }

    #[test]
    fn fingerprint__should_change_with_glossary_and_config() {
        // Given
        let config = RenderConfig::default();
        let ada = RenderConfig {
            site: crate::config::Site::Ada,
            ..RenderConfig::default()
        };
        let figures = FigureNumbers::new();
        let glossary = GlossaryTerms::new(vec![crate::content::GlossaryTerm::new("algo", "Algorithm", "Steps")]);
        let plain = RenderContext::new(&config, &figures);

        // Then
        assert_eq!(plain.fingerprint(), RenderContext::new(&config, &figures).fingerprint());
        assert_ne!(plain.fingerprint(), plain.with_glossary(&glossary).fingerprint());
        assert_ne!(plain.fingerprint(), RenderContext::new(&ada, &figures).fingerprint());
        assert_ne!(plain.fingerprint(), plain.nested().fingerprint());
    }
}
