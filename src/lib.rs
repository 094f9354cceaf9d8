//! Renders Isaac content fragments (markdown, HTML, LaTeX) to HTML with
//! glossary terms, accessible tables, cloze drop zones, inline entry zones
//! and math mounted in place.

pub mod cache;
pub mod cloze;
pub mod config;
pub mod content;
pub mod context;
pub mod dom;
mod error;
pub mod inline_questions;
pub mod markdown;
pub mod math;
pub mod portals;
mod templates;
pub mod trusted;

pub use cache::ContentCache;
pub use cloze::{ClozeDropRegions, ClozeItem, DropRegionContext};
pub use config::RenderConfig;
pub use content::{ContentFragment, Encoding, FigureNumbers, GlossaryTerm, GlossaryTerms};
pub use context::RenderContext;
pub use error::{Error, Result};
pub use inline_questions::{InlineQuestion, InlineQuestionContext, InlineQuestionType, InlineRegion};
pub use templates::document;
pub use trusted::{Mounted, Prepared, TrustedContent, normalise_instance_ids};
