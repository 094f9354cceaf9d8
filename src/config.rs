use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, read_to_string};
use crate::math::MathMacroSet;

pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[default]
    Phy,
    Ada,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanNotation {
    #[default]
    Maths,
    Eng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    #[default]
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSize {
    Xs,
    Sm,
    Md,
    #[default]
    Lg,
    Xl,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub resize_observer: bool,
    pub mobile: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            resize_observer: true,
            mobile: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct PageContext {
    pub subject: Option<String>,
    pub stage: Vec<String>,
}

impl PageContext {
    pub fn is_single_stage(&self) -> bool {
        self.stage.len() == 1 && self.stage[0] != "all"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub site: Site,
    pub site_origin: Option<String>,
    pub exam_board: Option<String>,
    pub boolean_notation: BooleanNotation,
    pub environment: Environment,
    pub accessible_text: bool,
    pub prefer_mathml: bool,
    pub device_size: DeviceSize,
    pub capabilities: Capabilities,
    pub page_context: PageContext,
    pub max_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            site: Site::default(),
            site_origin: None,
            exam_board: None,
            boolean_notation: BooleanNotation::default(),
            environment: Environment::default(),
            accessible_text: false,
            prefer_mathml: false,
            device_size: DeviceSize::default(),
            capabilities: Capabilities::default(),
            page_context: PageContext::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_to_string(path)?)
    }

    /// Exam board used to disambiguate glossary terms; empty when the user has
    /// no specific board selected.
    pub fn exam_board_tag(&self) -> &str {
        match self.exam_board.as_deref() {
            Some(board) if !board.is_empty() && !board.eq_ignore_ascii_case("all") => board,
            _ => "",
        }
    }

    pub fn macro_set(&self) -> MathMacroSet {
        match (self.site, self.boolean_notation) {
            (Site::Phy, _) => MathMacroSet::Base,
            (Site::Ada, BooleanNotation::Maths) => MathMacroSet::BooleanMaths,
            (Site::Ada, BooleanNotation::Eng) => MathMacroSet::BooleanEngineering,
        }
    }
}
