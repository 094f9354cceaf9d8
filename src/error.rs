use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid render configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid glossary term list: {0}")]
    Glossary(#[from] serde_json::Error),

    #[error("invalid figure numbering: {0}")]
    Figures(#[source] toml::de::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn read_to_string(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
