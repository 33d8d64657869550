//! Errors reported while adding spacing features to fonts

use std::path::PathBuf;

use thiserror::Error;
use write_fonts::{read::ReadError, types::Tag, BuilderError};

use crate::{cache::GlyphType, config::Language};

/// The result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("\"{font}\" is a proportional CJK font")]
    ProportionalCjkFont { font: String },

    #[error(
        "need to specify the language for \"{font}\"; the font has these script/language tags:\n{scripts}"
    )]
    AmbiguousLanguage { font: String, scripts: String },

    #[error("glyph {glyph_id} of \"{font}\" is {requested} but it was {cached} before")]
    CacheConsistency {
        font: String,
        glyph_id: u32,
        cached: GlyphType,
        requested: GlyphType,
    },

    #[error("feature '{0}' already exists")]
    DuplicateFeature(Tag),

    #[error("\"{font}\" has an AAT 'morx' table without 'GSUB'")]
    UnsupportedAatMorx { font: String },

    #[error("\"{font}\" shapes {text:?} differently in {language} than in JAN")]
    CrossLanguageMismatch {
        font: String,
        language: Language,
        text: String,
    },

    #[error("Shaping failed: {0}")]
    Shape(String),

    #[error("Error reading font data: {0}")]
    Read(#[from] ReadError),

    #[error("Error building font: {0}")]
    Build(#[from] BuilderError),

    #[error("{0} is out of range")]
    Overflow(&'static str),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid language '{0}'")]
    InvalidLanguage(String),

    #[error("Invalid face index '{0}'")]
    InvalidFaceIndex(String),

    #[error("{0}")]
    TestFailed(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the error means "skip this font" rather than a
    /// failure of the whole root font.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Error::ProportionalCjkFont { .. } | Error::UnsupportedAatMorx { .. }
        )
    }
}
