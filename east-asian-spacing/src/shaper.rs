//! The shaping interface

use std::collections::BTreeSet;

use log::{debug, trace};
use write_fonts::types::Tag;

use crate::{
    config::Language,
    error::Result,
    font::{Direction, Font},
    glyph::GlyphDataList,
};

/// The ISO 15924 tag of Han script.
pub const HANI: Tag = Tag::new(b"Hani");

/// A piece of text to shape and how to shape it.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeRequest<'a> {
    pub text: &'a str,
    pub direction: Direction,
    pub language: Option<Language>,
    /// An ISO 15924 script tag.
    pub script: Option<Tag>,
    /// Features to turn on.
    pub features: Vec<Tag>,
}

impl<'a> ShapeRequest<'a> {
    pub fn new(text: &'a str, direction: Direction) -> Self {
        ShapeRequest {
            text,
            direction,
            language: None,
            script: None,
            features: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    pub fn with_script(mut self, script: Tag) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_features(mut self, features: Vec<Tag>) -> Self {
        self.features = features;
        self
    }
}

/// Shapes text with a font.
///
/// Implementations return glyphs in visual order with the text's UTF-8 byte
/// offsets as cluster indices. Vertical results use the negated y advance
/// and y offset.
#[allow(async_fn_in_trait)]
pub trait Shaper<F: ?Sized> {
    async fn shape(&self, font: &F, request: &ShapeRequest<'_>) -> Result<GlyphDataList>;
}

/// Computes the advance shared by all glyphs of `text`.
///
/// Returns `None` if the glyphs have different advances, which means the
/// font is proportional.
pub async fn compute_fullwidth_advance<F, S>(
    font: &F,
    direction: Direction,
    shaper: &S,
    text: &str,
) -> Result<Option<u16>>
where
    F: Font + ?Sized,
    S: Shaper<F> + ?Sized,
{
    let request = ShapeRequest::new(text, direction)
        .with_script(HANI)
        .with_features(direction.shaping_features(true));
    trace!("Computing fullwidth advance of \"{font}\" with {request:?}");
    let mut glyphs = shaper.shape(font, &request).await?;
    glyphs.filter_missing_glyphs();
    let advances: BTreeSet<i32> = glyphs.iter().map(|glyph| glyph.advance).collect();
    debug!("Fullwidth advance of \"{font}\" {direction}: {advances:?}");
    match advances.into_iter().collect::<Vec<_>>()[..] {
        [advance] => Ok(u16::try_from(advance).ok()),
        _ => Ok(None),
    }
}
