//! Shaping with harfrust

use log::trace;

use crate::{
    config::Language,
    error::{Error, Result},
    font::{Direction, Font},
    glyph::{GlyphData, GlyphDataList},
    opentype::OpenTypeFace,
    shaper::{ShapeRequest, Shaper},
};

/// A [`Shaper`] for [`OpenTypeFace`]s using harfrust.
#[derive(Clone, Copy, Debug, Default)]
pub struct HarfRustShaper;

impl HarfRustShaper {
    pub fn new() -> Self {
        HarfRustShaper
    }
}

fn harfrust_tag(tag: write_fonts::types::Tag) -> harfrust::Tag {
    harfrust::Tag::new(&tag.to_be_bytes())
}

/// The BCP 47 private use form HarfBuzz maps to an OpenType language
/// system tag.
fn language_tag(language: Language) -> String {
    format!("x-hbot-{}", language.as_str())
}

impl Shaper<OpenTypeFace> for HarfRustShaper {
    async fn shape(&self, font: &OpenTypeFace, request: &ShapeRequest<'_>) -> Result<GlyphDataList> {
        trace!("Shaping \"{font}\" with {request:?}");
        let face = harfrust::FontRef::from_index(font.data(), font.face_index().unwrap_or_default())
            .map_err(|error| Error::Shape(format!("\"{font}\": {error}")))?;
        let shaper_data = harfrust::ShaperData::new(&face);
        let shaper = shaper_data.shaper(&face).build();

        let mut buffer = harfrust::UnicodeBuffer::new();
        buffer.push_str(request.text);
        buffer.set_direction(match request.direction {
            Direction::Horizontal => harfrust::Direction::LeftToRight,
            Direction::Vertical => harfrust::Direction::TopToBottom,
        });
        if let Some(script) = request
            .script
            .and_then(|script| harfrust::Script::from_iso15924_tag(harfrust_tag(script)))
        {
            buffer.set_script(script);
        }
        if let Some(language) = request.language {
            let tag = language_tag(language);
            let language = tag
                .parse::<harfrust::Language>()
                .map_err(|error| Error::Shape(format!("language '{tag}': {error}")))?;
            buffer.set_language(language);
        }
        buffer.guess_segment_properties();

        let features: Vec<_> = request
            .features
            .iter()
            .map(|tag| harfrust::Feature::new(harfrust_tag(*tag), 1, ..))
            .collect();
        let output = shaper.shape(buffer, &features);

        let glyphs = output
            .glyph_infos()
            .iter()
            .zip(output.glyph_positions())
            .map(|(info, position)| {
                let (advance, offset) = match request.direction {
                    Direction::Horizontal => (position.x_advance, position.x_offset),
                    Direction::Vertical => (-position.y_advance, -position.y_offset),
                };
                GlyphData::new(info.glyph_id, info.cluster, advance, offset)
            })
            .collect();
        Ok(GlyphDataList::new(glyphs))
    }
}
