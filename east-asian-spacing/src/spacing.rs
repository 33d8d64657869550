//! Adding spacing features to a font in both directions

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, io,
};

use log::{debug, info};

use crate::{
    cache::CacheStore,
    config::Config,
    error::Result,
    font::{Direction, Font, FullwidthAdvances, CHWS, VCHW},
    glyph_sets::GlyphSets,
    lookups,
    shaper::{ShapeRequest, Shaper},
};

/// Latin characters whose advances differ in proportional fonts.
const MONOSPACE_PROBE: &str = "iIMW";

/// The horizontal and vertical glyph sets of a font, or of faces of a
/// collection that share their GPOS table.
#[derive(Clone, Debug, Default)]
pub struct EastAsianSpacing {
    pub horizontal: GlyphSets,
    pub vertical: GlyphSets,
    changed_faces: Vec<Option<u32>>,
    fullwidth_advances: BTreeMap<Option<u32>, FullwidthAdvances>,
}

impl EastAsianSpacing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Face indices of the fonts `add_to_font` changed.
    pub fn changed_faces(&self) -> &[Option<u32>] {
        &self.changed_faces
    }

    /// The fullwidth advance the glyphs of the face at `face_index` were
    /// classified with, if it was not the units per em.
    pub fn fullwidth_advance(&self, face_index: Option<u32>, direction: Direction) -> Option<u16> {
        self.fullwidth_advances
            .get(&face_index)
            .and_then(|advances| advances.get(direction))
    }

    pub fn glyph_sets(&self, direction: Direction) -> &GlyphSets {
        match direction {
            Direction::Horizontal => &self.horizontal,
            Direction::Vertical => &self.vertical,
        }
    }

    /// Classifies the glyphs of `font` horizontally, and vertically if the
    /// font has vertical alternates.
    pub async fn add_glyphs<F, S>(
        &mut self,
        font: &mut F,
        config: &Config,
        shaper: &S,
        caches: &mut CacheStore,
    ) -> Result<()>
    where
        F: Font,
        S: Shaper<F>,
    {
        self.horizontal
            .add_glyphs(font, Direction::Horizontal, config, shaper, caches)
            .await?;
        if font.has_vertical_form() {
            self.vertical
                .add_glyphs(font, Direction::Vertical, config, shaper, caches)
                .await?;
        }
        let advances = self.fullwidth_advances.entry(font.face_index()).or_default();
        for direction in Direction::ALL {
            if let Some(advance) = font.custom_fullwidth_advance(direction) {
                advances.set(direction, advance);
            }
        }
        Ok(())
    }

    /// Whether `font` already has contextual spacing in any direction.
    pub fn font_has_feature<F: Font + ?Sized>(font: &F) -> bool {
        font.has_gpos_feature(CHWS) || (font.has_vertical_form() && font.has_gpos_feature(VCHW))
    }

    /// Whether the ASCII glyphs of `font` all have the same advance.
    pub async fn is_monospace_ascii<F, S>(font: &F, shaper: &S) -> Result<bool>
    where
        F: Font + ?Sized,
        S: Shaper<F> + ?Sized,
    {
        let request = ShapeRequest::new(MONOSPACE_PROBE, Direction::Horizontal);
        let glyphs = shaper.shape(font, &request).await?;
        let advances: BTreeSet<i32> = glyphs.iter().map(|glyph| glyph.advance).collect();
        debug!("ASCII advances of \"{font}\": {advances:?}");
        Ok(advances.len() == 1)
    }

    /// Adds the GPOS features of both directions to `font`.
    ///
    /// Returns `true` if the font was changed.
    pub fn add_to_font<F: Font + ?Sized>(&mut self, font: &mut F) -> Result<bool> {
        let mut changed = lookups::synthesize(font, Direction::Horizontal, &self.horizontal)?
            .is_some();
        if font.has_vertical_form() {
            changed |= lookups::synthesize(font, Direction::Vertical, &self.vertical)?.is_some();
        }
        if changed {
            info!("Added features to \"{font}\": {self}");
            self.changed_faces.push(font.face_index());
        }
        Ok(changed)
    }

    pub fn unite(&mut self, other: EastAsianSpacing) {
        self.horizontal.unite(other.horizontal);
        self.vertical.unite(other.vertical);
        self.changed_faces.extend(other.changed_faces);
        self.fullwidth_advances.extend(other.fullwidth_advances);
    }

    /// Writes the glyph ids of both directions, vertical ones prefixed with
    /// `vertical.`.
    pub fn save_glyphs(&self, output: &mut dyn io::Write, comment: u8) -> io::Result<()> {
        self.horizontal.save_glyphs(output, "", comment)?;
        self.vertical.save_glyphs(output, "vertical.", comment)
    }
}

impl fmt::Display for EastAsianSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, vertical={}", self.horizontal, self.vertical)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        config::{CrossLanguageCheck, Language},
        font::{HALT, VHAL},
        testing::{japanese_shaper, MockFont},
    };

    fn config() -> Config {
        Config::default()
            .with_language(Some(Language::Japanese))
            .with_cross_language_check(CrossLanguageCheck::Off)
    }

    fn add_glyphs(spacing: &mut EastAsianSpacing, font: &mut MockFont) {
        pollster::block_on(spacing.add_glyphs(
            font,
            &config(),
            &japanese_shaper().vertical_glyph('「', None, 212),
            &mut CacheStore::default(),
        ))
        .unwrap();
    }

    #[test]
    fn horizontal_only() {
        let mut font = MockFont::new("Sans");
        let mut spacing = EastAsianSpacing::new();
        add_glyphs(&mut spacing, &mut font);
        assert!(spacing.vertical.left.is_empty());
        assert!(!EastAsianSpacing::font_has_feature(&font));

        assert!(spacing.add_to_font(&mut font).unwrap());
        assert!(font.has_gpos_feature(CHWS));
        assert!(font.has_gpos_feature(HALT));
        assert!(!font.has_gpos_feature(VCHW));
        assert!(EastAsianSpacing::font_has_feature(&font));
        assert_eq!(spacing.changed_faces(), [None]);
    }

    #[test]
    fn both_directions() {
        let mut font = MockFont::new("Sans").with_vertical().with_face_index(2);
        let mut spacing = EastAsianSpacing::new();
        add_glyphs(&mut spacing, &mut font);
        assert_eq!(spacing.vertical.right.glyph_id_set().len(), 1);
        assert!(spacing.add_to_font(&mut font).unwrap());
        assert!(font.has_gpos_feature(VCHW));
        assert!(font.has_gpos_feature(VHAL));
        assert_eq!(spacing.changed_faces(), [Some(2)]);
        assert!(spacing.to_string().contains(", vertical="));
    }

    #[test]
    fn fullwidth_advances_by_face() {
        let mut font = MockFont::new("Sans").with_face_index(1);
        font.units_per_em = 2048;
        let mut spacing = EastAsianSpacing::new();
        add_glyphs(&mut spacing, &mut font);
        assert_eq!(spacing.fullwidth_advance(Some(1), Direction::Horizontal), Some(1000));
        assert_eq!(spacing.fullwidth_advance(Some(1), Direction::Vertical), None);
        assert_eq!(spacing.fullwidth_advance(None, Direction::Horizontal), None);

        let mut other = EastAsianSpacing::new();
        let mut font = MockFont::new("Sans").with_face_index(2);
        add_glyphs(&mut other, &mut font);
        spacing.unite(other);
        assert_eq!(spacing.fullwidth_advance(Some(2), Direction::Horizontal), Some(1000));
    }

    #[test]
    fn nothing_to_add() {
        let mut font = MockFont::new("Sans");
        let mut spacing = EastAsianSpacing::new();
        assert!(!spacing.add_to_font(&mut font).unwrap());
        assert!(spacing.changed_faces().is_empty());
        assert!(font.gpos.is_none());
    }

    #[test]
    fn monospace_ascii() {
        let font = MockFont::new("Sans");
        let shaper = japanese_shaper();
        assert!(pollster::block_on(EastAsianSpacing::is_monospace_ascii(&font, &shaper)).unwrap());
        let shaper = shaper.glyph('i', 130, 250);
        assert!(!pollster::block_on(EastAsianSpacing::is_monospace_ascii(&font, &shaper)).unwrap());
    }

    #[test]
    fn save_glyphs_with_prefix() {
        let mut font = MockFont::new("Sans").with_vertical();
        let mut spacing = EastAsianSpacing::new();
        add_glyphs(&mut spacing, &mut font);
        let mut output = Vec::new();
        spacing.save_glyphs(&mut output, 0).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("# left\n"));
        assert!(output.contains("# vertical.right\n212\n"));
        assert!(!output.contains("filtered"));
    }
}
