//! An in-memory font and a table-driven shaper for tests

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use kurbo::Rect;
use write_fonts::{tables::gpos::Gpos, types::Tag};

use crate::{
    config::Language,
    error::Result,
    font::{Direction, Font, FontKey, FullwidthAdvances, FWID, VERT},
    glyph::{GlyphData, GlyphDataList},
    glyph_sets::GlyphSets,
    lookups,
    shaper::{ShapeRequest, Shaper},
};

pub(crate) struct MockFont {
    pub key: FontKey,
    pub name: String,
    pub face_index: Option<u32>,
    pub units_per_em: u16,
    pub fullwidth_advances: FullwidthAdvances,
    pub gsub_features: BTreeSet<Tag>,
    pub tables: BTreeSet<Tag>,
    pub scripts: BTreeSet<(Tag, Option<Tag>)>,
    pub bounds: HashMap<u32, Rect>,
    pub gpos_offset: Option<u64>,
    pub gpos: Option<Gpos>,
}

impl MockFont {
    pub fn new(name: &str) -> Self {
        MockFont {
            key: FontKey::unique(),
            name: name.to_owned(),
            face_index: None,
            units_per_em: 1000,
            fullwidth_advances: FullwidthAdvances::default(),
            gsub_features: BTreeSet::new(),
            tables: BTreeSet::from([Tag::new(b"GSUB")]),
            scripts: BTreeSet::from([(Tag::new(b"hani"), None)]),
            bounds: HashMap::new(),
            gpos_offset: None,
            gpos: None,
        }
    }

    pub fn with_face_index(mut self, index: u32) -> Self {
        self.face_index = Some(index);
        self
    }

    pub fn with_key(mut self, key: FontKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_vertical(mut self) -> Self {
        self.gsub_features.insert(VERT);
        self
    }

    pub fn with_bounds(mut self, glyph_id: u32, bounds: Rect) -> Self {
        self.bounds.insert(glyph_id, bounds);
        self
    }
}

impl fmt::Display for MockFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(index) = self.face_index {
            write!(f, " ({index})")?;
        }
        Ok(())
    }
}

impl Font for MockFont {
    fn root_key(&self) -> FontKey {
        self.key
    }

    fn face_index(&self) -> Option<u32> {
        self.face_index
    }

    fn family_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    fn custom_fullwidth_advance(&self, direction: Direction) -> Option<u16> {
        self.fullwidth_advances.get(direction)
    }

    fn set_fullwidth_advance(&mut self, direction: Direction, advance: u16) {
        self.fullwidth_advances.set(direction, advance);
    }

    fn has_gsub_feature(&self, tag: Tag) -> bool {
        self.gsub_features.contains(&tag)
    }

    fn has_gpos_feature(&self, tag: Tag) -> bool {
        self.gpos
            .as_ref()
            .is_some_and(|gpos| lookups::has_feature(gpos, tag))
    }

    fn has_table(&self, tag: Tag) -> bool {
        self.tables.contains(&tag)
    }

    fn script_and_langsys_tags(&self) -> BTreeSet<(Tag, Option<Tag>)> {
        self.scripts.clone()
    }

    fn glyph_bounds(&self, glyph_id: u32) -> Option<Rect> {
        self.bounds.get(&glyph_id).copied()
    }

    fn reader_offset(&self, _tag: Tag) -> Option<u64> {
        self.gpos_offset
    }

    fn gpos_table(&mut self, create: bool) -> Result<Option<&mut Gpos>> {
        if self.gpos.is_none() && create {
            self.gpos = Some(lookups::new_gpos());
        }
        Ok(self.gpos.as_mut())
    }
}

#[derive(Clone, Copy, Debug)]
struct MockGlyph {
    glyph_id: u32,
    advance: i32,
}

/// Maps characters to glyphs, optionally per language and direction.
///
/// Characters without a vertical entry shape to their horizontal glyph in
/// vertical text. Unknown characters shape to `.notdef`. When `fwid` is off,
/// characters with a proportional entry use it.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockShaper {
    glyphs: HashMap<(char, Option<Language>, Direction), MockGlyph>,
    proportional: HashMap<char, MockGlyph>,
    /// Positioning features applied when requested.
    pub features: HashMap<Tag, MockFeature>,
}

/// A contextual positioning feature, as `(advance delta, offset delta)` of
/// glyph ids.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockFeature {
    /// Adjusted when followed by a glyph in `first_context`.
    pub first: HashMap<u32, (i32, i32)>,
    pub first_context: BTreeSet<u32>,
    /// Adjusted when preceded by a glyph in `second_context`.
    pub second: HashMap<u32, (i32, i32)>,
    pub second_context: BTreeSet<u32>,
}

impl MockFeature {
    /// Behaves like the `chws` lookups built for `glyph_sets`.
    pub fn chws(glyph_sets: &GlyphSets, em: u16) -> Self {
        let half = i32::from(em / 2);
        let ids = |lists: &[&GlyphDataList]| -> BTreeSet<u32> {
            lists.iter().flat_map(|list| list.glyph_ids()).collect()
        };
        MockFeature {
            first: ids(&[&glyph_sets.left])
                .into_iter()
                .map(|id| (id, (-half, 0)))
                .collect(),
            first_context: ids(&[
                &glyph_sets.left,
                &glyph_sets.right,
                &glyph_sets.middle,
                &glyph_sets.space,
                &glyph_sets.na_left,
            ]),
            second: ids(&[&glyph_sets.right])
                .into_iter()
                .map(|id| (id, (-half, -half)))
                .collect(),
            second_context: ids(&[
                &glyph_sets.right,
                &glyph_sets.middle,
                &glyph_sets.space,
                &glyph_sets.na_right,
            ]),
        }
    }
}

impl MockShaper {
    pub fn glyph(mut self, ch: char, glyph_id: u32, advance: i32) -> Self {
        self.glyphs.insert(
            (ch, None, Direction::Horizontal),
            MockGlyph { glyph_id, advance },
        );
        self
    }

    /// Adds glyphs for all of `chars`, with consecutive ids from `first_id`.
    pub fn glyphs(mut self, chars: &str, first_id: u32, advance: i32) -> Self {
        for (i, ch) in chars.chars().enumerate() {
            self = self.glyph(ch, first_id + i as u32, advance);
        }
        self
    }

    pub fn language_glyph(mut self, ch: char, language: Language, glyph_id: u32) -> Self {
        self.glyphs.insert(
            (ch, Some(language), Direction::Horizontal),
            MockGlyph {
                glyph_id,
                advance: 1000,
            },
        );
        self
    }

    pub fn vertical_glyph(mut self, ch: char, language: Option<Language>, glyph_id: u32) -> Self {
        self.glyphs.insert(
            (ch, language, Direction::Vertical),
            MockGlyph {
                glyph_id,
                advance: 1000,
            },
        );
        self
    }

    pub fn with_feature(mut self, tag: Tag, feature: MockFeature) -> Self {
        self.features.insert(tag, feature);
        self
    }

    pub fn proportional_glyph(mut self, ch: char, glyph_id: u32, advance: i32) -> Self {
        self.proportional
            .insert(ch, MockGlyph { glyph_id, advance });
        self
    }

    fn lookup(&self, ch: char, request: &ShapeRequest) -> Option<MockGlyph> {
        if !request.features.contains(&FWID) {
            if let Some(glyph) = self.proportional.get(&ch) {
                return Some(*glyph);
            }
        }
        let mut keys = vec![];
        if request.direction.is_vertical() {
            keys.push((ch, request.language, Direction::Vertical));
            keys.push((ch, None, Direction::Vertical));
        }
        keys.push((ch, request.language, Direction::Horizontal));
        keys.push((ch, None, Direction::Horizontal));
        keys.iter().find_map(|key| self.glyphs.get(key).copied())
    }
}

impl<F: Font + ?Sized> Shaper<F> for MockShaper {
    async fn shape(&self, _font: &F, request: &ShapeRequest<'_>) -> Result<GlyphDataList> {
        let mut glyphs: Vec<GlyphData> = request
            .text
            .char_indices()
            .map(|(index, ch)| {
                let glyph = self.lookup(ch, request).unwrap_or(MockGlyph {
                    glyph_id: 0,
                    advance: 500,
                });
                GlyphData::new(glyph.glyph_id, index as u32, glyph.advance, 0)
            })
            .collect();
        for tag in &request.features {
            let Some(feature) = self.features.get(tag) else {
                continue;
            };
            for i in 1..glyphs.len() {
                let previous = glyphs[i - 1].glyph_id;
                let current = glyphs[i].glyph_id;
                if feature.first_context.contains(&current) {
                    if let Some((advance, offset)) = feature.first.get(&previous) {
                        glyphs[i - 1].advance += advance;
                        glyphs[i - 1].offset += offset;
                    }
                }
                if feature.second_context.contains(&previous) {
                    if let Some((advance, offset)) = feature.second.get(&current) {
                        glyphs[i].advance += advance;
                        glyphs[i].offset += offset;
                    }
                }
            }
        }
        Ok(GlyphDataList::new(glyphs))
    }
}

/// Shaping results for a Japanese font where CJK punctuation differs by
/// language only in the glyphs the language conventions require.
///
/// Glyph ids: opening brackets and quotes from 10, closing from 40, the
/// middle dot 70, the ideographic space 71, period and comma 80..84 (85, 86
/// as the ZHT forms of 、。), colon and semicolon 90..92 (92, 93 as ZHS
/// forms), exclamation and question 95..97 (97, 98 as ZHS forms), narrow
/// forms from 100, probe ideographs from 120.
pub(crate) fn japanese_shaper() -> MockShaper {
    MockShaper::default()
        .glyphs("〈《「『【〔〖〘〚〝（［｛｟‘“", 10, 1000)
        .glyphs("〉》」』】〕〗〙〛〞〟）］｝｠’”", 40, 1000)
        .glyph('・', 70, 1000)
        .glyph('\u{3000}', 71, 1000)
        .glyphs("、。，．", 80, 1000)
        .language_glyph('、', Language::TraditionalChinese, 85)
        .language_glyph('。', Language::TraditionalChinese, 86)
        .glyphs("：；", 90, 1000)
        .language_glyph('：', Language::SimplifiedChinese, 92)
        .language_glyph('；', Language::SimplifiedChinese, 93)
        .glyphs("！？", 95, 1000)
        .language_glyph('！', Language::SimplifiedChinese, 97)
        .language_glyph('？', Language::SimplifiedChinese, 98)
        .glyphs("([｢)]｣", 100, 500)
        .glyphs("四水城", 120, 1000)
        .glyphs("iIMW", 130, 600)
}
