//! The font interface used by the spacing engine

use std::{
    collections::BTreeSet,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use kurbo::Rect;
use write_fonts::{tables::gpos::Gpos, types::Tag};

use crate::error::Result;

pub const CHWS: Tag = Tag::new(b"chws");
pub const VCHW: Tag = Tag::new(b"vchw");
pub const HALT: Tag = Tag::new(b"halt");
pub const VHAL: Tag = Tag::new(b"vhal");
pub const FWID: Tag = Tag::new(b"fwid");
pub const VERT: Tag = Tag::new(b"vert");

const GSUB: Tag = Tag::new(b"GSUB");
const MORX: Tag = Tag::new(b"morx");

/// Identifies a root font: a font file, or a collection and all of its faces.
///
/// Caches that must be shared by the faces of a collection are keyed by this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontKey(u64);

impl FontKey {
    pub const fn new(id: u64) -> Self {
        FontKey(id)
    }

    /// A key that is distinct from every other key created by this method.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FontKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The writing direction glyphs are shaped and positioned in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    #[default]
    Horizontal,
    Vertical,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Horizontal, Direction::Vertical];

    pub fn is_vertical(self) -> bool {
        self == Direction::Vertical
    }

    /// `chws` or `vchw`.
    pub fn chws_feature(self) -> Tag {
        match self {
            Direction::Horizontal => CHWS,
            Direction::Vertical => VCHW,
        }
    }

    /// `halt` or `vhal`.
    pub fn halt_feature(self) -> Tag {
        match self {
            Direction::Horizontal => HALT,
            Direction::Vertical => VHAL,
        }
    }

    /// The features to shape with when classifying glyphs.
    ///
    /// `fwid` selects fullwidth forms; vertical shaping also needs `vert`.
    pub fn shaping_features(self, fullwidth: bool) -> Vec<Tag> {
        let mut features = Vec::with_capacity(2);
        if fullwidth {
            features.push(FWID);
        }
        if self.is_vertical() {
            features.push(VERT);
        }
        features
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Horizontal => f.write_str("horizontal"),
            Direction::Vertical => f.write_str("vertical"),
        }
    }
}

/// The fullwidth advance of a font in each direction, when it is not the
/// units per em.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FullwidthAdvances {
    horizontal: Option<u16>,
    vertical: Option<u16>,
}

impl FullwidthAdvances {
    pub fn get(&self, direction: Direction) -> Option<u16> {
        match direction {
            Direction::Horizontal => self.horizontal,
            Direction::Vertical => self.vertical,
        }
    }

    pub fn set(&mut self, direction: Direction, advance: u16) {
        match direction {
            Direction::Horizontal => self.horizontal = Some(advance),
            Direction::Vertical => self.vertical = Some(advance),
        }
    }
}

/// A font face the spacing engine can inspect and add GPOS features to.
///
/// The `Display` implementation identifies the face in log messages.
pub trait Font: fmt::Display {
    /// The root font this face belongs to.
    fn root_key(&self) -> FontKey;

    /// The index of this face in its collection, `None` for a single font.
    fn face_index(&self) -> Option<u32>;

    /// The typographic family name, falling back to the family name.
    fn family_name(&self) -> Option<&str>;

    fn units_per_em(&self) -> u16;

    /// The fullwidth advance explicitly set for `direction`, if any.
    fn custom_fullwidth_advance(&self, direction: Direction) -> Option<u16>;

    fn set_fullwidth_advance(&mut self, direction: Direction, advance: u16);

    /// The advance of fullwidth glyphs; the units per em unless calibrated.
    fn fullwidth_advance(&self, direction: Direction) -> u16 {
        self.custom_fullwidth_advance(direction)
            .unwrap_or_else(|| self.units_per_em())
    }

    fn has_gsub_feature(&self, tag: Tag) -> bool;

    /// Whether GPOS has `tag`, including features added to this face since
    /// it was loaded.
    fn has_gpos_feature(&self, tag: Tag) -> bool;

    fn has_table(&self, tag: Tag) -> bool;

    /// Script and language system tags of GSUB and GPOS, `None` standing for
    /// the default language system.
    fn script_and_langsys_tags(&self) -> BTreeSet<(Tag, Option<Tag>)>;

    /// The ink bounds of a glyph in font units, `None` for an empty glyph.
    fn glyph_bounds(&self, glyph_id: u32) -> Option<Rect>;

    /// The ink bounds of each of `glyph_ids`.
    fn glyphs_bounds(&self, glyph_ids: &[u32]) -> Vec<Option<Rect>> {
        glyph_ids.iter().map(|id| self.glyph_bounds(*id)).collect()
    }

    fn glyph_name(&self, glyph_id: u32) -> String {
        format!("gid{glyph_id}")
    }

    /// The offset of a table in the font data.
    ///
    /// Faces of a collection that share a table report the same offset.
    fn reader_offset(&self, tag: Tag) -> Option<u64>;

    /// The mutable GPOS table of this face.
    ///
    /// When the face has none, a new empty table is created if `create` is
    /// `true`, otherwise `None` is returned. Reading the table does not mark
    /// it modified; see [`Font::set_gpos_changed`].
    fn gpos_table(&mut self, create: bool) -> Result<Option<&mut Gpos>>;

    /// Marks the GPOS table as modified, to be written when the font is saved.
    fn set_gpos_changed(&mut self) {}

    /// Whether glyphs have vertical alternates, which is when vertical
    /// spacing is worth adding.
    fn has_vertical_form(&self) -> bool {
        self.has_gsub_feature(VERT)
    }

    /// Whether the font relies on AAT `morx` for its layout.
    fn is_aat_morx(&self) -> bool {
        self.has_table(MORX) && !self.has_table(GSUB)
    }

    fn glyph_names(&self, glyph_ids: &[u32]) -> Vec<String> {
        glyph_ids.iter().map(|id| self.glyph_name(*id)).collect()
    }
}
