//! Keeping glyph classification consistent across the faces of a collection

use std::{collections::HashMap, fmt};

use crate::{
    error::{Error, Result},
    font::{Direction, Font, FontKey},
    glyph::{GlyphData, GlyphDataList},
    glyph_sets::GlyphSets,
};

/// The position of the ink that spacing removes blank space around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlyphType {
    Left,
    Middle,
    Right,
}

impl fmt::Display for GlyphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphType::Left => f.write_str("left"),
            GlyphType::Middle => f.write_str("middle"),
            GlyphType::Right => f.write_str("right"),
        }
    }
}

/// Remembers the type of each glyph classified for a root font.
///
/// Faces of a collection share glyphs; a glyph must not change its type from
/// one face to another.
#[derive(Clone, Debug, Default)]
pub struct ConsistencyCache {
    types: HashMap<u32, GlyphType>,
}

impl ConsistencyCache {
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, glyph_id: u32) -> Option<GlyphType> {
        self.types.get(&glyph_id).copied()
    }

    /// Moves the glyphs this cache knows from `glyphs` to the matching lists of
    /// `glyph_sets`, and returns the rest.
    pub fn split_cached(&self, glyphs: GlyphDataList, glyph_sets: &mut GlyphSets) -> GlyphDataList {
        glyphs
            .into_iter()
            .filter_map(|glyph| match self.get(glyph.glyph_id) {
                Some(glyph_type) => {
                    glyph_sets.list_mut(glyph_type).push(glyph);
                    None
                }
                None => Some(glyph),
            })
            .collect()
    }

    /// Records the types of all glyphs in `glyph_sets`.
    ///
    /// Fails if a glyph was recorded with a different type before.
    pub fn add_glyph_sets<F: Font + ?Sized>(&mut self, glyph_sets: &GlyphSets, font: &F) -> Result<()> {
        for glyph_type in [GlyphType::Left, GlyphType::Middle, GlyphType::Right] {
            for glyph in glyph_sets.list(glyph_type) {
                self.add(glyph, glyph_type, font)?;
            }
        }
        Ok(())
    }

    fn add<F: Font + ?Sized>(&mut self, glyph: &GlyphData, glyph_type: GlyphType, font: &F) -> Result<()> {
        match self.types.get(&glyph.glyph_id) {
            Some(cached) if *cached != glyph_type => Err(Error::CacheConsistency {
                font: font.to_string(),
                glyph_id: glyph.glyph_id,
                cached: *cached,
                requested: glyph_type,
            }),
            Some(_) => Ok(()),
            None => {
                self.types.insert(glyph.glyph_id, glyph_type);
                Ok(())
            }
        }
    }
}

/// The caches of every root font and direction in a build.
///
/// Vertical glyphs are cached separately: the same glyph may be used in both
/// directions with different types.
#[derive(Clone, Debug, Default)]
pub struct CacheStore {
    caches: HashMap<(FontKey, Direction), ConsistencyCache>,
}

impl CacheStore {
    pub fn get(&self, key: FontKey, direction: Direction) -> Option<&ConsistencyCache> {
        self.caches.get(&(key, direction))
    }

    pub fn get_or_create(&mut self, key: FontKey, direction: Direction) -> &mut ConsistencyCache {
        self.caches.entry((key, direction)).or_default()
    }
}
