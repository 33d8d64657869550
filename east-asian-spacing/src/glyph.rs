//! Shaped glyphs and lists of them

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use kurbo::Rect;

use crate::font::{Direction, Font};

/// Which part of its advance a glyph's ink occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InkPart {
    Left,
    Right,
    Middle,
    Other,
}

impl InkPart {
    /// Classifies the ink range `min..=max` within the advance `left..right`.
    ///
    /// `margin` widens each region, in font units.
    pub fn compute(min: f64, max: f64, left: f64, right: f64, margin: f64) -> InkPart {
        if left >= right || min > max {
            return InkPart::Other;
        }
        let middle = (left + right) / 2.0;
        if max <= middle + margin {
            return InkPart::Left;
        }
        if min >= middle - margin {
            return InkPart::Right;
        }
        let quarter_left = (left + middle) / 2.0;
        let quarter_right = (middle + right) / 2.0;
        if min >= quarter_left - margin && max <= quarter_right + margin {
            return InkPart::Middle;
        }
        InkPart::Other
    }
}

impl fmt::Display for InkPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InkPart::Left => "L",
            InkPart::Right => "R",
            InkPart::Middle => "M",
            InkPart::Other => "O",
        };
        f.write_str(name)
    }
}

/// A glyph produced by shaping.
///
/// For vertical shaping, `advance` and `offset` are the negated y advance and
/// y offset, so that both grow in the writing direction.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphData {
    pub glyph_id: u32,
    /// The UTF-8 byte offset of the cluster in the shaped text.
    pub cluster_index: Option<u32>,
    pub advance: i32,
    pub offset: i32,
    /// The text the glyph was shaped from.
    pub text: Option<String>,
    pub bounds: Option<Rect>,
    pub ink_part: Option<InkPart>,
}

impl GlyphData {
    pub fn new(glyph_id: u32, cluster_index: u32, advance: i32, offset: i32) -> Self {
        GlyphData {
            glyph_id,
            cluster_index: Some(cluster_index),
            advance,
            offset,
            text: None,
            bounds: None,
            ink_part: None,
        }
    }

    /// Reads the ink bounds from `font` and classifies them.
    pub fn compute_ink_part<F: Font + ?Sized>(
        &mut self,
        font: &F,
        direction: Direction,
        margin: f64,
    ) -> InkPart {
        self.set_ink_bounds(font.glyph_bounds(self.glyph_id), direction, margin)
    }

    /// Classifies `bounds`, the ink bounds of this glyph.
    pub fn set_ink_bounds(&mut self, bounds: Option<Rect>, direction: Direction, margin: f64) -> InkPart {
        self.bounds = bounds;
        let part = match self.bounds {
            None => InkPart::Other,
            Some(bounds) if direction.is_vertical() => {
                // Font units grow upwards, vertical advances downwards.
                let offset = self.offset as f64;
                InkPart::compute(
                    offset - bounds.y1,
                    offset - bounds.y0,
                    0.0,
                    self.advance as f64,
                    margin,
                )
            }
            Some(bounds) => InkPart::compute(bounds.x0, bounds.x1, 0.0, self.advance as f64, margin),
        };
        self.ink_part = Some(part);
        part
    }
}

impl fmt::Display for GlyphData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        if let Some(text) = &self.text {
            write!(f, "t:{text:?},")?;
        }
        if let Some(cluster) = self.cluster_index {
            write!(f, "c:{cluster},")?;
        }
        write!(f, "g:{},a:{},o:{}", self.glyph_id, self.advance, self.offset)?;
        if let Some(bounds) = self.bounds {
            write!(
                f,
                ",b:({},{},{},{})",
                bounds.x0, bounds.y0, bounds.x1, bounds.y1
            )?;
        }
        if let Some(part) = self.ink_part {
            write!(f, ",i:{part}")?;
        }
        f.write_str("}")
    }
}

/// An ordered list of shaped glyphs.
///
/// The same glyph id may appear more than once; set operations compare glyph
/// ids only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphDataList {
    glyphs: Vec<GlyphData>,
}

impl GlyphDataList {
    pub fn new(glyphs: Vec<GlyphData>) -> Self {
        GlyphDataList { glyphs }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GlyphData> {
        self.glyphs.iter()
    }

    pub fn push(&mut self, glyph: GlyphData) {
        self.glyphs.push(glyph);
    }

    pub fn clear(&mut self) {
        self.glyphs.clear();
    }

    pub fn glyph_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.glyphs.iter().map(|glyph| glyph.glyph_id)
    }

    pub fn glyph_id_set(&self) -> BTreeSet<u32> {
        self.glyph_ids().collect()
    }

    /// Returns `true` if both lists have the same glyph ids in the same order.
    pub fn has_same_glyph_ids(&self, other: &GlyphDataList) -> bool {
        self.glyph_ids().eq(other.glyph_ids())
    }

    pub fn is_disjoint(&self, other: &GlyphDataList) -> bool {
        self.glyph_id_set().is_disjoint(&other.glyph_id_set())
    }

    pub fn contains(&self, glyph_id: u32) -> bool {
        self.glyph_ids().any(|id| id == glyph_id)
    }

    /// Removes the glyphs whose ids are in `other`.
    pub fn subtract(&mut self, other: &GlyphDataList) {
        self.remove_glyph_ids(&other.glyph_id_set());
    }

    pub fn remove_glyph_ids(&mut self, glyph_ids: &BTreeSet<u32>) {
        self.glyphs
            .retain(|glyph| !glyph_ids.contains(&glyph.glyph_id));
    }

    /// Keeps the glyphs `predicate` accepts, moving the rest to `non_match`
    /// if given.
    pub fn filter(
        &mut self,
        mut predicate: impl FnMut(&GlyphData) -> bool,
        non_match: Option<&mut GlyphDataList>,
    ) {
        let (matched, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.glyphs)
            .into_iter()
            .partition(|glyph| predicate(glyph));
        self.glyphs = matched;
        if let Some(non_match) = non_match {
            non_match.extend(rest);
        }
    }

    pub fn filter_advance(&mut self, advance: u16, non_match: Option<&mut GlyphDataList>) {
        self.filter(|glyph| glyph.advance == i32::from(advance), non_match);
    }

    pub fn filter_ink_part(&mut self, part: InkPart, non_match: Option<&mut GlyphDataList>) {
        self.filter(|glyph| glyph.ink_part == Some(part), non_match);
    }

    /// Removes `.notdef` glyphs.
    pub fn filter_missing_glyphs(&mut self) {
        self.glyphs.retain(|glyph| glyph.glyph_id != 0);
    }

    /// Sets the text of each glyph from its cluster index into `text`.
    pub fn set_text(&mut self, text: &str) {
        let starts: Vec<_> = self
            .glyphs
            .iter()
            .map(|glyph| glyph.cluster_index.map(|c| c as usize))
            .collect();
        for (i, glyph) in self.glyphs.iter_mut().enumerate() {
            let Some(start) = starts[i] else {
                continue;
            };
            let end = starts[i + 1..]
                .iter()
                .flatten()
                .copied()
                .find(|end| *end != start)
                .unwrap_or(text.len());
            glyph.text = text.get(start..end).map(str::to_owned);
        }
    }

    pub fn clear_cluster_indexes(&mut self) {
        for glyph in &mut self.glyphs {
            glyph.cluster_index = None;
        }
    }

    pub fn compute_ink_parts<F: Font + ?Sized>(
        &mut self,
        font: &F,
        direction: Direction,
        margin: f64,
    ) {
        let glyph_ids: Vec<u32> = self.glyphs.iter().map(|glyph| glyph.glyph_id).collect();
        let bounds = font.glyphs_bounds(&glyph_ids);
        for (glyph, bounds) in self.glyphs.iter_mut().zip(bounds) {
            glyph.set_ink_bounds(bounds, direction, margin);
        }
    }

    /// Groups glyphs by id, skipping glyphs that repeat an earlier entry.
    pub fn group_by_glyph_id(&self) -> BTreeMap<u32, Vec<&GlyphData>> {
        let mut groups: BTreeMap<u32, Vec<&GlyphData>> = BTreeMap::new();
        for glyph in &self.glyphs {
            let group = groups.entry(glyph.glyph_id).or_default();
            if !group.contains(&glyph) {
                group.push(glyph);
            }
        }
        groups
    }
}

impl Extend<GlyphData> for GlyphDataList {
    fn extend<T: IntoIterator<Item = GlyphData>>(&mut self, iter: T) {
        self.glyphs.extend(iter);
    }
}

impl FromIterator<GlyphData> for GlyphDataList {
    fn from_iter<T: IntoIterator<Item = GlyphData>>(iter: T) -> Self {
        GlyphDataList {
            glyphs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for GlyphDataList {
    type Item = GlyphData;
    type IntoIter = std::vec::IntoIter<GlyphData>;

    fn into_iter(self) -> Self::IntoIter {
        self.glyphs.into_iter()
    }
}

impl<'a> IntoIterator for &'a GlyphDataList {
    type Item = &'a GlyphData;
    type IntoIter = std::slice::Iter<'a, GlyphData>;

    fn into_iter(self) -> Self::IntoIter {
        self.glyphs.iter()
    }
}

impl fmt::Display for GlyphDataList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, glyph) in self.glyphs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{glyph}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[u32]) -> GlyphDataList {
        ids.iter().map(|id| GlyphData::new(*id, 0, 1000, 0)).collect()
    }

    #[test]
    fn ink_part_horizontal() {
        // advance 0..1000, middle 500, quarters 250 and 750
        assert_eq!(InkPart::compute(100., 400., 0., 1000., 0.), InkPart::Left);
        assert_eq!(InkPart::compute(100., 500., 0., 1000., 0.), InkPart::Left);
        assert_eq!(InkPart::compute(600., 900., 0., 1000., 0.), InkPart::Right);
        assert_eq!(InkPart::compute(300., 700., 0., 1000., 0.), InkPart::Middle);
        assert_eq!(InkPart::compute(100., 900., 0., 1000., 0.), InkPart::Other);
        assert_eq!(InkPart::compute(200., 700., 0., 1000., 0.), InkPart::Other);
    }

    #[test]
    fn ink_part_margin() {
        assert_eq!(InkPart::compute(100., 520., 0., 1000., 0.), InkPart::Other);
        assert_eq!(InkPart::compute(100., 520., 0., 1000., 30.), InkPart::Left);
        assert_eq!(InkPart::compute(230., 700., 0., 1000., 30.), InkPart::Middle);
    }

    #[test]
    fn ink_part_degenerate_advance() {
        assert_eq!(InkPart::compute(0., 10., 0., 0., 0.), InkPart::Other);
    }

    #[test]
    fn display() {
        let mut glyph = GlyphData::new(5, 3, 1000, -500);
        glyph.text = Some("「".into());
        glyph.ink_part = Some(InkPart::Right);
        assert_eq!(glyph.to_string(), "{t:\"「\",c:3,g:5,a:1000,o:-500,i:R}");
    }

    #[test]
    fn set_text_from_clusters() {
        let text = "a「」";
        let mut glyphs = GlyphDataList::new(vec![
            GlyphData::new(1, 0, 500, 0),
            GlyphData::new(2, 1, 1000, 0),
            GlyphData::new(3, 4, 1000, 0),
        ]);
        glyphs.set_text(text);
        let texts: Vec<_> = glyphs.iter().map(|g| g.text.as_deref()).collect();
        assert_eq!(texts, [Some("a"), Some("「"), Some("」")]);
    }

    #[test]
    fn filter_with_non_match() {
        let mut glyphs = GlyphDataList::new(vec![
            GlyphData::new(1, 0, 1000, 0),
            GlyphData::new(2, 0, 500, 0),
            GlyphData::new(3, 0, 1000, 0),
        ]);
        let mut rest = GlyphDataList::default();
        glyphs.filter_advance(1000, Some(&mut rest));
        assert_eq!(glyphs.glyph_ids().collect::<Vec<_>>(), [1, 3]);
        assert_eq!(rest.glyph_ids().collect::<Vec<_>>(), [2]);
    }

    #[test]
    fn filter_ink_part_keeps_empty_non_match() {
        let mut glyphs = list(&[1, 2]);
        let mut rest = GlyphDataList::default();
        glyphs.filter_ink_part(InkPart::Left, Some(&mut rest));
        assert!(glyphs.is_empty());
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn set_operations() {
        let mut a = list(&[1, 2, 3, 2]);
        let b = list(&[2, 4]);
        assert!(!a.is_disjoint(&b));
        a.subtract(&b);
        assert_eq!(a.glyph_ids().collect::<Vec<_>>(), [1, 3]);
        assert!(a.is_disjoint(&b));
        assert!(a.has_same_glyph_ids(&list(&[1, 3])));
        assert!(!a.has_same_glyph_ids(&list(&[3, 1])));
    }

    #[test]
    fn missing_glyphs() {
        let mut glyphs = list(&[0, 7, 0]);
        glyphs.filter_missing_glyphs();
        assert_eq!(glyphs.glyph_ids().collect::<Vec<_>>(), [7]);
    }

    #[test]
    fn group_by_glyph_id() {
        let mut glyphs = list(&[2, 1, 2]);
        glyphs.push(GlyphData::new(2, 0, 500, 0));
        let groups = glyphs.group_by_glyph_id();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(groups[&2].len(), 2);
    }
}
