//! Font files and their faces, backed by the fontations crates

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use kurbo::{BezPath, Point, Rect, Shape};
use log::debug;
use skrifa::{
    outline::{DrawSettings, OutlinePen},
    prelude::{LocationRef, Size},
    string::StringId,
    MetadataProvider,
};
use write_fonts::{
    from_obj::ToOwnedTable,
    read::{
        tables::layout::{FeatureList, ScriptList},
        FileRef, FontRef, ReadError, TableProvider,
    },
    tables::gpos::Gpos,
    types::{GlyphId, GlyphId16, Tag},
    FontBuilder,
};

use crate::{
    error::{Error, Result},
    font::{Direction, Font, FontKey, FullwidthAdvances},
    lookups,
};

const GPOS: Tag = Tag::new(b"GPOS");
const TTC_TAG: &[u8; 4] = b"ttcf";
const TTC_HEADER_LEN: usize = 12;
const TABLE_DIRECTORY_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;

/// A font file: a single font or a collection of faces.
#[derive(Debug)]
pub struct FontFile {
    path: Option<PathBuf>,
    is_collection: bool,
    faces: Vec<OpenTypeFace>,
}

impl FontFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|error| Error::io(path, error))?;
        let mut file = FontFile::from_data(data)?;
        file.path = Some(path.to_owned());
        Ok(file)
    }

    /// Parses a font or a collection from memory.
    pub fn from_data(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data = data.into();
        let key = FontKey::unique();
        let (is_collection, num_faces) = match FileRef::new(&data)? {
            FileRef::Font(_) => (false, 1),
            FileRef::Collection(collection) => (true, collection.len()),
        };
        let faces = (0..num_faces)
            .map(|index| OpenTypeFace::new(key, data.clone(), is_collection.then_some(index)))
            .collect::<Result<Vec<_>>>()?;
        Ok(FontFile {
            path: None,
            is_collection,
            faces,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn faces(&self) -> &[OpenTypeFace] {
        &self.faces
    }

    pub fn faces_mut(&mut self) -> &mut [OpenTypeFace] {
        &mut self.faces
    }

    pub fn into_faces(self) -> Vec<OpenTypeFace> {
        self.faces
    }

    /// Returns `true` if any face has a modified GPOS table.
    pub fn is_changed(&self) -> bool {
        self.faces.iter().any(|face| face.gpos_changed)
    }

    /// Compiles the font file, with the modified GPOS tables of all faces.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if !self.is_collection {
            return match self.faces.first() {
                Some(face) => face.to_bytes(),
                None => Ok(Vec::new()),
            };
        }
        let faces = self
            .faces
            .iter()
            .map(OpenTypeFace::to_bytes)
            .collect::<Result<Vec<_>>>()?;
        write_collection(&faces)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| Error::io(parent, error))?;
        }
        fs::write(path, bytes).map_err(|error| Error::io(path, error))
    }
}

/// Feature and script tags of a GSUB or GPOS table.
#[derive(Clone, Debug, Default)]
struct LayoutTags {
    features: BTreeSet<Tag>,
    scripts: BTreeSet<(Tag, Option<Tag>)>,
}

impl LayoutTags {
    fn new(
        script_list: Result<ScriptList, ReadError>,
        feature_list: Result<FeatureList, ReadError>,
    ) -> Result<Self, ReadError> {
        let mut tags = LayoutTags::default();
        let feature_list = feature_list?;
        tags.features = feature_list
            .feature_records()
            .iter()
            .map(|record| record.feature_tag())
            .collect();
        let script_list = script_list?;
        for record in script_list.script_records() {
            let script_tag = record.script_tag();
            let script = record.script(script_list.offset_data())?;
            if script.default_lang_sys().is_some() {
                tags.scripts.insert((script_tag, None));
            }
            for lang_sys in script.lang_sys_records() {
                tags.scripts
                    .insert((script_tag, Some(lang_sys.lang_sys_tag())));
            }
        }
        Ok(tags)
    }
}

/// One face of a [`FontFile`].
///
/// Tables are read from the shared file data; only GPOS is held as an owned
/// table, once it is requested for modification.
pub struct OpenTypeFace {
    key: FontKey,
    data: Arc<[u8]>,
    face_index: Option<u32>,
    full_name: String,
    family_name: Option<String>,
    units_per_em: u16,
    fullwidth_advances: FullwidthAdvances,
    table_offsets: BTreeMap<Tag, u64>,
    gsub_tags: LayoutTags,
    gpos_tags: LayoutTags,
    gpos: Option<Gpos>,
    gpos_changed: bool,
}

impl OpenTypeFace {
    fn new(key: FontKey, data: Arc<[u8]>, face_index: Option<u32>) -> Result<Self> {
        let font = FontRef::from_index(&data, face_index.unwrap_or_default())?;
        let units_per_em = font.head()?.units_per_em();
        let table_offsets = font
            .table_directory
            .table_records()
            .iter()
            .map(|record| (record.tag(), record.offset() as u64))
            .collect();
        let gsub_tags = match font.gsub() {
            Ok(gsub) => LayoutTags::new(gsub.script_list(), gsub.feature_list())?,
            Err(ReadError::TableIsMissing(_)) => LayoutTags::default(),
            Err(error) => return Err(error.into()),
        };
        let gpos_tags = match font.gpos() {
            Ok(gpos) => LayoutTags::new(gpos.script_list(), gpos.feature_list())?,
            Err(ReadError::TableIsMissing(_)) => LayoutTags::default(),
            Err(error) => return Err(error.into()),
        };

        let names = skrifa::FontRef::from_index(&data, face_index.unwrap_or_default()).ok();
        let name = |id: StringId| {
            names
                .as_ref()
                .and_then(|font| font.localized_strings(id).english_or_first())
                .map(|name| name.to_string())
        };
        let family_name = name(StringId::TYPOGRAPHIC_FAMILY_NAME).or_else(|| name(StringId::FAMILY_NAME));
        let full_name = name(StringId::FULL_NAME)
            .or_else(|| family_name.clone())
            .unwrap_or_default();

        Ok(OpenTypeFace {
            key,
            face_index,
            full_name,
            family_name,
            units_per_em,
            fullwidth_advances: FullwidthAdvances::default(),
            table_offsets,
            gsub_tags,
            gpos_tags,
            gpos: None,
            gpos_changed: false,
            data,
        })
    }

    /// The data of the whole file this face belongs to.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    fn font_ref(&self) -> Result<FontRef<'_>, ReadError> {
        FontRef::from_index(&self.data, self.face_index.unwrap_or_default())
    }

    /// Compiles this face as a standalone font.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let font = self.font_ref()?;
        let mut builder = FontBuilder::new();
        if let Some(gpos) = self.gpos.as_ref().filter(|_| self.gpos_changed) {
            builder.add_table(gpos)?;
        }
        builder.copy_missing_tables(font);
        Ok(builder.build())
    }
}

impl fmt::Debug for OpenTypeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTypeFace")
            .field("key", &self.key)
            .field("face_index", &self.face_index)
            .field("full_name", &self.full_name)
            .field("units_per_em", &self.units_per_em)
            .field("gpos_changed", &self.gpos_changed)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for OpenTypeFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)?;
        if let Some(index) = self.face_index {
            write!(f, "#{index}")?;
        }
        Ok(())
    }
}

impl Font for OpenTypeFace {
    fn root_key(&self) -> FontKey {
        self.key
    }

    fn face_index(&self) -> Option<u32> {
        self.face_index
    }

    fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
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
        self.gsub_tags.features.contains(&tag)
    }

    fn has_gpos_feature(&self, tag: Tag) -> bool {
        match &self.gpos {
            Some(gpos) => lookups::has_feature(gpos, tag),
            None => self.gpos_tags.features.contains(&tag),
        }
    }

    fn has_table(&self, tag: Tag) -> bool {
        self.table_offsets.contains_key(&tag)
    }

    fn script_and_langsys_tags(&self) -> BTreeSet<(Tag, Option<Tag>)> {
        self.gsub_tags
            .scripts
            .union(&self.gpos_tags.scripts)
            .copied()
            .collect()
    }

    fn glyph_bounds(&self, glyph_id: u32) -> Option<Rect> {
        self.glyphs_bounds(&[glyph_id]).pop().flatten()
    }

    fn glyphs_bounds(&self, glyph_ids: &[u32]) -> Vec<Option<Rect>> {
        let Ok(font) = skrifa::FontRef::from_index(&self.data, self.face_index.unwrap_or_default()) else {
            return vec![None; glyph_ids.len()];
        };
        let outlines = font.outline_glyphs();
        glyph_ids
            .iter()
            .map(|glyph_id| {
                let outline = outlines.get(skrifa::GlyphId::new(*glyph_id))?;
                let mut pen = BezPathPen::default();
                let settings = DrawSettings::unhinted(Size::unscaled(), LocationRef::default());
                if let Err(error) = outline.draw(settings, &mut pen) {
                    debug!("Failed to draw glyph {glyph_id} of \"{self}\": {error}");
                    return None;
                }
                let path = pen.0;
                if path.elements().is_empty() {
                    return None;
                }
                Some(path.bounding_box())
            })
            .collect()
    }

    fn glyph_name(&self, glyph_id: u32) -> String {
        self.font_ref()
            .ok()
            .and_then(|font| {
                let post = font.post().ok()?;
                post.glyph_name(GlyphId16::try_from(GlyphId::new(glyph_id)).ok()?).map(str::to_owned)
            })
            .unwrap_or_else(|| format!("gid{glyph_id}"))
    }

    fn reader_offset(&self, tag: Tag) -> Option<u64> {
        self.table_offsets.get(&tag).copied()
    }

    fn gpos_table(&mut self, create: bool) -> Result<Option<&mut Gpos>> {
        if self.gpos.is_none() {
            let data = self.data.clone();
            let font = FontRef::from_index(&data, self.face_index.unwrap_or_default())?;
            self.gpos = match font.gpos() {
                Ok(gpos) => Some(gpos.to_owned_table()),
                Err(ReadError::TableIsMissing(_)) if create => Some(lookups::new_gpos()),
                Err(ReadError::TableIsMissing(_)) => None,
                Err(error) => return Err(error.into()),
            };
        }
        Ok(self.gpos.as_mut())
    }

    fn set_gpos_changed(&mut self) {
        self.gpos_changed = true;
    }
}

/// Collects an outline into a [`BezPath`].
#[derive(Default)]
struct BezPathPen(BezPath);

fn as_kurbo_point(x: f32, y: f32) -> Point {
    Point::new(x as f64, y as f64)
}

impl OutlinePen for BezPathPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(as_kurbo_point(x, y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(as_kurbo_point(x, y));
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.0
            .quad_to(as_kurbo_point(cx0, cy0), as_kurbo_point(x, y));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.0.curve_to(
            as_kurbo_point(cx0, cy0),
            as_kurbo_point(cx1, cy1),
            as_kurbo_point(x, y),
        );
    }

    fn close(&mut self) {
        self.0.close_path();
    }
}

fn round4(len: usize) -> usize {
    (len + 3) & !3
}

fn offset32(offset: usize) -> Result<u32> {
    u32::try_from(offset).map_err(|_| Error::Overflow("table offset"))
}

/// Assembles compiled faces into a version 1 collection.
///
/// Tables with identical data are stored once, so tables the faces shared
/// before stay shared.
fn write_collection(faces: &[Vec<u8>]) -> Result<Vec<u8>> {
    let fonts = faces
        .iter()
        .map(|data| FontRef::new(data))
        .collect::<Result<Vec<_>, _>>()?;

    let mut position = TTC_HEADER_LEN + 4 * fonts.len();
    let mut directory_offsets = Vec::with_capacity(fonts.len());
    for font in &fonts {
        directory_offsets.push(offset32(position)?);
        position += TABLE_DIRECTORY_LEN + TABLE_RECORD_LEN * font.table_directory.table_records().len();
    }

    let mut blobs: Vec<&[u8]> = Vec::new();
    let mut blob_offsets: HashMap<&[u8], u32> = HashMap::new();
    let mut directories = Vec::with_capacity(fonts.len());
    for font in &fonts {
        let mut records = Vec::new();
        for record in font.table_directory.table_records() {
            let tag = record.tag();
            let data = font
                .table_data(tag)
                .map(|data| data.as_bytes())
                .unwrap_or_default();
            let offset = match blob_offsets.get(data) {
                Some(offset) => *offset,
                None => {
                    let offset = offset32(position)?;
                    position += round4(data.len());
                    blob_offsets.insert(data, offset);
                    blobs.push(data);
                    offset
                }
            };
            records.push((tag, record.checksum(), offset, offset32(data.len())?));
        }
        directories.push((font.table_directory.sfnt_version(), records));
    }
    debug!(
        "Writing {} faces with {} distinct tables",
        fonts.len(),
        blobs.len()
    );

    let mut out = Vec::with_capacity(position);
    out.extend_from_slice(TTC_TAG);
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&offset32(fonts.len())?.to_be_bytes());
    for offset in &directory_offsets {
        out.extend_from_slice(&offset.to_be_bytes());
    }
    for (sfnt_version, records) in &directories {
        write_table_directory(&mut out, *sfnt_version, records)?;
    }
    for blob in blobs {
        out.extend_from_slice(blob);
        out.resize(round4(out.len()), 0);
    }
    Ok(out)
}

fn write_table_directory(out: &mut Vec<u8>, sfnt_version: u32, records: &[(Tag, u32, u32, u32)]) -> Result<()> {
    let num_tables = u16::try_from(records.len()).map_err(|_| Error::Overflow("number of tables"))?;
    let entry_selector = match num_tables {
        0 => 0,
        n => n.ilog2() as u16,
    };
    let search_range = (1u16 << entry_selector) * TABLE_RECORD_LEN as u16;
    let range_shift = (num_tables * TABLE_RECORD_LEN as u16).saturating_sub(search_range);
    out.extend_from_slice(&sfnt_version.to_be_bytes());
    for value in [num_tables, search_range, entry_selector, range_shift] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    for (tag, checksum, offset, length) in records {
        out.extend_from_slice(&tag.to_be_bytes());
        for value in [*checksum, *offset, *length] {
            out.extend_from_slice(&value.to_be_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use write_fonts::{
        tables::{
            cmap::Cmap,
            glyf::{GlyfLocaBuilder, SimpleGlyph},
            gsub::{Gsub, SubstitutionLookupList},
            head::Head,
            hhea::Hhea,
            hmtx::{Hmtx, LongMetric},
            layout::{Feature, FeatureList, FeatureRecord, LangSys, LangSysRecord, Script, ScriptList, ScriptRecord},
            maxp::Maxp,
            name::{Name, NameRecord},
            vhea::Vhea,
            vmtx::Vmtx,
        },
        types::{FWord, NameId, UfWord},
    };

    use super::*;
    use crate::{
        font::{CHWS, VERT},
        glyph::{GlyphData, GlyphDataList},
        glyph_sets::GlyphSets,
    };

    /// A font with names, `head` and `maxp`, and a GSUB table with `vert`.
    pub(crate) fn test_font(family: &str) -> Vec<u8> {
        let mut builder = FontBuilder::new();
        let head = Head {
            units_per_em: 1000,
            ..Default::default()
        };
        builder.add_table(&head).unwrap();
        let maxp = Maxp {
            num_glyphs: 300,
            ..Default::default()
        };
        builder.add_table(&maxp).unwrap();
        builder.add_table(&name_table(family)).unwrap();

        let lang_sys = LangSysRecord::new(Tag::new(b"JAN "), LangSys::new(vec![0]));
        let script = Script::new(Some(LangSys::new(vec![0])), vec![lang_sys]);
        let gsub = Gsub::new(
            ScriptList::new(vec![ScriptRecord::new(Tag::new(b"hani"), script)]),
            FeatureList::new(vec![FeatureRecord::new(VERT, Feature::new(None, vec![]))]),
            SubstitutionLookupList::new(vec![]),
        );
        builder.add_table(&gsub).unwrap();
        builder.build()
    }

    fn name_table(family: &str) -> Name {
        let mut name = Name::default();
        for (id, value) in [
            (NameId::FAMILY_NAME, family.to_owned()),
            (NameId::FULL_NAME, format!("{family} Regular")),
        ] {
            name.name_record
                .push(NameRecord::new(3, 1, 0x409, id, value.into()));
        }
        name
    }

    /// The ink of `〈` in [`bracket_font`], on the right half.
    pub(crate) const OPENING_INK: Rect = Rect::new(600.0, -120.0, 900.0, 880.0);
    /// The ink of `〉` in [`bracket_font`], on the left half.
    pub(crate) const CLOSING_INK: Rect = Rect::new(100.0, -120.0, 400.0, 880.0);

    /// A shapeable font with `〈` as glyph 1 and `〉` as glyph 2, both 1000
    /// units in both directions.
    pub(crate) fn bracket_font() -> Vec<u8> {
        let mut builder = FontBuilder::new();
        let mut glyphs = GlyfLocaBuilder::new();
        for path in [BezPath::new(), OPENING_INK.into_path(0.1), CLOSING_INK.into_path(0.1)] {
            glyphs
                .add_glyph(&SimpleGlyph::from_bezpath(&path).unwrap())
                .unwrap();
        }
        let (glyf, loca, loca_format) = glyphs.build();
        builder.add_table(&glyf).unwrap();
        builder.add_table(&loca).unwrap();
        let head = Head {
            units_per_em: 1000,
            index_to_loc_format: loca_format as i16,
            ..Default::default()
        };
        builder.add_table(&head).unwrap();
        let maxp = Maxp {
            num_glyphs: 3,
            ..Default::default()
        };
        builder.add_table(&maxp).unwrap();
        builder.add_table(&name_table("Bracket Sans")).unwrap();
        let cmap = Cmap::from_mappings([('〈', GlyphId::new(1)), ('〉', GlyphId::new(2))]).unwrap();
        builder.add_table(&cmap).unwrap();

        let metrics = || {
            (0..3)
                .map(|_| LongMetric {
                    advance: 1000,
                    side_bearing: 0,
                })
                .collect::<Vec<_>>()
        };
        let hhea = Hhea {
            ascender: FWord::new(880),
            descender: FWord::new(-120),
            advance_width_max: UfWord::new(1000),
            number_of_h_metrics: 3,
            ..Default::default()
        };
        builder.add_table(&hhea).unwrap();
        let hmtx = Hmtx {
            h_metrics: metrics(),
            left_side_bearings: Vec::new(),
        };
        builder.add_table(&hmtx).unwrap();
        let vhea = Vhea {
            ascender: FWord::new(500),
            descender: FWord::new(-500),
            advance_height_max: UfWord::new(1000),
            number_of_long_ver_metrics: 3,
            ..Default::default()
        };
        builder.add_table(&vhea).unwrap();
        let vmtx = Vmtx {
            v_metrics: metrics(),
            top_side_bearings: Vec::new(),
        };
        builder.add_table(&vmtx).unwrap();
        builder.build()
    }

    fn glyph_sets() -> GlyphSets {
        let list = |glyph_id| GlyphDataList::new(vec![GlyphData::new(glyph_id, 0, 1000, 0)]);
        GlyphSets::from_lists(list(10), list(20), GlyphDataList::default(), GlyphDataList::default())
    }

    #[test]
    fn load_single_font() {
        let file = FontFile::from_data(test_font("Test Sans")).unwrap();
        assert!(!file.is_collection());
        let [face] = file.faces() else {
            panic!("one face expected");
        };
        assert_eq!(face.to_string(), "Test Sans Regular");
        assert_eq!(face.family_name(), Some("Test Sans"));
        assert_eq!(face.face_index(), None);
        assert_eq!(face.units_per_em(), 1000);
        assert!(face.has_gsub_feature(VERT));
        assert!(face.has_vertical_form());
        assert!(!face.has_gpos_feature(CHWS));
        assert!(face.reader_offset(GPOS).is_none());
        assert_eq!(
            face.script_and_langsys_tags().into_iter().collect::<Vec<_>>(),
            [
                (Tag::new(b"hani"), None),
                (Tag::new(b"hani"), Some(Tag::new(b"JAN "))),
            ]
        );
        assert_eq!(face.glyph_name(3), "gid3");
        assert!(face.glyph_bounds(3).is_none());
    }

    #[test]
    fn add_chws_and_reload() {
        let mut file = FontFile::from_data(test_font("Test Sans")).unwrap();
        assert!(!file.is_changed());
        let face = &mut file.faces_mut()[0];
        let added = lookups::synthesize(face, Direction::Horizontal, &glyph_sets()).unwrap();
        assert!(added.is_some());
        assert!(face.has_gpos_feature(CHWS));
        assert!(file.is_changed());

        let file = FontFile::from_data(file.to_bytes().unwrap()).unwrap();
        let face = &file.faces()[0];
        assert!(face.has_gpos_feature(CHWS));
        assert!(face.has_table(GPOS));
        assert!(face.has_gsub_feature(VERT));
        assert_eq!(face.to_string(), "Test Sans Regular");
    }

    #[test]
    fn reading_gpos_keeps_it_unchanged() {
        let mut file = FontFile::from_data(test_font("Test Sans")).unwrap();
        lookups::synthesize(&mut file.faces_mut()[0], Direction::Horizontal, &glyph_sets()).unwrap();
        let mut file = FontFile::from_data(file.to_bytes().unwrap()).unwrap();
        let face = &mut file.faces_mut()[0];
        let gpos = face.gpos_table(false).unwrap();
        assert!(gpos.is_some_and(|gpos| lookups::has_feature(gpos, CHWS)));
        assert!(!file.is_changed());

        let mut file = FontFile::from_data(test_font("Test Sans")).unwrap();
        assert!(file.faces_mut()[0].gpos_table(false).unwrap().is_none());
        assert!(file.faces_mut()[0].gpos_table(true).unwrap().is_some());
        assert!(!file.is_changed());
    }

    #[test]
    fn glyph_outline_bounds() {
        let file = FontFile::from_data(bracket_font()).unwrap();
        let face = &file.faces()[0];
        assert_eq!(
            face.glyphs_bounds(&[0, 1, 2, 7]),
            [None, Some(OPENING_INK), Some(CLOSING_INK), None]
        );
        assert_eq!(face.glyph_bounds(2), Some(CLOSING_INK));
    }

    #[test]
    fn collection_keeps_shared_gpos() {
        let faces = [test_font("Test Sans"), test_font("Test Serif")];
        let mut file = FontFile::from_data(write_collection(&faces).unwrap()).unwrap();
        assert!(file.is_collection());
        assert_eq!(file.faces().len(), 2);
        assert_eq!(file.faces()[1].to_string(), "Test Serif Regular#1");
        // identical tables are stored once
        let offset = file.faces()[0].reader_offset(Tag::new(b"GSUB"));
        assert!(offset.is_some());
        assert_eq!(offset, file.faces()[1].reader_offset(Tag::new(b"GSUB")));
        assert_ne!(
            file.faces()[0].reader_offset(Tag::new(b"name")),
            file.faces()[1].reader_offset(Tag::new(b"name"))
        );

        for face in file.faces_mut() {
            lookups::synthesize(face, Direction::Horizontal, &glyph_sets()).unwrap();
        }
        let file = FontFile::from_data(file.to_bytes().unwrap()).unwrap();
        let offsets: Vec<_> = file
            .faces()
            .iter()
            .map(|face| face.reader_offset(GPOS))
            .collect();
        assert!(offsets[0].is_some());
        assert_eq!(offsets[0], offsets[1]);
        assert!(file.faces().iter().all(|face| face.has_gpos_feature(CHWS)));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("TestSans.otf");
        let file = FontFile::from_data(test_font("Test Sans")).unwrap();
        file.save(&path).unwrap();
        let file = FontFile::load(&path).unwrap();
        assert_eq!(file.path(), Some(path.as_path()));
        assert_eq!(file.faces()[0].family_name(), Some("Test Sans"));
    }

    #[test]
    fn load_missing_file() {
        let error = FontFile::load("no/such/font.otf").unwrap_err();
        assert!(matches!(error, Error::Io { .. }));
    }

    #[test]
    fn bez_path_pen_bounds() {
        let mut pen = BezPathPen::default();
        pen.move_to(100.0, -120.0);
        pen.line_to(400.0, -120.0);
        pen.quad_to(500.0, 300.0, 400.0, 700.0);
        pen.close();
        assert_eq!(pen.0.bounding_box().x0, 100.0);
        assert_eq!(pen.0.bounding_box().y0, -120.0);
    }
}
