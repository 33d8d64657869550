//! Building the GPOS lookups and features that adjust the spacing

use log::{debug, info, warn};
use write_fonts::{
    tables::{
        gpos::{
            Class1Record, Class2Record, Gpos, PairPos, PositionChainContext, PositionLookup,
            PositionLookupList, SinglePos, ValueRecord,
        },
        layout::{
            builders::CoverageTableBuilder,
            ChainedSequenceContext, ClassDef, Feature,
            FeatureList, FeatureRecord, LangSys, Lookup, LookupFlag, Script, ScriptList,
            ScriptRecord, SequenceLookupRecord,
        },
    },
    types::{GlyphId16, Tag},
    OffsetMarker,
};

use crate::{
    error::{Error, Result},
    font::{Direction, Font},
    glyph::GlyphDataList,
    glyph_sets::GlyphSets,
};

const DFLT: Tag = Tag::new(b"DFLT");

/// Half of the fullwidth advance, rounded down.
///
/// Adjusting by `-half_em` leaves an odd `em` with the larger half.
pub fn half_em(em: u16) -> i16 {
    // em / 2 <= u16::MAX / 2 == i16::MAX
    (em / 2) as i16
}

/// Half of `half_em`, rounded down.
pub fn quarter_em(half_em: i16) -> i16 {
    half_em / 2
}

/// Glyph ids and the adjustments of each glyph set.
#[derive(Clone, Debug)]
pub struct PosValues {
    pub left: Vec<GlyphId16>,
    pub right: Vec<GlyphId16>,
    pub middle: Vec<GlyphId16>,
    pub space: Vec<GlyphId16>,
    pub na_left: Vec<GlyphId16>,
    pub na_right: Vec<GlyphId16>,
    pub left_value: ValueRecord,
    pub right_value: ValueRecord,
    pub middle_value: ValueRecord,
    /// `left_value` with all values zero, for pairs that do not adjust.
    pub zero_value: ValueRecord,
}

impl PosValues {
    pub fn new(glyph_sets: &GlyphSets, em: u16, direction: Direction) -> Result<Self> {
        let half = half_em(em);
        if half <= 0 {
            return Err(Error::Overflow("fullwidth advance"));
        }
        let quarter = quarter_em(half);
        let (left_value, right_value, middle_value, zero_value) = match direction {
            Direction::Horizontal => (
                ValueRecord::new().with_x_advance(-half),
                ValueRecord::new()
                    .with_x_placement(-half)
                    .with_x_advance(-half),
                ValueRecord::new()
                    .with_x_placement(-quarter)
                    .with_x_advance(-half),
                ValueRecord::new().with_x_advance(0),
            ),
            // Vertical placement grows upwards, against the writing direction.
            Direction::Vertical => (
                ValueRecord::new().with_y_advance(-half),
                ValueRecord::new()
                    .with_y_placement(half)
                    .with_y_advance(-half),
                ValueRecord::new()
                    .with_y_placement(quarter)
                    .with_y_advance(-half),
                ValueRecord::new().with_y_advance(0),
            ),
        };
        Ok(PosValues {
            left: glyph_ids(&glyph_sets.left)?,
            right: glyph_ids(&glyph_sets.right)?,
            middle: glyph_ids(&glyph_sets.middle)?,
            space: glyph_ids(&glyph_sets.space)?,
            na_left: glyph_ids(&glyph_sets.na_left)?,
            na_right: glyph_ids(&glyph_sets.na_right)?,
            left_value,
            right_value,
            middle_value,
            zero_value,
        })
    }
}

/// Sorted, deduplicated glyph ids.
fn glyph_ids(glyphs: &GlyphDataList) -> Result<Vec<GlyphId16>> {
    glyphs
        .glyph_id_set()
        .into_iter()
        .map(|id| {
            u16::try_from(id)
                .map(GlyphId16::new)
                .map_err(|_| Error::Overflow("glyph id"))
        })
        .collect()
}

/// The features added to a GPOS table and their lookup indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GposAdditions {
    pub features: Vec<(Tag, Vec<u16>)>,
}

/// Adds the `halt`/`vhal` and `chws`/`vchw` features for `glyph_sets` to the
/// GPOS table of `font`.
///
/// `halt`/`vhal` is added only if the font does not have it. Returns `None`
/// if there are no left and right glyphs to adjust.
pub fn synthesize<F: Font + ?Sized>(
    font: &mut F,
    direction: Direction,
    glyph_sets: &GlyphSets,
) -> Result<Option<GposAdditions>> {
    glyph_sets.assert_glyphs_are_disjoint();
    if !glyph_sets.can_add_to_table() {
        if glyph_sets.add_glyphs_count() > 0 {
            warn!("Skipped because no pairs: \"{font}\" {direction}");
        }
        return Ok(None);
    }
    let pos = PosValues::new(glyph_sets, font.fullwidth_advance(direction), direction)?;
    info!(
        "Adding Lookups for {}L, {}R, {}M, {}S to \"{font}\" {direction}",
        pos.left.len(),
        pos.right.len(),
        pos.middle.len(),
        pos.space.len()
    );
    debug!("Glyphs of \"{font}\" {direction}: {}", glyph_sets.glyph_ids_string());

    let Some(gpos) = font.gpos_table(true)? else {
        return Ok(None);
    };
    let mut additions = GposAdditions::default();
    let halt = direction.halt_feature();
    if !has_feature(gpos, halt) {
        let lookup_index = push_lookup(gpos, halt_lookup(&pos))?;
        add_feature(gpos, halt, vec![lookup_index])?;
        additions.features.push((halt, vec![lookup_index]));
    }
    let chws = direction.chws_feature();
    let lookup_indices = push_chws_lookups(gpos, &pos)?;
    add_feature(gpos, chws, lookup_indices.clone())?;
    additions.features.push((chws, lookup_indices));
    sort_features(gpos);
    font.set_gpos_changed();
    Ok(Some(additions))
}

/// A new GPOS table with a `DFLT` script and no features or lookups.
pub fn new_gpos() -> Gpos {
    Gpos::new(
        ScriptList::new(vec![default_script_record()]),
        FeatureList::default(),
        PositionLookupList::default(),
    )
}

fn default_script_record() -> ScriptRecord {
    ScriptRecord::new(DFLT, Script::new(Some(LangSys::new(Vec::new())), Vec::new()))
}

pub fn has_feature(gpos: &Gpos, tag: Tag) -> bool {
    gpos.feature_list
        .as_ref()
        .feature_records
        .iter()
        .any(|record| record.feature_tag == tag)
}

fn push_lookup(gpos: &mut Gpos, lookup: PositionLookup) -> Result<u16> {
    let lookups = &mut gpos.lookup_list.as_mut().lookups;
    let index = u16::try_from(lookups.len()).map_err(|_| Error::Overflow("lookup index"))?;
    lookups.push(OffsetMarker::new(lookup));
    Ok(index)
}

/// A single positioning lookup with one subtable for each value.
fn single_pos_lookup(groups: &[(&[GlyphId16], &ValueRecord)]) -> PositionLookup {
    let subtables = groups
        .iter()
        .filter(|(glyphs, _)| !glyphs.is_empty())
        .map(|(glyphs, value)| {
            let coverage = CoverageTableBuilder::from_glyphs(glyphs.to_vec()).build();
            SinglePos::format_1(coverage, (*value).clone())
        })
        .collect();
    PositionLookup::Single(Lookup::new(LookupFlag::empty(), subtables))
}

fn halt_lookup(pos: &PosValues) -> PositionLookup {
    single_pos_lookup(&[
        (&pos.left, &pos.left_value),
        (&pos.right, &pos.right_value),
        (&pos.middle, &pos.middle_value),
    ])
}

/// Pushes the lookups of `chws`/`vchw` and returns their indices.
fn push_chws_lookups(gpos: &mut Gpos, pos: &PosValues) -> Result<Vec<u16>> {
    let pair_index = push_lookup(gpos, left_pair_lookup(pos))?;
    let right_index = push_lookup(gpos, single_pos_lookup(&[(&pos.right, &pos.right_value)]))?;
    let chain_index = push_lookup(gpos, right_chain_lookup(pos, right_index))?;
    Ok(vec![pair_index, chain_index])
}

/// Adjusts left glyphs followed by a glyph in any set except `na_right`.
fn left_pair_lookup(pos: &PosValues) -> PositionLookup {
    let coverage = CoverageTableBuilder::from_glyphs(pos.left.clone()).build();
    // every first glyph is in class 0
    let class_def1 = ClassDef::from_iter(std::iter::empty::<(GlyphId16, u16)>());
    let class_def2 = pos
        .left
        .iter()
        .chain(&pos.right)
        .chain(&pos.middle)
        .chain(&pos.space)
        .chain(&pos.na_left)
        .map(|glyph| (*glyph, 1))
        .collect::<ClassDef>();
    let class1_records = vec![Class1Record::new(vec![
        Class2Record::new(pos.zero_value.clone(), ValueRecord::new()),
        Class2Record::new(pos.left_value.clone(), ValueRecord::new()),
    ])];
    let subtable = PairPos::format_2(coverage, class_def1, class_def2, class1_records);
    PositionLookup::Pair(Lookup::new(LookupFlag::empty(), vec![subtable]))
}

/// Applies the lookup at `right_index` to right glyphs that follow a glyph
/// in `right`, `middle`, `space` or `na_right`.
///
/// A pair adjustment cannot move the second glyph, so this uses a chaining
/// context instead.
fn right_chain_lookup(pos: &PosValues, right_index: u16) -> PositionLookup {
    let mut backtrack: Vec<GlyphId16> = pos
        .right
        .iter()
        .chain(&pos.middle)
        .chain(&pos.space)
        .chain(&pos.na_right)
        .copied()
        .collect();
    backtrack.sort_unstable();
    backtrack.dedup();
    let context = ChainedSequenceContext::format_3(
        vec![CoverageTableBuilder::from_glyphs(backtrack).build()],
        vec![CoverageTableBuilder::from_glyphs(pos.right.clone()).build()],
        Vec::new(),
        vec![SequenceLookupRecord::new(0, right_index)],
    );
    PositionLookup::ChainContextual(Lookup::new(
        LookupFlag::empty(),
        vec![PositionChainContext::from(context)],
    ))
}

/// Adds a feature and enables it in every language system.
fn add_feature(gpos: &mut Gpos, tag: Tag, lookup_indices: Vec<u16>) -> Result<()> {
    if has_feature(gpos, tag) {
        return Err(Error::DuplicateFeature(tag));
    }
    let features = &mut gpos.feature_list.as_mut().feature_records;
    let feature_index =
        u16::try_from(features.len()).map_err(|_| Error::Overflow("feature index"))?;
    info!("Adding Feature '{tag}' at index {feature_index} for lookups {lookup_indices:?}");
    features.push(FeatureRecord::new(tag, Feature::new(None, lookup_indices)));

    let scripts = &mut gpos.script_list.as_mut().script_records;
    if scripts.is_empty() {
        scripts.push(default_script_record());
    }
    for script_record in scripts.iter_mut() {
        let script_tag = script_record.script_tag;
        let script = script_record.script.as_mut();
        if let Some(lang_sys) = script.default_lang_sys.as_mut() {
            debug!("Adding Feature index {feature_index} to script '{script_tag}' DefaultLangSys");
            lang_sys.feature_indices.push(feature_index);
        }
        for lang_sys_record in script.lang_sys_records.iter_mut() {
            debug!(
                "Adding Feature index {feature_index} to script '{script_tag}' LangSys '{}'",
                lang_sys_record.lang_sys_tag
            );
            lang_sys_record
                .lang_sys
                .as_mut()
                .feature_indices
                .push(feature_index);
        }
    }
    Ok(())
}

/// Sorts the feature records by tag and remaps the feature indices of all
/// language systems.
pub fn sort_features(gpos: &mut Gpos) {
    let records = &mut gpos.feature_list.as_mut().feature_records;
    if records
        .windows(2)
        .all(|pair| pair[0].feature_tag <= pair[1].feature_tag)
    {
        return;
    }
    let mut indexed: Vec<_> = std::mem::take(records).into_iter().enumerate().collect();
    indexed.sort_by_key(|(_, record)| record.feature_tag);
    let mut new_indices = vec![0u16; indexed.len()];
    for (new_index, (old_index, _)) in indexed.iter().enumerate() {
        // the number of records fit in u16 when they were added
        new_indices[*old_index] = new_index as u16;
    }
    *records = indexed.into_iter().map(|(_, record)| record).collect();

    let remap = |lang_sys: &mut LangSys| {
        if let Some(index) = new_indices.get(lang_sys.required_feature_index as usize) {
            lang_sys.required_feature_index = *index;
        }
        for index in lang_sys.feature_indices.iter_mut() {
            if let Some(new_index) = new_indices.get(*index as usize) {
                *index = *new_index;
            }
        }
        lang_sys.feature_indices.sort_unstable();
    };
    for script_record in gpos.script_list.as_mut().script_records.iter_mut() {
        let script = script_record.script.as_mut();
        if let Some(lang_sys) = script.default_lang_sys.as_mut() {
            remap(lang_sys);
        }
        for lang_sys_record in script.lang_sys_records.iter_mut() {
            remap(lang_sys_record.lang_sys.as_mut());
        }
    }
}
