//! Classifying CJK punctuation glyphs by where their ink is

use std::{collections::BTreeSet, fmt, io};

use futures_util::try_join;
use log::{debug, info, warn};

use crate::{
    cache::{CacheStore, ConsistencyCache, GlyphType},
    config::{CodePoints, Config, CrossLanguageCheck, FullwidthAdvance, Language},
    error::{Error, Result},
    font::{Direction, Font, FontKey},
    glyph::{GlyphData, GlyphDataList, InkPart},
    shaper::{compute_fullwidth_advance, ShapeRequest, Shaper, HANI},
};

/// Glyphs of a font, grouped by where spacing can be removed from them.
///
/// `left` glyphs have their ink on the left half (closing brackets), `right`
/// on the right half (opening brackets), `middle` in the middle half. The
/// not-applicable `na_left` and `na_right` glyphs are never adjusted but can
/// be the context of adjustments.
#[derive(Clone, Debug, Default)]
pub struct GlyphSets {
    pub left: GlyphDataList,
    pub right: GlyphDataList,
    pub middle: GlyphDataList,
    pub space: GlyphDataList,
    pub na_left: GlyphDataList,
    pub na_right: GlyphDataList,
    /// Everything shaped while classifying, for diagnostics.
    all_glyphs: GlyphDataList,
    add_glyphs_count: usize,
    root: Option<FontKey>,
}

impl GlyphSets {
    pub fn from_lists(
        left: GlyphDataList,
        right: GlyphDataList,
        middle: GlyphDataList,
        space: GlyphDataList,
    ) -> Self {
        GlyphSets {
            left,
            right,
            middle,
            space,
            ..Default::default()
        }
    }

    pub fn list(&self, glyph_type: GlyphType) -> &GlyphDataList {
        match glyph_type {
            GlyphType::Left => &self.left,
            GlyphType::Middle => &self.middle,
            GlyphType::Right => &self.right,
        }
    }

    pub fn list_mut(&mut self, glyph_type: GlyphType) -> &mut GlyphDataList {
        match glyph_type {
            GlyphType::Left => &mut self.left,
            GlyphType::Middle => &mut self.middle,
            GlyphType::Right => &mut self.right,
        }
    }

    fn named_lists(&self) -> [(&'static str, &GlyphDataList); 4] {
        [
            ("left", &self.left),
            ("right", &self.right),
            ("middle", &self.middle),
            ("space", &self.space),
        ]
    }

    /// The number of times glyphs were added from a font.
    pub fn add_glyphs_count(&self) -> usize {
        self.add_glyphs_count
    }

    /// The glyph ids of `left`, `right`, `middle` and `space`.
    pub fn glyph_id_set(&self) -> BTreeSet<u32> {
        self.named_lists()
            .iter()
            .flat_map(|(_, list)| list.glyph_ids())
            .collect()
    }

    /// Returns `true` if there are both left and right glyphs to make pairs
    /// of.
    pub fn can_add_to_table(&self) -> bool {
        !self.left.is_empty() && !self.right.is_empty()
    }

    /// Whether no glyph belongs to more than one category.
    pub fn is_disjoint(&self) -> bool {
        self.left.is_disjoint(&self.middle)
            && self.left.is_disjoint(&self.right)
            && self.left.is_disjoint(&self.space)
            && self.middle.is_disjoint(&self.right)
            && self.middle.is_disjoint(&self.space)
            && self.right.is_disjoint(&self.space)
            && self.left.is_disjoint(&self.na_left)
            && self.right.is_disjoint(&self.na_right)
    }

    pub(crate) fn assert_glyphs_are_disjoint(&self) {
        debug_assert!(self.is_disjoint(), "glyph sets overlap: {}", self.glyph_ids_string());
    }

    /// Checks that all glyphs come from the same root font.
    fn assert_font<F: Font + ?Sized>(&mut self, font: &F) {
        match self.root {
            Some(root) => debug_assert_eq!(root, font.root_key(), "glyphs of \"{font}\""),
            None => self.root = Some(font.root_key()),
        }
    }

    /// Adds all glyphs of `other` to `self`.
    pub fn unite(&mut self, other: GlyphSets) {
        self.left.extend(other.left);
        self.right.extend(other.right);
        self.middle.extend(other.middle);
        self.space.extend(other.space);
        self.na_left.extend(other.na_left);
        self.na_right.extend(other.na_right);
        self.all_glyphs.extend(other.all_glyphs);
        self.add_glyphs_count += other.add_glyphs_count;
    }

    fn record_shaped<'a>(&mut self, lists: impl IntoIterator<Item = &'a GlyphDataList>) {
        for list in lists {
            self.all_glyphs.extend(list.iter().cloned());
        }
    }

    /// Adds glyphs whose ink is on the left or in the middle to the matching
    /// list, ignoring others.
    fn add_by_ink_part(&mut self, glyphs: impl IntoIterator<Item = GlyphData>) {
        for glyph in glyphs {
            match glyph.ink_part {
                Some(InkPart::Left) => self.left.push(glyph),
                Some(InkPart::Middle) => self.middle.push(glyph),
                _ => debug!("ink_part: ignored {glyph}"),
            }
        }
    }

    /// Keeps only glyphs with the fullwidth advance `em`. Left and right
    /// glyphs with other advances become not-applicable context.
    fn filter_fullwidth(&mut self, em: u16) {
        self.left.filter_advance(em, Some(&mut self.na_left));
        self.right.filter_advance(em, Some(&mut self.na_right));
        self.middle.filter_advance(em, None);
        self.space.filter_advance(em, None);
    }

    /// Classifies the glyphs of `font` in `direction`.
    pub async fn classify<F, S>(
        font: &mut F,
        direction: Direction,
        config: &Config,
        shaper: &S,
        caches: &mut CacheStore,
    ) -> Result<GlyphSets>
    where
        F: Font,
        S: Shaper<F>,
    {
        let mut glyph_sets = GlyphSets::default();
        glyph_sets
            .add_glyphs(font, direction, config, shaper, caches)
            .await?;
        Ok(glyph_sets)
    }

    /// Classifies the glyphs of `font` in `direction`, adding them to `self`.
    ///
    /// `self` may collect glyphs from several faces of a collection that
    /// share their glyphs. The classification of each glyph is checked
    /// against the cache of the root font in `caches`.
    pub async fn add_glyphs<F, S>(
        &mut self,
        font: &mut F,
        direction: Direction,
        config: &Config,
        shaper: &S,
        caches: &mut CacheStore,
    ) -> Result<()>
    where
        F: Font,
        S: Shaper<F>,
    {
        self.assert_font(font);
        let Some(config) = config.for_font(font, direction) else {
            info!("Skipped by config: \"{font}\" {direction}");
            return Ok(());
        };
        if !ensure_fullwidth_advance(font, direction, &config, shaper).await? {
            return Err(Error::ProportionalCjkFont {
                font: font.to_string(),
            });
        }

        let font = &*font;
        let context = ShapeContext {
            font,
            direction,
            shaper,
            margin: config.ink_part_margin,
        };
        let cache = caches.get(font.root_key(), direction);
        let (opening_closing, period_comma, colon_semicolon, exclam_question) = try_join!(
            context.opening_closing(&config),
            context.period_comma(&config),
            context.colon_semicolon(&config, cache),
            context.exclam_question(&config),
        )?;
        for fragment in [opening_closing, period_comma, colon_semicolon, exclam_question] {
            self.unite(fragment);
        }
        self.filter_fullwidth(font.fullwidth_advance(direction));
        caches
            .get_or_create(font.root_key(), direction)
            .add_glyph_sets(self, font)?;
        self.assert_glyphs_are_disjoint();
        self.add_glyphs_count += 1;
        debug!("add_glyphs {self} for \"{font}\" {direction}");
        Ok(())
    }

    /// Writes the glyph ids of each list, for analyzing fonts.
    ///
    /// With `comment` 1 or more, each glyph id is followed by the characters
    /// it was shaped from; 2 or more writes the full shaping results. Shaped
    /// glyphs that are not in any list are written as comments.
    pub fn save_glyphs(&self, output: &mut dyn io::Write, prefix: &str, comment: u8) -> io::Result<()> {
        let glyphs_by_id = (comment > 0).then(|| self.all_glyphs.group_by_glyph_id());
        let describe = |glyph: &GlyphData| -> String {
            if comment <= 1 {
                glyph
                    .text
                    .iter()
                    .flat_map(|text| text.chars())
                    .map(|ch| format!("U+{:04X} {ch}", ch as u32))
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                glyph.to_string()
            }
        };
        for (name, list) in self.named_lists() {
            writeln!(output, "# {prefix}{name}")?;
            for glyph_id in list.glyph_id_set() {
                match glyphs_by_id.as_ref().and_then(|groups| groups.get(&glyph_id)) {
                    Some(glyphs) => {
                        let descriptions: Vec<_> = glyphs.iter().map(|g| describe(*g)).collect();
                        writeln!(output, "{glyph_id} # {}", descriptions.join(", "))?;
                    }
                    None => writeln!(output, "{glyph_id}")?,
                }
            }
        }
        if let Some(groups) = glyphs_by_id {
            writeln!(output, "# {prefix}filtered")?;
            let classified = self.glyph_id_set();
            for (glyph_id, glyphs) in groups {
                if classified.contains(&glyph_id) {
                    continue;
                }
                for glyph in glyphs {
                    writeln!(output, "# {glyph_id} {}", describe(glyph))?;
                }
            }
        }
        Ok(())
    }

    /// The glyph ids of each non-empty list.
    pub fn glyph_ids_string(&self) -> String {
        self.named_lists()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, list)| format!("{name}={:?}", list.glyph_id_set()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for GlyphSets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<_> = self
            .named_lists()
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(name, list)| format!("{}{}", list.len(), name[..1].to_ascii_uppercase()))
            .collect();
        f.write_str(&counts.join(", "))
    }
}

/// Makes sure the fullwidth advance of `font` is known.
///
/// Returns `false` if the font is proportional, so that the fullwidth advance
/// cannot be determined.
pub(crate) async fn ensure_fullwidth_advance<F, S>(
    font: &mut F,
    direction: Direction,
    config: &Config,
    shaper: &S,
) -> Result<bool>
where
    F: Font,
    S: Shaper<F>,
{
    if font.custom_fullwidth_advance(direction).is_some() {
        return Ok(true);
    }
    let advance = match &config.fullwidth_advance {
        None => {
            debug!(
                "fullwidth_advance={} (units_per_em) for \"{font}\" {direction}",
                font.units_per_em()
            );
            return Ok(true);
        }
        Some(FullwidthAdvance::Units(advance)) => *advance,
        Some(FullwidthAdvance::Probe(text)) => {
            match compute_fullwidth_advance(&*font, direction, shaper, text).await? {
                Some(advance) => advance,
                None => return Ok(false),
            }
        }
    };
    font.set_fullwidth_advance(direction, advance);
    debug!(
        "fullwidth_advance={advance} (units_per_em={}) for \"{font}\" {direction}",
        font.units_per_em()
    );
    Ok(true)
}

/// Shapes the characters of one classification step.
struct ShapeContext<'a, F: ?Sized, S> {
    font: &'a F,
    direction: Direction,
    shaper: &'a S,
    margin: f64,
}

impl<F, S> ShapeContext<'_, F, S>
where
    F: Font,
    S: Shaper<F>,
{
    async fn shape(
        &self,
        code_points: &CodePoints,
        language: Option<Language>,
        fullwidth: bool,
    ) -> Result<GlyphDataList> {
        if code_points.is_empty() {
            return Ok(GlyphDataList::default());
        }
        let text: String = code_points.iter().filter_map(|c| char::from_u32(*c)).collect();
        // Many fonts have Latin glyphs for the unified quotes; `fwid` selects
        // the fullwidth ones.
        let request = ShapeRequest::new(&text, self.direction)
            .with_language(language)
            .with_script(HANI)
            .with_features(self.direction.shaping_features(fullwidth));
        let mut glyphs = self.shaper.shape(self.font, &request).await?;
        glyphs.set_text(&text);
        glyphs.filter_missing_glyphs();
        glyphs.clear_cluster_indexes();
        glyphs.compute_ink_parts(self.font, self.direction, self.margin);
        debug!("\"{}\" {} {language:?}: {glyphs}", self.font, self.direction);
        Ok(glyphs)
    }

    /// Shapes horizontally, keeping only fullwidth glyphs.
    async fn shape_horizontal(
        &self,
        code_points: &CodePoints,
        language: Option<Language>,
    ) -> Result<GlyphDataList> {
        let horizontal = ShapeContext {
            font: self.font,
            direction: Direction::Horizontal,
            shaper: self.shaper,
            margin: self.margin,
        };
        let mut glyphs = horizontal.shape(code_points, language, true).await?;
        glyphs.filter_advance(self.font.fullwidth_advance(Direction::Horizontal), None);
        Ok(glyphs)
    }

    async fn shape_if(
        &self,
        enabled: bool,
        code_points: &CodePoints,
        language: Language,
    ) -> Result<Option<GlyphDataList>> {
        if !enabled {
            return Ok(None);
        }
        self.shape(code_points, Some(language), true).await.map(Some)
    }

    fn ambiguous_language(&self) -> Error {
        let scripts = self
            .font
            .script_and_langsys_tags()
            .into_iter()
            .map(|(script, language)| match language {
                Some(language) => format!("{script} {language}"),
                None => format!("{script} (default)"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        Error::AmbiguousLanguage {
            font: self.font.to_string(),
            scripts,
        }
    }

    /// Separates the glyphs of the same text shaped in Japanese (`ja`) and in
    /// another language (`other`).
    ///
    /// Glyphs in both lists cannot be attributed to a language by shaping, so
    /// they go to the list of the configured language; `other` if
    /// `is_other` accepts it. Without a configured language, this fails with
    /// `AmbiguousLanguage`.
    fn split_languages(
        &self,
        config: &Config,
        mut ja: GlyphDataList,
        mut other: GlyphDataList,
        is_other: impl Fn(Language) -> bool,
    ) -> Result<(GlyphDataList, GlyphDataList)> {
        let shared: BTreeSet<u32> = ja
            .glyph_id_set()
            .intersection(&other.glyph_id_set())
            .copied()
            .collect();
        if shared.is_empty() {
            return Ok((ja, other));
        }
        match config.language {
            None => return Err(self.ambiguous_language()),
            Some(language) if is_other(language) => ja.remove_glyph_ids(&shared),
            Some(_) => other.remove_glyph_ids(&shared),
        }
        Ok((ja, other))
    }

    /// Closing brackets are left, opening brackets right, and the middle dot
    /// middle.
    async fn opening_closing(&self, config: &Config) -> Result<GlyphSets> {
        let opening = config.opening();
        let closing = config.closing();
        let (left, right, middle, space) = try_join!(
            self.shape(&closing, None, true),
            self.shape(&opening, None, true),
            self.shape(&config.cjk_middle, None, true),
            self.shape(&config.fullwidth_space, None, true),
        )?;
        let mut trio = GlyphSets::from_lists(left, right, middle, space);
        trio.all_glyphs = [&trio.left, &trio.right, &trio.middle, &trio.space]
            .into_iter()
            .flat_map(|list| list.iter().cloned())
            .collect();
        if self.direction.is_vertical() {
            // Vertical brackets apply only when they have vertical glyphs.
            let both = opening.union(&closing).copied().collect();
            let horizontal = self.shape_horizontal(&both, None).await?;
            trio.left.subtract(&horizontal);
            trio.right.subtract(&horizontal);
        } else {
            let (na_left, na_right) = try_join!(
                self.shape(&config.narrow_closing, None, false),
                self.shape(&config.narrow_opening, None, false),
            )?;
            trio.record_shaped([&na_left, &na_right]);
            trio.na_left = na_left;
            trio.na_right = na_right;
        }
        trio.assert_glyphs_are_disjoint();
        if config.use_ink_bounds {
            let GlyphSets {
                left,
                right,
                middle,
                na_left,
                na_right,
                ..
            } = &mut trio;
            left.filter_ink_part(InkPart::Left, Some(na_left));
            right.filter_ink_part(InkPart::Right, Some(na_right));
            middle.filter_ink_part(InkPart::Middle, None);
        }
        Ok(trio)
    }

    /// Period and comma are left in Japanese and Simplified Chinese, middle
    /// in Traditional Chinese.
    async fn period_comma(&self, config: &Config) -> Result<GlyphSets> {
        let text = &config.cjk_period_comma;
        let mut trio = GlyphSets::default();
        if text.is_empty() {
            return Ok(trio);
        }
        let check = config.cross_language_check != CrossLanguageCheck::Off;
        let (ja, zht, zhs, kor) = try_join!(
            self.shape(text, Some(Language::Japanese), true),
            self.shape(text, Some(Language::TraditionalChinese), true),
            self.shape_if(check, text, Language::SimplifiedChinese),
            self.shape_if(check, text, Language::Korean),
        )?;
        trio.record_shaped([&ja, &zht]);
        for (language, glyphs) in [(Language::SimplifiedChinese, zhs), (Language::Korean, kor)] {
            if let Some(glyphs) = glyphs {
                self.check_cross_language(config, text, language, &ja, &glyphs)?;
            }
        }
        if config.use_ink_bounds {
            trio.left = ja;
            trio.middle = zht;
            trio.left.filter_ink_part(InkPart::Left, None);
            trio.middle.filter_ink_part(InkPart::Middle, None);
        } else {
            let (ja, zht) =
                self.split_languages(config, ja, zht, Language::is_traditional_chinese)?;
            trio.left = ja;
            trio.middle = zht;
        }
        trio.assert_glyphs_are_disjoint();
        Ok(trio)
    }

    fn check_cross_language(
        &self,
        config: &Config,
        text: &CodePoints,
        language: Language,
        ja: &GlyphDataList,
        glyphs: &GlyphDataList,
    ) -> Result<()> {
        if glyphs.has_same_glyph_ids(ja) {
            return Ok(());
        }
        let text: String = text.iter().filter_map(|c| char::from_u32(*c)).collect();
        match config.cross_language_check {
            CrossLanguageCheck::Error => Err(Error::CrossLanguageMismatch {
                font: self.font.to_string(),
                language,
                text,
            }),
            _ => {
                warn!(
                    "\"{}\" {}: {language} shapes {text:?} to {glyphs} but JAN to {ja}",
                    self.font, self.direction
                );
                Ok(())
            }
        }
    }

    /// Colon and semicolon are middle in Japanese and left in Simplified
    /// Chinese. In vertical text they are middle only when rotated.
    async fn colon_semicolon(
        &self,
        config: &Config,
        cache: Option<&ConsistencyCache>,
    ) -> Result<GlyphSets> {
        let text = &config.cjk_colon_semicolon;
        let mut trio = GlyphSets::default();
        if text.is_empty() {
            return Ok(trio);
        }
        let (ja, zhs) = try_join!(
            self.shape(text, Some(Language::Japanese), true),
            self.shape(text, Some(Language::SimplifiedChinese), true),
        )?;
        trio.record_shaped([&ja, &zhs]);
        if config.use_ink_bounds {
            trio.add_by_ink_part(ja.into_iter().chain(zhs));
            trio.assert_glyphs_are_disjoint();
            return Ok(trio);
        }

        let (ja, zhs) = match cache {
            Some(cache) => (
                cache.split_cached(ja, &mut trio),
                cache.split_cached(zhs, &mut trio),
            ),
            None => (ja, zhs),
        };
        if ja.is_empty() && zhs.is_empty() {
            return Ok(trio);
        }
        let (mut ja, zhs) =
            self.split_languages(config, ja, zhs, |language| {
                language == Language::SimplifiedChinese
            })?;
        if self.direction.is_vertical() {
            // Vertical alternates mean rotated, which is middle in Japanese.
            // Simplified Chinese ones are upright, and Traditional Chinese
            // ones may be upright even with vertical alternates.
            if matches!(config.language, None | Some(Language::Japanese)) {
                let horizontal = self.shape_horizontal(text, Some(Language::Japanese)).await?;
                ja.subtract(&horizontal);
                trio.middle.extend(ja);
            }
            return Ok(trio);
        }
        trio.middle.extend(ja);
        trio.left.extend(zhs);
        trio.assert_glyphs_are_disjoint();
        Ok(trio)
    }

    /// Exclamation and question marks are left only in Simplified Chinese,
    /// and only in horizontal text.
    async fn exclam_question(&self, config: &Config) -> Result<GlyphSets> {
        let text = &config.cjk_exclam_question;
        let mut trio = GlyphSets::default();
        if self.direction.is_vertical() || text.is_empty() {
            return Ok(trio);
        }
        let (ja, mut zhs) = try_join!(
            self.shape(text, Some(Language::Japanese), true),
            self.shape(text, Some(Language::SimplifiedChinese), true),
        )?;
        trio.record_shaped([&ja, &zhs]);
        trio.left = if config.use_ink_bounds {
            zhs.filter_ink_part(InkPart::Left, None);
            zhs
        } else {
            self.split_languages(config, ja, zhs, |language| {
                language == Language::SimplifiedChinese
            })?
            .1
        };
        trio.assert_glyphs_are_disjoint();
        Ok(trio)
    }
}
