//! Characters to add spacing to, and per-font tweaks of them

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    convert::Infallible,
    fmt,
    str::FromStr,
};

use crate::{
    error::{Error, Result},
    font::{Direction, Font},
};

/// An ordered set of Unicode code points.
pub type CodePoints = BTreeSet<u32>;

/// A language whose punctuation conventions the shaper can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    Japanese,
    Korean,
    SimplifiedChinese,
    TraditionalChinese,
    /// Traditional Chinese, Hong Kong.
    TraditionalChineseHongKong,
}

impl Language {
    /// The OpenType language system tag, without trailing spaces.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Japanese => "JAN",
            Language::Korean => "KOR",
            Language::SimplifiedChinese => "ZHS",
            Language::TraditionalChinese => "ZHT",
            Language::TraditionalChineseHongKong => "ZHH",
        }
    }

    pub fn is_traditional_chinese(self) -> bool {
        matches!(
            self,
            Language::TraditionalChinese | Language::TraditionalChineseHongKong
        )
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JAN" => Ok(Language::Japanese),
            "KOR" => Ok(Language::Korean),
            "ZHS" => Ok(Language::SimplifiedChinese),
            "ZHT" => Ok(Language::TraditionalChinese),
            "ZHH" => Ok(Language::TraditionalChineseHongKong),
            _ => Err(Error::InvalidLanguage(s.to_owned())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to determine the advance of fullwidth glyphs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FullwidthAdvance {
    /// A fixed advance in font units.
    Units(u16),
    /// Characters whose glyphs must all have the same advance, which is then
    /// the fullwidth advance.
    Probe(String),
}

impl FromStr for FullwidthAdvance {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse() {
            Ok(units) => FullwidthAdvance::Units(units),
            Err(_) => FullwidthAdvance::Probe(s.to_owned()),
        })
    }
}

/// What to do when Simplified Chinese or Korean shape period and comma
/// differently from Japanese.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossLanguageCheck {
    Off,
    #[default]
    Warn,
    Error,
}

/// A tweak of the configuration for fonts of a family.
///
/// The first rule whose `matches` accepts the family name applies. `patch`
/// returns `None` to skip the font.
#[derive(Clone, Copy, Debug)]
pub struct FontRule {
    pub matches: fn(&str) -> bool,
    pub patch: fn(Config, Direction) -> Option<Config>,
}

/// The characters to add spacing to and how to classify their glyphs.
#[derive(Clone, Debug)]
pub struct Config {
    pub cjk_opening: CodePoints,
    pub cjk_closing: CodePoints,
    pub quotes_opening: CodePoints,
    pub quotes_closing: CodePoints,
    pub cjk_middle: CodePoints,
    pub fullwidth_space: CodePoints,
    pub cjk_period_comma: CodePoints,
    pub cjk_colon_semicolon: CodePoints,
    pub cjk_exclam_question: CodePoints,
    /// Narrow forms have no internal spacing, but can be the context of
    /// fullwidth ones.
    pub narrow_opening: CodePoints,
    pub narrow_closing: CodePoints,

    /// Skip fonts whose ASCII is monospace.
    pub skip_monospace_ascii: bool,
    /// Classify glyphs by their ink bounds rather than by shaping them in
    /// different languages.
    pub use_ink_bounds: bool,
    /// The language whose conventions the font follows, used when
    /// `use_ink_bounds` is `false`.
    pub language: Option<Language>,
    /// `None` to use the units per em.
    pub fullwidth_advance: Option<FullwidthAdvance>,
    /// Tolerance of ink part classification, in font units.
    pub ink_part_margin: f64,
    pub cross_language_check: CrossLanguageCheck,
    pub rules: Vec<FontRule>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cjk_opening: CodePoints::from([
                0x3008, 0x300A, 0x300C, 0x300E, 0x3010, 0x3014, 0x3016, 0x3018, 0x301A, 0x301D,
                0xFF08, 0xFF3B, 0xFF5B, 0xFF5F,
            ]),
            cjk_closing: CodePoints::from([
                0x3009, 0x300B, 0x300D, 0x300F, 0x3011, 0x3015, 0x3017, 0x3019, 0x301B, 0x301E,
                0x301F, 0xFF09, 0xFF3D, 0xFF5D, 0xFF60,
            ]),
            quotes_opening: CodePoints::from([0x2018, 0x201C]),
            quotes_closing: CodePoints::from([0x2019, 0x201D]),
            cjk_middle: CodePoints::from([0x30FB]),
            fullwidth_space: CodePoints::from([0x3000]),
            cjk_period_comma: CodePoints::from([0x3001, 0x3002, 0xFF0C, 0xFF0E]),
            cjk_colon_semicolon: CodePoints::from([0xFF1A, 0xFF1B]),
            cjk_exclam_question: CodePoints::from([0xFF01, 0xFF1F]),
            narrow_opening: CodePoints::from([0x28, 0x5B, 0xFF62]),
            narrow_closing: CodePoints::from([0x29, 0x5D, 0xFF63]),
            skip_monospace_ascii: false,
            use_ink_bounds: true,
            language: None,
            fullwidth_advance: Some(FullwidthAdvance::Probe("四水城「」（）".to_owned())),
            ink_part_margin: 0.0,
            cross_language_check: CrossLanguageCheck::default(),
            rules: default_rules(),
        }
    }
}

fn default_rules() -> Vec<FontRule> {
    vec![
        // Noto has monospace ASCII variants for code and grid-like layout.
        FontRule {
            matches: |name| name.starts_with("Noto "),
            patch: |config, _| Some(config.with_skip_monospace_ascii(true)),
        },
        FontRule {
            matches: |name| name.starts_with("Meiryo"),
            patch: |config, direction| {
                let mut config = config.with_language(Some(Language::Japanese));
                if direction.is_vertical() {
                    config.change_quotes_closing_to_opening(&[0x2019]);
                    config.remove(&[0xFF0C, 0xFF0E]);
                }
                Some(config)
            },
        },
        FontRule {
            matches: |name| name.starts_with("Microsoft JhengHei"),
            patch: |config, direction| {
                let mut config = config.with_language(Some(Language::TraditionalChinese));
                config.remove(&[
                    0xFF08, 0xFF09, 0xFF3B, 0xFF3D, 0xFF5B, 0xFF5D, 0xFF5F, 0xFF60,
                ]);
                if direction.is_vertical() {
                    config.change_quotes_closing_to_opening(&[0x2019, 0x201D]);
                }
                Some(config)
            },
        },
        FontRule {
            matches: |name| name.starts_with("Microsoft YaHei"),
            patch: |config, direction| {
                let mut config = config.with_language(Some(Language::SimplifiedChinese));
                if direction.is_vertical() {
                    config.remove(&[
                        0x3001, 0x3002, 0x3018, 0x3019, 0x301A, 0x301B, 0xFF08, 0xFF09, 0xFF0C,
                        0xFF0E,
                    ]);
                }
                Some(config)
            },
        },
    ]
}

impl Config {
    fn catalogs_mut(&mut self) -> [&mut CodePoints; 9] {
        [
            &mut self.cjk_opening,
            &mut self.cjk_closing,
            &mut self.quotes_opening,
            &mut self.quotes_closing,
            &mut self.cjk_middle,
            &mut self.fullwidth_space,
            &mut self.cjk_period_comma,
            &mut self.cjk_colon_semicolon,
            &mut self.cjk_exclam_question,
        ]
    }

    /// Opening brackets and quotes.
    pub fn opening(&self) -> CodePoints {
        self.cjk_opening
            .union(&self.quotes_opening)
            .copied()
            .collect()
    }

    /// Closing brackets and quotes.
    pub fn closing(&self) -> CodePoints {
        self.cjk_closing
            .union(&self.quotes_closing)
            .copied()
            .collect()
    }

    /// Sets the language; ink bounds are used only when there is none.
    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self.use_ink_bounds = language.is_none();
        self
    }

    pub fn with_skip_monospace_ascii(mut self, skip_monospace_ascii: bool) -> Self {
        self.skip_monospace_ascii = skip_monospace_ascii;
        self
    }

    pub fn with_fullwidth_advance(mut self, fullwidth_advance: Option<FullwidthAdvance>) -> Self {
        self.fullwidth_advance = fullwidth_advance;
        self
    }

    pub fn with_cross_language_check(mut self, check: CrossLanguageCheck) -> Self {
        self.cross_language_check = check;
        self
    }

    /// Removes code points from all catalogs except the narrow forms.
    pub fn remove(&mut self, code_points: &[u32]) {
        for catalog in self.catalogs_mut() {
            for code_point in code_points {
                catalog.remove(code_point);
            }
        }
    }

    /// Moves code points from `quotes_closing` to `quotes_opening`.
    ///
    /// Code points not in `quotes_closing` are ignored.
    pub fn change_quotes_closing_to_opening(&mut self, code_points: &[u32]) {
        for code_point in code_points {
            if self.quotes_closing.remove(code_point) {
                self.quotes_opening.insert(*code_point);
            }
        }
    }

    /// Empties all catalogs except the narrow forms.
    pub fn clear(&mut self) {
        for catalog in self.catalogs_mut() {
            catalog.clear();
        }
    }

    /// A copy with fewer opening and closing code points, for quick tests.
    pub fn for_smoke_testing(&self) -> Config {
        let mut config = self.clone();
        config.cjk_opening = down_sample_to(&config.cjk_opening, 3);
        config.cjk_closing = down_sample_to(&config.cjk_closing, 3);
        config
    }

    /// Applies the first rule that matches the family name of `font`.
    ///
    /// Returns `None` if the rule says the font should be skipped.
    pub fn for_font<F: Font + ?Sized>(
        &self,
        font: &F,
        direction: Direction,
    ) -> Option<Cow<'_, Config>> {
        let Some(name) = font.family_name() else {
            return Some(Cow::Borrowed(self));
        };
        match self.rules.iter().find(|rule| (rule.matches)(name)) {
            Some(rule) => (rule.patch)(self.clone(), direction).map(Cow::Owned),
            None => Some(Cow::Borrowed(self)),
        }
    }
}

/// Keeps every `ceil(len / max)`-th element of `input`.
pub fn down_sample_to(input: &CodePoints, max: usize) -> CodePoints {
    if input.len() <= max || max == 0 {
        return input.clone();
    }
    let interval = input.len().div_ceil(max);
    input.iter().step_by(interval).copied().collect()
}

/// Something that resolves the configuration for each font.
pub trait ConfigSource {
    fn for_font<F: Font + ?Sized>(&self, font: &F, direction: Direction)
        -> Option<Cow<'_, Config>>;
}

impl ConfigSource for Config {
    fn for_font<F: Font + ?Sized>(
        &self,
        font: &F,
        direction: Direction,
    ) -> Option<Cow<'_, Config>> {
        Config::for_font(self, font, direction)
    }
}

/// The configuration of a font collection, selecting faces and their
/// languages by face index.
#[derive(Clone, Debug)]
pub struct CollectionConfig {
    base: Config,
    /// Faces not in the map are skipped.
    language_by_index: BTreeMap<u32, Option<Language>>,
}

impl CollectionConfig {
    /// Creates the configuration for a collection of `num_faces` faces.
    ///
    /// `indices` is a comma separated list of faces to process, all faces if
    /// `None`. `languages` is a comma separated list of languages, paired
    /// with `indices` in order; a single language applies to all faces, and
    /// an empty entry means the language is not specified.
    pub fn new(
        base: Config,
        num_faces: u32,
        indices: Option<&str>,
        languages: Option<&str>,
    ) -> Result<Self> {
        let language_by_index = calc_indices_and_languages(num_faces, indices, languages)?
            .into_iter()
            .collect();
        Ok(CollectionConfig {
            base,
            language_by_index,
        })
    }

    pub fn base(&self) -> &Config {
        &self.base
    }
}

impl ConfigSource for CollectionConfig {
    fn for_font<F: Font + ?Sized>(
        &self,
        font: &F,
        direction: Direction,
    ) -> Option<Cow<'_, Config>> {
        let language = *self.language_by_index.get(&font.face_index().unwrap_or(0))?;
        let config = self.base.for_font(font, direction)?;
        match language {
            Some(language) if config.language.is_none() => {
                Some(Cow::Owned(config.into_owned().with_language(Some(language))))
            }
            _ => Some(config),
        }
    }
}

fn calc_indices_and_languages(
    num_faces: u32,
    indices: Option<&str>,
    languages: Option<&str>,
) -> Result<Vec<(u32, Option<Language>)>> {
    let indices = match indices {
        None => (0..num_faces).collect::<Vec<_>>(),
        Some(indices) => indices
            .split(',')
            .map(|index| {
                index
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidFaceIndex(index.to_owned()))
            })
            .collect::<Result<_>>()?,
    };
    let languages = match languages {
        None | Some("") => Vec::new(),
        Some(languages) => languages
            .split(',')
            .map(|language| match language.trim() {
                "" => Ok(None),
                language => language.parse().map(Some),
            })
            .collect::<Result<Vec<_>>>()?,
    };
    if let [language] = languages.as_slice() {
        let language = *language;
        return Ok(indices.into_iter().map(|index| (index, language)).collect());
    }
    Ok(indices
        .into_iter()
        .enumerate()
        .map(|(i, index)| (index, languages.get(i).copied().flatten()))
        .collect())
}
