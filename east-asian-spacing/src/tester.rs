//! Checking that a font with spacing features shapes as expected

use std::{collections::BTreeSet, fmt};

use log::{error, info};

use crate::{
    config::{CodePoints, Config, ConfigSource},
    error::{Error, Result},
    font::{Direction, Font},
    glyph::GlyphDataList,
    glyph_sets::GlyphSets,
    shaper::{ShapeRequest, Shaper, HANI},
    spacing::EastAsianSpacing,
};

/// Shaping of two characters with and without the spacing feature.
struct ShapeTest {
    input: [u32; 2],
    /// The glyph that should shrink.
    index: usize,
    off_glyphs: GlyphDataList,
    glyphs: GlyphDataList,
    fail_reasons: Vec<String>,
}

impl ShapeTest {
    fn new(input: [u32; 2], index: usize) -> Self {
        ShapeTest {
            input,
            index,
            off_glyphs: GlyphDataList::default(),
            glyphs: GlyphDataList::default(),
            fail_reasons: Vec::new(),
        }
    }

    fn text(&self) -> String {
        self.input
            .iter()
            .filter_map(|c| char::from_u32(*c))
            .collect()
    }

    fn should_have_offset(&self) -> bool {
        self.index != 0
    }

    /// Whether the feature should change the shaping: the target glyph is
    /// fullwidth and each glyph is in its set of `glyph_id_sets`.
    fn should_apply(&self, glyph_id_sets: Option<&[BTreeSet<u32>; 2]>, em: u16) -> bool {
        let off_glyphs: Vec<_> = self.off_glyphs.iter().collect();
        if off_glyphs.iter().any(|glyph| glyph.glyph_id == 0) {
            return false;
        }
        if off_glyphs
            .get(self.index)
            .is_none_or(|glyph| glyph.advance != i32::from(em))
        {
            return false;
        }
        match glyph_id_sets {
            Some(sets) => sets.iter().enumerate().all(|(i, set)| {
                off_glyphs
                    .get(i)
                    .is_some_and(|glyph| set.contains(&glyph.glyph_id))
            }),
            None => true,
        }
    }

    fn fail(&mut self, reason: String) {
        self.fail_reasons.push(reason);
    }

    fn is_fail(&self) -> bool {
        !self.fail_reasons.is_empty()
    }
}

impl fmt::Display for ShapeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [first, second] = self.input;
        write!(f, "  U+{first:04X} U+{second:04X}: ")?;
        if !self.is_fail() {
            return f.write_str("PASS");
        }
        write!(f, "{} ==> {}", self.fail_reasons.join(", "), self.glyphs)?;
        if self.glyphs != self.off_glyphs {
            write!(f, " off={}", self.off_glyphs)?;
        }
        Ok(())
    }
}

/// Tests spacing features by shaping pairs of brackets.
///
/// A closing bracket followed by an opening bracket should shrink the
/// closing one. Two opening brackets should shrink and move the second.
pub struct EastAsianSpacingTester<'a, C> {
    config: &'a C,
    spacing: Option<&'a EastAsianSpacing>,
    smoke: bool,
}

impl<'a, C: ConfigSource> EastAsianSpacingTester<'a, C> {
    pub fn new(config: &'a C) -> Self {
        EastAsianSpacingTester {
            config,
            spacing: None,
            smoke: false,
        }
    }

    /// Limits the tests to the glyphs of `spacing`.
    pub fn with_spacing(mut self, spacing: &'a EastAsianSpacing) -> Self {
        self.spacing = Some(spacing);
        self
    }

    /// Tests fewer pairs.
    pub fn with_smoke_testing(mut self, smoke: bool) -> Self {
        self.smoke = smoke;
        self
    }

    /// Tests all `faces`, failing with [`Error::TestFailed`] if any pair
    /// does not shape as expected.
    pub async fn test<F, S>(&self, faces: &[F], shaper: &S) -> Result<()>
    where
        F: Font,
        S: Shaper<F>,
    {
        let mut summaries = Vec::new();
        let mut num_tested = 0;
        for font in faces {
            let directions = if font.has_vertical_form() {
                &Direction::ALL[..]
            } else {
                &Direction::ALL[..1]
            };
            for direction in directions {
                let tests = self.test_font(font, *direction, shaper).await?;
                let Some(tests) = tests else {
                    continue;
                };
                num_tested += 1;
                let failures: Vec<_> = tests.iter().filter(|test| test.is_fail()).collect();
                if failures.is_empty() {
                    info!("PASS: \"{font}\" {direction} {} tests", tests.len());
                    continue;
                }
                let summary = format!(
                    "FAIL: \"{font}\" {direction} {}/{} tests failed",
                    failures.len(),
                    tests.len()
                );
                let details: Vec<_> = failures.iter().map(|test| test.to_string()).collect();
                error!("{summary}:\n{}", details.join("\n"));
                summaries.push(summary);
            }
        }
        if !summaries.is_empty() {
            return Err(Error::TestFailed(format!(
                "{}/{num_tested} fonts failed.\n  {}",
                summaries.len(),
                summaries.join("\n  ")
            )));
        }
        info!("All {num_tested} fonts passed.");
        Ok(())
    }

    async fn test_font<F, S>(
        &self,
        font: &F,
        direction: Direction,
        shaper: &S,
    ) -> Result<Option<Vec<ShapeTest>>>
    where
        F: Font,
        S: Shaper<F>,
    {
        let Some(config) = self.config.for_font(font, direction) else {
            return Ok(None);
        };
        let config = if self.smoke {
            config.for_smoke_testing()
        } else {
            config.into_owned()
        };
        let glyph_sets = self
            .spacing
            .map(|spacing| spacing.glyph_sets(direction));

        let closing_opening = pairs(&config.cjk_closing, &config.cjk_opening, 0);
        let sets = glyph_sets.map(|sets| [sets.left.glyph_id_set(), sets.right.glyph_id_set()]);
        let mut tested = self
            .assert_trim(font, direction, &config, closing_opening, sets.as_ref(), shaper)
            .await?;

        let opening_opening = pairs(&config.cjk_opening, &config.cjk_opening, 1);
        let sets = glyph_sets.map(|sets| [preceding_right(sets), sets.right.glyph_id_set()]);
        tested.extend(
            self.assert_trim(font, direction, &config, opening_opening, sets.as_ref(), shaper)
                .await?,
        );
        Ok(Some(tested))
    }

    async fn assert_trim<F, S>(
        &self,
        font: &F,
        direction: Direction,
        config: &Config,
        mut tests: Vec<ShapeTest>,
        glyph_id_sets: Option<&[BTreeSet<u32>; 2]>,
        shaper: &S,
    ) -> Result<Vec<ShapeTest>>
    where
        F: Font,
        S: Shaper<F>,
    {
        let off_features = direction.shaping_features(true);
        let mut features = off_features.clone();
        features.push(direction.chws_feature());
        for test in &mut tests {
            let text = test.text();
            let request = ShapeRequest::new(&text, direction)
                .with_language(config.language)
                .with_script(HANI)
                .with_features(off_features.clone());
            test.off_glyphs = shaper.shape(font, &request).await?;
            let request = request.with_features(features.clone());
            test.glyphs = shaper.shape(font, &request).await?;
        }

        // Faces reloaded from the output are not calibrated.
        let em = self
            .spacing
            .and_then(|spacing| spacing.fullwidth_advance(font.face_index(), direction))
            .unwrap_or_else(|| font.fullwidth_advance(direction));
        let offset = em / 2;
        let half_em = i32::from(em - offset);
        let offset = i32::from(offset);
        let mut tested = Vec::new();
        for mut test in tests {
            if !test.should_apply(glyph_id_sets, em) {
                if test.glyphs != test.off_glyphs {
                    test.fail("Unexpected differences".to_owned());
                    tested.push(test);
                }
                continue;
            }
            let index = test.index;
            let (Some(glyph), Some(off_glyph)) =
                (test.glyphs.iter().nth(index), test.off_glyphs.iter().nth(index))
            else {
                test.fail(format!("{index} is missing"));
                tested.push(test);
                continue;
            };
            let (advance, delta) = (glyph.advance, glyph.offset - off_glyph.offset);
            if advance != half_em {
                test.fail(format!("{index}.advance != {half_em}"));
            }
            if test.should_have_offset() && delta != -offset {
                test.fail(format!("{index}.offset != {offset}"));
            }
            tested.push(test);
        }
        Ok(tested)
    }
}

fn pairs(first: &CodePoints, second: &CodePoints, index: usize) -> Vec<ShapeTest> {
    first
        .iter()
        .flat_map(|a| second.iter().map(move |b| ShapeTest::new([*a, *b], index)))
        .collect()
}

/// Right glyphs and the glyphs that shrink right glyphs after them.
fn preceding_right(glyph_sets: &GlyphSets) -> BTreeSet<u32> {
    let mut glyph_ids = glyph_sets.right.glyph_id_set();
    glyph_ids.extend(glyph_sets.na_right.glyph_ids());
    glyph_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::CacheStore,
        config::{CrossLanguageCheck, Language},
        font::{CHWS, VCHW},
        testing::{japanese_shaper, MockFeature, MockFont, MockShaper},
    };

    fn config() -> Config {
        Config::default()
            .with_language(Some(Language::Japanese))
            .with_cross_language_check(CrossLanguageCheck::Off)
    }

    fn spacing(font: &mut MockFont, shaper: &MockShaper) -> EastAsianSpacing {
        let mut spacing = EastAsianSpacing::new();
        pollster::block_on(spacing.add_glyphs(font, &config(), shaper, &mut CacheStore::default()))
            .unwrap();
        spacing
    }

    #[test]
    fn passes_with_chws() {
        let mut font = MockFont::new("Sans");
        let spacing = spacing(&mut font, &japanese_shaper());
        let shaper = japanese_shaper().with_feature(CHWS, MockFeature::chws(&spacing.horizontal, 1000));
        let config = config();
        let tester = EastAsianSpacingTester::new(&config).with_spacing(&spacing);
        pollster::block_on(tester.test(&[font], &shaper)).unwrap();
    }

    #[test]
    fn smoke_testing_without_spacing() {
        let mut font = MockFont::new("Sans");
        let spacing = spacing(&mut font, &japanese_shaper());
        let shaper = japanese_shaper().with_feature(CHWS, MockFeature::chws(&spacing.horizontal, 1000));
        let config = config();
        let tester = EastAsianSpacingTester::new(&config).with_smoke_testing(true);
        pollster::block_on(tester.test(&[font], &shaper)).unwrap();
    }

    #[test]
    fn fails_without_chws() {
        let mut font = MockFont::new("Sans");
        let spacing = spacing(&mut font, &japanese_shaper());
        let config = config();
        let tester = EastAsianSpacingTester::new(&config)
            .with_spacing(&spacing)
            .with_smoke_testing(true);
        let error = pollster::block_on(tester.test(&[font], &japanese_shaper())).unwrap_err();
        let Error::TestFailed(message) = error else {
            panic!("unexpected error {error}");
        };
        assert!(message.starts_with("1/1 fonts failed."), "{message}");
    }

    #[test]
    fn moving_the_wrong_glyph_fails() {
        let mut font = MockFont::new("Sans");
        let spacing = spacing(&mut font, &japanese_shaper());
        let mut chws = MockFeature::chws(&spacing.horizontal, 1000);
        // shrink without moving
        for value in chws.second.values_mut() {
            value.1 = 0;
        }
        let shaper = japanese_shaper().with_feature(CHWS, chws);
        let config = config();
        let tester = EastAsianSpacingTester::new(&config).with_spacing(&spacing);
        assert!(pollster::block_on(tester.test(&[font], &shaper)).is_err());
    }

    #[test]
    fn uncalibrated_face_uses_the_classified_em() {
        let mut font = MockFont::new("Sans");
        font.units_per_em = 2048;
        let spacing = spacing(&mut font, &japanese_shaper());
        assert_eq!(spacing.fullwidth_advance(None, Direction::Horizontal), Some(1000));

        let mut reloaded = MockFont::new("Sans");
        reloaded.units_per_em = 2048;
        assert_eq!(reloaded.fullwidth_advance(Direction::Horizontal), 2048);
        let shaper = japanese_shaper().with_feature(CHWS, MockFeature::chws(&spacing.horizontal, 1000));
        let config = config();
        let tester = EastAsianSpacingTester::new(&config).with_spacing(&spacing);
        pollster::block_on(tester.test(&[reloaded], &shaper)).unwrap();
    }

    #[test]
    fn vertical() {
        let mut font = MockFont::new("Sans").with_vertical();
        let shaper = japanese_shaper()
            .vertical_glyph('「', None, 212)
            .vertical_glyph('」', None, 242);
        let spacing = spacing(&mut font, &shaper);
        let shaper = shaper
            .with_feature(CHWS, MockFeature::chws(&spacing.horizontal, 1000))
            .with_feature(VCHW, MockFeature::chws(&spacing.vertical, 1000));
        let config = config();
        let tester = EastAsianSpacingTester::new(&config).with_spacing(&spacing);
        pollster::block_on(tester.test(&[font], &shaper)).unwrap();
    }

    #[test]
    fn display() {
        let mut test = ShapeTest::new([0x3009, 0x3008], 0);
        assert_eq!(test.to_string(), "  U+3009 U+3008: PASS");
        test.fail("0.advance != 500".to_owned());
        assert_eq!(test.to_string(), "  U+3009 U+3008: 0.advance != 500 ==> []");
    }
}
