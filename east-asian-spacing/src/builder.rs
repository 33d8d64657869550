//! Driving the spacing of a font or of all faces of a collection

use std::{
    borrow::Cow,
    io,
    path::{Path, PathBuf},
};

use log::{info, warn};
use write_fonts::types::Tag;

use crate::{
    cache::CacheStore,
    config::{Config, ConfigSource},
    error::{Error, Result},
    font::{Direction, Font},
    shaper::Shaper,
    spacing::EastAsianSpacing,
};

const GPOS: Tag = Tag::new(b"GPOS");

/// Adds spacing features to the faces of a font file.
///
/// Faces of a collection that share their GPOS table share one
/// [`EastAsianSpacing`], so that the GPOS tables stay identical after the
/// features are added.
pub struct Builder<C> {
    config: C,
    caches: CacheStore,
    spacings: Vec<EastAsianSpacing>,
}

/// Faces sharing a GPOS table and their glyphs.
struct SpacingGroup {
    reader_offset: Option<u64>,
    spacing: EastAsianSpacing,
    face_indices: Vec<usize>,
}

impl<C: ConfigSource> Builder<C> {
    pub fn new(config: C) -> Self {
        Builder {
            config,
            caches: CacheStore::default(),
            spacings: Vec::new(),
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn has_spacings(&self) -> bool {
        !self.spacings.is_empty()
    }

    /// The spacings that changed faces.
    pub fn spacings(&self) -> &[EastAsianSpacing] {
        &self.spacings
    }

    pub fn into_spacings(self) -> Vec<EastAsianSpacing> {
        self.spacings
    }

    /// Adds spacing features to `faces`, the faces of one font file.
    ///
    /// Faces that should be skipped are logged and left unchanged. Returns
    /// `true` if any face was changed.
    pub async fn build<F, S>(&mut self, faces: &mut [F], shaper: &S) -> Result<bool>
    where
        F: Font,
        S: Shaper<F>,
    {
        let Builder {
            config,
            caches,
            spacings,
        } = self;
        let mut groups: Vec<SpacingGroup> = Vec::new();
        for (index, font) in faces.iter_mut().enumerate() {
            let font_config = match config_for_font(config, font, shaper).await {
                Ok(Some(font_config)) => font_config,
                Ok(None) => continue,
                Err(error) if error.is_skip() => {
                    warn!("{error}");
                    continue;
                }
                Err(error) => return Err(error),
            };
            // Faces without GPOS get new tables of their own.
            let reader_offset = font.reader_offset(GPOS);
            let group = reader_offset.and_then(|offset| {
                groups
                    .iter()
                    .position(|group| group.reader_offset == Some(offset))
            });
            info!(
                "Building \"{font}\" {} GPOS={}{}",
                config_for_log(&font_config),
                reader_offset.unwrap_or(0),
                if group.is_some() { " (shared)" } else { "" }
            );

            let mut spacing = EastAsianSpacing::new();
            match spacing
                .add_glyphs(font, &font_config, shaper, caches)
                .await
            {
                Ok(()) => (),
                Err(error) if error.is_skip() => {
                    warn!("{error}");
                    continue;
                }
                Err(error) => return Err(error),
            }
            match group {
                // Faces may have different glyphs; the shared table needs all.
                Some(group) => {
                    groups[group].spacing.unite(spacing);
                    groups[group].face_indices.push(index);
                }
                None => groups.push(SpacingGroup {
                    reader_offset,
                    spacing,
                    face_indices: vec![index],
                }),
            }
        }

        let mut changed = false;
        for mut group in groups {
            info!(
                "Adding features to faces {:?}: {}",
                group.face_indices, group.spacing
            );
            let mut group_changed = false;
            for index in &group.face_indices {
                if let Some(font) = faces.get_mut(*index) {
                    group_changed |= group.spacing.add_to_font(font)?;
                }
            }
            if group_changed {
                spacings.push(group.spacing);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// All changed glyph sets united.
    pub fn united_spacing(&self) -> EastAsianSpacing {
        let mut united = EastAsianSpacing::new();
        for spacing in &self.spacings {
            united.unite(spacing.clone());
        }
        united
    }

    pub fn save_glyphs(&self, output: &mut dyn io::Write, comment: u8) -> io::Result<()> {
        self.united_spacing().save_glyphs(output, comment)
    }
}

/// Resolves the configuration of `font`, or `None` if the font should be
/// skipped.
async fn config_for_font<'a, C, F, S>(
    config: &'a C,
    font: &F,
    shaper: &S,
) -> Result<Option<Cow<'a, Config>>>
where
    C: ConfigSource,
    F: Font,
    S: Shaper<F>,
{
    let Some(font_config) = config.for_font(font, Direction::Horizontal) else {
        info!("Skipped by config: \"{font}\"");
        return Ok(None);
    };
    if font_config.skip_monospace_ascii && EastAsianSpacing::is_monospace_ascii(font, shaper).await? {
        info!("Skipped because monospace: \"{font}\"");
        return Ok(None);
    }
    if font.is_aat_morx() {
        return Err(Error::UnsupportedAatMorx {
            font: font.to_string(),
        });
    }
    if EastAsianSpacing::font_has_feature(font) {
        warn!("Skipped because the features exist: \"{font}\"");
        return Ok(None);
    }
    Ok(Some(font_config))
}

fn config_for_log(config: &Config) -> String {
    match config.language {
        _ if config.use_ink_bounds => "use_ink".to_owned(),
        Some(language) => format!("lang={language}"),
        None => "lang=auto".to_owned(),
    }
}

/// The path to save `input` to: in `output_dir` if given, with `suffix`
/// appended to the file stem.
pub fn calc_output_path(input: &Path, output_dir: Option<&Path>, suffix: Option<&str>) -> PathBuf {
    let path = match (output_dir, input.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => input.to_owned(),
    };
    let Some(suffix) = suffix.filter(|suffix| !suffix.is_empty()) else {
        return path;
    };
    let mut name = path.file_stem().unwrap_or_default().to_owned();
    name.push(suffix);
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    path.with_file_name(name)
}
