//! Contextual half-width spacing for CJK fonts.
//!
//! This crate adds the `chws` and `vchw` GPOS features to fonts with
//! fullwidth CJK punctuation, along with `halt` and `vhal` when the font
//! lacks them. Glyphs are classified by shaping the punctuation with a
//! [`Shaper`], and the lookups are written with [write-fonts].
//!
//! The engine works on anything implementing [`Font`]. [`FontFile`] and
//! [`HarfRustShaper`] provide the implementations for OpenType files:
//!
//! ```no_run
//! # fn main() -> east_asian_spacing::Result<()> {
//! use east_asian_spacing::{Builder, Config, FontFile, HarfRustShaper};
//!
//! let mut file = FontFile::load("NotoSansCJKjp-Regular.otf")?;
//! let mut builder = Builder::new(Config::default());
//! if pollster::block_on(builder.build(file.faces_mut(), &HarfRustShaper::new()))? {
//!     file.save("build/NotoSansCJKjp-Regular.otf")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [write-fonts]: https://docs.rs/write-fonts

mod builder;
mod cache;
mod config;
mod error;
mod font;
mod glyph;
mod glyph_sets;
mod hb_shaper;
pub mod lookups;
mod opentype;
mod shaper;
mod spacing;
mod tester;

#[cfg(test)]
mod testing;

pub use builder::{calc_output_path, Builder};
pub use cache::{CacheStore, ConsistencyCache, GlyphType};
pub use config::{
    CodePoints, CollectionConfig, Config, ConfigSource, CrossLanguageCheck, FontRule,
    FullwidthAdvance, Language,
};
pub use error::{Error, Result};
pub use font::{Direction, Font, FontKey, CHWS, FWID, HALT, VCHW, VERT, VHAL};
pub use glyph::{GlyphData, GlyphDataList, InkPart};
pub use glyph_sets::GlyphSets;
pub use hb_shaper::HarfRustShaper;
pub use opentype::{FontFile, OpenTypeFace};
pub use shaper::{ShapeRequest, Shaper};
pub use spacing::EastAsianSpacing;
pub use tester::EastAsianSpacingTester;
