//! Adds contextual half-width spacing features to CJK fonts
//!
//! Takes font files, font collections or directories of them, and writes the
//! fonts with the `chws` and `vchw` features added to the output directory.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use east_asian_spacing::{
    calc_output_path, Builder, CollectionConfig, Config, EastAsianSpacingTester, Error, Font,
    FontFile, FullwidthAdvance, HarfRustShaper, Result,
};
use log::{error, info};

const FONT_EXTENSIONS: [&str; 4] = ["otf", "ttf", "otc", "ttc"];

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Font files, or directories to search for font files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Face index, or a comma separated list of face indices of a collection.
    #[arg(short, long)]
    index: Option<String>,

    /// The language if the font is language-specific, or a comma separated
    /// list of languages for the faces of a collection.
    #[arg(short, long)]
    language: Option<String>,

    /// The fullwidth advance, or characters to compute it from.
    #[arg(long)]
    em: Option<FullwidthAdvance>,

    /// Skip fonts whose ASCII glyphs are monospace.
    #[arg(long)]
    no_monospace: bool,

    /// The output directory.
    #[arg(short, long, default_value = "build")]
    output: PathBuf,

    /// A suffix to add to the output file names.
    #[arg(short, long)]
    suffix: Option<String>,

    /// A directory to write the glyph ids to, `-` for stdout.
    #[arg(short, long)]
    glyph_out: Option<PathBuf>,

    /// The comment level of the glyph output: 0 for glyph ids only, 1 to
    /// add the characters of each glyph, 2 to add the glyphs not in any list.
    #[arg(short = 'G', long, default_value_t = 1)]
    glyph_comment: u8,

    /// Print the output and input paths to stdout.
    #[arg(short, long)]
    print_path: bool,

    /// 0 for no tests, 1 for smoke tests, 2 for full tests.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    test: u8,

    /// Increase the log verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(em) = &self.em {
            config = config.with_fullwidth_advance(Some(em.clone()));
        }
        if self.no_monospace {
            config = config.with_skip_monospace_ascii(true);
        }
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut paths = Vec::new();
    for input in &args.inputs {
        if let Err(e) = expand_path(input, &mut paths) {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    }

    let shaper = HarfRustShaper::new();
    let mut num_failed = 0;
    for path in &paths {
        if let Err(e) = pollster::block_on(build_and_save(path, &args, &shaper)) {
            error!("{e}");
            num_failed += 1;
        }
    }
    if num_failed > 0 {
        error!("{num_failed}/{} fonts failed", paths.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Appends `path`, or the font files in it if it is a directory.
fn expand_path(path: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    if !path.is_dir() {
        paths.push(path.to_owned());
        return Ok(());
    }
    let mut entries = fs::read_dir(path)
        .map_err(|e| Error::io(path, e))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::io(path, e))?;
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            expand_path(&entry, paths)?;
        } else if is_font_extension(&entry) {
            paths.push(entry);
        }
    }
    Ok(())
}

fn is_font_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            FONT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

async fn build_and_save(input: &Path, args: &Args, shaper: &HarfRustShaper) -> Result<()> {
    let mut file = FontFile::load(input)?;
    let num_faces = file.faces().len() as u32;
    let config = CollectionConfig::new(
        args.config(),
        num_faces,
        args.index.as_deref(),
        args.language.as_deref(),
    )?;
    let mut builder = Builder::new(config);
    if !builder.build(file.faces_mut(), shaper).await? {
        info!("Skipped saving due to no changes: \"{}\"", input.display());
        return Ok(());
    }

    let output = calc_output_path(input, Some(&args.output), args.suffix.as_deref());
    file.save(&output)?;
    info!("Saved to \"{}\"", output.display());
    if args.print_path {
        println!("{}\t{}", output.display(), input.display());
    }
    if let Some(glyph_out) = &args.glyph_out {
        save_glyphs(&builder, glyph_out, input, args.glyph_comment)?;
    }

    if args.test > 0 {
        let spacing = builder.united_spacing();
        let changed = spacing.changed_faces();
        let mut faces = FontFile::load(&output)?.into_faces();
        faces.retain(|face| changed.contains(&face.face_index()));
        EastAsianSpacingTester::new(builder.config())
            .with_spacing(&spacing)
            .with_smoke_testing(args.test == 1)
            .test(&faces, shaper)
            .await?;
    }
    Ok(())
}

fn save_glyphs(
    builder: &Builder<CollectionConfig>,
    glyph_out: &Path,
    input: &Path,
    comment: u8,
) -> Result<()> {
    if glyph_out == Path::new("-") {
        let mut stdout = io::stdout().lock();
        return builder
            .save_glyphs(&mut stdout, comment)
            .and_then(|_| stdout.flush())
            .map_err(|e| Error::io("<stdout>", e));
    }
    fs::create_dir_all(glyph_out).map_err(|e| Error::io(glyph_out, e))?;
    let mut name = input.file_name().unwrap_or_default().to_owned();
    name.push("-glyphs");
    let path = glyph_out.join(name);
    let mut out = fs::File::create(&path).map_err(|e| Error::io(&path, e))?;
    builder
        .save_glyphs(&mut out, comment)
        .map_err(|e| Error::io(&path, e))?;
    info!("Saved glyphs to \"{}\"", path.display());
    Ok(())
}
