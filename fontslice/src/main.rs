use anyhow::{ensure, Context, Result};
use clap::Parser;
use fontslice::{check_store_subdirs, LoadedFont, SliceConfig, SlicePlan};
use fontslice_common::{
    paths::{path_to_string, relative_uri},
    FILTER_SPEC,
};
use std::{fmt::Write, fs, io, path::PathBuf};
use tracing::{error, info};

/// Slices fonts into unicode-range subsets for use as webfonts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The font files to slice.
    #[arg(required = true)]
    fonts: Vec<PathBuf>,

    /// The directory to store the generated slices in.
    #[arg(short, long)]
    store: PathBuf,

    /// Where to write the generated .css file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// A TOML file to load settings from. Command line arguments take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Characters to place in the first slices, or `@file` to read them from a file.
    #[arg(short, long)]
    priority: Option<String>,

    /// The maximum number of codepoints in a slice.
    #[arg(long)]
    ceiling: Option<u32>,

    /// The number of subsetting jobs to run at once.
    #[arg(short, long)]
    workers: Option<usize>,

    /// The font-family name to use in the generated .css file.
    #[arg(long)]
    family: Option<String>,

    /// The URI to prepend to the slice file names in the generated .css file.
    #[arg(long)]
    store_uri: Option<String>,

    /// Only plan the slices and write the range manifest, without subsetting.
    #[arg(long)]
    plan_only: bool,

    /// Write slices as .ttf/.otf files instead of compressing them to WOFF2.
    #[arg(long)]
    sfnt: bool,

    /// Whether to enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { FILTER_SPEC } else { "info" })
        .with_writer(io::stderr)
        .init();

    let file_config = match &args.config {
        Some(path) => SliceConfig::load(path)?,
        None => SliceConfig::default(),
    };
    let config = file_config.override_with(SliceConfig {
        ceiling: args.ceiling,
        workers: args.workers,
        priority: args.priority.clone(),
        font_family: args.family.clone(),
        font_display: None,
        store_uri: args.store_uri.clone(),
    });

    let mut plan = SlicePlan::new();
    config.apply(&mut plan)?;
    if args.plan_only {
        plan.no_subsetting();
    }
    if args.sfnt {
        plan.sfnt_output();
    }

    let mut fonts = Vec::new();
    for path in &args.fonts {
        let data = fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
        let hint = path.file_stem().map(|x| x.to_string_lossy().to_string());
        fonts.extend(LoadedFont::load_with_hint(hint.as_deref(), &data)?);
    }

    let css_dir = match &args.output {
        Some(target) => match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
        None => PathBuf::from("."),
    };
    fs::create_dir_all(&css_dir)?;

    let webfonts = fontslice::process_webfont(&plan, &fonts).await?;
    check_store_subdirs(&webfonts)?;

    let mut css = String::new();
    let mut failed = 0;
    for webfont in webfonts {
        let target = args.store.join(webfont.store_subdir());
        info!("Writing {} slices to {}", webfont.subset_count(), target.display());
        webfont.write_to_store(&target)?;

        let uri = match &config.store_uri {
            Some(uri) => format!("{uri}{}/", path_to_string(webfont.store_subdir())),
            None => relative_uri(&css_dir, &target)?,
        };
        writeln!(css, "{}", webfont.render_css(&uri))?;

        if let Err(e) = webfont.report().ok_or_bail(webfont.font_family()) {
            error!("{e}");
            failed += webfont.report().failed.len();
        }
    }

    if let Some(target) = &args.output {
        fs::write(target, css)?;
    } else {
        println!("{}", css);
    }

    ensure!(failed == 0, "{failed} slices could not be subset.");
    Ok(())
}
