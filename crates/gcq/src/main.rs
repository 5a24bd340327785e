//! Glyph cache query - resolve character codes through glyphcache

mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use facesource::{parse_char_code, TableFaceSource};
use glyphcache::{CacheManager, CmapCache, ManagerConfig};
use tracing::{debug, info};

use crate::report::{Lookup, Report};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Charmap table to load, as ID=PATH (repeatable)
    #[arg(short, long = "font", value_name = "ID=PATH")]
    fonts: Vec<String>,

    /// JSON file with manager settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cache budget in bytes (overrides the config file)
    #[arg(short, long)]
    budget: Option<usize>,

    /// Face id to query
    #[arg(long, default_value_t = 0)]
    face: u32,

    /// Subtable index; negative reads the face's active subtable
    #[arg(short, long, default_value_t = -1, allow_hyphen_values = true)]
    subtable: i32,

    /// Also look up every character of this string
    #[arg(short, long)]
    text: Option<String>,

    /// Report failed lookups as glyph 0
    #[arg(long)]
    legacy: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Character codes: decimal, 0x hex or U+ notation
    codes: Vec<String>,
}

fn main() -> Result<()> {
    // Logs go to stderr so the report stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();

    if args.fonts.is_empty() {
        bail!("no fonts given; use --font ID=PATH");
    }

    let mut source = TableFaceSource::new();
    for font in &args.fonts {
        let (id, path) = parse_font(font)?;
        if !path.exists() {
            bail!("font file {} does not exist", path.display());
        }
        debug!("Registered face {} from {}", id, path.display());
        source.register_path(id, path);
    }

    let config = load_config(args.config.as_deref(), args.budget)?;
    info!(
        "Cache budget: {} bytes, {} buckets",
        config.max_weight, config.initial_buckets
    );

    let codes = collect_codes(&args.codes, args.text.as_deref())?;
    if codes.is_empty() {
        bail!("nothing to look up; pass character codes or --text");
    }

    let mut manager =
        CacheManager::new(source, config).context("Failed to create cache manager")?;
    let cmap = CmapCache::new(&mut manager);

    let lookups: Vec<Lookup> = codes
        .into_iter()
        .map(|code| {
            if args.legacy {
                let glyph = cmap.lookup_or_zero(&mut manager, &args.face, args.subtable, code);
                Lookup::found(code, glyph)
            } else {
                match cmap.lookup(&mut manager, &args.face, args.subtable, code) {
                    Ok(glyph) => Lookup::found(code, glyph),
                    Err(e) => Lookup::failed(code, &e),
                }
            }
        })
        .collect();

    let report = Report::new(args.face, args.subtable, lookups, &manager);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", json);
    } else {
        print!("{}", report.render_text());
    }

    manager.destroy();
    Ok(())
}

/// Split an `ID=PATH` font argument
fn parse_font(arg: &str) -> Result<(u32, PathBuf)> {
    let (id, path) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected ID=PATH, got {:?}", arg))?;
    let id = id
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Invalid face id in {:?}", arg))?;
    if path.is_empty() {
        bail!("empty path in {:?}", arg);
    }
    Ok((id, PathBuf::from(path)))
}

/// Read settings from an optional JSON file, then apply the budget flag
fn load_config(path: Option<&Path>, budget: Option<usize>) -> Result<ManagerConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => ManagerConfig::default(),
    };

    if let Some(budget) = budget {
        config.max_weight = budget;
    }
    Ok(config)
}

/// Codes from positional arguments followed by the characters of `text`
fn collect_codes(args: &[String], text: Option<&str>) -> Result<Vec<u32>> {
    let mut codes = args
        .iter()
        .map(|arg| parse_char_code(arg).with_context(|| format!("Invalid character code {:?}", arg)))
        .collect::<Result<Vec<_>>>()?;

    if let Some(text) = text {
        codes.extend(text.chars().map(u32::from));
    }
    Ok(codes)
}
