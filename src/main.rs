//! xm-inspect - Xbox 360 game file inspector
//!
//! Identifies disc images, executables and packages the way the library
//! import does, and pulls the boot executable out of disc images.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xm_core::{logging, Config};
use xm_vfs::{game, ContainerReader, XisoContainerReader};

#[derive(Debug, Subcommand)]
enum Command {
    /// Identify a game file
    ///
    /// Supported formats: .iso, .xex, STFS packages
    Info {
        /// Path to the input file
        path: PathBuf,
    },
    /// Write the default executable of a disc image to a file
    ExtractDefault {
        /// Path to the disc image (first slice for split images)
        iso: PathBuf,
        /// Path to the output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the root directory of a disc image
    List {
        /// Path to the disc image (first slice for split images)
        iso: PathBuf,
    },
}

/// Inspect Xbox 360 disc images, executables and packages.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn info(path: PathBuf, config: &Config) -> Result<()> {
    let identity = game::import(&path, &config.library).with_context(|| format!("identifying {}", path.display()))?;

    println!("Source:       {:?}", identity.source);
    println!("Title ID:     {}", identity.title_id);
    println!("Media ID:     {}", identity.media_id);
    if let Some(title) = &identity.title {
        println!("Title:        {}", title);
    }
    if let Some(display_name) = &identity.display_name {
        println!("Display name: {}", display_name);
    }
    if let Some(content_type) = identity.content_type {
        println!("Content type: {:?} ({})", content_type, content_type.hex_code());
    }
    if let Some(layout) = identity.layout {
        println!("Disc layout:  {}", layout);
    }

    Ok(())
}

fn mount(iso: &Path) -> Result<XisoContainerReader> {
    let reader = XisoContainerReader::new(iso);
    if !reader.try_mount() {
        bail!("{} is not a readable Xbox disc image", iso.display());
    }
    Ok(reader)
}

fn extract_default(iso: PathBuf, output: PathBuf) -> Result<()> {
    let reader = mount(&iso)?;
    let data = reader
        .default_executable()
        .with_context(|| format!("extracting default executable from {}", iso.display()))?;
    reader.dismount();

    std::fs::write(&output, &data).with_context(|| format!("writing {}", output.display()))?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}

fn list(iso: PathBuf) -> Result<()> {
    let reader = mount(&iso)?;
    let info = reader.xgd_info()?;
    println!(
        "Layout: {}, root directory at sector 0x{:x} ({} bytes)",
        reader.layout().map(|l| l.to_string()).unwrap_or_default(),
        info.root_dir_image_sector(),
        info.root_dir_size
    );

    for entry in reader.root_entries().context("reading root directory")? {
        let kind = if entry.is_directory() { "dir " } else { "file" };
        println!("{} {:>12}  0x{:08x}  {}", kind, entry.size, entry.start_sector, entry.name);
    }
    reader.dismount();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;

    logging::init(&config.debug);
    tracing::info!("Starting xm-inspect");

    match args.command {
        Command::Info { path } => info(path, &config),
        Command::ExtractDefault { iso, output } => extract_default(iso, output),
        Command::List { iso } => list(iso),
    }
}
