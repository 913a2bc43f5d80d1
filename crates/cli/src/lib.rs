use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sheetlink_core::{build_tag_index, LabelEntry, Orientation, ViewerSession};
use sheetlink_render::{FragmentSource, LopdfSource};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "sheetlink")]
#[command(about = "Cross-reference link engine for construction-plan PDFs")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Infer the sheet label of every page.
    Labels {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Detect cross-references on one page and resolve their targets.
    Refs {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },
    /// Resolve a sheet tag to its page number.
    Resolve {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "TAG")]
        tag: String,
    },
    /// Build a tag index JSON for a sheet set.
    Index {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, short, default_value = "index.json")]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PageLabelOutput {
    page: u32,
    label: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefsOutput {
    page: u32,
    scale: f32,
    references: Vec<ReferenceOutput>,
}

#[derive(Debug, Serialize)]
struct ReferenceOutput {
    raw_text: String,
    tag: String,
    target_page: Option<u32>,
    orientation: &'static str,
    bbox: BBoxOutput,
}

#[derive(Debug, Serialize)]
struct BBoxOutput {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    tag: String,
    page: Option<u32>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Labels { file } => run_labels(&file),
        Commands::Refs { file, page, scale } => run_refs(&file, page, scale),
        Commands::Resolve { file, tag } => run_resolve(&file, &tag),
        Commands::Index { file, output } => run_index(&file, &output),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    let source = open_source(file)?;

    let page_count = source.page_count();
    let first_page_size_pt = if page_count > 0 {
        let size = source.page_size(1)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };
    print_json(&payload)
}

fn run_labels(file: &Path) -> Result<()> {
    let source = open_source(file)?;
    let session = populated_session(&source);

    let labels: Vec<PageLabelOutput> = (1..=source.page_count())
        .map(|page| PageLabelOutput {
            page,
            label: match session.registry().get(page) {
                Some(LabelEntry::Label(label)) => Some(label.clone()),
                _ => None,
            },
        })
        .collect();

    print_json(&labels)
}

fn run_refs(file: &Path, page: u32, scale: f32) -> Result<()> {
    let source = open_source(file)?;

    if page == 0 || page > source.page_count() {
        anyhow::bail!("page {page} out of range (document has {} pages)", source.page_count());
    }

    let session = populated_session(&source);

    let page_size = source.page_size(page)?;
    let fragments = source.text_fragments(page).context("failed to extract page text")?;

    // Unresolvable candidates are reported with a null target; the viewer
    // renders those inert.
    let viewport = sheetlink_render::Viewport::new(page_size, scale);
    let references: Vec<ReferenceOutput> = sheetlink_core::detect_references(&fragments, &viewport)
        .iter()
        .map(|candidate| {
            let target = sheetlink_core::resolve(session.registry(), &candidate.embedded_tag);
            reference_output(candidate, target.page())
        })
        .collect();

    print_json(&RefsOutput { page, scale, references })
}

fn reference_output(
    candidate: &sheetlink_core::ReferenceCandidate,
    target_page: Option<u32>,
) -> ReferenceOutput {
    ReferenceOutput {
        raw_text: candidate.raw_text.clone(),
        tag: candidate.embedded_tag.clone(),
        target_page,
        orientation: match candidate.orientation {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        },
        bbox: BBoxOutput {
            left: candidate.bounding_box.left,
            top: candidate.bounding_box.top,
            width: candidate.bounding_box.width,
            height: candidate.bounding_box.height,
        },
    }
}

fn run_resolve(file: &Path, tag: &str) -> Result<()> {
    let source = open_source(file)?;
    let session = populated_session(&source);

    let tag = tag.to_uppercase();
    let page = sheetlink_core::resolve(session.registry(), &tag).page();
    print_json(&ResolveOutput { tag, page })
}

fn run_index(file: &Path, output: &Path) -> Result<()> {
    let source = open_source(file)?;

    let pdf_file = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let index = build_tag_index(&source, &pdf_file).context("failed to build tag index")?;
    index.save(output).context("failed to write tag index")?;

    println!(
        "Found {} unique tags with {} total occurrences",
        index.total_tags,
        index.total_occurrences()
    );
    println!("Index saved to: {}", output.display());
    Ok(())
}

fn open_source(file: &Path) -> Result<LopdfSource> {
    ensure_pdf_exists(file)?;
    LopdfSource::open(file).context("failed to open PDF")
}

fn populated_session(source: &LopdfSource) -> ViewerSession {
    let mut session = ViewerSession::new(source.page_count());
    session.populate_labels(source);
    session
}

fn ensure_pdf_exists(file: &Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("file does not exist: {}", file.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload)?;
    println!("{json}");
    Ok(())
}
