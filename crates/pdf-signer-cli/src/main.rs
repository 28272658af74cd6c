//! PDF Signer CLI - Place a signature and text boxes on a PDF and flatten them.
//!
//! Every command opens the document, applies one edit to the saved state and
//! saves it again, so a sequence of invocations behaves like one editing
//! session.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_signer_core::pdf::{PageRenderer, PdfDocument};
use pdf_signer_core::{AppConfig, EditorSession, ItemId, PdfSigner, Point, Size, TextColor};
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, ValueEnum)]
enum ColorOption {
    Black,
    Blue,
    DarkRed,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::Black => Self::black(),
            ColorOption::Blue => Self::blue(),
            ColorOption::DarkRed => Self::dark_red(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdf-sign")]
#[command(author, version, about = "Sign PDF documents and add text boxes", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(short, long, env = "PDF_SIGNER_DOCUMENT", global = true)]
    document: Option<PathBuf>,

    /// Signature image (PNG with transparency recommended)
    #[arg(short, long, env = "PDF_SIGNER_SIGNATURE", global = true)]
    signature: Option<PathBuf>,

    /// UI-state JSON file
    #[arg(long, env = "PDF_SIGNER_STATE_FILE", global = true)]
    state_file: Option<PathBuf>,

    /// Text box JSON file
    #[arg(long, env = "PDF_SIGNER_OVERLAY_FILE", global = true)]
    overlay_file: Option<PathBuf>,

    /// Text color
    #[arg(long, value_enum, global = true)]
    color: Option<ColorOption>,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show page count, page sizes and saved edits
    Info,

    /// Render one page to an image file
    Render {
        /// Page number (1-based)
        #[arg(short, long)]
        page: usize,

        /// Output image (.png or .webp)
        #[arg(short, long)]
        output: PathBuf,

        /// Raster scale (default: render_scale from config)
        #[arg(long)]
        scale: Option<f32>,
    },

    /// Write a PNG thumbnail of every page into a directory
    Thumbnails {
        /// Output directory
        #[arg(short, long, default_value = "thumbnails")]
        output: PathBuf,
    },

    /// Show the font family and size detected on a page
    Font {
        /// Page number (1-based)
        #[arg(short, long)]
        page: usize,
    },

    /// Manage text boxes
    #[command(subcommand)]
    Text(TextCommand),

    /// Manage the signature placement
    #[command(subcommand)]
    Sign(SignCommand),

    /// Show or clear the saved state
    #[command(subcommand)]
    State(StateCommand),

    /// Write a new PDF with the text boxes and signature drawn in
    Flatten {
        /// Output PDF (default: <input>_signed.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave the signature out
        #[arg(long)]
        text_only: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TextCommand {
    /// Add a text box
    Add {
        /// Page number (1-based, default: last page)
        #[arg(short, long)]
        page: Option<usize>,

        /// Left edge in raster pixels
        #[arg(short)]
        x: Option<f64>,

        /// Top edge in raster pixels
        #[arg(short)]
        y: Option<f64>,

        /// Font family (default: detected from the page)
        #[arg(long)]
        font: Option<String>,

        /// Font size in points (default: detected from the page)
        #[arg(long)]
        size: Option<u32>,

        text: String,
    },

    /// List text boxes
    List {
        /// Page number (1-based, default: every page)
        #[arg(short, long)]
        page: Option<usize>,
    },

    /// Replace the text of a box
    Edit {
        #[arg(short, long)]
        page: usize,
        /// Box number as shown by `text list`
        index: usize,
        text: String,
    },

    /// Move a box to a new raster position
    Move {
        #[arg(short, long)]
        page: usize,
        index: usize,
        x: f64,
        y: f64,
    },

    /// Change the font of a box
    Style {
        #[arg(short, long)]
        page: usize,
        index: usize,
        family: String,
        size: u32,
    },

    /// Change the size of a box
    Resize {
        #[arg(short, long)]
        page: usize,
        index: usize,
        width: f64,
        height: f64,
    },

    /// Delete a box
    Remove {
        #[arg(short, long)]
        page: usize,
        index: usize,
    },
}

#[derive(Subcommand, Debug)]
enum SignCommand {
    /// Place the signature's top-left corner at a raster position
    Place { x: f64, y: f64 },

    /// Return the signature to its default position
    Clear,
}

#[derive(Subcommand, Debug)]
enum StateCommand {
    /// Print the restored editor status
    Show,

    /// Delete the saved text boxes and UI state
    Clear,
}

/// Convert a 1-based page number to the zero-based index the library uses.
fn page_index(page: usize) -> Result<usize> {
    page.checked_sub(1)
        .context("Page numbers start at 1")
}

/// Open the document and bring back the saved session.
fn open_session(config: AppConfig) -> Result<EditorSession> {
    let mut session = EditorSession::open(config).context("Failed to open document")?;
    session.restore_state().context("Failed to restore saved state")?;
    session.run_idle();
    Ok(session)
}

/// Show `page` with its saved text boxes loaded.
fn show_page(session: &mut EditorSession, page: usize) -> Result<()> {
    if page != session.current_page() {
        session
            .go_to_page(page)
            .context(format!("Failed to open page {}", page + 1))?;
    }
    session.run_idle();
    Ok(())
}

/// Item id of the `index`-th (1-based) text box on the current page.
fn text_box_id(session: &EditorSession, index: usize) -> Result<ItemId> {
    let count = session.scene().text_box_count();
    index
        .checked_sub(1)
        .and_then(|i| session.scene().text_boxes().nth(i))
        .map(|(id, _)| id)
        .with_context(|| {
            format!(
                "No text box {} on page {} ({} boxes)",
                index,
                session.current_page() + 1,
                count
            )
        })
}

fn load_document(config: &AppConfig) -> Result<PdfDocument> {
    let path = config.document_path().context("No input PDF given")?;
    info!("Loading PDF: {}", path.display());
    PdfDocument::from_file(path).context(format!("Failed to load PDF: {}", path.display()))
}

#[allow(clippy::print_stdout)]
fn run_info(config: &AppConfig) -> Result<()> {
    let signer = PdfSigner::with_document(config.clone(), load_document(config)?);
    let doc = signer.document();
    let meta = doc.metadata();

    println!("Pages: {}", doc.page_count());
    if let Some(title) = &meta.title {
        println!("Title: {title}");
    }
    if let Some(author) = &meta.author {
        println!("Author: {author}");
    }
    if let Some(producer) = &meta.producer {
        println!("Producer: {producer}");
    }

    let saved = signer.stores().overlays.load_all();
    for page in 0..doc.page_count() {
        let size = doc.page_size(page)?;
        let boxes = saved.get(&page).map_or(0, |set| set.text_boxes.len());
        println!(
            "  P{}: {:.1} x {:.1} pt, {} text boxes",
            page + 1,
            size.width,
            size.height,
            boxes
        );
    }

    match config.signature.page.resolve(doc.page_count()) {
        Some(page) => println!("Signature page: {}", page + 1),
        None => println!("Signature page: none"),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_render(config: &AppConfig, page: usize, output: &Path, scale: Option<f32>) -> Result<()> {
    let doc = load_document(config)?;
    let renderer = PageRenderer::with_scale(&doc, scale.unwrap_or(config.render_scale));
    let page = page_index(page)?;

    let is_webp = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("webp"));
    let bytes = if is_webp {
        renderer.render_page_webp(page)
    } else {
        renderer.render_page_png(page)
    }
    .context(format!("Failed to render page {}", page + 1))?;

    std::fs::write(output, bytes).context(format!("Failed to write {}", output.display()))?;
    println!("Page {} rendered to: {}", page + 1, output.display());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_thumbnails(config: &AppConfig, output: &Path) -> Result<()> {
    let doc = load_document(config)?;
    let thumbnails = PageRenderer::with_scale(&doc, config.thumbnail_scale)
        .thumbnails()
        .context("Failed to render thumbnails")?;

    std::fs::create_dir_all(output).context(format!("Failed to create {}", output.display()))?;
    for thumb in &thumbnails {
        let path = output.join(format!("{}.png", thumb.label));
        std::fs::write(&path, &thumb.png).context(format!("Failed to write {}", path.display()))?;
    }
    println!("{} thumbnails written to: {}", thumbnails.len(), output.display());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_font(config: &AppConfig, page: usize) -> Result<()> {
    let signer = PdfSigner::with_document(config.clone(), load_document(config)?);
    let props = signer.detect_font(page_index(page)?)?;
    println!("{} {}pt", props.family, props.size);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_text_list(config: AppConfig, page: Option<usize>) -> Result<()> {
    let page = page.map(page_index).transpose()?;
    let saved = PdfSigner::new(config)?.stores().overlays.load(page);
    if saved.is_empty() {
        println!("No text boxes");
    }
    for (page, set) in &saved {
        println!("Page {} (saved {})", page + 1, set.timestamp);
        for (i, record) in set.text_boxes.iter().enumerate() {
            println!(
                "  {}. ({:.1}, {:.1}) pt {} {}pt: {:?}",
                i + 1,
                record.pdf_x,
                record.pdf_y,
                record.font_family,
                record.font_size,
                record.text
            );
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_text(config: AppConfig, command: TextCommand) -> Result<()> {
    if let TextCommand::List { page } = command {
        return run_text_list(config, page);
    }

    let mut session = open_session(config)?;
    match command {
        TextCommand::Add {
            page,
            x,
            y,
            font,
            size,
            text,
        } => {
            let page = page.map_or(Ok(session.total_pages() - 1), page_index)?;
            show_page(&mut session, page)?;
            let position = match (x, y) {
                (Some(x), Some(y)) => Some(Point::new(x, y)),
                _ => None,
            };
            let id = session.add_text_box(position, &text);
            if font.is_some() || size.is_some() {
                let current = session.font_properties().clone();
                session.set_font(
                    id,
                    font.as_deref().unwrap_or(&current.family),
                    size.unwrap_or(current.size),
                )?;
            }
            println!(
                "Added text box {} on page {}",
                session.scene().text_box_count(),
                page + 1
            );
        }
        TextCommand::Edit { page, index, text } => {
            show_page(&mut session, page_index(page)?)?;
            let id = text_box_id(&session, index)?;
            session.edit_text(id, &text)?;
        }
        TextCommand::Move { page, index, x, y } => {
            show_page(&mut session, page_index(page)?)?;
            let id = text_box_id(&session, index)?;
            let landed = session.move_item(id, Point::new(x, y))?;
            println!("Moved to ({:.0}, {:.0})", landed.x, landed.y);
        }
        TextCommand::Style {
            page,
            index,
            family,
            size,
        } => {
            show_page(&mut session, page_index(page)?)?;
            let id = text_box_id(&session, index)?;
            session.set_font(id, &family, size)?;
        }
        TextCommand::Resize {
            page,
            index,
            width,
            height,
        } => {
            show_page(&mut session, page_index(page)?)?;
            let id = text_box_id(&session, index)?;
            session.resize(id, Size::new(width, height))?;
        }
        TextCommand::Remove { page, index } => {
            show_page(&mut session, page_index(page)?)?;
            let id = text_box_id(&session, index)?;
            session.remove_item(id)?;
        }
        TextCommand::List { .. } => return Ok(()),
    }

    session.save_state().context("Failed to save text boxes")?;
    println!("{}", session.status_line());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_sign(config: AppConfig, command: &SignCommand) -> Result<()> {
    let mut session = open_session(config)?;
    let page = session
        .signature_page()
        .context("The document has no page for the signature")?;
    show_page(&mut session, page)?;

    match command {
        SignCommand::Place { x, y } => {
            let landed = session.place_signature(Point::new(*x, *y))?;
            println!("Signature placed at ({:.0}, {:.0})", landed.x, landed.y);
        }
        SignCommand::Clear => session.clear_signature(),
    }

    session.save_state().context("Failed to save state")?;
    println!("{}", session.status_line());
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_state(config: AppConfig, command: &StateCommand) -> Result<()> {
    match command {
        StateCommand::Show => {
            let session = open_session(config)?;
            println!("{}", session.status_line());
            println!("Scroll: {}", session.scroll_position());
        }
        StateCommand::Clear => {
            let signer = PdfSigner::new(config)?;
            signer.stores().overlays.clear()?;
            signer.stores().ui_state.clear()?;
            println!("Saved state cleared");
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_flatten(config: AppConfig, output: Option<PathBuf>, text_only: bool) -> Result<()> {
    let output_path = match output {
        Some(path) => path,
        None => config.output_path()?,
    };
    let signer = PdfSigner::new(config).context("Failed to open document")?;

    #[allow(clippy::cast_possible_truncation)]
    let pb = ProgressBar::new(signer.document().page_count() as u64);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let progress_bar = pb.clone();
    let report = signer
        .flatten(
            &output_path,
            text_only,
            Some(Box::new(move |done: usize, _total: usize| {
                progress_bar.set_position(done as u64);
            })),
        )
        .context("Failed to flatten document")?;
    pb.finish_with_message("Flatten complete");

    println!(
        "{} text boxes on {} pages{}",
        report.text_drawn,
        report.pages_changed.len(),
        if report.signature_drawn { ", signed" } else { "" }
    );
    if report.text_skipped > 0 {
        println!("{} text boxes could not be drawn (see log)", report.text_skipped);
    }
    println!("Signed PDF saved to: {}", output_path.display());
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(document) = args.document {
        config.document = Some(document);
    }
    if let Some(signature) = args.signature {
        config.signature.path = Some(signature);
    }
    if let Some(state_file) = args.state_file {
        config.state_file = state_file;
    }
    if let Some(overlay_file) = args.overlay_file {
        config.overlay_file = overlay_file;
    }
    if let Some(color) = args.color {
        config.text_color = color.into();
    }

    match args.command {
        Command::Info => run_info(&config),
        Command::Render {
            page,
            output,
            scale,
        } => run_render(&config, page, &output, scale),
        Command::Thumbnails { output } => run_thumbnails(&config, &output),
        Command::Font { page } => run_font(&config, page),
        Command::Text(command) => run_text(config, command),
        Command::Sign(command) => run_sign(config, &command),
        Command::State(command) => run_state(config, &command),
        Command::Flatten { output, text_only } => run_flatten(config, output, text_only),
    }
}
