use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use slidereel::{
    CaptureHost as _, CpuSurface, Exporter, FfmpegHost, FontSet, Pacing, PipelineConfig,
    SlideDeck, SourceDecoder, VideoFormat,
};

#[derive(Parser, Debug)]
#[command(name = "slidereel", version)]
struct Cli {
    /// Pipeline configuration JSON (canvas, fps, layout, formats, fonts).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a deck of default slides.
    New(NewArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Export the deck as a video (requires `ffmpeg`).
    Export(ExportArgs),
    /// List candidate formats and whether the host supports them.
    Formats,
}

#[derive(Parser, Debug)]
struct NewArgs {
    /// Output deck JSON.
    #[arg(long)]
    out: PathBuf,

    /// Number of slides.
    #[arg(long, default_value_t = 1)]
    count: usize,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input deck JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Slide index (0-based).
    #[arg(long, default_value_t = 0)]
    slide: usize,

    /// Animation progress in [0, 1].
    #[arg(long, default_value_t = 1.0)]
    t: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input deck JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video path; the format's extension is added when missing.
    #[arg(long)]
    out: PathBuf,

    /// Only try this MIME type, e.g. `video/mp4;codecs=avc1`.
    #[arg(long)]
    format: Option<String>,

    /// Render as fast as possible instead of in real time.
    #[arg(long)]
    no_pacing: bool,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    match cli.cmd {
        Command::New(args) => cmd_new(args),
        Command::Frame(args) => cmd_frame(args, &config),
        Command::Export(args) => cmd_export(args, config),
        Command::Formats => cmd_formats(&config),
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")
}

fn deck_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_deck(path: &Path) -> anyhow::Result<SlideDeck> {
    let deck = SlideDeck::from_path(path)?;
    deck.validate()?;
    Ok(deck)
}

fn cmd_new(args: NewArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.count > 0, "--count must be at least 1");
    let slides = (0..args.count)
        .map(|_| slidereel::create_default_slide())
        .collect();
    SlideDeck::new(slides).write_to(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_frame(args: FrameArgs, config: &PipelineConfig) -> anyhow::Result<()> {
    let deck = load_deck(&args.in_path)?;
    let slide = deck.slides.get(args.slide).with_context(|| {
        format!(
            "slide index {} out of range (deck has {} slides)",
            args.slide,
            deck.slides.len()
        )
    })?;
    let render = &config.export.render;
    render.validate()?;

    let decoder = SourceDecoder::with_base_dir(deck_dir(&args.in_path));
    let prefetched = runtime()?.block_on(slidereel::prefetch_images(
        std::slice::from_ref(slide),
        &decoder,
    ));
    for warning in &prefetched.warnings {
        eprintln!("warning: {warning}");
    }

    let fonts = FontSet::load(&config.fonts)?.map(Arc::new);
    let mut surface = CpuSurface::new(render.canvas, fonts)?;
    slidereel::render_frame(
        &mut surface,
        &render.layout,
        slide,
        prefetched.images.first().and_then(Option::as_ref),
        args.t,
    );
    let frame = slidereel::Surface::snapshot(&mut surface)?;
    let mut data = frame.data;
    if frame.premultiplied {
        unpremultiply_in_place(&mut data);
    }

    slidereel::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs, mut config: PipelineConfig) -> anyhow::Result<()> {
    let deck = load_deck(&args.in_path)?;
    if let Some(format) = args.format {
        config.export.formats = vec![VideoFormat::new(format)];
    }
    if args.no_pacing {
        config.export.pacing = Pacing::Unpaced;
    }

    let fonts = FontSet::load(&config.fonts)?;
    let exporter = Exporter::new(
        config.export,
        Arc::new(FfmpegHost::new()),
        Arc::new(SourceDecoder::with_base_dir(deck_dir(&args.in_path))),
        Arc::new(slidereel::CpuSurfaceProvider::new(fonts)),
    );

    let mut last_percent = None;
    let mut on_progress = |p: slidereel::ExportProgress| {
        let percent = (p.fraction * 100.0).floor() as u32;
        if last_percent != Some(percent) {
            last_percent = Some(percent);
            eprint!(
                "\rexporting {percent:>3}% ({}/{} frames)",
                p.frames_captured, p.total_frames
            );
            let _ = std::io::stderr().flush();
        }
    };

    let video = runtime()?.block_on(exporter.export(&deck.slides, Some(&mut on_progress)));
    eprintln!();
    let video = video?;

    for warning in &video.decode_warnings {
        eprintln!("warning: {warning}");
    }
    let written = video.write_to(&args.out)?;
    eprintln!(
        "wrote {} ({}, {} frames, {} bytes)",
        written.display(),
        video.format,
        video.frames,
        video.bytes.len()
    );
    Ok(())
}

fn cmd_formats(config: &PipelineConfig) -> anyhow::Result<()> {
    let host = FfmpegHost::new();
    println!(
        "host: {} ({})",
        host.program().display(),
        if host.is_available() {
            "available"
        } else {
            "not available"
        }
    );
    for format in &config.export.formats {
        let support = match host.is_type_supported(format) {
            Some(true) => "supported",
            Some(false) => "unsupported",
            None => "unknown",
        };
        println!("{format:<28} {support}");
    }
    Ok(())
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
