use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use storyreel::config::ApiKeys;
use storyreel::playback::clock::SystemClock;
use storyreel::playback::output::{AudioOutput, NullAudioOutput};
use storyreel::playback::preview::PreviewTarget;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Engine configuration JSON. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip network providers: placeholder images and silent narration.
    #[arg(long, global = true)]
    offline: bool,

    /// Serve images from this directory (`<keyword>.png|jpg`) instead of an image API.
    #[arg(long, global = true)]
    images_dir: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the screen at one timestamp as a PNG.
    Frame(FrameArgs),
    /// Resolve narration and write the master track as a WAV.
    Audio(AudioArgs),
    /// Render one HD still per scene.
    Stills(StillsArgs),
    /// Encode the full video (requires `ffmpeg` on PATH for local and capture backends).
    Render(RenderArgs),
    /// Play the script in real time on the preview canvas.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Timeline position in seconds.
    #[arg(long)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Render at export resolution instead of the preview canvas.
    #[arg(long)]
    hd: bool,
}

#[derive(Parser, Debug)]
struct AudioArgs {
    /// Script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Output WAV path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct StillsArgs {
    /// Script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Directory receiving `scene-NNN.png`.
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Encode backend. Defaults to the configured one.
    #[arg(long, value_enum)]
    backend: Option<storyreel::BackendKind>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Save every presented frame here as `frame-NNNNN.png`.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Do not play narration on the default audio device.
    #[arg(long)]
    mute: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    runtime.block_on(async move {
        match cli.cmd {
            Command::Frame(args) => cmd_frame(&cli.common, args).await,
            Command::Audio(args) => cmd_audio(&cli.common, args).await,
            Command::Stills(args) => cmd_stills(&cli.common, args).await,
            Command::Render(args) => cmd_render(&cli.common, args).await,
            Command::Preview(args) => cmd_preview(&cli.common, args).await,
        }
    })
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(common: &CommonArgs) -> anyhow::Result<storyreel::EngineConfig> {
    let mut cfg = match &common.config {
        Some(path) => storyreel::EngineConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => storyreel::EngineConfig::default(),
    };
    if let Some(dir) = &common.images_dir {
        cfg.providers.images_dir = Some(dir.clone());
    }
    Ok(cfg)
}

fn open_session(common: &CommonArgs, script: &Path) -> anyhow::Result<storyreel::RenderSession> {
    let cfg = load_config(common)?;
    let script = storyreel::Script::from_path(script)
        .with_context(|| format!("load script '{}'", script.display()))?;
    let session = storyreel::RenderSession::new(cfg, script)?
        .with_keys(ApiKeys::from_env())
        .with_offline(common.offline);
    Ok(session)
}

async fn cmd_frame(common: &CommonArgs, args: FrameArgs) -> anyhow::Result<()> {
    let mut session = open_session(common, &args.script)?;
    let canvas = if args.hd {
        session.config().canvas
    } else {
        session.config().preview_canvas
    };

    let frame = session.render_frame(args.at, canvas).await?;
    frame
        .save_png(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_audio(common: &CommonArgs, args: AudioArgs) -> anyhow::Result<()> {
    let mut session = open_session(common, &args.script)?;
    let master = session.write_master_wav(&args.out).await?;

    eprintln!(
        "wrote {} ({:.2}s @ {} Hz)",
        args.out.display(),
        master.duration_secs(),
        master.sample_rate()
    );
    Ok(())
}

async fn cmd_stills(common: &CommonArgs, args: StillsArgs) -> anyhow::Result<()> {
    let mut session = open_session(common, &args.script)?;
    let stills = session.stills(&args.out_dir).await?;

    for still in &stills {
        eprintln!(
            "wrote {} ({} for {:.2}s)",
            still.path.display(),
            still.scene_id,
            still.duration_secs
        );
    }
    Ok(())
}

async fn cmd_render(common: &CommonArgs, args: RenderArgs) -> anyhow::Result<()> {
    let mut session = open_session(common, &args.script)?;
    let kind = args.backend.unwrap_or(session.config().encode.backend);

    let artifact = session.export(kind, &args.out).await?;

    match artifact.probed_duration_secs {
        Some(d) => eprintln!(
            "wrote {} ({} bytes, {d:.2}s)",
            artifact.path.display(),
            artifact.byte_size
        ),
        None => eprintln!(
            "wrote {} ({} bytes)",
            artifact.path.display(),
            artifact.byte_size
        ),
    }
    Ok(())
}

async fn cmd_preview(common: &CommonArgs, args: PreviewArgs) -> anyhow::Result<()> {
    let session = open_session(common, &args.script)?;
    let target = match &args.frames_dir {
        Some(dir) => PreviewTarget::with_frames_dir(dir)
            .with_context(|| format!("prepare frames dir '{}'", dir.display()))?,
        None => PreviewTarget::new(),
    };

    #[cfg(feature = "speaker")]
    {
        if !args.mute {
            match storyreel::playback::speaker::SpeakerOutput::open_default() {
                Ok(speaker) => return run_preview(session, speaker, target).await,
                Err(e) => tracing::warn!(error = %e, "previewing without sound"),
            }
        }
    }
    #[cfg(not(feature = "speaker"))]
    {
        if !args.mute {
            tracing::warn!("built without the `speaker` feature, previewing without sound");
        }
    }

    run_preview(session, NullAudioOutput::default(), target).await
}

async fn run_preview<A: AudioOutput>(
    mut session: storyreel::RenderSession,
    audio: A,
    mut target: PreviewTarget,
) -> anyhow::Result<()> {
    let mut scheduler = session.playback(SystemClock::new(), audio).await?;
    let frames = tokio::task::block_in_place(|| scheduler.run(&mut target))?;

    match target.frames_dir() {
        Some(dir) => eprintln!("presented {frames} frames into {}", dir.display()),
        None => eprintln!("presented {frames} frames"),
    }
    Ok(())
}
