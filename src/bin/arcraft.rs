use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;

use arcraft::{
    AcquireRequest, EditMode, EffectPreset, FileBackend, FileInput, FilterKind, Intent, Marker,
    QrEncoder as _, Raster, RecordingRenderer, Severity, ShareIntent, Step, Wizard, WizardConfig,
    share::{QrEcLevel, QrOptions},
};

#[derive(Parser, Debug)]
#[command(name = "arcraft", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Turn an image into a stored AR experience and print its share link.
    Create(CreateArgs),
    /// Resolve a share link and print the AR scene it opens.
    View(ViewArgs),
    /// List recent experiences, newest first.
    List(StoreArgs),
    /// Delete every stored experience.
    Clear(StoreArgs),
    /// Write a QR code PNG for a URL.
    Qr(QrArgs),
}

#[derive(Parser, Debug)]
struct StoreArgs {
    /// Experience store directory.
    #[arg(long)]
    store: PathBuf,

    /// Wizard config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// Input image (jpeg, png, webp or gif).
    #[arg(long = "in")]
    in_path: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    #[arg(long)]
    brightness: Option<f32>,
    #[arg(long)]
    contrast: Option<f32>,
    #[arg(long)]
    saturation: Option<f32>,
    /// Blur radius in pixels.
    #[arg(long)]
    blur: Option<f32>,
    /// Hue rotation in degrees.
    #[arg(long)]
    hue: Option<f32>,
    #[arg(long)]
    sepia: Option<f32>,
    #[arg(long)]
    grayscale: Option<f32>,
    #[arg(long)]
    invert: Option<f32>,

    /// Effect preset; may be repeated.
    #[arg(long = "effect", value_enum)]
    effects: Vec<EffectChoice>,

    /// Tracking marker (defaults to the config value, then hiro).
    #[arg(long, value_enum)]
    marker: Option<MarkerChoice>,
    #[arg(long)]
    scale: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    height: Option<f32>,
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<f32>,
    #[arg(long)]
    animation: Option<String>,
    #[arg(long)]
    glow: bool,
    #[arg(long)]
    shadow: bool,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,

    /// Override the configured edit mode.
    #[arg(long, value_enum)]
    edit_mode: Option<EditModeChoice>,

    /// Page the share link points at.
    #[arg(long)]
    base_url: Option<String>,

    /// Write the QR code PNG here.
    #[arg(long)]
    qr_out: Option<PathBuf>,

    /// Also print WhatsApp, Telegram and e-mail share links.
    #[arg(long)]
    print_links: bool,
}

#[derive(Parser, Debug)]
struct ViewArgs {
    /// Share link (`?ar=<id>` or `/view/<id>`).
    #[arg(long)]
    url: String,

    #[command(flatten)]
    store: StoreArgs,

    /// Include the full image data URI in the printed scene.
    #[arg(long)]
    with_image: bool,
}

#[derive(Parser, Debug)]
struct QrArgs {
    #[arg(long)]
    url: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 256)]
    size: u32,

    #[arg(long, default_value_t = 2)]
    margin: u32,

    #[arg(long, default_value = "M")]
    ec_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EffectChoice {
    Vintage,
    Dramatic,
    Cool,
    Warm,
}

impl From<EffectChoice> for EffectPreset {
    fn from(c: EffectChoice) -> Self {
        match c {
            EffectChoice::Vintage => Self::Vintage,
            EffectChoice::Dramatic => Self::Dramatic,
            EffectChoice::Cool => Self::Cool,
            EffectChoice::Warm => Self::Warm,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MarkerChoice {
    Hiro,
    Kanji,
    Pattern,
    Barcode,
}

impl From<MarkerChoice> for Marker {
    fn from(c: MarkerChoice) -> Self {
        match c {
            MarkerChoice::Hiro => Self::Hiro,
            MarkerChoice::Kanji => Self::Kanji,
            MarkerChoice::Pattern => Self::Pattern,
            MarkerChoice::Barcode => Self::Barcode,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EditModeChoice {
    Manual,
    Auto,
    Skip,
}

impl From<EditModeChoice> for EditMode {
    fn from(c: EditModeChoice) -> Self {
        match c {
            EditModeChoice::Manual => Self::Manual,
            EditModeChoice::Auto => Self::Auto,
            EditModeChoice::Skip => Self::Skip,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Create(args) => cmd_create(args),
        Command::View(args) => cmd_view(args),
        Command::List(args) => cmd_list(args),
        Command::Clear(args) => cmd_clear(args),
        Command::Qr(args) => cmd_qr(args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WizardConfig> {
    let cfg = match path {
        Some(p) => WizardConfig::from_path(p)?,
        None => WizardConfig::default(),
    };
    Ok(cfg)
}

fn open_wizard(
    cfg: WizardConfig,
    store_dir: &Path,
) -> anyhow::Result<Wizard<FileBackend, RecordingRenderer>> {
    let backend = FileBackend::open(store_dir)
        .with_context(|| format!("open store '{}'", store_dir.display()))?;
    Ok(Wizard::new(cfg, backend, RecordingRenderer::default())?)
}

fn flush_notices(wizard: &mut Wizard<FileBackend, RecordingRenderer>) {
    for n in wizard.drain_notices() {
        let tag = match n.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("[{tag}] {}", n.message);
    }
}

fn write_png(path: &Path, raster: &Raster) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &raster.rgba8,
        raster.width,
        raster.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_create(args: CreateArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.store.config.as_deref())?;
    if let Some(mode) = args.edit_mode {
        cfg.edit_mode = mode.into();
    }
    if let Some(base) = &args.base_url {
        cfg.share_base_url = base.clone();
    }
    let policy = cfg.image_policy();
    let mut wizard = open_wizard(cfg, &args.store.store)?;

    let input = FileInput::from_path(&args.in_path, &policy)
        .with_context(|| format!("load image '{}'", args.in_path.display()))?;
    let acquired = wizard.dispatch(Intent::Acquire(AcquireRequest::File(input)));
    flush_notices(&mut wizard);
    acquired?;

    let filters = [
        (FilterKind::Brightness, args.brightness),
        (FilterKind::Contrast, args.contrast),
        (FilterKind::Saturation, args.saturation),
        (FilterKind::Blur, args.blur),
        (FilterKind::Hue, args.hue),
        (FilterKind::Sepia, args.sepia),
        (FilterKind::Grayscale, args.grayscale),
        (FilterKind::Invert, args.invert),
    ];
    let mut intents: Vec<Intent> = Vec::new();
    if wizard.step() == Step::Edit {
        intents.extend(
            filters
                .into_iter()
                .filter_map(|(kind, v)| v.map(|v| Intent::SetFilter(kind, v))),
        );
        intents.extend(
            args.effects
                .iter()
                .map(|e| Intent::ToggleEffect((*e).into())),
        );
        intents.push(Intent::SaveEdit);
    } else if filters.iter().any(|(_, v)| v.is_some()) || !args.effects.is_empty() {
        tracing::warn!("filter flags are ignored when the edit step is skipped");
    }

    let marker = args.marker.map(Marker::from).or_else(|| {
        wizard
            .state()
            .draft()
            .and_then(|d| d.placement.marker)
            .is_none()
            .then_some(Marker::Hiro)
    });
    intents.extend(marker.map(Intent::SetMarker));
    intents.extend(args.scale.map(Intent::SetScale));
    intents.extend(args.height.map(Intent::SetHeight));
    intents.extend(args.rotation.map(Intent::SetRotation));
    if args.animation.is_some() {
        intents.push(Intent::SetAnimation(args.animation.clone()));
    }
    if args.glow {
        intents.push(Intent::SetGlow(true));
    }
    if args.shadow {
        intents.push(Intent::SetShadow(true));
    }
    intents.extend(args.title.clone().map(Intent::SetTitle));
    intents.extend(args.description.clone().map(Intent::SetDescription));
    intents.push(Intent::Finalize);

    for intent in intents {
        let res = wizard.dispatch(intent);
        flush_notices(&mut wizard);
        res?;
    }

    let card = wizard
        .share_card()
        .cloned()
        .context("wizard finished without a share card")?;
    let exp = wizard
        .store_mut()
        .get(&card.id)?
        .context("finalized experience is missing from the store")?;
    let digest = sha2::Sha256::digest(exp.image().bytes()?);
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    eprintln!("id: {}", card.id);
    eprintln!("title: {}", card.title);
    eprintln!("marker: {}", exp.placement().marker.display_name());
    eprintln!("image sha256: {hex}");
    println!("{}", card.url);

    if let Some(qr_out) = &args.qr_out {
        match &card.qr {
            Some(qr) => {
                write_png(qr_out, qr)?;
                eprintln!("wrote {}", qr_out.display());
            }
            None => eprintln!("no qr code available; not writing {}", qr_out.display()),
        }
    }

    if args.print_links {
        for intent in ShareIntent::ALL {
            if let Some(link) = intent.link(&card) {
                println!("{}: {link}", intent.as_str());
            }
        }
    }
    Ok(())
}

fn cmd_view(args: ViewArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.store.config.as_deref())?;
    let page = url::Url::parse(&args.url).with_context(|| format!("parse url '{}'", args.url))?;
    let backend = FileBackend::open(&args.store.store)
        .with_context(|| format!("open store '{}'", args.store.store.display()))?;
    let mut wizard = Wizard::new(cfg, backend, RecordingRenderer::default())?.with_page_url(page);

    let res = wizard.dispatch(Intent::View(None));
    flush_notices(&mut wizard);
    res?;

    let scene = wizard
        .viewer()
        .scene()
        .context("viewer did not mount a scene")?;
    let mut json = serde_json::to_value(scene).context("serialize scene")?;
    if !args.with_image {
        if let Some(obj) = json.as_object_mut() {
            let len = scene.image.as_str().len();
            obj.insert(
                "image".to_string(),
                serde_json::Value::String(format!("<data uri, {len} bytes>")),
            );
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json).context("format scene")?
    );
    Ok(())
}

fn cmd_list(args: StoreArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let wizard = open_wizard(cfg, &args.store)?;
    for s in wizard.store().list() {
        println!(
            "{}\t{}\t{}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            s.title
        );
    }
    Ok(())
}

fn cmd_clear(args: StoreArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let mut wizard = open_wizard(cfg, &args.store)?;
    let removed = wizard.store_mut().clear()?;
    println!("removed {removed} experience(s)");
    Ok(())
}

fn cmd_qr(args: QrArgs) -> anyhow::Result<()> {
    let opts = QrOptions {
        size: args.size,
        margin: args.margin,
        ec_level: args.ec_level.parse::<QrEcLevel>()?,
    };
    opts.validate()?;
    let raster = arcraft::QrCodeEncoder.encode(&args.url, &opts)?;
    write_png(&args.out, &raster)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
