use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use isaac_markup::config::Site;
use isaac_markup::math::find_math_regions;
use isaac_markup::{
    ContentCache, ContentFragment, Encoding, FigureNumbers, GlossaryTerms, RenderConfig, RenderContext,
    TrustedContent,
};

pub(crate) fn run() -> i32 {
    let cli = Cli::parse();
    match cli.command {
        Command::Render(args) => match render_document(&args) {
            Ok(document) => {
                println!("{document}");
                0
            }
            Err(err) => {
                eprintln!("error: {err}");
                1
            }
        },
        Command::CheckMath(args) => run_check_math(&args),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "isaac-markup",
    version,
    about = "Render Isaac content fragments to HTML"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a content file to a standalone HTML document on stdout.
    Render(RenderArgs),
    /// Report math expressions that fail to convert.
    CheckMath(CheckMathArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML render configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "ISAAC_SITE")]
    site: Option<String>,
    #[arg(long, env = "ISAAC_EXAM_BOARD")]
    exam_board: Option<String>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    file: PathBuf,
    /// html, markdown, latex or plaintext; guessed from the extension if absent.
    #[arg(long)]
    encoding: Option<String>,
    /// Glossary terms as returned by the content API (JSON).
    #[arg(long)]
    glossary: Option<PathBuf>,
    /// Figure numbers keyed by reference id (TOML).
    #[arg(long)]
    figures: Option<PathBuf>,
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long)]
    span: bool,
    #[arg(long)]
    class: Option<String>,
    #[arg(long)]
    accessible_text: bool,
}

#[derive(Args, Debug)]
struct CheckMathArgs {
    file: PathBuf,
    #[command(flatten)]
    config: ConfigArgs,
}

fn render_document(args: &RenderArgs) -> Result<String, String> {
    let mut config = resolve_config(&args.config)?;
    config.accessible_text |= args.accessible_text;

    let figures = match &args.figures {
        Some(path) => FigureNumbers::load(path).map_err(|err| err.to_string())?,
        None => FigureNumbers::new(),
    };
    let glossary = match &args.glossary {
        Some(path) => Some(GlossaryTerms::load(path).map_err(|err| err.to_string())?),
        None => None,
    };
    let fragment = ContentFragment::load(&args.file, args.encoding.as_deref().map(Encoding::from))
        .map_err(|err| err.to_string())?;

    let cache = ContentCache::new();
    let mut cx = RenderContext::new(&config, &figures).with_cache(&cache);
    if let Some(glossary) = &glossary {
        cx = cx.with_glossary(glossary);
    }
    let mut content = TrustedContent::new(cx).span_level(args.span);
    if let Some(class) = &args.class {
        content = content.class_name(class);
    }
    let html = content.render_html(&fragment);
    tracing::debug!(hits = cache.hits(), misses = cache.misses(), "markdown cache");

    let title = args
        .file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(isaac_markup::document(&title, &html))
}

fn run_check_math(args: &CheckMathArgs) -> i32 {
    let config = match resolve_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };
    let fragment = match ContentFragment::load(&args.file, None) {
        Ok(fragment) => fragment,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    let regions = find_math_regions(&fragment.value);
    let mut failures = 0;
    for region in &regions {
        if let Some(err) = region.conversion_error(config.macro_set()) {
            failures += 1;
            println!("{}:{}: {err}: {}", args.file.display(), region.offset, region.latex);
        }
    }
    println!("{} of {} expressions failed to convert", failures, regions.len());
    if failures == 0 { 0 } else { 1 }
}

fn resolve_config(args: &ConfigArgs) -> Result<RenderConfig, String> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path).map_err(|err| err.to_string())?,
        None => RenderConfig::default(),
    };
    if let Some(site) = args.site.as_deref() {
        config.site = parse_site(site)?;
    }
    if let Some(exam_board) = &args.exam_board {
        config.exam_board = Some(exam_board.trim().to_string());
    }
    Ok(config)
}

fn parse_site(raw: &str) -> Result<Site, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "phy" | "physics" => Ok(Site::Phy),
        "ada" | "cs" => Ok(Site::Ada),
        other => Err(format!("unknown site '{other}'; expected phy or ada")),
    }
}
