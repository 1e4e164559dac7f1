use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use printpreview_engine::{
    compute_geometry, keys, DialogSettings, EngineConfig, HandOffReply, Margin, MarginMode,
    Orientation, PageSpan, PaperSize, PreviewController, PreviewTarget, PreviewTransport,
    PrintColorMode, PrintJobId, PrintOrigin, PrintableArea, RenderedOutput, SettingsPayload,
    SettingsProvider, SettingsReply, TextDocument,
};
use serde_json::{json, Value as SerdeValue};

#[derive(Parser)]
#[command(
    name = "printpreview",
    about = "Render print previews of text documents",
    author,
    version
)]
struct Cli {
    /// 引擎設定檔路徑；不存在時使用預設值。 / Engine configuration file (defaults are used when missing).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 產生文件的列印預覽。 / Render a print preview of a file.
    Preview(PreviewArgs),
    /// 顯示頁面幾何計算結果。 / Print the computed page geometry as JSON.
    Geometry(PageArgs),
    /// 管理引擎設定檔。 / Manage the engine configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct PageArgs {
    /// 紙張大小；預設沿用設定檔。 / Paper size; defaults to the configured paper.
    #[arg(long, value_name = "PAPER")]
    paper: Option<PaperChoice>,

    /// 橫向列印。 / Print in landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// 邊界模式。 / Margin mode.
    #[arg(long, value_name = "MODE", default_value = "default")]
    margins: MarginsChoice,

    /// 自訂邊界（點），套用於四邊。 / Custom margin in points, applied to every side.
    #[arg(long, value_name = "PT", default_value_t = 36.0)]
    margin_pt: f32,
}

#[derive(Args)]
struct PreviewArgs {
    /// 需要預覽的文字檔。 / Text file to preview.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    #[command(flatten)]
    page: PageArgs,

    /// 頁碼範圍，例如 1-3,5。 / Pages to render, e.g. 1-3,5.
    #[arg(long, value_name = "RANGES")]
    pages: Option<String>,

    /// 份數。 / Number of copies.
    #[arg(long, default_value_t = 1)]
    copies: u32,

    /// 縮放比例。 / Scale factor applied to the content.
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// 以灰階輸出。 / Render in grayscale.
    #[arg(long)]
    grayscale: bool,

    /// 將請求視為腳本觸發。 / Treat the request as script-initiated.
    #[arg(long)]
    script: bool,

    /// 以 JSON 工作設定取代命令列參數。 / Read job settings from a JSON dictionary instead of flags.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["pages", "copies", "scale", "grayscale"])]
    job_settings: Option<PathBuf>,

    /// 每頁輸出 PNG 的資料夾。 / Directory receiving one PNG per rendered page.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// 寫出預設設定檔。 / Write the default configuration.
    Init(ConfigInitArgs),
}

#[derive(Args)]
struct ConfigInitArgs {
    /// 輸出檔案路徑。 / Destination file path.
    #[arg(value_name = "PATH")]
    output: PathBuf,

    /// 覆寫既有檔案。 / Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaperChoice {
    A4,
    Letter,
    Legal,
    A3,
}

impl From<PaperChoice> for PaperSize {
    fn from(choice: PaperChoice) -> Self {
        match choice {
            PaperChoice::A4 => PaperSize::A4,
            PaperChoice::Letter => PaperSize::LETTER,
            PaperChoice::Legal => PaperSize::LEGAL,
            PaperChoice::A3 => PaperSize::A3,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MarginsChoice {
    Default,
    None,
    Custom,
}

impl PageArgs {
    fn margin_mode(&self) -> MarginMode {
        match self.margins {
            MarginsChoice::Default => MarginMode::Default,
            MarginsChoice::None => MarginMode::None,
            MarginsChoice::Custom => MarginMode::Custom(Margin::uniform(self.margin_pt)),
        }
    }

    fn orientation(&self, config: &EngineConfig) -> Orientation {
        if self.landscape {
            Orientation::Landscape
        } else {
            config.page_setup.orientation
        }
    }

    fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(paper) = self.paper {
            config.page_setup.paper = paper.into();
        }
        config.page_setup.orientation = self.orientation(config);
    }
}

/// Answers the settings request from command-line flags or a job dictionary.
struct CliSettings {
    payload: SettingsPayload,
}

impl SettingsProvider for CliSettings {
    fn request_settings(&mut self, target: &PreviewTarget, expected_page_count: u32) -> SettingsReply {
        debug!("settings requested for {target} ({expected_page_count} pages)");
        SettingsReply::Accepted(self.payload.clone())
    }
}

/// Writes handed-off pages as PNG files.
struct PngWriter {
    out_dir: Option<PathBuf>,
    written: Vec<PathBuf>,
}

impl PreviewTransport for PngWriter {
    type Error = anyhow::Error;

    fn page_rendered(
        &mut self,
        job_id: PrintJobId,
        page_index: u32,
        rendered: u32,
        total: u32,
    ) -> Result<(), Self::Error> {
        debug!("{job_id}: page {} ready ({rendered}/{total})", page_index + 1);
        Ok(())
    }

    fn hand_off(&mut self, job_id: PrintJobId, output: RenderedOutput) -> Result<HandOffReply, Self::Error> {
        let Some(dir) = &self.out_dir else {
            return Ok(HandOffReply::Ack);
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        for page in output.pages() {
            let path = dir.join(format!("page-{}.png", page.page_index() + 1));
            let bytes = page
                .encode_png()
                .with_context(|| format!("failed to encode page {}", page.page_index() + 1))?;
            fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
            self.written.push(path);
        }
        info!("{job_id}: wrote {} pages to {}", self.written.len(), dir.display());
        Ok(HandOffReply::Ack)
    }
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli { config, command } = Cli::parse();
    match command {
        Commands::Preview(args) => execute_preview(args, &load_config(config.as_deref())?),
        Commands::Geometry(args) => execute_geometry(args, &load_config(config.as_deref())?),
        Commands::Config(ConfigCommand::Init(args)) => execute_config_init(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn execute_preview(args: PreviewArgs, config: &EngineConfig) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut document = TextDocument::from_text(&text);

    let mut config = config.clone();
    args.page.apply_to(&mut config);

    let payload = match &args.job_settings {
        Some(path) => job_settings_payload(path, &args.page)?,
        None => SettingsPayload::Interactive(DialogSettings {
            printer_name: None,
            page_ranges: match &args.pages {
                Some(spec) => parse_page_ranges(spec)?,
                None => Vec::new(),
            },
            copies: args.copies,
            scale_factor: args.scale,
            margin_mode: args.page.margin_mode(),
            color_mode: if args.grayscale {
                PrintColorMode::Grayscale
            } else {
                PrintColorMode::Color
            },
            orientation: config.page_setup.orientation,
        }),
    };

    let transport = PngWriter {
        out_dir: args.out_dir.clone(),
        written: Vec::new(),
    };
    let mut controller = PreviewController::new(&config, transport);
    let origin = if args.script {
        PrintOrigin::Script
    } else {
        PrintOrigin::User
    };
    let outcome = controller
        .run_preview(
            origin,
            PreviewTarget::WholeDocument,
            &mut document,
            &mut CliSettings { payload },
            Instant::now(),
        )
        .with_context(|| format!("preview of {} failed", args.input.display()))?;

    println!(
        "{}: rendered {} pages in {:.1?} ({:?})",
        outcome.job_id, outcome.page_count, outcome.document_render_time, outcome.result
    );
    for path in &controller.transport().written {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Builds a cloud or local payload from a JSON job dictionary.
fn job_settings_payload(path: &Path, page: &PageArgs) -> Result<SettingsPayload> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut value: SerdeValue = serde_json::from_str(&content)
        .with_context(|| format!("invalid job settings JSON in {}", path.display()))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("job settings in {} must be a JSON object", path.display()))?;
    if page.landscape {
        object
            .entry(keys::SETTING_LANDSCAPE)
            .or_insert(SerdeValue::Bool(true));
    }
    if object.contains_key(keys::SETTING_CLOUD_PRINT_ID) {
        Ok(SettingsPayload::Cloud(value))
    } else {
        Ok(SettingsPayload::Local(value))
    }
}

/// Parses one-based page ranges such as `1-3,5`.
fn parse_page_ranges(spec: &str) -> Result<Vec<PageSpan>> {
    let mut spans = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let span = match part.split_once('-') {
            Some((from, to)) => PageSpan::new(parse_page(from)?, parse_page(to)?),
            None => PageSpan::single(parse_page(part)?),
        };
        spans.push(span);
    }
    if spans.is_empty() {
        bail!("page range `{spec}` does not name any pages");
    }
    Ok(spans)
}

fn parse_page(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .with_context(|| format!("`{}` is not a page number", text.trim()))
}

fn execute_geometry(args: PageArgs, config: &EngineConfig) -> Result<()> {
    let mut config = config.clone();
    args.apply_to(&mut config);
    let setup = config.page_setup;
    let paper = setup.paper.to_points(setup.orientation);
    let printable = PrintableArea::inset(paper, setup.printable_inset_pt);
    let geometry = compute_geometry(paper, printable, args.margin_mode(), None);

    let report = json!({
        "paper": setup.paper.id,
        "orientation": setup.orientation,
        "paper_width": paper.width,
        "paper_height": paper.height,
        "geometry": geometry,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn execute_config_init(args: ConfigInitArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.output.display()
        );
    }
    EngineConfig::default().save(&args.output)?;
    println!("Wrote default configuration to {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_page_ranges() {
        let spans = parse_page_ranges("1-3, 5").expect("parse");
        assert_eq!(spans, vec![PageSpan::new(1, 3), PageSpan::single(5)]);
        assert!(parse_page_ranges(",").is_err());
        assert!(parse_page_ranges("2-x").is_err());
    }
}
