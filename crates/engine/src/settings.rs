//! Settings resolver: turns an interactive dialog result or a cloud/local job
//! dictionary into one canonical [`PrintParameters`].

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PreviewError;
use crate::geometry::compute_geometry;
use crate::job::{
    Margin, MarginMode, Orientation, PaperSize, PrintColorMode, PrintParameters, PrintableArea,
    SettingsSource,
};

/// Dictionary keys understood in cloud/local job settings.
pub mod keys {
    pub const SETTING_COLOR: &str = "color";
    pub const SETTING_LANDSCAPE: &str = "landscape";
    pub const SETTING_PRINTER_NAME: &str = "printerName";
    pub const SETTING_COPIES: &str = "copies";
    pub const SETTING_PAGE_RANGE: &str = "pageRange";
    pub const SETTING_SCALE_FACTOR: &str = "scaleFactor";
    pub const SETTING_MARGINS_TYPE: &str = "marginsType";
    pub const SETTING_MARGINS_CUSTOM: &str = "marginsCustom";
    pub const SETTING_REQUEST_ID: &str = "requestID";
    pub const SETTING_CLOUD_PRINT_ID: &str = "cloudPrintID";
}

/// Inclusive, one-based page span as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpan {
    pub from: u32,
    pub to: u32,
}

impl PageSpan {
    pub const fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }

    pub const fn single(page: u32) -> Self {
        Self::new(page, page)
    }
}

/// Result of the interactive print dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogSettings {
    pub printer_name: Option<String>,
    pub page_ranges: Vec<PageSpan>,
    pub copies: u32,
    pub scale_factor: f32,
    pub margin_mode: MarginMode,
    pub color_mode: PrintColorMode,
    pub orientation: Orientation,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            printer_name: None,
            page_ranges: Vec::new(),
            copies: 1,
            scale_factor: 1.0,
            margin_mode: MarginMode::Default,
            color_mode: PrintColorMode::Color,
            orientation: Orientation::Portrait,
        }
    }
}

/// Settings as they arrive from one of the three inbound sources.
#[derive(Debug, Clone)]
pub enum SettingsPayload {
    Interactive(DialogSettings),
    Cloud(Value),
    Local(Value),
}

/// Paper defaults applied to every job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    #[serde(default = "default_paper")]
    pub paper: PaperSize,
    #[serde(default)]
    pub orientation: Orientation,
    /// Non-printable border of the printer, in points.
    #[serde(default = "default_printable_inset")]
    pub printable_inset_pt: f32,
}

fn default_paper() -> PaperSize {
    PaperSize::A4
}

fn default_printable_inset() -> f32 {
    18.0
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            paper: default_paper(),
            orientation: Orientation::Portrait,
            printable_inset_pt: default_printable_inset(),
        }
    }
}

/// Longest paper edge accepted from configuration, in millimetres (A0 is 1189).
pub const MAX_PAPER_EDGE_MM: f32 = 2000.0;

impl PageSetup {
    pub(crate) fn sanitize(&mut self) {
        if !(self.paper.width_mm > 0.0 && self.paper.height_mm > 0.0) {
            self.paper = default_paper();
        }
        self.paper.width_mm = self.paper.width_mm.min(MAX_PAPER_EDGE_MM);
        self.paper.height_mm = self.paper.height_mm.min(MAX_PAPER_EDGE_MM);
        if !self.printable_inset_pt.is_finite() || self.printable_inset_pt < 0.0 {
            self.printable_inset_pt = default_printable_inset();
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MarginsType {
    Default,
    None,
    Custom,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobSettings {
    #[serde(rename = "requestID")]
    request_id: Option<i64>,
    printer_name: Option<String>,
    #[serde(rename = "cloudPrintID")]
    cloud_print_id: Option<String>,
    #[serde(default)]
    page_range: Vec<PageSpan>,
    copies: Option<i64>,
    scale_factor: Option<f64>,
    margins_type: Option<MarginsType>,
    margins_custom: Option<Margin>,
    color: Option<bool>,
    landscape: Option<bool>,
}

/// Validated fields shared by every source before paper geometry is applied.
struct Draft {
    request_id: Option<i64>,
    source: SettingsSource,
    printer_name: Option<String>,
    page_spans: Vec<PageSpan>,
    copies: u32,
    scale_factor: f32,
    margin_mode: MarginMode,
    orientation: Orientation,
    color_mode: PrintColorMode,
}

/// Produces canonical print parameters and remembers the last accepted set.
/// 產生標準化的列印參數，並保留最後一次接受的設定。
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    page_setup: PageSetup,
    accepted: Option<Arc<PrintParameters>>,
}

impl SettingsResolver {
    pub fn new(mut page_setup: PageSetup) -> Self {
        page_setup.sanitize();
        Self {
            page_setup,
            accepted: None,
        }
    }

    pub fn page_setup(&self) -> PageSetup {
        self.page_setup
    }

    /// Most recently accepted parameters; untouched by failed resolutions.
    pub fn accepted(&self) -> Option<&Arc<PrintParameters>> {
        self.accepted.as_ref()
    }

    /// Parameters for the job's default page setup, used before any settings exist.
    pub fn defaults(&self) -> PrintParameters {
        self.finish(Draft {
            request_id: None,
            source: SettingsSource::Interactive,
            printer_name: None,
            page_spans: Vec::new(),
            copies: 1,
            scale_factor: 1.0,
            margin_mode: MarginMode::Default,
            orientation: self.page_setup.orientation,
            color_mode: PrintColorMode::Color,
        })
    }

    /// Validates `payload` against a document of `total_pages` pages.
    pub fn resolve(
        &mut self,
        payload: &SettingsPayload,
        total_pages: u32,
    ) -> Result<Arc<PrintParameters>, PreviewError> {
        self.resolve_with_layout(payload, |_| total_pages)
    }

    /// Validates `payload`, bounding its page range by the page count `count_pages`
    /// measures for the resolved parameters.
    pub fn resolve_with_layout<F>(
        &mut self,
        payload: &SettingsPayload,
        count_pages: F,
    ) -> Result<Arc<PrintParameters>, PreviewError>
    where
        F: FnOnce(&PrintParameters) -> u32,
    {
        let mut draft = match payload {
            SettingsPayload::Interactive(dialog) => self.from_dialog(dialog)?,
            SettingsPayload::Cloud(value) => self.from_job(value, SettingsSource::Cloud)?,
            SettingsPayload::Local(value) => self.from_job(value, SettingsSource::Local)?,
        };
        let spans = mem::take(&mut draft.page_spans);
        let mut params = self.finish(draft);
        params.page_range = expand_page_range(&spans, count_pages(&params))?;

        let params = Arc::new(params);
        debug!(
            "accepted {:?} settings: {} copies, {} pages selected",
            params.source,
            params.copies,
            params.page_range.len()
        );
        self.accepted = Some(Arc::clone(&params));
        Ok(params)
    }

    /// Reuses the accepted preview settings to print the finished preview.
    pub fn for_print_from_preview(&self) -> Option<Arc<PrintParameters>> {
        self.accepted.as_ref().map(|accepted| {
            Arc::new(PrintParameters {
                source: SettingsSource::PreviewForPrint,
                ..PrintParameters::clone(accepted)
            })
        })
    }

    fn from_dialog(&self, dialog: &DialogSettings) -> Result<Draft, PreviewError> {
        Ok(Draft {
            request_id: None,
            source: SettingsSource::Interactive,
            printer_name: dialog.printer_name.clone(),
            page_spans: validate_page_spans(&dialog.page_ranges)?,
            copies: validate_copies(i64::from(dialog.copies))?,
            scale_factor: validate_scale(f64::from(dialog.scale_factor))?,
            margin_mode: validate_margins(dialog.margin_mode)?,
            orientation: dialog.orientation,
            color_mode: dialog.color_mode,
        })
    }

    fn from_job(
        &self,
        value: &Value,
        source: SettingsSource,
    ) -> Result<Draft, PreviewError> {
        let job: JobSettings = serde_json::from_value(value.clone())
            .map_err(|err| PreviewError::settings("jobSettings", err.to_string()))?;

        let printer_name = non_empty(job.printer_name);
        match source {
            SettingsSource::Local if printer_name.is_none() => {
                return Err(PreviewError::settings(
                    keys::SETTING_PRINTER_NAME,
                    "local print jobs need a printer",
                ));
            }
            SettingsSource::Cloud if non_empty(job.cloud_print_id).is_none() => {
                return Err(PreviewError::settings(
                    keys::SETTING_CLOUD_PRINT_ID,
                    "cloud print jobs need a cloud printer id",
                ));
            }
            _ => {}
        }

        let margin_mode = match job.margins_type.unwrap_or(MarginsType::Default) {
            MarginsType::Default => MarginMode::Default,
            MarginsType::None => MarginMode::None,
            MarginsType::Custom => match job.margins_custom {
                Some(margin) => validate_margins(MarginMode::Custom(margin))?,
                None => {
                    return Err(PreviewError::settings(
                        keys::SETTING_MARGINS_CUSTOM,
                        "custom margins selected without values",
                    ));
                }
            },
        };

        Ok(Draft {
            request_id: job.request_id,
            source,
            printer_name,
            page_spans: validate_page_spans(&job.page_range)?,
            copies: validate_copies(job.copies.unwrap_or(1))?,
            scale_factor: validate_scale(job.scale_factor.unwrap_or(1.0))?,
            margin_mode,
            orientation: match job.landscape {
                Some(true) => Orientation::Landscape,
                Some(false) => Orientation::Portrait,
                None => self.page_setup.orientation,
            },
            color_mode: match job.color {
                Some(false) => PrintColorMode::Grayscale,
                _ => PrintColorMode::Color,
            },
        })
    }

    /// Leaves `page_range` empty; spans are expanded once the page count is known.
    fn finish(&self, draft: Draft) -> PrintParameters {
        let paper = self.page_setup.paper;
        let paper_pt = paper.to_points(draft.orientation);
        let printable_area = PrintableArea::inset(paper_pt, self.page_setup.printable_inset_pt);
        let geometry = compute_geometry(paper_pt, printable_area, draft.margin_mode, None);

        PrintParameters {
            request_id: draft.request_id,
            source: draft.source,
            printer_name: draft.printer_name,
            page_range: Vec::new(),
            copies: draft.copies,
            scale_factor: draft.scale_factor,
            margin_mode: draft.margin_mode,
            paper,
            orientation: draft.orientation,
            printable_area,
            content_size: geometry.content_size(),
            color_mode: draft.color_mode,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|name| !name.trim().is_empty())
}

fn validate_page_spans(spans: &[PageSpan]) -> Result<Vec<PageSpan>, PreviewError> {
    if let Some(span) = spans.iter().find(|span| span.from == 0 || span.from > span.to) {
        return Err(PreviewError::settings(
            keys::SETTING_PAGE_RANGE,
            format!("malformed span {}-{}", span.from, span.to),
        ));
    }
    Ok(spans.to_vec())
}

/// Zero-based, sorted page indices selected by well-formed `spans`.
fn expand_page_range(spans: &[PageSpan], total_pages: u32) -> Result<Vec<u32>, PreviewError> {
    let mut pages = BTreeSet::new();
    for span in spans {
        if span.to > total_pages {
            return Err(PreviewError::settings(
                keys::SETTING_PAGE_RANGE,
                format!(
                    "span {}-{} exceeds document of {total_pages} pages",
                    span.from, span.to
                ),
            ));
        }
        pages.extend(span.from - 1..span.to);
    }
    Ok(pages.into_iter().collect())
}

fn validate_copies(copies: i64) -> Result<u32, PreviewError> {
    u32::try_from(copies)
        .ok()
        .filter(|copies| *copies >= 1)
        .ok_or_else(|| {
            PreviewError::settings(keys::SETTING_COPIES, format!("{copies} is not at least 1"))
        })
}

fn validate_scale(scale: f64) -> Result<f32, PreviewError> {
    if scale.is_finite() && scale > 0.0 && scale <= f64::from(f32::MAX) {
        Ok(scale as f32)
    } else {
        Err(PreviewError::settings(
            keys::SETTING_SCALE_FACTOR,
            format!("{scale} is not a positive number"),
        ))
    }
}

fn validate_margins(mode: MarginMode) -> Result<MarginMode, PreviewError> {
    if let MarginMode::Custom(margin) = mode {
        let values = [margin.top, margin.bottom, margin.left, margin.right];
        if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(PreviewError::settings(
                keys::SETTING_MARGINS_CUSTOM,
                "margins must be finite and non-negative",
            ));
        }
    }
    Ok(mode)
}
