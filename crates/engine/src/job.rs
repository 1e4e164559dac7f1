use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identifier for a preview/print job.
///
/// Identifiers are handed out in increasing order, so a continuation tagged with an
/// older id can always be told apart from the current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrintJobId(u64);

impl PrintJobId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrintJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "print-job-{}", self.0)
    }
}

/// Identifies a single node inside the document selected for printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// What a job renders: the whole document or one designated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewTarget {
    WholeDocument,
    Node(NodeId),
}

impl fmt::Display for PreviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewTarget::WholeDocument => write!(f, "document"),
            PreviewTarget::Node(node) => write!(f, "node #{}", node.0),
        }
    }
}

/// Orientation of a print page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Colour mode for the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintColorMode {
    #[default]
    Color,
    Grayscale,
}

/// Where a set of print parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    Interactive,
    Cloud,
    Local,
    PreviewForPrint,
}

/// 2D size in points (1/72").
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Margin values expressed in points (1/72").
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margin {
    pub const fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// How page margins are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginMode {
    /// Margins follow the printer's non-printable border.
    Default,
    /// Content fills the printable area.
    None,
    Custom(Margin),
}

/// Supported paper identifiers for quick selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperId {
    A4,
    Letter,
    Legal,
    A3,
    Custom,
}

/// Represents a paper size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    pub id: PaperId,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize::new(PaperId::A4, 210.0, 297.0);
    pub const LETTER: PaperSize = PaperSize::new(PaperId::Letter, 215.9, 279.4);
    pub const LEGAL: PaperSize = PaperSize::new(PaperId::Legal, 215.9, 355.6);
    pub const A3: PaperSize = PaperSize::new(PaperId::A3, 297.0, 420.0);

    pub const fn new(id: PaperId, width_mm: f32, height_mm: f32) -> Self {
        Self {
            id,
            width_mm,
            height_mm,
        }
    }

    pub fn from_id(id: PaperId) -> Option<Self> {
        match id {
            PaperId::A4 => Some(Self::A4),
            PaperId::Letter => Some(Self::LETTER),
            PaperId::Legal => Some(Self::LEGAL),
            PaperId::A3 => Some(Self::A3),
            PaperId::Custom => None,
        }
    }

    pub fn to_points(&self, orientation: Orientation) -> Size {
        const MM_PER_INCH: f32 = 25.4;
        let width_pt = self.width_mm / MM_PER_INCH * 72.0;
        let height_pt = self.height_mm / MM_PER_INCH * 72.0;
        match orientation {
            Orientation::Portrait => Size::new(width_pt, height_pt),
            Orientation::Landscape => Size::new(height_pt, width_pt),
        }
    }
}

/// Region of the paper the printer can actually mark, in points from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrintableArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PrintableArea {
    /// Printable area left after insetting `paper` by `inset` on every side.
    pub fn inset(paper: Size, inset: f32) -> Self {
        let inset = inset.max(0.0);
        Self {
            x: inset.min(paper.width / 2.0),
            y: inset.min(paper.height / 2.0),
            width: (paper.width - 2.0 * inset).max(0.0),
            height: (paper.height - 2.0 * inset).max(0.0),
        }
    }

    pub fn full(paper: Size) -> Self {
        Self::inset(paper, 0.0)
    }
}

/// Canonical, validated print settings for one job.
///
/// A job never mutates its parameters; the resolver hands out a fresh instance for
/// every accepted settings payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintParameters {
    pub request_id: Option<i64>,
    pub source: SettingsSource,
    pub printer_name: Option<String>,
    /// Zero-based page indices in ascending order; empty means every page.
    pub page_range: Vec<u32>,
    pub copies: u32,
    pub scale_factor: f32,
    pub margin_mode: MarginMode,
    pub paper: PaperSize,
    pub orientation: Orientation,
    pub printable_area: PrintableArea,
    /// Content box of a page without any document-provided page size.
    pub content_size: Size,
    pub color_mode: PrintColorMode,
}

impl PrintParameters {
    pub fn paper_size(&self) -> Size {
        self.paper.to_points(self.orientation)
    }
}
