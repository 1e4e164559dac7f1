//! Print preview pipeline: job state machine, page rendering, geometry and settings.

pub mod config;
pub mod context;
pub mod controller;
pub mod document;
pub mod error;
pub mod geometry;
pub mod job;
pub mod platform;
pub mod render;
pub mod settings;
pub mod throttle;

pub use config::{ConfigError, EngineConfig};
pub use context::{
    transition, Operation, PageRecord, PreviewContext, PreviewState, RenderStep, RenderedOutput,
};
pub use controller::{
    PreviewController, PreviewJobResult, PreviewProgress, PrintOrigin, PrintingResult,
};
pub use document::{TextDocument, TextMetrics};
pub use error::{PreviewError, PrintRequestError, RenderFault};
pub use geometry::{compute_geometry, PageGeometry, MIN_CONTENT_EXTENT_PT};
pub use job::{
    Margin, MarginMode, NodeId, Orientation, PaperId, PaperSize, PreviewTarget, PrintColorMode,
    PrintJobId, PrintParameters, PrintableArea, SettingsSource, Size,
};
pub use platform::{
    DocumentView, HandOffReply, PreviewTransport, SettingsProvider, SettingsReply,
};
pub use render::{
    count_pages, layout_size, render_page, PageBuffer, PrintViewGuard, RasterOptions, MAX_PAGE_PIXELS,
};
pub use settings::{
    keys, DialogSettings, PageSetup, PageSpan, SettingsPayload, SettingsResolver, MAX_PAPER_EDGE_MM,
};
pub use throttle::{ScriptPrintThrottle, ThrottlePolicy};
