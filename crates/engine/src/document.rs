//! Plain-text document used as a [`DocumentView`] by the CLI and the tests.

use std::ops::Range;

use image::Rgba;

use crate::error::RenderFault;
use crate::job::{NodeId, PreviewTarget, Size};
use crate::platform::DocumentView;
use crate::render::PageBuffer;

/// Fixed-pitch text metrics used for layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub line_height_pt: f32,
    pub char_width_pt: f32,
    pub glyph_height_pt: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            line_height_pt: 14.0,
            char_width_pt: 7.0,
            glyph_height_pt: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewState {
    size: Size,
    scroll_y: f32,
}

/// Lines of text laid out at constant line height, one view shared by every consumer.
/// 以固定行高排版的純文字文件，檢視由所有使用者共用。
#[derive(Debug, Clone)]
pub struct TextDocument {
    lines: Vec<String>,
    nodes: Vec<Range<usize>>,
    metrics: TextMetrics,
    view: ViewState,
    saved: Vec<ViewState>,
    page_size_hint: Option<Size>,
    attached: bool,
    ink: Rgba<u8>,
}

impl TextDocument {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            nodes: Vec::new(),
            metrics: TextMetrics::default(),
            view: ViewState {
                size: Size::new(800.0, 600.0),
                scroll_y: 0.0,
            },
            saved: Vec::new(),
            page_size_hint: None,
            attached: true,
            ink: Rgba([20, 20, 20, 255]),
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(text.lines().map(str::to_string).collect())
    }

    pub fn with_metrics(mut self, metrics: TextMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Registers lines `range` as a printable node.
    pub fn add_node(&mut self, range: Range<usize>) -> NodeId {
        self.nodes.push(range);
        NodeId(self.nodes.len() as u32 - 1)
    }

    pub fn set_page_size_hint(&mut self, hint: Option<Size>) {
        self.page_size_hint = hint;
    }

    /// Simulates the document being torn down; painting fails afterwards.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn view_size(&self) -> Size {
        self.view.size
    }

    pub fn scroll_offset(&self) -> f32 {
        self.view.scroll_y
    }

    pub fn set_view(&mut self, size: Size, scroll_y: f32) {
        self.view = ViewState { size, scroll_y };
    }

    pub fn is_laid_out_for_print(&self) -> bool {
        !self.saved.is_empty()
    }

    fn lines_for(&self, target: &PreviewTarget) -> Range<usize> {
        let range = match target {
            PreviewTarget::WholeDocument => 0..self.lines.len(),
            PreviewTarget::Node(node) => match self.nodes.get(node.0 as usize) {
                Some(range) => range.clone(),
                None => 0..0,
            },
        };
        let end = range.end.min(self.lines.len());
        range.start.min(end)..end
    }

    /// Lines that fit on one page, never more than `total_lines` (and at least one).
    fn lines_per_page(&self, total_lines: usize) -> usize {
        let line_height = self.metrics.line_height_pt.max(1.0);
        let fits = (self.view.size.height / line_height).floor();
        if !fits.is_finite() || fits >= total_lines as f32 {
            return total_lines.max(1);
        }
        (fits as usize).max(1)
    }
}

impl DocumentView for TextDocument {
    fn natural_page_count(&self, target: &PreviewTarget) -> u32 {
        let lines = self.lines_for(target).len();
        lines.div_ceil(self.lines_per_page(lines)) as u32
    }

    fn page_size_hint(&self, _: &PreviewTarget, _: u32) -> Option<Size> {
        self.page_size_hint
    }

    fn resize_view_for_print(&mut self, width: f32, height: f32) {
        self.saved.push(self.view);
        self.view = ViewState {
            size: Size::new(width.max(1.0), height.max(1.0)),
            scroll_y: 0.0,
        };
    }

    fn restore_view(&mut self) {
        if let Some(previous) = self.saved.pop() {
            self.view = previous;
        }
    }

    fn paint_region(
        &mut self,
        target: &PreviewTarget,
        page_index: u32,
        buffer: &mut PageBuffer,
    ) -> Result<(), RenderFault> {
        if !self.attached {
            return Err(RenderFault::Detached);
        }
        if !self.is_laid_out_for_print() {
            return Err(RenderFault::Engine("view is not laid out for print".into()));
        }

        let range = self.lines_for(target);
        let per_page = self.lines_per_page(range.len());
        let start = (page_index as usize)
            .saturating_mul(per_page)
            .saturating_add(range.start);
        if start >= range.end {
            return Err(RenderFault::Engine(format!(
                "page {page_index} is past the end of {target}"
            )));
        }
        let end = (start + per_page).min(range.end);

        let line_height = self.metrics.line_height_pt;
        self.view.scroll_y = (start - range.start) as f32 * line_height;

        // View coordinates map onto the content box; the ratio is the print scale.
        let scale = buffer.content_size().width / self.view.size.width;
        let max_width = self.view.size.width;
        for (row, line) in self.lines[start..end].iter().enumerate() {
            let chars = line.trim_end().chars().count();
            if chars == 0 {
                continue;
            }
            let indent = line.chars().take_while(|ch| ch.is_whitespace()).count();
            let x = (indent as f32 * self.metrics.char_width_pt).min(max_width);
            let width = ((chars - indent.min(chars)) as f32 * self.metrics.char_width_pt)
                .min(max_width - x);
            let y = row as f32 * line_height;
            buffer.fill_rect(
                x * scale,
                y * scale,
                width * scale,
                self.metrics.glyph_height_pt * scale,
                self.ink,
            );
        }
        Ok(())
    }
}
