//! Page geometry: content box and margins for one printed page, in points.

use serde::Serialize;

use crate::job::{MarginMode, PrintableArea, Size};

/// Smallest content extent produced on either axis.
pub const MIN_CONTENT_EXTENT_PT: f32 = 1.0;

/// Content box and margins of a printed page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    pub content_width: f32,
    pub content_height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageGeometry {
    pub fn content_size(&self) -> Size {
        Size::new(self.content_width, self.content_height)
    }
}

/// Computes content size and margin offsets for a page.
///
/// A `css_page_size_hint` replaces the paper size; the printable area is then clipped
/// to the hinted page. Content never collapses below [`MIN_CONTENT_EXTENT_PT`].
pub fn compute_geometry(
    paper: Size,
    printable: PrintableArea,
    margin_mode: MarginMode,
    css_page_size_hint: Option<Size>,
) -> PageGeometry {
    let paper = match css_page_size_hint {
        Some(hint) if hint.width > 0.0 && hint.height > 0.0 => hint,
        _ => paper,
    };
    let printable = clip_to_paper(printable, paper);

    match margin_mode {
        MarginMode::None => PageGeometry {
            content_width: printable.width.max(MIN_CONTENT_EXTENT_PT),
            content_height: printable.height.max(MIN_CONTENT_EXTENT_PT),
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
        },
        MarginMode::Default => PageGeometry {
            content_width: printable.width.max(MIN_CONTENT_EXTENT_PT),
            content_height: printable.height.max(MIN_CONTENT_EXTENT_PT),
            margin_top: printable.y,
            margin_right: (paper.width - printable.x - printable.width).max(0.0),
            margin_bottom: (paper.height - printable.y - printable.height).max(0.0),
            margin_left: printable.x,
        },
        MarginMode::Custom(margin) => {
            let (margin_left, content_width, margin_right) =
                clamp_axis(paper.width, margin.left, margin.right);
            let (margin_top, content_height, margin_bottom) =
                clamp_axis(paper.height, margin.top, margin.bottom);
            PageGeometry {
                content_width,
                content_height,
                margin_top,
                margin_right,
                margin_bottom,
                margin_left,
            }
        }
    }
}

fn clip_to_paper(area: PrintableArea, paper: Size) -> PrintableArea {
    let x = area.x.clamp(0.0, paper.width.max(0.0));
    let y = area.y.clamp(0.0, paper.height.max(0.0));
    PrintableArea {
        x,
        y,
        width: area.width.max(0.0).min(paper.width - x),
        height: area.height.max(0.0).min(paper.height - y),
    }
}

/// Shrinks a pair of margins proportionally until the content between them keeps the
/// minimum extent. Returns `(leading, content, trailing)`.
fn clamp_axis(extent: f32, leading: f32, trailing: f32) -> (f32, f32, f32) {
    let leading = leading.max(0.0);
    let trailing = trailing.max(0.0);
    let available = extent - MIN_CONTENT_EXTENT_PT;
    let total = leading + trailing;

    if available <= 0.0 {
        return (0.0, MIN_CONTENT_EXTENT_PT, 0.0);
    }
    if total <= available {
        return (leading, extent - total, trailing);
    }

    let ratio = available / total;
    (leading * ratio, MIN_CONTENT_EXTENT_PT, trailing * ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Margin;

    fn letter() -> Size {
        Size::new(612.0, 792.0)
    }

    fn printable() -> PrintableArea {
        PrintableArea {
            x: 18.0,
            y: 12.0,
            width: 576.0,
            height: 762.0,
        }
    }

    #[test]
    fn no_margins_fill_printable_area() {
        let geometry = compute_geometry(letter(), printable(), MarginMode::None, None);
        assert_eq!(geometry.content_width, 576.0);
        assert_eq!(geometry.content_height, 762.0);
        assert_eq!(geometry.margin_top, 0.0);
        assert_eq!(geometry.margin_right, 0.0);
        assert_eq!(geometry.margin_bottom, 0.0);
        assert_eq!(geometry.margin_left, 0.0);
    }

    #[test]
    fn default_margins_follow_printable_inset() {
        let geometry = compute_geometry(letter(), printable(), MarginMode::Default, None);
        assert_eq!(geometry.margin_left, 18.0);
        assert_eq!(geometry.margin_right, 18.0);
        assert_eq!(geometry.margin_top, 12.0);
        assert_eq!(geometry.margin_bottom, 18.0);
        assert_eq!(geometry.content_width, 576.0);
    }

    #[test]
    fn custom_margins_are_used_when_they_fit() {
        let margin = Margin {
            top: 72.0,
            bottom: 36.0,
            left: 50.0,
            right: 62.0,
        };
        let geometry = compute_geometry(letter(), printable(), MarginMode::Custom(margin), None);
        assert_eq!(geometry.content_width, 500.0);
        assert_eq!(geometry.content_height, 684.0);
        assert_eq!(geometry.margin_left, 50.0);
    }

    #[test]
    fn oversized_custom_margins_clamp_to_minimum_content() {
        let margin = Margin::uniform(400.0);
        let geometry = compute_geometry(letter(), printable(), MarginMode::Custom(margin), None);
        assert_eq!(geometry.content_width, MIN_CONTENT_EXTENT_PT);
        assert_eq!(geometry.content_height, MIN_CONTENT_EXTENT_PT);
        let width_total = geometry.margin_left + geometry.content_width + geometry.margin_right;
        assert!((width_total - 612.0).abs() < 0.01);
    }

    #[test]
    fn css_hint_replaces_paper_size() {
        let hint = Size::new(300.0, 400.0);
        let geometry = compute_geometry(
            letter(),
            PrintableArea::full(letter()),
            MarginMode::Custom(Margin::uniform(10.0)),
            Some(hint),
        );
        assert_eq!(geometry.content_width, 280.0);
        assert_eq!(geometry.content_height, 380.0);
    }

    #[test]
    fn empty_printable_area_still_yields_content() {
        let geometry = compute_geometry(
            letter(),
            PrintableArea::default(),
            MarginMode::None,
            None,
        );
        assert!(geometry.content_width > 0.0);
        assert!(geometry.content_height > 0.0);
    }
}
