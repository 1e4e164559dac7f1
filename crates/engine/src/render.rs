//! Page render pipeline: borrows the document view, lays it out for one printed page,
//! paints that page into a fresh buffer and restores the view.

use std::ops::{Deref, DerefMut};

use image::{codecs::png::PngEncoder, ColorType, ImageBuffer, ImageEncoder, ImageError, Rgba};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::PreviewError;
use crate::geometry::PageGeometry;
use crate::job::{PreviewTarget, PrintColorMode, PrintParameters, Size};
use crate::platform::DocumentView;

/// Upper bound on the pixels of one page buffer.
pub const MAX_PAGE_PIXELS: u64 = 1 << 26;

/// Resolution used when rasterizing page buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterOptions {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_dpi() -> u32 {
    72
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { dpi: default_dpi() }
    }
}

impl RasterOptions {
    pub fn pixels_per_point(&self) -> f32 {
        self.dpi.max(1) as f32 / 72.0
    }
}

/// One rendered page, sized to the content box of its geometry.
/// 單一已渲染頁面，尺寸與版面內容區相同。
#[derive(Debug, Clone)]
pub struct PageBuffer {
    page_index: u32,
    content_size: Size,
    pixels_per_point: f32,
    image: ImageBuffer<Rgba<u8>, Vec<u8>>,
}

impl PageBuffer {
    /// Oversized pages are rasterized below `raster`'s resolution so the buffer stays
    /// within [`MAX_PAGE_PIXELS`].
    pub fn new(page_index: u32, content_size: Size, raster: RasterOptions) -> Self {
        let mut pixels_per_point = raster.pixels_per_point();
        let area = f64::from(content_size.width.max(1.0))
            * f64::from(content_size.height.max(1.0))
            * f64::from(pixels_per_point).powi(2);
        if area > MAX_PAGE_PIXELS as f64 {
            let reduced = f64::from(pixels_per_point) * (MAX_PAGE_PIXELS as f64 / area).sqrt();
            debug!(
                "page {page_index} too large at {} dpi, rasterizing at {reduced:.2} px/pt",
                raster.dpi
            );
            pixels_per_point = reduced as f32;
        }
        let width_px = (content_size.width * pixels_per_point).ceil().max(1.0) as u32;
        let height_px = (content_size.height * pixels_per_point).ceil().max(1.0) as u32;
        Self {
            page_index,
            content_size,
            pixels_per_point,
            image: ImageBuffer::from_pixel(width_px, height_px, Rgba([255, 255, 255, 255])),
        }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn content_size(&self) -> Size {
        self.content_size
    }

    pub fn pixels_per_point(&self) -> f32 {
        self.pixels_per_point
    }

    pub fn width_px(&self) -> u32 {
        self.image.width()
    }

    pub fn height_px(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.width_px() && y < self.height_px()).then(|| *self.image.get_pixel(x, y))
    }

    /// Fills a rectangle given in points relative to the content origin.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba<u8>) {
        let scale = self.pixels_per_point;
        let x0 = (x * scale).round() as i64;
        let y0 = (y * scale).round() as i64;
        let x1 = x0.saturating_add((width * scale).ceil() as i64);
        let y1 = y0.saturating_add((height * scale).ceil() as i64);

        let width_px = self.image.width() as i64;
        let height_px = self.image.height() as i64;
        let (x0, x1) = (x0.clamp(0, width_px), x1.clamp(0, width_px));
        let (y0, y1) = (y0.clamp(0, height_px), y1.clamp(0, height_px));
        for yy in y0..y1 {
            for xx in x0..x1 {
                self.image.put_pixel(xx as u32, yy as u32, color);
            }
        }
    }

    pub fn convert_to_grayscale(&mut self) {
        for pixel in self.image.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            *pixel = Rgba([luma, luma, luma, a]);
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        let mut data = Vec::new();
        PngEncoder::new(&mut data).write_image(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            ColorType::Rgba8,
        )?;
        Ok(data)
    }
}

/// Exclusive, temporary print layout of a [`DocumentView`].
/// 文件檢視的暫時列印版面；離開作用域時一定會還原。
///
/// The view is resized on acquisition and restored when the guard drops, on every
/// exit path.
pub struct PrintViewGuard<'a, V: DocumentView + ?Sized> {
    view: &'a mut V,
}

impl<'a, V: DocumentView + ?Sized> PrintViewGuard<'a, V> {
    pub fn acquire(view: &'a mut V, layout: Size) -> Self {
        view.resize_view_for_print(layout.width, layout.height);
        Self { view }
    }
}

impl<V: DocumentView + ?Sized> Deref for PrintViewGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        self.view
    }
}

impl<V: DocumentView + ?Sized> DerefMut for PrintViewGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        self.view
    }
}

impl<V: DocumentView + ?Sized> Drop for PrintViewGuard<'_, V> {
    fn drop(&mut self) {
        self.view.restore_view();
    }
}

/// Size the view is laid out at so that `scale_factor` magnifies the content box.
pub fn layout_size(geometry: &PageGeometry, scale_factor: f32) -> Size {
    let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    };
    Size::new(
        geometry.content_width / scale,
        geometry.content_height / scale,
    )
}

/// Page count of `target` when laid out for `geometry`.
pub fn count_pages<V: DocumentView + ?Sized>(
    view: &mut V,
    target: &PreviewTarget,
    geometry: &PageGeometry,
    scale_factor: f32,
) -> u32 {
    let guard = PrintViewGuard::acquire(view, layout_size(geometry, scale_factor));
    guard.natural_page_count(target)
}

/// Renders exactly one page of `target` into a new buffer.
pub fn render_page<V: DocumentView + ?Sized>(
    view: &mut V,
    target: &PreviewTarget,
    page_index: u32,
    params: &PrintParameters,
    geometry: &PageGeometry,
    raster: RasterOptions,
) -> Result<PageBuffer, PreviewError> {
    let mut buffer = PageBuffer::new(page_index, geometry.content_size(), raster);
    {
        let mut guard =
            PrintViewGuard::acquire(view, layout_size(geometry, params.scale_factor));
        guard
            .paint_region(target, page_index, &mut buffer)
            .map_err(|source| {
                warn!("painting page {page_index} of {target} failed: {source}");
                PreviewError::PageRender {
                    page: page_index,
                    source,
                }
            })?;
    }

    if params.color_mode == PrintColorMode::Grayscale {
        buffer.convert_to_grayscale();
    }
    debug!(
        "rendered page {page_index} of {target} at {}x{} px",
        buffer.width_px(),
        buffer.height_px()
    );
    Ok(buffer)
}
