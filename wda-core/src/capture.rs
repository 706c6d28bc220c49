//! Screen capture and the image pipeline.
//!
//! Sources: primary monitor, monitor by index, window by handle
//! (`PrintWindow` with full-content rendering, so occluded windows still
//! capture), arbitrary virtual-screen region, or the union of all
//! monitors.  The post-capture pipeline overlays the cursor, downscales
//! with aspect preserved (never upscales), encodes JPEG or PNG, and emits
//! inline base64 or a file.
//!
//! GDI handles (DCs, bitmaps) are held in RAII guards so every exit path,
//! including panics, releases them.

use base64::Engine;
use serde::Serialize;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT,
    DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DrawIconEx, GetCursorInfo, GetIconInfo, PrintWindow, CURSORINFO, CURSOR_SHOWING, DI_NORMAL,
    HICON, ICONINFO, PRINT_WINDOW_FLAGS,
};

use crate::config::CaptureConfig;
use crate::errors::WdaError;
use crate::geometry::Rect;
use crate::monitors::{self, MonitorTarget};
use crate::native;
use crate::paths;

/// `PrintWindow` flag that routes through DWM so layered and occluded
/// content renders; absent from the generated bindings.
const PW_RENDERFULLCONTENT: u32 = 0x0000_0002;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// What to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTarget {
    Primary,
    Monitor(usize),
    Window(isize),
    Region(Rect),
    AllMonitors,
}

/// Where the encoded image goes.
#[derive(Debug, Clone, Default)]
pub enum OutputMode {
    /// Base64 payload inline in the result.
    #[default]
    Inline,
    /// Write to a file: the given path, or a timestamped temp file.
    File(Option<String>),
}

/// A fully described capture request.  `None` fields take the configured
/// defaults.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub target: CaptureTarget,
    pub include_cursor: bool,
    pub format: Option<ImageFormat>,
    /// JPEG quality 1..=100.
    pub quality: Option<u8>,
    /// 0 disables the constraint.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub output: OutputMode,
}

impl CaptureRequest {
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            include_cursor: false,
            format: None,
            quality: None,
            max_width: None,
            max_height: None,
            output: OutputMode::Inline,
        }
    }
}

/// Encoded capture result.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotResult {
    /// Base64 payload for inline output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// File path for file output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub format: &'static str,
    pub byte_size: usize,
}

/// Raw BGRA pixels, row-major, top-down.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// BGRA bytes; length is `width * height * 4`.
    pub data: Vec<u8>,
    /// Virtual-screen origin of the frame, for cursor placement.
    pub origin_x: i32,
    pub origin_y: i32,
}

impl RawFrame {
    pub fn set_pixel(&mut self, x: i32, y: i32, bgr: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.data[idx] = bgr[0];
        self.data[idx + 1] = bgr[1];
        self.data[idx + 2] = bgr[2];
        self.data[idx + 3] = 255;
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }
}

// ---------------------------------------------------------------------------
// GDI RAII guards
// ---------------------------------------------------------------------------

struct ScreenDc {
    hwnd: HWND,
    dc: HDC,
}

impl ScreenDc {
    fn get(hwnd: HWND) -> Result<Self, WdaError> {
        let dc = unsafe { GetDC(hwnd) };
        if dc.is_invalid() {
            return Err(WdaError::CaptureFailed("GetDC failed".into()));
        }
        Ok(Self { hwnd, dc })
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe { ReleaseDC(self.hwnd, self.dc) };
    }
}

struct MemoryDc(HDC);

impl MemoryDc {
    fn compatible_with(dc: HDC) -> Result<Self, WdaError> {
        let mem = unsafe { CreateCompatibleDC(dc) };
        if mem.is_invalid() {
            return Err(WdaError::CaptureFailed("CreateCompatibleDC failed".into()));
        }
        Ok(Self(mem))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        let _ = unsafe { DeleteDC(self.0) };
    }
}

struct OwnedBitmap(HBITMAP);

impl OwnedBitmap {
    fn compatible_with(dc: HDC, width: i32, height: i32) -> Result<Self, WdaError> {
        let bitmap = unsafe { CreateCompatibleBitmap(dc, width, height) };
        if bitmap.is_invalid() {
            return Err(WdaError::CaptureFailed(
                "CreateCompatibleBitmap failed".into(),
            ));
        }
        Ok(Self(bitmap))
    }
}

impl Drop for OwnedBitmap {
    fn drop(&mut self) {
        let _ = unsafe { DeleteObject(self.0) };
    }
}

/// Restores the previously selected object on drop.
struct Selected<'a> {
    dc: &'a MemoryDc,
    old: HGDIOBJ,
}

impl<'a> Selected<'a> {
    fn bitmap(dc: &'a MemoryDc, bitmap: &OwnedBitmap) -> Self {
        let old = unsafe { SelectObject(dc.0, bitmap.0) };
        Self { dc, old }
    }
}

impl Drop for Selected<'_> {
    fn drop(&mut self) {
        unsafe { SelectObject(self.dc.0, self.old) };
    }
}

// ---------------------------------------------------------------------------
// Raw capture paths
// ---------------------------------------------------------------------------

fn read_dib(mem_dc: &MemoryDc, bitmap: &OwnedBitmap, width: u32, height: u32) -> Result<Vec<u8>, WdaError> {
    let mut pixels = vec![0u8; width as usize * height as usize * 4];

    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            // Negative height requests a top-down bitmap (row 0 at top).
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            biSizeImage: 0,
            biXPelsPerMeter: 0,
            biYPelsPerMeter: 0,
            biClrUsed: 0,
            biClrImportant: 0,
        },
        bmiColors: [Default::default()],
    };

    let lines = unsafe {
        GetDIBits(
            mem_dc.0,
            bitmap.0,
            0,
            height,
            Some(pixels.as_mut_ptr() as *mut _),
            &bmi as *const _ as *mut _,
            DIB_RGB_COLORS,
        )
    };
    if lines == 0 {
        return Err(WdaError::CaptureFailed("GetDIBits failed".into()));
    }

    // GDI leaves alpha at 0 in BI_RGB mode; force opaque.
    for chunk in pixels.chunks_exact_mut(4) {
        chunk[3] = 255;
    }
    Ok(pixels)
}

/// BitBlt a virtual-screen rectangle into a raw frame.
fn capture_screen_region(region: &Rect, include_cursor: bool) -> Result<RawFrame, WdaError> {
    let width = region.width() as u32;
    let height = region.height() as u32;

    let screen = ScreenDc::get(HWND(std::ptr::null_mut()))?;
    let mem_dc = MemoryDc::compatible_with(screen.dc)?;
    let bitmap = OwnedBitmap::compatible_with(screen.dc, width as i32, height as i32)?;
    let _selected = Selected::bitmap(&mem_dc, &bitmap);

    unsafe {
        BitBlt(
            mem_dc.0,
            0,
            0,
            width as i32,
            height as i32,
            screen.dc,
            region.left,
            region.top,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        )
    }
    .map_err(|e| WdaError::CaptureFailed(format!("BitBlt failed: {e}")))?;

    if include_cursor {
        overlay_cursor(&mem_dc, region.left, region.top);
    }

    let data = read_dib(&mem_dc, &bitmap, width, height)?;
    Ok(RawFrame {
        width,
        height,
        data,
        origin_x: region.left,
        origin_y: region.top,
    })
}

/// PrintWindow capture: renders the window's own surface, so occlusion by
/// other windows does not matter.  Falls back to a screen BitBlt of the
/// window's rectangle when PrintWindow refuses (some GPU-composited apps).
fn capture_window_frame(handle: isize, include_cursor: bool) -> Result<RawFrame, WdaError> {
    let hwnd = native::hwnd(handle);
    if !native::is_window(hwnd) {
        return Err(WdaError::InvalidHandle(format!(
            "{handle} does not refer to a window"
        )));
    }

    let rect = native::window_rect_raw(hwnd)?;
    if rect.is_empty() {
        return Err(WdaError::CaptureFailed(format!(
            "window {handle} has an empty rectangle"
        )));
    }
    let width = rect.width() as u32;
    let height = rect.height() as u32;

    let screen = ScreenDc::get(HWND(std::ptr::null_mut()))?;
    let mem_dc = MemoryDc::compatible_with(screen.dc)?;
    let bitmap = OwnedBitmap::compatible_with(screen.dc, width as i32, height as i32)?;
    let _selected = Selected::bitmap(&mem_dc, &bitmap);

    let printed = unsafe {
        PrintWindow(hwnd, mem_dc.0, PRINT_WINDOW_FLAGS(PW_RENDERFULLCONTENT))
    }
    .as_bool();

    if !printed {
        log::debug!("PrintWindow refused for {handle}; falling back to screen BitBlt");
        return capture_screen_region(&rect, include_cursor);
    }

    if include_cursor {
        overlay_cursor(&mem_dc, rect.left, rect.top);
    }

    let data = read_dib(&mem_dc, &bitmap, width, height)?;
    Ok(RawFrame {
        width,
        height,
        data,
        origin_x: rect.left,
        origin_y: rect.top,
    })
}

/// Draw the visible cursor into a memory DC whose origin maps to
/// `(origin_x, origin_y)` in virtual-screen coordinates.
fn overlay_cursor(mem_dc: &MemoryDc, origin_x: i32, origin_y: i32) {
    let mut info = CURSORINFO {
        cbSize: std::mem::size_of::<CURSORINFO>() as u32,
        ..Default::default()
    };
    if unsafe { GetCursorInfo(&mut info) }.is_err() || info.flags != CURSOR_SHOWING {
        return;
    }

    let icon = HICON(info.hCursor.0);
    let mut icon_info = ICONINFO::default();
    let (hotspot_x, hotspot_y) = if unsafe { GetIconInfo(icon, &mut icon_info) }.is_ok() {
        // GetIconInfo hands us owned bitmaps; release both.
        if !icon_info.hbmMask.is_invalid() {
            let _ = unsafe { DeleteObject(icon_info.hbmMask) };
        }
        if !icon_info.hbmColor.is_invalid() {
            let _ = unsafe { DeleteObject(icon_info.hbmColor) };
        }
        (icon_info.xHotspot as i32, icon_info.yHotspot as i32)
    } else {
        (0, 0)
    };

    let x = info.ptScreenPos.x - origin_x - hotspot_x;
    let y = info.ptScreenPos.y - origin_y - hotspot_y;
    let _ = unsafe {
        DrawIconEx(
            mem_dc.0,
            x,
            y,
            icon,
            0,
            0,
            0,
            None,
            DI_NORMAL,
        )
    };
}

// ---------------------------------------------------------------------------
// Scaling and encoding
// ---------------------------------------------------------------------------

/// Aspect-preserving target size.  Constraints of 0 mean unconstrained;
/// the scale never exceeds 1.0 (no upscaling).
fn scaled_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let wscale = if max_width == 0 {
        f64::INFINITY
    } else {
        max_width as f64 / width as f64
    };
    let hscale = if max_height == 0 {
        f64::INFINITY
    } else {
        max_height as f64 / height as f64
    };

    let scale = wscale.min(hscale).min(1.0);
    if (scale - 1.0).abs() < f64::EPSILON {
        return (width, height);
    }

    let out_w = ((width as f64 * scale).round() as u32).max(1);
    let out_h = ((height as f64 * scale).round() as u32).max(1);
    (out_w, out_h)
}

fn bgra_to_rgba(frame: &RawFrame) -> Result<image::RgbaImage, WdaError> {
    let rgba: Vec<u8> = frame
        .data
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect();
    image::RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| {
        WdaError::EncodingFailed(format!(
            "pixel buffer does not match {}x{} frame",
            frame.width, frame.height
        ))
    })
}

fn encode(
    frame: &RawFrame,
    format: ImageFormat,
    quality: u8,
    max_width: u32,
    max_height: u32,
) -> Result<(Vec<u8>, u32, u32), WdaError> {
    let (out_w, out_h) = scaled_size(frame.width, frame.height, max_width, max_height);

    let mut img = bgra_to_rgba(frame)?;
    if out_w != frame.width || out_h != frame.height {
        img = image::imageops::resize(&img, out_w, out_h, image::imageops::FilterType::CatmullRom);
    }

    let mut buf: Vec<u8> = Vec::new();
    match format {
        ImageFormat::Png => {
            let mut cursor = std::io::Cursor::new(&mut buf);
            img.write_to(&mut cursor, image::ImageFormat::Png)
                .map_err(|e| WdaError::EncodingFailed(format!("PNG encode failed: {e}")))?;
        }
        ImageFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
            let mut cursor = std::io::Cursor::new(&mut buf);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| WdaError::EncodingFailed(format!("JPEG encode failed: {e}")))?;
        }
    }
    Ok((buf, out_w, out_h))
}

fn temp_file_name(format: ImageFormat) -> std::path::PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    std::env::temp_dir().join(format!("screenshot_{stamp}.{}", format.extension()))
}

// ---------------------------------------------------------------------------
// Badge drawing (annotated capture)
// ---------------------------------------------------------------------------

/// 3x5 digit glyphs, one bit per pixel, rows top to bottom.
const DIGIT_GLYPHS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b010, 0b010, 0b010], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

const BADGE_FILL: [u8; 3] = [36, 36, 214]; // BGR red
const BADGE_TEXT: [u8; 3] = [255, 255, 255];
const GLYPH_SCALE: i32 = 2;

/// Draw a numbered badge (filled circle + centered numerals) at a frame
/// coordinate.  Used by annotated capture; numbering is 1-based.
pub fn draw_badge(frame: &mut RawFrame, cx: i32, cy: i32, number: usize) {
    let digits: Vec<usize> = number
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();

    let glyph_w = 3 * GLYPH_SCALE;
    let glyph_h = 5 * GLYPH_SCALE;
    let text_w = digits.len() as i32 * glyph_w + (digits.len() as i32 - 1) * GLYPH_SCALE;
    let radius = ((text_w.max(glyph_h) / 2) + 4).max(9);

    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                frame.set_pixel(cx + dx, cy + dy, BADGE_FILL);
            }
        }
    }

    let mut pen_x = cx - text_w / 2;
    let pen_y = cy - glyph_h / 2;
    for &digit in &digits {
        let glyph = DIGIT_GLYPHS[digit];
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) != 0 {
                    for sy in 0..GLYPH_SCALE {
                        for sx in 0..GLYPH_SCALE {
                            frame.set_pixel(
                                pen_x + col * GLYPH_SCALE + sx,
                                pen_y + row as i32 * GLYPH_SCALE + sy,
                                BADGE_TEXT,
                            );
                        }
                    }
                }
            }
        }
        pen_x += glyph_w + GLYPH_SCALE;
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Capture service: resolves the target, runs the raw capture, and drives
/// the encode pipeline.
pub struct CaptureService {
    config: CaptureConfig,
}

impl CaptureService {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Resolve a non-window capture target to a virtual-screen region.
    fn resolve_region(&self, target: &CaptureTarget) -> Result<Rect, WdaError> {
        let region = match target {
            CaptureTarget::Window(handle) => {
                return Err(WdaError::CaptureFailed(format!(
                    "window target {handle} has no screen region"
                )))
            }
            CaptureTarget::Primary => {
                let mons = monitors::list_monitors()?;
                let index = monitors::resolve_target(&mons, MonitorTarget::Primary)?;
                mons[index].bounds
            }
            CaptureTarget::Monitor(index) => {
                let mons = monitors::list_monitors()?;
                let index = monitors::resolve_target(&mons, MonitorTarget::Index(*index))?;
                mons[index].bounds
            }
            CaptureTarget::AllMonitors => {
                let mons = monitors::list_monitors()?;
                monitors::virtual_screen(&mons)
            }
            CaptureTarget::Region(rect) => {
                if rect.is_empty() {
                    return Err(WdaError::InvalidCoordinates(format!(
                        "capture region must have positive size, got {}x{}",
                        rect.width(),
                        rect.height()
                    )));
                }
                // Regions outside the virtual screen clip to it.
                let vs = native::virtual_screen_rect();
                rect.intersect(&vs).ok_or_else(|| {
                    WdaError::InvalidCoordinates(
                        "capture region lies entirely outside the virtual screen".into(),
                    )
                })?
            }
        };
        Ok(region)
    }

    /// Raw (unencoded) capture; annotated capture draws badges on this
    /// before encoding.
    pub fn capture_raw(&self, target: &CaptureTarget, include_cursor: bool) -> Result<RawFrame, WdaError> {
        if native::secure_desktop_active() {
            return Err(WdaError::SecureDesktopActive(
                "cannot capture while the secure desktop is up".into(),
            ));
        }

        let frame = match target {
            CaptureTarget::Window(handle) => capture_window_frame(*handle, include_cursor)?,
            _ => {
                let region = self.resolve_region(target)?;
                let pixels = region.width() as u64 * region.height() as u64;
                if pixels > self.config.max_pixels {
                    return Err(WdaError::PixelLimitExceeded(format!(
                        "capture of {}x{} exceeds the {}-pixel ceiling",
                        region.width(),
                        region.height(),
                        self.config.max_pixels
                    )));
                }
                capture_screen_region(&region, include_cursor)?
            }
        };

        let pixels = frame.width as u64 * frame.height as u64;
        if pixels > self.config.max_pixels {
            return Err(WdaError::PixelLimitExceeded(format!(
                "captured {}x{} frame exceeds the {}-pixel ceiling",
                frame.width, frame.height, self.config.max_pixels
            )));
        }
        Ok(frame)
    }

    /// Full pipeline: capture, scale, encode, emit.
    pub fn capture(&self, request: &CaptureRequest) -> Result<ScreenshotResult, WdaError> {
        let format = request.format.unwrap_or(self.config.default_format);
        let quality = request.quality.unwrap_or(self.config.default_quality);
        if quality == 0 || quality > 100 {
            return Err(WdaError::InvalidQuality(format!(
                "quality must be 1..=100, got {quality}"
            )));
        }

        let frame = self.capture_raw(&request.target, request.include_cursor)?;
        self.encode_frame(&frame, format, quality, request)
    }

    /// Encode an already-captured frame (shared with annotated capture).
    pub fn encode_frame(
        &self,
        frame: &RawFrame,
        format: ImageFormat,
        quality: u8,
        request: &CaptureRequest,
    ) -> Result<ScreenshotResult, WdaError> {
        let max_width = request.max_width.unwrap_or(self.config.default_max_width);
        let max_height = request.max_height.unwrap_or(self.config.default_max_height);

        let (bytes, out_w, out_h) = encode(frame, format, quality, max_width, max_height)?;
        let byte_size = bytes.len();

        let (data, path) = match &request.output {
            OutputMode::Inline => (
                Some(base64::engine::general_purpose::STANDARD.encode(&bytes)),
                None,
            ),
            OutputMode::File(custom) => {
                let path = match custom {
                    Some(p) => paths::validate_output_path(p)?,
                    None => temp_file_name(format),
                };
                std::fs::write(&path, &bytes).map_err(|e| {
                    WdaError::OutputPathInvalid(format!(
                        "could not write {}: {e}",
                        path.display()
                    ))
                })?;
                (None, Some(path.to_string_lossy().into_owned()))
            }
        };

        Ok(ScreenshotResult {
            data,
            path,
            width: out_w,
            height: out_h,
            original_width: frame.width,
            original_height: frame.height,
            format: format.as_str(),
            byte_size,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse() {
        assert_eq!(ImageFormat::parse("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::parse("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::parse("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::parse("webp"), None);
    }

    #[test]
    fn scaled_size_4k_to_default_width() {
        // 3840x2160 constrained to width 1568: height rounds to 882.
        assert_eq!(scaled_size(3840, 2160, 1568, 0), (1568, 882));
    }

    #[test]
    fn scaled_size_never_upscales() {
        assert_eq!(scaled_size(800, 600, 1568, 0), (800, 600));
        assert_eq!(scaled_size(800, 600, 0, 0), (800, 600));
    }

    #[test]
    fn scaled_size_respects_both_constraints() {
        // Height is the tighter constraint here.
        assert_eq!(scaled_size(1920, 1080, 1568, 540), (960, 540));
    }

    #[test]
    fn scaled_size_preserves_aspect() {
        let (w, h) = scaled_size(3840, 2160, 1000, 1000);
        let original = 3840.0 / 2160.0;
        let scaled = w as f64 / h as f64;
        assert!((original - scaled).abs() < 1.0 / w.min(h) as f64);
    }

    #[test]
    fn temp_file_name_shape() {
        let name = temp_file_name(ImageFormat::Png);
        let file = name.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.starts_with("screenshot_"));
        assert!(file.ends_with(".png"));
        // screenshot_YYYYMMDD_HHMMSS_mmm.png
        assert_eq!(file.len(), "screenshot_20250101_120000_000.png".len());
    }

    fn blank_frame(w: u32, h: u32) -> RawFrame {
        RawFrame {
            width: w,
            height: h,
            data: vec![0u8; (w * h * 4) as usize],
            origin_x: 0,
            origin_y: 0,
        }
    }

    #[test]
    fn encode_jpeg_downscales() {
        let frame = blank_frame(640, 480);
        let (bytes, w, h) = encode(&frame, ImageFormat::Jpeg, 85, 320, 0).unwrap();
        assert_eq!((w, h), (320, 240));
        assert!(!bytes.is_empty());
        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encode_png_is_lossless_format() {
        let frame = blank_frame(16, 16);
        let (bytes, w, h) = encode(&frame, ImageFormat::Png, 85, 0, 0).unwrap();
        assert_eq!((w, h), (16, 16));
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn badge_paints_circle_and_stays_in_bounds() {
        let mut frame = blank_frame(100, 100);
        draw_badge(&mut frame, 50, 50, 7);
        assert_eq!(frame.pixel(50, 50).unwrap()[..3], BADGE_FILL);
        // Far corner untouched.
        assert_eq!(frame.pixel(0, 0).unwrap(), [0, 0, 0, 0]);

        // Clipped badge near the edge must not panic or wrap.
        draw_badge(&mut frame, 0, 0, 42);
        assert_eq!(frame.pixel(0, 0).unwrap()[..3], BADGE_FILL);
    }

    #[test]
    fn set_pixel_ignores_out_of_bounds() {
        let mut frame = blank_frame(4, 4);
        frame.set_pixel(-1, 0, [1, 2, 3]);
        frame.set_pixel(0, 4, [1, 2, 3]);
        frame.set_pixel(4, 0, [1, 2, 3]);
        assert!(frame.data.iter().all(|&b| b == 0));
    }
}
