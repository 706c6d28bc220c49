//! Text recognition over captured pixels via Windows.Media.Ocr.
//!
//! The engine is created from the user's profile languages per call; the
//! WinRT async operation is waited on synchronously (the caller already
//! sits on a blocking API).  Frames wider or taller than the engine's
//! maximum dimension are downscaled first and the reported line bounds are
//! mapped back to the original frame.

use serde::Serialize;
use windows::Graphics::Imaging::{BitmapPixelFormat, SoftwareBitmap};
use windows::Media::Ocr::OcrEngine;
use windows::Storage::Streams::DataWriter;

use crate::capture::RawFrame;
use crate::errors::WdaError;

/// One recognized line with its bounds in frame coordinates
/// (`[x, y, width, height]`).
#[derive(Debug, Clone, Serialize)]
pub struct OcrLine {
    pub text: String,
    pub bounds: [i32; 4],
}

/// Full recognition result for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct OcrText {
    pub text: String,
    pub lines: Vec<OcrLine>,
    pub language: String,
}

fn software_bitmap_from_bgra(
    data: &[u8],
    width: u32,
    height: u32,
) -> Result<SoftwareBitmap, WdaError> {
    let writer = DataWriter::new()
        .map_err(|e| WdaError::SystemError(format!("DataWriter::new failed: {e}")))?;
    writer
        .WriteBytes(data)
        .map_err(|e| WdaError::SystemError(format!("WriteBytes failed: {e}")))?;
    let buffer = writer
        .DetachBuffer()
        .map_err(|e| WdaError::SystemError(format!("DetachBuffer failed: {e}")))?;

    SoftwareBitmap::CreateCopyFromBuffer(
        &buffer,
        BitmapPixelFormat::Bgra8,
        width as i32,
        height as i32,
    )
    .map_err(|e| WdaError::SystemError(format!("SoftwareBitmap creation failed: {e}")))
}

/// Downscale a frame so both dimensions fit `max_dim`, returning the new
/// BGRA buffer and the scale applied.
fn fit_to_dimension(
    frame: &RawFrame,
    max_dim: u32,
) -> Result<(Vec<u8>, u32, u32, f64), WdaError> {
    if frame.width <= max_dim && frame.height <= max_dim {
        return Ok((frame.data.clone(), frame.width, frame.height, 1.0));
    }

    let scale = (max_dim as f64 / frame.width as f64).min(max_dim as f64 / frame.height as f64);
    let out_w = ((frame.width as f64 * scale) as u32).max(1);
    let out_h = ((frame.height as f64 * scale) as u32).max(1);

    let rgba: Vec<u8> = frame
        .data
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect();
    let img = image::RgbaImage::from_raw(frame.width, frame.height, rgba).ok_or_else(|| {
        WdaError::EncodingFailed(format!(
            "pixel buffer does not match {}x{} frame",
            frame.width, frame.height
        ))
    })?;
    let resized =
        image::imageops::resize(&img, out_w, out_h, image::imageops::FilterType::CatmullRom);
    let bgra: Vec<u8> = resized
        .into_raw()
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0], px[3]])
        .collect();

    Ok((bgra, out_w, out_h, scale))
}

/// Run OS text recognition over a raw frame.
pub fn recognize_frame(frame: &RawFrame) -> Result<OcrText, WdaError> {
    let engine = OcrEngine::TryCreateFromUserProfileLanguages().map_err(|e| {
        WdaError::SystemError(format!("OCR engine unavailable: {e}"))
    })?;

    let max_dim = OcrEngine::MaxImageDimension().unwrap_or(2_600);
    let (bgra, width, height, scale) = fit_to_dimension(frame, max_dim)?;

    let bitmap = software_bitmap_from_bgra(&bgra, width, height)?;
    let result = engine
        .RecognizeAsync(&bitmap)
        .map_err(|e| WdaError::SystemError(format!("RecognizeAsync failed: {e}")))?
        .get()
        .map_err(|e| WdaError::SystemError(format!("OCR recognition failed: {e}")))?;

    let text = result
        .Text()
        .map(|t| t.to_string())
        .unwrap_or_default();

    let mut lines = Vec::new();
    if let Ok(line_list) = result.Lines() {
        for line in &line_list {
            let line_text = line.Text().map(|t| t.to_string()).unwrap_or_default();

            // A line's bounds are the union of its word rectangles.
            let mut bounds: Option<[f64; 4]> = None;
            if let Ok(words) = line.Words() {
                for word in &words {
                    if let Ok(r) = word.BoundingRect() {
                        let (x0, y0) = (r.X as f64, r.Y as f64);
                        let (x1, y1) = (x0 + r.Width as f64, y0 + r.Height as f64);
                        bounds = Some(match bounds {
                            None => [x0, y0, x1, y1],
                            Some([bx0, by0, bx1, by1]) => {
                                [bx0.min(x0), by0.min(y0), bx1.max(x1), by1.max(y1)]
                            }
                        });
                    }
                }
            }

            let rect = bounds
                .map(|[x0, y0, x1, y1]| {
                    // Map back to original frame coordinates.
                    [
                        (x0 / scale) as i32,
                        (y0 / scale) as i32,
                        ((x1 - x0) / scale) as i32,
                        ((y1 - y0) / scale) as i32,
                    ]
                })
                .unwrap_or([0, 0, 0, 0]);

            lines.push(OcrLine {
                text: line_text,
                bounds: rect,
            });
        }
    }

    let language = engine
        .RecognizerLanguage()
        .and_then(|l| l.LanguageTag())
        .map(|t| t.to_string())
        .unwrap_or_default();

    Ok(OcrText {
        text,
        lines,
        language,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32) -> RawFrame {
        RawFrame {
            width: w,
            height: h,
            data: vec![255u8; (w * h * 4) as usize],
            origin_x: 0,
            origin_y: 0,
        }
    }

    #[test]
    fn small_frames_pass_through_unscaled() {
        let f = frame(800, 600);
        let (data, w, h, scale) = fit_to_dimension(&f, 2_600).unwrap();
        assert_eq!((w, h), (800, 600));
        assert_eq!(scale, 1.0);
        assert_eq!(data.len(), f.data.len());
    }

    #[test]
    fn oversized_frames_shrink_to_fit() {
        let f = frame(5_200, 1_000);
        let (data, w, h, scale) = fit_to_dimension(&f, 2_600).unwrap();
        assert_eq!(w, 2_600);
        assert!(h <= 2_600);
        assert!(scale < 1.0);
        assert_eq!(data.len(), (w * h * 4) as usize);
    }
}
