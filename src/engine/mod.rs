//! The fallback color science engine: a pure, fixed-order pixel
//! pipeline over f32 RGB.
//!
//! Stage order (each stage clamps its own output and skips when its
//! parameters are neutral):
//!
//! 1. white balance
//! 2. exposure
//! 3. contrast
//! 4. highlights/shadows recovery
//! 5. whites/blacks
//! 6. texture
//! 7. clarity
//! 8. dehaze
//! 9. saturation/vibrance
//! 10. HSL selective color
//! 11. color grading (split toning)
//! 12. calibration (last: it remaps the base color mapping)

pub mod blur;
pub mod color;
pub mod detail;
pub mod grading;
pub mod selective;
pub mod tone;

use crate::foundation::error::{TonecraftError, TonecraftResult};
use crate::params::model::AdjustmentParams;

/// Interleaved RGB pixel buffer with channels in 0..1.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuf {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl PixelBuf {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * 3],
        }
    }

    pub fn from_rgb8(img: &image::RgbImage) -> Self {
        let data = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            width: img.width(),
            height: img.height(),
            data,
        }
    }

    /// Quantize back to 8-bit, rounding and clamping per channel.
    pub fn to_rgb8(&self) -> TonecraftResult<image::RgbImage> {
        let bytes: Vec<u8> = self
            .data
            .iter()
            .map(|&v| {
                let v = if v.is_finite() { v } else { 0.0 };
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect();
        image::RgbImage::from_raw(self.width, self.height, bytes)
            .ok_or_else(|| TonecraftError::engine("pixel buffer does not match its dimensions"))
    }

    fn validate(&self) -> TonecraftResult<()> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| TonecraftError::engine("pixel buffer size overflow"))?;
        if self.data.len() != expected {
            return Err(TonecraftError::engine(format!(
                "pixel buffer length {} does not match {}x{}",
                self.data.len(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// The CPU fallback renderer. Stateless; safe to share across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColorEngine;

impl ColorEngine {
    /// Run the full adjustment pipeline in place.
    ///
    /// Pure computation, no I/O. Parameters are assumed sanitized (see
    /// [`AdjustmentParams::sanitize`]); output channels land in 0..1.
    #[tracing::instrument(skip_all, fields(width = buf.width, height = buf.height))]
    pub fn apply(&self, buf: &mut PixelBuf, params: &AdjustmentParams) -> TonecraftResult<()> {
        buf.validate()?;
        let (width, height) = (buf.width, buf.height);
        let data = &mut buf.data;

        tone::white_balance(data, &params.white_balance);
        tone::exposure(data, params.basic.exposure);
        tone::contrast(data, params.basic.contrast);
        tone::highlights_shadows(data, params.basic.highlights, params.basic.shadows);
        tone::whites_blacks(data, params.basic.whites, params.basic.blacks);

        detail::texture(data, width, height, params.basic.texture)?;
        detail::clarity(data, width, height, params.basic.clarity)?;
        detail::dehaze(data, width, height, params.basic.dehaze)?;

        selective::saturation_vibrance(data, params.basic.saturation, params.basic.vibrance);
        selective::hsl_selective(data, &params.hsl);

        grading::color_grade(data, &params.color_grading);
        grading::calibrate(data, &params.calibration);

        // Belt-and-braces: stages clamp individually, but the output
        // contract is unconditional.
        for v in data.iter_mut() {
            *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        Ok(())
    }
}
