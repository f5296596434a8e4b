//! The adjustment parameter record: the complete description of a grade.
//!
//! Every numeric leaf accepts a bare number or a "+N"/"-N" string (see
//! [`crate::params::parse`]). [`AdjustmentParams::sanitize`] clamps every
//! field into its documented range once at ingestion, so the engine and
//! sidecar mapping operate on strict, ranged values.

use serde::{Deserialize, Serialize};

use crate::params::parse;

/// Tolerance below which an adjustment is treated as neutral.
pub const NEUTRAL_EPS: f32 = 1e-3;

fn clamp_field(v: &mut f32, lo: f32, hi: f32) {
    *v = if v.is_finite() { v.clamp(lo, hi) } else { 0.0 };
}

/// Basic tone panel. Exposure is in EV; every other field is a
/// -100..=100 slider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicPanel {
    #[serde(deserialize_with = "parse::signed")]
    pub exposure: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub contrast: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub highlights: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub shadows: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub whites: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub blacks: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub texture: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub clarity: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub dehaze: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub vibrance: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub saturation: f32,
}

impl BasicPanel {
    pub fn sanitize(&mut self) {
        clamp_field(&mut self.exposure, -5.0, 5.0);
        for v in [
            &mut self.contrast,
            &mut self.highlights,
            &mut self.shadows,
            &mut self.whites,
            &mut self.blacks,
            &mut self.texture,
            &mut self.clarity,
            &mut self.dehaze,
            &mut self.vibrance,
            &mut self.saturation,
        ] {
            clamp_field(v, -100.0, 100.0);
        }
    }
}

/// White balance offsets, -100..=100 each. Positive temperature warms,
/// positive tint shifts toward magenta.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteBalance {
    #[serde(alias = "temp", deserialize_with = "parse::signed")]
    pub temperature: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub tint: f32,
}

impl WhiteBalance {
    pub fn sanitize(&mut self) {
        clamp_field(&mut self.temperature, -100.0, 100.0);
        clamp_field(&mut self.tint, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.temperature.abs() < NEUTRAL_EPS && self.tint.abs() < NEUTRAL_EPS
    }
}

/// Hue/saturation/luminance deltas for one hue band, -100..=100 each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HslBand {
    #[serde(deserialize_with = "parse::signed")]
    pub hue: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub saturation: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub luminance: f32,
}

impl HslBand {
    pub fn sanitize(&mut self) {
        clamp_field(&mut self.hue, -100.0, 100.0);
        clamp_field(&mut self.saturation, -100.0, 100.0);
        clamp_field(&mut self.luminance, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.hue.abs() < NEUTRAL_EPS
            && self.saturation.abs() < NEUTRAL_EPS
            && self.luminance.abs() < NEUTRAL_EPS
    }
}

/// Selective color: the 8 canonical hue bands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HslPanel {
    pub red: HslBand,
    pub orange: HslBand,
    pub yellow: HslBand,
    pub green: HslBand,
    pub aqua: HslBand,
    pub blue: HslBand,
    pub purple: HslBand,
    pub magenta: HslBand,
}

impl HslPanel {
    /// Bands in canonical order: R, O, Y, G, A, B, P, M.
    pub fn bands(&self) -> [&HslBand; 8] {
        [
            &self.red,
            &self.orange,
            &self.yellow,
            &self.green,
            &self.aqua,
            &self.blue,
            &self.purple,
            &self.magenta,
        ]
    }

    pub fn sanitize(&mut self) {
        for band in [
            &mut self.red,
            &mut self.orange,
            &mut self.yellow,
            &mut self.green,
            &mut self.aqua,
            &mut self.blue,
            &mut self.purple,
            &mut self.magenta,
        ] {
            band.sanitize();
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.bands().iter().all(|b| b.is_neutral())
    }
}

/// One color grading zone: a tint hue (degrees), its strength, and a
/// brightness offset applied within the zone's luminance mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingZone {
    #[serde(deserialize_with = "parse::signed")]
    pub hue: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub saturation: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub luminance: f32,
}

impl GradingZone {
    pub fn sanitize(&mut self) {
        // Hue is an angle: wrap rather than clamp.
        self.hue = if self.hue.is_finite() {
            self.hue.rem_euclid(360.0)
        } else {
            0.0
        };
        clamp_field(&mut self.saturation, 0.0, 100.0);
        clamp_field(&mut self.luminance, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.saturation.abs() < NEUTRAL_EPS && self.luminance.abs() < NEUTRAL_EPS
    }
}

/// Split-toning wheels for shadows/midtones/highlights plus the
/// shadow-to-highlight balance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorGrading {
    pub shadows: GradingZone,
    pub midtones: GradingZone,
    pub highlights: GradingZone,
    #[serde(deserialize_with = "parse::signed")]
    pub balance: f32,
}

impl ColorGrading {
    pub fn sanitize(&mut self) {
        self.shadows.sanitize();
        self.midtones.sanitize();
        self.highlights.sanitize();
        clamp_field(&mut self.balance, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.shadows.is_neutral() && self.midtones.is_neutral() && self.highlights.is_neutral()
    }
}

/// Hue/saturation offsets for one color-filter-array primary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryShift {
    #[serde(deserialize_with = "parse::signed")]
    pub hue: f32,
    #[serde(deserialize_with = "parse::signed")]
    pub saturation: f32,
}

impl PrimaryShift {
    pub fn sanitize(&mut self) {
        clamp_field(&mut self.hue, -100.0, 100.0);
        clamp_field(&mut self.saturation, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.hue.abs() < NEUTRAL_EPS && self.saturation.abs() < NEUTRAL_EPS
    }
}

/// Camera calibration: remaps how raw RGB lands in perceptual hue.
/// This is the mechanism behind film-emulation and teal-and-orange
/// looks, so it is applied after every other stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    #[serde(alias = "red")]
    pub red_primary: PrimaryShift,
    #[serde(alias = "green")]
    pub green_primary: PrimaryShift,
    #[serde(alias = "blue")]
    pub blue_primary: PrimaryShift,
    #[serde(alias = "shadowsTint", deserialize_with = "parse::signed")]
    pub shadows_tint: f32,
}

impl Calibration {
    pub fn sanitize(&mut self) {
        self.red_primary.sanitize();
        self.green_primary.sanitize();
        self.blue_primary.sanitize();
        clamp_field(&mut self.shadows_tint, -100.0, 100.0);
    }

    pub fn is_neutral(&self) -> bool {
        self.red_primary.is_neutral()
            && self.green_primary.is_neutral()
            && self.blue_primary.is_neutral()
            && self.shadows_tint.abs() < NEUTRAL_EPS
    }
}

/// The complete, versioned description of a color grade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentParams {
    pub basic: BasicPanel,
    #[serde(alias = "whiteBalance")]
    pub white_balance: WhiteBalance,
    pub hsl: HslPanel,
    #[serde(alias = "colorGrading")]
    pub color_grading: ColorGrading,
    pub calibration: Calibration,
}

impl AdjustmentParams {
    /// Parse a loosely-typed JSON record. Never fails: unknown fields
    /// are ignored and bad values resolve to neutral defaults.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut params: Self = serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "malformed adjustment record, using neutral defaults");
            Self::default()
        });
        params.sanitize();
        params
    }

    /// Clamp every field into its documented range and neutralize
    /// non-finite values.
    pub fn sanitize(&mut self) {
        self.basic.sanitize();
        self.white_balance.sanitize();
        self.hsl.sanitize();
        self.color_grading.sanitize();
        self.calibration.sanitize();
    }
}
