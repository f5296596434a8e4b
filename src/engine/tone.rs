//! Tonal stages: white balance, exposure, contrast, highlight/shadow
//! recovery, whites and blacks.
//!
//! Every stage clamps its own output to 0..1 before returning and
//! skips entirely when its parameters are neutral.

use crate::engine::color::luma;
use crate::params::model::{NEUTRAL_EPS, WhiteBalance};

const TEMP_SLOPE: f32 = 0.12;
const TEMP_GREEN_SLOPE: f32 = 0.05;
const TINT_GREEN_SLOPE: f32 = 0.10;
const TINT_RB_SLOPE: f32 = 0.05;

/// Temperature scales R and B oppositely; cooling also pulls G down a
/// little so the cast reads cyan rather than pure blue. Tint scales G
/// against R+B (positive = magenta).
pub fn white_balance(data: &mut [f32], wb: &WhiteBalance) {
    if wb.is_neutral() {
        return;
    }

    let t = wb.temperature / 100.0;
    let p = wb.tint / 100.0;

    let (r_scale, g_scale, b_scale) = if t >= 0.0 {
        (1.0 + TEMP_SLOPE * t, 1.0, 1.0 - TEMP_SLOPE * t)
    } else {
        let c = -t;
        (
            1.0 - TEMP_SLOPE * c,
            1.0 - TEMP_GREEN_SLOPE * c,
            1.0 + TEMP_SLOPE * c,
        )
    };

    let r_scale = r_scale * (1.0 + TINT_RB_SLOPE * p);
    let g_scale = g_scale * (1.0 - TINT_GREEN_SLOPE * p);
    let b_scale = b_scale * (1.0 + TINT_RB_SLOPE * p);

    for px in data.chunks_exact_mut(3) {
        px[0] = (px[0] * r_scale).clamp(0.0, 1.0);
        px[1] = (px[1] * g_scale).clamp(0.0, 1.0);
        px[2] = (px[2] * b_scale).clamp(0.0, 1.0);
    }
}

/// Multiplicative exposure: doubling per stop.
pub fn exposure(data: &mut [f32], ev: f32) {
    if ev.abs() < NEUTRAL_EPS {
        return;
    }
    let factor = 2.0f32.powf(ev);
    for v in data.iter_mut() {
        *v = (*v * factor).clamp(0.0, 1.0);
    }
}

const CONTRAST_SHADOW_GAMMA: f32 = 0.8;
const CONTRAST_HIGHLIGHT_GAMMA: f32 = 0.6;

/// S-curve contrast: values below the 0.5 midpoint move through one
/// gamma exponent and values above through a second, so shadow and
/// highlight compression are tuned independently.
pub fn contrast(data: &mut [f32], amount: f32) {
    if amount.abs() < NEUTRAL_EPS {
        return;
    }
    let s = amount / 100.0;
    let g_lo = (1.0 + CONTRAST_SHADOW_GAMMA * s).max(0.1);
    let g_hi = (1.0 + CONTRAST_HIGHLIGHT_GAMMA * s).max(0.1);

    for v in data.iter_mut() {
        let x = v.clamp(0.0, 1.0);
        *v = if x <= 0.5 {
            0.5 * (2.0 * x).powf(g_lo)
        } else {
            1.0 - 0.5 * (2.0 * (1.0 - x)).powf(g_hi)
        }
        .clamp(0.0, 1.0);
    }
}

const HIGHLIGHT_SLOPE: f32 = 0.5;
const SHADOW_SLOPE: f32 = 0.35;

/// Highlight recovery scales only luminance-bright pixels; shadow lift
/// raises only dark pixels. Both masks rise smoothly toward the
/// extreme, so midtones stay put.
pub fn highlights_shadows(data: &mut [f32], highlights: f32, shadows: f32) {
    let h = highlights / 100.0;
    let s = shadows / 100.0;
    if h.abs() < NEUTRAL_EPS / 100.0 && s.abs() < NEUTRAL_EPS / 100.0 {
        return;
    }

    for px in data.chunks_exact_mut(3) {
        let lum = luma(px[0], px[1], px[2]);

        let th = ((lum - 0.5) / 0.5).clamp(0.0, 1.0);
        let highlight_mask = th * th;

        let ts = ((0.5 - lum) / 0.5).clamp(0.0, 1.0);
        let shadow_mask = ts * ts;

        let scale = 1.0 + h * HIGHLIGHT_SLOPE * highlight_mask;
        for v in px.iter_mut() {
            let lifted = *v * scale + s * SHADOW_SLOPE * shadow_mask * (1.0 - *v);
            *v = lifted.clamp(0.0, 1.0);
        }
    }
}

const WHITES_SLOPE: f32 = 0.25;
const BLACKS_OFFSET: f32 = 0.12;

/// Whites: a small linear scale restricted to a highlight-weighted
/// mask. Blacks: a direct luminance offset (positive = faded black,
/// negative = deeper black), then a hard clamp.
pub fn whites_blacks(data: &mut [f32], whites: f32, blacks: f32) {
    let w = whites / 100.0;
    let b = blacks / 100.0;
    if w.abs() < NEUTRAL_EPS / 100.0 && b.abs() < NEUTRAL_EPS / 100.0 {
        return;
    }
    let offset = b * BLACKS_OFFSET;

    for px in data.chunks_exact_mut(3) {
        let lum = luma(px[0], px[1], px[2]);
        let t = ((lum - 0.7) / 0.3).clamp(0.0, 1.0);
        let white_mask = t * t;
        let scale = 1.0 + w * WHITES_SLOPE * white_mask;

        for v in px.iter_mut() {
            *v = (*v * scale + offset).clamp(0.0, 1.0);
        }
    }
}
