//! Detail stages: texture, clarity (both unsharp masks) and the
//! dark-channel-prior dehaze.

use crate::engine::blur::box_blur_rgb;
use crate::engine::color::{hsv_to_rgb, luma, rgb_to_hsv};
use crate::foundation::error::TonecraftResult;
use crate::params::model::NEUTRAL_EPS;

const TEXTURE_RADIUS: u32 = 1;
const TEXTURE_SLOPE: f32 = 0.5;
const CLARITY_SLOPE: f32 = 0.8;

/// Fine-radius local contrast. Same mechanism as clarity, smaller
/// footprint.
pub fn texture(
    data: &mut [f32],
    width: u32,
    height: u32,
    amount: f32,
) -> TonecraftResult<()> {
    unsharp(data, width, height, TEXTURE_RADIUS, amount / 100.0 * TEXTURE_SLOPE)
}

/// Clarity: blur the image, subtract the blur to get the high-frequency
/// residual, add a scaled copy of the residual back.
pub fn clarity(
    data: &mut [f32],
    width: u32,
    height: u32,
    amount: f32,
) -> TonecraftResult<()> {
    let radius = (width.min(height) / 100).clamp(2, 16);
    unsharp(data, width, height, radius, amount / 100.0 * CLARITY_SLOPE)
}

fn unsharp(
    data: &mut [f32],
    width: u32,
    height: u32,
    radius: u32,
    gain: f32,
) -> TonecraftResult<()> {
    if gain.abs() < NEUTRAL_EPS / 100.0 {
        return Ok(());
    }
    let blurred = box_blur_rgb(data, width, height, radius)?;
    for (v, b) in data.iter_mut().zip(blurred.iter()) {
        *v = (*v + gain * (*v - b)).clamp(0.0, 1.0);
    }
    Ok(())
}

/// Fraction of haze removed at full strength.
const DEHAZE_OMEGA: f32 = 0.95;
/// Transmission floor; keeps the haze-model inversion away from a
/// divide-by-near-zero.
const DEHAZE_T_MIN: f32 = 0.1;
/// Atmospheric light is clamped into this range for the same reason.
const DEHAZE_ATMO_MIN: f32 = 0.5;
const DEHAZE_ATMO_MAX: f32 = 0.95;
/// Dehazing desaturates; this compensates afterward.
const DEHAZE_SAT_BOOST: f32 = 0.2;
/// Synthetic haze color and blend slope for negative amounts.
const HAZE_VALUE: f32 = 0.9;
const HAZE_BLEND: f32 = 0.3;

/// Simplified dark-channel-prior dehaze.
///
/// Positive amounts estimate the per-pixel dark channel, pick
/// atmospheric light from the brightest dark-channel pixels, bound the
/// transmission map away from zero and invert the haze model
/// `scene = (observed - atmosphere*(1-t)) / t`, then re-saturate.
/// Negative amounts blend toward a bright haze color instead, lowering
/// contrast and lifting blacks.
pub fn dehaze(
    data: &mut [f32],
    width: u32,
    height: u32,
    amount: f32,
) -> TonecraftResult<()> {
    let s = amount / 100.0;
    if s.abs() < NEUTRAL_EPS / 100.0 {
        return Ok(());
    }

    if s < 0.0 {
        let k = -s * HAZE_BLEND;
        for v in data.iter_mut() {
            *v = (*v * (1.0 - k) + HAZE_VALUE * k).clamp(0.0, 1.0);
        }
        return Ok(());
    }

    let dark: Vec<f32> = data
        .chunks_exact(3)
        .map(|px| px[0].min(px[1]).min(px[2]))
        .collect();

    let atmosphere = estimate_atmospheric_light(data, &dark);

    // Smooth the transmission estimate so halos around hard edges stay
    // subdued.
    let omega = DEHAZE_OMEGA * s;
    let mut transmission: Vec<f32> = Vec::with_capacity(dark.len() * 3);
    for &d in &dark {
        let t = (1.0 - omega * d / atmosphere).max(DEHAZE_T_MIN);
        transmission.extend_from_slice(&[t, t, t]);
    }
    let transmission = box_blur_rgb(&transmission, width, height, 2)?;

    let sat_factor = 1.0 + DEHAZE_SAT_BOOST * s;
    for (px, t) in data.chunks_exact_mut(3).zip(transmission.chunks_exact(3)) {
        let t = t[0];
        for v in px.iter_mut() {
            *v = ((*v - atmosphere * (1.0 - t)) / t).clamp(0.0, 1.0);
        }
        let mut hsv = rgb_to_hsv(px[0], px[1], px[2]);
        hsv.s = (hsv.s * sat_factor).clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(hsv);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
    Ok(())
}

/// Mean luminance of the brightest ~0.1% of dark-channel pixels,
/// clamped into a safe range.
fn estimate_atmospheric_light(data: &[f32], dark: &[f32]) -> f32 {
    let n = dark.len();
    if n == 0 {
        return DEHAZE_ATMO_MAX;
    }
    let take = (n / 1000).max(1);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| dark[b].partial_cmp(&dark[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut acc = 0.0f32;
    for &i in order.iter().take(take) {
        let px = &data[i * 3..i * 3 + 3];
        acc += luma(px[0], px[1], px[2]);
    }
    (acc / take as f32).clamp(DEHAZE_ATMO_MIN, DEHAZE_ATMO_MAX)
}
