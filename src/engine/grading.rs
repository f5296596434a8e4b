//! Color grading (split toning) and camera-primary calibration.

use crate::engine::color::{Hsl, hsl_to_rgb, hue_distance, luma, rgb_to_hsl};
use crate::params::model::{Calibration, ColorGrading, GradingZone, NEUTRAL_EPS};

/// How strongly a zone tint at saturation 100 pulls toward the
/// soft-light result.
const GRADE_STRENGTH: f32 = 0.5;
/// Brightness offset per 100 units of zone luminance.
const GRADE_LUM_SLOPE: f32 = 0.2;
/// How far balance at +/-100 moves the shadow/highlight pivot.
const BALANCE_PIVOT_RANGE: f32 = 0.25;

/// Soft-light blend: darkens where the overlay is below the midpoint
/// and lightens above it, preserving base luminance far better than
/// alpha blending. W3C compositing formula.
fn soft_light(base: f32, overlay: f32) -> f32 {
    if overlay <= 0.5 {
        base - (1.0 - 2.0 * overlay) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * overlay - 1.0) * (d - base)
    }
}

/// Split toning: shadow/midtone/highlight soft masks each receive a
/// hue+saturation tint via soft-light, plus a brightness offset inside
/// the mask. Balance shifts the shadow-to-highlight pivot.
pub fn color_grade(data: &mut [f32], grading: &ColorGrading) {
    if grading.is_neutral() {
        return;
    }

    let pivot = 0.5 - grading.balance / 100.0 * BALANCE_PIVOT_RANGE;
    let zones = [
        (&grading.shadows, ZoneMask::Shadows),
        (&grading.midtones, ZoneMask::Midtones),
        (&grading.highlights, ZoneMask::Highlights),
    ];

    let tints: Vec<(GradingZone, ZoneMask, [f32; 3])> = zones
        .iter()
        .filter(|(zone, _)| !zone.is_neutral())
        .map(|&(zone, mask)| {
            let (r, g, b) = hsl_to_rgb(Hsl {
                h: zone.hue,
                s: 1.0,
                l: 0.5,
            });
            (*zone, mask, [r, g, b])
        })
        .collect();

    for px in data.chunks_exact_mut(3) {
        let lum = luma(px[0], px[1], px[2]);
        // Remap luminance so the pivot sits at 0.5 of the mask ramp.
        let l = (lum / (2.0 * pivot).max(1e-3)).clamp(0.0, 1.0);

        for (zone, mask, tint) in &tints {
            let w = mask.weight(l);
            if w < 1e-4 {
                continue;
            }
            let amount = w * zone.saturation / 100.0 * GRADE_STRENGTH;
            let lift = w * zone.luminance / 100.0 * GRADE_LUM_SLOPE;
            for (v, t) in px.iter_mut().zip(tint.iter()) {
                let toned = soft_light(v.clamp(0.0, 1.0), *t);
                *v = (*v + amount * (toned - *v) + lift).clamp(0.0, 1.0);
            }
        }
    }
}

#[derive(Clone, Copy)]
enum ZoneMask {
    Shadows,
    Midtones,
    Highlights,
}

impl ZoneMask {
    /// Soft weight over remapped luminance. The three weights sum to
    /// at most 1 and cross smoothly.
    fn weight(self, l: f32) -> f32 {
        let ws = (1.0 - l) * (1.0 - l);
        let wh = l * l;
        match self {
            Self::Shadows => ws,
            Self::Highlights => wh,
            Self::Midtones => (1.0 - ws - wh).max(0.0),
        }
    }
}

/// Degrees of hue shift per 100 units of a primary's hue offset.
const PRIMARY_HUE_SLOPE: f32 = 0.3;
/// Half-width of each primary's hue-region mask in degrees.
const PRIMARY_MASK_WIDTH: f32 = 90.0;
/// Green-channel offset per 100 units of shadow tint.
const SHADOW_TINT_SLOPE: f32 = 0.04;

const PRIMARY_HUES: [f32; 3] = [0.0, 120.0, 240.0];

/// Camera calibration: shifts each color-filter-array primary's
/// hue/saturation within a mask keyed to the primary's hue region,
/// plus a green-magenta tint in the shadows. Runs last because it
/// changes the base RGB-to-hue mapping everything else built on.
pub fn calibrate(data: &mut [f32], calibration: &Calibration) {
    if calibration.is_neutral() {
        return;
    }

    let primaries = [
        &calibration.red_primary,
        &calibration.green_primary,
        &calibration.blue_primary,
    ];
    let tint = calibration.shadows_tint / 100.0;

    for px in data.chunks_exact_mut(3) {
        let hsl = rgb_to_hsl(px[0], px[1], px[2]);

        if hsl.s >= 0.01 {
            let mut hue_shift = 0.0f32;
            let mut sat_scale = 1.0f32;
            for (primary, &center) in primaries.iter().zip(PRIMARY_HUES.iter()) {
                if primary.is_neutral() {
                    continue;
                }
                let d = hue_distance(hsl.h, center);
                let w = (1.0 - d / PRIMARY_MASK_WIDTH).clamp(0.0, 1.0);
                // Smooth the mask edge.
                let w = w * w * (3.0 - 2.0 * w);
                hue_shift += primary.hue * PRIMARY_HUE_SLOPE * w;
                sat_scale *= 1.0 + primary.saturation / 100.0 * w;
            }

            let new_hsl = Hsl {
                h: (hsl.h + hue_shift).rem_euclid(360.0),
                s: (hsl.s * sat_scale).clamp(0.0, 1.0),
                l: hsl.l,
            };
            let (r, g, b) = hsl_to_rgb(new_hsl);
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }

        if tint.abs() >= NEUTRAL_EPS / 100.0 {
            let lum = luma(px[0], px[1], px[2]);
            let w = (1.0 - lum) * (1.0 - lum);
            px[1] = (px[1] + tint * SHADOW_TINT_SLOPE * w).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::model::PrimaryShift;

    #[test]
    fn soft_light_extremes_behave() {
        // Neutral overlay is the identity.
        assert!((soft_light(0.3, 0.5) - 0.3).abs() < 1e-6);
        // Dark overlay darkens, bright overlay lightens.
        assert!(soft_light(0.5, 0.2) < 0.5);
        assert!(soft_light(0.5, 0.8) > 0.5);
        // Output stays in range at the corners.
        for &b in &[0.0, 0.1, 0.5, 0.9, 1.0] {
            for &o in &[0.0, 0.5, 1.0] {
                let v = soft_light(b, o);
                assert!((-1e-6..=1.0 + 1e-6).contains(&v));
            }
        }
    }

    #[test]
    fn zero_saturation_zone_with_lift_only_brightens() {
        let mut grading = ColorGrading::default();
        grading.shadows.luminance = 50.0;

        let mut data = vec![0.1, 0.1, 0.1];
        color_grade(&mut data, &grading);
        assert!(data[0] > 0.1);
        // Achromatic input stays achromatic without a tint.
        assert!((data[0] - data[1]).abs() < 1e-6);
        assert!((data[1] - data[2]).abs() < 1e-6);
    }

    #[test]
    fn shadow_tint_affects_shadows_not_highlights() {
        let mut grading = ColorGrading::default();
        grading.shadows.hue = 200.0;
        grading.shadows.saturation = 80.0;

        let mut data = vec![0.1, 0.1, 0.1, 0.95, 0.95, 0.95];
        color_grade(&mut data, &grading);

        let shadow_spread = (data[2] - data[0]).abs();
        let highlight_spread = (data[5] - data[3]).abs();
        assert!(shadow_spread > highlight_spread);
        assert!(shadow_spread > 1e-3);
    }

    #[test]
    fn balance_shifts_zone_boundaries() {
        let mut grading = ColorGrading::default();
        grading.highlights.hue = 50.0;
        grading.highlights.saturation = 100.0;

        let mid = vec![0.5f32, 0.5, 0.5];

        let mut neutral_balance = mid.clone();
        color_grade(&mut neutral_balance, &grading);

        grading.balance = 100.0;
        let mut highlight_favored = mid.clone();
        color_grade(&mut highlight_favored, &grading);

        // With balance pushed toward highlights, a midtone pixel picks
        // up more of the highlight tint.
        let delta_neutral = (neutral_balance[0] - 0.5).abs() + (neutral_balance[2] - 0.5).abs();
        let delta_shifted =
            (highlight_favored[0] - 0.5).abs() + (highlight_favored[2] - 0.5).abs();
        assert!(delta_shifted > delta_neutral);
    }

    #[test]
    fn red_primary_shift_moves_red_not_blue() {
        let calibration = Calibration {
            red_primary: PrimaryShift {
                hue: 60.0,
                saturation: 0.0,
            },
            ..Calibration::default()
        };

        let mut data = vec![0.9, 0.1, 0.1, 0.1, 0.1, 0.9];
        let blue_before = rgb_to_hsl(data[3], data[4], data[5]).h;
        calibrate(&mut data, &calibration);

        let red_after = rgb_to_hsl(data[0], data[1], data[2]).h;
        let blue_after = rgb_to_hsl(data[3], data[4], data[5]).h;
        assert!(red_after > 10.0, "red hue should rotate, got {red_after}");
        assert!((blue_after - blue_before).abs() < 1e-3);
    }

    #[test]
    fn shadow_tint_shifts_green_in_darks() {
        let calibration = Calibration {
            shadows_tint: 100.0,
            ..Calibration::default()
        };
        let mut data = vec![0.1, 0.1, 0.1, 0.9, 0.9, 0.9];
        calibrate(&mut data, &calibration);
        assert!(data[1] > 0.1);
        // Near-white pixels barely move.
        assert!((data[4] - 0.9).abs() < 0.005);
    }
}
