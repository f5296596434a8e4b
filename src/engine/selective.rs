//! Saturation/vibrance and the 8-band selective color stage.

use crate::engine::color::{Hsl, hsl_to_rgb, hue_distance, rgb_to_hsl, rgb_to_hsv, hsv_to_rgb};
use crate::params::model::{HslPanel, NEUTRAL_EPS};

/// Uniform saturation scale plus vibrance, which scales in proportion
/// to the inverse of the current saturation so already-vivid colors
/// are protected.
pub fn saturation_vibrance(data: &mut [f32], saturation: f32, vibrance: f32) {
    let sat = saturation / 100.0;
    let vib = vibrance / 100.0;
    if sat.abs() < NEUTRAL_EPS / 100.0 && vib.abs() < NEUTRAL_EPS / 100.0 {
        return;
    }

    for px in data.chunks_exact_mut(3) {
        let mut hsv = rgb_to_hsv(px[0], px[1], px[2]);
        if hsv.s < 1e-6 {
            continue;
        }
        let mut s = hsv.s * (1.0 + sat);
        s *= 1.0 + vib * (1.0 - s.clamp(0.0, 1.0));
        hsv.s = s.clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(hsv);
        px[0] = r.clamp(0.0, 1.0);
        px[1] = g.clamp(0.0, 1.0);
        px[2] = b.clamp(0.0, 1.0);
    }
}

/// Hue centers of the 8 bands, Camera Raw spacing (non-uniform).
/// Order: R, O, Y, G, A, B, P, M.
pub const BAND_CENTERS: [f32; 8] = [0.0, 30.0, 60.0, 120.0, 180.0, 240.0, 285.0, 315.0];

/// Degrees of hue shift per slider unit. Green and blue carry higher
/// coefficients, biasing full-strength shifts toward cyan; that is how
/// a teal look is produced without a literal teal slider.
const HUE_SENSITIVITY: [f32; 8] = [0.30, 0.30, 0.30, 0.45, 0.40, 0.45, 0.30, 0.30];

/// Membership of a hue against the band grid: the two nearest band
/// centers and a blend factor toward the secondary. At a band center
/// the blend is 0; at the boundary it approaches 0.5, so masks stay
/// soft rather than binary.
fn band_weights(hue: f32) -> (usize, usize, f32) {
    let h = hue.rem_euclid(360.0);

    let mut primary = 0usize;
    let mut min_dist = f32::MAX;
    for (i, &center) in BAND_CENTERS.iter().enumerate() {
        let dist = hue_distance(h, center);
        if dist < min_dist {
            min_dist = dist;
            primary = i;
        }
    }

    let mut secondary = (primary + 1) % 8;
    let mut second_dist = f32::MAX;
    for (i, &center) in BAND_CENTERS.iter().enumerate() {
        if i != primary {
            let dist = hue_distance(h, center);
            if dist < second_dist {
                second_dist = dist;
                secondary = i;
            }
        }
    }

    let total = min_dist + second_dist;
    let blend = if total > 0.0 {
        (min_dist / total).clamp(0.0, 0.5)
    } else {
        0.0
    };

    (primary, secondary, blend)
}

/// Selective color: per-band hue/saturation/luminance deltas applied
/// through the soft band membership.
pub fn hsl_selective(data: &mut [f32], panel: &HslPanel) {
    if panel.is_neutral() {
        return;
    }
    let bands = panel.bands();

    for px in data.chunks_exact_mut(3) {
        let hsl = rgb_to_hsl(px[0], px[1], px[2]);

        // Achromatic pixels carry no meaningful hue.
        if hsl.s < 0.01 {
            continue;
        }

        let (p, s, blend) = band_weights(hsl.h);
        let wp = 1.0 - blend;
        let ws = blend;

        let hue_adj =
            bands[p].hue * HUE_SENSITIVITY[p] * wp + bands[s].hue * HUE_SENSITIVITY[s] * ws;
        let sat_adj = bands[p].saturation * wp + bands[s].saturation * ws;
        let lum_adj = bands[p].luminance * wp + bands[s].luminance * ws;

        let new_hsl = Hsl {
            h: (hsl.h + hue_adj).rem_euclid(360.0),
            s: (hsl.s * (1.0 + sat_adj / 100.0)).clamp(0.0, 1.0),
            l: (hsl.l + lum_adj / 200.0).clamp(0.0, 1.0),
        };

        let (r, g, b) = hsl_to_rgb(new_hsl);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}
