//! Color space conversions used by the pixel stages.

/// HSL color: hue in 0..360 degrees, saturation and lightness in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

/// Rec. 601 luma of a clamped RGB pixel.
#[inline]
pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Distance between two hues in degrees, handling wrap-around.
#[inline]
pub fn hue_distance(h1: f32, h2: f32) -> f32 {
    let diff = (h1 - h2).abs() % 360.0;
    diff.min(360.0 - diff)
}

#[inline]
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> Hsl {
    let r = r.clamp(0.0, 1.0);
    let g = g.clamp(0.0, 1.0);
    let b = b.clamp(0.0, 1.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let l = (max + min) / 2.0;

    if delta < 1e-6 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let s = if l < 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / delta;
        if g < b {
            h += 6.0;
        }
        h * 60.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / delta + 2.0) * 60.0
    } else {
        ((r - g) / delta + 4.0) * 60.0
    };

    Hsl { h: h % 360.0, s, l }
}

#[inline]
pub fn hsl_to_rgb(hsl: Hsl) -> (f32, f32, f32) {
    let Hsl { h, s, l } = hsl;
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s < 1e-6 {
        return (l, l, l);
    }

    let h = h.rem_euclid(360.0);

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let h_norm = h / 360.0;

    let r = hue_to_rgb(p, q, h_norm + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h_norm);
    let b = hue_to_rgb(p, q, h_norm - 1.0 / 3.0);

    (r, g, b)
}

#[inline]
fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }

    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// HSV color: hue in 0..360 degrees, saturation and value in 0..1.
/// Saturation and vibrance operate here rather than in HSL because the
/// inverse-saturation weighting reads more naturally against V.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

#[inline]
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> Hsv {
    let r = r.clamp(0.0, 1.0);
    let g = g.clamp(0.0, 1.0);
    let b = b.clamp(0.0, 1.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    if delta < 1e-6 {
        return Hsv { h: 0.0, s: 0.0, v };
    }
    let s = if max > 1e-6 { delta / max } else { 0.0 };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / delta;
        if g < b {
            h += 6.0;
        }
        h * 60.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / delta + 2.0) * 60.0
    } else {
        ((r - g) / delta + 4.0) * 60.0
    };

    Hsv { h: h % 360.0, s, v }
}

#[inline]
pub fn hsv_to_rgb(hsv: Hsv) -> (f32, f32, f32) {
    let Hsv { h, s, v } = hsv;
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);

    if s < 1e-6 {
        return (v, v, v);
    }

    let h = h.rem_euclid(360.0) / 60.0;
    let i = h.floor();
    let f = h - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn primaries_map_to_expected_hues() {
        assert_close(rgb_to_hsl(1.0, 0.0, 0.0).h, 0.0);
        assert_close(rgb_to_hsl(0.0, 1.0, 0.0).h, 120.0);
        assert_close(rgb_to_hsl(0.0, 0.0, 1.0).h, 240.0);
        assert_close(rgb_to_hsv(0.0, 1.0, 0.0).h, 120.0);
    }

    #[test]
    fn hsl_roundtrip_preserves_color() {
        for &(r, g, b) in &[(0.8, 0.2, 0.1), (0.1, 0.9, 0.5), (0.3, 0.3, 0.7)] {
            let (r2, g2, b2) = hsl_to_rgb(rgb_to_hsl(r, g, b));
            assert_close(r, r2);
            assert_close(g, g2);
            assert_close(b, b2);
        }
    }

    #[test]
    fn hsv_roundtrip_preserves_color() {
        for &(r, g, b) in &[(0.8, 0.2, 0.1), (0.1, 0.9, 0.5), (0.3, 0.3, 0.7)] {
            let (r2, g2, b2) = hsv_to_rgb(rgb_to_hsv(r, g, b));
            assert_close(r, r2);
            assert_close(g, g2);
            assert_close(b, b2);
        }
    }

    #[test]
    fn achromatic_pixels_have_zero_saturation() {
        let hsl = rgb_to_hsl(0.5, 0.5, 0.5);
        assert_eq!(hsl.s, 0.0);
        assert_close(hsl.l, 0.5);
    }

    #[test]
    fn hue_distance_wraps() {
        assert_close(hue_distance(350.0, 10.0), 20.0);
        assert_close(hue_distance(0.0, 180.0), 180.0);
    }
}
