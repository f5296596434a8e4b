//! Mapping from adjustment parameters to the external renderer's
//! INI-style sidecar profile.
//!
//! The external tool's own tone curve is more aggressive than the
//! fallback engine at the same nominal value, so several ranges are
//! compressed on the way out. The constants below are empirically
//! tuned against side-by-side renders; candidates for recalibration
//! against a reference image set.

use std::fmt::Write as _;

use crate::params::model::{AdjustmentParams, NEUTRAL_EPS};

/// External exposure compensation per EV of ours.
const EXPOSURE_SCALE: f32 = 0.8;
/// External contrast is roughly twice as steep: +/-100 maps to +/-50.
const CONTRAST_SCALE: f32 = 0.5;
/// Conservative black-point slope; full-range blacks would clip.
const BLACK_POINT_SLOPE: f32 = 20.0;
/// Kelvin offset per temperature slider unit around daylight.
const TEMP_KELVIN_SLOPE: f32 = 35.0;
const TEMP_KELVIN_BASE: f32 = 6500.0;
/// Green/magenta multiplier slope for tint.
const TINT_GREEN_SLOPE: f32 = 0.3;
/// Saturated colors get a reduced share of vibrance.
const VIBRANCE_SATURATED_SCALE: f32 = 0.75;
/// Clarity to local-contrast amount.
const LOCAL_CONTRAST_SCALE: f32 = 0.5;

/// An ordered INI document: named sections of key/value rows.
/// Sections whose parameters are all neutral are omitted entirely.
#[derive(Clone, Debug, Default)]
pub struct SidecarProfile {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl SidecarProfile {
    pub fn from_params(params: &AdjustmentParams) -> Self {
        let mut profile = Self::default();
        let basic = &params.basic;
        let wb = &params.white_balance;

        profile.section("Version", |s| {
            s.push("AppVersion", "5.8");
            s.push("Version", "346");
        });
        profile.section("General", |s| {
            s.push("Rank", "0");
            s.push("ColorLabel", "0");
            s.push("InTrash", "false");
        });

        let has_exposure = basic.exposure.abs() >= NEUTRAL_EPS
            || basic.contrast.abs() >= NEUTRAL_EPS
            || basic.blacks.abs() >= NEUTRAL_EPS
            || basic.saturation.abs() >= NEUTRAL_EPS;
        if has_exposure {
            profile.section("Exposure", |s| {
                s.push("Auto", "false");
                s.push(
                    "Compensation",
                    format!("{:.3}", basic.exposure * EXPOSURE_SCALE),
                );
                s.push(
                    "Contrast",
                    format!("{}", (basic.contrast * CONTRAST_SCALE).round() as i32),
                );
                s.push(
                    "Black",
                    format!("{}", (-basic.blacks * BLACK_POINT_SLOPE).round() as i32),
                );
                s.push(
                    "Saturation",
                    format!("{}", basic.saturation.round() as i32),
                );
            });
        }

        // Recovery only: the external controls cannot inject light, so
        // each field maps one-directionally.
        let highlight_recovery = (-basic.highlights).clamp(0.0, 100.0);
        let shadow_recovery = basic.shadows.clamp(0.0, 100.0);
        if highlight_recovery >= NEUTRAL_EPS || shadow_recovery >= NEUTRAL_EPS {
            profile.section("Shadows/Highlights", |s| {
                s.push("Enabled", "true");
                s.push("Highlights", format!("{}", highlight_recovery.round() as i32));
                s.push("Shadows", format!("{}", shadow_recovery.round() as i32));
            });
        }

        if !wb.is_neutral() {
            let kelvin =
                (TEMP_KELVIN_BASE + wb.temperature * TEMP_KELVIN_SLOPE).clamp(2000.0, 12000.0);
            let green = (1.0 - wb.tint / 100.0 * TINT_GREEN_SLOPE).clamp(0.1, 10.0);
            profile.section("White Balance", |s| {
                s.push("Enabled", "true");
                s.push("Setting", "Custom");
                s.push("Temperature", format!("{}", kelvin.round() as i32));
                s.push("Green", format!("{:.3}", green));
            });
        }

        if basic.vibrance.abs() >= NEUTRAL_EPS {
            profile.section("Vibrance", |s| {
                s.push("Enabled", "true");
                s.push("Pastels", format!("{}", basic.vibrance.round() as i32));
                s.push(
                    "Saturated",
                    format!(
                        "{}",
                        (basic.vibrance * VIBRANCE_SATURATED_SCALE).round() as i32
                    ),
                );
            });
        }

        if basic.dehaze >= NEUTRAL_EPS {
            profile.section("Haze Removal", |s| {
                s.push("Enabled", "true");
                s.push("Strength", format!("{}", basic.dehaze.round() as i32));
            });
        }

        if basic.clarity.abs() >= NEUTRAL_EPS {
            profile.section("Local Contrast", |s| {
                s.push("Enabled", "true");
                s.push(
                    "Amount",
                    format!("{:.3}", basic.clarity / 100.0 * LOCAL_CONTRAST_SCALE),
                );
                s.push("Radius", "80");
            });
        }

        profile
    }

    /// Ask the external renderer to resize to a target long-edge width.
    pub fn with_resize(mut self, width: u32) -> Self {
        self.section("Resize", |s| {
            s.push("Enabled", "true");
            s.push("AppliesTo", "Full image");
            s.push("Method", "Lanczos");
            s.push("Width", format!("{width}"));
        });
        self
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn section(&mut self, name: &str, fill: impl FnOnce(&mut SectionRows)) {
        let mut rows = SectionRows(Vec::new());
        fill(&mut rows);
        self.sections.push((name.to_string(), rows.0));
    }

    /// Serialize to the INI document the external renderer consumes.
    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        for (name, rows) in &self.sections {
            let _ = writeln!(out, "[{name}]");
            for (key, value) in rows {
                let _ = writeln!(out, "{key}={value}");
            }
            out.push('\n');
        }
        out
    }
}

struct SectionRows(Vec<(String, String)>);

impl SectionRows {
    fn push(&mut self, key: &str, value: impl Into<String>) {
        self.0.push((key.to_string(), value.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_params_emit_only_header_sections() {
        let profile = SidecarProfile::from_params(&AdjustmentParams::default());
        assert_eq!(profile.section_names(), vec!["Version", "General"]);
    }

    #[test]
    fn exposure_is_compressed_for_the_external_curve() {
        let mut params = AdjustmentParams::default();
        params.basic.exposure = 1.0;
        params.basic.contrast = 100.0;
        let ini = SidecarProfile::from_params(&params).to_ini();
        assert!(ini.contains("[Exposure]"));
        assert!(ini.contains("Compensation=0.800"));
        assert!(ini.contains("Contrast=50"));
    }

    #[test]
    fn highlights_map_one_directionally() {
        let mut params = AdjustmentParams::default();
        params.basic.highlights = -40.0;
        params.basic.shadows = -30.0;
        let ini = SidecarProfile::from_params(&params).to_ini();
        // Highlight recovery is requested; negative shadows (darken)
        // have no external counterpart and stay at zero.
        assert!(ini.contains("Highlights=40"));
        assert!(ini.contains("Shadows=0"));
    }

    #[test]
    fn positive_highlights_do_not_enable_recovery() {
        let mut params = AdjustmentParams::default();
        params.basic.highlights = 40.0;
        let profile = SidecarProfile::from_params(&params);
        assert!(!profile.section_names().contains(&"Shadows/Highlights"));
    }

    #[test]
    fn warm_temperature_raises_kelvin() {
        let mut params = AdjustmentParams::default();
        params.white_balance.temperature = 100.0;
        let ini = SidecarProfile::from_params(&params).to_ini();
        assert!(ini.contains("Temperature=10000"));
        assert!(ini.contains("Setting=Custom"));
    }

    #[test]
    fn negative_dehaze_has_no_external_counterpart() {
        let mut params = AdjustmentParams::default();
        params.basic.dehaze = -50.0;
        let profile = SidecarProfile::from_params(&params);
        assert!(!profile.section_names().contains(&"Haze Removal"));
    }

    #[test]
    fn resize_section_appends() {
        let profile =
            SidecarProfile::from_params(&AdjustmentParams::default()).with_resize(1920);
        let ini = profile.to_ini();
        assert!(ini.contains("[Resize]"));
        assert!(ini.contains("Width=1920"));
    }

    #[test]
    fn blacks_use_a_conservative_black_point() {
        let mut params = AdjustmentParams::default();
        params.basic.blacks = -50.0;
        let ini = SidecarProfile::from_params(&params).to_ini();
        assert!(ini.contains("Black=1000"));
    }
}
