//! Heuristic VR format detection from video geometry and filename.
//!
//! Classification only. The crop stage consumes the result to extract a
//! single eye; perceptual unwarping for human viewing is not done here.

/// Projection of a VR clip. `None` means flat 2D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrProjection {
    None,
    Equirect180,
    Equirect360,
    Fisheye190,
    Fisheye200,
}

/// Stereo layout of a VR clip. `None` means 2D or mono VR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrLayout {
    None,
    SideBySide,
    TopBottom,
}

/// Result of VR format classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrFormatInfo {
    pub is_vr: bool,
    pub projection: VrProjection,
    pub layout: VrLayout,
    /// Detection confidence in [0, 1]. Heuristic certainty, not a probability.
    pub confidence: f32,
    /// Auto-detected or user-forced.
    pub user_forced: bool,
}

impl Default for VrFormatInfo {
    fn default() -> Self {
        Self {
            is_vr: false,
            projection: VrProjection::None,
            layout: VrLayout::None,
            confidence: 0.0,
            user_forced: false,
        }
    }
}

/// Filename fragments that mark a clip as VR content.
const VR_KEYWORDS: &[&str] = &[
    "VR",
    "_180",
    "_360",
    "SBS",
    "_TB",
    "FISHEYE",
    "EQUIRECTANGULAR",
    "LR_",
    "OCULUS",
    "_3DH",
    "MKX200",
];

/// Classify a clip from its pixel dimensions and filename.
///
/// Total and deterministic: identical inputs always yield identical results,
/// and unclassifiable input yields a confidence-zero non-VR result rather
/// than an error.
pub fn detect_format(width: u32, height: u32, filename: &str) -> VrFormatInfo {
    let mut info = VrFormatInfo::default();

    let aspect = aspect_ratio(width, height);
    let is_sbs = is_sbs_aspect(aspect);
    let is_tb = is_tb_aspect(aspect);

    // VR sources are typically >2048 on their long edge
    let is_high_res = width.max(height) >= 2048;

    let upper = filename.to_uppercase();
    let has_keyword = VR_KEYWORDS.iter().any(|kw| upper.contains(kw));
    let filename_projection = projection_from_filename(&upper);
    let filename_layout = layout_from_filename(&upper);

    if (is_sbs || is_tb) && is_high_res {
        info.is_vr = true;
        info.confidence = 0.9;
    } else if has_keyword {
        info.is_vr = true;
        info.confidence = 0.7;
    } else {
        return info;
    }

    // Explicit filename token beats the aspect-derived layout
    info.layout = if filename_layout != VrLayout::None {
        filename_layout
    } else if is_sbs {
        VrLayout::SideBySide
    } else if is_tb {
        VrLayout::TopBottom
    } else {
        VrLayout::None // mono
    };

    info.projection = if filename_projection != VrProjection::None {
        filename_projection
    } else {
        // Equirectangular 180° is the most common VR delivery format
        VrProjection::Equirect180
    };

    info
}

/// Whether resolution and aspect alone suggest VR content.
pub fn is_likely_vr(width: u32, height: u32) -> bool {
    let aspect = aspect_ratio(width, height);
    let is_high_res = width.max(height) >= 2048;
    (is_sbs_aspect(aspect) || is_tb_aspect(aspect)) && is_high_res
}

/// Width/height ratio; 0 when height is 0.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        return 0.0;
    }
    width as f32 / height as f32
}

// Side-by-side: ~2:1 ratio
fn is_sbs_aspect(aspect: f32) -> bool {
    (1.8..=2.2).contains(&aspect)
}

// Top-bottom: ~1:2 ratio
fn is_tb_aspect(aspect: f32) -> bool {
    (0.45..=0.55).contains(&aspect)
}

fn projection_from_filename(upper: &str) -> VrProjection {
    if upper.contains("FISHEYE") {
        if upper.contains("200") {
            return VrProjection::Fisheye200;
        }
        return VrProjection::Fisheye190;
    }

    if upper.contains("EQUIRECT") || upper.contains("360") {
        return VrProjection::Equirect360;
    }

    if upper.contains("180") {
        return VrProjection::Equirect180;
    }

    VrProjection::None
}

fn layout_from_filename(upper: &str) -> VrLayout {
    if upper.contains("SBS") || upper.contains("LR_") || upper.contains("_LR") {
        return VrLayout::SideBySide;
    }

    if upper.contains("_TB") || upper.contains("TB_") {
        return VrLayout::TopBottom;
    }

    VrLayout::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_res_sbs_aspect_detects_vr() {
        let info = detect_format(3840, 1920, "clip.mp4");
        assert!(info.is_vr);
        assert_eq!(info.confidence, 0.9);
        assert_eq!(info.layout, VrLayout::SideBySide);
        // No projection token, defaults to equirect 180
        assert_eq!(info.projection, VrProjection::Equirect180);
    }

    #[test]
    fn sbs_180_filename_scenario() {
        let info = detect_format(3840, 1920, "scene_180_SBS.mp4");
        assert!(info.is_vr);
        assert_eq!(info.layout, VrLayout::SideBySide);
        assert_eq!(info.projection, VrProjection::Equirect180);
        assert_eq!(info.confidence, 0.9);
    }

    #[test]
    fn flat_1080p_is_not_vr() {
        let info = detect_format(1920, 1080, "clip.mp4");
        assert!(!info.is_vr);
        assert_eq!(info.confidence, 0.0);
        assert_eq!(info.layout, VrLayout::None);
        assert_eq!(info.projection, VrProjection::None);
    }

    #[test]
    fn keyword_only_detects_with_lower_confidence() {
        // TB aspect but below the resolution bar; keyword carries it
        let info = detect_format(1920, 960, "holiday_VR_thing_TB.mp4");
        assert!(info.is_vr);
        assert_eq!(info.confidence, 0.7);
        assert_eq!(info.layout, VrLayout::TopBottom);
    }

    #[test]
    fn filename_layout_token_overrides_aspect() {
        // SBS aspect, but the filename says top-bottom
        let info = detect_format(4096, 2048, "scene_TB_8k.mp4");
        assert!(info.is_vr);
        assert_eq!(info.layout, VrLayout::TopBottom);
    }

    #[test]
    fn fisheye200_projection_token() {
        let info = detect_format(1920, 1080, "dive_VR_FISHEYE200.mp4");
        assert!(info.is_vr);
        assert_eq!(info.projection, VrProjection::Fisheye200);
    }

    #[test]
    fn fisheye_without_200_is_fisheye190() {
        let info = detect_format(3840, 1920, "cave_fisheye_sbs.mp4");
        assert_eq!(info.projection, VrProjection::Fisheye190);
    }

    #[test]
    fn token_360_maps_to_equirect360() {
        let info = detect_format(4096, 2048, "tour_360.mp4");
        assert!(info.is_vr);
        assert_eq!(info.projection, VrProjection::Equirect360);
    }

    #[test]
    fn mono_vr_has_no_layout() {
        // VR keyword but 16:9 aspect: flagged VR, layout stays None
        let info = detect_format(1920, 1080, "demo_OCULUS.mp4");
        assert!(info.is_vr);
        assert_eq!(info.layout, VrLayout::None);
    }

    #[test]
    fn zero_height_is_not_vr() {
        let info = detect_format(1920, 0, "broken.mp4");
        assert!(!info.is_vr);
        assert_eq!(aspect_ratio(1920, 0), 0.0);
    }

    #[test]
    fn detection_is_idempotent() {
        let a = detect_format(3840, 1920, "scene_180_SBS.mp4");
        let b = detect_format(3840, 1920, "scene_180_SBS.mp4");
        assert_eq!(a, b);
    }

    #[test]
    fn likely_vr_needs_both_aspect_and_resolution() {
        assert!(is_likely_vr(3840, 1920));
        assert!(is_likely_vr(2048, 4096));
        assert!(!is_likely_vr(1920, 960));
        assert!(!is_likely_vr(3840, 2160));
    }
}
