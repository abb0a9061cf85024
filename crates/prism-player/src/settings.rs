//! Processing-path override settings.
//!
//! The UI owns these; the pipeline reads them once per tick and never writes
//! them. Explicit overrides always beat auto-detection, but never touch the
//! detector's confidence value.

use serde::{Deserialize, Serialize};

use crate::vr::{VrFormatInfo, VrLayout};

/// Force the clip to be treated as 2D or VR, or trust auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoTypeOverride {
    Auto,
    Force2D,
    ForceVr,
}

/// Force a stereo layout, or trust auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutOverride {
    Auto,
    ForceSbs,
    ForceTb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub version: u32,
    pub video_type: VideoTypeOverride,
    pub layout: LayoutOverride,
    /// false = left eye, true = right eye.
    #[serde(default)]
    pub use_right_eye: bool,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            version: 1,
            video_type: VideoTypeOverride::Auto,
            layout: LayoutOverride::Auto,
            use_right_eye: false,
        }
    }
}

impl ProcessingSettings {
    pub fn load() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir.join("prism").join("processing.json");
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(config_dir) = dirs::config_dir() else {
            return;
        };
        let dir = config_dir.join("prism");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("processing.json");
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}

/// Merge auto-detected format with user overrides.
///
/// Overrides win and mark the result `user_forced`; confidence always stays
/// the detector's. A forced-2D clip keeps whatever layout override is stored,
/// but `is_vr = false` makes the crop stage a no-op regardless.
pub fn resolve_format(detected: VrFormatInfo, settings: &ProcessingSettings) -> VrFormatInfo {
    let mut active = detected;

    match settings.video_type {
        VideoTypeOverride::Force2D => {
            active.is_vr = false;
            active.user_forced = true;
        }
        VideoTypeOverride::ForceVr => {
            active.is_vr = true;
            active.user_forced = true;
        }
        VideoTypeOverride::Auto => {}
    }

    match settings.layout {
        LayoutOverride::ForceSbs => {
            active.layout = VrLayout::SideBySide;
            active.user_forced = true;
        }
        LayoutOverride::ForceTb => {
            active.layout = VrLayout::TopBottom;
            active.user_forced = true;
        }
        LayoutOverride::Auto => {}
    }

    active
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::detect_format;

    #[test]
    fn auto_settings_pass_detection_through() {
        let detected = detect_format(3840, 1920, "scene_180_SBS.mp4");
        let active = resolve_format(detected, &ProcessingSettings::default());
        assert_eq!(active, detected);
        assert!(!active.user_forced);
    }

    #[test]
    fn force_vr_flags_a_flat_clip() {
        let detected = detect_format(1920, 1080, "clip.mp4");
        let settings = ProcessingSettings {
            video_type: VideoTypeOverride::ForceVr,
            layout: LayoutOverride::ForceSbs,
            ..Default::default()
        };
        let active = resolve_format(detected, &settings);
        assert!(active.is_vr);
        assert!(active.user_forced);
        assert_eq!(active.layout, VrLayout::SideBySide);
        // Override must not invent confidence
        assert_eq!(active.confidence, 0.0);
    }

    #[test]
    fn force_2d_wins_over_forced_layout() {
        let detected = detect_format(3840, 1920, "scene_180_SBS.mp4");
        let settings = ProcessingSettings {
            video_type: VideoTypeOverride::Force2D,
            layout: LayoutOverride::ForceSbs,
            ..Default::default()
        };
        let active = resolve_format(detected, &settings);
        // Forced 2D makes the layout irrelevant: no cropping happens
        assert!(!active.is_vr);
        assert_eq!(active.confidence, detected.confidence);
    }

    #[test]
    fn layout_override_replaces_detected_layout() {
        let detected = detect_format(3840, 1920, "scene_sbs.mp4");
        assert_eq!(detected.layout, VrLayout::SideBySide);
        let settings = ProcessingSettings {
            layout: LayoutOverride::ForceTb,
            ..Default::default()
        };
        let active = resolve_format(detected, &settings);
        assert_eq!(active.layout, VrLayout::TopBottom);
        assert!(active.is_vr);
    }

    #[test]
    fn settings_roundtrip_json() {
        let settings = ProcessingSettings {
            video_type: VideoTypeOverride::ForceVr,
            layout: LayoutOverride::ForceTb,
            use_right_eye: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: ProcessingSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video_type, VideoTypeOverride::ForceVr);
        assert_eq!(back.layout, LayoutOverride::ForceTb);
        assert!(back.use_right_eye);
    }
}
