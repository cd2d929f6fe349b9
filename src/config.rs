//! Layout engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::renderer::backend::BeatGroup;

/// Tunable constants of a layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// How close (in quarter lengths) an accumulated tuplet must get to its
    /// declared total before the bracket closes
    pub tuplet_tolerance: f64,
    /// Grid of the voice duration codec, in units per quarter note
    pub duration_resolution: u32,
    /// Stave x when a stream has no `left` override
    pub default_left: f64,
    /// Stave y when a stream has no `top` override
    pub default_top: f64,
    /// Explicit auto-beam switch; `None` uses the first stream's setting
    pub auto_beam: Option<bool>,
    /// Stave line the lyric text sits on
    pub lyric_line: f64,
    pub lyric_font: FontSpec,
    /// Beam grouping used when no time signature applies
    pub default_beat_group: BeatGroup,
    pub note_width_estimate: f64,
    pub signature_width_estimate: f64,
    pub key_accidental_width: f64,
    /// Give measures without explicit `left`/`top`/`width` a place in a
    /// system before layout
    pub place_measures: bool,
    /// Vertical distance between the staves of consecutive parts
    pub staff_distance: f64,
    /// Extra space between systems
    pub system_gap: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tuplet_tolerance: 1e-3,
            duration_resolution: 256,
            default_left: 10.0,
            default_top: 0.0,
            auto_beam: None,
            lyric_line: 11.0,
            lyric_font: FontSpec::default(),
            default_beat_group: BeatGroup::new(2, 8),
            note_width_estimate: 30.0,
            signature_width_estimate: 30.0,
            key_accidental_width: 10.0,
            place_measures: true,
            staff_distance: 120.0,
            system_gap: 20.0,
        }
    }
}

impl LayoutConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tuplet_tolerance.is_nan() || self.tuplet_tolerance < 0.0 {
            return Err(LayoutError::Config(format!(
                "tuplet_tolerance must be non-negative, got {}",
                self.tuplet_tolerance
            )));
        }
        if self.duration_resolution == 0 || self.duration_resolution % 256 != 0 {
            return Err(LayoutError::Config(format!(
                "duration_resolution must be a positive multiple of 256, got {}",
                self.duration_resolution
            )));
        }
        if self.staff_distance.is_nan() || self.staff_distance < 0.0 {
            return Err(LayoutError::Config(format!(
                "staff_distance must be non-negative, got {}",
                self.staff_distance
            )));
        }
        if self.default_beat_group.denominator == 0 {
            return Err(LayoutError::Config("default_beat_group denominator must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f64,
    pub weight: String,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self { family: "Serif".into(), size: 12.0, weight: String::new() }
    }
}
