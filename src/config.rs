//! Configuration management for MiniLab GW.
//!
//! Loads the YAML configuration describing port name patterns, channels, and
//! the pad/knob layout. Every field has a default equal to the rig this
//! gateway was built for, so an empty file is a valid configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::ids::{PadId, ParamId};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub synth: SynthConfig,
}

/// Performance keyboard ("keys" role) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeysConfig {
    /// Case-insensitive substring of the MIDI input port name.
    #[serde(default = "default_keys_port")]
    pub input_port: String,
    /// Primary channel this controller is authoritative for (1-16).
    #[serde(default = "default_keys_channel")]
    pub channel: u8,
    /// Optional secondary channel carrying the device's alternate velocity
    /// curve; traffic on it is forwarded without the bass remap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_channel: Option<u8>,
    /// Highest note the bass velocity remap applies to (F3 by default).
    #[serde(default = "default_bass_ceiling")]
    pub bass_ceiling: u8,
    /// CC number of the expression pedal.
    #[serde(default = "default_expression_cc")]
    pub expression_cc: u8,
}

/// Pad/knob surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurfaceConfig {
    /// Case-insensitive substring of the MIDI input port name.
    #[serde(default = "default_surface_port")]
    pub input_port: String,
    /// Output port for SysEx feedback (LEDs, knob positions). Usually the
    /// same device as the input.
    #[serde(default = "default_surface_port")]
    pub feedback_port: String,
    /// Channel this controller is authoritative for (1-16).
    #[serde(default = "default_surface_channel")]
    pub channel: u8,
    /// Output channel for toggled (dual-zone remapped) notes. Deliberately
    /// distinct from `channel` so the DAW can route them to their own track.
    #[serde(default = "default_note_output_channel")]
    pub note_output_channel: u8,
    /// CC that edits the currently targeted parameter's value (mod wheel).
    #[serde(default = "default_mod_wheel_cc")]
    pub mod_wheel_cc: u8,
    /// CC that re-assigns which parameter sweeps converge toward.
    #[serde(default = "default_target_select_cc")]
    pub target_select_cc: u8,
    /// Pad note values that flip the rotary-effect toggle instead of
    /// starting a sweep.
    #[serde(default = "default_rotary_pads")]
    pub rotary_pads: Vec<u8>,
    /// CC emitted (value 127/0) when the rotary toggle flips.
    #[serde(default = "default_rotary_cc")]
    pub rotary_cc: u8,
    /// Knob each pad drives, 1-based, one entry per pad. Many-to-one is
    /// allowed (several pads may share a knob).
    #[serde(default = "default_pad_links")]
    pub pad_links: Vec<u8>,
    /// Resting LED color per pad.
    #[serde(default = "default_pad_colors")]
    pub pad_colors: Vec<u8>,
    /// Knob values pushed to the device and the DAW at startup.
    #[serde(default = "default_initial_values")]
    pub initial_values: Vec<u8>,
    /// Default base pitch for the dual-zone remap (C1).
    #[serde(default = "default_base_pitch")]
    pub base_pitch: u8,
    /// Knob sweeps converge toward at startup, 1-based.
    #[serde(default = "default_target_param")]
    pub target_param: u8,
}

/// Sweep pacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// Interpolation steps per sweep.
    #[serde(default = "default_sweep_steps")]
    pub steps: u32,
    /// Microseconds per unit of the squared-velocity duration hint. The
    /// inter-step delay is `(128 - velocity)^2 * step_micros_factor`.
    #[serde(default = "default_step_micros_factor")]
    pub step_micros_factor: u64,
}

/// Virtual synth/DAW port configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthConfig {
    /// Case-insensitive substring of the virtual MIDI output port name.
    #[serde(default = "default_synth_port")]
    pub output_port: String,
}

fn default_keys_port() -> String {
    "umc".to_string()
}
fn default_keys_channel() -> u8 {
    1
}
fn default_bass_ceiling() -> u8 {
    53 // F3, the F below middle C
}
fn default_expression_cc() -> u8 {
    7
}
fn default_surface_port() -> String {
    "arturia".to_string()
}
fn default_surface_channel() -> u8 {
    3
}
fn default_note_output_channel() -> u8 {
    2
}
fn default_mod_wheel_cc() -> u8 {
    1
}
fn default_target_select_cc() -> u8 {
    2
}
fn default_rotary_pads() -> Vec<u8> {
    vec![5, 13]
}
fn default_rotary_cc() -> u8 {
    1
}
fn default_pad_links() -> Vec<u8> {
    vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 8]
}
fn default_pad_colors() -> Vec<u8> {
    vec![20, 20, 127, 5, 1, 0, 17, 20, 20, 20, 127, 5, 1, 0, 17, 20]
}
fn default_initial_values() -> Vec<u8> {
    vec![127, 127, 127, 90, 100, 127, 127, 127, 0, 0, 0, 0, 0, 0, 60, 0]
}
fn default_base_pitch() -> u8 {
    24 // C1
}
fn default_target_param() -> u8 {
    16
}
fn default_sweep_steps() -> u32 {
    60
}
fn default_step_micros_factor() -> u64 {
    30
}
fn default_synth_port() -> String {
    "loopbe".to_string()
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            input_port: default_keys_port(),
            channel: default_keys_channel(),
            alt_channel: None,
            bass_ceiling: default_bass_ceiling(),
            expression_cc: default_expression_cc(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            input_port: default_surface_port(),
            feedback_port: default_surface_port(),
            channel: default_surface_channel(),
            note_output_channel: default_note_output_channel(),
            mod_wheel_cc: default_mod_wheel_cc(),
            target_select_cc: default_target_select_cc(),
            rotary_pads: default_rotary_pads(),
            rotary_cc: default_rotary_cc(),
            pad_links: default_pad_links(),
            pad_colors: default_pad_colors(),
            initial_values: default_initial_values(),
            base_pitch: default_base_pitch(),
            target_param: default_target_param(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            steps: default_sweep_steps(),
            step_micros_factor: default_step_micros_factor(),
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            output_port: default_synth_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keys: KeysConfig::default(),
            surface: SurfaceConfig::default(),
            sweep: SweepConfig::default(),
            synth: SynthConfig::default(),
        }
    }
}

impl SurfaceConfig {
    /// Knob a pad drives, per the link table.
    pub fn pad_link(&self, pad: PadId) -> Option<ParamId> {
        let knob_number = *self.pad_links.get(pad.index())?;
        ParamId::from_index(knob_number.checked_sub(1)?)
    }

    /// All pads currently linked to a given knob (many-to-one allowed).
    pub fn pads_linked_to(&self, param: ParamId) -> Vec<PadId> {
        PadId::ALL
            .iter()
            .copied()
            .filter(|pad| self.pad_link(*pad) == Some(param))
            .collect()
    }

    /// Resting LED color of a pad.
    pub fn resting_color(&self, pad: PadId) -> u8 {
        self.pad_colors.get(pad.index()).copied().unwrap_or(0)
    }

    /// Whether a pad note flips the rotary toggle.
    pub fn is_rotary_pad(&self, note: u8) -> bool {
        self.rotary_pads.contains(&note)
    }

    /// Startup target parameter as a typed id.
    pub fn initial_target(&self) -> ParamId {
        ParamId::from_index(self.target_param.saturating_sub(1)).unwrap_or(ParamId::Knob16)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file. A missing file yields the
    /// built-in defaults; a present-but-invalid file is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check channel numbers and table lengths.
    pub fn validate(&self) -> Result<()> {
        for (name, ch) in [
            ("keys.channel", self.keys.channel),
            ("surface.channel", self.surface.channel),
            ("surface.note_output_channel", self.surface.note_output_channel),
        ] {
            if !(1..=16).contains(&ch) {
                bail!("{} must be 1-16, got {}", name, ch);
            }
        }
        if let Some(alt) = self.keys.alt_channel {
            if !(1..=16).contains(&alt) {
                bail!("keys.alt_channel must be 1-16, got {}", alt);
            }
        }
        for (name, table) in [
            ("surface.pad_links", &self.surface.pad_links),
            ("surface.pad_colors", &self.surface.pad_colors),
            ("surface.initial_values", &self.surface.initial_values),
        ] {
            if table.len() != 16 {
                bail!("{} must have 16 entries, got {}", name, table.len());
            }
        }
        for (i, knob) in self.surface.pad_links.iter().enumerate() {
            if !(1..=16).contains(knob) {
                bail!("surface.pad_links[{}] must be 1-16, got {}", i, knob);
            }
        }
        if !(1..=16).contains(&self.surface.target_param) {
            bail!(
                "surface.target_param must be 1-16, got {}",
                self.surface.target_param
            );
        }
        if self.sweep.steps == 0 {
            bail!("sweep.steps must be at least 1");
        }
        Ok(())
    }
}
