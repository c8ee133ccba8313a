//! Job configuration records.
//!
//! Both records derive serde so a job can be described in JSON as well as on
//! the command line.  They are plain data: validation happens where the
//! record is consumed (processor factory, encoder construction).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::PixelFormat;

// ─── Hardware selector ───────────────────────────────────────────────────────

/// Hardware acceleration backend requested for decode, processing and encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwDeviceType {
    #[default]
    None,
    Cuda,
    Vaapi,
    Vulkan,
}

impl HwDeviceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cuda => "cuda",
            Self::Vaapi => "vaapi",
            Self::Vulkan => "vulkan",
        }
    }
}

impl fmt::Display for HwDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HwDeviceType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" | "cpu" => Ok(Self::None),
            "cuda" | "nvdec" => Ok(Self::Cuda),
            "vaapi" => Ok(Self::Vaapi),
            "vulkan" => Ok(Self::Vulkan),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown hwaccel '{other}' (expected none|cuda|vaapi|vulkan)"
            ))),
        }
    }
}

// ─── Processor ───────────────────────────────────────────────────────────────

/// Resampling kernel used by the `scale` filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleAlgorithm {
    Nearest,
    #[default]
    Bilinear,
    Lanczos3,
}

impl FromStr for ScaleAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "lanczos" | "lanczos3" => Ok(Self::Lanczos3),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown scale algorithm '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleParams {
    pub algorithm: ScaleAlgorithm,
}

/// Processor-specific parameters, tagged by kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessorParams {
    Scale(ScaleParams),
    Blend,
    /// Opaque options for externally registered processors.
    Custom { options: serde_json::Value },
}

impl Default for ProcessorParams {
    fn default() -> Self {
        Self::Scale(ScaleParams::default())
    }
}

/// Configuration for one processor instance.
///
/// Spatial fields (`width`, `height`, `scaling_factor`) matter for filters;
/// temporal fields (`frm_rate_mul`, `scn_det_thresh`) for interpolators.
/// Which set applies is decided by the processor type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Registered processor tag, e.g. `scale` or `blend`.
    pub processor: String,
    /// Explicit output width; 0 = derive from `scaling_factor`.
    pub width: u32,
    /// Explicit output height; 0 = derive from `scaling_factor`.
    pub height: u32,
    pub scaling_factor: f32,
    /// Output frames per input frame interval.  Must be ≥ 2 to interpolate.
    pub frm_rate_mul: u32,
    /// Scene-change threshold as a percentage pixel difference (0–100).
    pub scn_det_thresh: f32,
    pub params: ProcessorParams,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            processor: "scale".into(),
            width: 0,
            height: 0,
            scaling_factor: 0.0,
            frm_rate_mul: 2,
            scn_det_thresh: 20.0,
            params: ProcessorParams::default(),
        }
    }
}

impl ProcessorConfig {
    /// `scale` filter by a uniform factor.
    pub fn scale(factor: f32) -> Self {
        Self {
            scaling_factor: factor,
            ..Self::default()
        }
    }

    /// `scale` filter to an explicit size.
    pub fn scale_to(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// `blend` interpolator.
    pub fn blend(frm_rate_mul: u32, scn_det_thresh: f32) -> Self {
        Self {
            processor: "blend".into(),
            frm_rate_mul,
            scn_det_thresh,
            params: ProcessorParams::Blend,
            ..Self::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: ScaleAlgorithm) -> Self {
        self.params = ProcessorParams::Scale(ScaleParams { algorithm });
        self
    }
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Encoder settings.  Fixed for the lifetime of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub codec: String,
    /// Output pixel format; `None` keeps the decoder's.
    pub pix_fmt: Option<PixelFormat>,
    pub bit_rate: u64,
    pub rc_buffer_size: u64,
    pub rc_min_rate: u64,
    pub rc_max_rate: u64,
    pub qmin: i32,
    pub qmax: i32,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub keyint_min: u32,
    pub refs: u32,
    pub thread_count: u32,
    pub delay: u32,
    /// Copy audio/subtitle substreams to the output.
    pub copy_streams: bool,
    /// Free-form `key=value` options, in the order given.
    pub extra_options: Vec<(String, String)>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: "rawvideo".into(),
            pix_fmt: None,
            bit_rate: 0,
            rc_buffer_size: 0,
            rc_min_rate: 0,
            rc_max_rate: 0,
            qmin: -1,
            qmax: -1,
            gop_size: 0,
            max_b_frames: 0,
            keyint_min: 0,
            refs: 0,
            thread_count: 0,
            delay: 0,
            copy_streams: true,
            extra_options: Vec::new(),
        }
    }
}

impl EncoderConfig {
    /// Parse `key=value` and append it to `extra_options`.
    pub fn push_option_str(&mut self, raw: &str) -> Result<()> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            EngineError::InvalidConfig(format!("encoder option '{raw}' is not key=value"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(EngineError::InvalidConfig(format!(
                "encoder option '{raw}' has an empty key"
            )));
        }
        self.extra_options
            .push((key.to_string(), value.trim().to_string()));
        Ok(())
    }

    /// Last value given for `key`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.extra_options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_config_json_defaults() {
        let cfg: ProcessorConfig =
            serde_json::from_str(r#"{"processor":"blend","frm_rate_mul":4,"params":{"kind":"blend"}}"#)
                .expect("parse blend config");
        assert_eq!(cfg.frm_rate_mul, 4);
        assert_eq!(cfg.scn_det_thresh, 20.0);
        assert_eq!(cfg.params, ProcessorParams::Blend);
    }

    #[test]
    fn scale_params_tagged_round_trip() {
        let cfg = ProcessorConfig::scale(2.0).with_algorithm(ScaleAlgorithm::Lanczos3);
        let json = serde_json::to_value(&cfg).expect("serialize");
        assert_eq!(json["params"]["kind"], "scale");
        assert_eq!(json["params"]["algorithm"], "lanczos3");
    }

    #[test]
    fn encoder_options_parse_and_override() {
        let mut cfg = EncoderConfig::default();
        cfg.push_option_str("preset=slow").expect("valid option");
        cfg.push_option_str("crf = 18").expect("valid option");
        cfg.push_option_str("preset=fast").expect("valid option");
        assert_eq!(cfg.option("preset"), Some("fast"));
        assert_eq!(cfg.option("crf"), Some("18"));
        assert_eq!(cfg.extra_options.len(), 3);

        let err = cfg.push_option_str("novalue").expect_err("missing '='");
        assert!(matches!(err, EngineError::InvalidConfig(_)));
        cfg.push_option_str("=x").expect_err("empty key");
    }

    #[test]
    fn hw_device_type_parses_aliases() {
        assert_eq!("CUDA".parse::<HwDeviceType>().ok(), Some(HwDeviceType::Cuda));
        assert_eq!("cpu".parse::<HwDeviceType>().ok(), Some(HwDeviceType::None));
        assert!("metal".parse::<HwDeviceType>().is_err());
    }
}
