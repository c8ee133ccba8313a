//! `blend` — linear cross-fade interpolator.
//!
//! Produces `prev × (1 − t) + cur × t` per byte, in 8.8 fixed point.  It has
//! no motion model; it exists so interpolation runs can be exercised end to
//! end without an external inference backend.

use tracing::debug;

use strand_core::config::{HwDeviceType, ProcessorConfig, ProcessorParams};
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, frame_buffer};

use crate::processor::{Interpolator, ProcessorCore, ProcessorInit};

pub struct BlendInterpolator {
    frm_rate_mul: u32,
    initialized: bool,
}

impl BlendInterpolator {
    pub const TYPE: &'static str = "blend";

    pub fn from_config(config: &ProcessorConfig) -> Result<Self> {
        if !matches!(config.params, ProcessorParams::Blend) {
            return Err(EngineError::InvalidConfig(format!(
                "blend interpolator given non-blend params: {:?}",
                config.params
            )));
        }
        if config.frm_rate_mul < 2 {
            return Err(EngineError::InvalidConfig(format!(
                "frame rate multiplier must be at least 2 (got {})",
                config.frm_rate_mul
            )));
        }
        if !(0.0..=100.0).contains(&config.scn_det_thresh) {
            return Err(EngineError::InvalidConfig(format!(
                "scene threshold must be within 0-100 (got {})",
                config.scn_det_thresh
            )));
        }
        Ok(Self {
            frm_rate_mul: config.frm_rate_mul,
            initialized: false,
        })
    }
}

/// Integer weight of `cur` out of 256 for fraction `t`.
#[inline]
fn weight(t: f32) -> u32 {
    (t * 256.0).round().clamp(0.0, 256.0) as u32
}

impl ProcessorCore for BlendInterpolator {
    fn init(&mut self, init: &ProcessorInit) -> Result<()> {
        if init.device.hw != HwDeviceType::None {
            return Err(EngineError::Init(format!(
                "blend runs on the CPU only (requested {})",
                init.device.hw
            )));
        }
        if (init.input.width, init.input.height, init.input.format)
            != (init.output.width, init.output.height, init.output.format)
        {
            return Err(EngineError::Init(
                "blend cannot change frame size or pixel format".into(),
            ));
        }
        self.initialized = true;
        debug!(
            width = init.input.width,
            height = init.input.height,
            frm_rate_mul = self.frm_rate_mul,
            "Blend interpolator initialized"
        );
        Ok(())
    }

    fn processor_type(&self) -> &str {
        Self::TYPE
    }

    fn output_dimensions(&self, _config: &ProcessorConfig, in_w: u32, in_h: u32) -> (u32, u32) {
        (in_w, in_h)
    }
}

impl Interpolator for BlendInterpolator {
    fn interpolate(&mut self, prev: &Frame, cur: &Frame, t: f32) -> Result<Option<Frame>> {
        if !self.initialized {
            return Err(EngineError::Process("blend interpolator used before init".into()));
        }
        if !prev.same_layout(cur) {
            return Err(EngineError::Process(format!(
                "blend needs matching frames, got {}x{} {} and {}x{} {}",
                prev.width(),
                prev.height(),
                prev.format(),
                cur.width(),
                cur.height(),
                cur.format()
            )));
        }
        if !(t > 0.0 && t < 1.0) {
            return Err(EngineError::Process(format!(
                "interpolation fraction {t} outside (0, 1)"
            )));
        }

        let w = weight(t);
        let mut data = frame_buffer(prev.data().len())?;
        data.extend(
            prev.data()
                .iter()
                .zip(cur.data())
                .map(|(&p, &c)| ((u32::from(p) * (256 - w) + u32::from(c) * w + 128) >> 8) as u8),
        );
        prev.derive(prev.width(), prev.height(), data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{DeviceContext, VideoParams};
    use strand_core::types::{PixelFormat, Rational};

    fn ready() -> BlendInterpolator {
        let mut blend =
            BlendInterpolator::from_config(&ProcessorConfig::blend(4, 20.0)).expect("valid config");
        let side = VideoParams {
            width: 2,
            height: 2,
            format: PixelFormat::Gray8,
            time_base: Rational::new(1, 25),
            frame_rate: Some(Rational::new(25, 1)),
        };
        blend
            .init(&ProcessorInit {
                input: side,
                output: side,
                device: DeviceContext::default(),
            })
            .expect("init");
        blend
    }

    #[test]
    fn quarter_steps_between_ten_and_twenty() {
        let mut blend = ready();
        let p = Frame::filled(2, 2, PixelFormat::Gray8, 10, 0);
        let c = Frame::filled(2, 2, PixelFormat::Gray8, 20, 1);
        let values: Vec<u8> = [0.25f32, 0.5, 0.75]
            .iter()
            .map(|&t| {
                blend
                    .interpolate(&p, &c, t)
                    .expect("blend")
                    .expect("blend never blocks")
                    .data()[0]
            })
            .collect();
        assert_eq!(values, vec![13, 15, 18]);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let mut blend = ready();
        let p = Frame::filled(2, 2, PixelFormat::Gray8, 0, 0);
        let c = Frame::filled(4, 2, PixelFormat::Gray8, 0, 1);
        let err = blend.interpolate(&p, &c, 0.5).expect_err("size mismatch");
        assert!(matches!(err, EngineError::Process(_)));
    }

    #[test]
    fn fraction_must_be_strictly_inside_unit_interval() {
        let mut blend = ready();
        let p = Frame::filled(2, 2, PixelFormat::Gray8, 0, 0);
        assert!(blend.interpolate(&p, &p, 0.0).is_err());
        assert!(blend.interpolate(&p, &p, 1.0).is_err());
        assert!(blend.interpolate(&p, &p, f32::NAN).is_err());
    }

    #[test]
    fn config_validation() {
        assert!(BlendInterpolator::from_config(&ProcessorConfig::blend(1, 20.0)).is_err());
        assert!(BlendInterpolator::from_config(&ProcessorConfig::blend(2, 100.5)).is_err());
        assert!(BlendInterpolator::from_config(&ProcessorConfig::blend(2, -1.0)).is_err());
        let wrong_params = ProcessorConfig {
            processor: "blend".into(),
            ..ProcessorConfig::scale(2.0)
        };
        assert!(BlendInterpolator::from_config(&wrong_params).is_err());
    }
}
