//! `scale` — spatial resize filter.
//!
//! Each plane is resized independently with `fast_image_resize`, so planar
//! YUV keeps its chroma subsampling at the new size.  Output size comes from
//! an explicit `width`/`height` pair or a uniform `scaling_factor`.

use fast_image_resize as fr;
use tracing::debug;

use strand_core::config::{HwDeviceType, ProcessorConfig, ProcessorParams, ScaleAlgorithm};
use strand_core::error::{EngineError, Result};
use strand_core::types::{Frame, PlaneLayout, frame_buffer};

use crate::processor::{Filter, ProcessorCore, ProcessorInit};

pub struct ScaleFilter {
    algorithm: ScaleAlgorithm,
    output: Option<(u32, u32)>,
    resizer: fr::Resizer,
}

impl ScaleFilter {
    pub const TYPE: &'static str = "scale";

    /// Validate `config` and build the filter.
    pub fn from_config(config: &ProcessorConfig) -> Result<Self> {
        let algorithm = match &config.params {
            ProcessorParams::Scale(params) => params.algorithm,
            other => {
                return Err(EngineError::InvalidConfig(format!(
                    "scale filter given non-scale params: {other:?}"
                )));
            }
        };
        match (config.width, config.height) {
            (0, 0) => {
                let factor = config.scaling_factor;
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(EngineError::InvalidConfig(format!(
                        "scale needs width and height or a positive scaling factor (got {factor})"
                    )));
                }
            }
            (0, _) | (_, 0) => {
                return Err(EngineError::InvalidConfig(format!(
                    "scale needs both width and height (got {}x{})",
                    config.width, config.height
                )));
            }
            _ => {}
        }
        Ok(Self {
            algorithm,
            output: None,
            resizer: fr::Resizer::new(),
        })
    }

    fn resize_alg(&self) -> fr::ResizeAlg {
        match self.algorithm {
            ScaleAlgorithm::Nearest => fr::ResizeAlg::Nearest,
            ScaleAlgorithm::Bilinear => fr::ResizeAlg::Convolution(fr::FilterType::Bilinear),
            ScaleAlgorithm::Lanczos3 => fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3),
        }
    }

    fn resize_plane(
        &mut self,
        src: &[u8],
        from: PlaneLayout,
        to: PlaneLayout,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if from == to {
            out.extend_from_slice(src);
            return Ok(());
        }
        let pixel_type = match from.channels {
            1 => fr::PixelType::U8,
            3 => fr::PixelType::U8x3,
            n => {
                return Err(EngineError::Process(format!(
                    "scale: unsupported plane with {n} channels"
                )));
            }
        };
        let src_image = fr::images::Image::from_vec_u8(from.width, from.height, src.to_vec(), pixel_type)
            .map_err(|e| EngineError::Process(format!("scale: source plane: {e}")))?;
        let mut dst_image = fr::images::Image::new(to.width, to.height, pixel_type);
        let options = fr::ResizeOptions::new().resize_alg(self.resize_alg());
        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| EngineError::Process(format!("scale: resize failed: {e}")))?;
        out.extend_from_slice(dst_image.buffer());
        Ok(())
    }
}

impl ProcessorCore for ScaleFilter {
    fn init(&mut self, init: &ProcessorInit) -> Result<()> {
        if init.device.hw != HwDeviceType::None {
            return Err(EngineError::Init(format!(
                "scale runs on the CPU only (requested {})",
                init.device.hw
            )));
        }
        if init.input.format != init.output.format {
            return Err(EngineError::Init(format!(
                "scale cannot convert {} to {}",
                init.input.format, init.output.format
            )));
        }
        if init.output.width == 0 || init.output.height == 0 {
            return Err(EngineError::Init("scale output has zero size".into()));
        }
        self.output = Some((init.output.width, init.output.height));
        debug!(
            in_w = init.input.width,
            in_h = init.input.height,
            out_w = init.output.width,
            out_h = init.output.height,
            algorithm = ?self.algorithm,
            "Scale filter initialized"
        );
        Ok(())
    }

    fn processor_type(&self) -> &str {
        Self::TYPE
    }

    fn output_dimensions(&self, config: &ProcessorConfig, in_w: u32, in_h: u32) -> (u32, u32) {
        if config.width > 0 && config.height > 0 {
            return (config.width, config.height);
        }
        let scale = |v: u32| ((v as f64 * f64::from(config.scaling_factor)).round() as u32).max(1);
        (scale(in_w), scale(in_h))
    }
}

impl Filter for ScaleFilter {
    fn filter(&mut self, frame: Frame) -> Result<Option<Frame>> {
        let (out_w, out_h) = self
            .output
            .ok_or_else(|| EngineError::Process("scale filter used before init".into()))?;
        if frame.width() == out_w && frame.height() == out_h {
            return Ok(Some(frame));
        }

        let format = frame.format();
        let src_planes = frame.plane_layouts();
        let dst_planes = format.planes(out_w, out_h);
        let mut data = frame_buffer(format.byte_size(out_w, out_h))?;
        let mut offset = 0;
        for (from, to) in src_planes.iter().zip(&dst_planes) {
            let src = &frame.data()[offset..offset + from.byte_size()];
            self.resize_plane(src, *from, *to, &mut data)?;
            offset += from.byte_size();
        }
        frame.derive(out_w, out_h, data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{DeviceContext, VideoParams};
    use strand_core::config::ScaleParams;
    use strand_core::types::{PixelFormat, Rational};

    fn init_for(filter: &mut ScaleFilter, config: &ProcessorConfig, w: u32, h: u32, format: PixelFormat) {
        let (out_w, out_h) = filter.output_dimensions(config, w, h);
        let side = |width, height| VideoParams {
            width,
            height,
            format,
            time_base: Rational::new(1, 25),
            frame_rate: Some(Rational::new(25, 1)),
        };
        filter
            .init(&ProcessorInit {
                input: side(w, h),
                output: side(out_w, out_h),
                device: DeviceContext::default(),
            })
            .expect("init on cpu");
    }

    #[test]
    fn doubles_uniform_gray_frame() {
        let config = ProcessorConfig::scale(2.0).with_algorithm(ScaleAlgorithm::Nearest);
        let mut filter = ScaleFilter::from_config(&config).expect("valid config");
        init_for(&mut filter, &config, 4, 2, PixelFormat::Gray8);

        let out = filter
            .filter(Frame::filled(4, 2, PixelFormat::Gray8, 50, 7))
            .expect("resize")
            .expect("scale never blocks");
        assert_eq!((out.width(), out.height()), (8, 4));
        assert_eq!(out.pts, 7);
        assert!(out.data().iter().all(|&b| b == 50));
    }

    #[test]
    fn yuv420_planes_keep_subsampling() {
        let config = ProcessorConfig::scale(2.0).with_algorithm(ScaleAlgorithm::Nearest);
        let mut filter = ScaleFilter::from_config(&config).expect("valid config");
        init_for(&mut filter, &config, 5, 3, PixelFormat::Yuv420p);

        let out = filter
            .filter(Frame::filled(5, 3, PixelFormat::Yuv420p, 128, 0))
            .expect("resize")
            .expect("scale never blocks");
        assert_eq!((out.width(), out.height()), (10, 6));
        assert_eq!(out.data().len(), PixelFormat::Yuv420p.byte_size(10, 6));
        assert!(out.data().iter().all(|&b| b == 128));
    }

    #[test]
    fn explicit_size_wins_over_factor() {
        let config = ProcessorConfig {
            scaling_factor: 3.0,
            ..ProcessorConfig::scale_to(16, 8)
        };
        let filter = ScaleFilter::from_config(&config).expect("valid config");
        assert_eq!(filter.output_dimensions(&config, 4, 4), (16, 8));
    }

    #[test]
    fn rejects_partial_or_non_positive_sizes() {
        let only_width = ProcessorConfig {
            width: 640,
            ..ProcessorConfig::default()
        };
        assert!(matches!(
            ScaleFilter::from_config(&only_width),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(ScaleFilter::from_config(&ProcessorConfig::scale(-1.0)).is_err());
        assert!(ScaleFilter::from_config(&ProcessorConfig::scale(f32::NAN)).is_err());
    }

    #[test]
    fn rejects_mismatched_params() {
        let config = ProcessorConfig {
            params: ProcessorParams::Blend,
            ..ProcessorConfig::scale(2.0)
        };
        assert!(ScaleFilter::from_config(&config).is_err());
        let ok = ProcessorConfig {
            params: ProcessorParams::Scale(ScaleParams::default()),
            ..ProcessorConfig::scale(2.0)
        };
        assert!(ScaleFilter::from_config(&ok).is_ok());
    }

    #[test]
    fn filter_before_init_is_an_error() {
        let mut filter = ScaleFilter::from_config(&ProcessorConfig::scale(2.0)).expect("valid config");
        let err = filter
            .filter(Frame::filled(2, 2, PixelFormat::Gray8, 0, 0))
            .expect_err("not initialized");
        assert!(matches!(err, EngineError::Process(_)));
    }

    #[test]
    fn hardware_device_is_rejected_at_init() {
        let config = ProcessorConfig::scale(2.0);
        let mut filter = ScaleFilter::from_config(&config).expect("valid config");
        let side = VideoParams {
            width: 2,
            height: 2,
            format: PixelFormat::Gray8,
            time_base: Rational::new(1, 25),
            frame_rate: None,
        };
        let err = filter
            .init(&ProcessorInit {
                input: side,
                output: side,
                device: DeviceContext {
                    hw: HwDeviceType::Cuda,
                    index: 0,
                },
            })
            .expect_err("cpu only");
        assert!(matches!(err, EngineError::Init(_)));
    }
}
