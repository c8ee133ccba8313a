//! YUV4MPEG2 stream header.
//!
//! ```text
//! YUV4MPEG2 W640 H360 F30000:1001 Ip A1:1 C420jpeg\n
//! FRAME\n<raw planes>
//! FRAME\n<raw planes>
//! ```
//!
//! Only 8-bit planar 4:2:0, 4:4:4 and mono are understood.

use strand_core::error::{EngineError, Result};
use strand_core::types::{PixelFormat, Rational};

pub const MAGIC: &str = "YUV4MPEG2";
pub const FRAME_MARKER: &str = "FRAME";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Y4mHeader {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    pub format: PixelFormat,
    /// Interlace tag (`p`, `t`, `b`, `m`), kept verbatim.
    pub interlace: char,
    pub aspect: Option<Rational>,
}

impl Y4mHeader {
    pub fn new(width: u32, height: u32, frame_rate: Rational, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            frame_rate,
            format,
            interlace: 'p',
            aspect: None,
        }
    }

    /// Parse a header line (without the trailing newline).
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_ascii_whitespace();
        if tokens.next() != Some(MAGIC) {
            return Err(EngineError::Init("not a YUV4MPEG2 stream".into()));
        }

        let mut width = None;
        let mut height = None;
        let mut frame_rate = None;
        let mut format = PixelFormat::Yuv420p;
        let mut interlace = 'p';
        let mut aspect = None;

        for token in tokens {
            let mut chars = token.chars();
            let tag = chars.next();
            let value = chars.as_str();
            match tag {
                Some('W') => width = Some(parse_dimension("width", value)?),
                Some('H') => height = Some(parse_dimension("height", value)?),
                Some('F') => frame_rate = Some(parse_ratio("frame rate", value)?),
                Some('A') => aspect = Some(parse_ratio("aspect", value)?),
                Some('I') => interlace = value.chars().next().unwrap_or('p'),
                Some('C') => format = parse_colorspace(value)?,
                // X (extension) and unknown tags are ignored.
                _ => {}
            }
        }

        let width = width.ok_or_else(|| EngineError::Init("Y4M header missing W".into()))?;
        let height = height.ok_or_else(|| EngineError::Init("Y4M header missing H".into()))?;
        let frame_rate =
            frame_rate.ok_or_else(|| EngineError::Init("Y4M header missing F".into()))?;
        if !frame_rate.is_valid() || frame_rate.num < 0 || frame_rate.den < 0 {
            return Err(EngineError::Init(format!(
                "Y4M frame rate {frame_rate} is invalid"
            )));
        }

        Ok(Self {
            width,
            height,
            frame_rate,
            format,
            interlace,
            aspect,
        })
    }

    /// Header line including the trailing newline.
    pub fn to_line(&self) -> Result<String> {
        let colorspace = colorspace_tag(self.format)?;
        let mut line = format!(
            "{MAGIC} W{} H{} F{}:{} I{}",
            self.width, self.height, self.frame_rate.num, self.frame_rate.den, self.interlace
        );
        if let Some(aspect) = self.aspect {
            line.push_str(&format!(" A{}:{}", aspect.num, aspect.den));
        }
        line.push_str(" C");
        line.push_str(colorspace);
        line.push('\n');
        Ok(line)
    }

    /// Bytes of pixel data in one frame.
    pub fn frame_size(&self) -> usize {
        self.format.byte_size(self.width, self.height)
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(EngineError::Init(format!("Y4M {name} '{value}' is invalid"))),
    }
}

fn parse_ratio(name: &str, value: &str) -> Result<Rational> {
    let parsed = value
        .split_once(':')
        .and_then(|(n, d)| Some(Rational::new(n.parse().ok()?, d.parse().ok()?)));
    parsed.ok_or_else(|| EngineError::Init(format!("Y4M {name} '{value}' is not n:d")))
}

fn parse_colorspace(value: &str) -> Result<PixelFormat> {
    match value {
        "420" | "420jpeg" | "420paldv" | "420mpeg2" => Ok(PixelFormat::Yuv420p),
        "444" => Ok(PixelFormat::Yuv444p),
        "mono" => Ok(PixelFormat::Gray8),
        other => Err(EngineError::Init(format!(
            "Y4M colorspace '{other}' is not supported"
        ))),
    }
}

/// `C` tag for a pixel format, or an error for layouts Y4M cannot carry.
pub fn colorspace_tag(format: PixelFormat) -> Result<&'static str> {
    match format {
        PixelFormat::Yuv420p => Ok("420jpeg"),
        PixelFormat::Yuv444p => Ok("444"),
        PixelFormat::Gray8 => Ok("mono"),
        PixelFormat::Rgb24 => Err(EngineError::InvalidConfig(
            "Y4M cannot store rgb24 frames".into(),
        )),
    }
}
