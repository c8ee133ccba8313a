//! Frame, packet and time-base types shared by every stage.
//!
//! # Ownership model
//!
//! A [`Frame`] owns its pixel buffer outright.  There is no reference
//! counting on pixel data: handing a frame to an encoder or processor moves
//! it, and the only way to obtain a second copy is an explicit `clone()`.
//! The scheduler relies on this to guarantee that a frame is never aliased
//! across threads.
//!
//! Frames may carry an `Arc<FrameLedger>`.  Every construction, clone and
//! derivation records one allocation and every drop records one release, so
//! a test can assert `ledger.live() == 0` after a run to prove that nothing
//! leaked and nothing was released twice.
//!
//! # Invariants
//!
//! 1. `data.len() == format.byte_size(width, height)` for every frame.
//! 2. Planes are stored back to back, tightly packed, in the order returned
//!    by [`PixelFormat::planes`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ─── Rational / time base ────────────────────────────────────────────────────

/// A rational number, used for time bases (seconds per tick) and frame rates
/// (frames per second).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Both terms non-zero.
    pub const fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }

    /// `den / num`.  Turns a frame rate into the matching time base.
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Multiply by an integer factor and reduce.
    pub fn scaled(self, factor: u32) -> Self {
        Self::reduced(self.num * i64::from(factor), self.den)
    }

    fn reduced(num: i64, den: i64) -> Self {
        let g = gcd(num.unsigned_abs(), den.unsigned_abs()).max(1) as i64;
        let (num, den) = (num / g, den / g);
        if den < 0 {
            Self::new(-num, -den)
        } else {
            Self::new(num, den)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Convert a timestamp from one time base to another.
///
/// Computes `value × from / to` in 128-bit arithmetic and rounds to the
/// nearest tick, ties away from zero.  A degenerate time base on either side
/// leaves the value untouched.
pub fn rescale_ts(value: i64, from: Rational, to: Rational) -> i64 {
    if from == to || !from.is_valid() || !to.is_valid() {
        return value;
    }
    let mut num = i128::from(value) * i128::from(from.num) * i128::from(to.den);
    let mut den = i128::from(from.den) * i128::from(to.num);
    if den < 0 {
        num = -num;
        den = -den;
    }
    let quotient = num / den;
    let remainder = num % den;
    let rounded = if remainder.abs() * 2 >= den {
        quotient + num.signum()
    } else {
        quotient
    };
    rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

// ─── Pixel format ────────────────────────────────────────────────────────────

/// Host pixel layout of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Planar Y, U, V; chroma subsampled 2×2 (odd sizes round up).
    Yuv420p,
    /// Planar Y, U, V at full resolution.
    Yuv444p,
    /// Luma only.
    Gray8,
    /// Interleaved `R G B` bytes in a single plane.
    Rgb24,
}

/// Geometry of one plane inside a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    /// Interleaved samples per pixel (1 for planar, 3 for RGB).
    pub channels: u32,
}

impl PlaneLayout {
    #[inline]
    pub const fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

impl PixelFormat {
    /// Plane layouts, in storage order.
    pub fn planes(self, width: u32, height: u32) -> Vec<PlaneLayout> {
        let luma = PlaneLayout {
            width,
            height,
            channels: 1,
        };
        match self {
            Self::Yuv420p => {
                let chroma = PlaneLayout {
                    width: width.div_ceil(2),
                    height: height.div_ceil(2),
                    channels: 1,
                };
                vec![luma, chroma, chroma]
            }
            Self::Yuv444p => vec![luma, luma, luma],
            Self::Gray8 => vec![luma],
            Self::Rgb24 => vec![PlaneLayout {
                width,
                height,
                channels: 3,
            }],
        }
    }

    /// Total buffer size in bytes for the given dimensions.
    pub fn byte_size(self, width: u32, height: u32) -> usize {
        self.planes(width, height)
            .iter()
            .map(PlaneLayout::byte_size)
            .sum()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv444p => "yuv444p",
            Self::Gray8 => "gray",
            Self::Rgb24 => "rgb24",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "yuv420p" => Some(Self::Yuv420p),
            "yuv444p" => Some(Self::Yuv444p),
            "gray" | "gray8" => Some(Self::Gray8),
            "rgb24" => Some(Self::Rgb24),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Zero-length buffer with room for `bytes` pixel bytes.
///
/// Allocation failure is reported as [`EngineError::ResourceExhausted`]
/// instead of aborting the process.
pub fn frame_buffer(bytes: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes).map_err(|e| {
        EngineError::ResourceExhausted(format!("frame buffer of {bytes} bytes: {e}"))
    })?;
    Ok(data)
}

// ─── Frame ledger ────────────────────────────────────────────────────────────

/// Allocation / release counters for frames that opt in.
#[derive(Debug, Default)]
pub struct FrameLedger {
    allocated: AtomicU64,
    released: AtomicU64,
}

impl FrameLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Frames allocated and not yet released.
    pub fn live(&self) -> u64 {
        self.allocated().saturating_sub(self.released())
    }

    fn record_alloc(&self) {
        self.allocated.fetch_add(1, Ordering::AcqRel);
    }

    fn record_release(&self) {
        self.released.fetch_add(1, Ordering::AcqRel);
    }
}

// ─── Frame ───────────────────────────────────────────────────────────────────

/// A decoded picture in host memory.
///
/// `pts` is expressed in whichever time base the current owner works in:
/// the decoder's video time base on the way in, the encoder's on the way out.
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    pub pts: i64,
    ledger: Option<Arc<FrameLedger>>,
}

impl Frame {
    /// Wrap an existing buffer.  Fails if its length does not match the layout.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>, pts: i64) -> Result<Self> {
        let expected = format.byte_size(width, height);
        if data.len() != expected {
            return Err(EngineError::FrameLayout {
                format,
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
            pts,
            ledger: None,
        })
    }

    /// A frame with every byte set to `value`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8, pts: i64) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![value; format.byte_size(width, height)],
            pts,
            ledger: None,
        }
    }

    /// Attach an allocation ledger.  Counts this frame as one allocation.
    pub fn with_ledger(mut self, ledger: Arc<FrameLedger>) -> Self {
        ledger.record_alloc();
        if let Some(old) = self.ledger.replace(ledger) {
            old.record_release();
        }
        self
    }

    /// Build a new frame of different geometry from this one.
    ///
    /// The result inherits `format`, `pts` and the ledger.
    pub fn derive(&self, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let frame = Self::new(width, height, self.format, data, self.pts)?;
        Ok(match &self.ledger {
            Some(ledger) => frame.with_ledger(Arc::clone(ledger)),
            None => frame,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Move the pixel buffer out, consuming the frame.
    pub fn into_data(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// Plane geometry for this frame.
    pub fn plane_layouts(&self) -> Vec<PlaneLayout> {
        self.format.planes(self.width, self.height)
    }

    /// Borrow plane `index`, or `None` past the last plane.
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let layouts = self.plane_layouts();
        let layout = layouts.get(index)?;
        let offset: usize = layouts[..index].iter().map(PlaneLayout::byte_size).sum();
        self.data.get(offset..offset + layout.byte_size())
    }

    /// Same geometry, format and pixel bytes.  Timestamps are ignored.
    pub fn same_pixels(&self, other: &Frame) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.data == other.data
    }

    /// Same geometry and format as `other`.
    pub fn same_layout(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        if let Some(ledger) = &self.ledger {
            ledger.record_alloc();
        }
        Self {
            width: self.width,
            height: self.height,
            format: self.format,
            data: self.data.clone(),
            pts: self.pts,
            ledger: self.ledger.clone(),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(ledger) = &self.ledger {
            ledger.record_release();
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ─── Packet / streams ────────────────────────────────────────────────────────

/// A demuxed compressed unit from any substream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Substream index.  Input index on the way in, output index once
    /// relabelled for passthrough.
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    /// Duration in stream time-base ticks (0 = unknown).
    pub duration: i64,
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

impl Packet {
    /// Rescale `pts`, `dts` and `duration` between time bases.
    pub fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.pts = self.pts.map(|ts| rescale_ts(ts, from, to));
        self.dts = self.dts.map(|ts| rescale_ts(ts, from, to));
        if self.duration > 0 {
            self.duration = rescale_ts(self.duration, from, to);
        }
    }
}

/// Media type of a substream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
}

/// Description of one input substream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: StreamKind,
    pub time_base: Rational,
    /// Codec name as reported by the container.
    pub codec: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_rounds_half_away_from_zero() {
        let ms = Rational::new(1, 1000);
        let tenth = Rational::new(1, 10);
        assert_eq!(rescale_ts(150, ms, tenth), 2);
        assert_eq!(rescale_ts(149, ms, tenth), 1);
        assert_eq!(rescale_ts(-150, ms, tenth), -2);
        assert_eq!(rescale_ts(-149, ms, tenth), -1);
    }

    #[test]
    fn rescale_audio_samples_to_millis() {
        let audio = Rational::new(1, 48_000);
        let ms = Rational::new(1, 1000);
        assert_eq!(rescale_ts(48_000, audio, ms), 1000);
        assert_eq!(rescale_ts(1024, audio, ms), 21);
    }

    #[test]
    fn rescale_with_degenerate_base_is_identity() {
        assert_eq!(rescale_ts(42, Rational::new(1, 0), Rational::new(1, 25)), 42);
        assert_eq!(rescale_ts(42, Rational::new(1, 25), Rational::new(0, 1)), 42);
    }

    #[test]
    fn rational_scaled_reduces() {
        assert_eq!(Rational::new(30, 1).scaled(4), Rational::new(120, 1));
        assert_eq!(Rational::new(30_000, 1001).scaled(2), Rational::new(60_000, 1001));
        assert_eq!(Rational::new(25, 2).scaled(2), Rational::new(25, 1));
    }

    #[test]
    fn yuv420_odd_dimensions_round_chroma_up() {
        let planes = PixelFormat::Yuv420p.planes(5, 3);
        assert_eq!(planes[1].width, 3);
        assert_eq!(planes[1].height, 2);
        assert_eq!(PixelFormat::Yuv420p.byte_size(5, 3), 15 + 6 + 6);
        assert_eq!(PixelFormat::Rgb24.byte_size(4, 2), 24);
    }

    #[test]
    fn frame_new_rejects_wrong_length() {
        let err = Frame::new(4, 4, PixelFormat::Gray8, vec![0; 15], 0)
            .expect_err("short buffer must be rejected");
        match err {
            EngineError::FrameLayout {
                expected, actual, ..
            } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn plane_slices_follow_storage_order() {
        let mut frame = Frame::filled(4, 2, PixelFormat::Yuv420p, 0, 0);
        frame.data_mut()[8..10].fill(1);
        frame.data_mut()[10..12].fill(2);
        assert_eq!(frame.plane(0).map(<[u8]>::len), Some(8));
        assert_eq!(frame.plane(1), Some(&[1u8, 1][..]));
        assert_eq!(frame.plane(2), Some(&[2u8, 2][..]));
        assert!(frame.plane(3).is_none());
    }

    #[test]
    fn ledger_counts_clone_derive_and_drop() {
        let ledger = FrameLedger::new();
        let frame = Frame::filled(2, 2, PixelFormat::Gray8, 7, 3).with_ledger(Arc::clone(&ledger));
        let copy = frame.clone();
        let bigger = frame
            .derive(4, 4, vec![0; 16])
            .expect("derive with matching size");
        assert_eq!(bigger.pts, 3);
        assert_eq!(ledger.allocated(), 3);
        assert_eq!(ledger.live(), 3);

        drop(frame);
        drop(copy);
        let bytes = bigger.into_data();
        assert_eq!(bytes.len(), 16);
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.released(), ledger.allocated());
    }

    #[test]
    fn frame_buffer_reports_exhaustion() {
        let buf = frame_buffer(PixelFormat::Yuv420p.byte_size(4, 4)).expect("small buffer");
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 24);

        let err = frame_buffer(usize::MAX).expect_err("capacity overflow");
        assert!(matches!(err, EngineError::ResourceExhausted(_)));
        assert_eq!(err.error_code(), 500);
    }

    #[test]
    fn packet_rescale_keeps_missing_timestamps() {
        let mut packet = Packet {
            stream_index: 0,
            pts: Some(96_000),
            dts: None,
            duration: 1024,
            data: vec![1, 2, 3],
            is_keyframe: true,
        };
        packet.rescale_ts(Rational::new(1, 48_000), Rational::new(1, 1000));
        assert_eq!(packet.pts, Some(2000));
        assert_eq!(packet.dts, None);
        assert_eq!(packet.duration, 21);
    }
}
