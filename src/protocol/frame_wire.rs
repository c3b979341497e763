//! Framelet container codec (component A).
//!
//! A frame on the wire is a `count: u16` followed by that many framelets,
//! each `type: u16, length: u32, bytes`: an ordered sequence of typed,
//! independently-lengthed segments.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

pub const HEADERS: u16 = 0x4844;
pub const PAYLOAD_DATA: u16 = 0x4450;
pub const LAYER_DATA: u16 = 0x4C44;
pub const CONFIG: u16 = 0x434E;
pub const PROTOCOL_ERROR: u16 = 0x4550;

/// A framelet's declared type. `Unknown` carries the raw code through so a
/// peer running a newer protocol revision is rejected explicitly rather than
/// silently misparsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameletType {
    Headers,
    PayloadData,
    LayerData,
    Config,
    ProtocolError,
    Unknown(u16),
}

impl FrameletType {
    pub fn from_code(code: u16) -> Self {
        match code {
            HEADERS => Self::Headers,
            PAYLOAD_DATA => Self::PayloadData,
            LAYER_DATA => Self::LayerData,
            CONFIG => Self::Config,
            PROTOCOL_ERROR => Self::ProtocolError,
            other => Self::Unknown(other),
        }
    }

    pub fn to_code(self) -> u16 {
        match self {
            Self::Headers => HEADERS,
            Self::PayloadData => PAYLOAD_DATA,
            Self::LayerData => LAYER_DATA,
            Self::Config => CONFIG,
            Self::ProtocolError => PROTOCOL_ERROR,
            Self::Unknown(code) => code,
        }
    }
}

/// One typed, length-tagged segment. `contents` is a zero-copy view into
/// the frame's receive buffer (a cheap refcounted `Bytes` slice, not a copy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framelet {
    pub kind: FrameletType,
    pub contents: Bytes,
}

impl Framelet {
    pub fn new(kind: FrameletType, contents: impl Into<Bytes>) -> Self {
        Self { kind, contents: contents.into() }
    }
}

/// An ordered, nonempty sequence of framelets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub framelets: Vec<Framelet>,
}

impl Frame {
    pub fn new(framelets: Vec<Framelet>) -> Self {
        Self { framelets }
    }

    pub fn is_empty(&self) -> bool {
        self.framelets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.framelets.len()
    }

    pub fn get(&self, index: usize) -> Option<&Framelet> {
        self.framelets.get(index)
    }
}

pub const MAX_FRAMELET_LEN: u32 = 64 * 1024 * 1024;
pub const MAX_FRAMELETS: u16 = 4096;

#[derive(Debug, Error)]
pub enum FrameletError {
    #[error("frame declares zero framelets")]
    EmptyFrame,
    #[error("framelet count {0} exceeds maximum {MAX_FRAMELETS}")]
    TooManyFramelets(u16),
    #[error("framelet length {declared} exceeds maximum {max}")]
    FrameletTooLarge { declared: u32, max: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// `tokio_util` codec for the framelet container. Returns `Ok(None)` on a
/// short buffer rather than erroring, and only advances `src` once a
/// complete frame is present.
pub struct FrameContainerCodec;

impl Decoder for FrameContainerCodec {
    type Item = Frame;
    type Error = FrameletError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameletError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let count = (&src[0..2]).get_u16_le();
        if count == 0 {
            return Err(FrameletError::EmptyFrame);
        }
        if count > MAX_FRAMELETS {
            return Err(FrameletError::TooManyFramelets(count));
        }

        let mut offset = 2usize;
        let mut specs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if src.len() < offset + 6 {
                return Ok(None);
            }
            let mut head = &src[offset..offset + 6];
            let type_code = head.get_u16_le();
            let length = head.get_u32_le();
            if length > MAX_FRAMELET_LEN {
                return Err(FrameletError::FrameletTooLarge { declared: length, max: MAX_FRAMELET_LEN });
            }
            let body_start = offset + 6;
            let body_end = body_start + length as usize;
            if src.len() < body_end {
                return Ok(None);
            }
            specs.push((FrameletType::from_code(type_code), body_start, body_end));
            offset = body_end;
        }

        // Split off the whole consumed region as one owned buffer, then hand
        // each framelet a cheap `.slice()` view into it. No byte is copied.
        let whole = src.split_to(offset).freeze();
        let framelets = specs
            .into_iter()
            .map(|(kind, start, end)| Framelet { kind, contents: whole.slice(start..end) })
            .collect();
        Ok(Some(Frame::new(framelets)))
    }
}

impl Encoder<Frame> for FrameContainerCodec {
    type Error = FrameletError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameletError> {
        if frame.framelets.is_empty() {
            return Err(FrameletError::EmptyFrame);
        }
        if frame.framelets.len() > MAX_FRAMELETS as usize {
            return Err(FrameletError::TooManyFramelets(frame.framelets.len() as u16));
        }
        dst.put_u16_le(frame.framelets.len() as u16);
        for framelet in frame.framelets {
            dst.put_u16_le(framelet.kind.to_code());
            dst.put_u32_le(framelet.contents.len() as u32);
            dst.extend_from_slice(&framelet.contents);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) -> Frame {
        let mut codec = FrameContainerCodec;
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        codec.decode(&mut buf).unwrap().expect("complete frame")
    }

    #[test]
    fn roundtrips_a_single_framelet_frame() {
        let frame = Frame::new(vec![Framelet::new(FrameletType::Headers, Bytes::from_static(b"hello"))]);
        let decoded = roundtrip(frame.clone());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn roundtrips_a_multi_framelet_frame() {
        let frame = Frame::new(vec![
            Framelet::new(FrameletType::Headers, Bytes::from_static(b"h")),
            Framelet::new(FrameletType::LayerData, Bytes::from_static(b"l")),
            Framelet::new(FrameletType::PayloadData, Bytes::from_static(b"p")),
        ]);
        let decoded = roundtrip(frame.clone());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_returns_none_on_partial_header() {
        let mut codec = FrameContainerCodec;
        let mut buf = BytesMut::from(&[0x01, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_returns_none_on_partial_body() {
        let mut codec = FrameContainerCodec;
        let mut buf = BytesMut::new();
        buf.put_u16_le(1);
        buf.put_u16_le(HEADERS);
        buf.put_u32_le(10);
        buf.extend_from_slice(b"short");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_zero_framelet_count() {
        let mut codec = FrameContainerCodec;
        let mut buf = BytesMut::new();
        buf.put_u16_le(0);
        assert!(matches!(codec.decode(&mut buf), Err(FrameletError::EmptyFrame)));
    }

    #[test]
    fn decode_rejects_oversized_framelet() {
        let mut codec = FrameContainerCodec;
        let mut buf = BytesMut::new();
        buf.put_u16_le(1);
        buf.put_u16_le(PAYLOAD_DATA);
        buf.put_u32_le(MAX_FRAMELET_LEN + 1);
        assert!(matches!(codec.decode(&mut buf), Err(FrameletError::FrameletTooLarge { .. })));
    }

    #[test]
    fn unknown_framelet_type_round_trips_its_raw_code() {
        assert_eq!(FrameletType::from_code(0xFFFF), FrameletType::Unknown(0xFFFF));
        assert_eq!(FrameletType::Unknown(0xFFFF).to_code(), 0xFFFF);
    }
}
