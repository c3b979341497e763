//! Outbound framer (component F): assembles the canonical frame shape,
//! `Headers, [LayerData], PayloadData` for request/response/event frames,
//! or a single `Config`/`ProtocolError` framelet for the control frames.

use bytes::Bytes;

use crate::protocol::error_record::ProtocolErrorRecord;
use crate::protocol::frame_wire::{Frame, Framelet, FrameletType};
use crate::protocol::header::{Header, PayloadType};

pub fn build_frame(
    request_id: u32,
    method: &str,
    kind: PayloadType,
    error_code: i32,
    payload: Bytes,
    layer_data: Option<Bytes>,
) -> Frame {
    let header = Header { request_id, payload_type: kind, method_name: method.to_string(), error_code };
    let mut framelets = vec![Framelet::new(FrameletType::Headers, header.encode())];
    if let Some(layer) = layer_data {
        framelets.push(Framelet::new(FrameletType::LayerData, layer));
    }
    framelets.push(Framelet::new(FrameletType::PayloadData, payload));
    Frame::new(framelets)
}

pub fn build_config_frame(record_bytes: Bytes) -> Frame {
    Frame::new(vec![Framelet::new(FrameletType::Config, record_bytes)])
}

pub fn build_protocol_error_frame(record: &ProtocolErrorRecord) -> Frame {
    Frame::new(vec![Framelet::new(FrameletType::ProtocolError, record.encode())])
}
