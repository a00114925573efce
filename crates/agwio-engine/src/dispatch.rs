//! Inbound frame dispatch.
//!
//! Each reassembled frame is validated against the kind catalog, decoded
//! per kind, and routed to the currently active receive handler. A bad
//! frame or a faulty handler affects only that frame; the receive loop
//! keeps running.

use std::panic::{self, AssertUnwindSafe};

use bytes::Buf;
use tracing::{error, warn};

use agwio_frame::{kind_info, Frame, HeardCall, LenRule, PortCaps};

use crate::engine::Shared;
use crate::handler::ReceiveHandler;

/// Message prefix that marks a connection notification as remote-initiated.
const INCOMING_PREFIX: &str = "*** CONNECTED To ";

pub(crate) fn dispatch(shared: &Shared, frame: &Frame) {
    let kind = frame.header.kind;
    let Some(info) = kind_info(kind) else {
        error!(%kind, "received frame error: unknown kind");
        return;
    };
    match info.recv {
        LenRule::NotPermitted => {
            error!(%kind, "received frame error: not permitted");
            return;
        }
        LenRule::Fixed(expected) if frame.header.data_len != expected => {
            error!(
                %kind,
                received = frame.header.data_len,
                expected,
                "received frame error: wrong data length"
            );
            return;
        }
        _ => {}
    }

    let handler = shared.active_handler();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        deliver(shared, handler.as_ref(), frame)
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(%kind, %err, "received frame error"),
        Err(_) => error!(%kind, "received frame error: handler panicked"),
    }
}

#[derive(Debug, thiserror::Error)]
enum DeliverError {
    #[error("payload is not valid utf-8")]
    Utf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Frame(#[from] agwio_frame::FrameError),
}

/// Decode the payload for one validated frame and invoke the matching
/// handler method.
fn deliver(
    shared: &Shared,
    handler: &dyn ReceiveHandler,
    frame: &Frame,
) -> Result<(), DeliverError> {
    let header = &frame.header;
    let data = frame.payload.as_ref();
    match header.kind {
        'R' => {
            let mut buf = data;
            let major = buf.get_u16_le();
            buf.advance(2);
            let minor = buf.get_u16_le();
            shared.cache_version(major, minor);
            handler.version_info(major, minor);
        }
        'X' => {
            let success = data[0] != 0;
            if success {
                shared.register_confirmed(&header.call_from);
            }
            handler.callsign_registered(&header.call_from, success);
        }
        'G' => {
            // AGWPE sometimes sends a too-long buffer with garbage past the
            // first zero byte, so only the part before it counts.
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            let text = std::str::from_utf8(&data[..end])?;
            let mut fields = text.split(';');
            // The first field is the port count.
            fields.next();
            let info: Vec<String> = fields
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            shared.cache_port_info(info.clone());
            handler.port_info(&info);
        }
        'g' => {
            let caps = PortCaps::decode(data)?;
            shared.cache_port_caps(header.port, caps);
            handler.port_caps(header.port, &caps);
        }
        'H' => {
            let heard = HeardCall::decode(data);
            handler.callsign_heard_on_port(header.port, heard.as_ref());
        }
        'C' => {
            let message = std::str::from_utf8(data)?;
            let incoming = message.starts_with(INCOMING_PREFIX);
            handler.connection_received(
                header.port,
                &header.call_from,
                &header.call_to,
                incoming,
                message,
            );
        }
        'D' => {
            handler.connected_data(
                header.port,
                &header.call_from,
                &header.call_to,
                header.pid,
                data,
            );
        }
        'd' => {
            let message = std::str::from_utf8(data)?;
            handler.disconnected(header.port, &header.call_from, &header.call_to, message);
        }
        'Y' => {
            let mut buf = data;
            let frames = buf.get_u32_le();
            handler.frames_waiting_on_connection(
                header.port,
                &header.call_from,
                &header.call_to,
                frames,
            );
        }
        'y' => {
            let mut buf = data;
            let frames = buf.get_u32_le();
            handler.frames_waiting_on_port(header.port, frames);
        }
        'I' => {
            let (text, body) = parse_monitor_data(data);
            handler.monitored_connected(
                header.port,
                &header.call_from,
                &header.call_to,
                text.as_deref(),
                body,
            );
        }
        'S' => {
            let (text, _body) = parse_monitor_data(data);
            handler.monitored_supervisory(
                header.port,
                &header.call_from,
                &header.call_to,
                text.as_deref(),
            );
        }
        'T' => {
            let (text, body) = parse_monitor_data(data);
            handler.monitored_own(
                header.port,
                &header.call_from,
                &header.call_to,
                text.as_deref(),
                body,
            );
        }
        'U' => {
            let (text, body) = parse_monitor_data(data);
            handler.monitored_unproto(
                header.port,
                &header.call_from,
                &header.call_to,
                text.as_deref(),
                body,
            );
        }
        'K' => handler.monitored_raw(header.port, data),
        _ => warn!(kind = %header.kind, "discarding unsupported frame"),
    }
    Ok(())
}

/// Split a monitored frame into its AGWPE text portion and data portion.
///
/// The text runs up to the first CR and normally carries a ` Len=<n> `
/// marker bounding the data that follows; without the marker, everything
/// after the CR is data. A frame with no CR at all is returned as data with
/// no text.
fn parse_monitor_data(data: &[u8]) -> (Option<String>, &[u8]) {
    let Some(cr) = data.iter().position(|&b| b == b'\r') else {
        return (None, data);
    };
    let text = String::from_utf8_lossy(&data[..cr]).into_owned();
    let rest = &data[cr + 1..];
    match monitor_len(&text) {
        Some(len) => {
            let len = len.min(rest.len());
            (Some(text), &rest[..len])
        }
        None => (Some(text), rest),
    }
}

fn monitor_len(text: &str) -> Option<usize> {
    let mut search = text;
    while let Some(idx) = search.find(" Len=") {
        let rest = &search[idx + 5..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end > 0 && rest[end..].starts_with(' ') {
            return rest[..end].parse().ok();
        }
        search = rest;
    }
    None
}
