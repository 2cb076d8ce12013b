//! `tokio_util` codec wrapper for the device wire protocol.
//!
//! The physical link delivers one complete message per buffered chunk,
//! so the decoder treats everything currently in the read buffer as a
//! single datagram. Framing (length prefixes, delimiters) belongs to
//! the payload-layout follow-up along with the rest of the byte format.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::device::protocol::{self, DeviceMessage};
use crate::error::WorkbenchError;

/// Codec for [`DeviceMessage`] over a framed byte transport.
#[derive(Debug, Default)]
pub struct DeviceCodec;

impl Decoder for DeviceCodec {
    type Item = DeviceMessage;
    type Error = WorkbenchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split_to(src.len());
        Ok(protocol::decode(&datagram))
    }
}

impl Encoder<DeviceMessage> for DeviceCodec {
    type Error = WorkbenchError;

    fn encode(&mut self, item: DeviceMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&protocol::encode(&item));
        Ok(())
    }
}
