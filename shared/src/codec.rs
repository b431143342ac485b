//! Frame encoding for packets.
//!
//! Browser clients speak JSON in WebSocket text frames. Native clients may
//! send bincode in binary frames instead; the server answers each client in
//! whichever format it last used.

use crate::Packet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Binary,
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid JSON packet: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid binary packet: {0}")]
    Binary(#[from] bincode::Error),
}

pub fn encode_text(packet: &Packet) -> Result<String, CodecError> {
    Ok(serde_json::to_string(packet)?)
}

pub fn decode_text(text: &str) -> Result<Packet, CodecError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_binary(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serialize(packet)?)
}

pub fn decode_binary(data: &[u8]) -> Result<Packet, CodecError> {
    Ok(bincode::deserialize(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Heading, OrdinanceKind, VesselPlacement};

    #[test]
    fn test_text_frame_shape() {
        let packet = Packet::Connected { client_id: 42 };
        let text = encode_text(&packet).unwrap();
        assert_eq!(text, r#"{"connected":{"clientId":42}}"#);
        assert_eq!(decode_text(&text).unwrap(), packet);
    }

    #[test]
    fn test_unit_variant_text() {
        assert_eq!(encode_text(&Packet::Disconnect).unwrap(), r#""disconnect""#);
    }

    #[test]
    fn test_binary_frame_ready() {
        let packet = Packet::Ready {
            vessels: vec![VesselPlacement {
                name: "corvette".to_string(),
                x: 3,
                y: 9,
                heading: Heading::West,
            }],
            ready: true,
        };
        let data = encode_binary(&packet).unwrap();
        assert_eq!(decode_binary(&data).unwrap(), packet);
    }

    #[test]
    fn test_binary_rejects_bad_heading() {
        let packet = Packet::Ready {
            vessels: vec![VesselPlacement {
                name: "corvette".to_string(),
                x: 3,
                y: 9,
                heading: Heading::North,
            }],
            ready: true,
        };
        let mut data = encode_binary(&packet).unwrap();
        // heading byte sits right before the trailing `ready` flag
        let heading_at = data.len() - 2;
        assert_eq!(data[heading_at], 3);
        data[heading_at] = 9;
        assert!(decode_binary(&data).is_err());
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode_text("{not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode_text(r#"{"attack":{"x":1}}"#), Err(CodecError::Json(_))));

        let valid = encode_binary(&Packet::Attack {
            attacker_id: 1,
            x: 2,
            y: 3,
            ordinance: OrdinanceKind::Area,
        })
        .unwrap();
        let truncated = &valid[..valid.len() / 2];
        assert!(matches!(decode_binary(truncated), Err(CodecError::Binary(_))));
        assert!(decode_binary(&[]).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = decode_text("[]").unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON packet"));
    }
}
