//! Payload codecs.
//!
//! Requests and replies are JSON so any NATS client can talk to a flight.
//! MessagePack (named fields) is available for bulk payloads such as
//! snapshots and event streams.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::NetError;

/// Encode a value to MessagePack bytes with named fields.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec_named(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

/// Payload encoding for published messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Codec {
    #[default]
    Json,
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl Codec {
    /// The name used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MessagePack => "msgpack",
        }
    }

    /// Encode `value` in this format.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, NetError> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::MessagePack => encode(value),
        }
    }

    /// Decode a value in this format.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, NetError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::MessagePack => decode(bytes),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Codec::Json),
            "msgpack" | "messagepack" => Ok(Codec::MessagePack),
            other => Err(format!("unknown codec {other:?} (expected json or msgpack)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        tick_id: u64,
        name: String,
    }

    #[test]
    fn test_msgpack_keeps_field_names() {
        let bytes = encode(&Sample {
            tick_id: 3,
            name: "alpha".into(),
        })
        .unwrap();
        let as_map: serde_json::Value = decode(&bytes).unwrap();
        assert_eq!(as_map["tickId"], 3);
    }

    #[test]
    fn test_codecs_agree() {
        let sample = Sample {
            tick_id: 9,
            name: "beta".into(),
        };
        for codec in [Codec::Json, Codec::MessagePack] {
            let bytes = codec.encode(&sample).unwrap();
            assert_eq!(codec.decode::<Sample>(&bytes).unwrap(), sample, "{codec}");
        }
    }

    #[test]
    fn test_decode_invalid_bytes() {
        assert!(Codec::MessagePack.decode::<Sample>(&[0xFF, 0xFF]).is_err());
        assert!(matches!(
            Codec::Json.decode::<Sample>(b"{\"tickId\":"),
            Err(NetError::Json(_))
        ));
    }

    #[test]
    fn test_parse_codec() {
        assert_eq!("msgpack".parse::<Codec>().unwrap(), Codec::MessagePack);
        assert!("xml".parse::<Codec>().is_err());
    }
}
