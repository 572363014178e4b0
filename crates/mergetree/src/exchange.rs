//! Per-peer data-exchange protocol shapes (spec §6.2). The MergeTree sits
//! behind a duplex byte stream to each peer; this module only models the
//! message shapes and the length-prefixed version framing a transport
//! would use. Actually dialing a socket, doing the authenticated
//! handshake, and driving the control/data channels concurrently is a
//! transport concern left to the host (spec §1 Out-of-scope: "Transport
//! ... and on-the-wire BSON encoding").

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::{Buf, BufMut, BytesMut};
use perspectivedb_primitives::{Version, VersionId};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

/// A control-channel request (line-delimited JSON), spec §6.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlRequest {
    /// Most recent local version for an upstream id (the raw
    /// `<collection> || 0x01 || <raw id>` byte composite the glossary
    /// defines, the same shape `PrefixExists.prefix` and
    /// `DataRequest::StartAfter.v` use); `None` means "any".
    Latest {
        #[serde(default, with = "opt_base64_bytes")]
        id: Option<Vec<u8>>,
    },
    /// Whether any version exists whose id starts with the given prefix.
    PrefixExists {
        #[serde(rename = "prefixExists", with = "base64_bytes")]
        prefix: Vec<u8>,
    },
}

/// A control-channel response: a length-prefixed encoded version, or
/// nothing found.
#[derive(Debug, Clone)]
pub enum ControlResponse {
    Found(Version),
    NotFound,
}

/// The one-shot data-channel handshake each side sends before streaming
/// (spec §6.2): whether to send at all, and if so, from where.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DataRequest {
    #[serde(rename = "no_start")]
    DoNotStart,
    #[serde(rename = "start_all")]
    StartFromBeginning,
    #[serde(rename = "start_after")]
    StartAfter {
        #[serde(with = "base64_bytes")]
        v: Vec<u8>,
    },
}

impl DataRequest {
    #[must_use]
    pub fn resume_after(v: &VersionId) -> Self {
        Self::StartAfter { v: v.as_bytes().to_vec() }
    }
}

mod base64_bytes {
    use super::{Engine, BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

mod opt_base64_bytes {
    use super::{Engine, BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => ser.serialize_some(&BASE64.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(de)?;
        s.map(|s| BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Length-prefixed framing for the data channel's stream of encoded
/// versions: a 4-byte big-endian length followed by the borsh encoding of
/// one [`Version`]. Grounded on `calimero-network-core`'s length-prefixed
/// frame codec for its own peer-to-peer stream.
#[derive(Debug, Default)]
pub struct VersionCodec {
    next_len: Option<u32>,
}

const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame length {0} exceeds the maximum of {} bytes", MAX_FRAME_LEN)]
    FrameTooLarge(u32),
    #[error("failed to decode a version from its frame: {0}")]
    Decode(#[from] std::io::Error),
}

impl Encoder<Version> for VersionCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Version, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = borsh::to_vec(&item).expect("Version encodes infallibly");
        dst.put_u32(bytes.len() as u32);
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

impl Decoder for VersionCodec {
    type Item = Version;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Version>, Self::Error> {
        let len = match self.next_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = src.get_u32();
                if len > MAX_FRAME_LEN {
                    return Err(CodecError::FrameTooLarge(len));
                }
                self.next_len = Some(len);
                len
            }
        };

        if src.len() < len as usize {
            src.reserve(len as usize - src.len());
            return Ok(None);
        }

        let frame = src.split_to(len as usize);
        self.next_len = None;
        let version = borsh::from_slice(&frame)
            .map_err(|e| CodecError::Decode(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        Ok(Some(version))
    }
}
