// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wire encoding of schema messages.
//!
//! A definitions update is a 4-byte record count followed by that many
//! self-delimiting mutation records in batch order. Each record carries a
//! fixed header (change-kind tag, timestamp, length-prefixed target names)
//! and a length-prefixed definition payload, so the encoded size of a batch
//! is computable without serializing anything.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::schema::mutation::{ChangeKind, MutationBatch, QualifiedName, SchemaMutation};
use crate::time::MicrosSinceEpoch;

use super::{ProtocolVersion, SchemaMessage, TargetName};

/// Declared record counts above this are rejected before any allocation.
pub const MAX_MUTATIONS_PER_BATCH: usize = 1 << 16;
/// Declared payload lengths above this are rejected before any allocation.
pub const MAX_PAYLOAD_LEN: usize = 1 << 26;

const COUNT_SIZE: usize = 4;
// kind tag, timestamp, keyspace length, name length, payload length
const RECORD_HEADER_SIZE: usize = 1 + 8 + 2 + 2 + 4;

static_assertions::const_assert!(MAX_PAYLOAD_LEN < u32::MAX as usize);

const MSG_DEFINITIONS_REQUEST: u8 = 0;
const MSG_DEFINITIONS_UPDATE: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("corrupt mutation stream: {0}")]
    CorruptStream(&'static str),
    #[error("unknown change kind tag: {0}")]
    UnknownChangeKind(u8),
    #[error("unknown message tag: {0}")]
    UnknownMessage(u8),
    #[error("malformed definition payload: {0}")]
    Payload(String),
}

pub trait Targeted {
    const TARGET: TargetName;

    fn target(&self) -> TargetName {
        Self::TARGET
    }

    fn kind(&self) -> &'static str;
}

pub trait WireEncode {
    /// Exact number of bytes [`WireEncode::encode_to_bytes`] produces,
    /// computed without serializing.
    fn encoded_size(&self, protocol_version: ProtocolVersion) -> usize;

    fn encode_to_bytes(&self, protocol_version: ProtocolVersion) -> Bytes;
}

pub trait WireDecode {
    type Error;

    fn try_decode(buf: impl Buf, protocol_version: ProtocolVersion) -> Result<Self, Self::Error>
    where
        Self: Sized;
}

impl WireEncode for SchemaMessage {
    fn encoded_size(&self, protocol_version: ProtocolVersion) -> usize {
        1 + match self {
            SchemaMessage::DefinitionsRequest => 0,
            SchemaMessage::DefinitionsUpdate(batch) => batch.encoded_size(protocol_version),
        }
    }

    fn encode_to_bytes(&self, protocol_version: ProtocolVersion) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size(protocol_version));
        match self {
            SchemaMessage::DefinitionsRequest => buf.put_u8(MSG_DEFINITIONS_REQUEST),
            SchemaMessage::DefinitionsUpdate(batch) => {
                buf.put_u8(MSG_DEFINITIONS_UPDATE);
                batch.encode(&mut buf, protocol_version);
            }
        }
        buf.freeze()
    }
}

impl WireDecode for SchemaMessage {
    type Error = CodecError;

    fn try_decode(mut buf: impl Buf, protocol_version: ProtocolVersion) -> Result<Self, CodecError> {
        if buf.remaining() < 1 {
            return Err(CodecError::CorruptStream("truncated message tag"));
        }
        match buf.get_u8() {
            MSG_DEFINITIONS_REQUEST => Ok(SchemaMessage::DefinitionsRequest),
            MSG_DEFINITIONS_UPDATE => Ok(SchemaMessage::DefinitionsUpdate(MutationBatch::decode(
                buf,
                protocol_version,
            )?)),
            tag => Err(CodecError::UnknownMessage(tag)),
        }
    }
}

impl MutationBatch {
    /// Size of the count field plus every record's encoded size.
    pub fn encoded_size(&self, _protocol_version: ProtocolVersion) -> usize {
        COUNT_SIZE + self.iter().map(SchemaMutation::encoded_size).sum::<usize>()
    }

    pub fn encode(&self, buf: &mut impl BufMut, _protocol_version: ProtocolVersion) {
        buf.put_u32(self.len() as u32);
        for mutation in self.iter() {
            mutation.encode(buf);
        }
    }

    pub fn decode(mut buf: impl Buf, _protocol_version: ProtocolVersion) -> Result<Self, CodecError> {
        if buf.remaining() < COUNT_SIZE {
            return Err(CodecError::CorruptStream("truncated record count"));
        }
        let count = buf.get_u32() as usize;
        if count > MAX_MUTATIONS_PER_BATCH {
            return Err(CodecError::CorruptStream("implausible record count"));
        }
        let mut mutations = Vec::with_capacity(count);
        for _ in 0..count {
            mutations.push(SchemaMutation::decode(&mut buf)?);
        }
        Ok(MutationBatch::new(mutations))
    }
}

impl SchemaMutation {
    fn encoded_size(&self) -> usize {
        RECORD_HEADER_SIZE + self.target.keyspace.len() + self.target.name.len() + self.payload.len()
    }

    fn encode(&self, buf: &mut impl BufMut) {
        debug_assert!(self.target.keyspace.len() <= u16::MAX as usize);
        debug_assert!(self.target.name.len() <= u16::MAX as usize);
        debug_assert!(self.payload.len() <= MAX_PAYLOAD_LEN);

        buf.put_u8(self.kind.wire_tag());
        buf.put_u64(self.timestamp.as_u64());
        buf.put_u16(self.target.keyspace.len() as u16);
        buf.put_slice(self.target.keyspace.as_bytes());
        buf.put_u16(self.target.name.len() as u16);
        buf.put_slice(self.target.name.as_bytes());
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, CodecError> {
        if buf.remaining() < RECORD_HEADER_SIZE {
            return Err(CodecError::CorruptStream("truncated record header"));
        }
        let tag = buf.get_u8();
        let kind = ChangeKind::from_wire_tag(tag).ok_or(CodecError::UnknownChangeKind(tag))?;
        let timestamp = MicrosSinceEpoch::new(buf.get_u64());
        let keyspace = decode_string(buf)?;
        let name = decode_string(buf)?;

        if buf.remaining() < 4 {
            return Err(CodecError::CorruptStream("truncated payload length"));
        }
        let payload_len = buf.get_u32() as usize;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(CodecError::CorruptStream("implausible payload length"));
        }
        if buf.remaining() < payload_len {
            return Err(CodecError::CorruptStream("truncated payload"));
        }
        let payload = buf.copy_to_bytes(payload_len);

        Ok(SchemaMutation {
            kind,
            target: QualifiedName { keyspace, name },
            timestamp,
            payload,
        })
    }
}

fn decode_string(buf: &mut impl Buf) -> Result<String, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::CorruptStream("truncated name length"));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(CodecError::CorruptStream("truncated name"));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| CodecError::CorruptStream("non-utf8 name"))
}

#[cfg(test)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    use crate::schema::definitions::{ColumnKind, KeyspaceDef, TableDef};

    fn sample_batch() -> MutationBatch {
        let ts = MicrosSinceEpoch::new(1_700_000_000_000_000);
        let table = TableDef::new("ks1", "t1").with_column("pk", "uuid", ColumnKind::Partition);
        MutationBatch::new(vec![
            SchemaMutation::create_keyspace(ts, &KeyspaceDef::new("ks1")),
            SchemaMutation::create_table(ts, &table),
            SchemaMutation::drop_table(ts, "ks1", "t0"),
        ])
    }

    #[test]
    fn batch_round_trip_preserves_content_and_order() {
        let batch = sample_batch();
        let message = SchemaMessage::DefinitionsUpdate(batch.clone());
        let bytes = message.encode_to_bytes(ProtocolVersion::V2);
        let decoded = SchemaMessage::try_decode(bytes, ProtocolVersion::V2).unwrap();
        assert_that!(decoded, eq(&SchemaMessage::DefinitionsUpdate(batch)));
    }

    #[test]
    fn request_round_trip() {
        let bytes = SchemaMessage::DefinitionsRequest.encode_to_bytes(ProtocolVersion::V2);
        assert_eq!(1, bytes.len());
        let decoded = SchemaMessage::try_decode(bytes, ProtocolVersion::V2).unwrap();
        assert_eq!(SchemaMessage::DefinitionsRequest, decoded);
    }

    #[test]
    fn encoded_size_is_exact() {
        let batch = sample_batch();
        let mut buf = BytesMut::new();
        batch.encode(&mut buf, ProtocolVersion::V2);
        assert_eq!(batch.encoded_size(ProtocolVersion::V2), buf.len());
    }

    #[test]
    fn implausible_count_is_rejected_before_allocating() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        assert!(matches!(
            MutationBatch::decode(buf.freeze(), ProtocolVersion::V2),
            Err(CodecError::CorruptStream("implausible record count"))
        ));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let batch = sample_batch();
        let mut buf = BytesMut::new();
        batch.encode(&mut buf, ProtocolVersion::V2);
        let truncated = buf.freeze().slice(..batch.encoded_size(ProtocolVersion::V2) - 10);
        assert!(matches!(
            MutationBatch::decode(truncated, ProtocolVersion::V2),
            Err(CodecError::CorruptStream(_))
        ));
    }

    #[test]
    fn unknown_change_kind_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(1);
        buf.put_u8(200);
        buf.put_slice(&[0u8; 32]);
        assert!(matches!(
            MutationBatch::decode(buf.freeze(), ProtocolVersion::V2),
            Err(CodecError::UnknownChangeKind(200))
        ));
    }
}
