//! Variable binding (VarBind) type.
//!
//! A VarBind pairs an OID with a value.

use crate::codec::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a Null value.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode as `type(2) reserved(2) name data` (RFC 2741 §5.4).
    pub fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u16(self.value.type_code());
        buf.push_reserved(2);
        buf.push_oid(&self.oid, false)?;
        self.value.encode_data(buf)
    }

    /// Decode one varbind.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let type_code = decoder.read_u16()?;
        decoder.skip(2)?;
        let (oid, _) = decoder.read_oid()?;
        let value = Value::decode_data(type_code, decoder)?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a VarBindList (varbinds back to back, no count prefix).
pub(crate) fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) -> Result<()> {
    for vb in varbinds {
        vb.encode(buf)?;
    }
    Ok(())
}

/// Decode varbinds until the decoder is exhausted.
pub(crate) fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut varbinds = Vec::new();
    while !decoder.is_empty() {
        varbinds.push(VarBind::decode(decoder)?);
    }
    Ok(varbinds)
}
