//! Response envelopes.
//!
//! Every server reply is wrapped so the caller can tell an application-level
//! failure from a successful response without knowing the response type:
//!
//! - text formats: `["ok", <response>]` or `["err", <message>]`
//! - binary: `0x00` followed by the response bytes, or `0x01` followed by a
//!   varint length and a UTF-8 message.
//!
//! A reply that fits neither shape is [`SkirError::MalformedPayload`].

use crate::codec::binary::{read_varint, write_varint};
use crate::codec::Payload;
use crate::error::{constants, Result, SkirError};
use serde_json::Value;

const OK_BYTE: u8 = 0x00;
const ERR_BYTE: u8 = 0x01;

/// An opened response envelope.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reply {
    /// The handler succeeded; the encoded response follows.
    Success(Payload),
    /// The server reported a failure message.
    Failure(String),
}

/// Wrap an encoded response in a success envelope.
pub(crate) fn seal_ok(response: Payload) -> Payload {
    match response {
        Payload::Text(code) => Payload::Text(format!(r#"["ok",{code}]"#)),
        Payload::Binary(bytes) => {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(OK_BYTE);
            out.extend_from_slice(&bytes);
            Payload::Binary(out)
        }
    }
}

/// Wrap a failure message in an error envelope, text or binary to match the
/// request format.
pub(crate) fn seal_err(message: &str, text: bool) -> Payload {
    if text {
        // serde escapes the message.
        Payload::Text(
            serde_json::to_string(&("err", message))
                .unwrap_or_else(|_| r#"["err","unencodable error message"]"#.to_string()),
        )
    } else {
        let bytes = message.as_bytes();
        let mut out = Vec::with_capacity(bytes.len() + 2);
        out.push(ERR_BYTE);
        write_varint(&mut out, bytes.len() as u64);
        out.extend_from_slice(bytes);
        Payload::Binary(out)
    }
}

/// Open a response envelope.
pub(crate) fn open(payload: &Payload) -> Result<Reply> {
    match payload {
        Payload::Text(code) => {
            let parsed: Value = serde_json::from_str(code)
                .map_err(|_| SkirError::malformed(constants::ERR_BAD_ENVELOPE))?;
            let Some([tag, body]) = parsed.as_array().map(Vec::as_slice).and_then(|parts| {
                <&[Value; 2]>::try_from(parts).ok()
            }) else {
                return Err(SkirError::malformed(constants::ERR_BAD_ENVELOPE));
            };
            match tag.as_str() {
                Some("ok") => Ok(Reply::Success(Payload::Text(body.to_string()))),
                Some("err") => {
                    let message = body
                        .as_str()
                        .ok_or_else(|| SkirError::malformed(constants::ERR_BAD_ENVELOPE))?;
                    Ok(Reply::Failure(message.to_string()))
                }
                _ => Err(SkirError::malformed(constants::ERR_BAD_ENVELOPE)),
            }
        }
        Payload::Binary(bytes) => match bytes.split_first() {
            Some((&OK_BYTE, rest)) => Ok(Reply::Success(Payload::Binary(rest.to_vec()))),
            Some((&ERR_BYTE, mut rest)) => {
                let len = read_varint(&mut rest)
                    .map_err(|_| SkirError::malformed(constants::ERR_BAD_ENVELOPE))?;
                if len != rest.len() as u64 {
                    return Err(SkirError::malformed(constants::ERR_BAD_ENVELOPE));
                }
                let message = std::str::from_utf8(rest)
                    .map_err(|_| SkirError::malformed(constants::ERR_BAD_ENVELOPE))?;
                Ok(Reply::Failure(message.to_string()))
            }
            _ => Err(SkirError::malformed(constants::ERR_BAD_ENVELOPE)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_envelopes_roundtrip() {
        let sealed = seal_ok(Payload::Text("[42,\"John Doe\"]".to_string()));
        assert_eq!(sealed.as_text(), Some(r#"["ok",[42,"John Doe"]]"#));
        assert_eq!(
            open(&sealed).expect("open"),
            Reply::Success(Payload::Text("[42,\"John Doe\"]".to_string()))
        );

        let failure = seal_err("no such \"user\"", true);
        assert_eq!(
            open(&failure).expect("open"),
            Reply::Failure("no such \"user\"".to_string())
        );
    }

    #[test]
    fn binary_envelopes_roundtrip() {
        let sealed = seal_ok(Payload::Binary(vec![0x01, 0x54]));
        assert_eq!(sealed.as_binary(), Some(&[0x00, 0x01, 0x54][..]));
        assert_eq!(
            open(&sealed).expect("open"),
            Reply::Success(Payload::Binary(vec![0x01, 0x54]))
        );

        let failure = seal_err("boom", false);
        assert_eq!(failure.as_binary(), Some(&b"\x01\x04boom"[..]));
        assert_eq!(open(&failure).expect("open"), Reply::Failure("boom".to_string()));
    }

    #[test]
    fn malformed_envelopes_rejected() {
        for payload in [
            Payload::Text("[42]".to_string()),
            Payload::Text(r#"["maybe",1]"#.to_string()),
            Payload::Text("not json".to_string()),
            Payload::Binary(vec![]),
            Payload::Binary(vec![0x02, 0x00]),
            // Declared length disagrees with the actual message.
            Payload::Binary(vec![0x01, 0x09, b'x']),
        ] {
            assert!(
                matches!(open(&payload), Err(SkirError::MalformedPayload(_))),
                "{payload:?} should be rejected"
            );
        }
    }
}
