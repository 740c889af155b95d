//! Flutter standard message / method codec.
//!
//! Wire format (little-endian):
//! - one type byte per value, followed by the payload;
//! - sizes below 254 take one byte, 254 prefixes a `u16`, 255 prefixes a `u32`;
//! - float64 and typed lists are padded so their elements start at an offset
//!   aligned to the element size, counted from the start of the message.
//!
//! A method call is the method name value followed by the arguments value.
//! Replies are envelopes: `0` + value on success, `1` + code + message +
//! details on error. An empty reply means "not implemented".

use std::io::{self, Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use super::{EncodableValue, MethodResult};

const NULL: u8 = 0;
const TRUE: u8 = 1;
const FALSE: u8 = 2;
const INT32: u8 = 3;
const INT64: u8 = 4;
const LARGE_INT: u8 = 5;
const FLOAT64: u8 = 6;
const STRING: u8 = 7;
const UINT8_LIST: u8 = 8;
const INT32_LIST: u8 = 9;
const INT64_LIST: u8 = 10;
const FLOAT64_LIST: u8 = 11;
const LIST: u8 = 12;
const MAP: u8 = 13;
const FLOAT32_LIST: u8 = 14;

const ENVELOPE_SUCCESS: u8 = 0;
const ENVELOPE_ERROR: u8 = 1;

/// Deepest list/map nesting accepted when decoding. Decoding recurses, so this
/// bounds its stack use on the platform thread.
pub const MAX_NESTING_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    UnexpectedEnd,
    UnknownType(u8),
    InvalidUtf8,
    InvalidMethodName,
    InvalidEnvelope(u8),
    TrailingData(usize),
    TooDeep,
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnexpectedEnd => write!(f, "message ended unexpectedly"),
            CodecError::UnknownType(t) => write!(f, "unknown value type {}", t),
            CodecError::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            CodecError::InvalidMethodName => write!(f, "method name is not a string"),
            CodecError::InvalidEnvelope(b) => write!(f, "invalid envelope marker {}", b),
            CodecError::TrailingData(n) => write!(f, "{} unread bytes after message", n),
            CodecError::TooDeep => {
                write!(f, "value nested deeper than {} levels", MAX_NESTING_DEPTH)
            }
        }
    }
}

impl std::error::Error for CodecError {}

impl From<io::Error> for CodecError {
    fn from(_: io::Error) -> Self {
        // The reader only ever sees in-memory slices, so EOF is the only failure.
        CodecError::UnexpectedEnd
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_u16(buf: &mut Vec<u8>, v: u16) {
    let mut tmp = [0u8; 2];
    LittleEndian::write_u16(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn write_size(buf: &mut Vec<u8>, size: usize) {
    if size < 254 {
        buf.push(size as u8);
    } else if size <= u16::MAX as usize {
        buf.push(254);
        write_u16(buf, size as u16);
    } else {
        buf.push(255);
        write_u32(buf, size as u32);
    }
}

fn write_alignment(buf: &mut Vec<u8>, alignment: usize) {
    let rem = buf.len() % alignment;
    if rem != 0 {
        buf.resize(buf.len() + alignment - rem, 0);
    }
}

fn write_value(buf: &mut Vec<u8>, value: &EncodableValue) {
    match value {
        EncodableValue::Null => buf.push(NULL),
        EncodableValue::Bool(true) => buf.push(TRUE),
        EncodableValue::Bool(false) => buf.push(FALSE),
        EncodableValue::Int32(v) => {
            buf.push(INT32);
            let mut tmp = [0u8; 4];
            LittleEndian::write_i32(&mut tmp, *v);
            buf.extend_from_slice(&tmp);
        }
        EncodableValue::Int64(v) => {
            buf.push(INT64);
            let mut tmp = [0u8; 8];
            LittleEndian::write_i64(&mut tmp, *v);
            buf.extend_from_slice(&tmp);
        }
        EncodableValue::Float64(v) => {
            buf.push(FLOAT64);
            write_alignment(buf, 8);
            let mut tmp = [0u8; 8];
            LittleEndian::write_f64(&mut tmp, *v);
            buf.extend_from_slice(&tmp);
        }
        EncodableValue::String(s) => {
            buf.push(STRING);
            write_size(buf, s.len());
            buf.extend_from_slice(s.as_bytes());
        }
        EncodableValue::Uint8List(bytes) => {
            buf.push(UINT8_LIST);
            write_size(buf, bytes.len());
            buf.extend_from_slice(bytes);
        }
        EncodableValue::Int32List(items) => {
            buf.push(INT32_LIST);
            write_size(buf, items.len());
            write_alignment(buf, 4);
            let start = buf.len();
            buf.resize(start + items.len() * 4, 0);
            LittleEndian::write_i32_into(items, &mut buf[start..]);
        }
        EncodableValue::Int64List(items) => {
            buf.push(INT64_LIST);
            write_size(buf, items.len());
            write_alignment(buf, 8);
            let start = buf.len();
            buf.resize(start + items.len() * 8, 0);
            LittleEndian::write_i64_into(items, &mut buf[start..]);
        }
        EncodableValue::Float32List(items) => {
            buf.push(FLOAT32_LIST);
            write_size(buf, items.len());
            write_alignment(buf, 4);
            let start = buf.len();
            buf.resize(start + items.len() * 4, 0);
            LittleEndian::write_f32_into(items, &mut buf[start..]);
        }
        EncodableValue::Float64List(items) => {
            buf.push(FLOAT64_LIST);
            write_size(buf, items.len());
            write_alignment(buf, 8);
            let start = buf.len();
            buf.resize(start + items.len() * 8, 0);
            LittleEndian::write_f64_into(items, &mut buf[start..]);
        }
        EncodableValue::List(items) => {
            buf.push(LIST);
            write_size(buf, items.len());
            for item in items {
                write_value(buf, item);
            }
        }
        EncodableValue::Map(entries) => {
            buf.push(MAP);
            write_size(buf, entries.len());
            for (k, v) in entries {
                write_value(buf, k);
                write_value(buf, v);
            }
        }
    }
}

/// Encodes a single value as a standalone message.
pub fn encode_message(value: &EncodableValue) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, value);
    buf
}

/// Encodes a method call: name followed by arguments.
pub fn encode_method_call(method: &str, arguments: &EncodableValue) -> Vec<u8> {
    let mut buf = Vec::new();
    write_value(&mut buf, &EncodableValue::String(method.to_owned()));
    write_value(&mut buf, arguments);
    buf
}

pub fn encode_success_envelope(value: &EncodableValue) -> Vec<u8> {
    let mut buf = vec![ENVELOPE_SUCCESS];
    write_value(&mut buf, value);
    buf
}

pub fn encode_error_envelope(code: &str, message: Option<&str>, details: &EncodableValue) -> Vec<u8> {
    let mut buf = vec![ENVELOPE_ERROR];
    write_value(&mut buf, &EncodableValue::String(code.to_owned()));
    match message {
        Some(m) => write_value(&mut buf, &EncodableValue::String(m.to_owned())),
        None => buf.push(NULL),
    }
    write_value(&mut buf, details);
    buf
}

/// Encodes the reply for a handled call. `NotImplemented` is the empty reply.
pub fn encode_result(result: &MethodResult) -> Vec<u8> {
    match result {
        MethodResult::Success(value) => encode_success_envelope(value),
        MethodResult::Error {
            code,
            message,
            details,
        } => encode_error_envelope(code, Some(message), details),
        MethodResult::NotImplemented => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn read_size(&mut self) -> Result<usize, CodecError> {
        Ok(match self.cursor.read_u8()? {
            254 => self.cursor.read_u16::<LittleEndian>()? as usize,
            255 => self.cursor.read_u32::<LittleEndian>()? as usize,
            n => n as usize,
        })
    }

    fn read_alignment(&mut self, alignment: u64) -> Result<(), CodecError> {
        let rem = self.cursor.position() % alignment;
        if rem != 0 {
            let skip = alignment - rem;
            if (self.remaining() as u64) < skip {
                return Err(CodecError::UnexpectedEnd);
            }
            self.cursor.set_position(self.cursor.position() + skip);
        }
        Ok(())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEnd);
        }
        let mut out = vec![0u8; len];
        self.cursor.read_exact(&mut out)?;
        Ok(out)
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_size()?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Checks that `count` elements of `width` bytes fit before allocating.
    fn ensure_elements(&self, count: usize, width: usize) -> Result<(), CodecError> {
        match count.checked_mul(width) {
            Some(total) if total <= self.remaining() => Ok(()),
            _ => Err(CodecError::UnexpectedEnd),
        }
    }

    fn read_value(&mut self) -> Result<EncodableValue, CodecError> {
        self.read_nested(0)
    }

    fn read_nested(&mut self, depth: usize) -> Result<EncodableValue, CodecError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(CodecError::TooDeep);
        }
        let tag = self.cursor.read_u8()?;
        let value = match tag {
            NULL => EncodableValue::Null,
            TRUE => EncodableValue::Bool(true),
            FALSE => EncodableValue::Bool(false),
            INT32 => EncodableValue::Int32(self.cursor.read_i32::<LittleEndian>()?),
            INT64 => EncodableValue::Int64(self.cursor.read_i64::<LittleEndian>()?),
            LARGE_INT => EncodableValue::String(self.read_string()?),
            FLOAT64 => {
                self.read_alignment(8)?;
                EncodableValue::Float64(self.cursor.read_f64::<LittleEndian>()?)
            }
            STRING => EncodableValue::String(self.read_string()?),
            UINT8_LIST => {
                let len = self.read_size()?;
                EncodableValue::Uint8List(self.read_bytes(len)?)
            }
            INT32_LIST => {
                let len = self.read_size()?;
                self.read_alignment(4)?;
                self.ensure_elements(len, 4)?;
                let mut items = vec![0i32; len];
                self.cursor.read_i32_into::<LittleEndian>(&mut items)?;
                EncodableValue::Int32List(items)
            }
            INT64_LIST => {
                let len = self.read_size()?;
                self.read_alignment(8)?;
                self.ensure_elements(len, 8)?;
                let mut items = vec![0i64; len];
                self.cursor.read_i64_into::<LittleEndian>(&mut items)?;
                EncodableValue::Int64List(items)
            }
            FLOAT32_LIST => {
                let len = self.read_size()?;
                self.read_alignment(4)?;
                self.ensure_elements(len, 4)?;
                let mut items = vec![0f32; len];
                self.cursor.read_f32_into::<LittleEndian>(&mut items)?;
                EncodableValue::Float32List(items)
            }
            FLOAT64_LIST => {
                let len = self.read_size()?;
                self.read_alignment(8)?;
                self.ensure_elements(len, 8)?;
                let mut items = vec![0f64; len];
                self.cursor.read_f64_into::<LittleEndian>(&mut items)?;
                EncodableValue::Float64List(items)
            }
            LIST => {
                let len = self.read_size()?;
                // every element takes at least one byte
                self.ensure_elements(len, 1)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_nested(depth + 1)?);
                }
                EncodableValue::List(items)
            }
            MAP => {
                let len = self.read_size()?;
                self.ensure_elements(len, 2)?;
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = self.read_nested(depth + 1)?;
                    let v = self.read_nested(depth + 1)?;
                    entries.push((k, v));
                }
                EncodableValue::Map(entries)
            }
            other => return Err(CodecError::UnknownType(other)),
        };
        Ok(value)
    }

    fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingData(n)),
        }
    }
}

/// Decodes a standalone message holding exactly one value.
pub fn decode_message(bytes: &[u8]) -> Result<EncodableValue, CodecError> {
    let mut reader = Reader::new(bytes);
    let value = reader.read_value()?;
    reader.finish()?;
    Ok(value)
}

/// Decodes a method call into `(method name, arguments)`.
/// A call that carries only a name has null arguments.
pub fn decode_method_call(bytes: &[u8]) -> Result<(String, EncodableValue), CodecError> {
    let mut reader = Reader::new(bytes);
    let method = match reader.read_value()? {
        EncodableValue::String(name) => name,
        _ => return Err(CodecError::InvalidMethodName),
    };
    let arguments = if reader.remaining() == 0 {
        EncodableValue::Null
    } else {
        reader.read_value()?
    };
    reader.finish()?;
    Ok((method, arguments))
}

/// Decodes a reply envelope. An empty reply decodes as `NotImplemented`.
pub fn decode_envelope(bytes: &[u8]) -> Result<MethodResult, CodecError> {
    if bytes.is_empty() {
        return Ok(MethodResult::NotImplemented);
    }
    let mut reader = Reader::new(bytes);
    let result = match reader.cursor.read_u8()? {
        ENVELOPE_SUCCESS => MethodResult::Success(reader.read_value()?),
        ENVELOPE_ERROR => {
            let code = match reader.read_value()? {
                EncodableValue::String(code) => code,
                _ => return Err(CodecError::InvalidEnvelope(ENVELOPE_ERROR)),
            };
            let message = match reader.read_value()? {
                EncodableValue::String(m) => m,
                _ => String::new(),
            };
            let details = reader.read_value()?;
            // a trailing stack trace may follow in newer engines
            if reader.remaining() > 0 {
                reader.read_value()?;
            }
            MethodResult::Error {
                code,
                message,
                details,
            }
        }
        other => return Err(CodecError::InvalidEnvelope(other)),
    };
    reader.finish()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_short_string() {
        assert_eq!(
            encode_message(&EncodableValue::from("hi")),
            vec![STRING, 2, b'h', b'i']
        );
    }

    #[test]
    fn float64_is_aligned_to_eight() {
        let bytes = encode_message(&EncodableValue::List(vec![EncodableValue::Float64(1.0)]));
        // [LIST, 1, FLOAT64, pad x5, 8 bytes]
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..3], &[LIST, 1, FLOAT64]);
        assert_eq!(&bytes[3..8], &[0; 5]);
        assert_eq!(LittleEndian::read_f64(&bytes[8..]), 1.0);
        assert_eq!(
            decode_message(&bytes).unwrap(),
            EncodableValue::List(vec![EncodableValue::Float64(1.0)])
        );
    }

    #[test]
    fn long_string_uses_u16_size_prefix() {
        let s = "x".repeat(300);
        let bytes = encode_message(&EncodableValue::from(s.as_str()));
        assert_eq!(&bytes[..4], &[STRING, 254, 0x2c, 0x01]);
        assert_eq!(bytes.len(), 4 + 300);
        assert_eq!(decode_message(&bytes).unwrap(), EncodableValue::String(s));
    }

    #[test]
    fn decodes_method_call_with_map_arguments() {
        let args = EncodableValue::string_map([("name", "A"), ("location", "X")]);
        let bytes = encode_method_call("saveFormData", &args);
        let (method, decoded) = decode_method_call(&bytes).unwrap();
        assert_eq!(method, "saveFormData");
        assert_eq!(decoded.lookup("location"), Some(&EncodableValue::from("X")));
    }

    #[test]
    fn method_call_without_arguments_has_null_args() {
        let bytes = encode_message(&EncodableValue::from("getProcessorInfo"));
        let (method, args) = decode_method_call(&bytes).unwrap();
        assert_eq!(method, "getProcessorInfo");
        assert!(args.is_null());
    }

    #[test]
    fn rejects_non_string_method_name() {
        assert_eq!(
            decode_method_call(&[INT32, 1, 0, 0, 0]),
            Err(CodecError::InvalidMethodName)
        );
        assert_eq!(
            decode_method_call(&[NULL, NULL]),
            Err(CodecError::InvalidMethodName)
        );
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        assert_eq!(decode_message(&[STRING, 5, b'a']), Err(CodecError::UnexpectedEnd));
        assert_eq!(decode_message(&[INT32, 1, 2]), Err(CodecError::UnexpectedEnd));
        assert_eq!(decode_message(&[LIST, 200]), Err(CodecError::UnexpectedEnd));
    }

    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut bytes = [LIST, 1].repeat(depth);
        bytes.push(NULL);
        bytes
    }

    #[test]
    fn nesting_is_bounded() {
        let mut expected = EncodableValue::Null;
        for _ in 0..MAX_NESTING_DEPTH {
            expected = EncodableValue::List(vec![expected]);
        }
        assert_eq!(decode_message(&nested_lists(MAX_NESTING_DEPTH)).unwrap(), expected);

        assert_eq!(
            decode_message(&nested_lists(MAX_NESTING_DEPTH + 1)),
            Err(CodecError::TooDeep)
        );
        // Far past the stack's reach; must fail cleanly instead of aborting.
        assert_eq!(decode_message(&nested_lists(100_000)), Err(CodecError::TooDeep));

        let mut call = encode_message(&EncodableValue::from("getFormData"));
        call.extend(nested_lists(50_000));
        assert_eq!(decode_method_call(&call), Err(CodecError::TooDeep));
    }

    #[test]
    fn unknown_tag_and_trailing_bytes_are_rejected() {
        assert_eq!(decode_message(&[42]), Err(CodecError::UnknownType(42)));
        assert_eq!(decode_message(&[NULL, NULL]), Err(CodecError::TrailingData(1)));
    }

    #[test]
    fn typed_lists_decode() {
        let value = EncodableValue::Int32List(vec![1, -2, 3]);
        let bytes = encode_message(&value);
        // [tag, len, pad x2, 12 bytes]
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_message(&bytes).unwrap(), value);
    }

    #[test]
    fn success_envelope_layout() {
        let bytes = encode_result(&MethodResult::Success("ok".into()));
        assert_eq!(bytes, vec![ENVELOPE_SUCCESS, STRING, 2, b'o', b'k']);
    }

    #[test]
    fn error_envelope_decodes_back() {
        let bytes = encode_error_envelope("DLL_ERROR", Some("boom"), &EncodableValue::Null);
        assert_eq!(bytes[0], ENVELOPE_ERROR);
        assert_eq!(
            decode_envelope(&bytes).unwrap(),
            MethodResult::Error {
                code: "DLL_ERROR".into(),
                message: "boom".into(),
                details: EncodableValue::Null,
            }
        );
    }

    #[test]
    fn not_implemented_is_empty_reply() {
        assert!(encode_result(&MethodResult::NotImplemented).is_empty());
        assert_eq!(decode_envelope(&[]).unwrap(), MethodResult::NotImplemented);
    }
}
