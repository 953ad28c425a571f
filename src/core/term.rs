//! Purpose: Portable binary encoding for nested, dynamically-typed cell terms.
//! Exports: `Term`, `encode_term`, `decode_term`, `TERM_MAGIC`, `TERM_VERSION`.
//! Role: Stands in for language-native term serialization in cell values.
//! Invariants: Output starts with `TERM_MAGIC` + `TERM_VERSION`; integers are big-endian.
//! Invariants: Decoding rejects trailing bytes, unknown tags, and nesting past `MAX_DEPTH`.
//! Notes: Cells written by a language-native encoder are not readable here.

use crate::core::error::{Error, ErrorKind};

pub const TERM_MAGIC: [u8; 2] = *b"WT";
pub const TERM_VERSION: u8 = 1;
const MAX_DEPTH: usize = 64;

const TAG_NIL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_FLOAT: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_TEXT: u8 = 0x06;
const TAG_LIST: u8 = 0x07;
const TAG_MAP: u8 = 0x08;

#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    List(Vec<Term>),
    /// Entries keep insertion order; duplicate keys are preserved.
    Map(Vec<(Term, Term)>),
}

pub fn encode_term(term: &Term) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&TERM_MAGIC);
    out.push(TERM_VERSION);
    write_term(&mut out, term, 0)?;
    Ok(out)
}

pub fn decode_term(bytes: &[u8]) -> Result<Term, Error> {
    if bytes.len() < 3 || bytes[0..2] != TERM_MAGIC {
        return Err(term_error("missing term header"));
    }
    if bytes[2] != TERM_VERSION {
        return Err(term_error(format!("unsupported term version {}", bytes[2])));
    }
    let mut reader = Reader {
        buf: bytes,
        pos: 3,
    };
    let term = reader.read_term(0)?;
    if reader.pos != bytes.len() {
        return Err(term_error("trailing bytes after term"));
    }
    Ok(term)
}

fn write_term(out: &mut Vec<u8>, term: &Term, depth: usize) -> Result<(), Error> {
    if depth > MAX_DEPTH {
        return Err(term_error("term nesting too deep"));
    }
    match term {
        Term::Nil => out.push(TAG_NIL),
        Term::Bool(false) => out.push(TAG_FALSE),
        Term::Bool(true) => out.push(TAG_TRUE),
        Term::Int(value) => {
            out.push(TAG_INT);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Term::Float(value) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&value.to_be_bytes());
        }
        Term::Bytes(bytes) => {
            out.push(TAG_BYTES);
            write_len(out, bytes.len())?;
            out.extend_from_slice(bytes);
        }
        Term::Text(text) => {
            out.push(TAG_TEXT);
            write_len(out, text.len())?;
            out.extend_from_slice(text.as_bytes());
        }
        Term::List(items) => {
            out.push(TAG_LIST);
            write_len(out, items.len())?;
            for item in items {
                write_term(out, item, depth + 1)?;
            }
        }
        Term::Map(entries) => {
            out.push(TAG_MAP);
            write_len(out, entries.len())?;
            for (key, value) in entries {
                write_term(out, key, depth + 1)?;
                write_term(out, value, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<(), Error> {
    let len = u32::try_from(len).map_err(|_| term_error("term component exceeds u32 length"))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(term_error("truncated term"));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_8(&mut self) -> Result<[u8; 8], Error> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize, Error> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw) as usize)
    }

    fn read_term(&mut self, depth: usize) -> Result<Term, Error> {
        if depth > MAX_DEPTH {
            return Err(term_error("term nesting too deep"));
        }
        let tag = self.take(1)?[0];
        let term = match tag {
            TAG_NIL => Term::Nil,
            TAG_FALSE => Term::Bool(false),
            TAG_TRUE => Term::Bool(true),
            TAG_INT => Term::Int(i64::from_be_bytes(self.take_8()?)),
            TAG_FLOAT => Term::Float(f64::from_be_bytes(self.take_8()?)),
            TAG_BYTES => {
                let len = self.read_len()?;
                Term::Bytes(self.take(len)?.to_vec())
            }
            TAG_TEXT => {
                let len = self.read_len()?;
                let raw = self.take(len)?;
                let text = std::str::from_utf8(raw).map_err(|err| {
                    term_error("term text is not valid utf-8").with_source(err)
                })?;
                Term::Text(text.to_string())
            }
            TAG_LIST => {
                let count = self.read_len()?;
                // Every element takes at least one byte.
                if count > self.remaining() {
                    return Err(term_error("truncated term"));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_term(depth + 1)?);
                }
                Term::List(items)
            }
            TAG_MAP => {
                let count = self.read_len()?;
                if count.saturating_mul(2) > self.remaining() {
                    return Err(term_error("truncated term"));
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_term(depth + 1)?;
                    let value = self.read_term(depth + 1)?;
                    entries.push((key, value));
                }
                Term::Map(entries)
            }
            other => return Err(term_error(format!("unknown term tag 0x{other:02x}"))),
        };
        Ok(term)
    }
}

fn term_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidTerm).with_message(message)
}
