//! Little-endian packing helpers for the model files.

use crate::errors::{Error, Result};

const NONE_LEN: u32 = u32::MAX;

#[inline]
pub(crate) fn unpack_u32(buf: &[u8]) -> Result<u32> {
    if buf.len() < 4 {
        return Err(Error::invalid_model("not enough data for unpacking u32"));
    }
    Ok(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

#[inline]
pub(crate) fn unpack_u64(buf: &[u8]) -> Result<u64> {
    if buf.len() < 8 {
        return Err(Error::invalid_model("not enough data for unpacking u64"));
    }
    Ok(u64::from_le_bytes([
        buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
    ]))
}

#[inline]
pub(crate) fn unpack_f64(buf: &[u8]) -> Result<f64> {
    unpack_u64(buf).map(f64::from_bits)
}

/// Append-only byte buffer.
#[derive(Debug, Default)]
pub(crate) struct Encoder {
    pub buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn len_u32(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .ok()
            .filter(|&l| l != NONE_LEN)
            .ok_or_else(|| Error::invalid_model("section too large"))?;
        self.u32(len);
        Ok(())
    }

    pub fn str(&mut self, s: &str) -> Result<()> {
        self.len_u32(s.len())?;
        self.bytes(s.as_bytes());
        Ok(())
    }

    pub fn opt_str(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => self.str(s),
            None => {
                self.u32(NONE_LEN);
                Ok(())
            }
        }
    }

    pub fn f64s(&mut self, v: &[f64]) -> Result<()> {
        self.len_u32(v.len())?;
        for &x in v {
            self.f64(x);
        }
        Ok(())
    }

    /// Overwrite a u32 previously written at `pos`.
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Zero-pad to a 4-byte boundary.
    pub fn align(&mut self) {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }
}

/// Cursor over a model file.
#[derive(Debug)]
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        if pos > buf.len() {
            return Err(Error::invalid_model("offset out of range"));
        }
        Ok(Self { buf, pos })
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::invalid_model("unexpected end of data"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn u32(&mut self) -> Result<u32> {
        unpack_u32(self.bytes(4)?)
    }

    pub fn u64(&mut self) -> Result<u64> {
        unpack_u64(self.bytes(8)?)
    }

    pub fn f64(&mut self) -> Result<f64> {
        unpack_f64(self.bytes(8)?)
    }

    pub fn str(&mut self) -> Result<String> {
        self.opt_str()?
            .ok_or_else(|| Error::invalid_model("missing string"))
    }

    pub fn opt_str(&mut self) -> Result<Option<String>> {
        let len = self.u32()?;
        if len == NONE_LEN {
            return Ok(None);
        }
        let raw = self.bytes(len as usize)?;
        let s = std::str::from_utf8(raw).map_err(|_| Error::invalid_model("invalid utf-8"))?;
        Ok(Some(s.to_string()))
    }

    pub fn f64s(&mut self) -> Result<Vec<f64>> {
        let len = self.u32()? as usize;
        let mut out = Vec::with_capacity(len.min(self.buf.len() / 8));
        for _ in 0..len {
            out.push(self.f64()?);
        }
        Ok(out)
    }

    /// Read a 4-byte magic and a version, failing on mismatch.
    pub fn header(&mut self, magic: &[u8; 4], version: u32) -> Result<()> {
        let m = self
            .bytes(4)
            .map_err(|_| Error::invalid_model("invalid model format"))?;
        if m != magic {
            return Err(Error::invalid_model("invalid file format, magic mismatch"));
        }
        let v = self.u32()?;
        if v != version {
            return Err(Error::invalid_model(format!(
                "unsupported version {} (expected {})",
                v, version
            )));
        }
        Ok(())
    }
}
