//! Big-endian cursor helpers for TPM marshalling.

use crate::errors::TpmError;

/// Bounds-checked reader over a marshalled TPM structure.
pub(crate) struct Reader<'a> {
    structure: &'static str,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(structure: &'static str, buf: &'a [u8]) -> Self {
        Self {
            structure,
            buf,
            pos: 0,
        }
    }

    /// Fails with `Truncated` unless at least `needed` bytes are present in
    /// total, before any field is read.
    pub(crate) fn require_min(&self, needed: usize) -> Result<(), TpmError> {
        if self.buf.len() < needed {
            return Err(TpmError::Truncated {
                structure: self.structure,
                offset: 0,
                needed,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], TpmError> {
        if self.remaining() < n {
            return Err(TpmError::Truncated {
                structure: self.structure,
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], TpmError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, TpmError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, TpmError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, TpmError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, TpmError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Reads a `TPM2B_*`: a `u16` size followed by that many bytes.
    pub(crate) fn tpm2b(&mut self) -> Result<&'a [u8], TpmError> {
        let size = self.u16()? as usize;
        self.take(size)
    }

    /// Consumes the reader, failing if any bytes were left unread.
    pub(crate) fn finish(self) -> Result<(), TpmError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(TpmError::TrailingBytes {
                structure: self.structure,
                count,
            }),
        }
    }
}

/// Appending writer for a marshalled TPM structure.
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub(crate) fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub(crate) fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Writes a `TPM2B_*`, failing if `v` does not fit a `u16` size.
    pub(crate) fn tpm2b(&mut self, field: &'static str, v: &[u8]) -> Result<&mut Self, TpmError> {
        let size = u16::try_from(v.len()).map_err(|_| TpmError::FieldTooLarge {
            field,
            size: v.len(),
        })?;
        Ok(self.u16(size).bytes(v))
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Left-pads a big-endian integer to `size` bytes. Returns `None` if it is
/// longer than `size` once leading zeros are stripped.
pub(crate) fn left_pad(v: &[u8], size: usize) -> Option<Vec<u8>> {
    let first = v.iter().position(|&b| b != 0).unwrap_or(v.len());
    let significant = &v[first..];
    if significant.len() > size {
        return None;
    }
    let mut out = vec![0u8; size - significant.len()];
    out.extend_from_slice(significant);
    Some(out)
}
