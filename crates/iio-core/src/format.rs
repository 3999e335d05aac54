//! Per-channel data format descriptors and raw value extraction.

use serde::{Deserialize, Serialize};

use crate::error::{IioError, Result};

/// Byte order of a channel's storage unit relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Same as the host; used as is.
    #[default]
    Native,
    /// Opposite of the host; the storage unit is byte-reversed before decoding.
    Swapped,
}

impl ByteOrder {
    /// Byte order for data stored big-endian on the device.
    pub fn big_endian() -> Self {
        if cfg!(target_endian = "big") {
            Self::Native
        } else {
            Self::Swapped
        }
    }

    /// Byte order for data stored little-endian on the device.
    pub fn little_endian() -> Self {
        if cfg!(target_endian = "little") {
            Self::Native
        } else {
            Self::Swapped
        }
    }
}

/// Encoding of one channel's samples inside a sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFormat {
    /// Storage width in bits.
    pub length: u32,
    /// Number of significant bits.
    pub bits: u32,
    /// Right shift applied before masking.
    pub shift: u32,
    /// Two's complement signed value.
    pub is_signed: bool,
    /// Byte order of the storage unit.
    pub byte_order: ByteOrder,
    /// False when the raw encoding needs out-of-band knowledge to interpret.
    pub is_fully_defined: bool,
    /// Consecutive slots per sample record (>1 for vector channels).
    pub repeat: u32,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::new(16, 16)
    }
}

impl DataFormat {
    /// Unsigned, native-order, fully defined format.
    pub fn new(length: u32, bits: u32) -> Self {
        Self {
            length,
            bits,
            shift: 0,
            is_signed: false,
            byte_order: ByteOrder::Native,
            is_fully_defined: true,
            repeat: 1,
        }
    }

    /// Set the shift.
    pub fn with_shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    /// Mark as signed.
    pub fn signed(mut self) -> Self {
        self.is_signed = true;
        self
    }

    /// Set the byte order.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Set the repeat count.
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    /// Mark the encoding as not interpretable without out-of-band knowledge.
    pub fn partially_defined(mut self) -> Self {
        self.is_fully_defined = false;
        self
    }

    /// Parse the kernel's scan element type string, e.g. `le:s12/16>>4` or `be:u8/8X3>>0`.
    pub fn from_scan_type(text: &str) -> Result<Self> {
        let bad = || IioError::invalid_argument(format!("malformed scan type '{}'", text));

        let (endian, rest) = text.trim().split_once(':').ok_or_else(bad)?;
        let byte_order = match endian {
            "le" => ByteOrder::little_endian(),
            "be" => ByteOrder::big_endian(),
            _ => return Err(bad()),
        };

        let mut chars = rest.chars();
        let is_signed = match chars.next() {
            Some('s' | 'S') => true,
            Some('u' | 'U') => false,
            _ => return Err(bad()),
        };
        let rest = chars.as_str();

        let (bits, rest) = rest.split_once('/').ok_or_else(bad)?;
        let (storage, shift) = rest.split_once(">>").ok_or_else(bad)?;
        let (length, repeat) = match storage.split_once('X') {
            Some((length, repeat)) => (length, repeat.parse().map_err(|_| bad())?),
            None => (storage, 1),
        };

        let format = Self {
            length: length.parse().map_err(|_| bad())?,
            bits: bits.parse().map_err(|_| bad())?,
            shift: shift.parse().map_err(|_| bad())?,
            is_signed,
            byte_order,
            is_fully_defined: true,
            repeat,
        };
        format.validate()?;
        Ok(format)
    }

    /// Check the descriptor is decodable.
    pub fn validate(&self) -> Result<()> {
        if self.length == 0 || self.length > 64 {
            return Err(IioError::invalid_argument(format!(
                "storage length {} must be within 1..=64 bits",
                self.length
            )));
        }
        let storage_bits = self.storage_bytes() as u32 * 8;
        let fits = self
            .bits
            .checked_add(self.shift)
            .is_some_and(|end| end <= storage_bits);
        if self.bits == 0 || !fits {
            return Err(IioError::invalid_argument(format!(
                "{} bits shifted by {} do not fit a {}-bit storage unit",
                self.bits, self.shift, self.length
            )));
        }
        if self.repeat == 0 {
            return Err(IioError::invalid_argument("repeat count must be at least 1"));
        }
        Ok(())
    }

    /// Storage unit size in bytes (`length` rounded up to whole bytes).
    pub fn storage_bytes(&self) -> usize {
        (self.length as usize).div_ceil(8)
    }

    /// Bytes occupied in one sample record, repeats included.
    pub fn sample_bytes(&self) -> usize {
        self.storage_bytes() * self.repeat as usize
    }

    fn value_mask(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    /// Decode one storage unit.
    ///
    /// `slot` must hold at least [`storage_bytes`](Self::storage_bytes) bytes.
    pub fn extract(&self, slot: &[u8]) -> SampleValue {
        let width = self.storage_bytes();
        let mut unit = [0u8; 8];
        unit[..width].copy_from_slice(&slot[..width]);
        if self.byte_order == ByteOrder::Swapped {
            unit[..width].reverse();
        }

        let raw = native_to_u64(&unit[..width]);
        let mut value = (raw >> self.shift) & self.value_mask();

        if self.is_signed && self.bits < 64 && value & (1u64 << (self.bits - 1)) != 0 {
            value |= !self.value_mask();
        }

        SampleValue {
            raw: value,
            width,
            is_signed: self.is_signed,
        }
    }

    /// Encode `value` into one storage unit, the inverse of [`extract`](Self::extract).
    ///
    /// Bits of the slot outside `bits << shift` are cleared.
    pub fn insert(&self, value: i64, slot: &mut [u8]) {
        let width = self.storage_bytes();
        let raw = ((value as u64) & self.value_mask()) << self.shift;
        let mut unit = [0u8; 8];
        u64_to_native(raw, &mut unit[..width]);
        if self.byte_order == ByteOrder::Swapped {
            unit[..width].reverse();
        }
        slot[..width].copy_from_slice(&unit[..width]);
    }
}

fn native_to_u64(bytes: &[u8]) -> u64 {
    if cfg!(target_endian = "little") {
        bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    } else {
        bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

fn u64_to_native(value: u64, out: &mut [u8]) {
    let width = out.len();
    for (i, byte) in out.iter_mut().enumerate() {
        let shift = if cfg!(target_endian = "little") {
            i * 8
        } else {
            (width - 1 - i) * 8
        };
        *byte = (value >> shift) as u8;
    }
}

/// One decoded scalar, still in integer form (no scale or offset applied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleValue {
    raw: u64,
    width: usize,
    is_signed: bool,
}

impl SampleValue {
    /// Value as a signed integer (sign-extended when the channel is signed).
    pub fn as_i64(&self) -> i64 {
        self.raw as i64
    }

    /// Value as an unsigned integer.
    pub fn as_u64(&self) -> u64 {
        self.raw
    }

    /// Whether the channel format is signed.
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    /// Storage unit width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Normalized value as host-order bytes of the storage width.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.width];
        u64_to_native(self.raw, &mut out);
        out
    }
}
