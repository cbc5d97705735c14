//! Character encodings of string types.

use core::fmt;

use crate::errors::{Error, Result};
use crate::kernels::ErrorMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    Ascii,
    Latin1,
    Utf8,
    Utf16,
    Utf32,
}

impl StringEncoding {
    /// Size in bytes of one code unit, which is also the data alignment.
    pub const fn unit_size(self) -> usize {
        match self {
            StringEncoding::Ascii | StringEncoding::Latin1 | StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 => 2,
            StringEncoding::Utf32 => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StringEncoding::Ascii => "ascii",
            StringEncoding::Latin1 => "latin1",
            StringEncoding::Utf8 => "utf8",
            StringEncoding::Utf16 => "utf16",
            StringEncoding::Utf32 => "utf32",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ascii" | "A" => Ok(StringEncoding::Ascii),
            "latin1" => Ok(StringEncoding::Latin1),
            "utf8" | "utf-8" | "U8" => Ok(StringEncoding::Utf8),
            "utf16" | "utf-16" | "U16" => Ok(StringEncoding::Utf16),
            "utf32" | "utf-32" | "U32" => Ok(StringEncoding::Utf32),
            _ => Err(Error::Type(format!("unrecognized string encoding {name:?}"))),
        }
    }

    pub const fn is_unicode(self) -> bool {
        matches!(
            self,
            StringEncoding::Utf8 | StringEncoding::Utf16 | StringEncoding::Utf32
        )
    }

    /// Largest code point the encoding can represent.
    pub const fn max_code_point(self) -> u32 {
        match self {
            StringEncoding::Ascii => 0x7f,
            StringEncoding::Latin1 => 0xff,
            _ => 0x10ffff,
        }
    }

    /// Upper bound on the number of code points in `nbytes` of this encoding.
    pub const fn max_code_points(self, nbytes: usize) -> usize {
        nbytes / self.unit_size()
    }

    /// Upper bound on the bytes this encoding needs for one code point drawn
    /// from the repertoire of `src`.
    pub const fn max_bytes_per_code_point(self, src: StringEncoding) -> usize {
        match (self, src.max_code_point()) {
            (StringEncoding::Utf8, 0x7f) => 1,
            (StringEncoding::Utf8, 0xff) => 2,
            (StringEncoding::Utf8, _) => 4,
            (StringEncoding::Utf16, 0x7f | 0xff) => 2,
            (StringEncoding::Utf16, _) => 4,
            (other, _) => other.unit_size(),
        }
    }

    /// Decodes `bytes` into a UTF-8 string. With `ErrorMode::None` invalid
    /// sequences become U+FFFD instead of raising.
    pub fn decode(self, bytes: &[u8], errmode: ErrorMode) -> Result<String> {
        let strict = errmode != ErrorMode::None;
        match self {
            StringEncoding::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b < 0x80 {
                        Ok(b as char)
                    } else if strict {
                        Err(self.error(format!("byte 0x{b:02x} is out of range")))
                    } else {
                        Ok(char::REPLACEMENT_CHARACTER)
                    }
                })
                .collect(),
            StringEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            StringEncoding::Utf8 => match core::str::from_utf8(bytes) {
                Ok(s) => Ok(s.to_string()),
                Err(e) if strict => Err(self.error(e.to_string())),
                Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            },
            StringEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(self.error(format!("{} bytes is not a whole number of code units", bytes.len())));
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_ne_bytes([c[0], c[1]]));
                char::decode_utf16(units)
                    .map(|r| match r {
                        Ok(c) => Ok(c),
                        Err(e) if strict => Err(self.error(e.to_string())),
                        Err(_) => Ok(char::REPLACEMENT_CHARACTER),
                    })
                    .collect()
            }
            StringEncoding::Utf32 => {
                if bytes.len() % 4 != 0 {
                    return Err(self.error(format!("{} bytes is not a whole number of code units", bytes.len())));
                }
                bytes
                    .chunks_exact(4)
                    .map(|c| {
                        let cp = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                        match char::from_u32(cp) {
                            Some(ch) => Ok(ch),
                            None if strict => {
                                Err(self.error(format!("0x{cp:x} is not a valid code point")))
                            }
                            None => Ok(char::REPLACEMENT_CHARACTER),
                        }
                    })
                    .collect()
            }
        }
    }

    /// Encodes `s`. Characters outside the repertoire raise unless
    /// `errmode` is `None`, in which case they become `?`.
    pub fn encode(self, s: &str, errmode: ErrorMode) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(s.len() * self.unit_size());
        for ch in s.chars() {
            self.encode_char(ch, errmode, &mut out)?;
        }
        Ok(out)
    }

    fn encode_char(self, ch: char, errmode: ErrorMode, out: &mut Vec<u8>) -> Result<()> {
        let cp = ch as u32;
        if cp > self.max_code_point() {
            if errmode != ErrorMode::None {
                return Err(self.error(format!("{ch:?} cannot be encoded")));
            }
            out.push(b'?');
            return Ok(());
        }
        match self {
            StringEncoding::Ascii | StringEncoding::Latin1 => out.push(cp as u8),
            StringEncoding::Utf8 => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            StringEncoding::Utf16 => {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf) {
                    out.extend_from_slice(&unit.to_ne_bytes());
                }
            }
            StringEncoding::Utf32 => out.extend_from_slice(&cp.to_ne_bytes()),
        }
        Ok(())
    }

    /// Length of the longest prefix of `encoded` that fits in `limit` bytes
    /// and ends on a code point boundary.
    pub fn truncation_point(self, encoded: &[u8], limit: usize) -> usize {
        if encoded.len() <= limit {
            return encoded.len();
        }
        let unit = self.unit_size();
        let mut end = limit - limit % unit;
        match self {
            StringEncoding::Utf8 => {
                while end > 0 && (encoded[end] & 0xc0) == 0x80 {
                    end -= 1;
                }
            }
            StringEncoding::Utf16 if end >= 2 => {
                let last = u16::from_ne_bytes([encoded[end - 2], encoded[end - 1]]);
                if (0xd800..0xdc00).contains(&last) {
                    end -= 2;
                }
            }
            _ => {}
        }
        end
    }

    fn error(self, message: String) -> Error {
        Error::Encoding {
            encoding: self,
            message,
        }
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_invalid_utf8() {
        let bytes = [b'a', 0xff, b'b'];
        assert!(matches!(
            StringEncoding::Utf8.decode(&bytes, ErrorMode::Fractional),
            Err(Error::Encoding { .. })
        ));
        assert_eq!(
            StringEncoding::Utf8.decode(&bytes, ErrorMode::None).unwrap(),
            "a\u{fffd}b"
        );
    }

    #[test]
    fn test_encode_outside_repertoire() {
        assert!(StringEncoding::Ascii.encode("hí", ErrorMode::Overflow).is_err());
        assert_eq!(
            StringEncoding::Ascii.encode("hí", ErrorMode::None).unwrap(),
            b"h?".to_vec()
        );
        assert_eq!(
            StringEncoding::Latin1.encode("hí", ErrorMode::Overflow).unwrap(),
            vec![b'h', 0xed]
        );
    }

    #[test]
    fn test_utf16_surrogates() {
        let encoded = StringEncoding::Utf16.encode("a😀", ErrorMode::Inexact).unwrap();
        assert_eq!(encoded.len(), 6);
        assert_eq!(
            StringEncoding::Utf16.decode(&encoded, ErrorMode::Inexact).unwrap(),
            "a😀"
        );
        // Cutting inside the surrogate pair drops the whole character.
        assert_eq!(StringEncoding::Utf16.truncation_point(&encoded, 4), 2);
    }

    #[test]
    fn test_utf8_truncation_point() {
        let encoded = "hí".as_bytes();
        assert_eq!(encoded.len(), 3);
        assert_eq!(StringEncoding::Utf8.truncation_point(encoded, 2), 1);
        assert_eq!(StringEncoding::Utf8.truncation_point(encoded, 3), 3);
    }
}
