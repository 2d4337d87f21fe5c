//! Unix `ar` archive parsing: the 8-byte magic, 60-byte member headers, and
//! the `/ ` symbol index member that drives lazy member extraction.
//!
//! This module only parses; the fixpoint worklist loop that decides *which*
//! members to pull in based on outstanding undefined references lives in
//! [`crate::image`], since it needs to consult the linker's current set of
//! loaded objects after each member is ingested.

use crate::error::{Error, Result};

const MAGIC: &[u8; 8] = b"!<arch>\n";
const HEADER_SIZE: usize = 60;

/// One resolved entry from the archive's `/ ` symbol index: a symbol name
/// paired with the absolute file offset of the member header that defines
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolIndexEntry {
    /// The defined symbol's name
    pub name: String,
    /// Absolute byte offset, from the start of the archive, of the member
    /// header that defines `name`
    pub header_offset: usize,
}

/// A parsed `ar` archive
pub struct Archive<'a> {
    bytes: &'a [u8],
}

struct MemberHeader {
    name: String,
    size: usize,
    payload_offset: usize,
}

fn parse_member_header(bytes: &[u8], at: usize) -> Result<MemberHeader> {
    let raw = bytes
        .get(at..at + HEADER_SIZE)
        .ok_or_else(|| Error::MalformedArchive {
            reason: "truncated member header".into(),
        })?;

    let name = String::from_utf8_lossy(&raw[0..16]).trim_end().to_string();
    let size_str = std::str::from_utf8(&raw[48..58])
        .map_err(|_| Error::MalformedArchive {
            reason: "ar_size is not valid UTF-8".into(),
        })?
        .trim();
    let size: usize = size_str.parse().map_err(|_| Error::MalformedArchive {
        reason: format!("invalid ar_size {size_str:?}"),
    })?;

    Ok(MemberHeader {
        name,
        size,
        payload_offset: at + HEADER_SIZE,
    })
}

impl<'a> Archive<'a> {
    /// Validates the 8-byte `!<arch>\n` magic and wraps `bytes`
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.get(..8) != Some(MAGIC.as_slice()) {
            return Err(Error::MalformedArchive {
                reason: "bad archive magic".into(),
            });
        }
        Ok(Self { bytes })
    }

    /// The byte contents of the member whose header starts at
    /// `header_offset`
    pub fn member_payload(&self, header_offset: usize) -> Result<&'a [u8]> {
        let hdr = parse_member_header(self.bytes, header_offset)?;
        self.bytes
            .get(hdr.payload_offset..hdr.payload_offset + hdr.size)
            .ok_or_else(|| Error::MalformedArchive {
                reason: "member payload out of range".into(),
            })
    }

    /// Parses the archive's `/ ` symbol index member, if present. Returns
    /// `None` if the archive has no symbol index — per spec.md §7, a
    /// missing index is not fatal, it simply means no members are pulled
    /// in lazily.
    pub fn symbol_index(&self) -> Result<Option<Vec<SymbolIndexEntry>>> {
        let mut at = 8;
        while at + HEADER_SIZE <= self.bytes.len() {
            let hdr = parse_member_header(self.bytes, at)?;
            if hdr.name == "/" {
                return Ok(Some(self.parse_index_payload(&hdr)?));
            }
            let padded = hdr.size + (hdr.size & 1);
            at = hdr.payload_offset + padded;
        }
        Ok(None)
    }

    fn parse_index_payload(&self, hdr: &MemberHeader) -> Result<Vec<SymbolIndexEntry>> {
        let payload = self
            .bytes
            .get(hdr.payload_offset..hdr.payload_offset + hdr.size)
            .ok_or_else(|| Error::MalformedArchive {
                reason: "symbol index payload out of range".into(),
            })?;

        let count = u32::from_be_bytes(
            payload
                .get(..4)
                .ok_or_else(|| Error::MalformedArchive {
                    reason: "truncated symbol index count".into(),
                })?
                .try_into()
                .expect("length checked above"),
        ) as usize;

        let offsets_end = 4 + count * 4;
        let offsets_bytes = payload
            .get(4..offsets_end)
            .ok_or_else(|| Error::MalformedArchive {
                reason: "truncated symbol index offset table".into(),
            })?;

        let mut names = payload[offsets_end..].split(|&b| b == 0);

        let mut entries = Vec::with_capacity(count);
        for chunk in offsets_bytes.chunks_exact(4) {
            let off = u32::from_be_bytes(chunk.try_into().expect("chunks_exact(4)")) as usize;
            let name = names
                .next()
                .ok_or_else(|| Error::MalformedArchive {
                    reason: "symbol index name table exhausted".into(),
                })?;
            entries.push(SymbolIndexEntry {
                name: String::from_utf8_lossy(name).to_string(),
                header_offset: off,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pad(mut v: Vec<u8>) -> Vec<u8> {
        if v.len() % 2 != 0 {
            v.push(0);
        }
        v
    }

    fn member_header(name: &str, size: usize) -> Vec<u8> {
        let mut h = vec![b' '; HEADER_SIZE];
        h[0..name.len()].copy_from_slice(name.as_bytes());
        let size_str = size.to_string();
        h[48..48 + size_str.len()].copy_from_slice(size_str.as_bytes());
        h[58] = b'`';
        h[59] = b'\n';
        h
    }

    fn build_archive(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for (name, payload) in members {
            out.extend_from_slice(&member_header(name, payload.len()));
            out.extend(pad(payload.clone()));
        }
        out
    }

    fn build_index(entries: &[(&str, u32)]) -> Vec<u8> {
        let mut payload = (entries.len() as u32).to_be_bytes().to_vec();
        for (_, off) in entries {
            payload.extend_from_slice(&off.to_be_bytes());
        }
        for (name, _) in entries {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
        }
        payload
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(Archive::parse(b"not an archive!!").is_err());
    }

    #[test]
    fn no_index_returns_none() {
        let bytes = build_archive(&[("a.o", vec![1, 2, 3])]);
        let archive = Archive::parse(&bytes).unwrap();
        assert_eq!(archive.symbol_index().unwrap(), None);
    }

    #[test]
    fn parses_symbol_index() {
        let index_payload = build_index(&[("printf", 0xdead_beef), ("malloc", 0x1234)]);
        let bytes = build_archive(&[("/", index_payload)]);
        let archive = Archive::parse(&bytes).unwrap();
        let entries = archive.symbol_index().unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "printf");
        assert_eq!(entries[0].header_offset, 0xdead_beef);
        assert_eq!(entries[1].name, "malloc");
        assert_eq!(entries[1].header_offset, 0x1234);
    }

    #[test]
    fn reads_member_payload_at_offset() {
        let bytes = build_archive(&[("a.o", vec![9, 9, 9]), ("b.o", vec![1, 2])]);
        let second_header_offset = 8 + HEADER_SIZE + 4; // "a.o" payload padded to 4
        let archive = Archive::parse(&bytes).unwrap();
        let payload = archive.member_payload(second_header_offset).unwrap();
        assert_eq!(payload, &[1, 2]);
    }
}
