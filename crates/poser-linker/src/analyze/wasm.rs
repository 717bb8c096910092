// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! WebAssembly export section reader.

use super::{FileRecord, LocalName, Origin};
use crate::error::{LinkerError, Result};

const MAGIC: &[u8; 4] = b"\0asm";
const VERSION: &[u8; 4] = &[1, 0, 0, 0];
const EXPORT_SECTION: u8 = 7;

/// Lists the exports of a WebAssembly binary, one named binding each.
pub fn analyze_wasm(bytes: &[u8]) -> Result<FileRecord> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.take(4)? != MAGIC || reader.take(4)? != VERSION {
        return Err(invalid("missing WebAssembly header"));
    }

    let mut record = FileRecord::default();
    while !reader.is_done() {
        let id = reader.byte()?;
        let size = reader.leb_u32()? as usize;
        let section = reader.take(size)?;
        if id != EXPORT_SECTION {
            continue;
        }
        let mut exports = Reader {
            bytes: section,
            pos: 0,
        };
        let count = exports.leb_u32()?;
        for _ in 0..count {
            let length = exports.leb_u32()? as usize;
            let name = std::str::from_utf8(exports.take(length)?)
                .map_err(|_| invalid("export name is not UTF-8"))?
                .to_owned();
            // export kind, then the index of the exported item
            exports.byte()?;
            exports.leb_u32()?;
            record
                .exports
                .insert(name.clone(), Origin::Local(LocalName::Name(name)));
        }
    }
    Ok(record)
}

fn invalid(message: &str) -> LinkerError {
    LinkerError::invalid("InvalidWasm", message)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_done(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| invalid("unexpected end of binary"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(length)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| invalid("unexpected end of binary"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn leb_u32(&mut self) -> Result<u32> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.byte()?;
            result |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(invalid("integer representation too long"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(exports: &[&str]) -> Vec<u8> {
        let mut section = vec![exports.len() as u8];
        for (index, name) in exports.iter().enumerate() {
            section.push(name.len() as u8);
            section.extend_from_slice(name.as_bytes());
            section.push(0);
            section.push(index as u8);
        }
        let mut bytes = b"\0asm\x01\0\0\0".to_vec();
        // an empty custom section is skipped
        bytes.extend_from_slice(&[0, 2, 1, b'x']);
        bytes.push(EXPORT_SECTION);
        bytes.push(section.len() as u8);
        bytes.extend(section);
        bytes
    }

    #[test]
    fn test_exports() {
        let record = analyze_wasm(&binary(&["add", "memory"])).unwrap();
        let names: Vec<&str> = record.exports.keys().map(String::as_str).collect();
        assert_eq!(names, ["add", "memory"]);
    }

    #[test]
    fn test_no_exports() {
        let record = analyze_wasm(b"\0asm\x01\0\0\0").unwrap();
        assert!(record.exports.is_empty());
    }

    #[test]
    fn test_bad_header() {
        let error = analyze_wasm(b"\0elf\x01\0\0\0").unwrap_err();
        assert!(matches!(error, LinkerError::Invalid { code: "InvalidWasm", .. }));
    }

    #[test]
    fn test_truncated() {
        let mut bytes = binary(&["add"]);
        bytes.pop();
        assert!(analyze_wasm(&bytes).is_err());
    }
}
