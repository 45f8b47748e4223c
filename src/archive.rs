//! Store-only ZIP writer.
//!
//! Every entry is written uncompressed: a local file header, the name, then
//! the raw bytes. A central directory record per entry and the end of central
//! directory record follow. All integers are little endian. Names are written
//! as UTF-8 with general purpose bit 11 set, and each central record carries
//! the exact byte offset of its local header.

use crate::formats::ArchiveEntry;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIR_LEN: usize = 22;

const VERSION: u16 = 20;
const FLAG_UTF8: u16 = 0x0800;
const METHOD_STORE: u16 = 0;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive has no content")]
    Empty,

    #[error("too many entries for a zip archive: {0} (max 65535)")]
    TooManyEntries(usize),

    #[error("entry name is too long: {len} bytes (max 65535)")]
    NameTooLong { len: usize },

    #[error("entry {name} is too large: {len} bytes (max 4 GiB)")]
    EntryTooLarge { name: String, len: usize },

    #[error("archive exceeds 4 GiB")]
    ArchiveTooLarge,
}

/// Encodes `entries` into a complete archive, in order.
pub fn encode(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let count = u16::try_from(entries.len())
        .map_err(|_| ArchiveError::TooManyEntries(entries.len()))?;

    let mut local_headers = Vec::with_capacity(entries.len());
    let mut central_records = Vec::with_capacity(entries.len());
    let mut offset = 0u64;

    for entry in entries {
        let fields = EntryFields::new(entry)?;
        let local_offset = u32::try_from(offset).map_err(|_| ArchiveError::ArchiveTooLarge)?;

        local_headers.push(fields.local_header());
        central_records.push(fields.central_record(local_offset));
        offset += (LOCAL_HEADER_LEN + fields.name.len() + entry.bytes.len()) as u64;
    }

    let central_dir_offset = u32::try_from(offset).map_err(|_| ArchiveError::ArchiveTooLarge)?;
    let central_dir_len = central_records.iter().map(Vec::len).sum::<usize>();
    let central_dir_size =
        u32::try_from(central_dir_len).map_err(|_| ArchiveError::ArchiveTooLarge)?;
    let total = offset + central_dir_len as u64 + END_OF_CENTRAL_DIR_LEN as u64;
    if total > u64::from(u32::MAX) {
        return Err(ArchiveError::ArchiveTooLarge);
    }

    let end_record = end_of_central_directory(count, central_dir_size, central_dir_offset);

    let mut parts: Vec<&[u8]> = Vec::with_capacity(entries.len() * 3 + 1);
    for (header, entry) in local_headers.iter().zip(entries) {
        parts.push(header);
        parts.push(&entry.bytes);
    }
    parts.extend(central_records.iter().map(Vec::as_slice));
    parts.push(&end_record);

    assemble(&parts, total as usize)
}

struct EntryFields<'a> {
    name: &'a [u8],
    name_len: u16,
    size: u32,
    crc: u32,
}

impl<'a> EntryFields<'a> {
    fn new(entry: &'a ArchiveEntry) -> Result<Self, ArchiveError> {
        let name = entry.name.as_bytes();
        let name_len =
            u16::try_from(name.len()).map_err(|_| ArchiveError::NameTooLong { len: name.len() })?;
        let size = u32::try_from(entry.bytes.len()).map_err(|_| ArchiveError::EntryTooLarge {
            name: entry.name.clone(),
            len: entry.bytes.len(),
        })?;

        Ok(Self {
            name,
            name_len,
            size,
            crc: crc32(&entry.bytes),
        })
    }

    fn local_header(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LOCAL_HEADER_LEN + self.name.len());
        put_u32(&mut out, LOCAL_HEADER_SIG);
        put_u16(&mut out, VERSION);
        put_u16(&mut out, FLAG_UTF8);
        put_u16(&mut out, METHOD_STORE);
        put_u16(&mut out, 0); // mod time
        put_u16(&mut out, 0); // mod date
        put_u32(&mut out, self.crc);
        put_u32(&mut out, self.size);
        put_u32(&mut out, self.size);
        put_u16(&mut out, self.name_len);
        put_u16(&mut out, 0); // extra field length
        out.extend_from_slice(self.name);
        out
    }

    fn central_record(&self, local_offset: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(CENTRAL_HEADER_LEN + self.name.len());
        put_u32(&mut out, CENTRAL_HEADER_SIG);
        put_u16(&mut out, VERSION); // made by
        put_u16(&mut out, VERSION); // needed to extract
        put_u16(&mut out, FLAG_UTF8);
        put_u16(&mut out, METHOD_STORE);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u32(&mut out, self.crc);
        put_u32(&mut out, self.size);
        put_u32(&mut out, self.size);
        put_u16(&mut out, self.name_len);
        put_u16(&mut out, 0); // extra field length
        put_u16(&mut out, 0); // comment length
        put_u16(&mut out, 0); // disk number start
        put_u16(&mut out, 0); // internal attributes
        put_u32(&mut out, 0); // external attributes
        put_u32(&mut out, local_offset);
        out.extend_from_slice(self.name);
        out
    }
}

fn end_of_central_directory(count: u16, size: u32, offset: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(END_OF_CENTRAL_DIR_LEN);
    put_u32(&mut out, END_OF_CENTRAL_DIR_SIG);
    put_u16(&mut out, 0); // this disk
    put_u16(&mut out, 0); // disk with central directory
    put_u16(&mut out, count);
    put_u16(&mut out, count);
    put_u32(&mut out, size);
    put_u32(&mut out, offset);
    put_u16(&mut out, 0); // comment length
    out
}

/// Copies the parts into one buffer of `expected` bytes, the size `encode`
/// derived from header arithmetic. If the parts do not fill that buffer
/// exactly, they are concatenated directly instead.
fn assemble(parts: &[&[u8]], expected: usize) -> Result<Vec<u8>, ArchiveError> {
    if expected == 0 {
        return Err(ArchiveError::Empty);
    }

    let mut out = vec![0u8; expected];
    let mut position = 0usize;
    for part in parts {
        let Some(slot) = out.get_mut(position..position + part.len()) else {
            return concat_fallback(parts, expected);
        };
        slot.copy_from_slice(part);
        position += part.len();
    }

    if position != expected {
        return concat_fallback(parts, expected);
    }
    Ok(out)
}

fn concat_fallback(parts: &[&[u8]], expected: usize) -> Result<Vec<u8>, ArchiveError> {
    let out = parts.concat();
    tracing::warn!(expected, actual = out.len(), "archive size accounting mismatch; concatenating parts");
    if out.is_empty() {
        return Err(ArchiveError::Empty);
    }
    Ok(out)
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                0xEDB8_8320 ^ (crc >> 1)
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-32 (IEEE 802.3), as stored in zip headers.
pub fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(!0u32, |crc, &byte| {
        CRC_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
