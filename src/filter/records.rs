//! Record-level access to zip archives.
//!
//! Retained entries are copied as stored bytes: the local header, the
//! compressed data and any data descriptor go out unchanged, and the central
//! directory record is reused with only its local header offset rewritten.
//! Entry comments, extra fields, the host byte of "version made by" and
//! entries sharing a name all survive the copy.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use zip::result::{ZipError, ZipResult};
use zip::ZipArchive;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;
const ZIP64_END_OF_CENTRAL_DIRECTORY_LEN: usize = 56;
const ZIP64_LOCATOR_LEN: usize = 20;

const CENTRAL_OFFSET_FIELD: usize = 42;
const ZIP64_EXTRA_FIELD_TAG: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const ZIP64_VERSION: u16 = 45;

/// Where a central record keeps its local header offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OffsetField {
    Classic,
    Zip64(usize),
}

/// One central directory record, kept as the bytes read from the archive.
#[derive(Debug, Clone)]
pub struct CentralRecord {
    name: String,
    compressed_size: u64,
    local_header_offset: u64,
    offset_field: OffsetField,
    raw: Vec<u8>,
}

impl CentralRecord {
    fn parse(raw: Vec<u8>, names: &HashMap<Vec<u8>, String>) -> ZipResult<Self> {
        let name_len = usize::from(read_u16(&raw, 28));
        let extra_len = usize::from(read_u16(&raw, 30));
        let name_raw = &raw[CENTRAL_HEADER_LEN..CENTRAL_HEADER_LEN + name_len];
        let name = names
            .get(name_raw)
            .cloned()
            .unwrap_or_else(|| String::from_utf8_lossy(name_raw).into_owned());

        let compressed32 = read_u32(&raw, 20);
        let uncompressed32 = read_u32(&raw, 24);
        let offset32 = read_u32(&raw, CENTRAL_OFFSET_FIELD);

        let mut compressed_size = u64::from(compressed32);
        let mut local_header_offset = u64::from(offset32);
        let mut offset_field = OffsetField::Classic;

        if compressed32 == u32::MAX || uncompressed32 == u32::MAX || offset32 == u32::MAX {
            let extra_start = CENTRAL_HEADER_LEN + name_len;
            let extra = &raw[extra_start..extra_start + extra_len];
            let (start, end) = find_extra_field(extra, ZIP64_EXTRA_FIELD_TAG)
                .ok_or_else(|| invalid("zip64 sizes without a zip64 extra field"))?;

            // Values appear in a fixed order and only when the classic field is saturated.
            let mut at = extra_start + start;
            let field_end = extra_start + end;
            if uncompressed32 == u32::MAX {
                at += 8;
            }
            if compressed32 == u32::MAX {
                if at + 8 > field_end {
                    return Err(invalid("zip64 extra field is truncated"));
                }
                compressed_size = read_u64(&raw, at);
                at += 8;
            }
            if offset32 == u32::MAX {
                if at + 8 > field_end {
                    return Err(invalid("zip64 extra field is truncated"));
                }
                local_header_offset = read_u64(&raw, at);
                offset_field = OffsetField::Zip64(at);
            }
        }

        Ok(Self {
            name,
            compressed_size,
            local_header_offset,
            offset_field,
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    fn relocated(&self, offset: u64) -> ZipResult<Vec<u8>> {
        let mut raw = self.raw.clone();
        match self.offset_field {
            OffsetField::Classic => {
                let offset = u32::try_from(offset)
                    .map_err(|_| invalid("local header offset needs zip64"))?;
                raw[CENTRAL_OFFSET_FIELD..CENTRAL_OFFSET_FIELD + 4]
                    .copy_from_slice(&offset.to_le_bytes());
            }
            OffsetField::Zip64(at) => raw[at..at + 8].copy_from_slice(&offset.to_le_bytes()),
        }
        Ok(raw)
    }
}

/// An input archive read through its central directory.
///
/// The `zip` crate validates the archive and decodes entry names (CP437 or
/// UTF-8). Records are then read directly, so every stored entry is visible
/// in stored order, duplicates included.
pub struct SourceArchive<R> {
    reader: R,
    base_offset: u64,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
}

impl<R: Read + Seek> SourceArchive<R> {
    pub fn open(mut reader: R) -> ZipResult<Self> {
        let names = decoded_names(&mut reader)?;
        let end = EndRecord::locate(&mut reader)?;

        let directory_len = usize::try_from(end.directory_size)
            .map_err(|_| invalid("central directory is too large"))?;
        reader.seek(SeekFrom::Start(end.base_offset + end.directory_offset))?;
        let mut directory = vec![0; directory_len];
        reader.read_exact(&mut directory)?;

        let records = parse_records(&directory, end.entries, &names)?;

        Ok(Self {
            reader,
            base_offset: end.base_offset,
            records,
            comment: end.comment,
        })
    }

    pub fn records(&self) -> &[CentralRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Archive-level comment from the end of central directory record.
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }
}

/// Streams copied entries into `W`, then writes the central directory.
pub struct ArchiveWriter<W: Write> {
    inner: W,
    position: u64,
    directory: Vec<u8>,
    entries: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            directory: Vec::new(),
            entries: 0,
        }
    }

    /// Copies entry `index` of `source` byte for byte.
    pub fn copy_entry<R: Read + Seek>(
        &mut self,
        source: &mut SourceArchive<R>,
        index: usize,
    ) -> ZipResult<()> {
        let record = source.records.get(index).ok_or(ZipError::FileNotFound)?;
        let start = source
            .base_offset
            .checked_add(record.local_header_offset)
            .ok_or_else(|| invalid("local header offset is out of range"))?;

        let length = local_record_len(&mut source.reader, start, record.compressed_size)?;
        source.reader.seek(SeekFrom::Start(start))?;
        let copied = io::copy(&mut (&mut source.reader).take(length), &mut self.inner)?;
        if copied != length {
            return Err(invalid("entry data is truncated"));
        }

        let central = record.relocated(self.position)?;
        self.directory.extend_from_slice(&central);
        self.position += copied;
        self.entries += 1;
        Ok(())
    }

    /// Writes the central directory and end records carrying `comment`,
    /// then hands back the sink.
    pub fn finish(mut self, comment: &[u8]) -> ZipResult<W> {
        let directory_offset = self.position;
        let directory_size = self.directory.len() as u64;
        self.inner.write_all(&self.directory)?;

        let comment_len =
            u16::try_from(comment.len()).map_err(|_| invalid("archive comment is too long"))?;

        let mut end = Vec::with_capacity(
            ZIP64_END_OF_CENTRAL_DIRECTORY_LEN
                + ZIP64_LOCATOR_LEN
                + END_OF_CENTRAL_DIRECTORY_LEN
                + comment.len(),
        );

        let needs_zip64 = self.entries >= u64::from(u16::MAX)
            || directory_size >= u64::from(u32::MAX)
            || directory_offset >= u64::from(u32::MAX);
        if needs_zip64 {
            let record_position = directory_offset + directory_size;
            push_u32(&mut end, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE);
            push_u64(&mut end, (ZIP64_END_OF_CENTRAL_DIRECTORY_LEN - 12) as u64);
            push_u16(&mut end, ZIP64_VERSION);
            push_u16(&mut end, ZIP64_VERSION);
            push_u32(&mut end, 0);
            push_u32(&mut end, 0);
            push_u64(&mut end, self.entries);
            push_u64(&mut end, self.entries);
            push_u64(&mut end, directory_size);
            push_u64(&mut end, directory_offset);

            push_u32(&mut end, ZIP64_LOCATOR_SIGNATURE);
            push_u32(&mut end, 0);
            push_u64(&mut end, record_position);
            push_u32(&mut end, 1);
        }

        let entries = self.entries.min(u64::from(u16::MAX)) as u16;
        push_u32(&mut end, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        push_u16(&mut end, 0);
        push_u16(&mut end, 0);
        push_u16(&mut end, entries);
        push_u16(&mut end, entries);
        push_u32(&mut end, directory_size.min(u64::from(u32::MAX)) as u32);
        push_u32(&mut end, directory_offset.min(u64::from(u32::MAX)) as u32);
        push_u16(&mut end, comment_len);
        end.extend_from_slice(comment);

        self.inner.write_all(&end)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

struct EndRecord {
    entries: u64,
    directory_size: u64,
    directory_offset: u64,
    base_offset: u64,
    comment: Vec<u8>,
}

impl EndRecord {
    fn locate<R: Read + Seek>(reader: &mut R) -> ZipResult<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        let max_tail = (END_OF_CENTRAL_DIRECTORY_LEN + usize::from(u16::MAX)) as u64;
        let tail_start = file_len.saturating_sub(max_tail);
        reader.seek(SeekFrom::Start(tail_start))?;
        let mut tail = Vec::new();
        reader.read_to_end(&mut tail)?;
        if tail.len() < END_OF_CENTRAL_DIRECTORY_LEN {
            return Err(invalid("archive is too short"));
        }

        // The last signature whose comment fits in the remaining bytes wins.
        let pos = (0..=tail.len() - END_OF_CENTRAL_DIRECTORY_LEN)
            .rev()
            .find(|&pos| {
                read_u32(&tail, pos) == END_OF_CENTRAL_DIRECTORY_SIGNATURE
                    && pos + END_OF_CENTRAL_DIRECTORY_LEN + usize::from(read_u16(&tail, pos + 20))
                        <= tail.len()
            })
            .ok_or_else(|| invalid("end of central directory record not found"))?;

        let record = &tail[pos..];
        if read_u16(record, 4) != 0 || read_u16(record, 6) != 0 {
            return Err(ZipError::UnsupportedArchive(
                "multi-disk archives are not supported",
            ));
        }

        let comment_len = usize::from(read_u16(record, 20));
        let comment = record
            [END_OF_CENTRAL_DIRECTORY_LEN..END_OF_CENTRAL_DIRECTORY_LEN + comment_len]
            .to_vec();

        let end_position = tail_start + pos as u64;
        let mut entries = u64::from(read_u16(record, 10));
        let mut directory_size = u64::from(read_u32(record, 12));
        let mut directory_offset = u64::from(read_u32(record, 16));
        let mut directory_end = end_position;

        if let Some(zip64) = Zip64EndRecord::read(reader, end_position)? {
            entries = zip64.entries;
            directory_size = zip64.directory_size;
            directory_offset = zip64.directory_offset;
            directory_end = zip64.position;
        }

        // Anything prepended to the archive shifts every stored offset.
        let base_offset = directory_end
            .checked_sub(directory_size)
            .and_then(|start| start.checked_sub(directory_offset))
            .ok_or_else(|| invalid("central directory lies outside the archive"))?;

        Ok(Self {
            entries,
            directory_size,
            directory_offset,
            base_offset,
            comment,
        })
    }
}

struct Zip64EndRecord {
    position: u64,
    entries: u64,
    directory_size: u64,
    directory_offset: u64,
}

impl Zip64EndRecord {
    /// Reads the zip64 record expected right before the locator, if the
    /// archive has one.
    fn read<R: Read + Seek>(reader: &mut R, end_position: u64) -> ZipResult<Option<Self>> {
        let locator_position = match end_position.checked_sub(ZIP64_LOCATOR_LEN as u64) {
            Some(position) => position,
            None => return Ok(None),
        };

        reader.seek(SeekFrom::Start(locator_position))?;
        let mut locator = [0u8; ZIP64_LOCATOR_LEN];
        reader.read_exact(&mut locator)?;
        if read_u32(&locator, 0) != ZIP64_LOCATOR_SIGNATURE {
            return Ok(None);
        }

        let position = locator_position
            .checked_sub(ZIP64_END_OF_CENTRAL_DIRECTORY_LEN as u64)
            .ok_or_else(|| invalid("zip64 end of central directory record not found"))?;
        reader.seek(SeekFrom::Start(position))?;
        let mut record = [0u8; ZIP64_END_OF_CENTRAL_DIRECTORY_LEN];
        reader.read_exact(&mut record)?;
        if read_u32(&record, 0) != ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Err(invalid("zip64 end of central directory record not found"));
        }

        Ok(Some(Self {
            position,
            entries: read_u64(&record, 32),
            directory_size: read_u64(&record, 40),
            directory_offset: read_u64(&record, 48),
        }))
    }
}

fn decoded_names<R: Read + Seek>(reader: &mut R) -> ZipResult<HashMap<Vec<u8>, String>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut names = HashMap::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        names.insert(entry.name_raw().to_vec(), entry.name().to_string());
    }
    Ok(names)
}

fn parse_records(
    directory: &[u8],
    entries: u64,
    names: &HashMap<Vec<u8>, String>,
) -> ZipResult<Vec<CentralRecord>> {
    let capacity = entries.min((directory.len() / CENTRAL_HEADER_LEN) as u64) as usize;
    let mut records = Vec::with_capacity(capacity);
    let mut at = 0;

    for _ in 0..entries {
        if at + CENTRAL_HEADER_LEN > directory.len()
            || read_u32(directory, at) != CENTRAL_HEADER_SIGNATURE
        {
            return Err(invalid("central directory is truncated"));
        }

        let variable_len = usize::from(read_u16(directory, at + 28))
            + usize::from(read_u16(directory, at + 30))
            + usize::from(read_u16(directory, at + 32));
        let end = at + CENTRAL_HEADER_LEN + variable_len;
        if end > directory.len() {
            return Err(invalid("central directory is truncated"));
        }

        records.push(CentralRecord::parse(directory[at..end].to_vec(), names)?);
        at = end;
    }

    Ok(records)
}

/// Length of the local header, data and data descriptor starting at `start`.
fn local_record_len<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    compressed_size: u64,
) -> ZipResult<u64> {
    reader.seek(SeekFrom::Start(start))?;
    let mut header = [0u8; LOCAL_HEADER_LEN];
    reader.read_exact(&mut header)?;
    if read_u32(&header, 0) != LOCAL_HEADER_SIGNATURE {
        return Err(invalid("local file header not found"));
    }

    let flags = read_u16(&header, 6);
    let name_len = u64::from(read_u16(&header, 26));
    let extra_len = usize::from(read_u16(&header, 28));
    let data_start = LOCAL_HEADER_LEN as u64 + name_len + extra_len as u64;
    let mut length = data_start
        .checked_add(compressed_size)
        .ok_or_else(|| invalid("entry size is out of range"))?;

    if flags & FLAG_DATA_DESCRIPTOR != 0 {
        reader.seek(SeekFrom::Start(start + LOCAL_HEADER_LEN as u64 + name_len))?;
        let mut extra = vec![0; extra_len];
        reader.read_exact(&mut extra)?;
        let size_width = match find_extra_field(&extra, ZIP64_EXTRA_FIELD_TAG) {
            Some(_) => 8,
            None => 4,
        };

        let descriptor_start = start
            .checked_add(length)
            .ok_or_else(|| invalid("entry size is out of range"))?;
        reader.seek(SeekFrom::Start(descriptor_start))?;
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        let signature_len = if u32::from_le_bytes(signature) == DATA_DESCRIPTOR_SIGNATURE {
            4
        } else {
            0
        };
        length += signature_len + 4 + 2 * size_width;
    }

    Ok(length)
}

/// Data range of the first extra field tagged `tag`.
fn find_extra_field(extra: &[u8], tag: u16) -> Option<(usize, usize)> {
    let mut at = 0;
    while at + 4 <= extra.len() {
        let id = read_u16(extra, at);
        let start = at + 4;
        let end = start + usize::from(read_u16(extra, at + 2));
        if end > extra.len() {
            return None;
        }
        if id == tag {
            return Some((start, end));
        }
        at = end;
    }
    None
}

fn invalid(message: &'static str) -> ZipError {
    ZipError::InvalidArchive(message.into())
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_raw_jar, create_test_jar, RawEntry};
    use std::io::Cursor;

    fn open(data: &[u8]) -> SourceArchive<Cursor<Vec<u8>>> {
        SourceArchive::open(Cursor::new(data.to_vec())).unwrap()
    }

    fn copy_all(data: &[u8], keep: impl Fn(&str) -> bool) -> Vec<u8> {
        let mut source = open(data);
        let mut writer = ArchiveWriter::new(Vec::new());
        for index in 0..source.len() {
            if keep(source.records()[index].name()) {
                writer.copy_entry(&mut source, index).unwrap();
            }
        }
        let comment = source.comment().to_vec();
        writer.finish(&comment).unwrap()
    }

    #[test]
    fn test_full_copy_reproduces_archive_bytes() {
        let data = create_raw_jar(
            &[
                RawEntry::new("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                RawEntry::new("C.class", b"cafebabe")
                    .with_comment(b"entry comment")
                    .with_extra(b"\xca\xfe\x04\x00abcd")
                    .with_host(0),
            ],
            b"archive comment",
        );

        assert_eq!(copy_all(&data, |_| true), data);
    }

    #[test]
    fn test_central_records_survive_except_offset() {
        let dropped = RawEntry::new("lib/dep.so", b"\x7fELF");
        let kept = RawEntry::new("D.class", b"class D")
            .with_comment(b"kept")
            .with_extra(b"\xca\xfe\x02\x00hi")
            .with_host(0);
        let data = create_raw_jar(&[dropped, kept], b"");

        let output = copy_all(&data, |name| !name.starts_with("lib/"));

        let source = open(&data);
        let copied = open(&output);
        let before = &source.records()[1].raw;
        let after = &copied.records()[0].raw;
        assert_eq!(before.len(), after.len());
        assert_eq!(before[..CENTRAL_OFFSET_FIELD], after[..CENTRAL_OFFSET_FIELD]);
        assert_eq!(before[CENTRAL_OFFSET_FIELD + 4..], after[CENTRAL_OFFSET_FIELD + 4..]);
        assert_eq!(read_u32(after, CENTRAL_OFFSET_FIELD), 0);

        assert_eq!(output, create_raw_jar(&[kept], b""));
    }

    #[test]
    fn test_duplicate_names_are_all_visible() {
        let data = create_raw_jar(
            &[
                RawEntry::new("A.class", b"first"),
                RawEntry::new("B.class", b"b"),
                RawEntry::new("A.class", b"second"),
            ],
            b"",
        );

        let source = open(&data);
        let names: Vec<&str> = source.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["A.class", "B.class", "A.class"]);
    }

    #[test]
    fn test_data_descriptor_is_copied() {
        // Without a seekable sink the zip writer streams each entry with a data descriptor.
        let mut writer = zip::ZipWriter::new_stream(Vec::new());
        for (name, data) in [("A.class", b"class A"), ("B.class", b"class B")] {
            writer
                .start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        let streamed = writer.finish().unwrap().into_inner();

        let output = copy_all(&streamed, |name| name != "A.class");

        let mut archive = ZipArchive::new(Cursor::new(output)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut contents = String::new();
        archive
            .by_name("B.class")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "class B");
    }

    #[test]
    fn test_zip_crate_output_is_readable_after_copy() {
        let data = create_test_jar(&[("A.class", b"class A"), ("B.class", b"class B")]);
        let output = copy_all(&data, |_| true);

        let archive = ZipArchive::new(Cursor::new(output)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_rejects_non_zip_input() {
        assert!(SourceArchive::open(Cursor::new(b"not a zip".to_vec())).is_err());
    }

    #[test]
    fn test_empty_archive_round_trip() {
        let data = create_raw_jar(&[], b"");
        let output = copy_all(&data, |_| true);
        assert_eq!(output, data);
        assert!(open(&output).is_empty());
    }

    #[test]
    fn test_find_extra_field() {
        let extra = b"\xca\xfe\x02\x00hi\x01\x00\x08\x00\x01\x02\x03\x04\x05\x06\x07\x08";
        assert_eq!(find_extra_field(extra, 0xfeca), Some((4, 6)));
        assert_eq!(find_extra_field(extra, ZIP64_EXTRA_FIELD_TAG), Some((10, 18)));
        assert_eq!(find_extra_field(extra, 0x5455), None);
        assert_eq!(find_extra_field(b"\x01\x00\x10\x00ab", 1), None);
    }
}
