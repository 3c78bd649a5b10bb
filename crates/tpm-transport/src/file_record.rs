//! `FileRecord` binary layout (spec §6):
//! `type u8 | uid u32 LE | gid u32 LE | mode u16 LE | size u32 LE | sha1[20] | path\0`

use tpm_core::{Error, FileEntry, FileKind, Result};

const RECORD_FIXED_LEN: usize = 1 + 4 + 4 + 2 + 4 + 20;

fn kind_to_byte(kind: FileKind) -> u8 {
    match kind {
        FileKind::Regular => 0,
        FileKind::Directory => 1,
        FileKind::Symlink => 2,
    }
}

fn kind_from_byte(b: u8) -> Result<FileKind> {
    match b {
        0 => Ok(FileKind::Regular),
        1 => Ok(FileKind::Directory),
        2 => Ok(FileKind::Symlink),
        other => Err(Error::Parse {
            context: "file_index section".into(),
            message: format!("unknown FileRecord type byte {other}"),
        }),
    }
}

/// Encodes one [`FileEntry`] using the transport-form `FileRecord` layout.
pub fn encode_file_record(entry: &FileEntry) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_FIXED_LEN + entry.path.len() + 1);
    buf.push(kind_to_byte(entry.kind));
    buf.extend_from_slice(&entry.uid.to_le_bytes());
    buf.extend_from_slice(&entry.gid.to_le_bytes());
    buf.extend_from_slice(&entry.mode.to_le_bytes());
    buf.extend_from_slice(&entry.size.to_le_bytes());
    buf.extend_from_slice(&entry.sha1);
    buf.extend_from_slice(entry.path.as_bytes());
    buf.push(0);
    buf
}

/// Parses every `FileRecord` packed back-to-back in `section` (the
/// `0x05 file_index` transport section).
pub fn decode_file_records(section: &[u8]) -> Result<Vec<FileEntry>> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < section.len() {
        let (entry, consumed) = decode_one(section, offset)?;
        records.push(entry);
        offset += consumed;
    }
    Ok(records)
}

fn decode_one(section: &[u8], offset: usize) -> Result<(FileEntry, usize)> {
    let fail = || Error::Parse {
        context: "file_index section".into(),
        message: "truncated FileRecord".into(),
    };
    let rest = section.get(offset..).ok_or_else(fail)?;
    if rest.len() < RECORD_FIXED_LEN {
        return Err(fail());
    }
    let kind = kind_from_byte(rest[0])?;
    let uid = u32::from_le_bytes(rest[1..5].try_into().unwrap());
    let gid = u32::from_le_bytes(rest[5..9].try_into().unwrap());
    let mode = u16::from_le_bytes(rest[9..11].try_into().unwrap());
    let size = u32::from_le_bytes(rest[11..15].try_into().unwrap());
    let mut sha1 = [0u8; 20];
    sha1.copy_from_slice(&rest[15..35]);

    let path_start = RECORD_FIXED_LEN;
    let nul = rest[path_start..].iter().position(|&b| b == 0).ok_or_else(fail)?;
    let path = String::from_utf8(rest[path_start..path_start + nul].to_vec()).map_err(|e| Error::Parse {
        context: "file_index section".into(),
        message: e.to_string(),
    })?;

    let consumed = path_start + nul + 1;
    Ok((
        FileEntry {
            path,
            kind,
            uid,
            gid,
            mode,
            size,
            sha1,
        },
        consumed,
    ))
}

/// Parses the newline-separated `0x06 config_files` transport section.
pub fn decode_config_files(section: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(section).map_err(|e| Error::Parse {
        context: "config_files section".into(),
        message: e.to_string(),
    })?;
    Ok(text.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
}

/// Encodes a list of config file paths as the `0x06` transport section.
#[must_use]
pub fn encode_config_files(paths: &[String]) -> Vec<u8> {
    let mut buf = paths.join("\n").into_bytes();
    if !paths.is_empty() {
        buf.push(b'\n');
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_file_record() {
        let entry = FileEntry {
            path: "/usr/bin/foo".into(),
            kind: FileKind::Regular,
            uid: 0,
            gid: 0,
            mode: 0o755,
            size: 12345,
            sha1: [7u8; 20],
        };
        let encoded = encode_file_record(&entry);
        let decoded = decode_file_records(&encoded).unwrap();
        assert_eq!(decoded, vec![entry]);
    }

    #[test]
    fn decodes_several_concatenated_records() {
        let a = FileEntry {
            path: "/a".into(),
            kind: FileKind::Regular,
            uid: 1,
            gid: 1,
            mode: 0o644,
            size: 1,
            sha1: [1u8; 20],
        };
        let b = FileEntry {
            path: "/b/dir".into(),
            kind: FileKind::Directory,
            uid: 0,
            gid: 0,
            mode: 0o755,
            size: 0,
            sha1: [0u8; 20],
        };
        let mut buf = encode_file_record(&a);
        buf.extend(encode_file_record(&b));
        assert_eq!(decode_file_records(&buf).unwrap(), vec![a, b]);
    }

    #[test]
    fn config_files_round_trip() {
        let paths = vec!["/etc/foo.conf".to_string(), "/etc/bar.conf".to_string()];
        let encoded = encode_config_files(&paths);
        assert_eq!(decode_config_files(&encoded).unwrap(), paths);
    }
}
