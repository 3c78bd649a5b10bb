//! The transport-form package codec (spec §6): the `.tpm2` container
//! format, `desc.xml`, and repository indices.
//!
//! Unpacking the `0x80 archive` section is delegated to the system `tar`
//! binary via a subprocess rather than a TAR reader/writer implemented
//! here, the way a format an archive crate doesn't implement natively
//! gets shelled out to an external `7z`/`unrar` binary instead.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod desc;
mod file_record;
mod index;
mod toc;
mod xmltree;

pub use desc::{PackageDescriptor, parse_desc_xml};
pub use file_record::{decode_config_files, decode_file_records, encode_config_files, encode_file_record};
pub use index::{IndexEntry, RepositoryIndex, parse_index, verify_signature};
pub use toc::{SectionType, TransportFile, build_transport_file};

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use tpm_core::{Error, Result};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads a `.tpm2` file from disk, transparently gunzipping it if it
/// carries the gzip magic bytes ("typically gzip-wrapped", spec §6).
pub fn read_transport_file(path: &Path) -> Result<TransportFile> {
    let mut raw = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut raw))
        .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;

    let bytes = if raw.starts_with(&GZIP_MAGIC) {
        let mut decoder = flate2::read::GzDecoder::new(raw.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        out
    } else {
        raw
    };

    TransportFile::parse(bytes)
}

/// Unpacks the `0x80 archive` section to `dst` by piping it into a `tar`
/// subprocess, excluding `excluded_paths` (used to preserve locally
/// modified config files across an upgrade).
pub fn unpack_archive_to_directory(
    transport: &TransportFile,
    dst: &Path,
    excluded_paths: &[String],
) -> Result<()> {
    let archive = transport
        .section(SectionType::Archive)
        .ok_or_else(|| Error::Archive("transport file has no archive section".into()))?;

    std::fs::create_dir_all(dst).map_err(|source| Error::Io { path: dst.to_path_buf(), source })?;

    debug!(dst = ?dst, excluded = excluded_paths.len(), "unpacking archive via tar");

    let mut cmd = Command::new("tar");
    cmd.arg("-x")
        .arg("-f")
        .arg("-")
        .arg("-C")
        .arg(dst)
        .arg("--no-same-owner");
    for path in excluded_paths {
        cmd.arg("--exclude").arg(path.trim_start_matches('/'));
    }
    cmd.stdin(std::process::Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| Error::Archive(format!("failed to spawn tar: {e}")))?;
    {
        use std::io::Write;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Archive("tar stdin pipe unavailable".into()))?;
        stdin
            .write_all(archive)
            .map_err(|e| Error::Archive(format!("failed writing to tar stdin: {e}")))?;
    }
    let status = child.wait().map_err(|e| Error::Archive(format!("failed waiting on tar: {e}")))?;
    if !status.success() {
        return Err(Error::Archive(format!("tar exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_an_uncompressed_transport_file() {
        let raw = build_transport_file(&[(SectionType::Desc, b"<pkg/>")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo-1.0_amd64.tpm2");
        std::fs::write(&path, &raw).unwrap();

        let transport = read_transport_file(&path).unwrap();
        assert_eq!(transport.section(SectionType::Desc), Some(&b"<pkg/>"[..]));
    }

    #[test]
    fn reads_a_gzip_wrapped_transport_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let raw = build_transport_file(&[(SectionType::Desc, b"<pkg/>")]);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let gz = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo-1.0_amd64.tpm2");
        std::fs::write(&path, &gz).unwrap();

        let transport = read_transport_file(&path).unwrap();
        assert_eq!(transport.section(SectionType::Desc), Some(&b"<pkg/>"[..]));
    }
}
