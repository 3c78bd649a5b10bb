//! `--create-index <dir> [<name>]`: builds a repository index plus its file
//! index sidecar over every `.tpm2` file in `<dir>` (spec §6).

use std::path::Path;

use rsa::Pkcs1v15Sign;
use rsa::RsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use tpm_core::{Error, Result};
use tpm_transport::{SectionType, read_transport_file};

use crate::output;

const INDEX_VERSION_LINE: &str = "tpm_repo_index 1.0\n";

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Builds the "dense directory" file index sidecar (spec §6): one
/// `<name@arch:version>\0<offset>` entry per package, terminated by
/// `\0<file-size>`, with each offset pointing at that package's raw
/// `file_index` section copied verbatim into this file.
fn build_findex(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let directory_len: usize = entries.iter().map(|(key, _)| key.len() + 1 + 8).sum::<usize>() + 1 + 8;
    let mut out = Vec::new();
    let mut offset = directory_len as u64;
    for (key, blob) in entries {
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(&offset.to_le_bytes());
        offset += blob.len() as u64;
    }
    let total_size = offset;
    out.push(0);
    out.extend_from_slice(&total_size.to_le_bytes());
    for (_, blob) in entries {
        out.extend_from_slice(blob);
    }
    out
}

pub fn run(dir: &Path, name: Option<&str>, sign_key_name: Option<&str>) -> Result<()> {
    let name = name.unwrap_or("main");
    let entries_dir = std::fs::read_dir(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;

    let mut body = String::new();
    body.push_str(INDEX_VERSION_LINE);

    let mut findex_entries = Vec::new();
    let mut pkg_blocks = Vec::new();

    for entry in entries_dir {
        let entry = entry.map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tpm2") {
            continue;
        }

        let raw = std::fs::read(&path).map_err(|source| Error::Io { path: path.clone(), source })?;
        let transport = match read_transport_file(&path) {
            Ok(t) => t,
            Err(e) => {
                output::warning(&format!("skipping {}: {e}", path.display()));
                continue;
            }
        };
        let Some(desc_xml) = transport.section(SectionType::Desc) else {
            output::warning(&format!("skipping {}: no desc section", path.display()));
            continue;
        };
        let descriptor = match tpm_transport::parse_desc_xml(desc_xml) {
            Ok(d) => d,
            Err(e) => {
                output::warning(&format!("skipping {}: {e}", path.display()));
                continue;
            }
        };

        let key = format!("{}@{}:{}", descriptor.name, descriptor.arch, descriptor.version);
        findex_entries.push((key, transport.section(SectionType::FileIndex).unwrap_or(&[]).to_vec()));

        pkg_blocks.push(format!("{}\n{}\n", String::from_utf8_lossy(desc_xml), sha256_hex(&raw)));
    }

    if pkg_blocks.is_empty() {
        return Err(Error::Archive(format!("no readable .tpm2 files found under {}", dir.display())));
    }

    let findex = build_findex(&findex_entries);
    let findex_name = format!("{name}.findex");
    body.push_str(&format!("{findex_name} {}\n", sha256_hex(&findex)));
    for block in &pkg_blocks {
        body.push_str(block);
    }

    let mut out_bytes = body.into_bytes();
    if let Some(key_path) = sign_key_name {
        let signature = sign_index(key_path, &out_bytes)?;
        let key_name = Path::new(key_path).file_stem().and_then(|s| s.to_str()).unwrap_or("key");
        out_bytes.extend_from_slice(format!("\nRSA Signature with key: {key_name}\n").as_bytes());
        out_bytes.extend_from_slice(wrap_hex(&signature, 72).as_bytes());
        out_bytes.push(b'\n');
    }

    let index_path = dir.join(format!("{name}.index"));
    let findex_path = dir.join(&findex_name);
    std::fs::write(&index_path, &out_bytes).map_err(|source| Error::Io { path: index_path.clone(), source })?;
    std::fs::write(&findex_path, &findex).map_err(|source| Error::Io { path: findex_path.clone(), source })?;

    output::success(&format!("wrote {} ({} packages)", index_path.display(), pkg_blocks.len()));
    Ok(())
}

/// Signing a repository index needs the matching private key, which
/// (unlike the public `.pub` keys under `keys/`) is never stored in the
/// target tree; it is read from the path named by `--sign`.
fn sign_index(key_path: &str, data: &[u8]) -> Result<Vec<u8>> {
    let pem = std::fs::read_to_string(key_path).map_err(|source| Error::Io { path: key_path.into(), source })?;
    let key = RsaPrivateKey::from_pkcs8_pem(&pem)
        .map_err(|e| Error::Parse { context: "private key".into(), message: e.to_string() })?;
    let hashed = Sha256::digest(data);
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(|e| Error::Parse { context: "signing".into(), message: e.to_string() })
}

fn wrap_hex(bytes: &[u8], width: usize) -> String {
    let hex = hex::encode(bytes);
    hex.as_bytes()
        .chunks(width)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
