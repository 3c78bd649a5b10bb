//! Repository index parsing and signature verification (spec §6).
//!
//! The index is line-oriented but embeds whole `desc.xml` blocks, so it
//! can't be read with a plain line iterator end to end — each `<pkg>` block
//! is carved out by its closing tag before the surrounding lines resume.

use rsa::Pkcs1v15Sign;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

use tpm_core::error::SignatureErrorKind;
use tpm_core::{Error, Result};

use crate::desc::{PackageDescriptor, parse_desc_xml};

const SUPPORTED_INDEX_VERSION: &str = "1.0";

/// One package entry in a repository index: its description plus the
/// SHA-256 digest of its `.tpm2` archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub descriptor: PackageDescriptor,
    pub archive_sha256: [u8; 32],
}

/// A parsed, optionally signature-verified repository index.
#[derive(Debug, Clone)]
pub struct RepositoryIndex {
    pub findex_name: String,
    pub findex_sha256: [u8; 32],
    pub entries: Vec<IndexEntry>,
    pub signed: bool,
}

fn fail(message: impl Into<String>) -> Error {
    Error::Parse {
        context: "repository index".into(),
        message: message.into(),
    }
}

fn parse_sha256_line(line: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(line.trim()).map_err(|e| fail(format!("bad sha256 hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| fail("sha256 digest is not 32 bytes"))
}

/// Parses a repository index. If `public_key` is given, a trailing RSA
/// signature is verified and `require_signature` controls whether an
/// unsigned index is an error.
pub fn parse_index(
    bytes: &[u8],
    public_key: Option<&RsaPublicKey>,
    require_signature: bool,
) -> Result<RepositoryIndex> {
    let text = std::str::from_utf8(bytes).map_err(|e| fail(e.to_string()))?;

    let mut lines = text.split_inclusive('\n');
    let header = lines.next().ok_or_else(|| fail("empty index"))?;
    if header.trim_end() != format!("tpm_repo_index {SUPPORTED_INDEX_VERSION}") {
        return Err(Error::Signature {
            kind: SignatureErrorKind::UnsupportedIndexVersion,
        });
    }

    let findex_line = lines.next().ok_or_else(|| fail("missing findex line"))?;
    let mut findex_parts = findex_line.trim_end().splitn(2, ' ');
    let findex_name = findex_parts
        .next()
        .ok_or_else(|| fail("missing findex name"))?
        .to_string();
    let findex_sha256 = parse_sha256_line(findex_parts.next().ok_or_else(|| fail("missing findex digest"))?)?;

    let mut consumed_len = header.len() + findex_line.len();
    let mut entries = Vec::new();
    let mut rest = &text[consumed_len..];

    loop {
        let trimmed_start = rest.trim_start_matches('\n');
        if trimmed_start.is_empty() {
            break;
        }
        if !trimmed_start.starts_with("<pkg") {
            break;
        }
        let skipped = rest.len() - trimmed_start.len();
        let close_tag = "</pkg>";
        let close_idx = trimmed_start
            .find(close_tag)
            .ok_or_else(|| fail("unterminated <pkg> block"))?
            + close_tag.len();
        let pkg_xml = &trimmed_start[..close_idx];
        let descriptor = parse_desc_xml(pkg_xml.as_bytes())?;

        let after_pkg = &trimmed_start[close_idx..];
        let after_pkg = after_pkg.strip_prefix('\n').unwrap_or(after_pkg);
        let digest_line_end = after_pkg.find('\n').map_or(after_pkg.len(), |i| i + 1);
        let digest_line = &after_pkg[..digest_line_end];
        let archive_sha256 = parse_sha256_line(digest_line)?;

        entries.push(IndexEntry { descriptor, archive_sha256 });

        let block_len = skipped + close_idx + (trimmed_start.len() - close_idx - after_pkg.len()) + digest_line_end;
        consumed_len += block_len;
        rest = &text[consumed_len..];
    }

    let signature_marker = "RSA Signature with key: ";
    let remainder = rest.trim_start_matches('\n');
    let signed = remainder.starts_with(signature_marker);

    if signed {
        let key_line_end = remainder.find('\n').map_or(remainder.len(), |i| i + 1);
        let key_name = remainder[signature_marker.len()..key_line_end].trim();
        let signature_hex: String = remainder[key_line_end..].chars().filter(|c| !c.is_whitespace()).collect();
        let signature = hex::decode(&signature_hex).map_err(|e| fail(format!("bad signature hex: {e}")))?;

        if let Some(key) = public_key {
            let signed_region = &bytes[..consumed_len];
            verify_signature(signed_region, &signature, key)?;
        } else if require_signature {
            return Err(fail(format!("index signed with key '{key_name}' but no public key was supplied")));
        }
    } else if require_signature {
        return Err(Error::Signature {
            kind: SignatureErrorKind::AuthenticationFailedNoSignature,
        });
    }

    Ok(RepositoryIndex {
        findex_name,
        findex_sha256,
        entries,
        signed,
    })
}

/// Verifies an RSA-SHA256/PKCS#1-v1.5 signature over `data`.
pub fn verify_signature(data: &[u8], signature: &[u8], key: &RsaPublicKey) -> Result<()> {
    let hashed = Sha256::digest(data);
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
        .map_err(|_| Error::Signature {
            kind: SignatureErrorKind::AuthenticationFailed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PKG: &str = "<pkg file_version=\"2.0\"><name>libfoo</name><arch>amd64</arch><version>1.0</version><source_version>1.0</source_version></pkg>";

    #[test]
    fn parses_an_unsigned_index_with_one_entry() {
        let digest = "a".repeat(64);
        let findex_digest = "b".repeat(64);
        let text = format!(
            "tpm_repo_index 1.0\nmain.findex {findex_digest}\n{SAMPLE_PKG}\n{digest}\n"
        );
        let index = parse_index(text.as_bytes(), None, false).unwrap();
        assert_eq!(index.entries.len(), 1);
        assert_eq!(index.entries[0].descriptor.name, "libfoo");
        assert!(!index.signed);
    }

    #[test]
    fn unsupported_index_version_is_rejected() {
        let text = "tpm_repo_index 9.9\nmain.findex ".to_string() + &"a".repeat(64) + "\n";
        assert!(matches!(
            parse_index(text.as_bytes(), None, false),
            Err(Error::Signature { kind: SignatureErrorKind::UnsupportedIndexVersion })
        ));
    }

    #[test]
    fn required_signature_missing_is_rejected() {
        let digest = "a".repeat(64);
        let findex_digest = "b".repeat(64);
        let text = format!(
            "tpm_repo_index 1.0\nmain.findex {findex_digest}\n{SAMPLE_PKG}\n{digest}\n"
        );
        assert!(matches!(
            parse_index(text.as_bytes(), None, true),
            Err(Error::Signature { kind: SignatureErrorKind::AuthenticationFailedNoSignature })
        ));
    }
}
