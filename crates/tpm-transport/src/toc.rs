//! The transport-form container: header byte, section count, and the
//! `{ type, start, size }` table of contents (spec §6).

use tpm_core::{Error, Result};

/// The only transport-form version this parser understands.
pub const SUPPORTED_VERSION: u8 = 1;

/// One transport-form section type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    Desc,
    Preinst,
    Configure,
    Unconfigure,
    Postrm,
    FileIndex,
    ConfigFiles,
    Archive,
    /// `0xf0`. Never produced or interpreted here; carried opaquely so a
    /// future transport-form writer could round-trip it untouched.
    OpenPgpSignature,
    /// Any byte this build doesn't recognize; preserved opaquely as well.
    Unknown(u8),
}

impl SectionType {
    const fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Desc,
            0x01 => Self::Preinst,
            0x02 => Self::Configure,
            0x03 => Self::Unconfigure,
            0x04 => Self::Postrm,
            0x05 => Self::FileIndex,
            0x06 => Self::ConfigFiles,
            0x80 => Self::Archive,
            0xf0 => Self::OpenPgpSignature,
            other => Self::Unknown(other),
        }
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::Desc => 0x00,
            Self::Preinst => 0x01,
            Self::Configure => 0x02,
            Self::Unconfigure => 0x03,
            Self::Postrm => 0x04,
            Self::FileIndex => 0x05,
            Self::ConfigFiles => 0x06,
            Self::Archive => 0x80,
            Self::OpenPgpSignature => 0xf0,
            Self::Unknown(b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TocEntry {
    section_type: SectionType,
    start: u32,
    size: u32,
}

const TOC_ENTRY_LEN: usize = 9;

/// A parsed transport-form file (already gunzipped, if it was wrapped).
#[derive(Debug, Clone)]
pub struct TransportFile {
    bytes: Vec<u8>,
    toc: Vec<TocEntry>,
}

impl TransportFile {
    /// Parses the header, section count, and TOC of `bytes`. Section bodies
    /// are not copied out; they're sliced from `bytes` on demand.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let fail = |msg: &str| Error::Parse {
            context: "transport-form file".into(),
            message: msg.to_string(),
        };

        let version = *bytes.first().ok_or_else(|| fail("empty file"))?;
        if version != SUPPORTED_VERSION {
            return Err(fail(&format!("unsupported transport-form version {version}")));
        }
        let count = *bytes.get(1).ok_or_else(|| fail("missing section count"))? as usize;

        let toc_start = 2;
        let toc_end = toc_start + count * TOC_ENTRY_LEN;
        let toc_bytes = bytes
            .get(toc_start..toc_end)
            .ok_or_else(|| fail("truncated table of contents"))?;

        let mut toc = Vec::with_capacity(count);
        for chunk in toc_bytes.chunks_exact(TOC_ENTRY_LEN) {
            let section_type = SectionType::from_byte(chunk[0]);
            let start = u32::from_le_bytes(chunk[1..5].try_into().unwrap());
            let size = u32::from_le_bytes(chunk[5..9].try_into().unwrap());
            if bytes.len() < start as usize + size as usize {
                return Err(fail("section extends past end of file"));
            }
            toc.push(TocEntry { section_type, start, size });
        }

        Ok(Self { bytes, toc })
    }

    /// Returns the bytes of the first section of type `section_type`, if
    /// present.
    #[must_use]
    pub fn section(&self, section_type: SectionType) -> Option<&[u8]> {
        self.toc.iter().find(|e| e.section_type == section_type).map(|e| {
            let start = e.start as usize;
            let end = start + e.size as usize;
            &self.bytes[start..end]
        })
    }

    /// Every section type present, in TOC order, including unrecognized or
    /// opaque ones.
    #[must_use]
    pub fn section_types(&self) -> Vec<SectionType> {
        self.toc.iter().map(|e| e.section_type).collect()
    }
}

/// Builds a transport-form file from `sections`, in the order given.
#[must_use]
pub fn build_transport_file(sections: &[(SectionType, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut toc = Vec::with_capacity(sections.len());
    for (section_type, data) in sections {
        let start = body.len() as u32;
        toc.push((section_type.to_byte(), start, data.len() as u32));
        body.extend_from_slice(data);
    }

    let mut out = Vec::with_capacity(2 + toc.len() * TOC_ENTRY_LEN + body.len());
    out.push(SUPPORTED_VERSION);
    out.push(toc.len() as u8);
    for (type_byte, start, size) in toc {
        out.push(type_byte);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sections_through_build_and_parse() {
        let desc = b"<pkg/>";
        let archive = b"tarbytes";
        let raw = build_transport_file(&[
            (SectionType::Desc, desc),
            (SectionType::Archive, archive),
        ]);
        let parsed = TransportFile::parse(raw).unwrap();
        assert_eq!(parsed.section(SectionType::Desc), Some(&desc[..]));
        assert_eq!(parsed.section(SectionType::Archive), Some(&archive[..]));
        assert!(parsed.section(SectionType::Postrm).is_none());
    }

    #[test]
    fn unsupported_version_byte_is_rejected() {
        let mut raw = build_transport_file(&[(SectionType::Desc, b"x")]);
        raw[0] = 2;
        assert!(TransportFile::parse(raw).is_err());
    }

    #[test]
    fn an_unrecognized_section_type_is_preserved_opaquely() {
        let raw = build_transport_file(&[(SectionType::Unknown(0x7f), b"mystery")]);
        let parsed = TransportFile::parse(raw).unwrap();
        assert_eq!(parsed.section_types(), vec![SectionType::Unknown(0x7f)]);
    }
}
