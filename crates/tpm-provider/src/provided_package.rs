//! A package as read out of a repository: a lazy view over a transport-form
//! file's sections (spec §4.4).

use std::path::{Path, PathBuf};

use tpm_core::{FileEntry, Result};
use tpm_transport::{PackageDescriptor, SectionType, TransportFile, parse_desc_xml};

/// A package offered by a repository. Sections are re-parsed on every call
/// — the underlying streams are forward-seekable but re-reading a section
/// may require re-seeking, so no section is cached across calls here.
#[derive(Debug)]
pub struct ProvidedPackage {
    transport: TransportFile,
    origin: PathBuf,
}

impl ProvidedPackage {
    #[must_use]
    pub fn new(transport: TransportFile, origin: PathBuf) -> Self {
        Self { transport, origin }
    }

    /// The `.tpm2` file this package was read from.
    #[must_use]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Parses the `0x00 desc` section.
    pub fn mdata(&self) -> Result<PackageDescriptor> {
        let section = self.transport.section(SectionType::Desc).ok_or_else(|| tpm_core::Error::Parse {
            context: self.origin.display().to_string(),
            message: "package has no desc section".into(),
        })?;
        parse_desc_xml(section)
    }

    /// Parses the `0x05 file_index` section.
    pub fn file_list(&self) -> Result<Vec<FileEntry>> {
        match self.transport.section(SectionType::FileIndex) {
            Some(section) => tpm_transport::decode_file_records(section),
            None => Ok(Vec::new()),
        }
    }

    /// Parses the `0x06 config_files` section.
    pub fn config_files(&self) -> Result<Vec<String>> {
        match self.transport.section(SectionType::ConfigFiles) {
            Some(section) => tpm_transport::decode_config_files(section),
            None => Ok(Vec::new()),
        }
    }

    #[must_use]
    pub fn preinst(&self) -> Option<&[u8]> {
        self.transport.section(SectionType::Preinst)
    }

    #[must_use]
    pub fn configure(&self) -> Option<&[u8]> {
        self.transport.section(SectionType::Configure)
    }

    #[must_use]
    pub fn unconfigure(&self) -> Option<&[u8]> {
        self.transport.section(SectionType::Unconfigure)
    }

    #[must_use]
    pub fn postrm(&self) -> Option<&[u8]> {
        self.transport.section(SectionType::Postrm)
    }

    /// Unpacks the `0x80 archive` section to `dst`, excluding `excluded_paths`.
    pub fn unpack_archive_to_directory(&self, dst: &Path, excluded_paths: &[String]) -> Result<()> {
        tpm_transport::unpack_archive_to_directory(&self.transport, dst, excluded_paths)
    }
}
