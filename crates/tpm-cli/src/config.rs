//! Loads `<target>/etc/tpm2/config.xml` (the repository list) and
//! `<target>/etc/tpm2/keys/*.pub` (RSA public keys used to verify a signed
//! repository index, spec §6).

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use tpm_core::{AHashMap, Error, Result};
use tpm_provider::{DirectoryRepository, Provider};
use tracing::warn;

/// One `<repo path="...">` entry from `config.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub path: PathBuf,
}

fn parse_err(message: impl Into<String>) -> Error {
    Error::Parse {
        context: "config.xml".into(),
        message: message.into(),
    }
}

/// Reads and parses `<target>/etc/tpm2/config.xml`. A missing file yields
/// no configured repositories rather than an error, matching a freshly
/// bootstrapped target that hasn't been given any sources yet.
pub fn load_repositories(target: &Path) -> Result<Vec<RepositoryConfig>> {
    let path = target.join("etc/tpm2/config.xml");
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(Error::Io { path, source }),
    };

    let mut reader = Reader::from_reader(bytes.as_slice());
    reader.config_mut().trim_text(true);

    let mut repos = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(|e| parse_err(e.to_string()))? {
            Event::Start(tag) | Event::Empty(tag) if tag.name().as_ref() == b"repo" => {
                let mut repo_path = None;
                for attr in tag.attributes() {
                    let attr = attr.map_err(|e| parse_err(e.to_string()))?;
                    if attr.key.as_ref() == b"path" {
                        repo_path = Some(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
                let repo_path = repo_path.ok_or_else(|| parse_err("<repo> missing 'path' attribute"))?;
                repos.push(RepositoryConfig { path: target.join(repo_path.trim_start_matches('/')) });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(repos)
}

/// Builds a [`Provider`] over every configured repository, in the order
/// `config.xml` lists them (earlier entries take priority, spec §4.4).
pub fn build_provider(target: &Path) -> Result<Provider> {
    let repos = load_repositories(target)?;
    let boxed = repos
        .into_iter()
        .map(|r| Box::new(DirectoryRepository::new(r.path)) as Box<dyn tpm_provider::Repository>)
        .collect();
    Ok(Provider::new(boxed))
}

/// Loads every `<target>/etc/tpm2/keys/*.pub` file, keyed by file stem (the
/// `<name>` a signed index's `RSA Signature with key: <name>` line refers
/// to). A missing `keys/` directory yields an empty map.
pub fn load_public_keys(target: &Path) -> Result<AHashMap<String, RsaPublicKey>> {
    let dir = target.join("etc/tpm2/keys");
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AHashMap::new()),
        Err(source) => return Err(Error::Io { path: dir, source }),
    };

    let mut keys = AHashMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io { path: dir.clone(), source })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pub") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let pem = std::fs::read_to_string(&path).map_err(|source| Error::Io { path: path.clone(), source })?;
        match RsaPublicKey::from_public_key_pem(&pem) {
            Ok(key) => {
                keys.insert(stem.to_string(), key);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable public key"),
        }
    }
    Ok(keys)
}

/// Loads the single key named `name` out of `<target>/etc/tpm2/keys`, as
/// named by `--sign <keyfile>` (a bare key name, not a path).
pub fn load_named_key(target: &Path, name: &str) -> Result<RsaPublicKey> {
    let keys = load_public_keys(target)?;
    keys.get(name)
        .cloned()
        .ok_or_else(|| parse_err(format!("no public key named '{name}' under {}/etc/tpm2/keys", target.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_no_repositories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_repositories(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn parses_repo_entries_in_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let etc = dir.path().join("etc/tpm2");
        std::fs::create_dir_all(&etc).unwrap();
        std::fs::write(
            etc.join("config.xml"),
            r#"<config><repositories><repo path="/var/lib/tpm/repos/a"/><repo path="/var/lib/tpm/repos/b"/></repositories></config>"#,
        )
        .unwrap();

        let repos = load_repositories(dir.path()).unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].path, dir.path().join("var/lib/tpm/repos/a"));
        assert_eq!(repos[1].path, dir.path().join("var/lib/tpm/repos/b"));
    }

    #[test]
    fn missing_keys_directory_yields_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_public_keys(dir.path()).unwrap().is_empty());
    }
}
