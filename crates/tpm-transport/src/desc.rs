//! `desc.xml` parsing (spec §6): a package's metadata description, minus
//! the persisted state and installation reason, which only exist once a
//! package has entered the database.

use tpm_core::{
    Architecture, Constraint, ConstraintOp, ConstraintTarget, Dependency, Formula,
    InstallationReason, PackageMetaData, PackageState, Result, VersionNumber,
};

use crate::xmltree::{XmlElem, parse_err, parse_xml_tree};

/// A package's description as read from its transport-form `0x00` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub arch: Architecture,
    pub version: VersionNumber,
    pub source_version: VersionNumber,
    pub pre_dependencies: Vec<Dependency>,
    pub dependencies: Vec<Dependency>,
    pub interested_triggers: Vec<String>,
    pub activated_triggers: Vec<String>,
}

impl PackageDescriptor {
    /// Promotes this descriptor into full metadata once a state and an
    /// installation reason are known.
    #[must_use]
    pub fn into_metadata(self, state: PackageState, reason: InstallationReason) -> PackageMetaData {
        PackageMetaData {
            name: self.name,
            arch: self.arch,
            version: self.version,
            source_version: self.source_version,
            state,
            installation_reason: reason,
            pre_dependencies: self.pre_dependencies,
            dependencies: self.dependencies,
            interested_triggers: self.interested_triggers,
            activated_triggers: self.activated_triggers,
        }
    }
}

/// The only `file_version` this parser understands.
const SUPPORTED_FILE_VERSION: &str = "2.0";

/// Parses a `desc.xml` document.
pub fn parse_desc_xml(bytes: &[u8]) -> Result<PackageDescriptor> {
    let root = parse_xml_tree(bytes)?;
    if root.name != "pkg" {
        return Err(parse_err(format!("root element is <{}>, expected <pkg>", root.name)));
    }
    let file_version = root.attr("file_version").ok_or_else(|| parse_err("<pkg> missing file_version attribute".into()))?;
    if file_version != SUPPORTED_FILE_VERSION {
        return Err(parse_err(format!(
            "unsupported desc.xml file_version '{file_version}'"
        )));
    }
    root.ensure_known_children(&[
        "name",
        "arch",
        "version",
        "source_version",
        "pre-dependencies",
        "dependencies",
        "triggers",
    ])?;

    let name = root.child("name")?.text.clone();
    let arch: Architecture = root.child("arch")?.text.parse()?;
    let version = VersionNumber::parse(&root.child("version")?.text)?;
    let source_version = VersionNumber::parse(&root.child("source_version")?.text)?;

    let pre_dependencies = match root.try_child("pre-dependencies")? {
        Some(elem) => parse_dependency_list(elem)?,
        None => Vec::new(),
    };
    let dependencies = match root.try_child("dependencies")? {
        Some(elem) => parse_dependency_list(elem)?,
        None => Vec::new(),
    };

    let (interested_triggers, activated_triggers) = match root.try_child("triggers")? {
        Some(elem) => parse_triggers(elem)?,
        None => (Vec::new(), Vec::new()),
    };

    Ok(PackageDescriptor {
        name,
        arch,
        version,
        source_version,
        pre_dependencies,
        dependencies,
        interested_triggers,
        activated_triggers,
    })
}

fn parse_dependency_list(elem: &XmlElem) -> Result<Vec<Dependency>> {
    elem.ensure_known_children(&["dep"])?;
    elem.children_named("dep").map(parse_dep).collect()
}

fn parse_dep(dep: &XmlElem) -> Result<Dependency> {
    dep.ensure_known_children(&["name", "arch", "constr", "sconstr"])?;
    let name = dep.child("name")?.text.clone();
    let arch: Architecture = dep.child("arch")?.text.parse()?;

    let constr = dep.try_child("constr")?.map(|e| parse_constr(e, ConstraintTarget::Binary)).transpose()?;
    let sconstr = dep.try_child("sconstr")?.map(|e| parse_constr(e, ConstraintTarget::Source)).transpose()?;

    let constraint = Formula::And(constr.map(Box::new), sconstr.map(Box::new));

    Ok(Dependency { name, arch, constraint })
}

fn parse_constr(elem: &XmlElem, target: ConstraintTarget) -> Result<Formula> {
    let op_str = elem.attr("type").ok_or_else(|| parse_err("constraint element missing type attribute".into()))?;
    let op = constraint_op_from_desc_str(op_str)
        .ok_or_else(|| parse_err(format!("unknown constraint type '{op_str}'")))?;
    let version = VersionNumber::parse(&elem.text)?;
    Ok(Formula::Primitive(Constraint { target, op, version }))
}

fn constraint_op_from_desc_str(s: &str) -> Option<ConstraintOp> {
    match s {
        "eq" => Some(ConstraintOp::Eq),
        "neq" => Some(ConstraintOp::Ne),
        "geq" => Some(ConstraintOp::Ge),
        "leq" => Some(ConstraintOp::Le),
        "gt" => Some(ConstraintOp::Gt),
        "lt" => Some(ConstraintOp::Lt),
        _ => None,
    }
}

fn parse_triggers(elem: &XmlElem) -> Result<(Vec<String>, Vec<String>)> {
    elem.ensure_known_children(&["interested", "activate"])?;
    let interested = match elem.try_child("interested")? {
        Some(e) => parse_trigger_names(e)?,
        None => Vec::new(),
    };
    let activate = match elem.try_child("activate")? {
        Some(e) => parse_trigger_names(e)?,
        None => Vec::new(),
    };
    Ok((interested, activate))
}

fn parse_trigger_names(elem: &XmlElem) -> Result<Vec<String>> {
    elem.ensure_known_children(&["trigger"])?;
    Ok(elem.children_named("trigger").map(|c| c.text.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<pkg file_version="2.0">
        <name>libfoo</name>
        <arch>amd64</arch>
        <version>1.2</version>
        <source_version>1.2</source_version>
        <dependencies>
            <dep>
                <name>libbar</name>
                <arch>amd64</arch>
                <constr type="geq">1.0</constr>
            </dep>
        </dependencies>
        <triggers>
            <interested><trigger>ldconfig</trigger></interested>
        </triggers>
    </pkg>"#;

    #[test]
    fn parses_a_well_formed_descriptor() {
        let desc = parse_desc_xml(SAMPLE.as_bytes()).unwrap();
        assert_eq!(desc.name, "libfoo");
        assert_eq!(desc.arch, Architecture::Amd64);
        assert_eq!(desc.dependencies.len(), 1);
        assert_eq!(desc.dependencies[0].name, "libbar");
        assert_eq!(desc.interested_triggers, vec!["ldconfig"]);
    }

    #[test]
    fn rejects_unknown_child_elements() {
        let bad = SAMPLE.replace("<name>libfoo</name>", "<name>libfoo</name><bogus/>");
        assert!(parse_desc_xml(bad.as_bytes()).is_err());
    }

    #[test]
    fn rejects_duplicate_elements() {
        let bad = SAMPLE.replacen("<name>libfoo</name>", "<name>libfoo</name><name>libfoo</name>", 1);
        assert!(parse_desc_xml(bad.as_bytes()).is_err());
    }

    #[test]
    fn rejects_unsupported_file_version() {
        let bad = SAMPLE.replace("file_version=\"2.0\"", "file_version=\"1.0\"");
        assert!(parse_desc_xml(bad.as_bytes()).is_err());
    }
}
