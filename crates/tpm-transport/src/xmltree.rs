//! A minimal in-memory XML tree, used by [`crate::desc`] and [`crate::index`]
//! to validate `desc.xml` documents against spec: duplicate elements and
//! unknown child elements are parse errors, which is awkward to express
//! with a one-shot streaming reader but straightforward against a tree.

use quick_xml::Reader;
use quick_xml::events::Event;
use tpm_core::Error;

#[derive(Debug, Clone)]
pub(crate) struct XmlElem {
    pub(crate) name: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) children: Vec<XmlElem>,
    pub(crate) text: String,
}

impl XmlElem {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Returns the single child named `name`, erroring if it is missing,
    /// duplicated.
    pub(crate) fn child(&self, name: &str) -> Result<&XmlElem, Error> {
        let mut found = None;
        for child in &self.children {
            if child.name == name {
                if found.is_some() {
                    return Err(parse_err(format!("duplicate element <{name}>")));
                }
                found = Some(child);
            }
        }
        found.ok_or_else(|| parse_err(format!("missing required element <{name}>")))
    }

    pub(crate) fn try_child(&self, name: &str) -> Result<Option<&XmlElem>, Error> {
        match self.child(name) {
            Ok(elem) => Ok(Some(elem)),
            Err(_) if !self.children.iter().any(|c| c.name == name) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a XmlElem> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Verifies every child's tag is in `allowed`, i.e. there is no element
    /// this parser doesn't know about.
    pub(crate) fn ensure_known_children(&self, allowed: &[&str]) -> Result<(), Error> {
        for child in &self.children {
            if !allowed.contains(&child.name.as_str()) {
                return Err(parse_err(format!(
                    "unknown element <{}> inside <{}>",
                    child.name, self.name
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_err(message: String) -> Error {
    Error::Parse {
        context: "desc.xml".into(),
        message,
    }
}

pub(crate) fn parse_xml_tree(bytes: &[u8]) -> Result<XmlElem, Error> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElem> = Vec::new();
    let mut root: Option<XmlElem> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_err(e.to_string()))?;
        match event {
            Event::Start(tag) => {
                let name = decode(tag.name().as_ref());
                let mut attrs = Vec::new();
                for a in tag.attributes() {
                    let a = a.map_err(|e| parse_err(e.to_string()))?;
                    attrs.push((decode(a.key.as_ref()), decode(&a.value)));
                }
                stack.push(XmlElem {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: String::new(),
                });
            }
            Event::Empty(tag) => {
                let name = decode(tag.name().as_ref());
                let mut attrs = Vec::new();
                for a in tag.attributes() {
                    let a = a.map_err(|e| parse_err(e.to_string()))?;
                    attrs.push((decode(a.key.as_ref()), decode(&a.value)));
                }
                let elem = XmlElem {
                    name,
                    attrs,
                    children: Vec::new(),
                    text: String::new(),
                };
                push_finished(&mut stack, &mut root, elem)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&decode(&t));
                }
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| parse_err("unbalanced closing tag".into()))?;
                push_finished(&mut stack, &mut root, elem)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| parse_err("empty document".into()))
}

fn push_finished(
    stack: &mut Vec<XmlElem>,
    root: &mut Option<XmlElem>,
    elem: XmlElem,
) -> Result<(), Error> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None => {
            if root.is_some() {
                return Err(parse_err("multiple root elements".into()));
            }
            *root = Some(elem);
        }
    }
    Ok(())
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
