//! The access widener dialect: a header naming the namespace its symbols
//! live in, then one record per class or member asking for `accessible`,
//! `extendable` or `mutable`. Owners are internal (slash) names.

use std::fmt::{self, Display, Formatter};

use failure::Error;

use crate::format::ParseError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AwAccess {
    Accessible,
    Extendable,
    Mutable,
}
impl AwAccess {
    fn parse(token: &str) -> Option<AwAccess> {
        Some(match token {
            "accessible" => AwAccess::Accessible,
            "extendable" => AwAccess::Extendable,
            "mutable" => AwAccess::Mutable,
            _ => return None,
        })
    }
}
impl Display for AwAccess {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            AwAccess::Accessible => "accessible",
            AwAccess::Extendable => "extendable",
            AwAccess::Mutable => "mutable",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AwTarget {
    Class {
        name: String,
    },
    Method {
        owner: String,
        name: String,
        desc: String,
    },
    Field {
        owner: String,
        name: String,
        desc: Option<String>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AwEntry {
    pub access: AwAccess,
    pub target: AwTarget,
}
impl Display for AwEntry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.target {
            AwTarget::Class { ref name } => write!(f, "{} class {}", self.access, name),
            AwTarget::Method {
                ref owner,
                ref name,
                ref desc,
            } => write!(f, "{} method {} {} {}", self.access, owner, name, desc),
            AwTarget::Field {
                ref owner,
                ref name,
                ref desc,
            } => {
                write!(f, "{} field {} {}", self.access, owner, name)?;
                if let Some(ref desc) = desc {
                    write!(f, " {}", desc)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AwFile {
    /// Namespace every owner/name/desc in the file is written in
    pub namespace: String,
    pub entries: Vec<AwEntry>,
}

pub fn parse_aw(text: &str, file: &str) -> Result<AwFile, Error> {
    let mut lines = text.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((index, raw)) => {
                let line = strip_comment(raw).trim();
                if !line.is_empty() {
                    break (index + 1, line.to_string());
                }
            }
            None => return Err(ParseError::at(file, 1, "empty access widener").into()),
        }
    };
    let (header_line, header_text) = header;
    let mut header_cols = header_text.split_whitespace();
    if header_cols.next() != Some("accessWidener") {
        return Err(ParseError::at(file, header_line, "missing accessWidener header").into());
    }
    match header_cols.next() {
        Some(version) if version.starts_with('v') => {}
        _ => return Err(ParseError::at(file, header_line, "missing format version").into()),
    }
    let namespace = match header_cols.next() {
        Some(namespace) => namespace.to_string(),
        None => return Err(ParseError::at(file, header_line, "missing namespace").into()),
    };

    let mut entries = Vec::new();
    for (index, raw) in lines {
        let line_number = index + 1;
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let mut cols = line.split_whitespace();
        let access_token = cols.next().unwrap();
        let access = match AwAccess::parse(access_token) {
            Some(access) => access,
            None => {
                return Err(ParseError::at(
                    file,
                    line_number,
                    format!("unknown access {:?}", access_token),
                )
                .into())
            }
        };
        let kind = cols.next().unwrap_or("");
        let target = match kind {
            "class" => {
                let name = required(cols.next(), "class name", file, line_number)?;
                if access == AwAccess::Mutable {
                    return Err(ParseError::at(file, line_number, "classes cannot be mutable").into());
                }
                AwTarget::Class { name }
            }
            "method" => {
                let owner = required(cols.next(), "method owner", file, line_number)?;
                let name = required(cols.next(), "method name", file, line_number)?;
                let desc = required(cols.next(), "method descriptor", file, line_number)?;
                if access == AwAccess::Mutable {
                    return Err(ParseError::at(file, line_number, "methods cannot be mutable").into());
                }
                AwTarget::Method { owner, name, desc }
            }
            "field" => {
                let owner = required(cols.next(), "field owner", file, line_number)?;
                let name = required(cols.next(), "field name", file, line_number)?;
                let desc = cols.next().map(String::from);
                if access == AwAccess::Extendable {
                    return Err(ParseError::at(file, line_number, "fields cannot be extendable").into());
                }
                AwTarget::Field { owner, name, desc }
            }
            other => {
                return Err(ParseError::at(
                    file,
                    line_number,
                    format!("unknown target kind {:?}", other),
                )
                .into())
            }
        };
        entries.push(AwEntry { access, target });
    }
    Ok(AwFile { namespace, entries })
}

pub fn serialize_aw(aw: &AwFile) -> String {
    let mut out = format!("accessWidener v1 {}\n", aw.namespace);
    for entry in &aw.entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

fn required(col: Option<&str>, what: &str, file: &str, line: usize) -> Result<String, ParseError> {
    match col {
        Some(col) => Ok(col.to_string()),
        None => Err(ParseError::at(file, line, format!("missing {}", what))),
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_and_serializes() {
        let text = "accessWidener v1 named\n\
                    # a comment\n\
                    accessible class net/foo/Thing\n\
                    extendable method net/foo/Thing doThing ()V\n\
                    accessible field net/foo/Thing count I\n\
                    mutable field net/foo/Thing count I\n";
        let aw = parse_aw(text, "test.accesswidener").unwrap();
        assert_eq!(aw.namespace, "named");
        assert_eq!(aw.entries.len(), 4);
        assert_eq!(
            aw.entries[1].target,
            AwTarget::Method {
                owner: "net/foo/Thing".into(),
                name: "doThing".into(),
                desc: "()V".into()
            }
        );
        let expected = "accessWidener v1 named\n\
                        accessible class net/foo/Thing\n\
                        extendable method net/foo/Thing doThing ()V\n\
                        accessible field net/foo/Thing count I\n\
                        mutable field net/foo/Thing count I\n";
        assert_eq!(serialize_aw(&aw), expected);
    }

    #[test]
    fn missing_header_fails() {
        let err = parse_aw("accessible class a\n", "bad.accesswidener").unwrap_err();
        assert!(err.to_string().contains("accessWidener"));
    }

    #[test]
    fn invalid_combinations_fail() {
        let text = "accessWidener v1 named\nmutable class a\n";
        assert!(parse_aw(text, "bad.accesswidener").is_err());
        let text = "accessWidener v1 named\nextendable field a b\n";
        assert!(parse_aw(text, "bad.accesswidener").is_err());
    }
}
