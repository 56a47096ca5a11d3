//! The access transformer dialect: one line per class or member naming a
//! target access level plus an optional final-state directive. Owners are
//! dotted binary names; methods carry their JVM descriptor attached to the
//! name. The legacy sub-dialect glued owner and member together with a dot
//! (`public net.minecraft.Foo.bar ()V`); [`transform_legacy`] rewrites such
//! lines to the modern space-separated form.

use std::fmt::{self, Display, Formatter};

use failure::Error;
use regex::Regex;

use crate::format::ParseError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AccessLevel {
    Public,
    Protected,
    Default,
    Private,
}
impl AccessLevel {
    fn parse(token: &str) -> Option<AccessLevel> {
        Some(match token {
            "public" => AccessLevel::Public,
            "protected" => AccessLevel::Protected,
            "default" => AccessLevel::Default,
            "private" => AccessLevel::Private,
            _ => return None,
        })
    }
}
impl Display for AccessLevel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            AccessLevel::Public => "public",
            AccessLevel::Protected => "protected",
            AccessLevel::Default => "default",
            AccessLevel::Private => "private",
        })
    }
}

/// The `-f`/`+f` suffix: strip the final modifier, force it, or leave it
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FinalMod {
    Keep,
    Add,
    Remove,
}
impl Display for FinalMod {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            FinalMod::Keep => "",
            FinalMod::Add => "+f",
            FinalMod::Remove => "-f",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AtTarget {
    Class,
    /// `*`: every field of the class
    WildcardFields,
    /// `*()`: every method of the class
    WildcardMethods,
    Field { name: String },
    Method { name: String, desc: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AtEntry {
    pub access: AccessLevel,
    pub final_mod: FinalMod,
    /// Dotted binary name
    pub owner: String,
    pub target: AtTarget,
    pub comment: Option<String>,
}
impl Display for AtEntry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{} {}", self.access, self.final_mod, self.owner)?;
        match self.target {
            AtTarget::Class => {}
            AtTarget::WildcardFields => f.write_str(" *")?,
            AtTarget::WildcardMethods => f.write_str(" *()")?,
            AtTarget::Field { ref name } => write!(f, " {}", name)?,
            AtTarget::Method { ref name, ref desc } => write!(f, " {}{}", name, desc)?,
        }
        if let Some(ref comment) = self.comment {
            write!(f, " # {}", comment)?;
        }
        Ok(())
    }
}

fn parse_modifier(token: &str, file: &str, line: usize) -> Result<(AccessLevel, FinalMod), ParseError> {
    let (level, final_mod) = if token.ends_with("-f") {
        (&token[..token.len() - 2], FinalMod::Remove)
    } else if token.ends_with("+f") {
        (&token[..token.len() - 2], FinalMod::Add)
    } else {
        (token, FinalMod::Keep)
    };
    match AccessLevel::parse(level) {
        Some(level) => Ok((level, final_mod)),
        None => Err(ParseError::at(
            file,
            line,
            format!("unknown access level {:?}", token),
        )),
    }
}

/// Parse a modern access transformer file. Legacy files must go through
/// [`transform_legacy`] first.
pub fn parse_at(text: &str, file: &str) -> Result<Vec<AtEntry>, Error> {
    let mut entries = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let (line, comment) = split_comment(raw);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let modifier = tokens.next().unwrap();
        let (access, final_mod) = parse_modifier(modifier, file, line_number)?;
        let owner = match tokens.next() {
            Some(owner) => owner,
            None => {
                return Err(ParseError::at(file, line_number, "missing target class").into());
            }
        };
        let target = match tokens.next() {
            None => AtTarget::Class,
            Some("*") => AtTarget::WildcardFields,
            Some("*()") => AtTarget::WildcardMethods,
            Some(member) => match member.find('(') {
                Some(paren) => AtTarget::Method {
                    name: member[..paren].to_string(),
                    desc: member[paren..].to_string(),
                },
                None => AtTarget::Field {
                    name: member.to_string(),
                },
            },
        };
        if let Some(extra) = tokens.next() {
            return Err(ParseError::at(
                file,
                line_number,
                format!("unexpected trailing column {:?}", extra),
            )
            .into());
        }
        entries.push(AtEntry {
            access,
            final_mod,
            owner: owner.to_string(),
            target,
            comment,
        });
    }
    Ok(entries)
}

pub fn serialize_at(entries: &[AtEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find('#') {
        Some(index) => (
            &line[..index],
            Some(line[index + 1..].trim().to_string()).filter(|c| !c.is_empty()),
        ),
        None => (line, None),
    }
}

lazy_static! {
    /// `access owner.name(desc)` or `access owner.name (desc)`, the
    /// descriptor optionally detached by whitespace
    static ref LEGACY_METHOD: Regex =
        Regex::new(r"^\s*([\w\-+]+)\s+([\w.$]+)\.([\w$<>*]+)\s*(\(.*?\)[\w$/;\[\]]*)\s*(#.*)?$")
            .unwrap();
    /// `access owner.name`; only applied when the trailing segment does not
    /// look like a class name
    static ref LEGACY_FIELD: Regex =
        Regex::new(r"^\s*([\w\-+]+)\s+([\w.$]+)\.([\w$*]+)\s*(#.*)?$").unwrap();
}

/// Rewrite legacy dotted lines to the modern space-separated dialect.
/// Modern lines pass through unchanged, so the transform is idempotent.
pub fn transform_legacy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(&transform_legacy_line(line));
        out.push('\n');
    }
    out
}

fn transform_legacy_line(line: &str) -> String {
    if let Some(caps) = LEGACY_METHOD.captures(line) {
        let mut desc = caps[4].to_string();
        // Constructors and static initializers were recorded without a
        // return type; every void-less descriptor gets one
        if desc.ends_with(')') {
            desc.push('V');
        }
        let mut fixed = format!("{} {} {}{}", &caps[1], &caps[2], &caps[3], desc);
        if let Some(comment) = caps.get(5) {
            fixed.push(' ');
            fixed.push_str(comment.as_str());
        }
        return fixed;
    }
    if let Some(caps) = LEGACY_FIELD.captures(line) {
        // A capitalized trailing segment is a class name in a modern class
        // line, not a member; those pass through
        let member = &caps[3];
        if !member.starts_with(|c: char| c.is_ascii_uppercase()) {
            let mut fixed = format!("{} {} {}", &caps[1], &caps[2], member);
            if let Some(comment) = caps.get(4) {
                fixed.push(' ');
                fixed.push_str(comment.as_str());
            }
            return fixed;
        }
    }
    line.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_modern_lines() {
        let text = "# header comment\n\
                    public net.minecraft.Foo\n\
                    public-f net.minecraft.Foo bar\n\
                    protected net.minecraft.Foo doIt(Lnet/minecraft/Foo;)V # why\n\
                    private+f net.minecraft.Foo *\n\
                    public net.minecraft.Foo *()\n";
        let entries = parse_at(text, "test.cfg").unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].target, AtTarget::Class);
        assert_eq!(entries[0].access, AccessLevel::Public);
        assert_eq!(entries[1].final_mod, FinalMod::Remove);
        assert_eq!(entries[1].target, AtTarget::Field { name: "bar".into() });
        assert_eq!(
            entries[2].target,
            AtTarget::Method {
                name: "doIt".into(),
                desc: "(Lnet/minecraft/Foo;)V".into()
            }
        );
        assert_eq!(entries[2].comment.as_ref().map(String::as_str), Some("why"));
        assert_eq!(entries[3].target, AtTarget::WildcardFields);
        assert_eq!(entries[3].final_mod, FinalMod::Add);
        assert_eq!(entries[4].target, AtTarget::WildcardMethods);
    }

    #[test]
    fn serializes_back() {
        let text = "public net.minecraft.Foo\n\
                    public-f net.minecraft.Foo bar\n\
                    protected net.minecraft.Foo doIt()V # why\n";
        let entries = parse_at(text, "test.cfg").unwrap();
        assert_eq!(serialize_at(&entries), text);
    }

    #[test]
    fn unknown_access_level_fails() {
        let err = parse_at("sideways net.minecraft.Foo\n", "bad.cfg").unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn legacy_method_normalizes() {
        assert_eq!(
            transform_legacy("public net.minecraft.Foo.bar ()V\n"),
            "public net.minecraft.Foo bar()V\n"
        );
        assert_eq!(
            transform_legacy("public net.minecraft.Foo.bar(I)I\n"),
            "public net.minecraft.Foo bar(I)I\n"
        );
    }

    #[test]
    fn legacy_constructor_gains_return_type() {
        assert_eq!(
            transform_legacy("private net.minecraft.Foo.<init> (Lnet/minecraft/Bar;)\n"),
            "private net.minecraft.Foo <init>(Lnet/minecraft/Bar;)V\n"
        );
    }

    #[test]
    fn legacy_field_splits_on_last_dot() {
        assert_eq!(
            transform_legacy("public-f net.minecraft.entity.Entity.field_70155_l # speed\n"),
            "public-f net.minecraft.entity.Entity field_70155_l # speed\n"
        );
        assert_eq!(transform_legacy("public yc.d\n"), "public yc d\n");
    }

    #[test]
    fn modern_lines_untouched() {
        let modern = "public net.minecraft.Foo\n\
                      public net.minecraft.Foo bar\n\
                      public net.minecraft.Foo bar()V\n\
                      public net.minecraft.Foo$Inner\n";
        assert_eq!(transform_legacy(modern), modern);
    }

    #[test]
    fn transform_is_idempotent() {
        let legacy = "public net.minecraft.Foo.bar ()V\n\
                      public-f net.minecraft.entity.Entity.field_70155_l\n\
                      public yc\n";
        let once = transform_legacy(legacy);
        assert_eq!(transform_legacy(&once), once);
    }
}
