//! Readers for fabric's tiny format, both the flat v1 dialect and the
//! indented v2 dialect with parameters, variables and comments.

use std::borrow::Cow;

use failure::Error;

use crate::cols::ColumnReader;
use crate::format::ParseError;
use crate::visitor::{MappedKind, MappingVisitor};

pub fn read<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    if text.starts_with("tiny\t2\t") {
        read_v2(text, file, visitor)
    } else if text.starts_with("v1\t") {
        read_v1(text, file, visitor)
    } else {
        Err(ParseError::at(file, 1, "missing tiny header").into())
    }
}

fn read_v1<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::tabbed(text);
        read_v1_pass(&mut reader, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_v1_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    reader.expect_col("v1").map_err(syntax)?;
    let src = reader.next_col_required("source namespace").map_err(syntax)?;
    let mut dst = Vec::new();
    while let Some(ns) = reader.next_col() {
        dst.push(ns);
    }
    if visitor.visit_header()? {
        visitor.visit_namespaces(src, &dst)?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    while reader.next_line() {
        let keyword = match reader.next_col() {
            Some("") | None => continue,
            Some(keyword) => keyword,
        };
        match keyword {
            "CLASS" => {
                let name = reader.next_col_required("class name").map_err(syntax)?;
                class_skipped = !visitor.visit_class(name)?;
                current_class = Some(name.to_string());
                if class_skipped {
                    continue;
                }
                let mut ns = 0;
                while let Some(dst_name) = reader.next_col() {
                    if !dst_name.is_empty() {
                        visitor.visit_dst_name(MappedKind::Class, ns, dst_name)?;
                    }
                    ns += 1;
                }
            }
            "FIELD" | "METHOD" => {
                let owner = reader.next_col_required("owner").map_err(syntax)?;
                let desc = reader.next_col_required("descriptor").map_err(syntax)?;
                let name = reader.next_col_required("member name").map_err(syntax)?;
                // Member lines restate their owner, so a class visit is only
                // re-emitted when the owner changes
                if current_class.as_ref().map(String::as_str) != Some(owner) {
                    class_skipped = !visitor.visit_class(owner)?;
                    current_class = Some(owner.to_string());
                }
                if class_skipped {
                    continue;
                }
                let kind = if keyword == "FIELD" {
                    MappedKind::Field
                } else {
                    MappedKind::Method
                };
                let accepted = match kind {
                    MappedKind::Field => visitor.visit_field(name, Some(desc))?,
                    _ => visitor.visit_method(name, Some(desc))?,
                };
                if !accepted {
                    continue;
                }
                let mut ns = 0;
                while let Some(dst_name) = reader.next_col() {
                    if !dst_name.is_empty() {
                        visitor.visit_dst_name(kind, ns, dst_name)?;
                    }
                    ns += 1;
                }
            }
            other => {
                return Err(ParseError::at(
                    file,
                    reader.line_number(),
                    format!("unknown tiny v1 keyword {:?}", other),
                )
                .into())
            }
        }
    }
    Ok(())
}

fn read_v2<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::tabbed(text);
        read_v2_pass(&mut reader, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_v2_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    reader.expect_col("tiny").map_err(syntax)?;
    reader.expect_col("2").map_err(syntax)?;
    reader.next_col_required("minor version").map_err(syntax)?;
    let src = reader.next_col_required("source namespace").map_err(syntax)?;
    let mut dst = Vec::new();
    while let Some(ns) = reader.next_col() {
        dst.push(ns);
    }
    if visitor.visit_header()? {
        visitor.visit_namespaces(src, &dst)?;
    }
    let accept_content = visitor.visit_content()?;

    let mut escaped_names = false;
    let mut seen_class = false;
    // Skip depth: elements below a rejected scope are not visited at all
    let mut skip_below: Option<usize> = None;
    // Element kind currently open at indent 1 and 2, for comment routing
    let mut member_kind = MappedKind::Class;
    let mut sub_kind = MappedKind::Class;

    while reader.next_line() {
        let indent = reader.indent();
        if reader.at_eol() {
            continue;
        }
        if indent == 1 && !seen_class {
            // File properties come between the header and the first class
            let key = reader.next_col_required("property key").map_err(syntax)?;
            if key == "escaped-names" {
                escaped_names = true;
            }
            continue;
        }
        if let Some(depth) = skip_below {
            if indent > depth {
                continue;
            }
            skip_below = None;
        }
        let keyword = reader.next_col_required("line keyword").map_err(syntax)?;
        match (indent, keyword) {
            (0, "c") => {
                seen_class = true;
                if !accept_content {
                    skip_below = Some(0);
                    continue;
                }
                let names = read_names(reader, escaped_names);
                let src_name = require_src(&names, file, reader.line_number(), "class")?;
                if !visitor.visit_class(src_name)? {
                    skip_below = Some(0);
                    continue;
                }
                emit_dst_names(visitor, MappedKind::Class, &names)?;
                if !visitor.visit_element_content(MappedKind::Class)? {
                    skip_below = Some(0);
                }
            }
            (1, "m") | (1, "f") => {
                let desc = reader.next_col_required("member descriptor").map_err(syntax)?;
                let names = read_names(reader, escaped_names);
                let src_name = require_src(&names, file, reader.line_number(), "member")?;
                let kind = if keyword == "m" {
                    MappedKind::Method
                } else {
                    MappedKind::Field
                };
                let accepted = match kind {
                    MappedKind::Field => visitor.visit_field(src_name, Some(desc))?,
                    _ => visitor.visit_method(src_name, Some(desc))?,
                };
                if !accepted {
                    skip_below = Some(1);
                    continue;
                }
                member_kind = kind;
                emit_dst_names(visitor, kind, &names)?;
                if kind == MappedKind::Method && !visitor.visit_element_content(kind)? {
                    skip_below = Some(1);
                }
            }
            (2, "p") => {
                let lv_index = reader.next_int("lv index").map_err(syntax)?;
                let names = read_names(reader, escaped_names);
                let src_name = names.get(0).map(|n| n.as_ref()).filter(|n: &&str| !n.is_empty());
                if !visitor.visit_method_arg(-1, lv_index, src_name)? {
                    skip_below = Some(2);
                    continue;
                }
                sub_kind = MappedKind::MethodArg;
                emit_dst_names(visitor, MappedKind::MethodArg, &names)?;
            }
            (2, "v") => {
                let lv_index = reader.next_int("lv index").map_err(syntax)?;
                let start_op = reader.next_int("lv start offset").map_err(syntax)?;
                let lvt_row = reader.next_int("lvt row index").map_err(syntax)?;
                let names = read_names(reader, escaped_names);
                let src_name = names.get(0).map(|n| n.as_ref()).filter(|n: &&str| !n.is_empty());
                if !visitor.visit_method_var(lv_index, lvt_row, start_op, src_name)? {
                    skip_below = Some(2);
                    continue;
                }
                sub_kind = MappedKind::MethodVar;
                emit_dst_names(visitor, MappedKind::MethodVar, &names)?;
            }
            (1, "c") | (2, "c") | (3, "c") => {
                // Comments are always escaped regardless of escaped-names
                let text = unescape(reader.rest_of_line());
                let kind = match indent {
                    1 => MappedKind::Class,
                    2 => member_kind,
                    _ => sub_kind,
                };
                visitor.visit_comment(kind, &text)?;
            }
            (_, other) => {
                return Err(ParseError::at(
                    file,
                    reader.line_number(),
                    format!("unknown tiny v2 element {:?} at indent {}", other, indent),
                )
                .into())
            }
        }
    }
    Ok(())
}

fn read_names<'a>(reader: &mut ColumnReader<'a>, escaped: bool) -> Vec<Cow<'a, str>> {
    let mut names = Vec::new();
    while let Some(col) = reader.next_col() {
        names.push(if escaped { unescape(col) } else { Cow::Borrowed(col) });
    }
    names
}

fn require_src<'a>(
    names: &'a [Cow<str>],
    file: &str,
    line: usize,
    what: &str,
) -> Result<&'a str, ParseError> {
    match names.get(0) {
        Some(name) if !name.is_empty() => Ok(name.as_ref()),
        _ => Err(ParseError::at(file, line, format!("{} line missing source name", what))),
    }
}

fn emit_dst_names<V: MappingVisitor>(
    visitor: &mut V,
    kind: MappedKind,
    names: &[Cow<str>],
) -> Result<(), Error> {
    for (ns, name) in names.iter().skip(1).enumerate() {
        if !name.is_empty() {
            visitor.visit_dst_name(kind, ns, name)?;
        }
    }
    Ok(())
}

fn unescape(s: &str) -> Cow<str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

pub(crate) fn escape(s: &str) -> Cow<str> {
    if !s.contains(|c| c == '\\' || c == '\n' || c == '\t' || c == '\r' || c == '\0') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::MappingTree;

    #[test]
    fn reads_v1() {
        let text = "v1\tofficial\tintermediary\tnamed\n\
                    CLASS\ta\tnet/inter/class_1\tnet/foo/Thing\n\
                    FIELD\ta\tI\tf\tfield_1\tcount\n\
                    METHOD\ta\t()V\tm\tmethod_1\tdoThing\n";
        let mut tree = MappingTree::new();
        read(text, "test.tiny", &mut tree).unwrap();
        let tree = tree.freeze();
        assert_eq!(tree.dst_namespaces(), &["intermediary", "named"]);
        let class = tree.get_class("a").unwrap();
        assert_eq!(class.name(1), Some("net/foo/Thing"));
        assert_eq!(class.get_field("f", Some("I")).unwrap().name(0), Some("field_1"));
        assert_eq!(class.get_method("m", Some("()V")).unwrap().name(1), Some("doThing"));
    }

    #[test]
    fn reads_v2_with_members_and_comments() {
        let text = "tiny\t2\t0\tofficial\tintermediary\tnamed\n\
                    c\ta/b/C\tnet/inter/class_1\tnet/foo/Thing\n\
                    \tc\tA test class\n\
                    \tm\t(I)V\tm\tmethod_1\tdoThing\n\
                    \t\tc\tDoes the thing\n\
                    \t\tp\t1\t\t\tamount\n\
                    \t\tv\t2\t3\t0\t\t\tlocal\n\
                    \tf\tI\tf\tfield_1\tcount\n";
        let mut tree = MappingTree::new();
        read(text, "test.tiny", &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.comment(), Some("A test class"));
        let method = class.get_method("m", Some("(I)V")).unwrap();
        assert_eq!(method.name(1), Some("doThing"));
        assert_eq!(method.comment(), Some("Does the thing"));
        assert_eq!(method.args().len(), 1);
        assert_eq!(method.args()[0].lv_index(), 1);
        assert_eq!(method.args()[0].dst_name(1), Some("amount"));
        assert_eq!(method.vars().len(), 1);
        assert_eq!(method.vars()[0].dst_name(1), Some("local"));
        assert_eq!(class.get_field("f", Some("I")).unwrap().name(0), Some("field_1"));
    }

    #[test]
    fn v2_escaped_names_property() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    \tescaped-names\n\
                    c\ta\\nb\tnet/foo/Weird\n";
        let mut tree = MappingTree::new();
        read(text, "test.tiny", &mut tree).unwrap();
        let tree = tree.freeze();
        assert!(tree.get_class("a\nb").is_some());
    }

    #[test]
    fn empty_dst_columns_skipped() {
        let text = "v1\tofficial\tintermediary\tnamed\n\
                    CLASS\ta\t\tnet/foo/Thing\n";
        let mut tree = MappingTree::new();
        read(text, "test.tiny", &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("a").unwrap();
        assert_eq!(class.name(0), None);
        assert_eq!(class.name(1), Some("net/foo/Thing"));
    }

    #[test]
    fn missing_header_is_parse_error() {
        let mut tree = MappingTree::new();
        let err = read("CLASS\ta\tb\n", "broken.tiny", &mut tree).unwrap_err();
        assert!(err.to_string().contains("broken.tiny"));
    }

    #[test]
    fn escape_roundtrip() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("a\\nb\\\\c"), "a\nb\\c");
        assert_eq!(escape("a\nb\\c"), "a\\nb\\\\c");
        assert_eq!(escape("plain"), "plain");
    }
}
