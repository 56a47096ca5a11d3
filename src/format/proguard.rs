//! Reader for proguard obfuscation logs (`original -> obfuscated` with dotted
//! java names and source-style type signatures).
//!
//! The original names are the document's identity axis, so they become the
//! source namespace; trees seeded the other way around are re-keyed with the
//! source-namespace switch transform.

use failure::Error;

use crate::format::srg::{DST_NAMESPACE, SRC_NAMESPACE};
use crate::format::ParseError;
use crate::visitor::{MappedKind, MappingVisitor};

pub fn read<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        read_pass(text, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_pass<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut class_skipped = true;
    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let arrow = match line.find(" -> ") {
            Some(pos) => pos,
            None => {
                return Err(ParseError::at(file, line_number, "line has no `->`").into());
            }
        };
        let left = &line[..arrow];
        let right = &line[arrow + 4..];
        if !raw_line.starts_with(' ') && !raw_line.starts_with('\t') {
            // Class line: `original -> obfuscated:`
            let obf = right.trim_end_matches(':');
            let src = left.replace('.', "/");
            class_skipped = !visitor.visit_class(&src)?;
            if !class_skipped {
                visitor.visit_dst_name(MappedKind::Class, 0, &obf.replace('.', "/"))?;
            }
            continue;
        }
        if class_skipped {
            continue;
        }
        // Member line, optionally wrapped in bytecode/source line numbers:
        // `13:13:java.util.Map$Entry eldest():168:168 -> a`
        let left = strip_line_numbers(left);
        match left.find('(') {
            Some(open) => {
                let close = left.find(')').ok_or_else(|| {
                    ParseError::at(file, line_number, "unterminated parameter list")
                })?;
                let (ret, name) = split_typed_name(&left[..open], file, line_number)?;
                let mut desc = String::from("(");
                let params = &left[open + 1..close];
                if !params.is_empty() {
                    for param in params.split(',') {
                        desc.push_str(&java_type_to_desc(param.trim()));
                    }
                }
                desc.push(')');
                desc.push_str(&java_type_to_desc(ret));
                if visitor.visit_method(name, Some(&desc))? {
                    visitor.visit_dst_name(MappedKind::Method, 0, right)?;
                }
            }
            None => {
                let (ty, name) = split_typed_name(left, file, line_number)?;
                let desc = java_type_to_desc(ty);
                if visitor.visit_field(name, Some(&desc))? {
                    visitor.visit_dst_name(MappedKind::Field, 0, right)?;
                }
            }
        }
    }
    Ok(())
}

/// Drop `13:13:` prefixes and `:168:168` suffixes from a member signature
fn strip_line_numbers(left: &str) -> &str {
    let mut left = left;
    while let Some(colon) = left.find(':') {
        if left[..colon].chars().all(|c| c.is_ascii_digit()) && colon > 0 {
            left = &left[colon + 1..];
        } else {
            break;
        }
    }
    // Suffix numbers only ever follow the closing paren
    if let Some(close) = left.rfind(')') {
        left = &left[..close + 1];
    }
    left
}

fn split_typed_name<'a>(
    typed: &'a str,
    file: &str,
    line: usize,
) -> Result<(&'a str, &'a str), ParseError> {
    let space = typed
        .rfind(' ')
        .ok_or_else(|| ParseError::at(file, line, "member line has no type"))?;
    Ok((&typed[..space], &typed[space + 1..]))
}

/// Convert a java source type (`int`, `java.util.Map$Entry`, `byte[][]`) to
/// its JVM descriptor
fn java_type_to_desc(ty: &str) -> String {
    let mut dims = 0;
    let mut base = ty;
    while base.ends_with("[]") {
        dims += 1;
        base = &base[..base.len() - 2];
    }
    let mut out = String::new();
    for _ in 0..dims {
        out.push('[');
    }
    match base {
        "void" => out.push('V'),
        "int" => out.push('I'),
        "long" => out.push('J'),
        "float" => out.push('F'),
        "double" => out.push('D'),
        "boolean" => out.push('Z'),
        "byte" => out.push('B'),
        "char" => out.push('C'),
        "short" => out.push('S'),
        _ => {
            out.push('L');
            out.push_str(&base.replace('.', "/"));
            out.push(';');
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::MappingTree;

    #[test]
    fn reads_proguard_log() {
        let text = "# compiler: R8\n\
                    android.arch.core.internal.SafeIterableMap -> a.a.a.b.c:\n\
                    \u{20}   int mSize -> c\n\
                    \u{20}   java.util.Map$Entry[] eldest() -> a\n\
                    \u{20}   13:13:void put(java.lang.Object,int):168:168 -> b\n";
        let mut tree = MappingTree::new();
        read(text, "mapping.txt", &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("android/arch/core/internal/SafeIterableMap").unwrap();
        assert_eq!(class.name(0), Some("a/a/a/b/c"));
        let field = class.get_field("mSize", Some("I")).unwrap();
        assert_eq!(field.name(0), Some("c"));
        let eldest = class.get_method("eldest", Some("()[Ljava/util/Map$Entry;")).unwrap();
        assert_eq!(eldest.name(0), Some("a"));
        let put = class.get_method("put", Some("(Ljava/lang/Object;I)V")).unwrap();
        assert_eq!(put.name(0), Some("b"));
    }

    #[test]
    fn type_conversion() {
        assert_eq!(java_type_to_desc("int"), "I");
        assert_eq!(java_type_to_desc("void"), "V");
        assert_eq!(java_type_to_desc("byte[][]"), "[[B");
        assert_eq!(java_type_to_desc("java.lang.String"), "Ljava/lang/String;");
        assert_eq!(java_type_to_desc("java.util.Map$Entry[]"), "[Ljava/util/Map$Entry;");
    }

    #[test]
    fn malformed_line_names_position() {
        let mut tree = MappingTree::new();
        let err = read("no arrow here\n", "broken.txt", &mut tree).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("broken.txt"));
        assert!(message.contains(":1:"));
    }
}
