//! Reader for Retroguard `.rgs` scripts, the oldest dialect still found in
//! historical mapping archives. Only the `*_map` directives carry names; the
//! obfuscation-control directives are tolerated and logged.

use failure::Error;

use crate::cols::ColumnReader;
use crate::format::srg::{DST_NAMESPACE, SRC_NAMESPACE};
use crate::format::ParseError;
use crate::visitor::{MappedKind, MappingVisitor};

pub fn read<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::spaced(text);
        read_pass(&mut reader, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    let mut first = true;
    loop {
        if !first && !reader.next_line() {
            break;
        }
        first = false;
        let keyword = match reader.next_col() {
            Some("") | None => continue,
            Some(keyword) => keyword,
        };
        if keyword.starts_with('#') {
            continue;
        }
        match keyword {
            ".class_map" => {
                let src = reader.next_col_required("class name").map_err(syntax)?;
                let dst = reader.next_col_required("mapped class name").map_err(syntax)?;
                class_skipped = !visitor.visit_class(src)?;
                current_class = Some(src.to_string());
                if !class_skipped {
                    visitor.visit_dst_name(MappedKind::Class, 0, dst)?;
                }
            }
            ".field_map" => {
                let path = reader.next_col_required("field path").map_err(syntax)?;
                let dst = reader.next_col_required("mapped field name").map_err(syntax)?;
                let (owner, name) = split_owner(path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "field path has no owner")
                })?;
                if open_class(visitor, &mut current_class, &mut class_skipped, owner)?
                    && visitor.visit_field(name, None)?
                {
                    visitor.visit_dst_name(MappedKind::Field, 0, dst)?;
                }
            }
            ".method_map" => {
                let path = reader.next_col_required("method path").map_err(syntax)?;
                let desc = reader.next_col_required("method descriptor").map_err(syntax)?;
                let dst = reader.next_col_required("mapped method name").map_err(syntax)?;
                let (owner, name) = split_owner(path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "method path has no owner")
                })?;
                if open_class(visitor, &mut current_class, &mut class_skipped, owner)?
                    && visitor.visit_method(name, Some(desc))?
                {
                    visitor.visit_dst_name(MappedKind::Method, 0, dst)?;
                }
            }
            ".class" | ".field" | ".method" | ".package_map" | ".repackage_map" | ".option"
            | ".attribute" | ".nowarn" => {
                // Obfuscation-control directives carry no mapping data
                debug!("{}:{}: ignoring {} directive", file, reader.line_number(), keyword);
            }
            other => {
                return Err(ParseError::at(
                    file,
                    reader.line_number(),
                    format!("unknown rgs directive {:?}", other),
                )
                .into())
            }
        }
    }
    Ok(())
}

fn split_owner(path: &str) -> Option<(&str, &str)> {
    let index = path.rfind('/')?;
    Some((&path[..index], &path[index + 1..]))
}

fn open_class<V: MappingVisitor>(
    visitor: &mut V,
    current: &mut Option<String>,
    skipped: &mut bool,
    owner: &str,
) -> Result<bool, Error> {
    if current.as_ref().map(String::as_str) != Some(owner) {
        *skipped = !visitor.visit_class(owner)?;
        *current = Some(owner.to_string());
    }
    Ok(!*skipped)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::MappingTree;

    #[test]
    fn reads_rgs() {
        let text = ".option Application\n\
                    .attribute LineNumberTable\n\
                    .class_map a net/foo/Thing\n\
                    .field_map a/f count\n\
                    .method_map a/m (I)V doThing\n\
                    .class b/** public\n";
        let mut tree = MappingTree::new();
        read(text, "test.rgs", &mut tree).unwrap();
        let tree = tree.freeze();
        assert_eq!(tree.len(), 1);
        let class = tree.get_class("a").unwrap();
        assert_eq!(class.name(0), Some("net/foo/Thing"));
        assert_eq!(class.get_field("f", None).unwrap().name(0), Some("count"));
        assert_eq!(class.get_method("m", Some("(I)V")).unwrap().name(0), Some("doThing"));
    }

    #[test]
    fn unknown_directive_fails() {
        let mut tree = MappingTree::new();
        let err = read(".bogus x\n", "bad.rgs", &mut tree).unwrap_err();
        assert!(err.to_string().contains("bad.rgs"));
    }
}
