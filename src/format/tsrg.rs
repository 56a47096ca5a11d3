//! The tab-indented tsrg dialects: v1 (two namespaces, implicit) and v2
//! (multi-namespace header, method parameters, static markers), plus the
//! tsrg v1 writer used for exports.

use std::io::Write;

use failure::Error;

use crate::cols::ColumnReader;
use crate::format::srg::{DST_NAMESPACE, SRC_NAMESPACE};
use crate::format::ParseError;
use crate::tree::NamespaceError;
use crate::visitor::{MappedKind, MappingVisitor, VisitorFlags};

pub fn read_tsrg<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::spaced(text);
        if text.starts_with("tsrg2 ") {
            read_v2_pass(&mut reader, file, visitor)?;
        } else {
            read_v1_pass(&mut reader, file, visitor)?;
        }
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
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut class_skipped = true;
    let mut first = true;
    loop {
        if !first && !reader.next_line() {
            break;
        }
        first = false;
        let indent = reader.indent();
        if reader.at_eol() {
            continue;
        }
        if indent == 0 {
            let src = reader.next_col_required("class name").map_err(syntax)?;
            if src.ends_with('/') {
                debug!("{}: ignoring package line at {}", file, reader.line_number());
                class_skipped = true;
                continue;
            }
            let dst = reader.next_col_required("mapped class name").map_err(syntax)?;
            class_skipped = !visitor.visit_class(src)?;
            if !class_skipped {
                visitor.visit_dst_name(MappedKind::Class, 0, dst)?;
            }
        } else {
            if class_skipped {
                continue;
            }
            let src = reader.next_col_required("member name").map_err(syntax)?;
            let second = reader.next_col_required("member column").map_err(syntax)?;
            match reader.next_col() {
                // name desc mapped-name: a method
                Some(dst) => {
                    if visitor.visit_method(src, Some(second))? {
                        visitor.visit_dst_name(MappedKind::Method, 0, dst)?;
                    }
                }
                // name mapped-name: a field
                None => {
                    if visitor.visit_field(src, None)? {
                        visitor.visit_dst_name(MappedKind::Field, 0, second)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn read_v2_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    reader.expect_col("tsrg2").map_err(syntax)?;
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
    let mut class_skipped = true;
    let mut method_skipped = true;
    while reader.next_line() {
        let indent = reader.indent();
        if reader.at_eol() {
            continue;
        }
        match indent {
            0 => {
                let src = reader.next_col_required("class name").map_err(syntax)?;
                if src.ends_with('/') {
                    debug!("{}: ignoring package line at {}", file, reader.line_number());
                    class_skipped = true;
                    continue;
                }
                class_skipped = !visitor.visit_class(src)?;
                method_skipped = true;
                if !class_skipped {
                    emit_remaining_names(reader, visitor, MappedKind::Class)?;
                }
            }
            1 => {
                if class_skipped {
                    continue;
                }
                method_skipped = true;
                let src = reader.next_col_required("member name").map_err(syntax)?;
                let second = reader.next_col_required("member column").map_err(syntax)?;
                if second.starts_with('(') {
                    if visitor.visit_method(src, Some(second))? {
                        emit_remaining_names(reader, visitor, MappedKind::Method)?;
                        method_skipped = !visitor.visit_element_content(MappedKind::Method)?;
                    }
                } else if visitor.visit_field(src, None)? {
                    visitor.visit_dst_name(MappedKind::Field, 0, second)?;
                    emit_remaining_names_from(reader, visitor, MappedKind::Field, 1)?;
                }
            }
            _ => {
                if class_skipped || method_skipped {
                    continue;
                }
                let first_col = reader.next_col_required("parameter line").map_err(syntax)?;
                if first_col == "static" {
                    // Static marker: parameter indices already account for
                    // the missing receiver slot
                    continue;
                }
                let lv_index: i32 = first_col.parse().map_err(|_| {
                    ParseError::at(file, reader.line_number(), "parameter index is not a number")
                })?;
                let src_name = reader.next_col();
                if visitor.visit_method_arg(-1, lv_index, src_name.filter(|n| !n.is_empty()))? {
                    emit_remaining_names_from(reader, visitor, MappedKind::MethodArg, 0)?;
                }
            }
        }
    }
    Ok(())
}

fn emit_remaining_names<V: MappingVisitor>(
    reader: &mut ColumnReader,
    visitor: &mut V,
    kind: MappedKind,
) -> Result<(), Error> {
    emit_remaining_names_from(reader, visitor, kind, 0)
}

fn emit_remaining_names_from<V: MappingVisitor>(
    reader: &mut ColumnReader,
    visitor: &mut V,
    kind: MappedKind,
    mut ns: usize,
) -> Result<(), Error> {
    while let Some(name) = reader.next_col() {
        if !name.is_empty() {
            visitor.visit_dst_name(kind, ns, name)?;
        }
        ns += 1;
    }
    Ok(())
}

/// Streams visitor calls out as tsrg v1 text. Fails fast when asked to emit
/// anything but exactly one destination namespace.
pub struct TsrgWriter<W: Write> {
    out: W,
    pending_class: Option<(String, Option<String>)>,
    pending_member: Option<PendingMember>,
}
struct PendingMember {
    kind: MappedKind,
    src: String,
    desc: Option<String>,
    dst: Option<String>,
}
impl<W: Write> TsrgWriter<W> {
    pub fn new(out: W) -> TsrgWriter<W> {
        TsrgWriter {
            out,
            pending_class: None,
            pending_member: None,
        }
    }
    fn flush_class(&mut self) -> Result<(), Error> {
        if let Some((src, dst)) = self.pending_class.take() {
            // Unmapped classes still need both columns
            let dst = dst.as_ref().unwrap_or(&src);
            writeln!(self.out, "{} {}", src, dst)?;
        }
        Ok(())
    }
    fn flush_member(&mut self) -> Result<(), Error> {
        let member = match self.pending_member.take() {
            Some(member) => member,
            None => return Ok(()),
        };
        self.flush_class()?;
        let dst = member.dst.as_ref().unwrap_or(&member.src);
        match member.kind {
            MappedKind::Method => {
                let desc = match member.desc {
                    Some(ref desc) => desc,
                    None => {
                        warn!("Dropping method {} with no descriptor", member.src);
                        return Ok(());
                    }
                };
                writeln!(self.out, "\t{} {} {}", member.src, desc, dst)?;
            }
            _ => {
                writeln!(self.out, "\t{} {}", member.src, dst)?;
            }
        }
        Ok(())
    }
    fn flush_all(&mut self) -> Result<(), Error> {
        self.flush_member()?;
        self.flush_class()
    }
    pub fn into_inner(self) -> W {
        self.out
    }
}
impl<W: Write> MappingVisitor for TsrgWriter<W> {
    fn flags(&self) -> VisitorFlags {
        VisitorFlags::NEEDS_UNIQUENESS
    }
    fn visit_namespaces(&mut self, _src: &str, dst: &[&str]) -> Result<(), Error> {
        if dst.len() != 1 {
            return Err(NamespaceError::DestinationCount {
                supported: 1,
                found: dst.len(),
            }
            .into());
        }
        Ok(())
    }
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        self.flush_all()?;
        self.pending_class = Some((src_name.to_string(), None));
        Ok(true)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        self.flush_member()?;
        self.pending_member = Some(PendingMember {
            kind: MappedKind::Method,
            src: src_name.to_string(),
            desc: src_desc.map(String::from),
            dst: None,
        });
        Ok(true)
    }
    fn visit_field(&mut self, src_name: &str, _src_desc: Option<&str>) -> Result<bool, Error> {
        self.flush_member()?;
        self.pending_member = Some(PendingMember {
            kind: MappedKind::Field,
            src: src_name.to_string(),
            desc: None,
            dst: None,
        });
        Ok(true)
    }
    fn visit_method_arg(&mut self, _: i32, _: i32, _: Option<&str>) -> Result<bool, Error> {
        Ok(false) // Not expressible in tsrg v1
    }
    fn visit_method_var(&mut self, _: i32, _: i32, _: i32, _: Option<&str>) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        if namespace != 0 {
            return Ok(());
        }
        match kind {
            MappedKind::Class => {
                if let Some((_, ref mut dst)) = self.pending_class {
                    *dst = Some(name.to_string());
                }
            }
            MappedKind::Method | MappedKind::Field => {
                if let Some(ref mut member) = self.pending_member {
                    member.dst = Some(name.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }
    fn visit_comment(&mut self, _kind: MappedKind, _comment: &str) -> Result<(), Error> {
        Ok(()) // No comment channel in tsrg
    }
    fn visit_end(&mut self) -> Result<bool, Error> {
        self.flush_all()?;
        Ok(true)
    }
}

/// Convenience wrapper writing a whole tree as tsrg v1
pub fn write_tsrg<W: Write>(
    tree: &crate::tree::FrozenTree,
    out: W,
) -> Result<W, Error> {
    let mut writer = TsrgWriter::new(out);
    tree.accept(&mut writer)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::MappingTree;

    #[test]
    fn reads_tsrg_v1() {
        let text = "a/b/C net/foo/Thing\n\
                    \tf count\n\
                    \tm (I)V doThing\n";
        let mut tree = MappingTree::new();
        read_tsrg(text, "test.tsrg", &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.name(0), Some("net/foo/Thing"));
        assert_eq!(class.get_field("f", None).unwrap().name(0), Some("count"));
        assert_eq!(class.get_method("m", Some("(I)V")).unwrap().name(0), Some("doThing"));
    }

    #[test]
    fn reads_tsrg_v2() {
        let text = "tsrg2 obf srg id\n\
                    a/b/C net/srg/C_1 12\n\
                    \tf f_1 100\n\
                    \tm (I)V m_1 200\n\
                    \t\tstatic\n\
                    \t\t1 pval p_1\n";
        let mut tree = MappingTree::new();
        read_tsrg(text, "test.tsrg", &mut tree).unwrap();
        let tree = tree.freeze();
        assert_eq!(tree.src_namespace(), "obf");
        assert_eq!(tree.dst_namespaces(), &["srg", "id"]);
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.name(0), Some("net/srg/C_1"));
        assert_eq!(class.name(1), Some("12"));
        let method = class.get_method("m", Some("(I)V")).unwrap();
        assert_eq!(method.name(0), Some("m_1"));
        assert_eq!(method.args().len(), 1);
        assert_eq!(method.args()[0].src_name(), Some("pval"));
        assert_eq!(method.args()[0].dst_name(0), Some("p_1"));
    }

    #[test]
    fn writes_tsrg_v1() {
        let text = "a/b/C net/foo/Thing\n\
                    \tf count\n\
                    \tm (I)V doThing\n";
        let mut tree = MappingTree::new();
        read_tsrg(text, "test.tsrg", &mut tree).unwrap();
        let written = write_tsrg(&tree.freeze(), Vec::new()).unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), text);
    }

    #[test]
    fn writer_rejects_multiple_namespaces() {
        let mut writer = TsrgWriter::new(Vec::new());
        let err = writer
            .visit_namespaces("official", &["intermediary", "named"])
            .unwrap_err();
        assert!(err.to_string().contains("destination namespace"));
    }

    #[test]
    fn unmapped_class_repeats_source_name() {
        let mut tree = MappingTree::new();
        tree.visit_header().unwrap();
        tree.visit_namespaces("source", &["target"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a").unwrap();
        tree.visit_field("f", None).unwrap();
        tree.visit_dst_name(MappedKind::Field, 0, "count").unwrap();
        tree.visit_end().unwrap();
        let written = write_tsrg(&tree.freeze(), Vec::new()).unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), "a a\n\tf count\n");
    }
}
