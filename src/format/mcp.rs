//! The MCP csv dialects, all three generations of them, plus the
//! `fields.csv`/`methods.csv` zip export.
//!
//! Member csvs never restate the owning class's source name; they key rows by
//! searge names that an earlier input (a tsrg or srg file) already put in the
//! tree. Ingestion therefore runs against a [`DstIndex`] snapshot of that
//! namespace, and the input builder guarantees the class-name file was
//! ingested first.

use std::io::{Seek, Write};

use failure::Error;
use serde_derive::Deserialize;
use zip::write::{FileOptions, ZipWriter};

use crate::descriptor::{map_desc, simple_name};
use crate::format::{ParseError, Side};
use crate::tree::{DstIndex, FrozenTree, NamespaceError, NULL_NAMESPACE_ID};
use crate::visitor::{MappedKind, MappingVisitor};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum McpMemberKind {
    Field,
    Method,
}

fn joined() -> u32 {
    2
}

/// One row of the two newer member csv generations: `searge,name,side,desc`
/// or the older `searge,name,notes`
#[derive(Debug, Deserialize)]
struct MemberEntry {
    searge: String,
    name: String,
    #[serde(default = "joined")]
    side: u32,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// One row of the oldest combined generation, keyed by notch names
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    class: String,
    notch: String,
    searge: String,
    name: String,
    sig: String,
    #[serde(default = "joined")]
    side: u32,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParamEntry {
    param: String,
    name: String,
    #[serde(default = "joined")]
    side: u32,
}

fn csv_error(file: &str, e: csv::Error) -> ParseError {
    let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
    ParseError::at(file, line, e.to_string())
}

/// Read a `searge,name,side,desc` or `searge,name,notes` member csv
pub fn read_members_csv<V: MappingVisitor>(
    text: &str,
    file: &str,
    kind: McpMemberKind,
    side: Side,
    index: &DstIndex,
    dst_label: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    loop {
        members_pass(text, file, kind, side, index, dst_label, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn members_pass<V: MappingVisitor>(
    text: &str,
    file: &str,
    kind: McpMemberKind,
    side: Side,
    index: &DstIndex,
    dst_label: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    if visitor.visit_header()? {
        visitor.visit_namespaces(index.src_namespace(), &[dst_label])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    for result in reader.deserialize::<MemberEntry>() {
        let entry = result.map_err(|e| csv_error(file, e))?;
        if !side.matches(entry.side) {
            continue;
        }
        let found = match kind {
            McpMemberKind::Field => index.field_src(&entry.searge),
            McpMemberKind::Method => index.method_src(&entry.searge),
        };
        let (owner, key) = match found {
            Some((owner, key)) => (owner.to_string(), key.clone()),
            None => {
                // A csv spanning several versions routinely names members
                // the current tree never declared
                debug!("{}: no {} named {:?} in the tree", file, member_kind_name(kind), entry.searge);
                continue;
            }
        };
        if current_class.as_ref() != Some(&owner) {
            class_skipped = !visitor.visit_class(&owner)?;
            current_class = Some(owner.clone());
        }
        if class_skipped {
            continue;
        }
        let desc = key.desc.as_ref().map(String::as_str);
        let (visited, mapped_kind) = match kind {
            McpMemberKind::Field => (visitor.visit_field(&key.name, desc)?, MappedKind::Field),
            McpMemberKind::Method => (visitor.visit_method(&key.name, desc)?, MappedKind::Method),
        };
        if !visited {
            continue;
        }
        visitor.visit_dst_name(mapped_kind, 0, &entry.name)?;
        let comment = entry.desc.as_ref().or(entry.notes.as_ref());
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            visitor.visit_comment(mapped_kind, comment)?;
        }
    }
    Ok(())
}

fn member_kind_name(kind: McpMemberKind) -> &'static str {
    match kind {
        McpMemberKind::Field => "field",
        McpMemberKind::Method => "method",
    }
}

/// Read the oldest combined csv generation. Rows key members by notch names
/// and signatures whose nested-class references may be simple names; those
/// are repaired best-effort against the classes already in the tree.
pub fn read_legacy_csv<V: MappingVisitor>(
    text: &str,
    file: &str,
    side: Side,
    src_label: &str,
    dst_label: &str,
    known_classes: &[String],
    visitor: &mut V,
) -> Result<(), Error> {
    loop {
        legacy_pass(text, file, side, src_label, dst_label, known_classes, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn legacy_pass<V: MappingVisitor>(
    text: &str,
    file: &str,
    side: Side,
    src_label: &str,
    dst_label: &str,
    known_classes: &[String],
    visitor: &mut V,
) -> Result<(), Error> {
    if visitor.visit_header()? {
        visitor.visit_namespaces(src_label, &["searge", dst_label])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    for result in reader.deserialize::<LegacyEntry>() {
        let entry = result.map_err(|e| csv_error(file, e))?;
        if !side.matches(entry.side) {
            continue;
        }
        let owner = repair_class_name(&entry.class, known_classes, file);
        let sig = repair_sig(&entry.sig, known_classes, file);
        if current_class.as_ref().map(String::as_str) != Some(owner.as_ref()) {
            class_skipped = !visitor.visit_class(&owner)?;
            current_class = Some(owner.clone().into_owned());
        }
        if class_skipped {
            continue;
        }
        let is_method = sig.starts_with('(');
        let (visited, kind) = if is_method {
            (visitor.visit_method(&entry.notch, Some(&sig))?, MappedKind::Method)
        } else {
            (visitor.visit_field(&entry.notch, Some(&sig))?, MappedKind::Field)
        };
        if !visited {
            continue;
        }
        visitor.visit_dst_name(kind, 0, &entry.searge)?;
        visitor.visit_dst_name(kind, 1, &entry.name)?;
        if let Some(ref notes) = entry.notes {
            if !notes.is_empty() {
                visitor.visit_comment(kind, notes)?;
            }
        }
    }
    Ok(())
}

/// Substitute a simple class name with the sole (first declared) known class
/// matching it; a miss is logged and kept as-is
fn repair_class_name<'a>(
    name: &'a str,
    known_classes: &[String],
    file: &str,
) -> std::borrow::Cow<'a, str> {
    use std::borrow::Cow;
    if name.contains('/') || known_classes.iter().any(|k| k == name) {
        return Cow::Borrowed(name);
    }
    match known_classes.iter().find(|k| simple_name(k) == name) {
        Some(full) => {
            debug!("{}: repaired simple class name {:?} to {:?}", file, name, full);
            Cow::Owned(full.clone())
        }
        None => {
            warn!("{}: no known class matches simple name {:?}", file, name);
            Cow::Borrowed(name)
        }
    }
}

fn repair_sig(sig: &str, known_classes: &[String], file: &str) -> String {
    map_desc(sig, |name| match repair_class_name(name, known_classes, file) {
        std::borrow::Cow::Owned(repaired) => Some(repaired),
        std::borrow::Cow::Borrowed(_) => None,
    })
}

/// Read a `param,name,side` csv. Parameter ids tie back to searge method
/// names (`p_123_1_` names the first parameter of `func_123_*`).
pub fn read_params_csv<V: MappingVisitor>(
    text: &str,
    file: &str,
    side: Side,
    index: &DstIndex,
    dst_label: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    loop {
        params_pass(text, file, side, index, dst_label, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn params_pass<V: MappingVisitor>(
    text: &str,
    file: &str,
    side: Side,
    index: &DstIndex,
    dst_label: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    if visitor.visit_header()? {
        visitor.visit_namespaces(index.src_namespace(), &[dst_label])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    // Method searge ids, for recovering the owner of each parameter
    let mut methods_by_id = ::std::collections::HashMap::new();
    for (dst_name, class, key) in index.methods() {
        let mut parts = dst_name.split('_');
        if parts.next() == Some("func") {
            if let Some(id) = parts.next() {
                methods_by_id.entry(id.to_string()).or_insert((class, key));
            }
        }
    }
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    for result in reader.deserialize::<ParamEntry>() {
        let entry = result.map_err(|e| csv_error(file, e))?;
        if !side.matches(entry.side) {
            continue;
        }
        let (id, position) = match parse_param_name(&entry.param) {
            Some(parsed) => parsed,
            None => {
                debug!("{}: unparsable param name {:?}", file, entry.param);
                continue;
            }
        };
        let (class, key) = match methods_by_id.get(id) {
            Some(&(class, key)) => (class, key),
            None => {
                debug!("{}: no method with searge id {:?}", file, id);
                continue;
            }
        };
        if !visitor.visit_class(class)? {
            continue;
        }
        if !visitor.visit_method(&key.name, key.desc.as_ref().map(String::as_str))? {
            continue;
        }
        if visitor.visit_method_arg(position, -1, None)? {
            visitor.visit_dst_name(MappedKind::MethodArg, 0, &entry.name)?;
        }
    }
    Ok(())
}

/// `p_123_1_` and the constructor form `p_i123_1_` parse to `("123", 1)`
fn parse_param_name(param: &str) -> Option<(&str, i32)> {
    let mut parts = param.split('_');
    if parts.next() != Some("p") {
        return None;
    }
    let id = parts.next()?;
    let id = if id.starts_with('i') { &id[1..] } else { id };
    let position = parts.next()?.parse::<i32>().ok()?;
    Some((id, position))
}

/// Read a `class,package` remap table into package rules, pattern first
pub fn read_packages_csv(text: &str, file: &str) -> Result<Vec<(String, String)>, Error> {
    #[derive(Debug, Deserialize)]
    struct PackageEntry {
        class: String,
        package: String,
    }
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut rules = Vec::new();
    for result in reader.deserialize::<PackageEntry>() {
        let entry: PackageEntry = result.map_err(|e| csv_error(file, e))?;
        rules.push((format!("**/{}", entry.class), entry.package));
    }
    Ok(rules)
}

/// Export the tree as an MCP-style zip: `fields.csv` and `methods.csv` with
/// `searge,name,side,desc` headers, comments in the final column
pub fn write_zip<W: Write + Seek>(
    tree: &FrozenTree,
    searge_ns: &str,
    named_ns: &str,
    out: W,
) -> Result<W, Error> {
    let searge = require_namespace(tree, searge_ns)?;
    let named = require_namespace(tree, named_ns)?;
    let mut zip = ZipWriter::new(out);
    zip.start_file("fields.csv", FileOptions::default())?;
    write_member_csv(&mut zip, tree, searge, named, McpMemberKind::Field)?;
    zip.start_file("methods.csv", FileOptions::default())?;
    write_member_csv(&mut zip, tree, searge, named, McpMemberKind::Method)?;
    Ok(zip.finish()?)
}

fn require_namespace(tree: &FrozenTree, name: &str) -> Result<i32, Error> {
    match tree.namespace_id(name) {
        NULL_NAMESPACE_ID => Err(NamespaceError::Missing(name.into()).into()),
        ns => Ok(ns),
    }
}

fn write_member_csv<W: Write>(
    out: W,
    tree: &FrozenTree,
    searge: i32,
    named: i32,
    kind: McpMemberKind,
) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&["searge", "name", "side", "desc"])?;
    for class in tree.classes() {
        match kind {
            McpMemberKind::Field => {
                for field in class.fields() {
                    if let (Some(searge_name), Some(named_name)) =
                        (field.name(searge), field.name(named))
                    {
                        writer.write_record(&[
                            searge_name,
                            named_name,
                            "2",
                            field.comment().unwrap_or(""),
                        ])?;
                    }
                }
            }
            McpMemberKind::Method => {
                for method in class.methods() {
                    if let (Some(searge_name), Some(named_name)) =
                        (method.name(searge), method.name(named))
                    {
                        writer.write_record(&[
                            searge_name,
                            named_name,
                            "2",
                            method.comment().unwrap_or(""),
                        ])?;
                    }
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::tsrg::read_tsrg;
    use crate::tree::MappingTree;
    use crate::visitor::MappingVisitor;
    use std::io::Cursor;

    fn seeded_tree() -> MappingTree {
        // Searge names come from a tsrg-style input ingested first
        let text = "a/b/C net/minecraft/Thing\n\
                    \tf field_1_a\n\
                    \tg field_2_b\n\
                    \tm (I)V func_3_a\n";
        let mut tree = MappingTree::new();
        read_tsrg(text, "seed.tsrg", &mut tree).unwrap();
        tree
    }

    #[test]
    fn members_csv_resolves_owners() {
        let mut tree = seeded_tree();
        let index = tree.dst_index("target").unwrap();
        let csv = "searge,name,side,desc\n\
                   field_1_a,count,2,\"The count, of things\"\n\
                   field_9_z,missing,2,\n";
        read_members_csv(csv, "fields.csv", McpMemberKind::Field, Side::Both, &index, "mcp", &mut tree)
            .unwrap();
        let tree = tree.freeze();
        let mcp = tree.namespace_id("mcp");
        let class = tree.get_class("a/b/C").unwrap();
        let field = class.get_field("f", None).unwrap();
        assert_eq!(field.name(mcp), Some("count"));
        assert_eq!(field.comment(), Some("The count, of things"));
    }

    #[test]
    fn side_filtering() {
        let mut tree = seeded_tree();
        let index = tree.dst_index("target").unwrap();
        let csv = "searge,name,side,desc\n\
                   field_1_a,clientOnly,0,\n\
                   field_2_b,everywhere,2,\n";
        read_members_csv(csv, "fields.csv", McpMemberKind::Field, Side::Server, &index, "mcp", &mut tree)
            .unwrap();
        let tree = tree.freeze();
        let mcp = tree.namespace_id("mcp");
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.get_field("f", None).unwrap().name(mcp), None);
        assert_eq!(class.get_field("g", None).unwrap().name(mcp), Some("everywhere"));
    }

    #[test]
    fn side_filtering_is_idempotent() {
        let csv = "searge,name,side,desc\n\
                   field_1_a,clientOnly,0,\n\
                   field_2_b,everywhere,2,\n";
        let read_filtered = |passes: usize| {
            let mut tree = seeded_tree();
            let index = tree.dst_index("target").unwrap();
            for _ in 0..passes {
                read_members_csv(csv, "fields.csv", McpMemberKind::Field, Side::Server, &index, "mcp", &mut tree)
                    .unwrap();
            }
            tree.freeze()
        };
        let once = read_filtered(1);
        let twice = read_filtered(2);
        let mcp = once.namespace_id("mcp");
        for (a, b) in once.classes().zip(twice.classes()) {
            assert_eq!(a.src_name(), b.src_name());
            for (fa, fb) in a.fields().zip(b.fields()) {
                assert_eq!(fa.name(mcp), fb.name(mcp));
            }
        }
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn old_generation_without_side() {
        let mut tree = seeded_tree();
        let index = tree.dst_index("target").unwrap();
        let csv = "searge,name,notes\n\
                   func_3_a,doThing,calls the thing\n";
        read_members_csv(csv, "methods.csv", McpMemberKind::Method, Side::Client, &index, "mcp", &mut tree)
            .unwrap();
        let tree = tree.freeze();
        let mcp = tree.namespace_id("mcp");
        let method = tree.get_class("a/b/C").unwrap().get_method("m", Some("(I)V")).unwrap();
        assert_eq!(method.name(mcp), Some("doThing"));
        assert_eq!(method.comment(), Some("calls the thing"));
    }

    #[test]
    fn legacy_csv_repairs_simple_names() {
        let mut tree = MappingTree::new();
        tree.visit_header().unwrap();
        tree.visit_namespaces("source", &[]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("net/minecraft/Inner").unwrap();
        tree.visit_class("net/minecraft/Outer").unwrap();
        tree.visit_end().unwrap();
        let known: Vec<String> = tree.src_class_names().map(String::from).collect();
        let csv = "class,notch,searge,name,sig,side,notes\n\
                   Outer,a,field_1_a,count,LInner;,2,\n\
                   Outer,b,func_2_b,doThing,(LInner;)V,2,does it\n";
        read_legacy_csv(csv, "legacy.csv", Side::Both, "source", "mcp", &known, &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("net/minecraft/Outer").unwrap();
        let field = class.get_field("a", Some("Lnet/minecraft/Inner;")).unwrap();
        assert_eq!(field.name(0), Some("field_1_a"));
        assert_eq!(field.name(1), Some("count"));
        let method = class.get_method("b", Some("(Lnet/minecraft/Inner;)V")).unwrap();
        assert_eq!(method.name(1), Some("doThing"));
        assert_eq!(method.comment(), Some("does it"));
    }

    #[test]
    fn params_csv_ties_to_searge_ids() {
        let mut tree = seeded_tree();
        let index = tree.dst_index("target").unwrap();
        let csv = "param,name,side\n\
                   p_3_1_,amount,2\n\
                   p_99_1_,orphan,2\n";
        read_params_csv(csv, "params.csv", Side::Both, &index, "mcp", &mut tree).unwrap();
        let tree = tree.freeze();
        let method = tree.get_class("a/b/C").unwrap().get_method("m", Some("(I)V")).unwrap();
        assert_eq!(method.args().len(), 1);
        assert_eq!(method.args()[0].arg_position(), 1);
        let mcp = tree.namespace_id("mcp");
        assert_eq!(method.args()[0].dst_name(mcp as usize), Some("amount"));
    }

    #[test]
    fn packages_csv_rules() {
        let rules = read_packages_csv("class,package\nThing,net/minecraft/entity\n", "packages.csv")
            .unwrap();
        assert_eq!(rules, vec![("**/Thing".to_string(), "net/minecraft/entity".to_string())]);
    }

    #[test]
    fn zip_roundtrip() {
        let mut tree = seeded_tree();
        let index = tree.dst_index("target").unwrap();
        let csv = "searge,name,side,desc\n\
                   field_1_a,count,2,a \"quoted\" comment\n";
        read_members_csv(csv, "fields.csv", McpMemberKind::Field, Side::Both, &index, "mcp", &mut tree)
            .unwrap();
        let frozen = tree.freeze();
        let buffer = write_zip(&frozen, "target", "mcp", Cursor::new(Vec::new())).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        let mut fields = String::new();
        {
            use std::io::Read;
            archive
                .by_name("fields.csv")
                .unwrap()
                .read_to_string(&mut fields)
                .unwrap();
        }
        assert!(fields.starts_with("searge,name,side,desc\n"));
        assert!(fields.contains("field_1_a,count,2,\"a \"\"quoted\"\" comment\"\n"));
        archive.by_name("methods.csv").unwrap();
    }

    #[test]
    fn missing_namespace_fails_fast() {
        let tree = seeded_tree().freeze();
        let err = write_zip(&tree, "nonexistent", "target", Cursor::new(Vec::new())).unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }
}
