//! Seeds a tree straight from compiled classes when no textual mapping
//! exists for a namespace yet. Only the structural skeleton is read: the
//! constant pool, the inheritance links and the member name/descriptor
//! pairs. Method bodies and attributes are skipped wholesale.

use std::io::{Cursor, Read};

use failure::Error;
use failure_derive::Fail;
use indexmap::IndexMap;
use zip::ZipArchive;

use crate::visitor::MappingVisitor;

#[derive(Debug, Fail)]
#[fail(display = "{}: malformed class file at byte {} ({})", file, offset, what)]
pub struct ClassFormatError {
    file: String,
    offset: usize,
    what: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberSig {
    pub name: String,
    pub desc: String,
}

/// Structural skeleton of one class: inheritance links plus declared members
#[derive(Clone, Debug)]
pub struct ClassSkeleton {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberSig>,
    pub methods: Vec<MemberSig>,
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    file: &'a str,
}
impl<'a> ByteReader<'a> {
    fn error(&self, what: &'static str) -> ClassFormatError {
        ClassFormatError {
            file: self.file.into(),
            offset: self.pos,
            what,
        }
    }
    fn u8(&mut self) -> Result<u8, ClassFormatError> {
        let value = *self.data.get(self.pos).ok_or_else(|| self.error("unexpected end"))?;
        self.pos += 1;
        Ok(value)
    }
    fn u16(&mut self) -> Result<u16, ClassFormatError> {
        Ok(u16::from(self.u8()?) << 8 | u16::from(self.u8()?))
    }
    fn u32(&mut self) -> Result<u32, ClassFormatError> {
        Ok(u32::from(self.u16()?) << 16 | u32::from(self.u16()?))
    }
    fn skip(&mut self, count: usize) -> Result<(), ClassFormatError> {
        if self.pos + count > self.data.len() {
            return Err(self.error("unexpected end"));
        }
        self.pos += count;
        Ok(())
    }
    fn utf8(&mut self, length: usize) -> Result<String, ClassFormatError> {
        if self.pos + length > self.data.len() {
            return Err(self.error("unexpected end"));
        }
        let bytes = &self.data[self.pos..self.pos + length];
        // Modified utf8 differences don't matter for symbol names
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.pos += length;
        Ok(text)
    }
}

enum CpEntry {
    Utf8(String),
    Class(u16),
    Other,
}

/// Parse the structural skeleton of a single class file
pub fn parse_class(data: &[u8], file: &str) -> Result<ClassSkeleton, Error> {
    let mut reader = ByteReader { data, pos: 0, file };
    if reader.u32()? != 0xCAFE_BABE {
        return Err(reader.error("bad magic").into());
    }
    reader.skip(4)?; // minor/major version
    let cp_count = reader.u16()? as usize;
    let mut pool: Vec<CpEntry> = Vec::with_capacity(cp_count);
    pool.push(CpEntry::Other); // Slot 0 is unused
    let mut index = 1;
    while index < cp_count {
        let tag = reader.u8()?;
        let entry = match tag {
            1 => {
                let length = reader.u16()? as usize;
                CpEntry::Utf8(reader.utf8(length)?)
            }
            7 => CpEntry::Class(reader.u16()?),
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                reader.skip(4)?;
                CpEntry::Other
            }
            8 | 16 | 19 | 20 => {
                reader.skip(2)?;
                CpEntry::Other
            }
            15 => {
                reader.skip(3)?;
                CpEntry::Other
            }
            5 | 6 => {
                reader.skip(8)?;
                CpEntry::Other
            }
            _ => return Err(reader.error("unknown constant tag").into()),
        };
        let wide = tag == 5 || tag == 6;
        pool.push(entry);
        index += 1;
        if wide {
            // Longs and doubles occupy two pool slots
            pool.push(CpEntry::Other);
            index += 1;
        }
    }
    reader.skip(2)?; // access flags
    let this_class = reader.u16()?;
    let super_class = reader.u16()?;
    let name = cp_class_name(&pool, this_class, &reader)?;
    let super_name = if super_class == 0 {
        None
    } else {
        Some(cp_class_name(&pool, super_class, &reader)?)
    };
    let interface_count = reader.u16()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count);
    for _ in 0..interface_count {
        let index = reader.u16()?;
        interfaces.push(cp_class_name(&pool, index, &reader)?);
    }
    let fields = read_members(&mut reader, &pool)?;
    let methods = read_members(&mut reader, &pool)?;
    Ok(ClassSkeleton {
        name,
        super_name,
        interfaces,
        fields,
        methods,
    })
}

fn cp_utf8(pool: &[CpEntry], index: u16, reader: &ByteReader) -> Result<String, ClassFormatError> {
    match pool.get(index as usize) {
        Some(CpEntry::Utf8(text)) => Ok(text.clone()),
        _ => Err(reader.error("constant is not utf8")),
    }
}

fn cp_class_name(pool: &[CpEntry], index: u16, reader: &ByteReader) -> Result<String, ClassFormatError> {
    match pool.get(index as usize) {
        Some(&CpEntry::Class(name_index)) => cp_utf8(pool, name_index, reader),
        _ => Err(reader.error("constant is not a class")),
    }
}

fn read_members(reader: &mut ByteReader, pool: &[CpEntry]) -> Result<Vec<MemberSig>, ClassFormatError> {
    let count = reader.u16()? as usize;
    let mut list = Vec::with_capacity(count);
    for _ in 0..count {
        reader.skip(2)?; // access flags
        let name_index = reader.u16()?;
        let desc_index = reader.u16()?;
        let attribute_count = reader.u16()? as usize;
        for _ in 0..attribute_count {
            reader.skip(2)?;
            let length = reader.u32()? as usize;
            reader.skip(length)?;
        }
        list.push(MemberSig {
            name: cp_utf8(pool, name_index, reader)?,
            desc: cp_utf8(pool, desc_index, reader)?,
        });
    }
    Ok(list)
}

/// Structural skeletons of every class in an archive
#[derive(Clone, Debug, Default)]
pub struct JarSkeleton {
    classes: IndexMap<String, ClassSkeleton>,
}
impl JarSkeleton {
    pub fn from_zip(data: &[u8], file: &str) -> Result<JarSkeleton, Error> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut skeleton = JarSkeleton::default();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if !entry.name().ends_with(".class") {
                continue;
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            let name = entry.name().to_string();
            let class = parse_class(&bytes, &format!("{}!{}", file, name))?;
            skeleton.classes.insert(class.name.clone(), class);
        }
        Ok(skeleton)
    }
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ClassSkeleton> {
        self.classes.get(name)
    }
    #[inline]
    pub fn classes(&self) -> impl Iterator<Item = &ClassSkeleton> {
        self.classes.values()
    }
    /// Whether any ancestor of `class` (not the class itself) declares a
    /// method with this name and descriptor. Ancestors outside the archive
    /// end the walk.
    pub fn ancestor_declares_method(&self, class: &str, name: &str, desc: &str) -> bool {
        let start = match self.get(class) {
            Some(skeleton) => skeleton,
            None => return false,
        };
        let mut pending: Vec<&str> = Vec::new();
        if let Some(ref super_name) = start.super_name {
            pending.push(super_name);
        }
        pending.extend(start.interfaces.iter().map(String::as_str));
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            let skeleton = match self.get(current) {
                Some(skeleton) => skeleton,
                None => continue,
            };
            if skeleton.methods.iter().any(|m| m.name == name && m.desc == desc) {
                return true;
            }
            if let Some(ref super_name) = skeleton.super_name {
                pending.push(super_name);
            }
            pending.extend(skeleton.interfaces.iter().map(String::as_str));
        }
        false
    }
}

/// Emit one class's skeleton as mapping visits under a single namespace
pub fn read_class<V: MappingVisitor>(
    data: &[u8],
    file: &str,
    namespace: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let skeleton = parse_class(data, file)?;
    loop {
        if visitor.visit_header()? {
            visitor.visit_namespaces(namespace, &[])?;
        }
        if visitor.visit_content()? {
            emit_class(&skeleton, visitor)?;
        }
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

/// Emit every class in an archive, seeding a tree from a jar
pub fn read_jar<V: MappingVisitor>(
    data: &[u8],
    file: &str,
    namespace: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let skeleton = JarSkeleton::from_zip(data, file)?;
    loop {
        if visitor.visit_header()? {
            visitor.visit_namespaces(namespace, &[])?;
        }
        if visitor.visit_content()? {
            for class in skeleton.classes() {
                emit_class(class, visitor)?;
            }
        }
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn emit_class<V: MappingVisitor>(skeleton: &ClassSkeleton, visitor: &mut V) -> Result<(), Error> {
    if !visitor.visit_class(&skeleton.name)? {
        return Ok(());
    }
    if !visitor.visit_element_content(crate::visitor::MappedKind::Class)? {
        return Ok(());
    }
    for field in &skeleton.fields {
        visitor.visit_field(&field.name, Some(&field.desc))?;
    }
    for method in &skeleton.methods {
        visitor.visit_method(&method.name, Some(&method.desc))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::tree::MappingTree;
    use std::io::Write;

    /// Assemble a minimal class file: `name extends super_name` with the
    /// given fields and methods, no attributes
    pub(crate) fn build_class(
        name: &str,
        super_name: &str,
        fields: &[(&str, &str)],
        methods: &[(&str, &str)],
    ) -> Vec<u8> {
        fn push_utf8(pool: &mut Vec<Vec<u8>>, text: &str) -> u16 {
            let mut entry = vec![1u8];
            entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
            entry.extend_from_slice(text.as_bytes());
            pool.push(entry);
            pool.len() as u16
        }
        fn push_class(pool: &mut Vec<Vec<u8>>, utf8_index: u16) -> u16 {
            let mut entry = vec![7u8];
            entry.extend_from_slice(&utf8_index.to_be_bytes());
            pool.push(entry);
            pool.len() as u16
        }
        let mut pool: Vec<Vec<u8>> = Vec::new();
        let name_utf8 = push_utf8(&mut pool, name);
        let this_class = push_class(&mut pool, name_utf8);
        let super_utf8 = push_utf8(&mut pool, super_name);
        let super_class = push_class(&mut pool, super_utf8);
        let mut member_indices = Vec::new();
        for &(member_name, desc) in fields.iter().chain(methods.iter()) {
            let name_index = push_utf8(&mut pool, member_name);
            let desc_index = push_utf8(&mut pool, desc);
            member_indices.push((name_index, desc_index));
        }
        let mut out = Vec::new();
        out.extend_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52]);
        out.extend_from_slice(&((pool.len() + 1) as u16).to_be_bytes());
        for entry in &pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes()); // access
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
        out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
        for &(name_index, desc_index) in &member_indices[..fields.len()] {
            out.extend_from_slice(&2u16.to_be_bytes());
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&desc_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&(methods.len() as u16).to_be_bytes());
        for &(name_index, desc_index) in &member_indices[fields.len()..] {
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&name_index.to_be_bytes());
            out.extend_from_slice(&desc_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
        out
    }

    pub(crate) fn build_jar(classes: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, bytes) in classes {
            writer
                .start_file(format!("{}.class", name), zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn parses_skeleton() {
        let bytes = build_class("a/B", "a/A", &[("f", "I")], &[("m", "()V")]);
        let skeleton = parse_class(&bytes, "B.class").unwrap();
        assert_eq!(skeleton.name, "a/B");
        assert_eq!(skeleton.super_name.as_ref().map(String::as_str), Some("a/A"));
        assert_eq!(skeleton.fields, vec![MemberSig { name: "f".into(), desc: "I".into() }]);
        assert_eq!(skeleton.methods, vec![MemberSig { name: "m".into(), desc: "()V".into() }]);
    }

    #[test]
    fn seeds_tree_from_class() {
        let bytes = build_class("a/B", "java/lang/Object", &[("f", "I")], &[("m", "()V")]);
        let mut tree = MappingTree::new();
        read_class(&bytes, "B.class", "official", &mut tree).unwrap();
        let tree = tree.freeze();
        assert_eq!(tree.src_namespace(), "official");
        assert!(tree.dst_namespaces().is_empty());
        let class = tree.get_class("a/B").unwrap();
        assert!(class.get_field("f", Some("I")).is_some());
        assert!(class.get_method("m", Some("()V")).is_some());
    }

    #[test]
    fn jar_skeleton_ancestor_walk() {
        let parent = build_class("a/A", "java/lang/Object", &[], &[("m", "()V")]);
        let child = build_class("a/B", "a/A", &[], &[("own", "()V")]);
        let jar = build_jar(&[("a/A", parent), ("a/B", child)]);
        let skeleton = JarSkeleton::from_zip(&jar, "test.jar").unwrap();
        assert!(skeleton.ancestor_declares_method("a/B", "m", "()V"));
        assert!(!skeleton.ancestor_declares_method("a/B", "own", "()V"));
        assert!(!skeleton.ancestor_declares_method("a/A", "m", "()V"));
    }

    #[test]
    fn truncated_class_reports_offset() {
        let err = parse_class(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0], "bad.class").unwrap_err();
        assert!(err.to_string().contains("bad.class"));
    }
}
