//! The in-memory symbol table: one name per namespace for every class,
//! method, field, parameter and local variable.
//!
//! A [`MappingTree`] is the mutable build-phase form. It implements
//! [`MappingVisitor`] as a sink, so any reader or transform chain can feed
//! it, and re-visits of the same symbol merge idempotently (destination
//! names are first-write-wins). Once every input is ingested the tree is
//! consumed by [`MappingTree::freeze`] into a [`FrozenTree`], which only
//! exposes queries; there is no way back, so post-freeze immutability is
//! enforced by the type system rather than a runtime flag.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use failure::Error;
use failure_derive::Fail;
use indexmap::IndexMap;

use crate::visitor::{MappedKind, MappingVisitor, VisitorFlags};

/// Namespace id of the tree's source (identity) axis
pub const SRC_NAMESPACE_ID: i32 = -1;
/// Namespace id meaning "not present"
pub const NULL_NAMESPACE_ID: i32 = -2;

#[derive(Debug, Fail)]
pub enum NamespaceError {
    #[fail(display = "Source namespace {:?} doesn't match the tree's {:?}", found, expected)]
    SourceMismatch { expected: String, found: String },
    #[fail(display = "Namespace {:?} is not present in the tree", _0)]
    Missing(String),
    #[fail(display = "Writer supports {} destination namespace(s), was given {}", supported, found)]
    DestinationCount { supported: usize, found: usize },
}

#[derive(Debug, Fail)]
#[fail(display = "{} visited with no open {}", visited, missing)]
pub struct ProtocolViolation {
    visited: &'static str,
    missing: &'static str,
}
impl ProtocolViolation {
    fn new(visited: &'static str, missing: &'static str) -> ProtocolViolation {
        ProtocolViolation { visited, missing }
    }
}

impl Display for MappedKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            MappedKind::Class => "class",
            MappedKind::Method => "method",
            MappedKind::Field => "field",
            MappedKind::MethodArg => "parameter",
            MappedKind::MethodVar => "variable",
        })
    }
}

/// Member identity within a class. The descriptor participates because
/// overloads share a name; fields from descriptor-less formats carry `None`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MemberKey {
    pub name: String,
    pub desc: Option<String>,
}
impl MemberKey {
    #[inline]
    pub fn new(name: &str, desc: Option<&str>) -> MemberKey {
        MemberKey {
            name: name.into(),
            desc: desc.map(String::from),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMapping {
    src_name: String,
    src_desc: Option<String>,
    dst_names: Vec<Option<String>>,
    dst_descs: Vec<Option<String>>,
    comment: Option<String>,
}
impl FieldMapping {
    #[inline]
    pub fn src_name(&self) -> &str {
        &self.src_name
    }
    #[inline]
    pub fn src_desc(&self) -> Option<&str> {
        self.src_desc.as_ref().map(String::as_str)
    }
    pub fn name(&self, ns: i32) -> Option<&str> {
        name_in(&self.src_name, &self.dst_names, ns)
    }
    pub fn dst_desc(&self, ns: usize) -> Option<&str> {
        self.dst_descs.get(ns).and_then(|d| d.as_ref()).map(String::as_str)
    }
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_ref().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArgMapping {
    arg_position: i32,
    lv_index: i32,
    src_name: Option<String>,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
}
impl ArgMapping {
    #[inline]
    pub fn arg_position(&self) -> i32 {
        self.arg_position
    }
    #[inline]
    pub fn lv_index(&self) -> i32 {
        self.lv_index
    }
    #[inline]
    pub fn src_name(&self) -> Option<&str> {
        self.src_name.as_ref().map(String::as_str)
    }
    pub fn dst_name(&self, ns: usize) -> Option<&str> {
        self.dst_names.get(ns).and_then(|n| n.as_ref()).map(String::as_str)
    }
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_ref().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarMapping {
    lv_index: i32,
    lvt_row_index: i32,
    start_op_idx: i32,
    src_name: Option<String>,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
}
impl VarMapping {
    #[inline]
    pub fn lv_index(&self) -> i32 {
        self.lv_index
    }
    #[inline]
    pub fn lvt_row_index(&self) -> i32 {
        self.lvt_row_index
    }
    #[inline]
    pub fn start_op_idx(&self) -> i32 {
        self.start_op_idx
    }
    #[inline]
    pub fn src_name(&self) -> Option<&str> {
        self.src_name.as_ref().map(String::as_str)
    }
    pub fn dst_name(&self, ns: usize) -> Option<&str> {
        self.dst_names.get(ns).and_then(|n| n.as_ref()).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodMapping {
    src_name: String,
    src_desc: Option<String>,
    dst_names: Vec<Option<String>>,
    dst_descs: Vec<Option<String>>,
    comment: Option<String>,
    args: Vec<ArgMapping>,
    vars: Vec<VarMapping>,
}
impl MethodMapping {
    #[inline]
    pub fn src_name(&self) -> &str {
        &self.src_name
    }
    #[inline]
    pub fn src_desc(&self) -> Option<&str> {
        self.src_desc.as_ref().map(String::as_str)
    }
    pub fn name(&self, ns: i32) -> Option<&str> {
        name_in(&self.src_name, &self.dst_names, ns)
    }
    pub fn dst_desc(&self, ns: usize) -> Option<&str> {
        self.dst_descs.get(ns).and_then(|d| d.as_ref()).map(String::as_str)
    }
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_ref().map(String::as_str)
    }
    #[inline]
    pub fn args(&self) -> &[ArgMapping] {
        &self.args
    }
    #[inline]
    pub fn vars(&self) -> &[VarMapping] {
        &self.vars
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassMapping {
    src_name: String,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
    fields: IndexMap<MemberKey, FieldMapping>,
    methods: IndexMap<MemberKey, MethodMapping>,
}
impl ClassMapping {
    fn new(src_name: &str) -> ClassMapping {
        ClassMapping {
            src_name: src_name.into(),
            dst_names: Vec::new(),
            comment: None,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }
    #[inline]
    pub fn src_name(&self) -> &str {
        &self.src_name
    }
    /// Name of this class in the given namespace, `None` if unmapped there
    pub fn name(&self, ns: i32) -> Option<&str> {
        name_in(&self.src_name, &self.dst_names, ns)
    }
    #[inline]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_ref().map(String::as_str)
    }
    #[inline]
    pub fn fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.values()
    }
    #[inline]
    pub fn methods(&self) -> impl Iterator<Item = &MethodMapping> {
        self.methods.values()
    }
    pub fn get_field(&self, name: &str, desc: Option<&str>) -> Option<&FieldMapping> {
        resolve_member(&self.fields, name, desc)
    }
    pub fn get_method(&self, name: &str, desc: Option<&str>) -> Option<&MethodMapping> {
        resolve_member(&self.methods, name, desc)
    }
}

fn name_in<'a>(src: &'a str, dst_names: &'a [Option<String>], ns: i32) -> Option<&'a str> {
    match ns {
        SRC_NAMESPACE_ID => Some(src),
        ns if ns >= 0 => dst_names
            .get(ns as usize)
            .and_then(|n| n.as_ref())
            .map(String::as_str),
        _ => None,
    }
}

/// Exact `(name, desc)` identity first; a descriptor-less query (or a
/// descriptor-less stored field) still resolves when the name is unambiguous.
fn resolve_member<'a, M>(
    members: &'a IndexMap<MemberKey, M>,
    name: &str,
    desc: Option<&str>,
) -> Option<&'a M> {
    if let Some(member) = members.get(&MemberKey::new(name, desc)) {
        return Some(member);
    }
    let mut found = None;
    for (key, member) in members {
        if key.name != name {
            continue;
        }
        if desc.is_some() && key.desc.is_some() {
            // Both sides know the descriptor and it already failed to match
            continue;
        }
        if found.is_some() {
            return None; // Ambiguous
        }
        found = Some(member);
    }
    found
}

fn set_dst(slots: &mut Vec<Option<String>>, ns: usize, value: &str) {
    if slots.len() <= ns {
        slots.resize(ns + 1, None);
    }
    if slots[ns].is_none() {
        slots[ns] = Some(value.into());
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum MemberRef {
    Method(usize),
    Field(usize),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SubRef {
    Arg(usize),
    Var(usize),
}

/// Pass-scoped sink state, reset whenever a new pass declares its header
#[derive(Clone, Debug, Default)]
struct SinkState {
    /// Producer destination-namespace index to tree slot, `None` = dropped
    ns_map: Vec<Option<usize>>,
    ns_mapped: bool,
    current_class: Option<usize>,
    current_member: Option<MemberRef>,
    current_sub: Option<SubRef>,
}

#[derive(Clone, Debug, Default)]
pub struct MappingTree {
    src_namespace: Option<String>,
    dst_namespaces: Vec<String>,
    classes: IndexMap<String, ClassMapping>,
    state: SinkState,
}
impl MappingTree {
    #[inline]
    pub fn new() -> MappingTree {
        MappingTree::default()
    }
    pub fn src_namespace(&self) -> Option<&str> {
        self.src_namespace.as_ref().map(String::as_str)
    }
    #[inline]
    pub fn dst_namespaces(&self) -> &[String] {
        &self.dst_namespaces
    }
    #[inline]
    pub fn classes(&self) -> impl Iterator<Item = &ClassMapping> {
        self.classes.values()
    }
    #[inline]
    pub fn get_class(&self, src_name: &str) -> Option<&ClassMapping> {
        self.classes.get(src_name)
    }
    /// Dense id for a namespace label, [`NULL_NAMESPACE_ID`] when absent
    pub fn namespace_id(&self, name: &str) -> i32 {
        namespace_id_in(self.src_namespace(), &self.dst_namespaces, name)
    }
    /// Snapshot of every known destination name in `namespace`, for readers
    /// that must recover owning classes from already-ingested names
    pub fn dst_index(&self, namespace: &str) -> Result<DstIndex, Error> {
        let ns = match self.namespace_id(namespace) {
            NULL_NAMESPACE_ID => return Err(NamespaceError::Missing(namespace.into()).into()),
            ns => ns,
        };
        let mut index = DstIndex::default();
        index.src_namespace = self.src_namespace().unwrap_or("").to_string();
        for class in self.classes.values() {
            let class_name = match class.name(ns) {
                Some(name) => name,
                None => continue,
            };
            index.classes.insert(class_name.into(), class.src_name.clone());
            for (key, field) in &class.fields {
                if let Some(name) = field.name(ns) {
                    index
                        .fields
                        .entry(name.into())
                        .or_insert_with(|| (class.src_name.clone(), key.clone()));
                }
            }
            for (key, method) in &class.methods {
                if let Some(name) = method.name(ns) {
                    index
                        .methods
                        .entry(name.into())
                        .or_insert_with(|| (class.src_name.clone(), key.clone()));
                }
            }
        }
        Ok(index)
    }
    /// Internal names of every known class in the source namespace,
    /// used by the legacy-MCP simple-name repair heuristic
    pub fn src_class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Consume the tree into its immutable query form
    pub fn freeze(self) -> FrozenTree {
        let mut dst_class_index: Vec<HashMap<String, usize>> =
            vec![HashMap::new(); self.dst_namespaces.len()];
        for (class_index, class) in self.classes.values().enumerate() {
            for (ns, name) in class.dst_names.iter().enumerate() {
                if let Some(name) = name {
                    dst_class_index[ns].entry(name.clone()).or_insert(class_index);
                }
            }
        }
        FrozenTree {
            src_namespace: self.src_namespace.unwrap_or_default(),
            dst_namespaces: self.dst_namespaces,
            classes: self.classes,
            dst_class_index,
        }
    }

    /// Replay the whole tree through a visitor, re-running the pass for as
    /// long as `visit_end` keeps returning false
    pub fn accept<V: MappingVisitor>(&self, visitor: &mut V) -> Result<(), Error> {
        accept_impl(
            self.src_namespace().unwrap_or(""),
            &self.dst_namespaces,
            &self.classes,
            visitor,
        )
    }

    fn current_class_mut(&mut self, visited: &'static str) -> Result<&mut ClassMapping, Error> {
        let index = self
            .state
            .current_class
            .ok_or_else(|| ProtocolViolation::new(visited, "class"))?;
        Ok(self.classes.get_index_mut(index).unwrap().1)
    }
    fn current_method_mut(&mut self, visited: &'static str) -> Result<&mut MethodMapping, Error> {
        let member = self
            .state
            .current_member
            .ok_or_else(|| ProtocolViolation::new(visited, "method"))?;
        let index = match member {
            MemberRef::Method(index) => index,
            MemberRef::Field(_) => return Err(ProtocolViolation::new(visited, "method").into()),
        };
        let class = self.current_class_mut(visited)?;
        Ok(class.methods.get_index_mut(index).unwrap().1)
    }
    fn map_namespace(&self, ns: usize) -> Option<usize> {
        if self.state.ns_mapped {
            self.state.ns_map.get(ns).copied().unwrap_or(None)
        } else {
            // No header was declared this pass; producer indices are tree indices
            if ns < self.dst_namespaces.len() {
                Some(ns)
            } else {
                None
            }
        }
    }
}

impl MappingVisitor for MappingTree {
    fn flags(&self) -> VisitorFlags {
        VisitorFlags::empty()
    }
    fn visit_header(&mut self) -> Result<bool, Error> {
        self.state = SinkState::default();
        Ok(true)
    }
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        match self.src_namespace {
            None => {
                self.src_namespace = Some(src.into());
                self.dst_namespaces = dst.iter().map(|&s| String::from(s)).collect();
                self.state.ns_map = (0..dst.len()).map(Some).collect();
            }
            Some(ref existing) => {
                if existing != src {
                    return Err(NamespaceError::SourceMismatch {
                        expected: existing.clone(),
                        found: src.into(),
                    }
                    .into());
                }
                let existing = existing.clone();
                let mut ns_map = Vec::with_capacity(dst.len());
                for &name in dst {
                    if name == existing {
                        // A destination colliding with the identity axis
                        // carries no information
                        ns_map.push(None);
                        continue;
                    }
                    let index = match self.dst_namespaces.iter().position(|n| n == name) {
                        Some(index) => index,
                        None => {
                            self.dst_namespaces.push(name.into());
                            self.dst_namespaces.len() - 1
                        }
                    };
                    ns_map.push(Some(index));
                }
                self.state.ns_map = ns_map;
            }
        }
        self.state.ns_mapped = true;
        Ok(())
    }
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        let entry = self.classes.entry(src_name.into());
        let index = entry.index();
        entry.or_insert_with(|| ClassMapping::new(src_name));
        self.state.current_class = Some(index);
        self.state.current_member = None;
        self.state.current_sub = None;
        Ok(true)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let key = MemberKey::new(src_name, src_desc);
        let class = self.current_class_mut("method")?;
        let entry = class.methods.entry(key);
        let index = entry.index();
        entry.or_insert_with(|| MethodMapping {
            src_name: src_name.into(),
            src_desc: src_desc.map(String::from),
            dst_names: Vec::new(),
            dst_descs: Vec::new(),
            comment: None,
            args: Vec::new(),
            vars: Vec::new(),
        });
        self.state.current_member = Some(MemberRef::Method(index));
        self.state.current_sub = None;
        Ok(true)
    }
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let key = MemberKey::new(src_name, src_desc);
        let class = self.current_class_mut("field")?;
        let entry = class.fields.entry(key);
        let index = entry.index();
        entry.or_insert_with(|| FieldMapping {
            src_name: src_name.into(),
            src_desc: src_desc.map(String::from),
            dst_names: Vec::new(),
            dst_descs: Vec::new(),
            comment: None,
        });
        self.state.current_member = Some(MemberRef::Field(index));
        self.state.current_sub = None;
        Ok(true)
    }
    fn visit_method_arg(
        &mut self,
        arg_position: i32,
        lv_index: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        if arg_position < 0 && lv_index < 0 {
            return Err(ProtocolViolation::new("parameter", "argument or local index").into());
        }
        let method = self.current_method_mut("parameter")?;
        let existing = method.args.iter().position(|arg| {
            (arg_position >= 0 && arg.arg_position == arg_position)
                || (lv_index >= 0 && arg.lv_index == lv_index)
        });
        let index = match existing {
            Some(index) => {
                let arg = &mut method.args[index];
                if arg.src_name.is_none() {
                    arg.src_name = src_name.map(String::from);
                }
                if arg.arg_position < 0 {
                    arg.arg_position = arg_position;
                }
                if arg.lv_index < 0 {
                    arg.lv_index = lv_index;
                }
                index
            }
            None => {
                method.args.push(ArgMapping {
                    arg_position,
                    lv_index,
                    src_name: src_name.map(String::from),
                    dst_names: Vec::new(),
                    comment: None,
                });
                method.args.len() - 1
            }
        };
        self.state.current_sub = Some(SubRef::Arg(index));
        Ok(true)
    }
    fn visit_method_var(
        &mut self,
        lv_index: i32,
        lvt_row_index: i32,
        start_op_idx: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        let method = self.current_method_mut("variable")?;
        let existing = method.vars.iter().position(|var| {
            if lvt_row_index >= 0 && var.lvt_row_index >= 0 {
                var.lvt_row_index == lvt_row_index
            } else {
                var.lv_index == lv_index && var.start_op_idx == start_op_idx
            }
        });
        let index = match existing {
            Some(index) => {
                let var = &mut method.vars[index];
                if var.src_name.is_none() {
                    var.src_name = src_name.map(String::from);
                }
                if var.lvt_row_index < 0 {
                    var.lvt_row_index = lvt_row_index;
                }
                index
            }
            None => {
                method.vars.push(VarMapping {
                    lv_index,
                    lvt_row_index,
                    start_op_idx,
                    src_name: src_name.map(String::from),
                    dst_names: Vec::new(),
                    comment: None,
                });
                method.vars.len() - 1
            }
        };
        self.state.current_sub = Some(SubRef::Var(index));
        Ok(true)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        let ns = match self.map_namespace(namespace) {
            Some(ns) => ns,
            None => return Ok(()), // Dropped by the namespace map
        };
        let sub = self.state.current_sub;
        let member = self.state.current_member;
        match kind {
            MappedKind::Class => {
                let class = self.current_class_mut("class name")?;
                set_dst(&mut class.dst_names, ns, name);
            }
            MappedKind::Method => {
                let method = self.current_method_mut("method name")?;
                set_dst(&mut method.dst_names, ns, name);
            }
            MappedKind::Field => {
                let index = match member {
                    Some(MemberRef::Field(index)) => index,
                    _ => return Err(ProtocolViolation::new("field name", "field").into()),
                };
                let class = self.current_class_mut("field name")?;
                let field = class.fields.get_index_mut(index).unwrap().1;
                set_dst(&mut field.dst_names, ns, name);
            }
            MappedKind::MethodArg => {
                let index = match sub {
                    Some(SubRef::Arg(index)) => index,
                    _ => return Err(ProtocolViolation::new("parameter name", "parameter").into()),
                };
                let method = self.current_method_mut("parameter name")?;
                set_dst(&mut method.args[index].dst_names, ns, name);
            }
            MappedKind::MethodVar => {
                let index = match sub {
                    Some(SubRef::Var(index)) => index,
                    _ => return Err(ProtocolViolation::new("variable name", "variable").into()),
                };
                let method = self.current_method_mut("variable name")?;
                set_dst(&mut method.vars[index].dst_names, ns, name);
            }
        }
        Ok(())
    }
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        let ns = match self.map_namespace(namespace) {
            Some(ns) => ns,
            None => return Ok(()),
        };
        let member = self.state.current_member;
        match kind {
            MappedKind::Method => {
                let method = self.current_method_mut("method descriptor")?;
                set_dst(&mut method.dst_descs, ns, desc);
            }
            MappedKind::Field => {
                let index = match member {
                    Some(MemberRef::Field(index)) => index,
                    _ => return Err(ProtocolViolation::new("field descriptor", "field").into()),
                };
                let class = self.current_class_mut("field descriptor")?;
                let field = class.fields.get_index_mut(index).unwrap().1;
                set_dst(&mut field.dst_descs, ns, desc);
            }
            // Classes, parameters and variables have no descriptors
            _ => {}
        }
        Ok(())
    }
    fn visit_comment(&mut self, kind: MappedKind, comment: &str) -> Result<(), Error> {
        let member = self.state.current_member;
        let sub = self.state.current_sub;
        let slot = match kind {
            MappedKind::Class => &mut self.current_class_mut("class comment")?.comment,
            MappedKind::Method => &mut self.current_method_mut("method comment")?.comment,
            MappedKind::Field => {
                let index = match member {
                    Some(MemberRef::Field(index)) => index,
                    _ => return Err(ProtocolViolation::new("field comment", "field").into()),
                };
                let class = self.current_class_mut("field comment")?;
                &mut class.fields.get_index_mut(index).unwrap().1.comment
            }
            MappedKind::MethodArg => {
                let index = match sub {
                    Some(SubRef::Arg(index)) => index,
                    _ => return Err(ProtocolViolation::new("parameter comment", "parameter").into()),
                };
                &mut self.current_method_mut("parameter comment")?.args[index].comment
            }
            MappedKind::MethodVar => {
                let index = match sub {
                    Some(SubRef::Var(index)) => index,
                    _ => return Err(ProtocolViolation::new("variable comment", "variable").into()),
                };
                &mut self.current_method_mut("variable comment")?.vars[index].comment
            }
        };
        if slot.is_none() {
            *slot = Some(comment.into());
        }
        Ok(())
    }
}

fn namespace_id_in(src: Option<&str>, dst: &[String], name: &str) -> i32 {
    if src == Some(name) {
        return SRC_NAMESPACE_ID;
    }
    match dst.iter().position(|n| n == name) {
        Some(index) => index as i32,
        None => NULL_NAMESPACE_ID,
    }
}

fn accept_impl<V: MappingVisitor>(
    src: &str,
    dst: &[String],
    classes: &IndexMap<String, ClassMapping>,
    visitor: &mut V,
) -> Result<(), Error> {
    loop {
        if visitor.visit_header()? {
            let dst_refs: Vec<&str> = dst.iter().map(String::as_str).collect();
            visitor.visit_namespaces(src, &dst_refs)?;
        }
        if visitor.visit_content()? {
            for class in classes.values() {
                if !visitor.visit_class(&class.src_name)? {
                    continue;
                }
                for (ns, name) in class.dst_names.iter().enumerate() {
                    if let Some(name) = name {
                        visitor.visit_dst_name(MappedKind::Class, ns, name)?;
                    }
                }
                if let Some(comment) = class.comment() {
                    visitor.visit_comment(MappedKind::Class, comment)?;
                }
                if !visitor.visit_element_content(MappedKind::Class)? {
                    continue;
                }
                for field in class.fields.values() {
                    if !visitor.visit_field(&field.src_name, field.src_desc())? {
                        continue;
                    }
                    for (ns, name) in field.dst_names.iter().enumerate() {
                        if let Some(name) = name {
                            visitor.visit_dst_name(MappedKind::Field, ns, name)?;
                        }
                    }
                    for (ns, desc) in field.dst_descs.iter().enumerate() {
                        if let Some(desc) = desc {
                            visitor.visit_dst_desc(MappedKind::Field, ns, desc)?;
                        }
                    }
                    if let Some(comment) = field.comment() {
                        visitor.visit_comment(MappedKind::Field, comment)?;
                    }
                }
                for method in class.methods.values() {
                    if !visitor.visit_method(&method.src_name, method.src_desc())? {
                        continue;
                    }
                    for (ns, name) in method.dst_names.iter().enumerate() {
                        if let Some(name) = name {
                            visitor.visit_dst_name(MappedKind::Method, ns, name)?;
                        }
                    }
                    for (ns, desc) in method.dst_descs.iter().enumerate() {
                        if let Some(desc) = desc {
                            visitor.visit_dst_desc(MappedKind::Method, ns, desc)?;
                        }
                    }
                    if let Some(comment) = method.comment() {
                        visitor.visit_comment(MappedKind::Method, comment)?;
                    }
                    if !visitor.visit_element_content(MappedKind::Method)? {
                        continue;
                    }
                    for arg in &method.args {
                        if !visitor.visit_method_arg(arg.arg_position, arg.lv_index, arg.src_name())? {
                            continue;
                        }
                        for (ns, name) in arg.dst_names.iter().enumerate() {
                            if let Some(name) = name {
                                visitor.visit_dst_name(MappedKind::MethodArg, ns, name)?;
                            }
                        }
                        if let Some(comment) = arg.comment() {
                            visitor.visit_comment(MappedKind::MethodArg, comment)?;
                        }
                    }
                    for var in &method.vars {
                        if !visitor.visit_method_var(
                            var.lv_index,
                            var.lvt_row_index,
                            var.start_op_idx,
                            var.src_name(),
                        )? {
                            continue;
                        }
                        for (ns, name) in var.dst_names.iter().enumerate() {
                            if let Some(name) = name {
                                visitor.visit_dst_name(MappedKind::MethodVar, ns, name)?;
                            }
                        }
                        if let Some(comment) = var.comment.as_ref() {
                            visitor.visit_comment(MappedKind::MethodVar, comment)?;
                        }
                    }
                }
            }
        }
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

/// Reverse lookup snapshot over one destination namespace
#[derive(Clone, Debug, Default)]
pub struct DstIndex {
    src_namespace: String,
    classes: HashMap<String, String>,
    fields: HashMap<String, (String, MemberKey)>,
    methods: HashMap<String, (String, MemberKey)>,
}
impl DstIndex {
    /// Source namespace of the tree the snapshot was taken from
    #[inline]
    pub fn src_namespace(&self) -> &str {
        &self.src_namespace
    }
    /// Source name of the class known as `dst_name` in the indexed namespace
    pub fn class_src(&self, dst_name: &str) -> Option<&str> {
        self.classes.get(dst_name).map(String::as_str)
    }
    /// `(class source name, member key)` of the field named `dst_name`
    pub fn field_src(&self, dst_name: &str) -> Option<(&str, &MemberKey)> {
        self.fields.get(dst_name).map(|(class, key)| (class.as_str(), key))
    }
    pub fn method_src(&self, dst_name: &str) -> Option<(&str, &MemberKey)> {
        self.methods.get(dst_name).map(|(class, key)| (class.as_str(), key))
    }
    /// Every indexed method as `(dst name, class source name, member key)`
    pub fn methods(&self) -> impl Iterator<Item = (&str, &str, &MemberKey)> {
        self.methods
            .iter()
            .map(|(name, (class, key))| (name.as_str(), class.as_str(), key))
    }
}

/// The read-only, post-build form of a [`MappingTree`]. Safe to share
/// across threads without locks since nothing can mutate it.
#[derive(Clone, Debug)]
pub struct FrozenTree {
    src_namespace: String,
    dst_namespaces: Vec<String>,
    classes: IndexMap<String, ClassMapping>,
    dst_class_index: Vec<HashMap<String, usize>>,
}
impl FrozenTree {
    #[inline]
    pub fn src_namespace(&self) -> &str {
        &self.src_namespace
    }
    #[inline]
    pub fn dst_namespaces(&self) -> &[String] {
        &self.dst_namespaces
    }
    pub fn namespace_id(&self, name: &str) -> i32 {
        namespace_id_in(Some(&self.src_namespace), &self.dst_namespaces, name)
    }
    pub fn namespace_name(&self, ns: i32) -> Option<&str> {
        match ns {
            SRC_NAMESPACE_ID => Some(&self.src_namespace),
            ns if ns >= 0 => self.dst_namespaces.get(ns as usize).map(String::as_str),
            _ => None,
        }
    }
    #[inline]
    pub fn classes(&self) -> impl Iterator<Item = &ClassMapping> {
        self.classes.values()
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
    #[inline]
    pub fn get_class(&self, src_name: &str) -> Option<&ClassMapping> {
        self.classes.get(src_name)
    }
    /// Find a class by its name in any namespace
    pub fn find_class(&self, ns: i32, name: &str) -> Option<&ClassMapping> {
        match ns {
            SRC_NAMESPACE_ID => self.get_class(name),
            ns if ns >= 0 => {
                let index = *self.dst_class_index.get(ns as usize)?.get(name)?;
                self.classes.get_index(index).map(|(_, class)| class)
            }
            _ => None,
        }
    }
    /// Map a class name between namespaces, falling back to the source name
    /// when the class is known but unmapped in `to`
    pub fn map_class_name(&self, from: i32, to: i32, name: &str) -> Option<&str> {
        let class = self.find_class(from, name)?;
        class.name(to).or_else(|| Some(class.src_name()))
    }
    /// Rewrite a descriptor from one namespace into another; unknown class
    /// names pass through unchanged
    pub fn map_desc(&self, desc: &str, from: i32, to: i32) -> String {
        crate::descriptor::map_desc(desc, |name| {
            self.map_class_name(from, to, name).map(String::from)
        })
    }
    pub fn accept<V: MappingVisitor>(&self, visitor: &mut V) -> Result<(), Error> {
        accept_impl(&self.src_namespace, &self.dst_namespaces, &self.classes, visitor)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::visitor::MappingVisitor;

    fn sample_tree() -> MappingTree {
        let mut tree = MappingTree::new();
        tree.visit_header().unwrap();
        tree.visit_namespaces("official", &["intermediary", "named"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a/b/C").unwrap();
        tree.visit_dst_name(MappedKind::Class, 0, "net/inter/class_1").unwrap();
        tree.visit_dst_name(MappedKind::Class, 1, "net/foo/Thing").unwrap();
        tree.visit_method("m", Some("()V")).unwrap();
        tree.visit_dst_name(MappedKind::Method, 1, "doThing").unwrap();
        tree.visit_field("f", Some("I")).unwrap();
        tree.visit_dst_name(MappedKind::Field, 1, "count").unwrap();
        tree.visit_end().unwrap();
        tree
    }

    #[test]
    fn builds_and_queries() {
        let tree = sample_tree().freeze();
        assert_eq!(tree.src_namespace(), "official");
        assert_eq!(tree.namespace_id("official"), SRC_NAMESPACE_ID);
        assert_eq!(tree.namespace_id("named"), 1);
        assert_eq!(tree.namespace_id("missing"), NULL_NAMESPACE_ID);
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.name(1), Some("net/foo/Thing"));
        assert_eq!(class.get_method("m", Some("()V")).unwrap().name(1), Some("doThing"));
        assert_eq!(class.get_field("f", Some("I")).unwrap().name(1), Some("count"));
    }

    #[test]
    fn find_class_by_dst_name() {
        let tree = sample_tree().freeze();
        let class = tree.find_class(1, "net/foo/Thing").unwrap();
        assert_eq!(class.src_name(), "a/b/C");
        assert!(tree.find_class(0, "net/foo/Thing").is_none());
    }

    #[test]
    fn duplicate_visits_merge_first_write_wins() {
        let mut tree = sample_tree();
        tree.visit_header().unwrap();
        tree.visit_namespaces("official", &["intermediary", "named"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a/b/C").unwrap();
        tree.visit_dst_name(MappedKind::Class, 1, "net/bar/Other").unwrap();
        tree.visit_method("m", Some("()V")).unwrap();
        tree.visit_dst_name(MappedKind::Method, 1, "doOther").unwrap();
        tree.visit_end().unwrap();
        let frozen = tree.freeze();
        assert_eq!(frozen.len(), 1);
        let class = frozen.get_class("a/b/C").unwrap();
        assert_eq!(class.name(1), Some("net/foo/Thing"));
        assert_eq!(class.methods().count(), 1);
        assert_eq!(class.get_method("m", Some("()V")).unwrap().name(1), Some("doThing"));
    }

    #[test]
    fn later_pass_appends_namespaces() {
        let mut tree = sample_tree();
        tree.visit_header().unwrap();
        tree.visit_namespaces("official", &["searge"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a/b/C").unwrap();
        tree.visit_dst_name(MappedKind::Class, 0, "net/srg/C_1").unwrap();
        tree.visit_end().unwrap();
        assert_eq!(tree.dst_namespaces(), &["intermediary", "named", "searge"]);
        let frozen = tree.freeze();
        let class = frozen.get_class("a/b/C").unwrap();
        assert_eq!(class.name(2), Some("net/srg/C_1"));
        assert_eq!(class.name(1), Some("net/foo/Thing"));
    }

    #[test]
    fn source_mismatch_rejected() {
        let mut tree = sample_tree();
        tree.visit_header().unwrap();
        let err = tree.visit_namespaces("searge", &["named"]).unwrap_err();
        assert!(err.to_string().contains("Source namespace"));
    }

    #[test]
    fn descriptorless_field_resolution() {
        let mut tree = MappingTree::new();
        tree.visit_header().unwrap();
        tree.visit_namespaces("official", &["named"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a").unwrap();
        tree.visit_field("x", None).unwrap();
        tree.visit_dst_name(MappedKind::Field, 0, "renamed").unwrap();
        tree.visit_end().unwrap();
        let frozen = tree.freeze();
        let class = frozen.get_class("a").unwrap();
        // A descriptor-qualified query still matches the sole stored field
        assert_eq!(class.get_field("x", Some("I")).unwrap().name(0), Some("renamed"));
        assert_eq!(class.get_field("x", None).unwrap().name(0), Some("renamed"));
        assert!(class.get_field("y", None).is_none());
    }

    #[test]
    fn roundtrips_through_accept() {
        let original = sample_tree();
        let mut copy = MappingTree::new();
        original.accept(&mut copy).unwrap();
        let (original, copy) = (original.freeze(), copy.freeze());
        assert_eq!(copy.src_namespace(), original.src_namespace());
        assert_eq!(copy.dst_namespaces(), original.dst_namespaces());
        assert_eq!(copy.len(), original.len());
        let class = copy.get_class("a/b/C").unwrap();
        assert_eq!(class.name(0), Some("net/inter/class_1"));
        assert_eq!(class.get_method("m", Some("()V")).unwrap().name(1), Some("doThing"));
    }

    #[test]
    fn dst_index_reverse_lookup() {
        let tree = sample_tree();
        let index = tree.dst_index("named").unwrap();
        assert_eq!(index.class_src("net/foo/Thing"), Some("a/b/C"));
        let (class, key) = index.method_src("doThing").unwrap();
        assert_eq!(class, "a/b/C");
        assert_eq!(key.name, "m");
        assert!(tree.dst_index("nonexistent").is_err());
    }

    #[test]
    fn map_desc_between_namespaces() {
        let tree = sample_tree().freeze();
        let mapped = tree.map_desc("(La/b/C;I)La/b/C;", SRC_NAMESPACE_ID, 1);
        assert_eq!(mapped, "(Lnet/foo/Thing;I)Lnet/foo/Thing;");
        // Unknown classes pass through
        assert_eq!(tree.map_desc("(Lx/Y;)V", SRC_NAMESPACE_ID, 1), "(Lx/Y;)V");
    }

    #[test]
    fn arg_and_var_merging() {
        let mut tree = MappingTree::new();
        tree.visit_header().unwrap();
        tree.visit_namespaces("official", &["named"]).unwrap();
        tree.visit_content().unwrap();
        tree.visit_class("a").unwrap();
        tree.visit_method("m", Some("(II)V")).unwrap();
        tree.visit_method_arg(0, 1, None).unwrap();
        tree.visit_dst_name(MappedKind::MethodArg, 0, "first").unwrap();
        // Same lv index merges instead of duplicating
        tree.visit_method_arg(-1, 1, Some("p1")).unwrap();
        tree.visit_method_var(2, 0, 5, None).unwrap();
        tree.visit_dst_name(MappedKind::MethodVar, 0, "local").unwrap();
        tree.visit_end().unwrap();
        let frozen = tree.freeze();
        let method = frozen.get_class("a").unwrap().get_method("m", Some("(II)V")).unwrap();
        assert_eq!(method.args().len(), 1);
        assert_eq!(method.args()[0].src_name(), Some("p1"));
        assert_eq!(method.args()[0].dst_name(0), Some("first"));
        assert_eq!(method.vars().len(), 1);
        assert_eq!(method.vars()[0].dst_name(0), Some("local"));
    }
}
