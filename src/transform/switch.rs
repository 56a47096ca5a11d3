//! Re-keys a document on one of its destination columns. A tsrg2 file whose
//! intrinsic source axis is `obf` can be ingested into a tree keyed by `srg`
//! by switching on the `srg` column: the chosen column becomes the source,
//! and the document's nominal source becomes an ordinary destination.
//!
//! Destination names arrive after the element they belong to, so a whole
//! class scope is buffered and replayed once the next class opens (or the
//! pass ends) with every element re-keyed.

use failure::Error;

use crate::tree::NamespaceError;
use crate::visitor::{MappedKind, MappingVisitor};

pub struct SourceNsSwitch<V> {
    next: V,
    target: String,
    drop_missing: bool,
    switch_idx: Option<usize>,
    buffer: Option<BufClass>,
}

struct BufClass {
    src: String,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
    members: Vec<BufMember>,
}

struct BufMember {
    kind: MappedKind,
    src: String,
    desc: Option<String>,
    dst_names: Vec<Option<String>>,
    dst_descs: Vec<Option<String>>,
    comment: Option<String>,
    args: Vec<BufArg>,
    vars: Vec<BufVar>,
}

struct BufArg {
    position: i32,
    lv_index: i32,
    src: Option<String>,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
}

struct BufVar {
    lv_index: i32,
    lvt_row: i32,
    start_op: i32,
    src: Option<String>,
    dst_names: Vec<Option<String>>,
    comment: Option<String>,
}

fn set_slot(slots: &mut Vec<Option<String>>, ns: usize, value: &str) {
    if slots.len() <= ns {
        slots.resize(ns + 1, None);
    }
    if slots[ns].is_none() {
        slots[ns] = Some(value.into());
    }
}

fn slot(slots: &[Option<String>], ns: usize) -> Option<&str> {
    slots.get(ns).and_then(|n| n.as_ref()).map(String::as_str)
}

impl<V: MappingVisitor> SourceNsSwitch<V> {
    /// `target` names the destination column that becomes the new source
    /// axis. With `drop_missing`, elements the column never names are
    /// dropped; otherwise they keep their old source name.
    pub fn new(next: V, target: &str, drop_missing: bool) -> SourceNsSwitch<V> {
        SourceNsSwitch {
            next,
            target: target.into(),
            drop_missing,
            switch_idx: None,
            buffer: None,
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
    /// New index of producer destination `ns`; the switched column itself
    /// has no destination slot, and slot 0 belongs to the old source
    fn remap(&self, ns: usize) -> Option<usize> {
        let k = self.switch_idx?;
        if ns == k {
            None
        } else if ns < k {
            Some(ns + 1)
        } else {
            Some(ns)
        }
    }
    fn current_member(&mut self) -> Option<&mut BufMember> {
        self.buffer.as_mut().and_then(|class| class.members.last_mut())
    }

    fn flush(&mut self) -> Result<(), Error> {
        let class = match self.buffer.take() {
            Some(class) => class,
            None => return Ok(()),
        };
        let k = match self.switch_idx {
            Some(k) => k,
            None => return Err(NamespaceError::Missing(self.target.clone()).into()),
        };
        let new_src = match slot(&class.dst_names, k) {
            Some(name) => name.to_string(),
            None if self.drop_missing => return Ok(()),
            None => class.src.clone(),
        };
        if !self.next.visit_class(&new_src)? {
            return Ok(());
        }
        self.next.visit_dst_name(MappedKind::Class, 0, &class.src)?;
        for (ns, name) in class.dst_names.iter().enumerate() {
            if let (Some(name), Some(mapped)) = (name.as_ref(), self.remap(ns)) {
                self.next.visit_dst_name(MappedKind::Class, mapped, name)?;
            }
        }
        if let Some(ref comment) = class.comment {
            self.next.visit_comment(MappedKind::Class, comment)?;
        }
        if !self.next.visit_element_content(MappedKind::Class)? {
            return Ok(());
        }
        for member in &class.members {
            self.flush_member(member, k)?;
        }
        Ok(())
    }

    fn flush_member(&mut self, member: &BufMember, k: usize) -> Result<(), Error> {
        let new_src = match slot(&member.dst_names, k) {
            Some(name) => name.to_string(),
            None if self.drop_missing => return Ok(()),
            None => member.src.clone(),
        };
        // The descriptor follows the source axis; prefer one recorded for
        // the switched column, else carry the old one across unchanged
        let new_desc = slot(&member.dst_descs, k)
            .map(String::from)
            .or_else(|| member.desc.clone());
        let desc = new_desc.as_ref().map(String::as_str);
        let visited = match member.kind {
            MappedKind::Method => self.next.visit_method(&new_src, desc)?,
            _ => self.next.visit_field(&new_src, desc)?,
        };
        if !visited {
            return Ok(());
        }
        self.next.visit_dst_name(member.kind, 0, &member.src)?;
        if let Some(ref old_desc) = member.desc {
            self.next.visit_dst_desc(member.kind, 0, old_desc)?;
        }
        for (ns, name) in member.dst_names.iter().enumerate() {
            if let (Some(name), Some(mapped)) = (name.as_ref(), self.remap(ns)) {
                self.next.visit_dst_name(member.kind, mapped, name)?;
            }
        }
        for (ns, desc) in member.dst_descs.iter().enumerate() {
            if let (Some(desc), Some(mapped)) = (desc.as_ref(), self.remap(ns)) {
                self.next.visit_dst_desc(member.kind, mapped, desc)?;
            }
        }
        if let Some(ref comment) = member.comment {
            self.next.visit_comment(member.kind, comment)?;
        }
        if member.args.is_empty() && member.vars.is_empty() {
            return Ok(());
        }
        if !self.next.visit_element_content(member.kind)? {
            return Ok(());
        }
        for arg in &member.args {
            if !self.next.visit_method_arg(
                arg.position,
                arg.lv_index,
                arg.src.as_ref().map(String::as_str),
            )? {
                continue;
            }
            for (ns, name) in arg.dst_names.iter().enumerate() {
                if let (Some(name), Some(mapped)) = (name.as_ref(), self.remap(ns)) {
                    self.next.visit_dst_name(MappedKind::MethodArg, mapped, name)?;
                }
            }
            if let Some(ref comment) = arg.comment {
                self.next.visit_comment(MappedKind::MethodArg, comment)?;
            }
        }
        for var in &member.vars {
            if !self.next.visit_method_var(
                var.lv_index,
                var.lvt_row,
                var.start_op,
                var.src.as_ref().map(String::as_str),
            )? {
                continue;
            }
            for (ns, name) in var.dst_names.iter().enumerate() {
                if let (Some(name), Some(mapped)) = (name.as_ref(), self.remap(ns)) {
                    self.next.visit_dst_name(MappedKind::MethodVar, mapped, name)?;
                }
            }
            if let Some(ref comment) = var.comment {
                self.next.visit_comment(MappedKind::MethodVar, comment)?;
            }
        }
        Ok(())
    }
}

impl<V: MappingVisitor> MappingVisitor for SourceNsSwitch<V> {
    forward_visits!(flags, visit_content);

    fn visit_header(&mut self) -> Result<bool, Error> {
        self.buffer = None;
        self.switch_idx = None;
        self.next.visit_header()
    }
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        let k = match dst.iter().position(|&label| label == self.target) {
            Some(k) => k,
            None => return Err(NamespaceError::Missing(self.target.clone()).into()),
        };
        self.switch_idx = Some(k);
        let mut new_dst = Vec::with_capacity(dst.len());
        new_dst.push(src);
        new_dst.extend(dst.iter().enumerate().filter(|&(j, _)| j != k).map(|(_, &l)| l));
        let target = self.target.clone();
        self.next.visit_namespaces(&target, &new_dst)
    }
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        self.flush()?;
        self.buffer = Some(BufClass {
            src: src_name.into(),
            dst_names: Vec::new(),
            comment: None,
            members: Vec::new(),
        });
        Ok(true)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        self.push_member(MappedKind::Method, src_name, src_desc)
    }
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        self.push_member(MappedKind::Field, src_name, src_desc)
    }
    fn visit_method_arg(
        &mut self,
        arg_position: i32,
        lv_index: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        if let Some(member) = self.current_member() {
            member.args.push(BufArg {
                position: arg_position,
                lv_index,
                src: src_name.map(String::from),
                dst_names: Vec::new(),
                comment: None,
            });
        }
        Ok(true)
    }
    fn visit_method_var(
        &mut self,
        lv_index: i32,
        lvt_row_index: i32,
        start_op_idx: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        if let Some(member) = self.current_member() {
            member.vars.push(BufVar {
                lv_index,
                lvt_row: lvt_row_index,
                start_op: start_op_idx,
                src: src_name.map(String::from),
                dst_names: Vec::new(),
                comment: None,
            });
        }
        Ok(true)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        let class = match self.buffer.as_mut() {
            Some(class) => class,
            None => return Ok(()),
        };
        match kind {
            MappedKind::Class => set_slot(&mut class.dst_names, namespace, name),
            MappedKind::Method | MappedKind::Field => {
                if let Some(member) = class.members.last_mut() {
                    set_slot(&mut member.dst_names, namespace, name);
                }
            }
            MappedKind::MethodArg => {
                if let Some(arg) = class.members.last_mut().and_then(|m| m.args.last_mut()) {
                    set_slot(&mut arg.dst_names, namespace, name);
                }
            }
            MappedKind::MethodVar => {
                if let Some(var) = class.members.last_mut().and_then(|m| m.vars.last_mut()) {
                    set_slot(&mut var.dst_names, namespace, name);
                }
            }
        }
        Ok(())
    }
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        match kind {
            MappedKind::Method | MappedKind::Field => {
                if let Some(member) = self.current_member() {
                    set_slot(&mut member.dst_descs, namespace, desc);
                }
            }
            _ => {}
        }
        Ok(())
    }
    fn visit_comment(&mut self, kind: MappedKind, comment: &str) -> Result<(), Error> {
        let class = match self.buffer.as_mut() {
            Some(class) => class,
            None => return Ok(()),
        };
        let target = match kind {
            MappedKind::Class => Some(&mut class.comment),
            MappedKind::Method | MappedKind::Field => {
                class.members.last_mut().map(|m| &mut m.comment)
            }
            MappedKind::MethodArg => class
                .members
                .last_mut()
                .and_then(|m| m.args.last_mut())
                .map(|a| &mut a.comment),
            MappedKind::MethodVar => class
                .members
                .last_mut()
                .and_then(|m| m.vars.last_mut())
                .map(|v| &mut v.comment),
        };
        if let Some(target) = target {
            if target.is_none() {
                *target = Some(comment.into());
            }
        }
        Ok(())
    }
    fn visit_element_content(&mut self, _kind: MappedKind) -> Result<bool, Error> {
        Ok(true) // Children are buffered regardless
    }
    fn visit_end(&mut self) -> Result<bool, Error> {
        self.flush()?;
        self.next.visit_end()
    }
}

impl<V: MappingVisitor> SourceNsSwitch<V> {
    fn push_member(
        &mut self,
        kind: MappedKind,
        src_name: &str,
        src_desc: Option<&str>,
    ) -> Result<bool, Error> {
        if let Some(class) = self.buffer.as_mut() {
            class.members.push(BufMember {
                kind,
                src: src_name.into(),
                desc: src_desc.map(String::from),
                dst_names: Vec::new(),
                dst_descs: Vec::new(),
                comment: None,
                args: Vec::new(),
                vars: Vec::new(),
            });
        }
        Ok(true)
    }
}
