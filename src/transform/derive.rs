//! Decorators that backfill a namespace another dialect never supplies
//! directly. Searge is the recurring case: tsrg2 carries its member names in
//! the `srg` column, and srg class names double as searge class names, so
//! both axes are derived rather than read.

use failure::Error;

use crate::tree::NamespaceError;
use crate::visitor::{MappedKind, MappingVisitor};

/// Copies an element's name from one destination namespace into another
/// whenever the target namespace never received a name of its own during
/// that element's scope
pub struct MemberNameReplacer<V> {
    next: V,
    from: String,
    to: String,
    from_idx: Option<usize>,
    to_idx: Option<usize>,
    pending: Option<Pending>,
}
struct Pending {
    kind: MappedKind,
    from_name: Option<String>,
    to_seen: bool,
}
impl<V: MappingVisitor> MemberNameReplacer<V> {
    pub fn new(next: V, from: &str, to: &str) -> MemberNameReplacer<V> {
        MemberNameReplacer {
            next,
            from: from.into(),
            to: to.into(),
            from_idx: None,
            to_idx: None,
            pending: None,
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
    fn open(&mut self, kind: MappedKind) -> Result<(), Error> {
        self.backfill()?;
        self.pending = Some(Pending {
            kind,
            from_name: None,
            to_seen: false,
        });
        Ok(())
    }
    fn backfill(&mut self) -> Result<(), Error> {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Ok(()),
        };
        if pending.to_seen {
            return Ok(());
        }
        if let (Some(name), Some(to_idx)) = (pending.from_name, self.to_idx) {
            self.next.visit_dst_name(pending.kind, to_idx, &name)?;
        }
        Ok(())
    }
}
impl<V: MappingVisitor> MappingVisitor for MemberNameReplacer<V> {
    forward_visits!(
        flags,
        visit_content,
        visit_method_arg,
        visit_method_var,
        visit_dst_desc,
        visit_comment
    );
    fn visit_header(&mut self) -> Result<bool, Error> {
        self.pending = None;
        self.from_idx = None;
        self.to_idx = None;
        self.next.visit_header()
    }
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        declare_derived(&mut self.next, src, dst, &self.from, &self.to, &mut self.from_idx, &mut self.to_idx)
    }
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        self.open(MappedKind::Class)?;
        self.next.visit_class(src_name)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        self.open(MappedKind::Method)?;
        self.next.visit_method(src_name, src_desc)
    }
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        self.open(MappedKind::Field)?;
        self.next.visit_field(src_name, src_desc)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        if let Some(ref mut pending) = self.pending {
            if pending.kind == kind {
                if Some(namespace) == self.to_idx {
                    pending.to_seen = true;
                } else if Some(namespace) == self.from_idx && pending.from_name.is_none() {
                    pending.from_name = Some(name.to_string());
                }
            }
        }
        self.next.visit_dst_name(kind, namespace, name)
    }
    fn visit_element_content(&mut self, kind: MappedKind) -> Result<bool, Error> {
        // Destination names for this element are complete once its child
        // scope opens
        self.backfill()?;
        self.next.visit_element_content(kind)
    }
    fn visit_end(&mut self) -> Result<bool, Error> {
        self.backfill()?;
        self.next.visit_end()
    }
}

/// Duplicates member (and parameter) names from one destination column into
/// a derived one, the way searge member names are lifted out of tsrg2's srg
/// column
pub struct SeargeFromTsrg2<V> {
    next: V,
    from: String,
    to: String,
    from_idx: Option<usize>,
    to_idx: Option<usize>,
}
impl<V: MappingVisitor> SeargeFromTsrg2<V> {
    pub fn new(next: V, from: &str, to: &str) -> SeargeFromTsrg2<V> {
        SeargeFromTsrg2 {
            next,
            from: from.into(),
            to: to.into(),
            from_idx: None,
            to_idx: None,
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
}
impl<V: MappingVisitor> MappingVisitor for SeargeFromTsrg2<V> {
    forward_visits!(
        flags,
        visit_header,
        visit_content,
        visit_class,
        visit_method,
        visit_field,
        visit_method_arg,
        visit_method_var,
        visit_dst_desc,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        declare_derived(&mut self.next, src, dst, &self.from, &self.to, &mut self.from_idx, &mut self.to_idx)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        self.next.visit_dst_name(kind, namespace, name)?;
        let derived = match kind {
            MappedKind::Method | MappedKind::Field | MappedKind::MethodArg => true,
            _ => false,
        };
        if derived && Some(namespace) == self.from_idx {
            if let Some(to_idx) = self.to_idx {
                self.next.visit_dst_name(kind, to_idx, name)?;
            }
        }
        Ok(())
    }
}

/// Copies srg class names into the searge namespace, which has member names
/// of its own but no class axis
pub struct SrgClassPatcher<V> {
    next: V,
    from: String,
    to: String,
    from_idx: Option<usize>,
    to_idx: Option<usize>,
}
impl<V: MappingVisitor> SrgClassPatcher<V> {
    pub fn new(next: V, from: &str, to: &str) -> SrgClassPatcher<V> {
        SrgClassPatcher {
            next,
            from: from.into(),
            to: to.into(),
            from_idx: None,
            to_idx: None,
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
}
impl<V: MappingVisitor> MappingVisitor for SrgClassPatcher<V> {
    forward_visits!(
        flags,
        visit_header,
        visit_content,
        visit_class,
        visit_method,
        visit_field,
        visit_method_arg,
        visit_method_var,
        visit_dst_desc,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        declare_derived(&mut self.next, src, dst, &self.from, &self.to, &mut self.from_idx, &mut self.to_idx)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        self.next.visit_dst_name(kind, namespace, name)?;
        if kind == MappedKind::Class && Some(namespace) == self.from_idx {
            if let Some(to_idx) = self.to_idx {
                self.next.visit_dst_name(kind, to_idx, name)?;
            }
        }
        Ok(())
    }
}

/// Locate the copied-from column and declare the derived one, reusing its
/// slot when a previous pass already declared it
fn declare_derived<V: MappingVisitor>(
    next: &mut V,
    src: &str,
    dst: &[&str],
    from: &str,
    to: &str,
    from_idx: &mut Option<usize>,
    to_idx: &mut Option<usize>,
) -> Result<(), Error> {
    let found = match dst.iter().position(|&label| label == from) {
        Some(idx) => idx,
        None => return Err(NamespaceError::Missing(from.into()).into()),
    };
    *from_idx = Some(found);
    match dst.iter().position(|&label| label == to) {
        Some(idx) => {
            *to_idx = Some(idx);
            next.visit_namespaces(src, dst)
        }
        None => {
            *to_idx = Some(dst.len());
            let mut extended: Vec<&str> = dst.to_vec();
            extended.push(to);
            next.visit_namespaces(src, &extended)
        }
    }
}
