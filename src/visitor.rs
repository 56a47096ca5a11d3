//! The streaming contract every mapping producer and consumer speaks.
//!
//! A producer walks one document in strict order:
//! header, namespaces, content, then per class its destination names,
//! comments and members. Each `visit_*` that opens a scope returns whether
//! the consumer wants that scope's children; `visit_end` returning false
//! asks the producer to replay the whole pass (producers back their input
//! with [`crate::cols::ColumnReader::mark`]/`reset` for this).

use failure::Error;

bitflags! {
    /// Capability requirements a sink declares before a pass starts
    pub struct VisitorFlags: u32 {
        /// Each source symbol may be visited at most once; producers that
        /// cannot guarantee it must interpose a deduplicating tree
        const NEEDS_UNIQUENESS = 0b01;
        /// The sink must see the same input twice (for example a writer
        /// that has to learn every namespace before emitting its header)
        const NEEDS_MULTIPLE_PASSES = 0b10;
    }
}

/// Which element kind a destination name, descriptor or comment attaches to
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MappedKind {
    Class,
    Method,
    Field,
    MethodArg,
    MethodVar,
}

pub trait MappingVisitor {
    fn flags(&self) -> VisitorFlags {
        VisitorFlags::empty()
    }
    /// Whether the producer should (re)declare namespaces; a false return
    /// keeps the sink's current namespace set, which the producer must match
    fn visit_header(&mut self) -> Result<bool, Error> {
        Ok(true)
    }
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error>;
    /// Gate before any class; false skips the whole pass body
    fn visit_content(&mut self) -> Result<bool, Error> {
        Ok(true)
    }
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error>;
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error>;
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error>;
    /// At least one of `arg_position` and `lv_index` is non-negative
    fn visit_method_arg(
        &mut self,
        arg_position: i32,
        lv_index: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error>;
    fn visit_method_var(
        &mut self,
        lv_index: i32,
        lvt_row_index: i32,
        start_op_idx: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error>;
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error>;
    /// Per-namespace descriptor, for formats that carry remapped descriptors
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        let _ = (kind, namespace, desc);
        Ok(())
    }
    fn visit_comment(&mut self, kind: MappedKind, comment: &str) -> Result<(), Error>;
    /// Opens the scope for the current element's children
    fn visit_element_content(&mut self, kind: MappedKind) -> Result<bool, Error> {
        let _ = kind;
        Ok(true)
    }
    /// True when the pass was fully consumed; false demands a replay
    fn visit_end(&mut self) -> Result<bool, Error> {
        Ok(true)
    }
}

impl<'a, V: MappingVisitor + ?Sized> MappingVisitor for &'a mut V {
    #[inline]
    fn flags(&self) -> VisitorFlags {
        (**self).flags()
    }
    #[inline]
    fn visit_header(&mut self) -> Result<bool, Error> {
        (**self).visit_header()
    }
    #[inline]
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        (**self).visit_namespaces(src, dst)
    }
    #[inline]
    fn visit_content(&mut self) -> Result<bool, Error> {
        (**self).visit_content()
    }
    #[inline]
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        (**self).visit_class(src_name)
    }
    #[inline]
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        (**self).visit_method(src_name, src_desc)
    }
    #[inline]
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        (**self).visit_field(src_name, src_desc)
    }
    #[inline]
    fn visit_method_arg(
        &mut self,
        arg_position: i32,
        lv_index: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        (**self).visit_method_arg(arg_position, lv_index, src_name)
    }
    #[inline]
    fn visit_method_var(
        &mut self,
        lv_index: i32,
        lvt_row_index: i32,
        start_op_idx: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        (**self).visit_method_var(lv_index, lvt_row_index, start_op_idx, src_name)
    }
    #[inline]
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        (**self).visit_dst_name(kind, namespace, name)
    }
    #[inline]
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        (**self).visit_dst_desc(kind, namespace, desc)
    }
    #[inline]
    fn visit_comment(&mut self, kind: MappedKind, comment: &str) -> Result<(), Error> {
        (**self).visit_comment(kind, comment)
    }
    #[inline]
    fn visit_element_content(&mut self, kind: MappedKind) -> Result<bool, Error> {
        (**self).visit_element_content(kind)
    }
    #[inline]
    fn visit_end(&mut self) -> Result<bool, Error> {
        (**self).visit_end()
    }
}

impl<V: MappingVisitor + ?Sized> MappingVisitor for Box<V> {
    #[inline]
    fn flags(&self) -> VisitorFlags {
        (**self).flags()
    }
    #[inline]
    fn visit_header(&mut self) -> Result<bool, Error> {
        (**self).visit_header()
    }
    #[inline]
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        (**self).visit_namespaces(src, dst)
    }
    #[inline]
    fn visit_content(&mut self) -> Result<bool, Error> {
        (**self).visit_content()
    }
    #[inline]
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        (**self).visit_class(src_name)
    }
    #[inline]
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        (**self).visit_method(src_name, src_desc)
    }
    #[inline]
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        (**self).visit_field(src_name, src_desc)
    }
    #[inline]
    fn visit_method_arg(
        &mut self,
        arg_position: i32,
        lv_index: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        (**self).visit_method_arg(arg_position, lv_index, src_name)
    }
    #[inline]
    fn visit_method_var(
        &mut self,
        lv_index: i32,
        lvt_row_index: i32,
        start_op_idx: i32,
        src_name: Option<&str>,
    ) -> Result<bool, Error> {
        (**self).visit_method_var(lv_index, lvt_row_index, start_op_idx, src_name)
    }
    #[inline]
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        (**self).visit_dst_name(kind, namespace, name)
    }
    #[inline]
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        (**self).visit_dst_desc(kind, namespace, desc)
    }
    #[inline]
    fn visit_comment(&mut self, kind: MappedKind, comment: &str) -> Result<(), Error> {
        (**self).visit_comment(kind, comment)
    }
    #[inline]
    fn visit_element_content(&mut self, kind: MappedKind) -> Result<bool, Error> {
        (**self).visit_element_content(kind)
    }
    #[inline]
    fn visit_end(&mut self) -> Result<bool, Error> {
        (**self).visit_end()
    }
}
