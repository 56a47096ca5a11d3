//! Forwarding decorators over the visitor contract. Each transform owns its
//! downstream visitor, edits the calls it cares about and forwards the rest
//! unchanged, so chains compose without any shared state.

/// Generates untouched forwarding methods for a decorator whose downstream
/// visitor lives in a field named `next`
macro_rules! forward_visits {
    () => {};
    (flags $(, $rest:ident)*) => {
        #[inline]
        fn flags(&self) -> crate::visitor::VisitorFlags {
            self.next.flags()
        }
        forward_visits!($($rest),*);
    };
    (visit_header $(, $rest:ident)*) => {
        #[inline]
        fn visit_header(&mut self) -> Result<bool, ::failure::Error> {
            self.next.visit_header()
        }
        forward_visits!($($rest),*);
    };
    (visit_namespaces $(, $rest:ident)*) => {
        #[inline]
        fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), ::failure::Error> {
            self.next.visit_namespaces(src, dst)
        }
        forward_visits!($($rest),*);
    };
    (visit_content $(, $rest:ident)*) => {
        #[inline]
        fn visit_content(&mut self) -> Result<bool, ::failure::Error> {
            self.next.visit_content()
        }
        forward_visits!($($rest),*);
    };
    (visit_class $(, $rest:ident)*) => {
        #[inline]
        fn visit_class(&mut self, src_name: &str) -> Result<bool, ::failure::Error> {
            self.next.visit_class(src_name)
        }
        forward_visits!($($rest),*);
    };
    (visit_method $(, $rest:ident)*) => {
        #[inline]
        fn visit_method(
            &mut self,
            src_name: &str,
            src_desc: Option<&str>,
        ) -> Result<bool, ::failure::Error> {
            self.next.visit_method(src_name, src_desc)
        }
        forward_visits!($($rest),*);
    };
    (visit_field $(, $rest:ident)*) => {
        #[inline]
        fn visit_field(
            &mut self,
            src_name: &str,
            src_desc: Option<&str>,
        ) -> Result<bool, ::failure::Error> {
            self.next.visit_field(src_name, src_desc)
        }
        forward_visits!($($rest),*);
    };
    (visit_method_arg $(, $rest:ident)*) => {
        #[inline]
        fn visit_method_arg(
            &mut self,
            arg_position: i32,
            lv_index: i32,
            src_name: Option<&str>,
        ) -> Result<bool, ::failure::Error> {
            self.next.visit_method_arg(arg_position, lv_index, src_name)
        }
        forward_visits!($($rest),*);
    };
    (visit_method_var $(, $rest:ident)*) => {
        #[inline]
        fn visit_method_var(
            &mut self,
            lv_index: i32,
            lvt_row_index: i32,
            start_op_idx: i32,
            src_name: Option<&str>,
        ) -> Result<bool, ::failure::Error> {
            self.next.visit_method_var(lv_index, lvt_row_index, start_op_idx, src_name)
        }
        forward_visits!($($rest),*);
    };
    (visit_dst_name $(, $rest:ident)*) => {
        #[inline]
        fn visit_dst_name(
            &mut self,
            kind: crate::visitor::MappedKind,
            namespace: usize,
            name: &str,
        ) -> Result<(), ::failure::Error> {
            self.next.visit_dst_name(kind, namespace, name)
        }
        forward_visits!($($rest),*);
    };
    (visit_dst_desc $(, $rest:ident)*) => {
        #[inline]
        fn visit_dst_desc(
            &mut self,
            kind: crate::visitor::MappedKind,
            namespace: usize,
            desc: &str,
        ) -> Result<(), ::failure::Error> {
            self.next.visit_dst_desc(kind, namespace, desc)
        }
        forward_visits!($($rest),*);
    };
    (visit_comment $(, $rest:ident)*) => {
        #[inline]
        fn visit_comment(
            &mut self,
            kind: crate::visitor::MappedKind,
            comment: &str,
        ) -> Result<(), ::failure::Error> {
            self.next.visit_comment(kind, comment)
        }
        forward_visits!($($rest),*);
    };
    (visit_element_content $(, $rest:ident)*) => {
        #[inline]
        fn visit_element_content(
            &mut self,
            kind: crate::visitor::MappedKind,
        ) -> Result<bool, ::failure::Error> {
            self.next.visit_element_content(kind)
        }
        forward_visits!($($rest),*);
    };
    (visit_end $(, $rest:ident)*) => {
        #[inline]
        fn visit_end(&mut self) -> Result<bool, ::failure::Error> {
            self.next.visit_end()
        }
        forward_visits!($($rest),*);
    };
}

pub mod rename;
pub mod filter;
pub mod switch;
pub mod package;
pub mod strip;
pub mod derive;

pub use self::rename::NamespaceRenamer;
pub use self::filter::{DstNsFilter, NoNewSourceFilter};
pub use self::switch::SourceNsSwitch;
pub use self::package::PackageRemapper;
pub use self::strip::ChildMethodStripper;
pub use self::derive::{MemberNameReplacer, SeargeFromTsrg2, SrgClassPatcher};
