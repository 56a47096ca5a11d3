//! Suppresses mapping visits for methods a class only inherits. Mapping
//! dialects generated per-class routinely restate `equals`-style overrides
//! on every subclass; against a reference jar's inheritance links those
//! re-declarations are dropped so one method is mapped exactly once, on the
//! class that introduces it.

use failure::Error;

use crate::format::classfile::JarSkeleton;
use crate::visitor::MappingVisitor;

pub struct ChildMethodStripper<'j, V> {
    next: V,
    skeleton: &'j JarSkeleton,
    current_class: Option<String>,
}
impl<'j, V: MappingVisitor> ChildMethodStripper<'j, V> {
    pub fn new(next: V, skeleton: &'j JarSkeleton) -> ChildMethodStripper<'j, V> {
        ChildMethodStripper {
            next,
            skeleton,
            current_class: None,
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
}
impl<'j, V: MappingVisitor> MappingVisitor for ChildMethodStripper<'j, V> {
    forward_visits!(
        flags,
        visit_header,
        visit_namespaces,
        visit_content,
        visit_field,
        visit_method_arg,
        visit_method_var,
        visit_dst_name,
        visit_dst_desc,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        self.current_class = Some(src_name.to_string());
        self.next.visit_class(src_name)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        // Without a descriptor the ancestor check cannot identify the
        // overload, so the method passes through
        if let (Some(class), Some(desc)) = (self.current_class.as_ref(), src_desc) {
            if self.skeleton.ancestor_declares_method(class, src_name, desc) {
                debug!("stripping inherited method {}.{}{}", class, src_name, desc);
                return Ok(false);
            }
        }
        self.next.visit_method(src_name, src_desc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::classfile::test::{build_class, build_jar};
    use crate::format::tsrg::read_tsrg;
    use crate::tree::MappingTree;

    #[test]
    fn strips_inherited_methods() {
        let parent = build_class("a/A", "java/lang/Object", &[], &[("m", "()V")]);
        let child = build_class("a/B", "a/A", &[], &[("own", "()V")]);
        let jar = build_jar(&[("a/A", parent), ("a/B", child)]);
        let skeleton = JarSkeleton::from_zip(&jar, "ref.jar").unwrap();

        let text = "a/A x/A\n\
                    \tm ()V base\n\
                    a/B x/B\n\
                    \tm ()V inherited\n\
                    \town ()V declared\n";
        let mut tree = MappingTree::new();
        {
            let mut stripper = ChildMethodStripper::new(&mut tree, &skeleton);
            read_tsrg(text, "in.tsrg", &mut stripper).unwrap();
        }
        let tree = tree.freeze();
        let parent = tree.get_class("a/A").unwrap();
        assert_eq!(parent.get_method("m", Some("()V")).unwrap().name(0), Some("base"));
        let child = tree.get_class("a/B").unwrap();
        assert!(child.get_method("m", Some("()V")).is_none());
        assert_eq!(child.get_method("own", Some("()V")).unwrap().name(0), Some("declared"));
    }

    #[test]
    fn classes_outside_the_jar_pass_through() {
        let skeleton = JarSkeleton::from_zip(&build_jar(&[]), "empty.jar").unwrap();
        let mut tree = MappingTree::new();
        {
            let mut stripper = ChildMethodStripper::new(&mut tree, &skeleton);
            read_tsrg("a b\n\tm ()V n\n", "in.tsrg", &mut stripper).unwrap();
        }
        let tree = tree.freeze();
        assert!(tree.get_class("a").unwrap().get_method("m", Some("()V")).is_some());
    }
}
