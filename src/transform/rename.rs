//! Bijective relabeling of namespaces at header time. Indices and every
//! name attached to them pass through untouched.

use failure::Error;
use indexmap::IndexMap;

use crate::visitor::MappingVisitor;

pub struct NamespaceRenamer<V> {
    next: V,
    renames: IndexMap<String, String>,
}
impl<V: MappingVisitor> NamespaceRenamer<V> {
    pub fn new<I, S>(next: V, renames: I) -> NamespaceRenamer<V>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        NamespaceRenamer {
            next,
            renames: renames.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
    fn rename<'a>(renames: &'a IndexMap<String, String>, label: &'a str) -> &'a str {
        renames.get(label).map(String::as_str).unwrap_or(label)
    }
}
impl<V: MappingVisitor> MappingVisitor for NamespaceRenamer<V> {
    forward_visits!(
        flags,
        visit_header,
        visit_content,
        visit_class,
        visit_method,
        visit_field,
        visit_method_arg,
        visit_method_var,
        visit_dst_name,
        visit_dst_desc,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        let renames = &self.renames;
        let src = Self::rename(renames, src);
        let dst: Vec<&str> = dst.iter().map(|&label| Self::rename(renames, label)).collect();
        self.next.visit_namespaces(src, &dst)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::tsrg::read_tsrg;
    use crate::tree::MappingTree;

    #[test]
    fn relabels_namespaces() {
        let mut tree = MappingTree::new();
        {
            let mut renamer = NamespaceRenamer::new(
                &mut tree,
                vec![("source", "official"), ("target", "searge")],
            );
            read_tsrg("a/b/C net/srg/C_1\n", "in.tsrg", &mut renamer).unwrap();
        }
        let tree = tree.freeze();
        assert_eq!(tree.src_namespace(), "official");
        assert_eq!(tree.dst_namespaces(), &["searge"]);
        assert_eq!(tree.get_class("a/b/C").unwrap().name(0), Some("net/srg/C_1"));
    }

    #[test]
    fn unmentioned_labels_pass_through() {
        let mut tree = MappingTree::new();
        {
            let mut renamer =
                NamespaceRenamer::new(&mut tree, vec![("target", "named")]);
            read_tsrg("a b\n", "in.tsrg", &mut renamer).unwrap();
        }
        let tree = tree.freeze();
        assert_eq!(tree.src_namespace(), "source");
        assert_eq!(tree.dst_namespaces(), &["named"]);
    }
}
