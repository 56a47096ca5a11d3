//! Stream filters: the destination-namespace allow-list and the filter that
//! drops symbols a reference tree doesn't already know.

use failure::Error;
use indexmap::IndexSet;

use crate::tree::{ClassMapping, FrozenTree, NamespaceError, NULL_NAMESPACE_ID};
use crate::visitor::{MappedKind, MappingVisitor};

/// Drops destination names and descriptors for namespaces outside an
/// allow-set, compacting the surviving indices
pub struct DstNsFilter<V> {
    next: V,
    allowed: IndexSet<String>,
    ns_map: Vec<Option<usize>>,
}
impl<V: MappingVisitor> DstNsFilter<V> {
    pub fn new<I, S>(next: V, allowed: I) -> DstNsFilter<V>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DstNsFilter {
            next,
            allowed: allowed.into_iter().map(Into::into).collect(),
            ns_map: Vec::new(),
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
}
impl<V: MappingVisitor> MappingVisitor for DstNsFilter<V> {
    forward_visits!(
        flags,
        visit_header,
        visit_content,
        visit_class,
        visit_method,
        visit_field,
        visit_method_arg,
        visit_method_var,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        let mut kept = Vec::new();
        self.ns_map = dst
            .iter()
            .map(|&label| {
                if self.allowed.contains(label) {
                    kept.push(label);
                    Some(kept.len() - 1)
                } else {
                    None
                }
            })
            .collect();
        self.next.visit_namespaces(src, &kept)
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        match self.ns_map.get(namespace).copied().unwrap_or(None) {
            Some(mapped) => self.next.visit_dst_name(kind, mapped, name),
            None => Ok(()),
        }
    }
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        match self.ns_map.get(namespace).copied().unwrap_or(None) {
            Some(mapped) => self.next.visit_dst_desc(kind, mapped, desc),
            None => Ok(()),
        }
    }
}

/// Drops any class or member a reference tree doesn't already declare under
/// the given namespace, constraining a secondary source to the symbol set an
/// authoritative one recognizes
pub struct NoNewSourceFilter<'t, V> {
    next: V,
    reference: &'t FrozenTree,
    ns: i32,
    current_class: Option<&'t ClassMapping>,
}
impl<'t, V: MappingVisitor> NoNewSourceFilter<'t, V> {
    pub fn new(
        next: V,
        reference: &'t FrozenTree,
        namespace: &str,
    ) -> Result<NoNewSourceFilter<'t, V>, Error> {
        let ns = reference.namespace_id(namespace);
        if ns == NULL_NAMESPACE_ID {
            return Err(NamespaceError::Missing(namespace.into()).into());
        }
        Ok(NoNewSourceFilter {
            next,
            reference,
            ns,
            current_class: None,
        })
    }
    pub fn into_inner(self) -> V {
        self.next
    }
}
impl<'t, V: MappingVisitor> MappingVisitor for NoNewSourceFilter<'t, V> {
    forward_visits!(
        flags,
        visit_header,
        visit_namespaces,
        visit_content,
        visit_method_arg,
        visit_method_var,
        visit_dst_name,
        visit_dst_desc,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        self.current_class = self.reference.find_class(self.ns, src_name);
        if self.current_class.is_none() {
            return Ok(false);
        }
        self.next.visit_class(src_name)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let class = match self.current_class {
            Some(class) => class,
            None => return Ok(false),
        };
        if class.get_method(src_name, src_desc).is_none() {
            return Ok(false);
        }
        self.next.visit_method(src_name, src_desc)
    }
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let class = match self.current_class {
            Some(class) => class,
            None => return Ok(false),
        };
        if class.get_field(src_name, src_desc).is_none() {
            return Ok(false);
        }
        self.next.visit_field(src_name, src_desc)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::tiny::read as read_tiny;
    use crate::format::tsrg::read_tsrg;
    use crate::tree::MappingTree;

    #[test]
    fn filters_destination_namespaces() {
        let text = "tiny\t2\t0\tofficial\tintermediary\tnamed\n\
                    c\ta\tnet/inter/class_1\tnet/foo/Thing\n";
        let mut tree = MappingTree::new();
        {
            let mut filter = DstNsFilter::new(&mut tree, vec!["named"]);
            read_tiny(text, "in.tiny", &mut filter).unwrap();
        }
        let tree = tree.freeze();
        assert_eq!(tree.dst_namespaces(), &["named"]);
        assert_eq!(tree.get_class("a").unwrap().name(0), Some("net/foo/Thing"));
    }

    #[test]
    fn drops_unknown_symbols() {
        let mut reference = MappingTree::new();
        read_tsrg("a known\n\tf kf\n", "ref.tsrg", &mut reference).unwrap();
        let reference = reference.freeze();

        let text = "a renamed\n\tf renamedField\n\tunknownField dropped\n\
                    b/other gone\n";
        let mut tree = MappingTree::new();
        {
            let mut filter =
                NoNewSourceFilter::new(&mut tree, &reference, "source").unwrap();
            read_tsrg(text, "extra.tsrg", &mut filter).unwrap();
        }
        let tree = tree.freeze();
        assert_eq!(tree.len(), 1);
        let class = tree.get_class("a").unwrap();
        assert_eq!(class.name(0), Some("renamed"));
        assert!(class.get_field("f", None).is_some());
        assert!(class.get_field("unknownField", None).is_none());
    }

    #[test]
    fn missing_reference_namespace_fails() {
        let mut reference = MappingTree::new();
        read_tsrg("a b\n", "ref.tsrg", &mut reference).unwrap();
        let reference = reference.freeze();
        let mut tree = MappingTree::new();
        assert!(NoNewSourceFilter::new(&mut tree, &reference, "bogus").is_err());
    }
}
