//! Moves classes between packages by glob rule. MCP's `packages.csv` and
//! spigot's csrg package lines both reduce to an ordered list of
//! `pattern -> package` rules; rules are matched in declaration-reversed
//! order so a later, more specific rule overrides an earlier blanket one.
//!
//! A matched class keeps its simple name and takes the rule's package. The
//! rewrite applies to source names, mapped class names and to class names
//! embedded in method and field descriptors.

use failure::Error;

use crate::descriptor::{map_desc, simple_name};
use crate::visitor::{MappedKind, MappingVisitor};

pub struct PackageRemapper<V> {
    next: V,
    rules: Vec<(String, String)>,
}
impl<V: MappingVisitor> PackageRemapper<V> {
    /// `rules` pairs a glob over full internal class names (`*` within a
    /// segment, `**` across segments) with the target package
    pub fn new<I, S>(next: V, rules: I) -> PackageRemapper<V>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        PackageRemapper {
            next,
            rules: rules.into_iter().map(|(p, t)| (p.into(), t.into())).collect(),
        }
    }
    pub fn into_inner(self) -> V {
        self.next
    }
    /// The rule-applied form of an internal class name, `None` if no rule
    /// matches
    pub fn remap_name(&self, name: &str) -> Option<String> {
        for (pattern, package) in self.rules.iter().rev() {
            if !glob_match(pattern, name) {
                continue;
            }
            let simple = simple_name(name);
            return Some(if package.is_empty() {
                simple.to_string()
            } else {
                format!("{}/{}", package.trim_end_matches('/'), simple)
            });
        }
        None
    }
    fn remap_or_keep<'a>(&self, name: &'a str) -> ::std::borrow::Cow<'a, str> {
        match self.remap_name(name) {
            Some(mapped) => ::std::borrow::Cow::Owned(mapped),
            None => ::std::borrow::Cow::Borrowed(name),
        }
    }
    fn remap_desc(&self, desc: &str) -> String {
        map_desc(desc, |name| self.remap_name(name))
    }
}
impl<V: MappingVisitor> MappingVisitor for PackageRemapper<V> {
    forward_visits!(
        flags,
        visit_header,
        visit_namespaces,
        visit_content,
        visit_method_arg,
        visit_method_var,
        visit_comment,
        visit_element_content,
        visit_end
    );
    fn visit_class(&mut self, src_name: &str) -> Result<bool, Error> {
        let name = self.remap_or_keep(src_name);
        self.next.visit_class(&name)
    }
    fn visit_method(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let desc = src_desc.map(|d| self.remap_desc(d));
        self.next.visit_method(src_name, desc.as_ref().map(String::as_str))
    }
    fn visit_field(&mut self, src_name: &str, src_desc: Option<&str>) -> Result<bool, Error> {
        let desc = src_desc.map(|d| self.remap_desc(d));
        self.next.visit_field(src_name, desc.as_ref().map(String::as_str))
    }
    fn visit_dst_name(&mut self, kind: MappedKind, namespace: usize, name: &str) -> Result<(), Error> {
        match kind {
            MappedKind::Class => {
                let name = self.remap_or_keep(name);
                self.next.visit_dst_name(kind, namespace, &name)
            }
            _ => self.next.visit_dst_name(kind, namespace, name),
        }
    }
    fn visit_dst_desc(&mut self, kind: MappedKind, namespace: usize, desc: &str) -> Result<(), Error> {
        let desc = self.remap_desc(desc);
        self.next.visit_dst_desc(kind, namespace, &desc)
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    match_inner(pattern.as_bytes(), text.as_bytes())
}

fn match_inner(p: &[u8], t: &[u8]) -> bool {
    if p.is_empty() {
        return t.is_empty();
    }
    match p[0] {
        b'*' if p.get(1) == Some(&b'*') => {
            let rest = &p[2..];
            if rest.is_empty() {
                return true;
            }
            if rest[0] == b'/' {
                // Zero or more whole segments
                let after = &rest[1..];
                if match_inner(after, t) {
                    return true;
                }
                return (0..t.len()).any(|j| t[j] == b'/' && match_inner(after, &t[j + 1..]));
            }
            (0..=t.len()).any(|i| match_inner(rest, &t[i..]))
        }
        b'*' => {
            let rest = &p[1..];
            (0..=t.len())
                .take_while(|&i| i == 0 || t[i - 1] != b'/')
                .any(|i| match_inner(rest, &t[i..]))
        }
        c => t.first() == Some(&c) && match_inner(&p[1..], &t[1..]),
    }
}
