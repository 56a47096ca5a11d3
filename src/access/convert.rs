//! Resolves access entries against a frozen tree and converts between the
//! transformer and widener dialects.
//!
//! Resolution is best-effort: a class or member the tree does not know is
//! logged with the namespaces that were tried and passed through
//! unresolved, because hand-maintained access lists routinely outlive the
//! symbols they name. Namespace errors, by contrast, fail fast.

use std::collections::HashMap;

use failure::Error;
use indexmap::IndexMap;

use crate::descriptor::{to_binary, to_internal};
use crate::tree::{
    ClassMapping, FieldMapping, FrozenTree, MethodMapping, NamespaceError, NULL_NAMESPACE_ID,
    SRC_NAMESPACE_ID,
};

use super::at::{AccessLevel, AtEntry, AtTarget, FinalMod};
use super::aw::{AwAccess, AwEntry, AwFile, AwTarget};

fn require_ns(tree: &FrozenTree, label: &str) -> Result<i32, Error> {
    match tree.namespace_id(label) {
        NULL_NAMESPACE_ID => Err(NamespaceError::Missing(label.into()).into()),
        ns => Ok(ns),
    }
}

/// Look the class up in the entry's namespace first, then fall back to the
/// source axis; returns which axis matched so member lookups use the same
fn resolve_class<'t>(tree: &'t FrozenTree, ns: i32, internal: &str) -> Option<(&'t ClassMapping, i32)> {
    if let Some(class) = tree.find_class(ns, internal) {
        return Some((class, ns));
    }
    if ns != SRC_NAMESPACE_ID {
        if let Some(class) = tree.get_class(internal) {
            return Some((class, SRC_NAMESPACE_ID));
        }
    }
    None
}

fn find_method<'c>(
    tree: &FrozenTree,
    class: &'c ClassMapping,
    ns: i32,
    name: &str,
    desc: Option<&str>,
) -> Option<&'c MethodMapping> {
    if ns == SRC_NAMESPACE_ID {
        return class.get_method(name, desc);
    }
    let mut found = None;
    for method in class.methods() {
        if method.name(ns) != Some(name) {
            continue;
        }
        if let (Some(want), Some(src_desc)) = (desc, method.src_desc()) {
            if tree.map_desc(src_desc, SRC_NAMESPACE_ID, ns) != want {
                continue;
            }
        }
        if found.is_some() {
            return None; // Ambiguous
        }
        found = Some(method);
    }
    found
}

fn find_field<'c>(class: &'c ClassMapping, ns: i32, name: &str) -> Option<&'c FieldMapping> {
    if ns == SRC_NAMESPACE_ID {
        return class.get_field(name, None);
    }
    let mut found = None;
    for field in class.fields() {
        if field.name(ns) != Some(name) {
            continue;
        }
        if found.is_some() {
            return None;
        }
        found = Some(field);
    }
    found
}

/// Rewrite every transformer line's owner, member name and descriptor from
/// one namespace into another
pub fn remap_transformers(
    entries: &[AtEntry],
    tree: &FrozenTree,
    from: &str,
    to: &str,
) -> Result<Vec<AtEntry>, Error> {
    let from_ns = require_ns(tree, from)?;
    let to_ns = require_ns(tree, to)?;
    Ok(entries
        .iter()
        .map(|entry| remap_entry(entry, tree, from_ns, to_ns, from))
        .collect())
}

fn remap_entry(entry: &AtEntry, tree: &FrozenTree, from_ns: i32, to_ns: i32, from: &str) -> AtEntry {
    let internal = to_internal(&entry.owner);
    let (class, axis) = match resolve_class(tree, from_ns, &internal) {
        Some(found) => found,
        None => {
            warn!(
                "No class {} in the tree (tried namespace {:?}, then {:?})",
                entry.owner,
                from,
                tree.src_namespace()
            );
            // Descriptors still remap; unknown class names pass through
            let target = match entry.target {
                AtTarget::Method { ref name, ref desc } => AtTarget::Method {
                    name: name.clone(),
                    desc: tree.map_desc(desc, from_ns, to_ns),
                },
                ref other => other.clone(),
            };
            return AtEntry {
                target,
                ..entry.clone()
            };
        }
    };
    let owner = to_binary(class.name(to_ns).unwrap_or_else(|| class.src_name()));
    let target = match entry.target {
        AtTarget::Class | AtTarget::WildcardFields | AtTarget::WildcardMethods => {
            entry.target.clone()
        }
        AtTarget::Method { ref name, ref desc } => {
            let mapped_desc = tree.map_desc(desc, axis, to_ns);
            // Constructors and static initializers have no mapped name
            if name == "<init>" || name == "<clinit>" {
                AtTarget::Method {
                    name: name.clone(),
                    desc: mapped_desc,
                }
            } else {
                match find_method(tree, class, axis, name, Some(desc)) {
                    Some(method) => AtTarget::Method {
                        name: method.name(to_ns).unwrap_or_else(|| method.src_name()).to_string(),
                        desc: mapped_desc,
                    },
                    None => {
                        warn!(
                            "No method {}.{}{} in the tree (tried namespace {:?}, then {:?})",
                            entry.owner,
                            name,
                            desc,
                            from,
                            tree.src_namespace()
                        );
                        AtTarget::Method {
                            name: name.clone(),
                            desc: mapped_desc,
                        }
                    }
                }
            }
        }
        AtTarget::Field { ref name } => match find_field(class, axis, name) {
            Some(field) => AtTarget::Field {
                name: field.name(to_ns).unwrap_or_else(|| field.src_name()).to_string(),
            },
            None => {
                warn!(
                    "No field {}.{} in the tree (tried namespace {:?}, then {:?})",
                    entry.owner,
                    name,
                    from,
                    tree.src_namespace()
                );
                AtTarget::Field { name: name.clone() }
            }
        },
    };
    AtEntry {
        access: entry.access,
        final_mod: entry.final_mod,
        owner,
        target,
        comment: entry.comment.clone(),
    }
}

/// Convert a transformer list to widener records with every target resolved
/// into `to`. Access levels the widener vocabulary cannot express downgrade
/// to `accessible`; a final-removal directive adds `mutable` for fields and
/// `extendable` otherwise. Contradictory final directives keep the first
/// and are logged.
pub fn transformers_to_widener(
    entries: &[AtEntry],
    tree: &FrozenTree,
    from: &str,
    to: &str,
) -> Result<AwFile, Error> {
    let from_ns = require_ns(tree, from)?;
    let to_ns = require_ns(tree, to)?;
    let mut aw = AwFile {
        namespace: to.to_string(),
        entries: Vec::new(),
    };
    let mut final_seen: HashMap<String, FinalMod> = HashMap::new();
    for entry in entries {
        if entry.access != AccessLevel::Public {
            warn!(
                "Widener cannot express {} on {}; downgrading to accessible",
                entry.access, entry.owner
            );
        }
        if entry.final_mod == FinalMod::Add {
            warn!("Widener cannot force final on {}; dropping the +f", entry.owner);
        }
        let internal = to_internal(&entry.owner);
        let resolved = resolve_class(tree, from_ns, &internal);
        if resolved.is_none() {
            warn!(
                "No class {} in the tree (tried namespace {:?}, then {:?})",
                entry.owner,
                from,
                tree.src_namespace()
            );
        }
        let owner = match resolved {
            Some((class, _)) => class.name(to_ns).unwrap_or_else(|| class.src_name()).to_string(),
            None => internal.clone(),
        };
        let remove_final = effective_final(entry, &mut final_seen);
        match entry.target {
            AtTarget::Class => {
                aw.entries.push(AwEntry {
                    access: AwAccess::Accessible,
                    target: AwTarget::Class { name: owner.clone() },
                });
                if remove_final {
                    aw.entries.push(AwEntry {
                        access: AwAccess::Extendable,
                        target: AwTarget::Class { name: owner },
                    });
                }
            }
            AtTarget::Method { ref name, ref desc } => {
                let (class, axis) = match resolved {
                    Some(found) => found,
                    None => continue,
                };
                let resolved_method = if name == "<init>" || name == "<clinit>" {
                    None
                } else {
                    find_method(tree, class, axis, name, Some(desc))
                };
                let (name, desc) = match resolved_method {
                    Some(method) => (
                        method.name(to_ns).unwrap_or_else(|| method.src_name()).to_string(),
                        tree.map_desc(desc, axis, to_ns),
                    ),
                    None if name == "<init>" || name == "<clinit>" => {
                        (name.clone(), tree.map_desc(desc, axis, to_ns))
                    }
                    None => {
                        warn!(
                            "No method {}.{}{} in the tree (tried namespace {:?}, then {:?})",
                            entry.owner,
                            name,
                            desc,
                            from,
                            tree.src_namespace()
                        );
                        (name.clone(), tree.map_desc(desc, axis, to_ns))
                    }
                };
                push_method(&mut aw.entries, &owner, &name, &desc, remove_final);
            }
            AtTarget::Field { ref name } => {
                let (class, axis) = match resolved {
                    Some(found) => found,
                    None => continue,
                };
                let (name, desc) = match find_field(class, axis, name) {
                    Some(field) => (
                        field.name(to_ns).unwrap_or_else(|| field.src_name()).to_string(),
                        field.src_desc().map(|d| tree.map_desc(d, SRC_NAMESPACE_ID, to_ns)),
                    ),
                    None => {
                        warn!(
                            "No field {}.{} in the tree (tried namespace {:?}, then {:?})",
                            entry.owner,
                            name,
                            from,
                            tree.src_namespace()
                        );
                        (name.clone(), None)
                    }
                };
                push_field(&mut aw.entries, &owner, &name, desc, remove_final);
            }
            AtTarget::WildcardFields => {
                let class = match resolved {
                    Some((class, _)) => class,
                    None => continue,
                };
                for field in class.fields() {
                    let name = field.name(to_ns).unwrap_or_else(|| field.src_name()).to_string();
                    let desc = field.src_desc().map(|d| tree.map_desc(d, SRC_NAMESPACE_ID, to_ns));
                    push_field(&mut aw.entries, &owner, &name, desc, remove_final);
                }
            }
            AtTarget::WildcardMethods => {
                let class = match resolved {
                    Some((class, _)) => class,
                    None => continue,
                };
                for method in class.methods() {
                    let name = method.name(to_ns).unwrap_or_else(|| method.src_name()).to_string();
                    let desc = match method.src_desc() {
                        Some(desc) => tree.map_desc(desc, SRC_NAMESPACE_ID, to_ns),
                        None => continue, // Not expressible without a descriptor
                    };
                    push_method(&mut aw.entries, &owner, &name, &desc, remove_final);
                }
            }
        }
    }
    Ok(aw)
}

/// First directive wins; a later contradictory one is logged and ignored
fn effective_final(entry: &AtEntry, seen: &mut HashMap<String, FinalMod>) -> bool {
    let key = format!("{} {}", entry.owner, target_key(&entry.target));
    match seen.get(&key).cloned() {
        Some(previous) => {
            if previous != entry.final_mod {
                warn!(
                    "Conflicting final directives for {}: {:?} then {:?}; keeping the first",
                    key, previous, entry.final_mod
                );
            }
            previous == FinalMod::Remove
        }
        None => {
            seen.insert(key, entry.final_mod);
            entry.final_mod == FinalMod::Remove
        }
    }
}

fn target_key(target: &AtTarget) -> String {
    match *target {
        AtTarget::Class => String::new(),
        AtTarget::WildcardFields => "*".to_string(),
        AtTarget::WildcardMethods => "*()".to_string(),
        AtTarget::Field { ref name } => name.clone(),
        AtTarget::Method { ref name, ref desc } => format!("{}{}", name, desc),
    }
}

fn push_method(entries: &mut Vec<AwEntry>, owner: &str, name: &str, desc: &str, remove_final: bool) {
    entries.push(AwEntry {
        access: AwAccess::Accessible,
        target: AwTarget::Method {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        },
    });
    if remove_final {
        entries.push(AwEntry {
            access: AwAccess::Extendable,
            target: AwTarget::Method {
                owner: owner.to_string(),
                name: name.to_string(),
                desc: desc.to_string(),
            },
        });
    }
}

fn push_field(
    entries: &mut Vec<AwEntry>,
    owner: &str,
    name: &str,
    desc: Option<String>,
    remove_final: bool,
) {
    entries.push(AwEntry {
        access: AwAccess::Accessible,
        target: AwTarget::Field {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.clone(),
        },
    });
    if remove_final {
        entries.push(AwEntry {
            access: AwAccess::Mutable,
            target: AwTarget::Field {
                owner: owner.to_string(),
                name: name.to_string(),
                desc,
            },
        });
    }
}

/// The dual conversion: every widener directive becomes one transformer
/// line at the namespace-correct owner, name and descriptor. `accessible`
/// plus `extendable`/`mutable` records for the same target merge into a
/// single `public-f` line.
pub fn widener_to_transformers(
    aw: &AwFile,
    tree: &FrozenTree,
    to: &str,
) -> Result<Vec<AtEntry>, Error> {
    let from_ns = require_ns(tree, &aw.namespace)?;
    let to_ns = require_ns(tree, to)?;

    struct Merged {
        target: AwTarget,
        remove_final: bool,
    }
    let mut merged: IndexMap<String, Merged> = IndexMap::new();
    for entry in &aw.entries {
        let key = match entry.target {
            AwTarget::Class { ref name } => format!("c {}", name),
            AwTarget::Method {
                ref owner,
                ref name,
                ref desc,
            } => format!("m {} {} {}", owner, name, desc),
            AwTarget::Field {
                ref owner,
                ref name,
                ..
            } => format!("f {} {}", owner, name),
        };
        let slot = merged.entry(key).or_insert_with(|| Merged {
            target: entry.target.clone(),
            remove_final: false,
        });
        if entry.access != AwAccess::Accessible {
            slot.remove_final = true;
        }
    }

    let mut out = Vec::with_capacity(merged.len());
    for merged in merged.values() {
        let final_mod = if merged.remove_final {
            FinalMod::Remove
        } else {
            FinalMod::Keep
        };
        let entry = match merged.target {
            AwTarget::Class { ref name } => {
                let owner = match resolve_class(tree, from_ns, name) {
                    Some((class, _)) => class.name(to_ns).unwrap_or_else(|| class.src_name()).to_string(),
                    None => {
                        warn!(
                            "No class {} in the tree (tried namespace {:?}, then {:?})",
                            name,
                            aw.namespace,
                            tree.src_namespace()
                        );
                        name.clone()
                    }
                };
                AtEntry {
                    access: AccessLevel::Public,
                    final_mod,
                    owner: to_binary(&owner),
                    target: AtTarget::Class,
                    comment: None,
                }
            }
            AwTarget::Method {
                ref owner,
                ref name,
                ref desc,
            } => {
                let (owner, name, desc) =
                    resolve_member(tree, from_ns, to_ns, &aw.namespace, owner, name, Some(desc), true);
                AtEntry {
                    access: AccessLevel::Public,
                    final_mod,
                    owner: to_binary(&owner),
                    target: AtTarget::Method {
                        name,
                        desc: desc.unwrap_or_default(),
                    },
                    comment: None,
                }
            }
            AwTarget::Field {
                ref owner,
                ref name,
                ..
            } => {
                let (owner, name, _) =
                    resolve_member(tree, from_ns, to_ns, &aw.namespace, owner, name, None, false);
                AtEntry {
                    access: AccessLevel::Public,
                    final_mod,
                    owner: to_binary(&owner),
                    target: AtTarget::Field { name },
                    comment: None,
                }
            }
        };
        out.push(entry);
    }
    Ok(out)
}

fn resolve_member(
    tree: &FrozenTree,
    from_ns: i32,
    to_ns: i32,
    from_label: &str,
    owner: &str,
    name: &str,
    desc: Option<&str>,
    is_method: bool,
) -> (String, String, Option<String>) {
    let (class, axis) = match resolve_class(tree, from_ns, owner) {
        Some(found) => found,
        None => {
            warn!(
                "No class {} in the tree (tried namespace {:?}, then {:?})",
                owner,
                from_label,
                tree.src_namespace()
            );
            return (
                owner.to_string(),
                name.to_string(),
                desc.map(|d| tree.map_desc(d, from_ns, to_ns)),
            );
        }
    };
    let mapped_owner = class.name(to_ns).unwrap_or_else(|| class.src_name()).to_string();
    if is_method {
        if name == "<init>" || name == "<clinit>" {
            return (
                mapped_owner,
                name.to_string(),
                desc.map(|d| tree.map_desc(d, axis, to_ns)),
            );
        }
        match find_method(tree, class, axis, name, desc) {
            Some(method) => (
                mapped_owner,
                method.name(to_ns).unwrap_or_else(|| method.src_name()).to_string(),
                desc.map(|d| tree.map_desc(d, axis, to_ns)),
            ),
            None => {
                warn!(
                    "No method {}.{}{} in the tree (tried namespace {:?}, then {:?})",
                    owner,
                    name,
                    desc.unwrap_or(""),
                    from_label,
                    tree.src_namespace()
                );
                (
                    mapped_owner,
                    name.to_string(),
                    desc.map(|d| tree.map_desc(d, axis, to_ns)),
                )
            }
        }
    } else {
        match find_field(class, axis, name) {
            Some(field) => (
                mapped_owner,
                field.name(to_ns).unwrap_or_else(|| field.src_name()).to_string(),
                None,
            ),
            None => {
                warn!(
                    "No field {}.{} in the tree (tried namespace {:?}, then {:?})",
                    owner,
                    name,
                    from_label,
                    tree.src_namespace()
                );
                (mapped_owner, name.to_string(), None)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::access::at::parse_at;
    use crate::access::aw::parse_aw;
    use crate::format::tiny::read as read_tiny;
    use crate::tree::MappingTree;

    fn sample_tree() -> FrozenTree {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    c\tnet/minecraft/Foo\tnet/example/Foo\n\
                    \tm\t()V\tbar\tdoBar\n\
                    \tm\t(Lnet/minecraft/Foo;)V\tuse\tuseFoo\n\
                    \tf\tI\tcount\ttotalCount\n\
                    \tf\tLnet/minecraft/Foo;\tother\totherFoo\n";
        let mut tree = MappingTree::new();
        read_tiny(text, "tree.tiny", &mut tree).unwrap();
        tree.freeze()
    }

    #[test]
    fn remaps_owner_name_and_descriptor() {
        let tree = sample_tree();
        let entries = parse_at("public net.minecraft.Foo bar()V\n", "in.cfg").unwrap();
        let remapped = remap_transformers(&entries, &tree, "official", "named").unwrap();
        assert_eq!(remapped[0].to_string(), "public net.example.Foo doBar()V");

        let entries =
            parse_at("public net.minecraft.Foo use(Lnet/minecraft/Foo;)V\n", "in.cfg").unwrap();
        let remapped = remap_transformers(&entries, &tree, "official", "named").unwrap();
        assert_eq!(
            remapped[0].to_string(),
            "public net.example.Foo useFoo(Lnet/example/Foo;)V"
        );
    }

    #[test]
    fn constructors_bypass_member_resolution() {
        let tree = sample_tree();
        let entries =
            parse_at("private net.minecraft.Foo <init>(Lnet/minecraft/Foo;)V\n", "in.cfg").unwrap();
        let remapped = remap_transformers(&entries, &tree, "official", "named").unwrap();
        assert_eq!(
            remapped[0].to_string(),
            "private net.example.Foo <init>(Lnet/example/Foo;)V"
        );
    }

    #[test]
    fn unresolved_entries_pass_through() {
        let tree = sample_tree();
        let entries = parse_at("public net.unknown.Gone bar()V\n", "in.cfg").unwrap();
        let remapped = remap_transformers(&entries, &tree, "official", "named").unwrap();
        assert_eq!(remapped[0].to_string(), "public net.unknown.Gone bar()V");
    }

    #[test]
    fn missing_namespace_fails_fast() {
        let tree = sample_tree();
        let entries = parse_at("public net.minecraft.Foo\n", "in.cfg").unwrap();
        assert!(remap_transformers(&entries, &tree, "bogus", "named").is_err());
    }

    #[test]
    fn widener_conversion_resolves_and_downgrades() {
        let _ = env_logger::try_init();
        let tree = sample_tree();
        let text = "public net.minecraft.Foo\n\
                    protected net.minecraft.Foo bar()V\n\
                    public-f net.minecraft.Foo count\n";
        let entries = parse_at(text, "at.cfg").unwrap();
        let aw = transformers_to_widener(&entries, &tree, "official", "named").unwrap();
        assert_eq!(aw.namespace, "named");
        let lines: Vec<String> = aw.entries.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "accessible class net/example/Foo",
                // protected downgrades to accessible
                "accessible method net/example/Foo doBar ()V",
                "accessible field net/example/Foo totalCount I",
                "mutable field net/example/Foo totalCount I",
            ]
        );
    }

    #[test]
    fn wildcards_expand_over_tree_members() {
        let tree = sample_tree();
        let entries = parse_at("public net.minecraft.Foo *\n", "at.cfg").unwrap();
        let aw = transformers_to_widener(&entries, &tree, "official", "named").unwrap();
        let lines: Vec<String> = aw.entries.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "accessible field net/example/Foo totalCount I",
                "accessible field net/example/Foo otherFoo Lnet/example/Foo;",
            ]
        );
    }

    #[test]
    fn conflicting_final_directives_keep_the_first() {
        let tree = sample_tree();
        let text = "public-f net.minecraft.Foo count\n\
                    public+f net.minecraft.Foo count\n";
        let entries = parse_at(text, "at.cfg").unwrap();
        let aw = transformers_to_widener(&entries, &tree, "official", "named").unwrap();
        let mutables = aw
            .entries
            .iter()
            .filter(|e| e.access == AwAccess::Mutable)
            .count();
        // The first directive (-f) wins for both occurrences
        assert_eq!(mutables, 2);
    }

    #[test]
    fn widener_to_transformer_round_trip() {
        let tree = sample_tree();
        let text = "public net.minecraft.Foo bar()V\n\
                    public-f net.minecraft.Foo count\n";
        let entries = parse_at(text, "at.cfg").unwrap();
        let aw = transformers_to_widener(&entries, &tree, "official", "named").unwrap();
        let back = widener_to_transformers(&aw, &tree, "official").unwrap();
        let lines: Vec<String> = back.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "public net.minecraft.Foo bar()V",
                "public-f net.minecraft.Foo count",
            ]
        );
    }

    #[test]
    fn widener_parses_then_remaps() {
        let tree = sample_tree();
        let text = "accessWidener v1 named\n\
                    accessible method net/example/Foo doBar ()V\n";
        let aw = parse_aw(text, "in.accesswidener").unwrap();
        let back = widener_to_transformers(&aw, &tree, "official").unwrap();
        assert_eq!(back[0].to_string(), "public net.minecraft.Foo bar()V");
    }
}
