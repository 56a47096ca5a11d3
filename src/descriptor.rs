//! JVM descriptor handling.
//!
//! Descriptors embed internal class names (`Lnet/foo/Bar;`), so any rename of
//! a class must also rewrite every descriptor mentioning it. Remapping is
//! expressed as a closure from internal name to replacement so the tree, the
//! package remapper and the access converter can all reuse the same walk.

use failure::{bail, Error};

/// Rewrite every `L...;` internal name in a field or method descriptor.
/// Names the mapper returns `None` for are kept unchanged.
pub fn map_desc<F>(desc: &str, mut map_class: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(desc.len());
    let mut rest = desc;
    while let Some(start) = rest.find('L') {
        match rest[start..].find(';') {
            Some(relative_end) => {
                let end = start + relative_end;
                out.push_str(&rest[..=start]);
                let name = &rest[start + 1..end];
                match map_class(name) {
                    Some(mapped) => out.push_str(&mapped),
                    None => out.push_str(name),
                }
                out.push(';');
                rest = &rest[end + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

#[inline]
pub fn is_method_desc(desc: &str) -> bool {
    desc.starts_with('(')
}

/// Split `(params)ret` into its parameter list and return type
pub fn split_method_desc(desc: &str) -> Result<(&str, &str), Error> {
    if !desc.starts_with('(') {
        bail!("Not a method descriptor: {:?}", desc);
    }
    match desc.find(')') {
        Some(close) => Ok((&desc[1..close], &desc[close + 1..])),
        None => bail!("Unterminated method descriptor: {:?}", desc),
    }
}

/// The simple (package-less) part of an internal name
#[inline]
pub fn simple_name(internal: &str) -> &str {
    match internal.rfind('/') {
        Some(index) => &internal[index + 1..],
        None => internal,
    }
}

/// The package part of an internal name, without the trailing slash
#[inline]
pub fn package_of(internal: &str) -> &str {
    match internal.rfind('/') {
        Some(index) => &internal[..index],
        None => "",
    }
}

/// Internal (slash) form of a dotted binary name
#[inline]
pub fn to_internal(dotted: &str) -> String {
    dotted.replace('.', "/")
}

/// Dotted binary form of an internal name
#[inline]
pub fn to_binary(internal: &str) -> String {
    internal.replace('/', ".")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn maps_class_references() {
        let mapped = map_desc("(La/b/C;IJLa/b/C;)La/D;", |name| match name {
            "a/b/C" => Some("net/foo/Thing".into()),
            _ => None,
        });
        assert_eq!(mapped, "(Lnet/foo/Thing;IJLnet/foo/Thing;)La/D;");
    }

    #[test]
    fn arrays_and_primitives_untouched() {
        let mapped = map_desc("([[I[La/b/C;Z)V", |_| Some("x/Y".into()));
        assert_eq!(mapped, "([[I[Lx/Y;Z)V");
    }

    #[test]
    fn field_desc_without_classes() {
        assert_eq!(map_desc("J", |_| Some("x".into())), "J");
    }

    #[test]
    fn split_method() {
        assert_eq!(split_method_desc("(IJ)V").unwrap(), ("IJ", "V"));
        assert!(split_method_desc("I").is_err());
    }

    #[test]
    fn name_helpers() {
        assert_eq!(simple_name("a/b/C"), "C");
        assert_eq!(simple_name("C"), "C");
        assert_eq!(package_of("a/b/C"), "a/b");
        assert_eq!(package_of("C"), "");
        assert_eq!(to_internal("net.minecraft.Foo"), "net/minecraft/Foo");
        assert_eq!(to_binary("net/minecraft/Foo"), "net.minecraft.Foo");
    }
}
