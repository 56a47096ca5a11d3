//! Reader for parchment json exports. Parchment supplies documentation and
//! parameter names on top of an existing name set, so classes and members
//! carry no renames here, only comments and parameter destination names.

use failure::Error;
use serde_derive::Deserialize;

use crate::format::srg::{DST_NAMESPACE, SRC_NAMESPACE};
use crate::format::ParseError;
use crate::visitor::{MappedKind, MappingVisitor};

#[derive(Debug, Deserialize)]
struct ParchmentDoc {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    packages: Vec<PackageData>,
    #[serde(default)]
    classes: Vec<ClassData>,
}

#[derive(Debug, Deserialize)]
struct PackageData {
    name: String,
    #[serde(default)]
    javadoc: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassData {
    name: String,
    #[serde(default)]
    javadoc: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldData>,
    #[serde(default)]
    methods: Vec<MethodData>,
}

#[derive(Debug, Deserialize)]
struct FieldData {
    name: String,
    #[serde(default)]
    descriptor: Option<String>,
    #[serde(default)]
    javadoc: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MethodData {
    name: String,
    #[serde(default)]
    descriptor: Option<String>,
    #[serde(default)]
    javadoc: Vec<String>,
    #[serde(default)]
    parameters: Vec<ParameterData>,
}

#[derive(Debug, Deserialize)]
struct ParameterData {
    index: i32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    javadoc: Option<String>,
}

pub fn read<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    let doc: ParchmentDoc = serde_json::from_str(text)
        .map_err(|e| ParseError::at(file, e.line(), e.to_string()))?;
    debug!(
        "{}: parchment export version {}",
        file,
        doc.version.as_ref().map(String::as_str).unwrap_or("unknown")
    );
    loop {
        read_doc(&doc, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_doc<V: MappingVisitor>(
    doc: &ParchmentDoc,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    for package in &doc.packages {
        // Packages have no element in the symbol model
        if !package.javadoc.is_empty() {
            debug!("{}: dropping javadoc for package {}", file, package.name);
        }
    }
    for class in &doc.classes {
        if !visitor.visit_class(&class.name)? {
            continue;
        }
        if !class.javadoc.is_empty() {
            visitor.visit_comment(MappedKind::Class, &class.javadoc.join("\n"))?;
        }
        if !visitor.visit_element_content(MappedKind::Class)? {
            continue;
        }
        for field in &class.fields {
            let desc = field.descriptor.as_ref().map(String::as_str);
            if !visitor.visit_field(&field.name, desc)? {
                continue;
            }
            if !field.javadoc.is_empty() {
                visitor.visit_comment(MappedKind::Field, &field.javadoc.join("\n"))?;
            }
        }
        for method in &class.methods {
            let desc = method.descriptor.as_ref().map(String::as_str);
            if !visitor.visit_method(&method.name, desc)? {
                continue;
            }
            if !method.javadoc.is_empty() {
                visitor.visit_comment(MappedKind::Method, &method.javadoc.join("\n"))?;
            }
            if !visitor.visit_element_content(MappedKind::Method)? {
                continue;
            }
            for parameter in &method.parameters {
                if !visitor.visit_method_arg(-1, parameter.index, None)? {
                    continue;
                }
                if let Some(ref name) = parameter.name {
                    visitor.visit_dst_name(MappedKind::MethodArg, 0, name)?;
                }
                if let Some(ref javadoc) = parameter.javadoc {
                    visitor.visit_comment(MappedKind::MethodArg, javadoc)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::MappingTree;

    #[test]
    fn reads_parchment_json() {
        let text = r#"{
            "version": "1.1.0",
            "packages": [{"name": "net/foo", "javadoc": ["package docs"]}],
            "classes": [{
                "name": "net/foo/Thing",
                "javadoc": ["A thing.", "Does things."],
                "fields": [{"name": "count", "descriptor": "I", "javadoc": ["How many."]}],
                "methods": [{
                    "name": "doThing",
                    "descriptor": "(IZ)V",
                    "javadoc": ["Runs."],
                    "parameters": [{"index": 1, "name": "amount", "javadoc": "How much."}]
                }]
            }]
        }"#;
        let mut tree = MappingTree::new();
        read(text, "parchment.json", &mut tree).unwrap();
        let tree = tree.freeze();
        let class = tree.get_class("net/foo/Thing").unwrap();
        assert_eq!(class.comment(), Some("A thing.\nDoes things."));
        assert_eq!(class.get_field("count", Some("I")).unwrap().comment(), Some("How many."));
        let method = class.get_method("doThing", Some("(IZ)V")).unwrap();
        assert_eq!(method.comment(), Some("Runs."));
        assert_eq!(method.args().len(), 1);
        assert_eq!(method.args()[0].lv_index(), 1);
        assert_eq!(method.args()[0].dst_name(0), Some("amount"));
        assert_eq!(method.args()[0].comment(), Some("How much."));
    }

    #[test]
    fn malformed_json_names_file() {
        let mut tree = MappingTree::new();
        let err = read("{not json", "bad.json", &mut tree).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
