//! Readers for the space-separated srg family: classic `PK:`/`CL:`/`FD:`/`MD:`
//! srg files and the compact csrg dialect spigot ships in BuildData.
//!
//! Neither dialect names its namespaces, so both declare the conventional
//! `source`/`target` pair and leave relabeling to the namespace renamer.

use failure::Error;

use crate::cols::ColumnReader;
use crate::format::ParseError;
use crate::visitor::{MappedKind, MappingVisitor};

pub const SRC_NAMESPACE: &str = "source";
pub const DST_NAMESPACE: &str = "target";

/// Split `a/b/C/member` into owner and member name
fn split_owner(path: &str) -> Option<(&str, &str)> {
    let index = path.rfind('/')?;
    Some((&path[..index], &path[index + 1..]))
}

pub fn read_srg<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::spaced(text);
        read_srg_pass(&mut reader, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_srg_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    let mut first = true;
    loop {
        if !first && !reader.next_line() {
            break;
        }
        first = false;
        let keyword = match reader.next_col() {
            Some("") | None => continue,
            Some(keyword) => keyword,
        };
        match keyword {
            "PK:" => {
                // Package renames are applied by the package remapper, not
                // recorded as symbols
                debug!("{}: ignoring package line at {}", file, reader.line_number());
            }
            "CL:" => {
                let src = reader.next_col_required("class name").map_err(syntax)?;
                let dst = reader.next_col_required("mapped class name").map_err(syntax)?;
                class_skipped = !visitor.visit_class(src)?;
                current_class = Some(src.to_string());
                if !class_skipped {
                    visitor.visit_dst_name(MappedKind::Class, 0, dst)?;
                }
            }
            "FD:" => {
                let src_path = reader.next_col_required("field path").map_err(syntax)?;
                let dst_path = reader.next_col_required("mapped field path").map_err(syntax)?;
                let (owner, name) = split_owner(src_path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "field path has no owner")
                })?;
                let (dst_owner, dst_name) = split_owner(dst_path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "mapped field path has no owner")
                })?;
                if open_class(visitor, &mut current_class, &mut class_skipped, owner)? {
                    visitor.visit_dst_name(MappedKind::Class, 0, dst_owner)?;
                    if visitor.visit_field(name, None)? {
                        visitor.visit_dst_name(MappedKind::Field, 0, dst_name)?;
                    }
                }
            }
            "MD:" => {
                let src_path = reader.next_col_required("method path").map_err(syntax)?;
                let src_desc = reader.next_col_required("method descriptor").map_err(syntax)?;
                let dst_path = reader.next_col_required("mapped method path").map_err(syntax)?;
                let dst_desc = reader.next_col_required("mapped method descriptor").map_err(syntax)?;
                let (owner, name) = split_owner(src_path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "method path has no owner")
                })?;
                let (dst_owner, dst_name) = split_owner(dst_path).ok_or_else(|| {
                    ParseError::at(file, reader.line_number(), "mapped method path has no owner")
                })?;
                if open_class(visitor, &mut current_class, &mut class_skipped, owner)? {
                    visitor.visit_dst_name(MappedKind::Class, 0, dst_owner)?;
                    if visitor.visit_method(name, Some(src_desc))? {
                        visitor.visit_dst_name(MappedKind::Method, 0, dst_name)?;
                        visitor.visit_dst_desc(MappedKind::Method, 0, dst_desc)?;
                    }
                }
            }
            other => {
                return Err(ParseError::at(
                    file,
                    reader.line_number(),
                    format!("unknown srg keyword {:?}", other),
                )
                .into())
            }
        }
    }
    Ok(())
}

/// Re-emit a class visit only when the owner changes; true when the class
/// scope is open and accepted
fn open_class<V: MappingVisitor>(
    visitor: &mut V,
    current: &mut Option<String>,
    skipped: &mut bool,
    owner: &str,
) -> Result<bool, Error> {
    if current.as_ref().map(String::as_str) != Some(owner) {
        *skipped = !visitor.visit_class(owner)?;
        *current = Some(owner.to_string());
    }
    Ok(!*skipped)
}

pub fn read_csrg<V: MappingVisitor>(text: &str, file: &str, visitor: &mut V) -> Result<(), Error> {
    loop {
        let mut reader = ColumnReader::spaced(text);
        read_csrg_pass(&mut reader, file, visitor)?;
        if visitor.visit_end()? {
            return Ok(());
        }
    }
}

fn read_csrg_pass<V: MappingVisitor>(
    reader: &mut ColumnReader,
    file: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    let syntax = |e| ParseError::from_syntax(file, e);
    if visitor.visit_header()? {
        visitor.visit_namespaces(SRC_NAMESPACE, &[DST_NAMESPACE])?;
    }
    if !visitor.visit_content()? {
        return Ok(());
    }
    let mut current_class: Option<String> = None;
    let mut class_skipped = false;
    let mut first = true;
    loop {
        if !first && !reader.next_line() {
            break;
        }
        first = false;
        let col0 = match reader.next_col() {
            Some("") | None => continue,
            Some(col) => col,
        };
        if col0.starts_with('#') {
            continue;
        }
        if col0.contains('.') {
            // Spigot's 1.8.8 build data carries broken dotted lines; only
            // junk (and comments) contain dots, so they are safe to drop
            debug!("{}:{}: skipping dotted line", file, reader.line_number());
            continue;
        }
        if col0.ends_with('/') {
            debug!("{}: ignoring package line at {}", file, reader.line_number());
            continue;
        }
        let col1 = reader.next_col_required("mapping column").map_err(syntax)?;
        let col2 = reader.next_col();
        let col3 = reader.next_col();
        match (col2, col3) {
            (None, _) => {
                // Two columns: a class mapping
                class_skipped = !visitor.visit_class(col0)?;
                current_class = Some(col0.to_string());
                if !class_skipped {
                    visitor.visit_dst_name(MappedKind::Class, 0, col1)?;
                }
            }
            (Some(dst), None) => {
                // Three columns: owner, field, mapped name
                if open_class(visitor, &mut current_class, &mut class_skipped, col0)?
                    && visitor.visit_field(col1, None)?
                {
                    visitor.visit_dst_name(MappedKind::Field, 0, dst)?;
                }
            }
            (Some(desc), Some(dst)) => {
                // Four columns: owner, method, descriptor, mapped name
                if open_class(visitor, &mut current_class, &mut class_skipped, col0)?
                    && visitor.visit_method(col1, Some(desc))?
                {
                    visitor.visit_dst_name(MappedKind::Method, 0, dst)?;
                }
            }
        }
    }
    Ok(())
}

/// Extract csrg package lines (`a/ net/minecraft/server/`) as remap rules,
/// pattern first, keeping declaration order
pub fn read_csrg_packages(text: &str) -> Vec<(String, String)> {
    let mut rules = Vec::new();
    for line in text.lines() {
        let mut cols = line.split(' ');
        let (pattern, target) = match (cols.next(), cols.next()) {
            (Some(pattern), Some(target)) => (pattern, target),
            _ => continue,
        };
        if !pattern.ends_with('/') && pattern != "." && pattern != "./" {
            continue;
        }
        let pattern = pattern.trim_end_matches('/');
        let target = target.trim_end_matches('/');
        rules.push((pattern.to_string(), target.to_string()));
    }
    rules
}
