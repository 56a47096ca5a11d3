//! The mapping dialects: detection plus one reader (and where supported one
//! writer) per format.
//!
//! Detection never trial-parses. Every dialect has a structural signature in
//! its first bytes or lines (a magic token, a known csv header, or the
//! tab-indentation that separates tsrg from csrg), and an input matching no
//! signature is an explicit error naming the line that defeated the table.

use std::fmt::{self, Display, Formatter};

use failure_derive::Fail;

pub mod tiny;
pub mod srg;
pub mod tsrg;
pub mod rgs;
pub mod mcp;
pub mod proguard;
pub mod parchment;
pub mod classfile;

/// Client/server discriminator carried by the MCP-era csv dialects
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    Client,
    Server,
    Both,
}
impl Side {
    /// Whether a record with the given side column should be kept.
    /// `2` marks a joined record, which every side includes.
    pub fn matches(self, record_side: u32) -> bool {
        match self {
            Side::Client => record_side == 0 || record_side == 2,
            Side::Server => record_side == 1 || record_side == 2,
            Side::Both => true,
        }
    }
}
impl Default for Side {
    #[inline]
    fn default() -> Side {
        Side::Both
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MappingFormat {
    TinyV1,
    TinyV2,
    Srg,
    Csrg,
    TsrgV1,
    TsrgV2,
    Rgs,
    /// `searge,name,side,desc` member csv (the MCPBot generation)
    McpCsv,
    /// `searge,name,notes` member csv (pre-MCPBot)
    McpCsvOld,
    /// Combined csv carrying notch signatures (the oldest generation)
    McpCsvLegacy,
    /// `param,name,side` csv
    McpParamsCsv,
    /// `class,package` remap table
    PackagesCsv,
    Proguard,
    ParchmentJson,
    ClassFile,
    Archive,
}
impl MappingFormat {
    /// Ingestion priority inside an archive: class-declaring formats come
    /// before the member-only csvs that need their names already in the tree
    pub fn priority(self) -> u32 {
        match self {
            MappingFormat::TinyV2 => 0,
            MappingFormat::TinyV1 => 1,
            MappingFormat::TsrgV2 => 2,
            MappingFormat::TsrgV1 => 3,
            MappingFormat::Srg => 4,
            MappingFormat::Csrg => 5,
            MappingFormat::Rgs => 6,
            MappingFormat::Proguard => 7,
            MappingFormat::ClassFile => 8,
            MappingFormat::Archive => 9,
            MappingFormat::ParchmentJson => 10,
            MappingFormat::McpCsvLegacy => 11,
            MappingFormat::McpCsv => 12,
            MappingFormat::McpCsvOld => 13,
            MappingFormat::McpParamsCsv => 14,
            MappingFormat::PackagesCsv => 15,
        }
    }
}
impl Display for MappingFormat {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            MappingFormat::TinyV1 => "tiny v1",
            MappingFormat::TinyV2 => "tiny v2",
            MappingFormat::Srg => "srg",
            MappingFormat::Csrg => "csrg",
            MappingFormat::TsrgV1 => "tsrg",
            MappingFormat::TsrgV2 => "tsrg2",
            MappingFormat::Rgs => "rgs",
            MappingFormat::McpCsv => "mcp csv",
            MappingFormat::McpCsvOld => "old mcp csv",
            MappingFormat::McpCsvLegacy => "legacy mcp csv",
            MappingFormat::McpParamsCsv => "mcp params csv",
            MappingFormat::PackagesCsv => "packages csv",
            MappingFormat::Proguard => "proguard",
            MappingFormat::ParchmentJson => "parchment",
            MappingFormat::ClassFile => "class file",
            MappingFormat::Archive => "archive",
        })
    }
}

/// A malformed header or line; fails the single input being read
#[derive(Debug, Fail)]
#[fail(display = "{}:{}: {}", file, line, message)]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub message: String,
}
impl ParseError {
    pub(crate) fn at(file: &str, line: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            file: file.into(),
            line,
            message: message.into(),
        }
    }
    pub(crate) fn from_syntax(file: &str, e: crate::cols::SyntaxError) -> ParseError {
        ParseError {
            file: file.into(),
            line: e.line,
            message: format!("expected {}, found {:?}", e.expected, e.found),
        }
    }
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot detect mapping format of {}: no signature matched {:?} (line {})",
       file, snippet, line)]
pub struct UnknownMappingFormat {
    pub file: String,
    pub snippet: String,
    pub line: usize,
}

/// How many bytes of an input `detect` is allowed to inspect
pub const DETECT_PREFIX: usize = 4096;

/// Identify an input's dialect from a bounded prefix of its content.
/// `file` is only used for the error message.
pub fn detect(data: &[u8], file: &str) -> Result<MappingFormat, UnknownMappingFormat> {
    if data.starts_with(&[0xCA, 0xFE, 0xBA, 0xBE]) {
        return Ok(MappingFormat::ClassFile);
    }
    if data.starts_with(b"PK\x03\x04") {
        return Ok(MappingFormat::Archive);
    }
    let prefix = &data[..data.len().min(DETECT_PREFIX)];
    // A multi-byte char may be split at the prefix boundary; drop the tail
    let text = match ::std::str::from_utf8(prefix) {
        Ok(text) => text,
        Err(e) if e.valid_up_to() > 0 => {
            ::std::str::from_utf8(&prefix[..e.valid_up_to()]).unwrap()
        }
        Err(_) => {
            return Err(UnknownMappingFormat {
                file: file.into(),
                snippet: format!("{:?}", &prefix[..prefix.len().min(16)]),
                line: 1,
            })
        }
    };
    detect_text(text, file)
}

fn detect_text(text: &str, file: &str) -> Result<MappingFormat, UnknownMappingFormat> {
    let mut first_content_line = None;
    let mut saw_tab_indent = false;
    let mut saw_wide_spaced = false;
    let mut saw_two_col = false;
    for (index, line) in text.lines().enumerate().take(64) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        if first_content_line.is_none() {
            // Formats identified by their very first meaningful line
            if let Some(format) = detect_header_line(trimmed) {
                return Ok(format);
            }
            first_content_line = Some((index + 1, trimmed.to_string()));
        }
        if trimmed.starts_with('#') {
            continue; // csrg and proguard both allow comment lines
        }
        if trimmed.contains(" -> ") && trimmed.ends_with(':') {
            return Ok(MappingFormat::Proguard);
        }
        if line.starts_with('\t') {
            saw_tab_indent = true;
        } else {
            match line.split(' ').count() {
                2 => saw_two_col = true,
                3 | 4 => saw_wide_spaced = true,
                _ => {}
            }
        }
    }
    // The srg family has no header; tell tsrg from csrg by indentation
    if saw_tab_indent {
        return Ok(MappingFormat::TsrgV1);
    }
    if saw_wide_spaced || saw_two_col {
        return Ok(MappingFormat::Csrg);
    }
    let (line, snippet) = first_content_line.unwrap_or((1, String::new()));
    Err(UnknownMappingFormat {
        file: file.into(),
        snippet,
        line,
    })
}

fn detect_header_line(line: &str) -> Option<MappingFormat> {
    if line.starts_with("v1\t") {
        return Some(MappingFormat::TinyV1);
    }
    if line.starts_with("tiny\t2\t") {
        return Some(MappingFormat::TinyV2);
    }
    if line.starts_with("tsrg2 ") {
        return Some(MappingFormat::TsrgV2);
    }
    if line.starts_with("PK: ")
        || line.starts_with("CL: ")
        || line.starts_with("FD: ")
        || line.starts_with("MD: ")
    {
        return Some(MappingFormat::Srg);
    }
    if line.starts_with(".class_map")
        || line.starts_with(".field_map")
        || line.starts_with(".method_map")
        || line.starts_with(".class ")
        || line.starts_with(".option")
        || line.starts_with(".attribute")
    {
        return Some(MappingFormat::Rgs);
    }
    if line.starts_with('{') {
        return Some(MappingFormat::ParchmentJson);
    }
    let csv_header = line.replace('"', "");
    if csv_header.starts_with("searge,name,side,desc") {
        return Some(MappingFormat::McpCsv);
    }
    if csv_header.starts_with("searge,name,notes") {
        return Some(MappingFormat::McpCsvOld);
    }
    if csv_header.starts_with("class,notch") {
        return Some(MappingFormat::McpCsvLegacy);
    }
    if csv_header.starts_with("param,name,side") {
        return Some(MappingFormat::McpParamsCsv);
    }
    if csv_header.starts_with("class,package") {
        return Some(MappingFormat::PackagesCsv);
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    fn detect_str(text: &str) -> MappingFormat {
        detect(text.as_bytes(), "test").unwrap()
    }

    #[test]
    fn detects_headered_formats() {
        assert_eq!(detect_str("v1\tofficial\tnamed\n"), MappingFormat::TinyV1);
        assert_eq!(detect_str("tiny\t2\t0\tofficial\tnamed\n"), MappingFormat::TinyV2);
        assert_eq!(detect_str("tsrg2 obf srg id\n"), MappingFormat::TsrgV2);
        assert_eq!(detect_str("CL: a net/foo/Thing\n"), MappingFormat::Srg);
        assert_eq!(detect_str(".class_map a b\n"), MappingFormat::Rgs);
        assert_eq!(detect_str("{\"version\": \"1.0\"}"), MappingFormat::ParchmentJson);
        assert_eq!(detect_str("searge,name,side,desc\n"), MappingFormat::McpCsv);
        assert_eq!(detect_str("searge,name,notes\n"), MappingFormat::McpCsvOld);
        assert_eq!(detect_str("class,notch,searge,name,sig,side,notes\n"), MappingFormat::McpCsvLegacy);
        assert_eq!(detect_str("param,name,side\n"), MappingFormat::McpParamsCsv);
        assert_eq!(detect_str("class,package\n"), MappingFormat::PackagesCsv);
    }

    #[test]
    fn detects_structural_formats() {
        assert_eq!(detect_str("a/b/C net/foo/Thing\n\tm ()V doThing\n"), MappingFormat::TsrgV1);
        assert_eq!(detect_str("a/b/C net/foo/Thing\na/b/C f count\n"), MappingFormat::Csrg);
        // Classes-only two-column files read identically either way
        assert_eq!(detect_str("a/b/C net/foo/Thing\n"), MappingFormat::Csrg);
        assert_eq!(
            detect_str("a.b.C -> net.foo.Thing:\n    int f -> g\n"),
            MappingFormat::Proguard
        );
    }

    #[test]
    fn detects_binary_formats() {
        assert_eq!(detect(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0], "x").unwrap(), MappingFormat::ClassFile);
        assert_eq!(detect(b"PK\x03\x04rest", "x").unwrap(), MappingFormat::Archive);
    }

    #[test]
    fn comments_dont_decide() {
        assert_eq!(detect_str("# spigot header\na/b/C net/foo/Thing\n"), MappingFormat::Csrg);
    }

    #[test]
    fn unknown_names_the_line() {
        let err = detect(b"complete nonsense with many words here\n", "bad.txt").unwrap_err();
        assert_eq!(err.file, "bad.txt");
        assert_eq!(err.line, 1);
        assert!(err.snippet.contains("nonsense"));
    }

    #[test]
    fn member_csvs_order_after_class_formats() {
        assert!(MappingFormat::TsrgV1.priority() < MappingFormat::McpCsv.priority());
        assert!(MappingFormat::Srg.priority() < MappingFormat::McpParamsCsv.priority());
    }
}
