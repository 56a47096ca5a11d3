//! Threads many mapping inputs, in whatever order they were handed over,
//! into one frozen tree.
//!
//! `build()` stages every input (spooling reader-backed ones to a temp file
//! so the original stream can be dropped), sniffs each one's dialect,
//! probes the namespaces it produces, orders inputs so nothing is ingested
//! before the namespaces it needs exist, runs each through its transform
//! chain into the tree, applies registered package-remap reprocess actions
//! and freezes the result. Any input failure fails the whole build; no
//! partially-ingested tree escapes.

use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Read};
use std::mem;
use std::path::PathBuf;
use std::process;

use failure::{format_err, Error};
use indexmap::IndexSet;
use zip::ZipArchive;

use crate::format::mcp::McpMemberKind;
use crate::format::{self, classfile, mcp, parchment, proguard, rgs, srg, tiny, tsrg};
use crate::format::MappingFormat;
use crate::transform::{DstNsFilter, NamespaceRenamer, PackageRemapper, SourceNsSwitch};
use crate::tree::{FrozenTree, MappingTree};
use crate::visitor::MappingVisitor;

pub use crate::format::Side;

enum InputData {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read>),
}

/// One mapping source plus the per-input options steering its ingestion
pub struct MappingInput {
    name: String,
    data: InputData,
    side: Side,
    renames: Vec<(String, String)>,
    source_filter: Option<String>,
    allowed_dst: Option<Vec<String>>,
    lookup_namespace: String,
    dst_label: String,
    seed_namespace: String,
}
impl MappingInput {
    fn with_data(name: String, data: InputData) -> MappingInput {
        MappingInput {
            name,
            data,
            side: Side::Both,
            renames: Vec::new(),
            source_filter: None,
            allowed_dst: None,
            lookup_namespace: srg::DST_NAMESPACE.into(),
            dst_label: "mcp".into(),
            seed_namespace: srg::SRC_NAMESPACE.into(),
        }
    }
    pub fn from_path(path: impl Into<PathBuf>) -> MappingInput {
        let path = path.into();
        let name = path.display().to_string();
        MappingInput::with_data(name, InputData::Path(path))
    }
    pub fn from_text(name: &str, text: &str) -> MappingInput {
        MappingInput::with_data(name.into(), InputData::Bytes(text.as_bytes().to_vec()))
    }
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> MappingInput {
        MappingInput::with_data(name.into(), InputData::Bytes(bytes))
    }
    /// A non-seekable stream; `build()` spools it to a temporary file so the
    /// stream does not have to stay open across the ordering/ingestion split
    pub fn from_reader(name: &str, reader: impl Read + 'static) -> MappingInput {
        MappingInput::with_data(name.into(), InputData::Reader(Box::new(reader)))
    }
    /// Keep only records matching this side in the MCP-era csv dialects
    pub fn side(mut self, side: Side) -> MappingInput {
        self.side = side;
        self
    }
    /// Relabel a namespace this input declares
    pub fn rename(mut self, from: &str, to: &str) -> MappingInput {
        self.renames.push((from.into(), to.into()));
        self
    }
    /// Order this input after whichever input produces `namespace`
    pub fn source_filter(mut self, namespace: &str) -> MappingInput {
        self.source_filter = Some(namespace.into());
        self
    }
    /// Drop destination names outside this set
    pub fn allow_dst<I, S>(mut self, namespaces: I) -> MappingInput
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_dst = Some(namespaces.into_iter().map(Into::into).collect());
        self
    }
    /// Namespace whose already-ingested names key the rows of a member-only
    /// csv (defaults to the srg family's `target`)
    pub fn lookup_namespace(mut self, namespace: &str) -> MappingInput {
        self.lookup_namespace = namespace.into();
        self
    }
    /// Label under which csv-provided names are recorded
    pub fn dst_label(mut self, label: &str) -> MappingInput {
        self.dst_label = label.into();
        self
    }
    /// Namespace a class file or jar seeds the tree under
    pub fn seed_namespace(mut self, namespace: &str) -> MappingInput {
        self.seed_namespace = namespace.into();
        self
    }
}

#[derive(Default)]
pub struct InputBuilder {
    inputs: Vec<MappingInput>,
    package_rules: Vec<Vec<(String, String)>>,
}
impl InputBuilder {
    pub fn new() -> InputBuilder {
        InputBuilder::default()
    }
    pub fn add(mut self, input: MappingInput) -> InputBuilder {
        self.inputs.push(input);
        self
    }
    /// Register a package-remap reprocess action applied to the whole tree
    /// at build time, before any action discovered during ingestion
    pub fn reprocess_packages<I, S>(mut self, rules: I) -> InputBuilder
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.package_rules
            .push(rules.into_iter().map(|(p, t)| (p.into(), t.into())).collect());
        self
    }

    pub fn build(self) -> Result<FrozenTree, Error> {
        let spooled: RefCell<Vec<PathBuf>> = RefCell::new(Vec::new());
        defer!({
            for path in spooled.borrow().iter() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Leaking spool file {}: {}", path.display(), e);
                }
            }
        });

        let mut staged = Vec::new();
        for (index, input) in self.inputs.into_iter().enumerate() {
            stage(input, index, &spooled, &mut staged)?;
        }

        let mut probed = Vec::new();
        for input in staged {
            probed.push(probe(input)?);
        }
        let ordered = schedule(probed);

        let mut tree = MappingTree::new();
        let mut reprocess = self.package_rules;
        for input in &ordered {
            ingest(&mut tree, input, &mut reprocess)?;
        }
        for rules in reprocess {
            let old = mem::replace(&mut tree, MappingTree::new());
            let mut remapper = PackageRemapper::new(&mut tree, rules);
            old.accept(&mut remapper)?;
        }
        Ok(tree.freeze())
    }
}

enum StagedData {
    Memory(Vec<u8>),
    /// Either a caller-supplied path (already seekable, never copied) or a
    /// spool written from a reader
    File(PathBuf),
}
impl StagedData {
    fn load(&self, name: &str) -> Result<Vec<u8>, Error> {
        match *self {
            StagedData::Memory(ref bytes) => Ok(bytes.clone()),
            StagedData::File(ref path) => {
                fs::read(path).map_err(|e| format_err!("{}: {}", name, e))
            }
        }
    }
    fn prefix(&self, len: usize, name: &str) -> Result<Vec<u8>, Error> {
        match *self {
            StagedData::Memory(ref bytes) => Ok(bytes[..bytes.len().min(len)].to_vec()),
            StagedData::File(ref path) => {
                let file = fs::File::open(path).map_err(|e| format_err!("{}: {}", name, e))?;
                let mut buffer = Vec::with_capacity(len);
                file.take(len as u64)
                    .read_to_end(&mut buffer)
                    .map_err(|e| format_err!("{}: {}", name, e))?;
                Ok(buffer)
            }
        }
    }
}

struct StagedInput {
    name: String,
    format: MappingFormat,
    data: StagedData,
    side: Side,
    renames: Vec<(String, String)>,
    source_filter: Option<String>,
    allowed_dst: Option<Vec<String>>,
    lookup_namespace: String,
    dst_label: String,
    seed_namespace: String,
}

fn spool(
    reader: &mut dyn Read,
    index: usize,
    name: &str,
    spooled: &RefCell<Vec<PathBuf>>,
) -> Result<PathBuf, Error> {
    let path = ::std::env::temp_dir().join(format!(
        "mappinglib-spool-{}-{}",
        process::id(),
        index
    ));
    let mut file = fs::File::create(&path).map_err(|e| format_err!("{}: {}", name, e))?;
    spooled.borrow_mut().push(path.clone());
    ::std::io::copy(reader, &mut file).map_err(|e| format_err!("{}: spooling failed: {}", name, e))?;
    Ok(path)
}

fn stage(
    input: MappingInput,
    index: usize,
    spooled: &RefCell<Vec<PathBuf>>,
    out: &mut Vec<StagedInput>,
) -> Result<(), Error> {
    let MappingInput {
        name,
        data,
        side,
        renames,
        source_filter,
        allowed_dst,
        lookup_namespace,
        dst_label,
        seed_namespace,
    } = input;
    let data = match data {
        InputData::Bytes(bytes) => StagedData::Memory(bytes),
        InputData::Path(path) => StagedData::File(path),
        InputData::Reader(mut reader) => {
            StagedData::File(spool(&mut reader, index, &name, spooled)?)
        }
    };
    let prefix = data.prefix(format::DETECT_PREFIX, &name)?;
    let format = format::detect(&prefix, &name)?;
    let template = StagedInput {
        name,
        format,
        data,
        side,
        renames,
        source_filter,
        allowed_dst,
        lookup_namespace,
        dst_label,
        seed_namespace,
    };
    if format == MappingFormat::Archive {
        stage_archive(template, out)
    } else {
        out.push(template);
        Ok(())
    }
}

/// Sniff every archive entry individually; an archive of nothing but class
/// files seeds the tree as one jar, anything else splits into per-entry
/// inputs ordered by format priority then name
fn stage_archive(template: StagedInput, out: &mut Vec<StagedInput>) -> Result<(), Error> {
    let bytes = template.data.load(&template.name)?;
    let mut archive =
        ZipArchive::new(Cursor::new(&bytes[..])).map_err(|e| format_err!("{}: {}", template.name, e))?;
    let mut entries: Vec<(MappingFormat, String, Vec<u8>)> = Vec::new();
    let mut all_classes = true;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.name().ends_with('/') {
            continue;
        }
        let entry_name = format!("{}!{}", template.name, entry.name());
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        match format::detect(&data, &entry_name) {
            Ok(format) => {
                if format != MappingFormat::ClassFile {
                    all_classes = false;
                }
                entries.push((format, entry_name, data));
            }
            Err(e) => {
                debug!("{}: skipping entry: {}", template.name, e);
            }
        }
    }
    if entries.is_empty() {
        return Err(format_err!(
            "{}: archive contains no recognizable mapping entries",
            template.name
        ));
    }
    if all_classes {
        out.push(template);
        return Ok(());
    }
    entries.sort_by(|a, b| (a.0.priority(), &a.1).cmp(&(b.0.priority(), &b.1)));
    for (format, entry_name, data) in entries {
        let staged = StagedInput {
            name: entry_name,
            format,
            data: StagedData::Memory(data),
            side: template.side,
            renames: template.renames.clone(),
            source_filter: template.source_filter.clone(),
            allowed_dst: template.allowed_dst.clone(),
            lookup_namespace: template.lookup_namespace.clone(),
            dst_label: template.dst_label.clone(),
            seed_namespace: template.seed_namespace.clone(),
        };
        if format == MappingFormat::Archive {
            stage_archive(staged, out)?;
        } else {
            out.push(staged);
        }
    }
    Ok(())
}

/// Records a document's header and refuses its content, for the cheap
/// namespace-discovery pass
#[derive(Default)]
struct NamespaceProbe {
    src: Option<String>,
    dst: Vec<String>,
}
impl MappingVisitor for NamespaceProbe {
    fn visit_namespaces(&mut self, src: &str, dst: &[&str]) -> Result<(), Error> {
        self.src = Some(src.into());
        self.dst = dst.iter().map(|&s| String::from(s)).collect();
        Ok(())
    }
    fn visit_content(&mut self) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_class(&mut self, _: &str) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_method(&mut self, _: &str, _: Option<&str>) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_field(&mut self, _: &str, _: Option<&str>) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_method_arg(&mut self, _: i32, _: i32, _: Option<&str>) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_method_var(&mut self, _: i32, _: i32, _: i32, _: Option<&str>) -> Result<bool, Error> {
        Ok(false)
    }
    fn visit_dst_name(&mut self, _: crate::visitor::MappedKind, _: usize, _: &str) -> Result<(), Error> {
        Ok(())
    }
    fn visit_comment(&mut self, _: crate::visitor::MappedKind, _: &str) -> Result<(), Error> {
        Ok(())
    }
}

struct ProbedInput {
    staged: StagedInput,
    /// Namespace this input must find already in the tree
    requires: Option<String>,
    /// Destination labels it will add, after renames and the dst filter
    produces: Vec<String>,
    /// Post-rename source label, `None` when the input follows the tree
    src_label: Option<String>,
    /// Post-rename destination labels, before the dst filter
    dst_labels: Vec<String>,
}

fn renamed(label: &str, renames: &[(String, String)]) -> String {
    renames
        .iter()
        .find(|(from, _)| from == label)
        .map(|(_, to)| to.clone())
        .unwrap_or_else(|| label.to_string())
}

fn probe(staged: StagedInput) -> Result<ProbedInput, Error> {
    let (src, dst, requires) = match staged.format {
        MappingFormat::McpCsv | MappingFormat::McpCsvOld | MappingFormat::McpParamsCsv => {
            // Member-only csvs follow whatever namespace keys their rows
            (None, vec![staged.dst_label.clone()], Some(staged.lookup_namespace.clone()))
        }
        MappingFormat::McpCsvLegacy => (
            None,
            vec!["searge".to_string(), staged.dst_label.clone()],
            staged.source_filter.clone(),
        ),
        MappingFormat::PackagesCsv => (None, Vec::new(), None),
        MappingFormat::ClassFile | MappingFormat::Archive => (
            Some(staged.seed_namespace.clone()),
            Vec::new(),
            staged.source_filter.clone(),
        ),
        _ => {
            let bytes = staged.data.load(&staged.name)?;
            let text = String::from_utf8_lossy(&bytes);
            let mut header = NamespaceProbe::default();
            run_reader(&staged, &text, &mut header)?;
            (header.src, header.dst, staged.source_filter.clone())
        }
    };
    let src_label = src.map(|label| renamed(&label, &staged.renames));
    let dst_labels: Vec<String> = dst.iter().map(|label| renamed(label, &staged.renames)).collect();
    let produces = match staged.allowed_dst {
        Some(ref allowed) => dst_labels
            .iter()
            .filter(|label| allowed.contains(label))
            .cloned()
            .collect(),
        None => dst_labels.clone(),
    };
    Ok(ProbedInput {
        staged,
        requires,
        produces,
        src_label,
        dst_labels,
    })
}

/// Declaration order, except that an input requiring a namespace moves
/// after whichever input produces it. Requirements nothing produces are
/// scheduled as roots, in declaration order.
fn schedule(mut remaining: Vec<ProbedInput>) -> Vec<ProbedInput> {
    let mut scheduled = Vec::with_capacity(remaining.len());
    let mut produced: IndexSet<String> = IndexSet::new();
    while !remaining.is_empty() {
        let mut deferred = Vec::new();
        let mut advanced = false;
        for input in remaining.drain(..) {
            let satisfied = match input.requires {
                None => true,
                Some(ref ns) => produced.contains(ns),
            };
            if satisfied {
                produced.extend(input.produces.iter().cloned());
                scheduled.push(input);
                advanced = true;
            } else {
                deferred.push(input);
            }
        }
        if !advanced {
            for input in &deferred {
                debug!(
                    "{}: nothing produces namespace {:?}, scheduling as root",
                    input.staged.name,
                    input.requires.as_ref().map(String::as_str).unwrap_or("")
                );
            }
            scheduled.extend(deferred);
            break;
        }
        remaining = deferred;
    }
    scheduled
}

/// The per-input decorator chain: reader -> renamer -> source switch ->
/// dst filter -> tree
fn assemble<'a>(
    tree: &'a mut MappingTree,
    staged: &'a StagedInput,
    switch_to: Option<String>,
) -> Box<dyn MappingVisitor + 'a> {
    let mut sink: Box<dyn MappingVisitor + 'a> = Box::new(tree);
    if let Some(ref allowed) = staged.allowed_dst {
        sink = Box::new(DstNsFilter::new(sink, allowed.iter().cloned()));
    }
    if let Some(target) = switch_to {
        sink = Box::new(SourceNsSwitch::new(sink, &target, false));
    }
    if !staged.renames.is_empty() {
        sink = Box::new(NamespaceRenamer::new(sink, staged.renames.clone()));
    }
    sink
}

fn run_reader<V: MappingVisitor>(
    staged: &StagedInput,
    text: &str,
    visitor: &mut V,
) -> Result<(), Error> {
    match staged.format {
        MappingFormat::TinyV1 | MappingFormat::TinyV2 => tiny::read(text, &staged.name, visitor),
        MappingFormat::TsrgV1 | MappingFormat::TsrgV2 => tsrg::read_tsrg(text, &staged.name, visitor),
        MappingFormat::Srg => srg::read_srg(text, &staged.name, visitor),
        MappingFormat::Csrg => srg::read_csrg(text, &staged.name, visitor),
        MappingFormat::Rgs => rgs::read(text, &staged.name, visitor),
        MappingFormat::Proguard => proguard::read(text, &staged.name, visitor),
        MappingFormat::ParchmentJson => parchment::read(text, &staged.name, visitor),
        other => Err(format_err!("{}: {} is not a streamed text format", staged.name, other)),
    }
}

fn ingest(
    tree: &mut MappingTree,
    probed: &ProbedInput,
    reprocess: &mut Vec<Vec<(String, String)>>,
) -> Result<(), Error> {
    let staged = &probed.staged;
    // A document whose source axis is not the tree's gets re-keyed on the
    // tree's axis, provided it carries that axis as a destination
    let switch_to = match (tree.src_namespace(), probed.src_label.as_ref()) {
        (Some(tree_src), Some(doc_src))
            if tree_src != doc_src && probed.dst_labels.iter().any(|l| l == tree_src) =>
        {
            Some(tree_src.to_string())
        }
        _ => None,
    };
    let bytes = staged.data.load(&staged.name)?;
    match staged.format {
        MappingFormat::ClassFile => {
            let mut sink = assemble(tree, staged, switch_to);
            classfile::read_class(&bytes, &staged.name, &staged.seed_namespace, &mut sink)
        }
        MappingFormat::Archive => {
            let mut sink = assemble(tree, staged, switch_to);
            classfile::read_jar(&bytes, &staged.name, &staged.seed_namespace, &mut sink)
        }
        MappingFormat::PackagesCsv => {
            let text = String::from_utf8_lossy(&bytes);
            reprocess.push(mcp::read_packages_csv(&text, &staged.name)?);
            Ok(())
        }
        MappingFormat::McpCsv | MappingFormat::McpCsvOld => {
            let text = String::from_utf8_lossy(&bytes);
            let kind = member_csv_kind(&staged.name, &text)?;
            let index = tree.dst_index(&staged.lookup_namespace)?;
            let mut sink = assemble(tree, staged, switch_to);
            mcp::read_members_csv(
                &text,
                &staged.name,
                kind,
                staged.side,
                &index,
                &staged.dst_label,
                &mut sink,
            )
        }
        MappingFormat::McpParamsCsv => {
            let text = String::from_utf8_lossy(&bytes);
            let index = tree.dst_index(&staged.lookup_namespace)?;
            let mut sink = assemble(tree, staged, switch_to);
            mcp::read_params_csv(&text, &staged.name, staged.side, &index, &staged.dst_label, &mut sink)
        }
        MappingFormat::McpCsvLegacy => {
            let text = String::from_utf8_lossy(&bytes);
            let known: Vec<String> = tree.src_class_names().map(String::from).collect();
            let src_label = tree
                .src_namespace()
                .unwrap_or(srg::SRC_NAMESPACE)
                .to_string();
            let mut sink = assemble(tree, staged, switch_to);
            mcp::read_legacy_csv(
                &text,
                &staged.name,
                staged.side,
                &src_label,
                &staged.dst_label,
                &known,
                &mut sink,
            )
        }
        MappingFormat::Csrg => {
            let text = String::from_utf8_lossy(&bytes);
            {
                let mut sink = assemble(tree, staged, switch_to);
                srg::read_csrg(&text, &staged.name, &mut sink)?;
            }
            let rules = srg::read_csrg_packages(&text);
            if !rules.is_empty() {
                reprocess.push(
                    rules
                        .into_iter()
                        .map(|(package, target)| {
                            let pattern = if package == "." {
                                "*".to_string()
                            } else {
                                format!("{}/*", package)
                            };
                            (pattern, target)
                        })
                        .collect(),
                );
            }
            Ok(())
        }
        _ => {
            let text = String::from_utf8_lossy(&bytes);
            let mut sink = assemble(tree, staged, switch_to);
            run_reader(staged, &text, &mut sink)
        }
    }
}

/// Fields csv or methods csv, told apart by name where possible and by the
/// searge prefix of the first data row otherwise
fn member_csv_kind(name: &str, text: &str) -> Result<McpMemberKind, Error> {
    let lower = name.to_lowercase();
    if lower.contains("method") {
        return Ok(McpMemberKind::Method);
    }
    if lower.contains("field") {
        return Ok(McpMemberKind::Field);
    }
    for line in text.lines().skip(1) {
        if line.starts_with("func_") {
            return Ok(McpMemberKind::Method);
        }
        if line.starts_with("field_") {
            return Ok(McpMemberKind::Field);
        }
    }
    Err(format_err!(
        "{}: cannot tell a fields csv from a methods csv",
        name
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::classfile::test::{build_class, build_jar};
    use crate::format::tsrg::write_tsrg;
    use crate::transform::DstNsFilter;

    const TINY: &str = "tiny\t2\t0\tofficial\tintermediary\tnamed\n\
                        c\ta/b/C\tnet/inter/class_1\tnet/foo/Thing\n\
                        \tm\t()V\tm\t\tdoThing\n";
    const TSRG: &str = "a/b/C net/srg/C_1\n\
                        \tm ()V func_1_m\n";

    #[test]
    fn merges_inputs_across_namespaces() {
        let _ = env_logger::try_init();
        let tree = InputBuilder::new()
            .add(MappingInput::from_text("base.tiny", TINY))
            .add(
                MappingInput::from_text("extra.tsrg", TSRG)
                    .rename("source", "official")
                    .rename("target", "searge"),
            )
            .build()
            .unwrap();
        assert_eq!(tree.src_namespace(), "official");
        assert_eq!(tree.dst_namespaces(), &["intermediary", "named", "searge"]);
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.name(tree.namespace_id("named")), Some("net/foo/Thing"));
        assert_eq!(class.name(tree.namespace_id("searge")), Some("net/srg/C_1"));
        let method = class.get_method("m", Some("()V")).unwrap();
        assert_eq!(method.name(tree.namespace_id("named")), Some("doThing"));
        assert_eq!(method.name(tree.namespace_id("searge")), Some("func_1_m"));
    }

    #[test]
    fn export_after_merge_is_line_exact() {
        let tree = InputBuilder::new()
            .add(MappingInput::from_text("base.tiny", TINY))
            .add(
                MappingInput::from_text("extra.tsrg", TSRG)
                    .rename("source", "official")
                    .rename("target", "searge"),
            )
            .build()
            .unwrap();
        // Filter the tree down to official -> named and export
        let mut filtered = MappingTree::new();
        {
            let mut filter = DstNsFilter::new(&mut filtered, vec!["named"]);
            tree.accept(&mut filter).unwrap();
        }
        let written = write_tsrg(&filtered.freeze(), Vec::new()).unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "a/b/C net/foo/Thing\n\tm ()V doThing\n"
        );
    }

    #[test]
    fn member_csvs_wait_for_their_namespace() {
        // The csv is declared first but needs searge names from the tsrg
        let csv = "searge,name,side,desc\nfunc_1_m,doThing,2,\n";
        let tree = InputBuilder::new()
            .add(
                MappingInput::from_text("methods.csv", csv)
                    .lookup_namespace("searge")
                    .dst_label("mcp"),
            )
            .add(
                MappingInput::from_text("classes.tsrg", TSRG)
                    .rename("target", "searge"),
            )
            .build()
            .unwrap();
        let class = tree.get_class("a/b/C").unwrap();
        let method = class.get_method("m", Some("()V")).unwrap();
        assert_eq!(method.name(tree.namespace_id("mcp")), Some("doThing"));
    }

    #[test]
    fn unsatisfied_requirement_becomes_root() {
        // Nothing produces "searge"; ingestion then fails to find the
        // namespace in the tree, failing the whole build
        let csv = "searge,name,side,desc\nfunc_1_m,doThing,2,\n";
        let err = InputBuilder::new()
            .add(
                MappingInput::from_text("methods.csv", csv).lookup_namespace("searge"),
            )
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("searge"));
    }

    #[test]
    fn jar_archives_seed_the_tree() {
        let class = build_class("a/B", "java/lang/Object", &[("f", "I")], &[("m", "()V")]);
        let jar = build_jar(&[("a/B", class)]);
        let tree = InputBuilder::new()
            .add(MappingInput::from_bytes("input.jar", jar).seed_namespace("official"))
            .build()
            .unwrap();
        assert_eq!(tree.src_namespace(), "official");
        let class = tree.get_class("a/B").unwrap();
        assert!(class.get_method("m", Some("()V")).is_some());
    }

    #[test]
    fn mixed_archives_split_and_order_entries() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        use std::io::Write;
        // Declared csv-first; the tsrg entry must still be ingested first
        writer
            .start_file("methods.csv", zip::write::FileOptions::default())
            .unwrap();
        writer
            .write_all(b"searge,name,side,desc\nfunc_1_m,doThing,2,\n")
            .unwrap();
        writer
            .start_file("classes.tsrg", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(TSRG.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let tree = InputBuilder::new()
            .add(
                MappingInput::from_bytes("bundle.zip", bytes)
                    .rename("target", "searge")
                    .lookup_namespace("searge"),
            )
            .build()
            .unwrap();
        let class = tree.get_class("a/b/C").unwrap();
        let method = class.get_method("m", Some("()V")).unwrap();
        assert_eq!(method.name(tree.namespace_id("mcp")), Some("doThing"));
    }

    #[test]
    fn reader_inputs_are_spooled() {
        let tree = InputBuilder::new()
            .add(MappingInput::from_reader(
                "streamed.tsrg",
                Cursor::new(TSRG.as_bytes().to_vec()),
            ))
            .build()
            .unwrap();
        assert!(tree.get_class("a/b/C").is_some());
    }

    #[test]
    fn packages_csv_reprocesses_the_tree() {
        let tsrg = "a net/minecraft/src/Thing\n\tf count\n";
        let packages = "class,package\nThing,net/minecraft/entity\n";
        let tree = InputBuilder::new()
            .add(MappingInput::from_text("classes.tsrg", tsrg))
            .add(MappingInput::from_text("packages.csv", packages))
            .build()
            .unwrap();
        let class = tree.get_class("a").unwrap();
        assert_eq!(class.name(0), Some("net/minecraft/entity/Thing"));
    }

    #[test]
    fn source_switch_rekeys_foreign_documents() {
        // Tree keyed by official; the second document's axis is searge but
        // it carries official as a destination column
        let tsrg2 = "tsrg2 searge official\n\
                     net/srg/C_1 a/b/C\n\
                     \tfunc_1_m ()V m\n";
        let tree = InputBuilder::new()
            .add(
                MappingInput::from_text("base.tiny", TINY),
            )
            .add(MappingInput::from_text("srg.tsrg", tsrg2))
            .build()
            .unwrap();
        assert_eq!(tree.src_namespace(), "official");
        let class = tree.get_class("a/b/C").unwrap();
        assert_eq!(class.name(tree.namespace_id("searge")), Some("net/srg/C_1"));
    }

    #[test]
    fn undetectable_input_fails() {
        let err = InputBuilder::new()
            .add(MappingInput::from_text("junk.txt", "complete and utter nonsense here\n"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("junk.txt"));
    }
}
