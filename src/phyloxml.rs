//! PhyloXML export of a SIFt cluster tree.
//!
//! The document carries a `render` block (chart channels and a named style
//! palette) read by the client-side tree viewer, followed by the clades. Every
//! clade's `branch_length` is the merge distance of its parent; leaves are
//! decorated with drug class, binding-site status and normalised potency.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, instrument};

use crate::config::DEFAULT_BUFFER_RADIUS;
use crate::domain::ChildRef;
use crate::error::CredoError;
use crate::ligand::{BindingSite, ChemComp, Eff, LigandCatalog, LigandProfile};
use crate::sift::{SiftNode, SiftNodeAdaptor};

const NAME_LENGTH: usize = 17;

const CHARTS: &[(&str, &[(&str, &str)])] = &[
    (
        "interaction",
        &[
            ("type", "binary"),
            ("thickness", "10"),
            ("isInternal", "true"),
            ("bufferInner", "0"),
        ],
    ),
    ("bindingsite", &[("type", "binary"), ("thickness", "7.5")]),
    (
        "activity",
        &[("type", "bar"), ("fill", "#000"), ("width", "0.4")],
    ),
];

const STYLES: &[(&str, &[(&str, &str)])] = &[
    ("drugtarget", &[("fill", "#75BBE4"), ("stroke", "#DDD")]),
    ("enzymecmpd", &[("fill", "#DEF1CC"), ("stroke", "#DDD")]),
    ("barChart", &[("fill", "#999"), ("stroke-width", "0")]),
    ("appdrug", &[("fill", "#3296CB")]),
    ("drug", &[("fill", "#75BBE4")]),
    ("lead", &[("fill", "#A9D6F0")]),
    ("druglike", &[("fill", "#CDE9F4")]),
    ("solvent", &[("fill", "#FFFACD")]),
    ("heteropeptide", &[("fill", "#FBD5A5")]),
    ("nucleotide", &[("fill", "#DEF1CC")]),
    ("mutated", &[("fill", "#E75559"), ("stroke", "#DDD")]),
    ("modified", &[("fill", "#F98892"), ("stroke", "#DDD")]),
    ("nonstd", &[("fill", "#FDCDD7"), ("stroke", "#DDD")]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub buffer_radius: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            buffer_radius: DEFAULT_BUFFER_RADIUS,
        }
    }
}

/// Background style of a leaf name, decided by its chemical components.
///
/// A single component takes the first flag in priority order; anything other
/// than exactly one component is a heteropeptide.
pub fn name_style(chem_comps: &[ChemComp]) -> Option<&'static str> {
    match chem_comps {
        [chem_comp] => {
            let flags = [
                (chem_comp.is_approved_drug, "appdrug"),
                (chem_comp.is_nucleotide, "nucleotide"),
                (chem_comp.is_drug, "drug"),
                (chem_comp.is_lead, "lead"),
                (chem_comp.is_drug_like, "druglike"),
                (chem_comp.is_solvent, "solvent"),
            ];
            flags
                .into_iter()
                .find_map(|(flag, style)| flag.then_some(style))
        }
        _ => Some("heteropeptide"),
    }
}

pub fn interaction_style(profile: &LigandProfile) -> &'static str {
    if profile.ligand.is_drug_target_int {
        "drugtarget"
    } else if profile.ligand.is_enzyme_cmpd {
        "enzymecmpd"
    } else {
        ""
    }
}

pub fn binding_site_style(binding_site: Option<&BindingSite>) -> &'static str {
    match binding_site {
        Some(site) if site.has_mut_res => "mutated",
        Some(site) if site.has_mod_res => "modified",
        Some(site) if site.has_non_std_res => "nonstd",
        _ => "",
    }
}

/// Highest potency rescaled from p 3..9 onto 0..100. Values outside that
/// range are not clamped.
pub fn activity(effs: &[Eff]) -> String {
    effs.iter()
        .map(|eff| (eff.p - 3.0) / 6.0 * 100.0)
        .reduce(f64::max)
        .map_or_else(|| "0".to_string(), |value| format!("{value:?}"))
}

fn leaf_name(path: &str) -> String {
    path.chars().take(NAME_LENGTH).collect()
}

struct XmlSink {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlSink {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), CredoError> {
        self.writer
            .write_event(event)
            .map_err(|err| CredoError::Xml(err.to_string()))
    }

    fn declaration(&mut self) -> Result<(), CredoError> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), CredoError> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.event(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), CredoError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), CredoError> {
        let mut start = BytesStart::new(name);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.event(Event::Empty(start))
    }

    // Empty text is written as a self-closing element.
    fn text(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> Result<(), CredoError> {
        if text.is_empty() {
            return self.empty(name, attributes);
        }
        self.open(name, attributes)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String, CredoError> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|err| CredoError::Xml(err.to_string()))
    }
}

/// Walks one cluster tree and writes it as PhyloXML.
pub struct PhyloXmlRenderer<'a, C: LigandCatalog> {
    tree: &'a SiftNodeAdaptor<'a>,
    catalog: &'a C,
    options: RenderOptions,
}

struct Walk<'t> {
    uniprot: &'t str,
    nodes: HashMap<i64, SiftNode>,
    leaves: HashMap<i64, i64>,
    visited: HashSet<i64>,
    max_depth: u32,
}

impl<'a, C: LigandCatalog> PhyloXmlRenderer<'a, C> {
    pub fn new(tree: &'a SiftNodeAdaptor<'a>, catalog: &'a C) -> Self {
        let options = RenderOptions {
            buffer_radius: tree.database().config().buffer_radius,
        };
        Self {
            tree,
            catalog,
            options,
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    #[instrument(skip(self))]
    pub fn render_uniprot(&self, uniprot: &str) -> Result<String, CredoError> {
        let root = self
            .tree
            .get_root_by_uniprot(uniprot)?
            .ok_or_else(|| CredoError::not_found("SIFt tree root", uniprot))?;
        self.render(&root)
    }

    /// Renders the subtree below `root`; `root` need not be the tree root.
    #[instrument(skip_all, fields(uniprot = %root.uniprot, node = root.node))]
    pub fn render(&self, root: &SiftNode) -> Result<String, CredoError> {
        if root.child_refs().is_none() {
            return Err(CredoError::LeafNavigation {
                uniprot: root.uniprot.clone(),
                node: root.node,
            });
        }

        let mut walk = Walk {
            uniprot: &root.uniprot,
            nodes: self.tree.internal_nodes(&root.uniprot)?,
            leaves: self.tree.leaf_ligands(&root.uniprot)?,
            visited: HashSet::new(),
            max_depth: self.tree.database().max_depth(),
        };
        debug!(
            internal = walk.nodes.len(),
            leaves = walk.leaves.len(),
            "loaded cluster tree"
        );

        let mut sink = XmlSink::new();
        sink.declaration()?;
        sink.open("phyloxml", &[])?;
        sink.open("phylogeny", &[("rooted", "true")])?;
        self.write_render(&mut sink)?;

        sink.open("clade", &[])?;
        self.write_internal(&mut sink, &mut walk, root, 0.0, 0)?;
        sink.close("clade")?;

        sink.close("phylogeny")?;
        sink.close("phyloxml")?;
        sink.finish()
    }

    fn write_render(&self, sink: &mut XmlSink) -> Result<(), CredoError> {
        sink.open("render", &[])?;

        sink.open("parameters", &[])?;
        sink.open("circular", &[])?;
        sink.text("bufferRadius", &[], &format!("{:?}", self.options.buffer_radius))?;
        sink.close("circular")?;
        sink.close("parameters")?;

        sink.open("charts", &[])?;
        for (name, attributes) in CHARTS {
            sink.empty(name, attributes)?;
        }
        sink.close("charts")?;

        sink.open("styles", &[])?;
        for (name, attributes) in STYLES {
            sink.empty(name, attributes)?;
        }
        sink.close("styles")?;

        sink.close("render")
    }

    fn write_internal(
        &self,
        sink: &mut XmlSink,
        walk: &mut Walk<'_>,
        node: &SiftNode,
        inherited: f64,
        depth: u32,
    ) -> Result<(), CredoError> {
        if depth > walk.max_depth {
            let message = format!("nesting exceeds {} levels", walk.max_depth);
            return Err(render_failure(walk, node.node, &message));
        }
        if !walk.visited.insert(node.node) {
            return Err(render_failure(walk, node.node, "node reached twice"));
        }
        let (left, right) = node
            .child_refs()
            .ok_or_else(|| render_failure(walk, node.node, "internal node without children"))?;

        sink.open("clade", &[])?;
        sink.text("branch_length", &[], &format!("{inherited:.2}"))?;
        for child in [left, right] {
            match child {
                ChildRef::Internal(position) => {
                    let child_node = walk.nodes.get(&position).cloned().ok_or_else(|| {
                        render_failure(walk, position, "child node does not resolve")
                    })?;
                    self.write_internal(sink, walk, &child_node, node.distance, depth + 1)?;
                }
                ChildRef::Leaf(position) => {
                    let ligand_id = walk.leaves.get(&position).copied().ok_or_else(|| {
                        render_failure(walk, position, "leaf has no ligand")
                    })?;
                    let profile = self.catalog.profile(ligand_id).map_err(|err| match err {
                        CredoError::NotFound { .. } => {
                            render_failure(walk, position, "leaf ligand does not resolve")
                        }
                        other => other,
                    })?;
                    write_leaf(sink, &profile, node.distance)?;
                }
            }
        }
        sink.close("clade")
    }
}

fn render_failure(walk: &Walk<'_>, node: i64, message: &str) -> CredoError {
    CredoError::RenderFailure {
        uniprot: walk.uniprot.to_string(),
        node,
        message: message.to_string(),
    }
}

fn write_leaf(sink: &mut XmlSink, profile: &LigandProfile, distance: f64) -> Result<(), CredoError> {
    let name = leaf_name(&profile.ligand.path);
    let uri = format!("/ligands/{}", profile.ligand.ligand_id);

    sink.open("clade", &[])?;
    match name_style(&profile.chem_comps) {
        Some(style) => sink.text("name", &[("bgStyle", style)], &name)?,
        None => sink.text("name", &[], &name)?,
    }
    sink.text("branch_length", &[], &format!("{distance:.2}"))?;

    sink.open("annotation", &[])?;
    sink.text("uri", &[], &uri)?;
    sink.close("annotation")?;

    sink.open("chart", &[])?;
    sink.text("interaction", &[], interaction_style(profile))?;
    sink.text(
        "bindingsite",
        &[],
        binding_site_style(profile.binding_site.as_ref()),
    )?;
    sink.text("activity", &[], &activity(&profile.effs))?;
    sink.close("chart")?;

    sink.close("clade")
}
