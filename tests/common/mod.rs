#![allow(dead_code)]

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rusqlite::{Connection, params};

use credoscript::config::ResolvedConfig;
use credoscript::schema::SCHEMA_SQL;
use credoscript::store::Database;

pub const ABL1: &str = "P00520";
pub const SRC: &str = "P12931";

pub fn empty_database() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.connection().execute_batch(SCHEMA_SQL).unwrap();
    db
}

pub fn empty_database_with(config: ResolvedConfig) -> Database {
    let db = Database::open_in_memory_with(config).unwrap();
    db.connection().execute_batch(SCHEMA_SQL).unwrap();
    db
}

pub fn insert_internal(
    conn: &Connection,
    id: i64,
    uniprot: &str,
    node: i64,
    links: i64,
    rechts: i64,
    size: i64,
    distance: f64,
    is_root: bool,
) {
    conn.execute(
        "INSERT INTO ligand_uniprot_sift_nodes
            (ligand_uniprot_sift_node_id, uniprot, node, links, rechts, size, distance, is_root)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, uniprot, node, links, rechts, size, distance, is_root],
    )
    .unwrap();
}

pub fn insert_leaf(conn: &Connection, id: i64, uniprot: &str, node: i64, ligand_id: i64) {
    conn.execute(
        "INSERT INTO ligand_uniprot_sift_nodes
            (ligand_uniprot_sift_node_id, uniprot, node, links, rechts, size, distance, is_root)
         VALUES (?1, ?2, ?3, NULL, NULL, 1, 0, 0)",
        params![id, uniprot, node],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO ligand_uniprot_sift_node_to_ligand (uniprot, node, ligand_id)
         VALUES (?1, ?2, ?3)",
        params![uniprot, node, ligand_id],
    )
    .unwrap();
}

pub fn insert_ligand(
    conn: &Connection,
    ligand_id: i64,
    path: &str,
    is_drug_target_int: bool,
    is_enzyme_cmpd: bool,
) {
    let ligand_name = path.rsplit('`').next().unwrap_or(path);
    conn.execute(
        "INSERT INTO ligands (ligand_id, path, ligand_name, is_drug_target_int, is_enzyme_cmpd)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ligand_id, path, ligand_name, is_drug_target_int, is_enzyme_cmpd],
    )
    .unwrap();
}

pub fn insert_eff(conn: &Connection, ligand_id: i64, p: f64) {
    conn.execute(
        "INSERT INTO ligand_effs (ligand_id, activity_type, p) VALUES (?1, 'Kd', ?2)",
        params![ligand_id, p],
    )
    .unwrap();
}

pub fn insert_binding_site(conn: &Connection, ligand_id: i64, mutated: bool, modified: bool) {
    conn.execute(
        "INSERT INTO binding_sites (ligand_id, has_mut_res, has_mod_res, has_non_std_res)
         VALUES (?1, ?2, ?3, 0)",
        params![ligand_id, mutated, modified],
    )
    .unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Flags {
    pub approved_drug: bool,
    pub nucleotide: bool,
    pub drug: bool,
    pub lead: bool,
    pub drug_like: bool,
    pub solvent: bool,
}

pub fn insert_chem_comp(conn: &Connection, het_id: &str, flags: Flags) {
    conn.execute(
        "INSERT OR IGNORE INTO chem_comps
            (het_id, is_approved_drug, is_nucleotide, is_drug, is_lead, is_drug_like, is_solvent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            het_id,
            flags.approved_drug,
            flags.nucleotide,
            flags.drug,
            flags.lead,
            flags.drug_like,
            flags.solvent
        ],
    )
    .unwrap();
}

pub fn insert_component(conn: &Connection, ligand_id: i64, het_id: &str) {
    conn.execute(
        "INSERT INTO ligand_components (ligand_id, het_id) VALUES (?1, ?2)",
        params![ligand_id, het_id],
    )
    .unwrap();
}

/// The three-leaf ABL1 tree plus a two-leaf SRC tree that reuses the same
/// node positions.
///
/// ```text
/// P00520:  -1 (2.0) ── -2 (1.0) ── 1 → 101
///           │           └───────── 2 → 102
///           └───────── 0 → 100
/// P12931:  -1 (0.5) ── 0 → 200, 1 → 201
/// ```
pub fn s1_database() -> Database {
    let db = empty_database();
    let conn = db.connection();

    insert_internal(conn, 1, ABL1, -1, -2, 0, 3, 2.0, true);
    insert_internal(conn, 2, ABL1, -2, 1, 2, 2, 1.0, false);
    insert_leaf(conn, 3, ABL1, 0, 100);
    insert_leaf(conn, 4, ABL1, 1, 101);
    insert_leaf(conn, 5, ABL1, 2, 102);

    insert_internal(conn, 10, SRC, -1, 0, 1, 2, 0.5, true);
    insert_leaf(conn, 11, SRC, 0, 200);
    insert_leaf(conn, 12, SRC, 1, 201);

    insert_ligand(conn, 100, "2HYY/1/A/STI`1001", true, false);
    insert_chem_comp(
        conn,
        "STI",
        Flags {
            approved_drug: true,
            drug: true,
            ..Flags::default()
        },
    );
    insert_component(conn, 100, "STI");
    insert_eff(conn, 100, 6.0);

    insert_ligand(conn, 101, "1OPJ/1/B/PTR-ALA`1200", false, true);
    insert_chem_comp(
        conn,
        "PTR",
        Flags {
            approved_drug: true,
            ..Flags::default()
        },
    );
    insert_chem_comp(
        conn,
        "ALA",
        Flags {
            approved_drug: true,
            ..Flags::default()
        },
    );
    insert_component(conn, 101, "PTR");
    insert_component(conn, 101, "ALA");
    insert_eff(conn, 101, 9.0);
    insert_eff(conn, 101, 3.0);
    insert_binding_site(conn, 101, true, true);

    insert_ligand(conn, 102, "3CS9/1/A/ACP`1300", false, false);
    insert_chem_comp(conn, "ACP", Flags::default());
    insert_component(conn, 102, "ACP");

    insert_ligand(conn, 200, "4MXO/1/A/DAS`601", true, false);
    insert_ligand(conn, 201, "2SRC/1/A/ANP`600", false, false);

    // Known to CREDO but never clustered.
    insert_ligand(conn, 300, "1M52/1/A/P17`1001", false, false);

    db
}

#[derive(Debug, Clone)]
pub struct GeneratedNode {
    pub node: i64,
    pub links: i64,
    pub rechts: i64,
    pub size: i64,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct GeneratedTree {
    pub uniprot: String,
    pub root: i64,
    pub internal: HashMap<i64, GeneratedNode>,
    pub ligands: HashMap<i64, i64>,
}

/// Builds a random agglomerative tree over `leaf_count` leaves. Each pick
/// chooses which two remaining clusters merge next.
pub fn insert_generated_tree(
    conn: &Connection,
    uniprot: &str,
    leaf_count: usize,
    picks: &[(u32, u32)],
    id_base: i64,
) -> GeneratedTree {
    let mut next_id = id_base;
    let mut ligands = HashMap::new();
    let mut clusters: Vec<(i64, i64, f64)> = Vec::new();

    for leaf in 0..leaf_count as i64 {
        let ligand_id = id_base + leaf;
        insert_ligand(conn, ligand_id, &format!("{uniprot}/1/A/L{leaf:02}`{leaf}"), false, false);
        insert_leaf(conn, next_id, uniprot, leaf, ligand_id);
        next_id += 1;
        ligands.insert(leaf, ligand_id);
        clusters.push((leaf, 1, 0.0));
    }

    let mut internal = HashMap::new();
    let mut position = -1i64;
    for step in 0..leaf_count.saturating_sub(1) {
        let (a, b) = picks.get(step).copied().unwrap_or((0, 1));
        let len = clusters.len();
        let first = a as usize % len;
        let mut second = b as usize % (len - 1);
        if second >= first {
            second += 1;
        }
        let (high, low) = if first > second {
            (first, second)
        } else {
            (second, first)
        };
        let right = clusters.remove(high);
        let left = clusters.remove(low);
        let size = left.1 + right.1;
        let distance = left.2.max(right.2) + 1.0;
        let is_root = clusters.is_empty();
        insert_internal(
            conn, next_id, uniprot, position, left.0, right.0, size, distance, is_root,
        );
        next_id += 1;
        internal.insert(
            position,
            GeneratedNode {
                node: position,
                links: left.0,
                rechts: right.0,
                size,
                distance,
            },
        );
        clusters.push((position, size, distance));
        position -= 1;
    }

    GeneratedTree {
        uniprot: uniprot.to_string(),
        root: position + 1,
        internal,
        ligands,
    }
}

/// A caterpillar tree of `levels` internal nodes. Node `-k` holds `-(k + 1)`
/// on the left and leaf `k - 1` on the right, so the deepest internal node
/// sits `levels - 1` steps below the root.
pub fn insert_chain(conn: &Connection, uniprot: &str, levels: i64, id_base: i64) {
    let mut next_id = id_base;
    for leaf in 0..=levels {
        let ligand_id = id_base + leaf;
        insert_ligand(conn, ligand_id, &format!("{uniprot}/1/A/C{leaf:02}`{leaf}"), false, false);
        insert_leaf(conn, next_id, uniprot, leaf, ligand_id);
        next_id += 1;
    }
    for k in 1..=levels {
        let links = if k < levels { -(k + 1) } else { levels };
        let size = levels - k + 2;
        insert_internal(
            conn,
            next_id,
            uniprot,
            -k,
            links,
            k - 1,
            size,
            (size - 1) as f64,
            k == 1,
        );
        next_id += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn path(&self, path: &str) -> Option<&XmlNode> {
        path.split('/')
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every descendant `clade` that carries a `name`, in document order.
    pub fn leaf_clades(&self) -> Vec<&XmlNode> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a XmlNode>) {
        for child in self.children_named("clade") {
            if child.child("name").is_some() {
                out.push(child);
            } else {
                child.collect_leaves(out);
            }
        }
    }
}

fn element(start: &BytesStart<'_>) -> XmlNode {
    let attributes = start
        .attributes()
        .map(|attribute| {
            let attribute = attribute.unwrap();
            (
                String::from_utf8(attribute.key.as_ref().to_vec()).unwrap(),
                attribute.unescape_value().unwrap().into_owned(),
            )
        })
        .collect();
    XmlNode {
        name: String::from_utf8(start.name().as_ref().to_vec()).unwrap(),
        attributes,
        ..XmlNode::default()
    }
}

/// Parses a document into a small element tree rooted at a synthetic node.
pub fn parse_xml(xml: &str) -> XmlNode {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack = vec![XmlNode::default()];
    loop {
        match reader.read_event().unwrap() {
            Event::Start(start) => stack.push(element(&start)),
            Event::Empty(start) => {
                let node = element(&start);
                stack.last_mut().unwrap().children.push(node);
            }
            Event::End(_) => {
                let node = stack.pop().unwrap();
                stack.last_mut().unwrap().children.push(node);
            }
            Event::Text(text) => {
                let text = text.unescape().unwrap();
                stack.last_mut().unwrap().text.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    stack.pop().unwrap()
}
