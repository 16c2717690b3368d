//! Table layout of the CREDO subset read by this crate.
//!
//! The store is populated by the offline clustering pipeline; at runtime it is
//! only read. The DDL is exposed so loaders and test fixtures build the same
//! layout the queries expect.

pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS ligand_uniprot_sift_nodes (
    ligand_uniprot_sift_node_id INTEGER PRIMARY KEY,
    uniprot TEXT NOT NULL,
    node INTEGER NOT NULL,
    links INTEGER,
    rechts INTEGER,
    size INTEGER NOT NULL DEFAULT 1,
    distance REAL NOT NULL DEFAULT 0,
    is_root INTEGER NOT NULL DEFAULT 0,
    UNIQUE (uniprot, node)
);
CREATE INDEX IF NOT EXISTS idx_sift_nodes_links ON ligand_uniprot_sift_nodes (uniprot, links);
CREATE INDEX IF NOT EXISTS idx_sift_nodes_rechts ON ligand_uniprot_sift_nodes (uniprot, rechts);

CREATE TABLE IF NOT EXISTS ligand_uniprot_sift_node_properties (
    uniprot TEXT NOT NULL,
    node INTEGER NOT NULL,
    label TEXT,
    data TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (uniprot, node)
);

CREATE TABLE IF NOT EXISTS ligand_uniprot_sift_node_to_ligand (
    uniprot TEXT NOT NULL,
    node INTEGER NOT NULL,
    ligand_id INTEGER NOT NULL,
    PRIMARY KEY (uniprot, node)
);
CREATE INDEX IF NOT EXISTS idx_sift_node_to_ligand ON ligand_uniprot_sift_node_to_ligand (ligand_id);

CREATE TABLE IF NOT EXISTS ligands (
    ligand_id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    ligand_name TEXT NOT NULL,
    is_drug_target_int INTEGER NOT NULL DEFAULT 0,
    is_enzyme_cmpd INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS binding_sites (
    ligand_id INTEGER PRIMARY KEY,
    has_mut_res INTEGER NOT NULL DEFAULT 0,
    has_mod_res INTEGER NOT NULL DEFAULT 0,
    has_non_std_res INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ligand_effs (
    ligand_eff_id INTEGER PRIMARY KEY,
    ligand_id INTEGER NOT NULL,
    activity_type TEXT,
    p REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ligand_effs_ligand ON ligand_effs (ligand_id);

CREATE TABLE IF NOT EXISTS chem_comps (
    het_id TEXT PRIMARY KEY,
    is_approved_drug INTEGER NOT NULL DEFAULT 0,
    is_nucleotide INTEGER NOT NULL DEFAULT 0,
    is_drug INTEGER NOT NULL DEFAULT 0,
    is_lead INTEGER NOT NULL DEFAULT 0,
    is_drug_like INTEGER NOT NULL DEFAULT 0,
    is_solvent INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS ligand_components (
    ligand_component_id INTEGER PRIMARY KEY,
    ligand_id INTEGER NOT NULL,
    het_id TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ligand_components_ligand ON ligand_components (ligand_id);
";
