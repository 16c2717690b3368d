use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CredoError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("ligand {ligand_id} is a leaf of more than one SIFt node")]
    AmbiguousLeaf { ligand_id: i64 },

    #[error("invalid navigation: {0}")]
    InvalidNavigation(String),

    #[error("traversal from {uniprot}/{node} reaches a node twice")]
    #[diagnostic(help("the stored tree for {uniprot} probably contains a cycle"))]
    CycleDetected { uniprot: String, node: i64 },

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("cannot render {uniprot}/{node}: {message}")]
    RenderFailure {
        uniprot: String,
        node: i64,
        message: String,
    },

    #[error("failed to write XML: {0}")]
    Xml(String),

    #[error("SIFt node {uniprot}/{node} is a leaf and has no children")]
    LeafNavigation { uniprot: String, node: i64 },

    #[error("invalid query option: {0}")]
    InvalidOption(String),

    #[error("invalid UniProt accession: {0}")]
    InvalidUniprotId(String),

    #[error("missing config file credoscript.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl CredoError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        CredoError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}
