//! Precomputed hierarchical clusterings of ligands by their structural
//! interaction fingerprints (SIFts), one binary tree per UniProt accession.
//!
//! Internal nodes carry negative positions and leaves non-negative ones. The
//! sign is decoded into [`ChildRef`] when a row is read; everything past the
//! row decoder works with the tagged variant. Ancestors, descendants and leaves
//! are single recursive CTEs evaluated by the store.

use std::collections::HashMap;

use rusqlite::Row;
use rusqlite::types::{Type, Value};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::ChildRef;
use crate::error::CredoError;
use crate::ligand::Ligand;
use crate::query::{AdaptorOptions, Column, Entity, Predicate, Query, QueryBuilder};
use crate::store::Database;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiftNode {
    pub ligand_uniprot_sift_node_id: i64,
    pub uniprot: String,
    pub node: i64,
    pub left: Option<ChildRef>,
    pub right: Option<ChildRef>,
    pub size: i64,
    pub distance: f64,
    pub is_root: bool,
}

impl SiftNode {
    pub fn is_leaf(&self) -> bool {
        self.node >= 0
    }

    pub fn child_refs(&self) -> Option<(ChildRef, ChildRef)> {
        match (self.left, self.right) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiftNodeColumn {
    Id,
    Uniprot,
    Node,
    Links,
    Rechts,
    Size,
    Distance,
    IsRoot,
}

impl Column for SiftNodeColumn {
    fn name(self) -> &'static str {
        match self {
            SiftNodeColumn::Id => "ligand_uniprot_sift_node_id",
            SiftNodeColumn::Uniprot => "uniprot",
            SiftNodeColumn::Node => "node",
            SiftNodeColumn::Links => "links",
            SiftNodeColumn::Rechts => "rechts",
            SiftNodeColumn::Size => "size",
            SiftNodeColumn::Distance => "distance",
            SiftNodeColumn::IsRoot => "is_root",
        }
    }
}

impl Entity for SiftNode {
    type Column = SiftNodeColumn;

    const TABLE: &'static str = "ligand_uniprot_sift_nodes";
    const PRIMARY_KEY: SiftNodeColumn = SiftNodeColumn::Id;
    const COLUMNS: &'static [SiftNodeColumn] = &[
        SiftNodeColumn::Id,
        SiftNodeColumn::Uniprot,
        SiftNodeColumn::Node,
        SiftNodeColumn::Links,
        SiftNodeColumn::Rechts,
        SiftNodeColumn::Size,
        SiftNodeColumn::Distance,
        SiftNodeColumn::IsRoot,
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let links: Option<i64> = row.get(3)?;
        let rechts: Option<i64> = row.get(4)?;
        Ok(Self {
            ligand_uniprot_sift_node_id: row.get(0)?,
            uniprot: row.get(1)?,
            node: row.get(2)?,
            left: links.map(ChildRef::from_stored),
            right: rechts.map(ChildRef::from_stored),
            size: row.get(5)?,
            distance: row.get(6)?,
            is_root: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiftNodeProperty {
    pub uniprot: String,
    pub node: i64,
    pub label: Option<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiftNodePropertyColumn {
    Uniprot,
    Node,
    Label,
    Data,
}

impl Column for SiftNodePropertyColumn {
    fn name(self) -> &'static str {
        match self {
            SiftNodePropertyColumn::Uniprot => "uniprot",
            SiftNodePropertyColumn::Node => "node",
            SiftNodePropertyColumn::Label => "label",
            SiftNodePropertyColumn::Data => "data",
        }
    }
}

impl Entity for SiftNodeProperty {
    type Column = SiftNodePropertyColumn;

    const TABLE: &'static str = "ligand_uniprot_sift_node_properties";
    const PRIMARY_KEY: SiftNodePropertyColumn = SiftNodePropertyColumn::Node;
    const COLUMNS: &'static [SiftNodePropertyColumn] = &[
        SiftNodePropertyColumn::Uniprot,
        SiftNodePropertyColumn::Node,
        SiftNodePropertyColumn::Label,
        SiftNodePropertyColumn::Data,
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(3)?;
        let data = serde_json::from_str(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err))
        })?;
        Ok(Self {
            uniprot: row.get(0)?,
            node: row.get(1)?,
            label: row.get(2)?,
            data,
        })
    }
}

/// A resolved child of an internal node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Child {
    Internal(SiftNode),
    Leaf(Ligand),
}

// Both walks use set semantics: a row already in `walk` is never added
// again, so a corrupted tree still reaches a fixpoint.
const DESCENDANTS_CTE: &str = "
WITH RECURSIVE walk(id, uniprot, node, links, rechts, seed) AS (
    SELECT ligand_uniprot_sift_node_id, uniprot, node, links, rechts, 1
    FROM ligand_uniprot_sift_nodes
    WHERE ligand_uniprot_sift_node_id = ?
    UNION
    SELECT n.ligand_uniprot_sift_node_id, n.uniprot, n.node, n.links, n.rechts, 0
    FROM walk AS w
    JOIN ligand_uniprot_sift_nodes AS n
      ON n.uniprot = w.uniprot AND (n.node = w.links OR n.node = w.rechts)
    WHERE n.node < 0
)";

const ANCESTORS_CTE: &str = "
WITH RECURSIVE walk(id, uniprot, node, links, rechts, is_root, seed) AS (
    SELECT ligand_uniprot_sift_node_id, uniprot, node, links, rechts, is_root, 1
    FROM ligand_uniprot_sift_nodes
    WHERE ligand_uniprot_sift_node_id = ?
    UNION
    SELECT n.ligand_uniprot_sift_node_id, n.uniprot, n.node, n.links, n.rechts, n.is_root, 0
    FROM walk AS w
    JOIN ligand_uniprot_sift_nodes AS n
      ON n.uniprot = w.uniprot AND (n.links = w.node OR n.rechts = w.node)
    WHERE n.node < 0 AND w.is_root = 0
)";

const DESCENDANT_SCOPE: &str = "t.ligand_uniprot_sift_node_id IN (SELECT id FROM walk)";

const ANCESTOR_SCOPE: &str = "t.ligand_uniprot_sift_node_id IN (SELECT id FROM walk WHERE seed = 0)";

const LEAF_SCOPE: &str = "
t.ligand_id IN (
    SELECT ntl.ligand_id
    FROM walk AS w
    JOIN ligand_uniprot_sift_node_to_ligand AS ntl
      ON ntl.uniprot = w.uniprot AND (ntl.node = w.links OR ntl.node = w.rechts)
    WHERE ntl.node >= 0
)";

// A tree over n reached nodes has n - 1 parent links among them. Any more
// and some node was entered twice.
const WALK_GUARD: &str = ",
reached AS (SELECT DISTINCT id, node, links, rechts FROM walk)
SELECT
    (SELECT uniprot FROM walk WHERE seed = 1),
    (SELECT node FROM walk WHERE seed = 1),
    (SELECT COUNT(*) FROM reached),
    (SELECT COUNT(*) FROM reached AS p JOIN reached AS c ON c.node = p.links)
      + (SELECT COUNT(*) FROM reached AS p JOIN reached AS c ON c.node = p.rechts)";

const CONTAINING_LIGAND_SCOPE: &str = "
EXISTS (
    SELECT 1
    FROM ligand_uniprot_sift_node_to_ligand AS ntl
    WHERE ntl.ligand_id = ?
      AND ntl.node >= 0
      AND ntl.uniprot = t.uniprot
      AND (t.links = ntl.node OR t.rechts = ntl.node)
)";

const LEAF_LIGAND_SCOPE: &str = "
t.ligand_id IN (
    SELECT ligand_id
    FROM ligand_uniprot_sift_node_to_ligand
    WHERE uniprot = ? AND node = ?
)";

const LEAF_LIGANDS_SQL: &str = "
SELECT node, ligand_id
FROM ligand_uniprot_sift_node_to_ligand
WHERE uniprot = ? AND node >= 0";

#[derive(Debug, Clone, Copy)]
enum Walk {
    Descendants,
    Ancestors,
}

impl Walk {
    fn cte(self) -> &'static str {
        match self {
            Walk::Descendants => DESCENDANTS_CTE,
            Walk::Ancestors => ANCESTORS_CTE,
        }
    }
}

pub struct SiftNodeAdaptor<'db> {
    db: &'db Database,
    options: AdaptorOptions,
}

impl<'db> SiftNodeAdaptor<'db> {
    pub fn new(db: &'db Database, options: AdaptorOptions) -> Self {
        Self { db, options }
    }

    pub fn with_defaults(db: &'db Database) -> Self {
        Self::new(db, db.adaptor_options())
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    fn builder<E: Entity>(&self, query: Query<E>) -> QueryBuilder<'db, E> {
        QueryBuilder::new(self.db, query, &self.options)
    }

    fn single(&self, query: Query<SiftNode>) -> Result<Option<SiftNode>, CredoError> {
        self.db
            .fetch_all::<SiftNode>(&query.select_sql())
            .map(|nodes| nodes.into_iter().next())
    }

    #[instrument(skip(self))]
    pub fn get_by_id(&self, id: i64) -> Result<Option<SiftNode>, CredoError> {
        self.single(Query::table().filter(Predicate::eq(SiftNodeColumn::Id, id)))
    }

    #[instrument(skip(self))]
    pub fn get_root_by_uniprot(&self, uniprot: &str) -> Result<Option<SiftNode>, CredoError> {
        self.single(
            Query::table()
                .filter(Predicate::eq(SiftNodeColumn::Uniprot, uniprot.to_string()))
                .filter(Predicate::eq(SiftNodeColumn::IsRoot, true)),
        )
    }

    #[instrument(skip(self))]
    pub fn get_by_uniprot_node(
        &self,
        uniprot: &str,
        node: i64,
    ) -> Result<Option<SiftNode>, CredoError> {
        self.single(
            Query::table()
                .filter(Predicate::eq(SiftNodeColumn::Uniprot, uniprot.to_string()))
                .filter(Predicate::eq(SiftNodeColumn::Node, node)),
        )
    }

    /// The internal node holding the leaf of `ligand_id` as a direct child.
    #[instrument(skip(self))]
    pub fn get_node_containing_ligand(
        &self,
        ligand_id: i64,
    ) -> Result<Option<SiftNode>, CredoError> {
        let query = Query::<SiftNode>::table()
            .scoped(CONTAINING_LIGAND_SCOPE, vec![Value::Integer(ligand_id)])
            .filter(Predicate::lt(SiftNodeColumn::Node, 0i64));
        let mut nodes = self.db.fetch_all::<SiftNode>(&query.select_sql())?;
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            _ => Err(CredoError::AmbiguousLeaf { ligand_id }),
        }
    }

    pub fn by_uniprot(&self, uniprot: &str) -> QueryBuilder<'db, SiftNode> {
        self.builder(
            Query::table().filter(Predicate::eq(SiftNodeColumn::Uniprot, uniprot.to_string())),
        )
    }

    #[instrument(skip(self))]
    pub fn descendants(&self, id: i64) -> Result<QueryBuilder<'db, SiftNode>, CredoError> {
        let params = self.walk_params(Walk::Descendants, id)?;
        Ok(self.builder(
            Query::with_recursive(DESCENDANTS_CTE, params).scoped(DESCENDANT_SCOPE, Vec::new()),
        ))
    }

    #[instrument(skip(self))]
    pub fn ancestors(&self, id: i64) -> Result<QueryBuilder<'db, SiftNode>, CredoError> {
        let params = self.walk_params(Walk::Ancestors, id)?;
        Ok(self.builder(
            Query::with_recursive(ANCESTORS_CTE, params).scoped(ANCESTOR_SCOPE, Vec::new()),
        ))
    }

    #[instrument(skip(self))]
    pub fn leaves(&self, id: i64) -> Result<QueryBuilder<'db, Ligand>, CredoError> {
        let params = self.walk_params(Walk::Descendants, id)?;
        Ok(self.builder(
            Query::<Ligand>::with_recursive(DESCENDANTS_CTE, params).scoped(LEAF_SCOPE, Vec::new()),
        ))
    }

    pub fn parents(&self, node: &SiftNode) -> Result<QueryBuilder<'db, SiftNode>, CredoError> {
        self.ancestors(node.ligand_uniprot_sift_node_id)
    }

    pub fn subtree(&self, node: &SiftNode) -> Result<QueryBuilder<'db, SiftNode>, CredoError> {
        self.descendants(node.ligand_uniprot_sift_node_id)
    }

    pub fn leaves_of(&self, node: &SiftNode) -> Result<QueryBuilder<'db, Ligand>, CredoError> {
        self.leaves(node.ligand_uniprot_sift_node_id)
    }

    // Runs the walk once to check the seed exists and the reached nodes
    // still form a tree, then hands back the parameters for the CTE.
    fn walk_params(&self, walk: Walk, id: i64) -> Result<Vec<Value>, CredoError> {
        let params = vec![Value::Integer(id)];
        let sql = format!("{}{}", walk.cte().trim(), WALK_GUARD);
        let guard = self.db.rows(&sql, &params, |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let Some((Some(uniprot), Some(node), nodes, links)) = guard.into_iter().next() else {
            return Err(CredoError::not_found("SIFt node", id));
        };
        debug!(?walk, %uniprot, node, nodes, links, "walk guard");
        if links >= nodes {
            return Err(CredoError::CycleDetected { uniprot, node });
        }
        Ok(params)
    }

    pub fn left(&self, node: &SiftNode) -> Result<Child, CredoError> {
        let (left, _) = self.require_children(node)?;
        self.resolve(&node.uniprot, left)
    }

    pub fn right(&self, node: &SiftNode) -> Result<Child, CredoError> {
        let (_, right) = self.require_children(node)?;
        self.resolve(&node.uniprot, right)
    }

    pub fn children(&self, node: &SiftNode) -> Result<(Child, Child), CredoError> {
        let (left, right) = self.require_children(node)?;
        Ok((
            self.resolve(&node.uniprot, left)?,
            self.resolve(&node.uniprot, right)?,
        ))
    }

    fn require_children(&self, node: &SiftNode) -> Result<(ChildRef, ChildRef), CredoError> {
        node.child_refs().ok_or_else(|| CredoError::LeafNavigation {
            uniprot: node.uniprot.clone(),
            node: node.node,
        })
    }

    pub fn resolve(&self, uniprot: &str, child: ChildRef) -> Result<Child, CredoError> {
        match child {
            ChildRef::Internal(position) => self
                .get_by_uniprot_node(uniprot, position)?
                .map(Child::Internal)
                .ok_or_else(|| CredoError::not_found("SIFt node", format!("{uniprot}/{position}"))),
            ChildRef::Leaf(position) => self
                .leaf_ligand(uniprot, position)?
                .map(Child::Leaf)
                .ok_or_else(|| {
                    CredoError::not_found("clustered ligand", format!("{uniprot}/{position}"))
                }),
        }
    }

    fn leaf_ligand(&self, uniprot: &str, position: i64) -> Result<Option<Ligand>, CredoError> {
        let query = Query::<Ligand>::table().scoped(
            LEAF_LIGAND_SCOPE,
            vec![Value::Text(uniprot.to_string()), Value::Integer(position)],
        );
        self.db
            .fetch_all::<Ligand>(&query.select_sql())
            .map(|ligands| ligands.into_iter().next())
    }

    pub fn properties(&self, node: &SiftNode) -> Result<Option<SiftNodeProperty>, CredoError> {
        let query = Query::<SiftNodeProperty>::table()
            .filter(Predicate::eq(
                SiftNodePropertyColumn::Uniprot,
                node.uniprot.clone(),
            ))
            .filter(Predicate::eq(SiftNodePropertyColumn::Node, node.node));
        self.db
            .fetch_all::<SiftNodeProperty>(&query.select_sql())
            .map(|rows| rows.into_iter().next())
    }

    /// Leaf position to ligand id for every leaf of one tree.
    pub fn leaf_ligands(&self, uniprot: &str) -> Result<HashMap<i64, i64>, CredoError> {
        let pairs = self.db.rows(
            LEAF_LIGANDS_SQL,
            &[Value::Text(uniprot.to_string())],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        Ok(pairs.into_iter().collect())
    }

    /// Every internal node of one tree, keyed by position.
    pub fn internal_nodes(&self, uniprot: &str) -> Result<HashMap<i64, SiftNode>, CredoError> {
        let nodes = self
            .by_uniprot(uniprot)
            .filter(Predicate::lt(SiftNodeColumn::Node, 0i64))
            .list()?;
        Ok(nodes.into_iter().map(|node| (node.node, node)).collect())
    }
}
