use rusqlite::Row;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::instrument;

use crate::error::CredoError;
use crate::query::{AdaptorOptions, Column, Entity, Predicate, Query, QueryBuilder};
use crate::store::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ligand {
    pub ligand_id: i64,
    pub path: String,
    pub ligand_name: String,
    pub is_drug_target_int: bool,
    pub is_enzyme_cmpd: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LigandColumn {
    LigandId,
    Path,
    LigandName,
    IsDrugTargetInt,
    IsEnzymeCmpd,
}

impl Column for LigandColumn {
    fn name(self) -> &'static str {
        match self {
            LigandColumn::LigandId => "ligand_id",
            LigandColumn::Path => "path",
            LigandColumn::LigandName => "ligand_name",
            LigandColumn::IsDrugTargetInt => "is_drug_target_int",
            LigandColumn::IsEnzymeCmpd => "is_enzyme_cmpd",
        }
    }
}

impl Entity for Ligand {
    type Column = LigandColumn;

    const TABLE: &'static str = "ligands";
    const PRIMARY_KEY: LigandColumn = LigandColumn::LigandId;
    const COLUMNS: &'static [LigandColumn] = &[
        LigandColumn::LigandId,
        LigandColumn::Path,
        LigandColumn::LigandName,
        LigandColumn::IsDrugTargetInt,
        LigandColumn::IsEnzymeCmpd,
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            ligand_id: row.get(0)?,
            path: row.get(1)?,
            ligand_name: row.get(2)?,
            is_drug_target_int: row.get(3)?,
            is_enzyme_cmpd: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BindingSite {
    pub has_mut_res: bool,
    pub has_mod_res: bool,
    pub has_non_std_res: bool,
}

/// One potency record; `p` is on a negative-log scale (pKd, pKi, pIC50).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eff {
    pub activity_type: Option<String>,
    pub p: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChemComp {
    pub het_id: String,
    pub is_approved_drug: bool,
    pub is_nucleotide: bool,
    pub is_drug: bool,
    pub is_lead: bool,
    pub is_drug_like: bool,
    pub is_solvent: bool,
}

/// A ligand together with the attributes the PhyloXML leaves are decorated with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LigandProfile {
    pub ligand: Ligand,
    pub binding_site: Option<BindingSite>,
    pub effs: Vec<Eff>,
    pub chem_comps: Vec<ChemComp>,
}

pub trait LigandCatalog {
    fn profile(&self, ligand_id: i64) -> Result<LigandProfile, CredoError>;
}

const BINDING_SITE_SQL: &str = "
SELECT has_mut_res, has_mod_res, has_non_std_res
FROM binding_sites
WHERE ligand_id = ?";

const EFFS_SQL: &str = "
SELECT activity_type, p
FROM ligand_effs
WHERE ligand_id = ?
ORDER BY ligand_eff_id";

const CHEM_COMPS_SQL: &str = "
SELECT cc.het_id, cc.is_approved_drug, cc.is_nucleotide, cc.is_drug,
       cc.is_lead, cc.is_drug_like, cc.is_solvent
FROM ligand_components AS lc
JOIN chem_comps AS cc ON cc.het_id = lc.het_id
WHERE lc.ligand_id = ?
ORDER BY lc.ligand_component_id";

pub struct LigandAdaptor<'db> {
    db: &'db Database,
    options: AdaptorOptions,
}

impl<'db> LigandAdaptor<'db> {
    pub fn new(db: &'db Database, options: AdaptorOptions) -> Self {
        Self { db, options }
    }

    pub fn with_defaults(db: &'db Database) -> Self {
        Self::new(db, db.adaptor_options())
    }

    #[instrument(skip(self))]
    pub fn get_by_id(&self, ligand_id: i64) -> Result<Option<Ligand>, CredoError> {
        let query = Query::<Ligand>::table()
            .filter(Predicate::eq(LigandColumn::LigandId, ligand_id));
        self.db
            .fetch_all::<Ligand>(&query.select_sql())
            .map(|ligands| ligands.into_iter().next())
    }

    /// Ligands whose path starts with `prefix`, e.g. every ligand of one PDB entry.
    pub fn by_path_prefix(&self, prefix: &str) -> QueryBuilder<'db, Ligand> {
        QueryBuilder::new(
            self.db,
            Query::table().filter(Predicate::starts_with(LigandColumn::Path, prefix)),
            &self.options,
        )
    }

    pub fn binding_site(&self, ligand_id: i64) -> Result<Option<BindingSite>, CredoError> {
        let sites = self
            .db
            .rows(BINDING_SITE_SQL, &[Value::Integer(ligand_id)], |row| {
                Ok(BindingSite {
                    has_mut_res: row.get(0)?,
                    has_mod_res: row.get(1)?,
                    has_non_std_res: row.get(2)?,
                })
            })?;
        Ok(sites.into_iter().next())
    }

    pub fn effs(&self, ligand_id: i64) -> Result<Vec<Eff>, CredoError> {
        self.db.rows(EFFS_SQL, &[Value::Integer(ligand_id)], |row| {
            Ok(Eff {
                activity_type: row.get(0)?,
                p: row.get(1)?,
            })
        })
    }

    pub fn chem_comps(&self, ligand_id: i64) -> Result<Vec<ChemComp>, CredoError> {
        self.db
            .rows(CHEM_COMPS_SQL, &[Value::Integer(ligand_id)], |row| {
                Ok(ChemComp {
                    het_id: row.get(0)?,
                    is_approved_drug: row.get(1)?,
                    is_nucleotide: row.get(2)?,
                    is_drug: row.get(3)?,
                    is_lead: row.get(4)?,
                    is_drug_like: row.get(5)?,
                    is_solvent: row.get(6)?,
                })
            })
    }
}

impl LigandCatalog for LigandAdaptor<'_> {
    #[instrument(skip(self))]
    fn profile(&self, ligand_id: i64) -> Result<LigandProfile, CredoError> {
        let ligand = self
            .get_by_id(ligand_id)?
            .ok_or_else(|| CredoError::not_found("ligand", ligand_id))?;
        Ok(LigandProfile {
            ligand,
            binding_site: self.binding_site(ligand_id)?,
            effs: self.effs(ligand_id)?,
            chem_comps: self.chem_comps(ligand_id)?,
        })
    }
}
