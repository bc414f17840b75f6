//! The configuration surface of the assembly engine.
//!
//! Options deserialize from whatever format the host application uses.
//! Every enum-valued option is parsed by name; an unrecognized name is a
//! deserialization error that lists the supported values, so a typo in the
//! input deck fails the run up front instead of silently skipping a step.

use crate::assembly::ExecutionModel;
use crate::bc::EnforcementMethod;
use crate::mesh::CellKind;
use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// The default penalty magnitude for Dirichlet enforcement.
pub const DEFAULT_PENALTY: f64 = 1.0e30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// Element kind of the mesh: `TRIA3` or `TETRA4`.
    #[serde(deserialize_with = "from_name")]
    pub mesh_type: CellKind,
    /// Physical layout of the assembled matrix.
    #[serde(deserialize_with = "from_name")]
    pub storage_layout: skoll_sparse::StorageLayout,
    /// Execution model of the assembly loops.
    #[serde(deserialize_with = "from_name")]
    pub execution: ExecutionModel,
    /// Dirichlet enforcement policy.
    #[serde(deserialize_with = "from_name")]
    pub enforce_dirichlet_method: EnforcementMethod,
    /// Penalty magnitude `P` for the penalty-family policies.
    pub penalty: f64,
    /// Constant source term of the PDE.
    pub f: f64,
    /// Number of repeated assembly passes, for timing with warm caches.
    pub cache_warming: usize,
    /// Optional plain-text reference result to check the solution against.
    pub result_file: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mesh_type: CellKind::Triangle3,
            storage_layout: skoll_sparse::StorageLayout::Csr,
            execution: ExecutionModel::Serial,
            enforce_dirichlet_method: EnforcementMethod::Penalty,
            penalty: DEFAULT_PENALTY,
            f: 1.0,
            cache_warming: 1,
            result_file: None,
        }
    }
}

fn from_name<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

/// The mesh type name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMeshType(String);

impl fmt::Display for UnknownMeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown mesh type \"{}\"; supported types are: TRIA3, TETRA4",
            self.0
        )
    }
}

impl Error for UnknownMeshType {}

impl FromStr for CellKind {
    type Err = UnknownMeshType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRIA3" => Ok(CellKind::Triangle3),
            "TETRA4" => Ok(CellKind::Tetra4),
            other => Err(UnknownMeshType(other.to_string())),
        }
    }
}
