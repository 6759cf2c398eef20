// src/deps/resolver.rs

//! Input-data dependency resolution.
//!
//! Pure over the [`FileSystem`] trait: the only side effects are existence
//! checks, so resolving the same requirement list against an unchanged tree
//! is idempotent and safely re-entrant.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::VarRequirement;
use crate::fs::FileSystem;
use crate::types::Frequency;

/// Where a job's input data is looked up.
#[derive(Debug, Clone)]
pub struct DataContext<'a> {
    pub case_name: &'a str,
    /// The case's model data directory (`<model_data_root>/<case>`).
    pub data_dir: &'a Path,
}

/// Outcome of resolving one job's requirement list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub found: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl Resolution {
    /// A job is runnable iff nothing required is missing.
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Canonical data file path:
/// `<data_dir>/<freq>/<case_name>.<name>.<freq>.nc`.
pub fn data_file_path(ctx: &DataContext<'_>, name: &str, freq: Frequency) -> PathBuf {
    ctx.data_dir
        .join(freq.as_str())
        .join(format!("{}.{}.{}.nc", ctx.case_name, name, freq.as_str()))
}

/// Resolve a requirement list to found/missing file sets.
///
/// Per requirement: a present primary file is recorded in `found`. An absent
/// optional file contributes to neither set. An absent required file falls
/// back to its alternates, each resolved as a fresh requirement with the
/// alternates list consumed (so substitution cannot recurse); every alternate
/// that resolves is recorded in `found`, and only if none resolves does the
/// primary path land in `missing`.
pub fn resolve(
    fs: &dyn FileSystem,
    varlist: &[VarRequirement],
    ctx: &DataContext<'_>,
) -> Resolution {
    let mut resolution = Resolution::default();
    for req in varlist {
        resolve_requirement(fs, req, ctx, true, &mut resolution);
    }
    resolution
}

fn resolve_requirement(
    fs: &dyn FileSystem,
    req: &VarRequirement,
    ctx: &DataContext<'_>,
    alternates_available: bool,
    out: &mut Resolution,
) {
    let path = data_file_path(ctx, &req.name, req.freq);

    if fs.is_file(&path) {
        debug!(var = %req.name, file = ?path, "input file found");
        out.found.push(path);
        return;
    }

    if !req.required {
        debug!(var = %req.name, file = ?path, "optional input file not found; skipping");
        return;
    }

    if !alternates_available || req.alternates.is_empty() {
        warn!(var = %req.name, file = ?path, "required input file missing, no alternates");
        out.missing.push(path);
        return;
    }

    warn!(
        var = %req.name,
        file = ?path,
        alternates = ?req.alternates,
        "required input file missing; trying alternates"
    );

    let mut alt_resolution = Resolution::default();
    for alt in req.alternates.iter() {
        let alt_req = VarRequirement {
            name: alt.clone(),
            freq: req.freq,
            required: req.required,
            alternates: Vec::new(),
        };
        resolve_requirement(fs, &alt_req, ctx, false, &mut alt_resolution);
    }

    if alt_resolution.found.is_empty() {
        // No alternate resolved either; the requirement is reported against
        // its originally-declared name.
        out.missing.push(path);
    } else {
        out.found.append(&mut alt_resolution.found);
    }
}
