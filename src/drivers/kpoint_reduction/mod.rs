//! Driver for $`\mathbf{k}`$-point symmetry reduction.

use std::fmt;

use anyhow::format_err;
use derive_builder::Builder;
use log;
use serde::{Deserialize, Serialize};

use crate::drivers::KpsymDriver;
use crate::io::format::{kpsym_output, log_subtitle, log_title, KpsymOutput};
use crate::io::{write_kpsym_binary, KpsymFileType};
use crate::kpoints::{build, KPointSymmetryParams, KPointSymmetryTable, RawKPointInput};

#[cfg(test)]
#[path = "kpoint_reduction_tests.rs"]
mod kpoint_reduction_tests;

// ==================
// Struct definitions
// ==================

// ------
// Result
// ------

/// A structure to contain $`\mathbf{k}`$-point symmetry reduction results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct KPointReductionResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: KPointSymmetryParams,

    /// The symmetry table of the $`\mathbf{k}`$-point mesh.
    pub table: KPointSymmetryTable,
}

impl KPointReductionResult {
    /// Returns a builder to construct a [`KPointReductionResult`] structure.
    fn builder() -> KPointReductionResultBuilder {
        KPointReductionResultBuilder::default()
    }
}

impl fmt::Display for KPointReductionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for $`\mathbf{k}`$-point symmetry reduction.
#[derive(Clone, Builder)]
pub struct KPointReductionDriver<'a> {
    /// The control parameters for the reduction.
    parameters: &'a KPointSymmetryParams,

    /// The $`\mathbf{k}`$-points, their coordinate basis and the crystal operations.
    input: &'a RawKPointInput<'a>,

    /// The result of the reduction.
    #[builder(setter(skip), default = "None")]
    result: Option<KPointReductionResult>,
}

impl<'a> KPointReductionDriver<'a> {
    /// Returns a builder to construct a [`KPointReductionDriver`] structure.
    pub fn builder() -> KPointReductionDriverBuilder<'a> {
        KPointReductionDriverBuilder::default()
    }

    /// Executes the reduction.
    fn reduce_kpoints(&mut self) -> Result<(), anyhow::Error> {
        log_title("K-Point Symmetry Reduction");
        kpsym_output!("");
        let params = self.parameters;
        params.log_output_display();
        kpsym_output!("");

        log_subtitle("Operations");
        kpsym_output!("");
        kpsym_output!(
            "{} operation(s) supplied for {} k-point(s).",
            self.input.operations().len(),
            self.input.kpts().len()
        );
        kpsym_output!("");

        let table = build(self.input, params)?;
        log::debug!(
            "Operations retained for k-point reduction: {}",
            table.operations().nop()
        );

        self.result = KPointReductionResult::builder()
            .parameters(params.clone())
            .table(table)
            .build()
            .ok();

        if let Some(res) = self.result.as_ref() {
            res.log_output_display();
            if let Some(name) = params.result_save_name.as_ref() {
                write_kpsym_binary(name, KpsymFileType::Kpt, res)?;
                kpsym_output!(
                    "K-point reduction results saved as {name}.{}.",
                    KpsymFileType::Kpt.ext()
                );
                kpsym_output!("");
            }
        }

        Ok(())
    }
}

impl<'a> KpsymDriver for KPointReductionDriver<'a> {
    type Params = KPointSymmetryParams;

    type Outcome = KPointReductionResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No k-point reduction results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.reduce_kpoints()
    }
}
