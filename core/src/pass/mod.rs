//! Compile-time optimization passes over the IR DAG.

pub mod sampling_skew;

pub use sampling_skew::{SamplingConfig, SamplingSkewReshapingPass, DYN_OPT_DATA_TAG};

use crate::dag::Dag;
use crate::ir::EdgePropertyKind;
use remora_common::error::Result;

/// A pure rewrite of the IR DAG, applied before execution.
///
/// Passes declare the edge property kinds they read (`prerequisites`) and
/// the kinds they stamp onto the output (`annotates`) so a pass runner can
/// order them.
pub trait CompileTimePass {
    fn name(&self) -> &'static str;

    /// Property kinds that must be present on the input DAG.
    fn prerequisites(&self) -> Vec<EdgePropertyKind> {
        Vec::new()
    }

    /// Property kinds the pass adds to the output DAG.
    fn annotates(&self) -> Vec<EdgePropertyKind> {
        Vec::new()
    }

    /// Rewrites the DAG. The input is never mutated; on failure no partial
    /// output is observable.
    fn apply(&self, dag: &Dag) -> Result<Dag>;
}
