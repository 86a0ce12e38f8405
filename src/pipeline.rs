//! Multi-function driver. One liveness run is strictly single-threaded,
//! but runs over distinct functions are independent as long as each has
//! its own sink and call-resolution store; the signature catalog and
//! architecture descriptor are shared read-only.

use crate::arch::ArchDesc;
use crate::calling::{CallResolution, SignatureCatalog};
use crate::cflow::StructuredFlow;
use crate::dataflow::Dataflow;
use crate::ir::Function;
use crate::liveness::{Liveness, LivenessAnalyzer};
use rayon::prelude::*;

/// Everything one function's analysis run touches exclusively.
pub struct AnalysisUnit {
    pub function: Function,
    pub dataflow: Dataflow,
    pub flow: StructuredFlow,
    pub resolution: CallResolution,
    pub liveness: Liveness,
}

impl AnalysisUnit {
    pub fn new(function: Function, dataflow: Dataflow, resolution: CallResolution) -> AnalysisUnit {
        let flow = StructuredFlow::compute(&function);
        AnalysisUnit {
            function,
            dataflow,
            flow,
            resolution,
            liveness: Liveness::new(),
        }
    }
}

/// Analyzes every unit, in parallel across functions.
pub fn analyze_all(units: &mut [AnalysisUnit], arch: &ArchDesc, signatures: &SignatureCatalog) {
    units.par_iter_mut().for_each(|unit| {
        LivenessAnalyzer::new(
            &mut unit.liveness,
            &unit.function,
            &unit.dataflow,
            arch,
            &unit.flow,
            &mut unit.resolution,
            signatures,
        )
        .analyze();
    });
}
