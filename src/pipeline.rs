//! Orchestrates the full analysis: cluster graph, elastic mapping, interface mesh, dislocation
//! tracing, and defect mesh construction, end to end over one configuration (§6).

use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::defect_mesh::{build_defect_mesh, DefectMesh};
use crate::dislocation::{trace_dislocation_segments, DislocationNetwork};
use crate::elastic_mapping::build_elastic_mapping;
use crate::error::{DxaError, DxaResult};
use crate::geometry::{ClusterVector, SimulationCell, Vector3};
use crate::interface_mesh::{classify_tetrahedra, create_mesh};
use crate::parameters::Parameters;
use crate::progress::Progress;
use crate::structure::{build_cluster_graph_with_progress, CrystalStructure, StructureAnalysisInput};
use crate::tessellation::Tessellation;
use mt_logger::{mt_log, Level};

/// Scalar summary attributes computed once the pipeline finishes.
#[derive(Debug, Clone, Default)]
pub struct PipelineAttributes {
    /// The total length, in simulation units, of every live dislocation segment's polyline.
    pub total_line_length: f64,
    /// The number of atoms classified as each crystal structure.
    pub structure_counts: Vec<(CrystalStructure, usize)>,
    /// The total line length contributed by each distinct Burgers vector family (same home
    /// cluster, lattice vector equal within tolerance).
    pub burgers_family_lengths: Vec<(ClusterVector, f64)>,
    /// The simulation cell's volume.
    pub cell_volume: f64,
}

/// Everything the pipeline hands back for one configuration.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The closed half-edge surface bounding the defective core.
    pub defect_mesh: DefectMesh,
    /// The crystalline grains present and the transitions relating their frames.
    pub cluster_graph: ClusterGraph,
    /// The traced dislocation segments and their junction topology.
    pub dislocation_network: DislocationNetwork,
    /// `atom_clusters[i]` is the cluster atom `i` was assigned to (possibly the null cluster).
    pub atom_clusters: Vec<ClusterId>,
    /// `atom_structures[i]` is the coordination-structure tag atom `i` was classified as.
    pub atom_structures: Vec<CrystalStructure>,
    /// Scalar summary attributes.
    pub attributes: PipelineAttributes,
}

/// Runs the full pipeline: builds the cluster graph from `input`'s per-atom classification,
/// assigns every tessellation edge an ideal lattice vector, builds the interface mesh, traces
/// dislocation segments across it, and caps the result into a closed defect mesh.
///
/// # Errors
///
/// Returns [`DxaError::InvalidParameters`] if `parameters` is out of range,
/// [`DxaError::DegenerateCell`]/[`DxaError::SimulationCellTooSmall`] if `cell` cannot host
/// `positions` at the given tessellation, and [`DxaError::Canceled`] if `progress` requests
/// cancellation partway through.
pub fn run(
    tess: &impl Tessellation,
    positions: &[Vector3],
    cell: &SimulationCell,
    input: &StructureAnalysisInput,
    parameters: &Parameters,
    progress: &mut impl Progress,
) -> DxaResult<PipelineOutput> {
    parameters.validate()?;
    mt_log!(Level::Debug, "dxa pipeline starting: {} atoms", input.atoms.len());

    let assignment = build_cluster_graph_with_progress(input, progress);
    if progress.is_canceled() {
        return Err(DxaError::Canceled);
    }
    let mut graph = assignment.graph;
    mt_log!(Level::Debug, "cluster graph built: {} clusters", graph.len());

    let mapping = build_elastic_mapping(tess, positions, cell, &assignment.clusters, input, &mut graph)?;
    if progress.is_canceled() {
        return Err(DxaError::Canceled);
    }
    mt_log!(Level::Debug, "elastic mapping built");

    let classification = classify_tetrahedra(tess, &mapping, &graph);
    let mut mesh = create_mesh(tess, &mapping, &graph, positions, cell, &classification);
    mt_log!(Level::Debug, "interface mesh built: {} faces", mesh.face_count());

    let network = trace_dislocation_segments(&mut mesh, &graph, &mapping, parameters, progress)?;
    mt_log!(Level::Debug, "dislocation network traced: {} segments", network.segments().len());
    let defect_mesh = build_defect_mesh(&mesh, &network);
    mt_log!(Level::Debug, "defect mesh capped: {} faces", defect_mesh.face_count());

    let attributes = PipelineAttributes {
        total_line_length: network.total_line_length(),
        structure_counts: structure_counts(input),
        burgers_family_lengths: burgers_family_lengths(&network),
        cell_volume: cell.volume(),
    };

    Ok(PipelineOutput {
        defect_mesh,
        cluster_graph: graph,
        dislocation_network: network,
        atom_clusters: assignment.clusters,
        atom_structures: input.atoms.iter().map(|atom| atom.structure).collect(),
        attributes,
    })
}

/// Counts how many atoms were classified as each crystal structure.
fn structure_counts(input: &StructureAnalysisInput) -> Vec<(CrystalStructure, usize)> {
    let mut counts: Vec<(CrystalStructure, usize)> = Vec::new();
    for atom in &input.atoms {
        match counts.iter_mut().find(|(s, _)| *s == atom.structure) {
            Some((_, n)) => *n += 1,
            None => counts.push((atom.structure, 1)),
        }
    }
    counts
}

/// Groups every live (non-replaced) segment by Burgers vector family -- same home cluster, same
/// lattice vector within tolerance -- summing each family's total line length.
fn burgers_family_lengths(network: &DislocationNetwork) -> Vec<(ClusterVector, f64)> {
    let mut families: Vec<(ClusterVector, f64)> = Vec::new();
    for segment in network.segments() {
        if segment.replaced_with().is_some() {
            continue;
        }
        let length: f64 = segment.line().iter().zip(segment.line().iter().skip(1)).map(|(a, b)| (b - a).norm()).sum();
        let bv = *segment.burgers_vector();
        match families.iter_mut().find(|(fam, _)| same_family(fam, &bv)) {
            Some((_, total)) => *total += length,
            None => families.push((bv, length)),
        }
    }
    families
}

fn same_family(a: &ClusterVector, b: &ClusterVector) -> bool {
    a.frame() == b.frame() && (a.local_vec() - b.local_vec()).norm() < crate::parameters::LATTICE_VECTOR_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Matrix3;
    use crate::progress::NullProgress;
    use crate::tessellation::{TetCell, Tessellation};

    struct EmptyTessellation;

    impl Tessellation for EmptyTessellation {
        fn cell_count(&self) -> usize {
            0
        }
        fn cell(&self, index: usize) -> TetCell {
            unreachable!("no cells in an empty tessellation, got index {index}")
        }
        fn mirror_facet(&self, cell: usize, face: usize) -> usize {
            unreachable!("no cells in an empty tessellation, got cell {cell} face {face}")
        }
        fn cell_facet_vertex_index(&self, face: usize, vertex_in_face: usize) -> usize {
            unreachable!("no cells in an empty tessellation, got face {face} vertex {vertex_in_face}")
        }
        fn incident_facets(&self, v1: usize, v2: usize, start_cell: usize, start_face: usize) -> Vec<(usize, usize)> {
            unreachable!("no cells in an empty tessellation, got edge ({v1}, {v2}) from ({start_cell}, {start_face})")
        }
    }

    #[test]
    fn zero_atom_input_yields_empty_everything() {
        let tess = EmptyTessellation;
        let cell = SimulationCell::new(Matrix3::identity() * 10.0, [true, true, true]).expect("valid cell");
        let input = StructureAnalysisInput::default();
        let parameters = Parameters::default();
        let mut progress = NullProgress;

        let output = run(&tess, &[], &cell, &input, &parameters, &mut progress).expect("empty input never errors");

        assert_eq!(output.atom_clusters.len(), 0);
        assert_eq!(output.atom_structures.len(), 0);
        assert_eq!(output.dislocation_network.segments().len(), 0);
        assert_eq!(output.defect_mesh.face_count(), 0);
        assert_eq!(output.attributes.total_line_length, 0.0);
        assert!(output.attributes.structure_counts.is_empty());
        assert!((output.attributes.cell_volume - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_parameters_are_rejected_before_any_phase_runs() {
        let tess = EmptyTessellation;
        let cell = SimulationCell::new(Matrix3::identity() * 10.0, [true, true, true]).expect("valid cell");
        let input = StructureAnalysisInput::default();
        let mut parameters = Parameters::default();
        parameters.max_trial_circuit_size = 1;
        let mut progress = NullProgress;

        let result = run(&tess, &[], &cell, &input, &parameters, &mut progress);
        assert!(matches!(result, Err(DxaError::InvalidParameters { .. })));
    }
}
