//! The tetrahedralization interface consumed from the (out-of-scope) Delaunay tessellator.
//!
//! The DXA core never builds a tetrahedralization itself; it only walks one that a caller already
//! produced, ghost cells and all, through this trait.

/// One tetrahedral cell of the input tessellation.
#[derive(Debug, Clone, Copy)]
pub struct TetCell {
    /// The four atom indices at this cell's vertices.
    pub vertices: [usize; 4],
    /// `true` if this cell was emitted on a periodic image rather than being a primary cell.
    pub is_ghost: bool,
}

/// The six undirected vertex-index pairs forming the edges of a tetrahedron, in the canonical
/// order `InterfaceMesh` and `ElasticMapping` both rely on.
pub const TET_EDGES: [(usize, usize); 6] = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];

/// The four triangular faces of a tetrahedron, each as the three vertex slots opposite the named
/// vertex, in consistent winding order.
pub const TET_FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// A ghost-aware Delaunay tetrahedralization of the atoms.
///
/// Implementors hand back cells by index; a "primary" cell is one with `is_ghost == false`.
pub trait Tessellation {
    /// The number of tetrahedral cells (primary and ghost).
    fn cell_count(&self) -> usize;

    /// Returns the cell at the given index.
    fn cell(&self, index: usize) -> TetCell;

    /// Returns the index of the tetrahedron sharing face `face` (0..4, indexing [`TET_FACES`])
    /// with `cell`, mirrored across a periodic image if `cell` touches one.
    fn mirror_facet(&self, cell: usize, face: usize) -> usize;

    /// For ghost cell `cell`, returns the index of the corresponding vertex in its mirrored
    /// primary cell.
    fn cell_facet_vertex_index(&self, face: usize, vertex_in_face: usize) -> usize;

    /// Iterates the tetrahedra incident to the directed edge `(v1, v2)`, starting the walk from
    /// `(start_cell, start_face)`. Used to resolve which primary cell borders a given tessellation
    /// edge when constructing the interface mesh.
    fn incident_facets(&self, v1: usize, v2: usize, start_cell: usize, start_face: usize) -> Vec<(usize, usize)>;
}
