//! Debug-only structural invariant checks for a freshly built [`super::DefectMesh`] (property 7:
//! every half-edge has an opposite, and every face is a 3-cycle).

use super::DefectMesh;

/// Panics if `mesh` violates any half-edge structural invariant. Only ever called from behind
/// `cfg(debug_assertions)`; never runs in a release build.
pub(crate) fn validate_mesh(mesh: &DefectMesh) {
    for (i, he) in mesh.half_edges.iter().enumerate() {
        let Some(opp) = he.opposite else {
            debug_assert!(false, "half-edge {i} has no opposite: defect mesh is not closed");
            continue;
        };
        let back = mesh.half_edge(opp).opposite;
        debug_assert_eq!(back, Some(super::DefectHalfEdgeId(i)), "half-edge {i}'s opposite does not point back");
        debug_assert_eq!(mesh.half_edge(opp).tail, he.head, "opposite half-edge must run tail/head-reversed");
        debug_assert_eq!(mesh.half_edge(opp).head, he.tail, "opposite half-edge must run tail/head-reversed");

        let n1 = he.next_face_edge;
        let n2 = mesh.half_edge(n1).next_face_edge;
        let n3 = mesh.half_edge(n2).next_face_edge;
        debug_assert_eq!(n3.0, i, "every face must be a 3-cycle of half-edges");
        debug_assert_eq!(mesh.half_edge(n1).face, he.face, "face-cycle edges must share one face");
        debug_assert_eq!(mesh.half_edge(n2).face, he.face, "face-cycle edges must share one face");
    }
}
