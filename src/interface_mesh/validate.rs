//! Debug-only structural invariant checks for a freshly built [`super::InterfaceMesh`].

use super::InterfaceMesh;

/// Panics if `mesh` violates any half-edge structural invariant. Only ever called from behind
/// `cfg(debug_assertions)`; never runs in a release build.
pub(crate) fn validate_mesh(mesh: &InterfaceMesh) {
    for (i, he) in mesh.half_edges.iter().enumerate() {
        if let Some(opp) = he.opposite {
            let back = mesh.half_edge(opp).opposite;
            debug_assert_eq!(back, Some(super::HalfEdgeId(i)), "half-edge {i}'s opposite does not point back");
            debug_assert_eq!(mesh.half_edge(opp).tail, he.head, "opposite half-edge must run tail/head-reversed");
            debug_assert_eq!(mesh.half_edge(opp).head, he.tail, "opposite half-edge must run tail/head-reversed");
        }

        let n1 = he.next_face_edge;
        let n2 = mesh.half_edge(n1).next_face_edge;
        let n3 = mesh.half_edge(n2).next_face_edge;
        debug_assert_eq!(n3.0, i, "every face must be a 3-cycle of half-edges");
        debug_assert_eq!(mesh.half_edge(n1).face, he.face, "face-cycle edges must share one face");
        debug_assert_eq!(mesh.half_edge(n2).face, he.face, "face-cycle edges must share one face");
    }

    for (v, vertex) in mesh.vertices.iter().enumerate() {
        for &e in &vertex.outgoing {
            debug_assert_eq!(mesh.half_edge(e).tail.0, v, "vertex outgoing list must only list edges leaving it");
        }
    }

    for face in &mesh.faces {
        let verts: Vec<_> = face.edges.iter().map(|&e| mesh.half_edge(e).tail).collect();
        debug_assert_eq!(verts.len(), 3);
        debug_assert_ne!(verts[0], verts[1]);
        debug_assert_ne!(verts[1], verts[2]);
        debug_assert_ne!(verts[0], verts[2]);
    }
}
