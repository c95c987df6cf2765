//! Finalization (§4.5.8): trims the provisional points left over from segment creation,
//! renumbers segments consecutively, rotates Burgers vectors into a real crystal frame, and
//! canonicalizes each segment's orientation.

use crate::cluster_graph::ClusterGraph;
use crate::structure::CrystalStructure;

use super::DislocationNetwork;

/// Trims each segment's preliminary points, renumbers the surviving segments, rotates any
/// Burgers vector still anchored on a non-crystalline frame into an adjacent crystalline one, and
/// flips orientation so the dominant component of the end-to-start vector is positive.
pub fn finish_dislocation_segments(network: &mut DislocationNetwork, graph: &ClusterGraph) {
    for segment in &mut network.segments {
        trim_preliminary_points(segment);
    }

    renumber_segments(network);

    for segment in &mut network.segments {
        if segment.replaced_with.is_some() {
            continue;
        }
        rotate_into_crystalline_frame(segment, graph);
        canonicalize_orientation(segment);
    }
}

/// Each segment was seeded with one provisional centroid point at each end before real tracing
/// began; drop it now that the true trace points have been recorded, as long as the line would
/// still have at least two points left.
fn trim_preliminary_points(segment: &mut super::DislocationSegment) {
    const PROVISIONAL_POINTS_PER_END: usize = 1;
    for _ in 0..PROVISIONAL_POINTS_PER_END {
        if segment.line.len() > 2 {
            segment.line.pop_front();
            segment.core_size.pop_front();
        }
    }
    for _ in 0..PROVISIONAL_POINTS_PER_END {
        if segment.line.len() > 2 {
            segment.line.pop_back();
            segment.core_size.pop_back();
        }
    }
}

fn renumber_segments(network: &mut DislocationNetwork) {
    let mut next_id = 0;
    for segment in &mut network.segments {
        if segment.replaced_with.is_some() {
            continue;
        }
        segment.id = next_id;
        next_id += 1;
    }
}

/// If the Burgers vector's home cluster is not itself a recognized crystal structure, walks its
/// distance-`<=1` neighbors for the first transition landing on one, and rotates into that frame.
fn rotate_into_crystalline_frame(segment: &mut super::DislocationSegment, graph: &ClusterGraph) {
    let Some(home) = segment.burgers_vector.frame() else { return };
    let Some(cluster) = graph.find_cluster(home) else { return };
    if cluster.structure() != CrystalStructure::Other {
        return;
    }
    let Some(transition) = graph.outgoing_transitions(home).find(|t| {
        t.distance() <= 1 && graph.find_cluster(t.destination()).is_some_and(|c| c.structure() != CrystalStructure::Other)
    }) else {
        return;
    };
    segment.burgers_vector = segment.burgers_vector.transformed(transition.tm(), transition.destination());
}

/// Picks the dominant (largest-magnitude) component of the end-to-start vector; if it is
/// negative, reverses the segment so the line runs in the conventional direction.
fn canonicalize_orientation(segment: &mut super::DislocationSegment) {
    let Some(&start) = segment.line.front() else { return };
    let Some(&end) = segment.line.back() else { return };
    let delta = end - start;
    let (_, dominant) = [delta.x, delta.y, delta.z].into_iter().enumerate().fold((0, delta.x), |acc, (i, v)| if v.abs() > acc.1.abs() { (i, v) } else { acc });
    if dominant < 0.0 {
        segment.flip_orientation();
    }
}
