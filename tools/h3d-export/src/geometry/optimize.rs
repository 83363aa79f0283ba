//! Index buffer optimization
//!
//! Degenerate triangle removal and post-transform vertex cache reordering.
//! Reordering uses Tom Forsyth's linear-speed greedy heuristic per triangle
//! group, then renumbers the group's vertices in first-use order.

use std::collections::VecDeque;

use super::{MorphTarget, TriGroup, Vertex};
use crate::context::ConversionContext;
use crate::scene_graph::NodeKind;

/// FIFO size used when reporting cache efficiency
pub const MEASURE_CACHE_SIZE: usize = 16;

// Scoring parameters of the reordering heuristic
const SCORING_CACHE_SIZE: usize = 32;
const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRI_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

/// Cache hit ratio of the whole index buffer before and after reordering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub before: f32,
    pub after: f32,
}

// ============================================================================
// Degenerate Triangles
// ============================================================================

/// Drop triangles that reference the same vertex twice and compact the index
/// buffer, returning how many were removed
pub fn remove_degenerate_triangles(ctx: &mut ConversionContext) -> usize {
    let ConversionContext {
        nodes,
        meshes,
        indices,
        ..
    } = ctx;

    let mut compacted = Vec::with_capacity(indices.len());
    let mut removed = 0;
    for id in meshes.iter() {
        let NodeKind::Mesh(mesh) = &mut nodes[id.0].kind else {
            continue;
        };
        for group in &mut mesh.tri_groups {
            let first = compacted.len();
            for tri in indices[group.index_range()].chunks_exact(3) {
                if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                    removed += 1;
                } else {
                    compacted.extend_from_slice(tri);
                }
            }
            group.first = first as u32;
            group.count = (compacted.len() - first) as u32;
        }
    }
    *indices = compacted;

    if removed > 0 {
        tracing::warn!("Removed {} degenerate triangles", removed);
    }
    removed
}

// ============================================================================
// Cache Reordering
// ============================================================================

/// Fraction of indices that hit a FIFO vertex cache of `cache_size` entries
pub fn cache_hit_ratio(indices: &[u32], cache_size: usize) -> f32 {
    if indices.is_empty() {
        return 0.0;
    }
    let mut cache: VecDeque<u32> = VecDeque::with_capacity(cache_size + 1);
    let mut hits = 0usize;
    for &index in indices {
        if cache.contains(&index) {
            hits += 1;
        } else {
            cache.push_back(index);
            if cache.len() > cache_size {
                cache.pop_front();
            }
        }
    }
    hits as f32 / indices.len() as f32
}

/// Reorder every triangle group for vertex cache locality
///
/// Vertices of each group are renumbered in first-use order and morph target
/// diffs are remapped to follow them.
pub fn optimize_index_order(ctx: &mut ConversionContext) -> CacheStats {
    let before = cache_hit_ratio(&ctx.indices, MEASURE_CACHE_SIZE);

    let ConversionContext {
        nodes,
        meshes,
        vertices,
        indices,
        morph_targets,
        ..
    } = ctx;
    for id in meshes.iter() {
        let NodeKind::Mesh(mesh) = &mut nodes[id.0].kind else {
            continue;
        };
        for group in &mut mesh.tri_groups {
            optimize_group(group, vertices, indices, morph_targets);
        }
    }
    for target in morph_targets.iter_mut() {
        target.diffs.sort_by_key(|diff| diff.vertex);
    }

    let after = cache_hit_ratio(&ctx.indices, MEASURE_CACHE_SIZE);
    CacheStats { before, after }
}

fn optimize_group(
    group: &mut TriGroup,
    vertices: &mut [Vertex],
    indices: &mut [u32],
    morph_targets: &mut [MorphTarget],
) {
    let start = group.vert_r_start;
    let range = group.vertex_range();
    let vertex_count = range.len();

    let local: Vec<u32> = indices[group.index_range()]
        .iter()
        .map(|&index| index - start)
        .collect();
    let ordered = forsyth_order(&local, vertex_count);

    // Old local index -> new local index, first use first, unreferenced last
    let mut remap: Vec<Option<u32>> = vec![None; vertex_count];
    let mut next = 0u32;
    for &index in &ordered {
        let slot = &mut remap[index as usize];
        if slot.is_none() {
            *slot = Some(next);
            next += 1;
        }
    }
    let remap: Vec<u32> = remap
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                next += 1;
                next - 1
            })
        })
        .collect();

    let original = vertices[range.clone()].to_vec();
    for (old, vertex) in original.into_iter().enumerate() {
        vertices[range.start + remap[old] as usize] = vertex;
    }
    for (slot, index) in indices[group.index_range()].iter_mut().zip(&ordered) {
        *slot = start + remap[*index as usize];
    }
    for bucket in group.position_buckets.values_mut() {
        for index in bucket.iter_mut() {
            *index = start + remap[(*index - start) as usize];
        }
    }
    for target in morph_targets.iter_mut() {
        for diff in &mut target.diffs {
            if range.contains(&(diff.vertex as usize)) {
                diff.vertex = start + remap[(diff.vertex - start) as usize];
            }
        }
    }
}

fn vertex_score(cache_position: Option<usize>, remaining: usize) -> f32 {
    if remaining == 0 {
        return -1.0;
    }
    let cache_score = match cache_position {
        None => 0.0,
        Some(position) if position < 3 => LAST_TRI_SCORE,
        Some(position) => {
            let scaler = 1.0 / (SCORING_CACHE_SIZE - 3) as f32;
            (1.0 - (position - 3) as f32 * scaler).powf(CACHE_DECAY_POWER)
        }
    };
    cache_score + VALENCE_BOOST_SCALE * (remaining as f32).powf(-VALENCE_BOOST_POWER)
}

/// Greedy triangle ordering over local indices `0..vertex_count`
fn forsyth_order(indices: &[u32], vertex_count: usize) -> Vec<u32> {
    let triangles: Vec<&[u32]> = indices.chunks_exact(3).collect();

    let mut vertex_tris: Vec<Vec<usize>> = vec![Vec::new(); vertex_count];
    for (tri, corners) in triangles.iter().enumerate() {
        for &v in corners.iter() {
            vertex_tris[v as usize].push(tri);
        }
    }

    let mut scores: Vec<f32> = vertex_tris
        .iter()
        .map(|tris| vertex_score(None, tris.len()))
        .collect();
    let mut tri_scores: Vec<f32> = triangles
        .iter()
        .map(|corners| corners.iter().map(|&v| scores[v as usize]).sum())
        .collect();
    let mut emitted = vec![false; triangles.len()];
    let mut cache: Vec<u32> = Vec::with_capacity(SCORING_CACHE_SIZE + 3);
    let mut output = Vec::with_capacity(indices.len());

    let mut best = best_remaining(&tri_scores, &emitted);
    while let Some(tri) = best {
        emitted[tri] = true;
        let corners = triangles[tri];
        output.extend_from_slice(corners);
        for &v in corners {
            vertex_tris[v as usize].retain(|&t| t != tri);
        }

        let mut next: Vec<u32> = Vec::with_capacity(cache.len() + 3);
        for &v in corners.iter().chain(&cache) {
            if !next.contains(&v) {
                next.push(v);
            }
        }
        let evicted = next.split_off(next.len().min(SCORING_CACHE_SIZE));
        for &v in &evicted {
            scores[v as usize] = vertex_score(None, vertex_tris[v as usize].len());
        }
        for (position, &v) in next.iter().enumerate() {
            scores[v as usize] = vertex_score(Some(position), vertex_tris[v as usize].len());
        }
        cache = next;

        best = None;
        let mut best_score = f32::NEG_INFINITY;
        for &v in cache.iter().chain(&evicted) {
            for &t in &vertex_tris[v as usize] {
                let score = triangles[t].iter().map(|&c| scores[c as usize]).sum();
                tri_scores[t] = score;
                if score > best_score {
                    best_score = score;
                    best = Some(t);
                }
            }
        }
        if best.is_none() {
            best = best_remaining(&tri_scores, &emitted);
        }
    }
    output
}

fn best_remaining(tri_scores: &[f32], emitted: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (tri, &score) in tri_scores.iter().enumerate() {
        if emitted[tri] {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((tri, score));
        }
    }
    best.map(|(tri, _)| tri)
}
