//! Animation sampling
//!
//! Each source clip becomes one [`AnimationClip`] holding a track per joint
//! and mesh. Tracks carry full relative matrices, so animation on folded
//! pure-transform ancestors ends up in the tracks of their emitted
//! descendants.

use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;

use crate::context::ConversionContext;
use crate::scene_graph::{static_local, NodeId};
use crate::source::{ChannelProperty, SourceAnimation, SourceChannel, SourceScene};

/// Sampled frames of one output node
#[derive(Debug, Clone)]
pub struct NodeTrack {
    pub node: NodeId,
    /// One matrix per frame, or a single matrix when compressed
    pub frames: Vec<Mat4>,
    pub compressed: bool,
}

impl NodeTrack {
    fn new(node: NodeId, mut frames: Vec<Mat4>) -> Self {
        let compressed = frames.len() > 1 && frames.iter().all(|m| bit_equal(m, &frames[0]));
        if compressed {
            frames.truncate(1);
        }
        Self {
            node,
            frames,
            compressed,
        }
    }

    /// Matrix at a frame index; compressed tracks answer every index
    pub fn frame(&self, index: usize) -> Option<&Mat4> {
        if self.compressed {
            self.frames.first()
        } else {
            self.frames.get(index)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub frame_count: u32,
    /// Joint tracks first, then mesh tracks
    pub tracks: Vec<NodeTrack>,
}

impl AnimationClip {
    pub fn track(&self, node: NodeId) -> Option<&NodeTrack> {
        self.tracks.iter().find(|track| track.node == node)
    }
}

fn bit_equal(a: &Mat4, b: &Mat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Sample every clip of the scene for every emitted node
pub fn sample_animations(scene: &SourceScene, ctx: &mut ConversionContext) {
    for animation in &scene.animations {
        let clip = sample_clip(scene, ctx, animation);
        tracing::debug!(
            "Sampled clip '{}': {} frames, {} of {} tracks compressed",
            clip.name,
            clip.frame_count,
            clip.tracks.iter().filter(|t| t.compressed).count(),
            clip.tracks.len()
        );
        ctx.clips.push(clip);
    }
}

fn sample_clip(
    scene: &SourceScene,
    ctx: &ConversionContext,
    animation: &SourceAnimation,
) -> AnimationClip {
    let mut channels: HashMap<usize, Vec<&SourceChannel>> = HashMap::new();
    for channel in &animation.channels {
        channels.entry(channel.node).or_default().push(channel);
    }
    let frame_count = animation
        .channels
        .iter()
        .map(SourceChannel::sample_count)
        .max()
        .unwrap_or(0)
        .max(1);

    let mut sampler = NodeSampler {
        scene,
        clip: &animation.name,
        channels,
        frame_count,
        cache: HashMap::new(),
    };

    let tracks = ctx
        .joints
        .iter()
        .chain(&ctx.meshes)
        .map(|&id| {
            let node = ctx.node(id);
            let mut frames = vec![Mat4::IDENTITY; frame_count];
            for &source in node.folded.iter().chain(node.source.iter()) {
                let locals = sampler.local_frames(source);
                for (frame, local) in frames.iter_mut().zip(locals) {
                    *frame *= *local;
                }
            }
            NodeTrack::new(id, frames)
        })
        .collect();

    AnimationClip {
        name: animation.name.clone(),
        frame_count: frame_count as u32,
        tracks,
    }
}

/// Per-clip local transform sampling, memoized per source node
struct NodeSampler<'a> {
    scene: &'a SourceScene,
    clip: &'a str,
    channels: HashMap<usize, Vec<&'a SourceChannel>>,
    frame_count: usize,
    cache: HashMap<usize, Vec<Mat4>>,
}

impl NodeSampler<'_> {
    fn local_frames(&mut self, source: usize) -> &[Mat4] {
        if !self.cache.contains_key(&source) {
            let frames = self.sample(source);
            self.cache.insert(source, frames);
        }
        &self.cache[&source]
    }

    fn sample(&self, source: usize) -> Vec<Mat4> {
        let node = &self.scene.nodes[source];
        let up_axis = self.scene.up_axis;
        let still = static_local(node, up_axis).unwrap_or(Mat4::IDENTITY);
        let static_frames = || vec![still; self.frame_count];

        let Some(channels) = self.channels.get(&source) else {
            return static_frames();
        };
        if !channels_usable(channels) {
            tracing::warn!(
                "Animation '{}' of node '{}' is incomplete or inconsistent, using static pose",
                self.clip,
                node.name
            );
            return static_frames();
        }

        let bind = node
            .transform
            .and_then(|t| t.to_matrix())
            .unwrap_or(Mat4::IDENTITY);
        let (bind_scale, bind_rotation, bind_translation) = bind.to_scale_rotation_translation();
        let find = |property| channels.iter().find(|c| c.property == property);
        let translation = find(ChannelProperty::Translation);
        let rotation = find(ChannelProperty::Rotation);
        let scale = find(ChannelProperty::Scale);
        let matrix = find(ChannelProperty::Matrix);

        let mut frames = Vec::with_capacity(self.frame_count);
        for frame in 0..self.frame_count {
            let local = if let Some(channel) = matrix {
                let mut cols = [0.0f32; 16];
                for (i, value) in cols.iter_mut().enumerate() {
                    *value = sample_component(channel, i, frame);
                }
                Mat4::from_cols_array(&cols)
            } else {
                let t = translation.map_or(bind_translation, |c| sample_vec3(c, frame));
                let s = scale.map_or(bind_scale, |c| sample_vec3(c, frame));
                let r = rotation
                    .map(|c| sample_quat(c, frame))
                    .filter(|q| q.is_finite() && q.length_squared() > 0.0)
                    .map_or(bind_rotation, Quat::normalize);
                Mat4::from_scale_rotation_translation(s, r, t)
            };
            if !local.is_finite() {
                tracing::warn!(
                    "Animation '{}' of node '{}' has non-finite samples, using static pose",
                    self.clip,
                    node.name
                );
                return static_frames();
            }
            frames.push(up_axis.convert_transform(local));
        }
        frames
    }
}

/// Channels of one node form a complete, consistently sized set
fn channels_usable(channels: &[&SourceChannel]) -> bool {
    let Some(first) = channels.first() else {
        return false;
    };
    let samples = first.sample_count();
    if samples == 0 || channels.iter().any(|c| !c.is_consistent() || c.sample_count() != samples) {
        return false;
    }
    let count = |property| channels.iter().filter(|c| c.property == property).count();
    let matrices = count(ChannelProperty::Matrix);
    let duplicated = [
        ChannelProperty::Translation,
        ChannelProperty::Rotation,
        ChannelProperty::Scale,
    ]
    .into_iter()
    .any(|p| count(p) > 1);
    !duplicated && (matrices == 0 || channels.len() == 1)
}

/// Channels shorter than the clip hold their last sample
fn sample_component(channel: &SourceChannel, component: usize, frame: usize) -> f32 {
    let values = &channel.components[component];
    values[frame.min(values.len() - 1)]
}

fn sample_vec3(channel: &SourceChannel, frame: usize) -> Vec3 {
    Vec3::new(
        sample_component(channel, 0, frame),
        sample_component(channel, 1, frame),
        sample_component(channel, 2, frame),
    )
}

fn sample_quat(channel: &SourceChannel, frame: usize) -> Quat {
    Quat::from_xyzw(
        sample_component(channel, 0, frame),
        sample_component(channel, 1, frame),
        sample_component(channel, 2, frame),
        sample_component(channel, 3, frame),
    )
}
