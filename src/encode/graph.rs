use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Index of a [`GraphInput`] in declaration order (also its `ffmpeg` input index).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InputId(pub usize);

/// Index of a [`GraphNode`] in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Media entering the graph.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphInput {
    /// A still image looped for `duration_secs`.
    StillImage {
        /// Image file.
        path: PathBuf,
        /// Display duration in seconds.
        duration_secs: f64,
    },
    /// An audio file used as-is.
    AudioFile {
        /// Audio file.
        path: PathBuf,
    },
}

/// Processing step. Edges are the input and node ids each variant names.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphNode {
    /// Still scaled to cover the canvas, center-cropped, resampled to the graph rate, yuv420p.
    ScaledSegment {
        /// Source still.
        input: InputId,
    },
    /// Video segments joined in order.
    Concat {
        /// Segment nodes, in playback order.
        segments: Vec<NodeId>,
    },
    /// Audio stream taken from an input.
    AudioTrack {
        /// Source audio.
        input: InputId,
    },
}

/// How the output length is chosen when video and audio differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    /// Stop at the end of the shorter stream.
    #[default]
    Shortest,
    /// Keep the longer stream.
    Longest,
}

/// Typed description of how per-scene segments and the master audio combine into one output.
///
/// Nodes can only reference inputs and earlier nodes, so the graph is acyclic by construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterGraph {
    canvas: Canvas,
    fps: Fps,
    inputs: Vec<GraphInput>,
    nodes: Vec<GraphNode>,
    video_out: Option<NodeId>,
    audio_out: Option<NodeId>,
    trim: TrimPolicy,
}

impl FilterGraph {
    /// Empty graph producing `canvas` at `fps`.
    pub fn new(canvas: Canvas, fps: Fps) -> Self {
        Self {
            canvas,
            fps,
            inputs: Vec::new(),
            nodes: Vec::new(),
            video_out: None,
            audio_out: None,
            trim: TrimPolicy::Shortest,
        }
    }

    /// Standard export graph: one scaled segment per still, concatenated, plus one audio track.
    pub fn for_stills<'a>(
        canvas: Canvas,
        fps: Fps,
        stills: impl IntoIterator<Item = (&'a Path, f64)>,
        audio: &Path,
    ) -> StoryreelResult<Self> {
        let mut g = Self::new(canvas, fps);
        let mut segments = Vec::new();
        for (path, duration_secs) in stills {
            let input = g.add_still(path, duration_secs)?;
            segments.push(g.scaled_segment(input)?);
        }
        let video = g.concat(segments)?;
        let audio_in = g.add_audio(audio);
        let audio = g.audio_track(audio_in)?;
        g.set_outputs(video, audio)?;
        Ok(g)
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Output frame rate.
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Declared inputs.
    pub fn inputs(&self) -> &[GraphInput] {
        &self.inputs
    }

    /// Declared nodes.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Output trim policy.
    pub fn trim(&self) -> TrimPolicy {
        self.trim
    }

    /// Override the output trim policy.
    pub fn set_trim(&mut self, trim: TrimPolicy) {
        self.trim = trim;
    }

    /// Sum of still durations, in seconds.
    pub fn video_duration_secs(&self) -> f64 {
        self.inputs
            .iter()
            .map(|i| match i {
                GraphInput::StillImage { duration_secs, .. } => *duration_secs,
                GraphInput::AudioFile { .. } => 0.0,
            })
            .sum()
    }

    /// Declare a still input.
    pub fn add_still(&mut self, path: &Path, duration_secs: f64) -> StoryreelResult<InputId> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(StoryreelError::validation(format!(
                "still '{}' duration must be finite and > 0, got {duration_secs}",
                path.display()
            )));
        }
        self.inputs.push(GraphInput::StillImage {
            path: path.to_path_buf(),
            duration_secs,
        });
        Ok(InputId(self.inputs.len() - 1))
    }

    /// Declare an audio input.
    pub fn add_audio(&mut self, path: &Path) -> InputId {
        self.inputs.push(GraphInput::AudioFile {
            path: path.to_path_buf(),
        });
        InputId(self.inputs.len() - 1)
    }

    /// Add a [`GraphNode::ScaledSegment`] over a still input.
    pub fn scaled_segment(&mut self, input: InputId) -> StoryreelResult<NodeId> {
        match self.inputs.get(input.0) {
            Some(GraphInput::StillImage { .. }) => Ok(self.push(GraphNode::ScaledSegment { input })),
            _ => Err(StoryreelError::validation(format!(
                "scaled segment input {} is not a still",
                input.0
            ))),
        }
    }

    /// Add a [`GraphNode::Concat`] over segment nodes.
    pub fn concat(&mut self, segments: Vec<NodeId>) -> StoryreelResult<NodeId> {
        if segments.is_empty() {
            return Err(StoryreelError::validation("concat needs at least one segment"));
        }
        for s in &segments {
            if !matches!(self.nodes.get(s.0), Some(GraphNode::ScaledSegment { .. })) {
                return Err(StoryreelError::validation(format!(
                    "concat member {} is not a scaled segment",
                    s.0
                )));
            }
        }
        Ok(self.push(GraphNode::Concat { segments }))
    }

    /// Add a [`GraphNode::AudioTrack`] over an audio input.
    pub fn audio_track(&mut self, input: InputId) -> StoryreelResult<NodeId> {
        match self.inputs.get(input.0) {
            Some(GraphInput::AudioFile { .. }) => Ok(self.push(GraphNode::AudioTrack { input })),
            _ => Err(StoryreelError::validation(format!(
                "audio track input {} is not an audio file",
                input.0
            ))),
        }
    }

    /// Select the video and audio output nodes.
    pub fn set_outputs(&mut self, video: NodeId, audio: NodeId) -> StoryreelResult<()> {
        match self.nodes.get(video.0) {
            Some(GraphNode::Concat { .. } | GraphNode::ScaledSegment { .. }) => {}
            _ => return Err(StoryreelError::validation("video output must be a video node")),
        }
        if !matches!(self.nodes.get(audio.0), Some(GraphNode::AudioTrack { .. })) {
            return Err(StoryreelError::validation("audio output must be an audio track"));
        }
        self.video_out = Some(video);
        self.audio_out = Some(audio);
        Ok(())
    }

    fn push(&mut self, node: GraphNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn outputs(&self) -> StoryreelResult<(NodeId, InputId)> {
        let video = self
            .video_out
            .ok_or_else(|| StoryreelError::validation("filter graph has no video output"))?;
        let audio = match self.audio_out.and_then(|a| self.nodes.get(a.0)) {
            Some(GraphNode::AudioTrack { input }) => *input,
            _ => return Err(StoryreelError::validation("filter graph has no audio output")),
        };
        Ok((video, audio))
    }

    /// The `-filter_complex` string. Node `n` is labelled `[n{n}]`.
    pub fn filter_complex(&self) -> StoryreelResult<String> {
        self.outputs()?;
        let (w, h) = (self.canvas.width, self.canvas.height);
        let rate = self.fps.to_ffmpeg_rate();
        let mut parts = Vec::new();
        for (n, node) in self.nodes.iter().enumerate() {
            match node {
                GraphNode::ScaledSegment { input } => parts.push(format!(
                    "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},\
                     setsar=1,fps={rate},format=yuv420p[n{n}]",
                    i = input.0
                )),
                GraphNode::Concat { segments } => {
                    let mut s = String::new();
                    for seg in segments {
                        let _ = write!(s, "[n{}]", seg.0);
                    }
                    let _ = write!(s, "concat=n={}:v=1:a=0[n{n}]", segments.len());
                    parts.push(s);
                }
                // Audio is mapped straight from its input.
                GraphNode::AudioTrack { .. } => {}
            }
        }
        Ok(parts.join(";"))
    }
}

/// Lower `graph` into an `ffmpeg` argument list writing `out_path`.
pub fn lower_to_ffmpeg_args(
    graph: &FilterGraph,
    out_path: &Path,
    overwrite: bool,
) -> StoryreelResult<Vec<OsString>> {
    let (video, audio) = graph.outputs()?;
    let filter = graph.filter_complex()?;
    let rate = graph.fps.to_ffmpeg_rate();

    let mut args: Vec<OsString> = Vec::new();
    let push = |args: &mut Vec<OsString>, parts: &[&str]| {
        args.extend(parts.iter().map(OsString::from));
    };
    push(&mut args, &[if overwrite { "-y" } else { "-n" }, "-loglevel", "error"]);
    for input in &graph.inputs {
        match input {
            GraphInput::StillImage {
                path,
                duration_secs,
            } => {
                let t = duration_secs.to_string();
                push(&mut args, &["-loop", "1", "-framerate", rate.as_str(), "-t", t.as_str(), "-i"]);
                args.push(path.as_os_str().to_os_string());
            }
            GraphInput::AudioFile { path } => {
                push(&mut args, &["-i"]);
                args.push(path.as_os_str().to_os_string());
            }
        }
    }

    let video_map = format!("[n{}]", video.0);
    let audio_map = format!("{}:a", audio.0);
    push(
        &mut args,
        &[
            "-filter_complex",
            filter.as_str(),
            "-map",
            video_map.as_str(),
            "-map",
            audio_map.as_str(),
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-r",
            rate.as_str(),
            "-c:a",
            "aac",
        ],
    );
    if graph.trim == TrimPolicy::Shortest {
        push(&mut args, &["-shortest"]);
    }
    push(&mut args, &["-movflags", "+faststart"]);
    args.push(out_path.as_os_str().to_os_string());
    Ok(args)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/graph.rs"]
mod tests;
