use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Fps;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Stable scene identity, used as the key for resolved assets and placeholders.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One timed segment of a script.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Unique, stable identity.
    pub id: SceneId,
    /// Display duration in seconds (> 0).
    pub duration: f64,
    /// Text spoken over the scene.
    #[serde(rename = "narration")]
    pub narration_text: String,
    /// Title burned into the frame.
    pub overlay_text: String,
    /// Image search query (not a URL).
    pub image_keyword: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneDef {
    #[serde(default)]
    id: Option<String>,
    duration: f64,
    #[serde(default, alias = "narrationText", alias = "narration_text")]
    narration: String,
    #[serde(default, alias = "overlay_text", alias = "title")]
    overlay_text: String,
    #[serde(default, alias = "image_keyword")]
    image_keyword: String,
}

#[derive(Debug, Deserialize)]
struct ScriptDef {
    #[serde(default)]
    title: String,
    scenes: Vec<SceneDef>,
}

/// Validated, ordered, contiguous sequence of scenes.
///
/// Start offsets are precomputed once so every consumer (preview, audio stitching, export) agrees
/// on the same time axis.
#[derive(Clone, Debug)]
pub struct Script {
    title: String,
    scenes: Vec<Scene>,
    starts: Vec<f64>,
    total: f64,
}

impl Script {
    /// Validate scenes and build the time axis.
    pub fn new(title: impl Into<String>, scenes: Vec<Scene>) -> StoryreelResult<Self> {
        if scenes.is_empty() {
            return Err(StoryreelError::validation(
                "script must contain at least one scene",
            ));
        }

        let mut seen = HashSet::with_capacity(scenes.len());
        let mut starts = Vec::with_capacity(scenes.len());
        let mut acc = 0.0f64;
        for (i, scene) in scenes.iter().enumerate() {
            if !scene.duration.is_finite() || scene.duration <= 0.0 {
                return Err(StoryreelError::validation(format!(
                    "scene {i} ('{}') duration must be finite and > 0, got {}",
                    scene.id, scene.duration
                )));
            }
            if scene.id.0.trim().is_empty() {
                return Err(StoryreelError::validation(format!(
                    "scene {i} id must be non-empty"
                )));
            }
            if !seen.insert(scene.id.clone()) {
                return Err(StoryreelError::validation(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            starts.push(acc);
            acc += scene.duration;
        }

        Ok(Self {
            title: title.into(),
            scenes,
            starts,
            total: acc,
        })
    }

    /// Parse a script from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> StoryreelResult<Self> {
        let def: ScriptDef = serde_json::from_reader(r)
            .map_err(|e| StoryreelError::validation(format!("parse script JSON: {e}")))?;
        Self::from_def(def)
    }

    /// Parse a script from a JSON string.
    pub fn from_json_str(s: &str) -> StoryreelResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Parse a script from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> StoryreelResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            StoryreelError::validation(format!("open script JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    fn from_def(def: ScriptDef) -> StoryreelResult<Self> {
        let scenes = def
            .scenes
            .into_iter()
            .enumerate()
            .map(|(i, s)| Scene {
                id: SceneId(s.id.unwrap_or_else(|| format!("scene-{i}"))),
                duration: s.duration,
                narration_text: s.narration,
                overlay_text: s.overlay_text,
                image_keyword: s.image_keyword,
            })
            .collect();
        Self::new(def.title, scenes)
    }

    /// Script title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Scenes in timeline order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Number of scenes (always >= 1).
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Always `false`: validation rejects empty scripts.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scene at `index`, if any.
    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    /// Sum of all scene durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.total
    }

    /// Start offset of scene `index` in seconds.
    pub fn start_time(&self, index: usize) -> Option<f64> {
        self.starts.get(index).copied()
    }

    pub(crate) fn starts(&self) -> &[f64] {
        &self.starts
    }

    /// First sample of scene `index` at `sample_rate`: `floor(start × rate)`.
    pub fn start_sample(&self, index: usize, sample_rate: u32) -> Option<u64> {
        self.start_time(index)
            .map(|s| (s * f64::from(sample_rate)).floor().max(0.0) as u64)
    }

    /// Timeline length in samples: `ceil(total × rate)`.
    pub fn total_samples(&self, sample_rate: u32) -> u64 {
        (self.total * f64::from(sample_rate)).ceil().max(0.0) as u64
    }

    /// Timeline length in frames: `ceil(total × fps)`.
    pub fn frame_count(&self, fps: Fps) -> u64 {
        fps.secs_to_frames_ceil(self.total)
    }

    /// Presentation time of `frame` in seconds.
    pub fn time_of_frame(&self, frame: u64, fps: Fps) -> f64 {
        fps.frames_to_secs(frame)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
