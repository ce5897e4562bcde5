use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::assets::resolver::ResolvedAssets;
use crate::foundation::cancel::CancelFlag;
use crate::foundation::core::Canvas;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::render::compositor::{Compositor, CompositorOpts, FrameInput};
use crate::render::text::FontSet;
use crate::timeline::model::{SceneId, Script};

/// One materialized HD still: the scene's frame at progress 0.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StillFrame {
    /// Scene the still belongs to.
    pub scene_id: SceneId,
    /// PNG on disk.
    pub path: PathBuf,
    /// How long the still is shown.
    pub duration_secs: f64,
}

/// Inputs shared by every still worker.
pub struct StillsRequest<'a> {
    /// Script to materialize.
    pub script: &'a Script,
    /// Resolved images.
    pub assets: &'a ResolvedAssets,
    /// Compositor options; each worker builds its own compositor from them.
    pub compositor: &'a CompositorOpts,
    /// Fonts shared across workers.
    pub fonts: &'a FontSet,
    /// Output resolution.
    pub canvas: Canvas,
    /// Directory receiving `scene-NNN.png` files.
    pub out_dir: &'a Path,
    /// Worker threads; `None` uses rayon defaults.
    pub threads: Option<usize>,
}

/// File name of scene `index`'s still.
pub fn still_file_name(index: usize) -> String {
    format!("scene-{index:03}.png")
}

/// Render one still per scene in parallel, returned in scene order.
///
/// Each worker owns one compositor. `cancel` is checked before every scene.
#[tracing::instrument(skip_all, fields(scenes = req.script.len(), out = %req.out_dir.display()))]
pub fn materialize_stills(
    req: &StillsRequest<'_>,
    cancel: &CancelFlag,
) -> StoryreelResult<Vec<StillFrame>> {
    req.canvas.validate()?;
    std::fs::create_dir_all(req.out_dir).map_err(|e| {
        StoryreelError::composition(format!(
            "failed to create stills directory '{}': {e}",
            req.out_dir.display()
        ))
    })?;
    let pool = build_thread_pool(req.threads)?;

    let scenes: Vec<_> = req.script.scenes().iter().enumerate().collect();
    let rendered = pool.install(|| {
        scenes
            .par_iter()
            .map_init(
                || Compositor::with_fonts(req.compositor.clone(), req.fonts),
                |worker, &(index, scene)| -> StoryreelResult<StillFrame> {
                    cancel.check()?;
                    let compositor = match worker {
                        Ok(c) => c,
                        Err(e) => return Err(StoryreelError::composition(e.to_string())),
                    };
                    let frame = compositor.compose(
                        &FrameInput {
                            scene,
                            image: req.assets.image(&scene.id),
                            progress: 0.0,
                            recording: false,
                        },
                        req.canvas,
                    )?;
                    let path = req.out_dir.join(still_file_name(index));
                    frame.save_png(&path).map_err(|e| {
                        StoryreelError::composition(format!(
                            "scene '{}': failed to write still: {e}",
                            scene.id
                        ))
                    })?;
                    debug!(scene = %scene.id, path = %path.display(), "still written");
                    Ok(StillFrame {
                        scene_id: scene.id.clone(),
                        path,
                        duration_secs: scene.duration,
                    })
                },
            )
            .collect::<Vec<_>>()
    });

    let stills = rendered.into_iter().collect::<StoryreelResult<Vec<_>>>()?;
    info!(count = stills.len(), "stills materialized");
    Ok(stills)
}

/// Hard preconditions before any transcoder runs.
///
/// Every scene needs a still file on disk (in scene order) and `audio` must exist and be
/// non-empty.
pub fn check_preconditions(
    script: &Script,
    stills: &[StillFrame],
    audio: &Path,
) -> StoryreelResult<()> {
    for (i, scene) in script.scenes().iter().enumerate() {
        let ok = stills
            .get(i)
            .is_some_and(|s| s.scene_id == scene.id && s.path.is_file());
        if !ok {
            return Err(StoryreelError::MissingStill {
                scene: scene.id.to_string(),
            });
        }
    }
    match std::fs::metadata(audio) {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(()),
        Ok(_) => Err(StoryreelError::MissingAudio(format!(
            "'{}' is empty",
            audio.display()
        ))),
        Err(e) => Err(StoryreelError::MissingAudio(format!(
            "'{}': {e}",
            audio.display()
        ))),
    }
}

fn build_thread_pool(threads: Option<usize>) -> StoryreelResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(StoryreelError::validation(
            "stills 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| StoryreelError::composition(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/stills.rs"]
mod tests;
