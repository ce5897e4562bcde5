use std::path::Path;
use std::time::Instant;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encode::backend::{
    BackendKind, BatchInputs, EncodeArtifact, EncodeBackend, EncodeJob, EncodeSettings,
    RemoteSettings, prepare_batch, work_dir,
};
use crate::encode::ffmpeg::{ensure_parent_dir, refuse_existing_output, remove_partial};
use crate::encode::graph::{FilterGraph, GraphInput};
use crate::encode::validate::finalize_artifact;
use crate::foundation::cancel::CancelFlag;
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// JSON manifest uploaded with every remote job.
#[derive(Debug, Serialize)]
pub struct RemoteManifest<'a> {
    /// Typed graph description.
    pub graph: &'a FilterGraph,
    /// Graph lowered to an `ffmpeg` filter string.
    pub filter_complex: String,
    /// Multipart field names of the stills, in input order.
    pub stills: Vec<RemoteStill>,
    /// Multipart field name of the WAV payload.
    pub audio: &'static str,
}

/// One still entry in a [`RemoteManifest`].
#[derive(Debug, Serialize)]
pub struct RemoteStill {
    /// Scene id.
    pub scene_id: String,
    /// Multipart field carrying the PNG.
    pub field: String,
    /// Display duration in seconds.
    pub duration_secs: f64,
}

/// Remote job lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobState {
    /// Accepted, not started.
    Queued,
    /// Transcoding.
    Running,
    /// Artifact ready for download.
    Done,
    /// Transcoder failed.
    Failed,
}

/// Body of a job status response.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RemoteJobStatus {
    /// Current state.
    pub status: RemoteJobState,
    /// Transcoder diagnostic when `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Artifact URL when `done`; defaults to `{endpoint}/jobs/{id}/artifact`.
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedJob {
    id: String,
}

const AUDIO_FIELD: &str = "audio";

/// Build the manifest for `graph`, naming stills after `scene_ids` in input order.
pub fn build_manifest<'a>(
    graph: &'a FilterGraph,
    scene_ids: &[String],
) -> StoryreelResult<RemoteManifest<'a>> {
    let stills = graph
        .inputs()
        .iter()
        .filter_map(|input| match input {
            GraphInput::StillImage { duration_secs, .. } => Some(*duration_secs),
            GraphInput::AudioFile { .. } => None,
        })
        .zip(scene_ids)
        .enumerate()
        .map(|(i, (duration_secs, id))| RemoteStill {
            scene_id: id.clone(),
            field: format!("still-{i}"),
            duration_secs,
        })
        .collect();
    Ok(RemoteManifest {
        graph,
        filter_complex: graph.filter_complex()?,
        stills,
        audio: AUDIO_FIELD,
    })
}

/// Batch export through a remote transcode service.
///
/// Protocol: `POST {endpoint}/jobs` (multipart: `manifest` JSON, `still-N` PNGs, `audio` WAV)
/// returns `{"id"}`; `GET {endpoint}/jobs/{id}` returns a [`RemoteJobStatus`]; the artifact is
/// downloaded once the job is `done`.
pub struct RemoteTranscodeBackend {
    settings: EncodeSettings,
    endpoint: String,
    client: Client,
}

impl RemoteTranscodeBackend {
    /// Create the backend. Fails without a configured endpoint.
    pub fn new(settings: EncodeSettings) -> StoryreelResult<Self> {
        let endpoint = settings
            .remote
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                StoryreelError::validation("remote backend requires an endpoint")
            })?;
        let client = Client::builder()
            .timeout(settings.remote.timeout)
            .build()
            .map_err(|e| StoryreelError::mux(format!("failed to build http client: {e}")))?;
        Ok(Self {
            settings,
            endpoint,
            client,
        })
    }

    fn remote(&self) -> &RemoteSettings {
        &self.settings.remote
    }

    fn authed(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match self.remote().api_key.as_deref() {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn submit(&self, batch: &BatchInputs) -> StoryreelResult<String> {
        let ids: Vec<String> = batch.stills.iter().map(|s| s.scene_id.to_string()).collect();
        let manifest = build_manifest(&batch.graph, &ids)?;
        let manifest_json = serde_json::to_string(&manifest)
            .map_err(|e| StoryreelError::mux(format!("failed to encode manifest: {e}")))?;

        let mut form = Form::new().part(
            "manifest",
            Part::text(manifest_json)
                .mime_str("application/json")
                .map_err(|e| StoryreelError::mux(e.to_string()))?,
        );
        for (still, entry) in batch.stills.iter().zip(&manifest.stills) {
            form = form.part(entry.field.clone(), file_part(&still.path, "image/png")?);
        }
        form = form.part(AUDIO_FIELD, file_part(&batch.audio_path, "audio/wav")?);

        let url = format!("{}/jobs", self.endpoint);
        info!(url = %url, stills = batch.stills.len(), "submitting remote transcode");
        let resp = self
            .authed(self.client.post(&url))
            .multipart(form)
            .send()
            .map_err(|e| StoryreelError::mux(format!("remote submit failed: {e}")))?;
        let created: CreatedJob = check(resp)?
            .json()
            .map_err(|e| StoryreelError::mux(format!("remote submit returned bad json: {e}")))?;
        Ok(created.id)
    }

    fn poll(&self, id: &str, cancel: &CancelFlag) -> StoryreelResult<RemoteJobStatus> {
        let url = format!("{}/jobs/{id}", self.endpoint);
        let deadline = Instant::now() + self.remote().timeout;
        loop {
            cancel.check()?;
            let resp = self
                .authed(self.client.get(&url))
                .send()
                .map_err(|e| StoryreelError::mux(format!("remote status poll failed: {e}")))?;
            let status: RemoteJobStatus = check(resp)?
                .json()
                .map_err(|e| StoryreelError::mux(format!("remote status returned bad json: {e}")))?;
            debug!(job = id, status = ?status.status, "remote job status");
            match status.status {
                RemoteJobState::Done => return Ok(status),
                RemoteJobState::Failed => {
                    return Err(StoryreelError::mux(format!(
                        "remote transcode failed: {}",
                        status.error.as_deref().unwrap_or("no diagnostic")
                    )));
                }
                RemoteJobState::Queued | RemoteJobState::Running => {}
            }
            if Instant::now() + self.remote().poll_interval > deadline {
                return Err(StoryreelError::mux(format!(
                    "remote transcode timed out after {:?}",
                    self.remote().timeout
                )));
            }
            std::thread::sleep(self.remote().poll_interval);
        }
    }

    fn download(&self, id: &str, status: &RemoteJobStatus, out: &Path) -> StoryreelResult<()> {
        let url = status
            .download_url
            .clone()
            .unwrap_or_else(|| format!("{}/jobs/{id}/artifact", self.endpoint));
        ensure_parent_dir(out)?;
        let result = (|| -> StoryreelResult<()> {
            let mut resp = check(
                self.authed(self.client.get(&url))
                    .send()
                    .map_err(|e| StoryreelError::mux(format!("artifact download failed: {e}")))?,
            )?;
            let mut file = std::fs::File::create(out).map_err(|e| {
                StoryreelError::mux(format!("failed to create '{}': {e}", out.display()))
            })?;
            resp.copy_to(&mut file)
                .map_err(|e| StoryreelError::mux(format!("artifact download failed: {e}")))?;
            Ok(())
        })();
        if result.is_err() {
            remove_partial(out);
        }
        result
    }
}

impl EncodeBackend for RemoteTranscodeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    #[tracing::instrument(skip_all, fields(out = %job.out_path.display(), endpoint = %self.endpoint))]
    fn render(&mut self, job: &EncodeJob) -> StoryreelResult<EncodeArtifact> {
        refuse_existing_output(&job.out_path, self.settings.overwrite)?;
        let work = work_dir(&self.settings)?;
        let batch = prepare_batch(job, &self.settings, work.path())?;
        job.cancel.check()?;

        let id = self.submit(&batch)?;
        let status = self.poll(&id, &job.cancel)?;
        self.download(&id, &status, &job.out_path)?;
        finalize_artifact(&job.out_path, self.settings.min_artifact_bytes)
    }
}

fn file_part(path: &Path, mime: &str) -> StoryreelResult<Part> {
    let bytes = std::fs::read(path)
        .map_err(|e| StoryreelError::mux(format!("failed to read '{}': {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Part::bytes(bytes)
        .file_name(name)
        .mime_str(mime)
        .map_err(|e| StoryreelError::mux(e.to_string()))
}

fn check(resp: Response) -> StoryreelResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(StoryreelError::mux(format!(
        "remote transcode returned {status}: {}",
        body.trim()
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/remote.rs"]
mod tests;
