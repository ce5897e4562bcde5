use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::assets::resolver::ResolvedAssets;
use crate::audio::master::{MasterAudioOpts, synthesize_master};
use crate::foundation::core::{Canvas, Fps};
use crate::timeline::model::{Scene, SceneId, Script};

fn graph() -> FilterGraph {
    FilterGraph::for_stills(
        Canvas::PREVIEW,
        Fps::EXPORT,
        [(Path::new("s0.png"), 2.0), (Path::new("s1.png"), 3.0)],
        Path::new("master.wav"),
    )
    .unwrap()
}

#[test]
fn manifest_lists_stills_in_input_order() {
    let g = graph();
    let ids = vec!["intro".to_string(), "outro".to_string()];
    let m = build_manifest(&g, &ids).unwrap();
    assert_eq!(m.stills.len(), 2);
    assert_eq!(m.stills[1].scene_id, "outro");
    assert_eq!(m.stills[1].field, "still-1");
    assert_eq!(m.stills[1].duration_secs, 3.0);
    assert_eq!(m.filter_complex, g.filter_complex().unwrap());

    let v = serde_json::to_value(&m).unwrap();
    assert_eq!(v["audio"], "audio");
    assert_eq!(v["graph"]["nodes"][2]["kind"], "concat");
}

#[test]
fn status_parsing() {
    let s: RemoteJobStatus = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
    assert_eq!(s.status, RemoteJobState::Running);
    assert_eq!(s.download_url, None);

    let s: RemoteJobStatus =
        serde_json::from_str(r#"{"status":"failed","error":"codec exploded"}"#).unwrap();
    assert_eq!(s.status, RemoteJobState::Failed);
    assert_eq!(s.error.as_deref(), Some("codec exploded"));

    assert!(serde_json::from_str::<RemoteJobStatus>(r#"{"status":"weird"}"#).is_err());
}

#[test]
fn endpoint_is_required() {
    let err = RemoteTranscodeBackend::new(EncodeSettings::default())
        .err()
        .unwrap();
    assert!(matches!(err, StoryreelError::Validation(_)));

    let mut settings = EncodeSettings::default();
    settings.remote.endpoint = Some("http://127.0.0.1:9/".to_string());
    settings.remote.timeout = Duration::from_secs(2);
    let backend = RemoteTranscodeBackend::new(settings).unwrap();
    assert_eq!(backend.endpoint, "http://127.0.0.1:9");
    assert_eq!(backend.kind(), BackendKind::Remote);
}

#[test]
fn unreachable_service_fails_poll_with_mux_error() {
    let mut settings = EncodeSettings::default();
    settings.remote.endpoint = Some("http://127.0.0.1:9".to_string());
    settings.remote.timeout = Duration::from_secs(2);
    let backend = RemoteTranscodeBackend::new(settings).unwrap();
    let err = backend.poll("job-1", &CancelFlag::new()).unwrap_err();
    assert!(matches!(err, StoryreelError::Mux(_)));
}

#[test]
fn cancelled_poll_returns_immediately() {
    let mut settings = EncodeSettings::default();
    settings.remote.endpoint = Some("http://127.0.0.1:9".to_string());
    let backend = RemoteTranscodeBackend::new(settings).unwrap();
    let cancel = CancelFlag::new();
    cancel.cancel();
    assert!(matches!(
        backend.poll("job-1", &cancel),
        Err(StoryreelError::Cancelled)
    ));
}

/// One canned HTTP response. `declared_len` larger than the body simulates a dropped transfer.
struct Reply {
    status: u16,
    body: Vec<u8>,
    declared_len: Option<usize>,
}

impl Reply {
    fn json(body: &str) -> Self {
        Self {
            status: 200,
            body: body.as_bytes().to_vec(),
            declared_len: None,
        }
    }
}

fn read_line(r: &mut impl BufRead) -> String {
    let mut line = String::new();
    r.read_line(&mut line).unwrap();
    line
}

/// Read one request and return its method and path. The body is drained and discarded.
fn read_request(stream: &TcpStream) -> (String, String) {
    let mut r = BufReader::new(stream.try_clone().unwrap());
    let start = read_line(&mut r);
    let mut parts = start.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut chunked = false;
    loop {
        let h = read_line(&mut r);
        if h.trim().is_empty() {
            break;
        }
        if let Some((k, v)) = h.split_once(':') {
            if k.eq_ignore_ascii_case("content-length") {
                content_length = v.trim().parse().unwrap();
            } else if k.eq_ignore_ascii_case("transfer-encoding") {
                chunked = v.trim().eq_ignore_ascii_case("chunked");
            }
        }
    }
    if chunked {
        loop {
            let size = usize::from_str_radix(read_line(&mut r).trim(), 16).unwrap();
            let mut chunk = vec![0u8; size + 2];
            r.read_exact(&mut chunk).unwrap();
            if size == 0 {
                break;
            }
        }
    } else {
        let mut body = vec![0u8; content_length];
        r.read_exact(&mut body).unwrap();
    }
    (method, path)
}

/// Serve `handler` on a loopback port; returns the base URL and a log of `METHOD path` lines.
fn serve<F>(handler: F) -> (String, Arc<Mutex<Vec<String>>>)
where
    F: Fn(&str, &str) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let (method, path) = read_request(&stream);
            seen.lock().unwrap().push(format!("{method} {path}"));
            let reply = handler(&method, &path);
            let head = format!(
                "HTTP/1.1 {} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reply.declared_len.unwrap_or(reply.body.len())
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&reply.body);
        }
    });
    (format!("http://{addr}"), log)
}

/// Accepts the job, reports `running` once, then `terminal`; the artifact is `artifact`.
fn transcode_service(terminal: &'static str, artifact: Reply) -> (String, Arc<Mutex<Vec<String>>>) {
    let polls = AtomicU32::new(0);
    let artifact = Mutex::new(Some(artifact));
    serve(move |method, path| match (method, path) {
        ("POST", "/jobs") => Reply::json(r#"{"id":"j1"}"#),
        ("GET", "/jobs/j1") => {
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Reply::json(r#"{"status":"running"}"#)
            } else {
                Reply::json(terminal)
            }
        }
        ("GET", "/jobs/j1/artifact") => artifact.lock().unwrap().take().unwrap_or(Reply {
            status: 404,
            body: Vec::new(),
            declared_len: None,
        }),
        _ => Reply {
            status: 404,
            body: Vec::new(),
            declared_len: None,
        },
    })
}

fn job(out_path: std::path::PathBuf) -> EncodeJob {
    let scene = |id: &str| Scene {
        id: SceneId::from(id),
        duration: 1.0,
        narration_text: String::new(),
        overlay_text: String::new(),
        image_keyword: String::new(),
    };
    let script = Arc::new(Script::new("t", vec![scene("a"), scene("b")]).unwrap());
    let master = synthesize_master(
        &script,
        &HashMap::new(),
        MasterAudioOpts {
            sample_rate: 8_000,
            ..MasterAudioOpts::default()
        },
    )
    .unwrap();
    EncodeJob {
        script,
        assets: Arc::new(ResolvedAssets::default()),
        master: Arc::new(master),
        out_path,
        cancel: CancelFlag::new(),
    }
}

fn backend(endpoint: String, work: &Path) -> RemoteTranscodeBackend {
    let mut settings = EncodeSettings {
        canvas: Canvas::new(18, 32).unwrap(),
        fps: Fps::new(10, 1).unwrap(),
        work_dir: Some(work.to_path_buf()),
        ..EncodeSettings::default()
    };
    settings.remote.endpoint = Some(endpoint);
    settings.remote.poll_interval = Duration::from_millis(10);
    settings.remote.timeout = Duration::from_secs(10);
    RemoteTranscodeBackend::new(settings).unwrap()
}

#[test]
fn finished_job_is_downloaded() {
    let (url, log) = transcode_service(
        r#"{"status":"done"}"#,
        Reply {
            status: 200,
            body: vec![7u8; 2048],
            declared_len: None,
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.mp4");

    let artifact = backend(url, dir.path()).render(&job(out.clone())).unwrap();
    assert_eq!(artifact.path, out);
    assert_eq!(artifact.byte_size, 2048);
    assert_eq!(std::fs::read(&out).unwrap(), vec![7u8; 2048]);

    let log = log.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![
            "POST /jobs",
            "GET /jobs/j1",
            "GET /jobs/j1",
            "GET /jobs/j1/artifact"
        ]
    );
}

#[test]
fn failed_job_surfaces_the_transcoder_diagnostic() {
    let (url, log) = transcode_service(
        r#"{"status":"failed","error":"x264 crashed on segment 2"}"#,
        Reply::json("{}"),
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.mp4");

    let err = backend(url, dir.path()).render(&job(out.clone())).unwrap_err();
    assert!(matches!(err, StoryreelError::Mux(_)), "{err}");
    assert!(err.to_string().contains("x264 crashed on segment 2"));
    assert!(!out.exists());
    assert!(!log.lock().unwrap().iter().any(|l| l.ends_with("/artifact")));
}

#[test]
fn interrupted_download_leaves_no_partial_file() {
    let (url, _log) = transcode_service(
        r#"{"status":"done"}"#,
        Reply {
            status: 200,
            body: vec![1u8; 100],
            declared_len: Some(4096),
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.mp4");

    let err = backend(url, dir.path()).render(&job(out.clone())).unwrap_err();
    assert!(matches!(err, StoryreelError::Mux(_)), "{err}");
    assert!(!out.exists());
}
