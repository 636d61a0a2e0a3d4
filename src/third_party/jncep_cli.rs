//! Drives `jncep epub` as a child process.
//!
//! Credentials travel through the child's environment (`JNCEP_EMAIL` /
//! `JNCEP_PASSWORD`), which jncep reads natively, so they never show up in a
//! process listing.

use std::cmp::Ordering;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info, warn};

use super::{ArtifactGenerator, GenerationError};
use crate::base_system::context::{ENV_EMAIL, ENV_PASSWORD};
use crate::download::models::GenerationRequest;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_DETAIL_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct JncepCli {
    program: String,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl JncepCli {
    /// `command` may carry leading arguments, e.g. `python3 -m jncep`.
    pub fn new(command: &str, timeout: Duration) -> Self {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next().unwrap_or_else(|| "jncep".to_string());
        Self {
            program,
            leading_args: words.collect(),
            timeout,
        }
    }

    fn command(&self, request: &GenerationRequest, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("epub")
            .arg("--output")
            .arg(output_dir)
            .arg("--byvolume");
        if let Some(parts) = request.part_range.as_arg() {
            cmd.arg("--parts").arg(parts);
        }
        cmd.arg(&request.source_url)
            .env(ENV_EMAIL, &request.credentials.email)
            .env(ENV_PASSWORD, &request.credentials.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut cmd);
        cmd
    }
}

impl ArtifactGenerator for JncepCli {
    fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError> {
        info!(
            target: "jncep",
            url = %request.source_url,
            parts = %request.part_range,
            "running jncep"
        );

        let mut child = self
            .command(request, output_dir)
            .spawn()
            .map_err(GenerationError::Launch)?;

        // Drain both pipes so a chatty child never blocks on a full buffer.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        // On timeout the reader threads are left behind: a process outside the
        // killed group may still hold the pipes open.
        let status = wait_with_timeout(&mut child, self.timeout)?;

        let out_text = stdout.map(join_reader).unwrap_or_default();
        let err_text = stderr.map(join_reader).unwrap_or_default();
        for line in out_text.lines().filter(|l| !l.trim().is_empty()) {
            debug!(target: "jncep", "{line}");
        }

        if !status.success() {
            for line in err_text.lines().filter(|l| !l.trim().is_empty()) {
                warn!(target: "jncep", "{line}");
            }
            return Err(classify_failure(status.code(), &err_text));
        }

        let files = collect_epubs(output_dir).map_err(GenerationError::Launch)?;
        info!(target: "jncep", count = files.len(), "jncep finished");
        Ok(files)
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, GenerationError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(GenerationError::Launch)? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            warn!(target: "jncep", timeout_secs = timeout.as_secs(), "jncep timed out, killing it");
            kill_tree(child);
            let _ = child.wait();
            return Err(GenerationError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kills the child and, on unix, every process left in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id())
            && let Err(err) = killpg(Pid::from_raw(pid), Signal::SIGKILL)
        {
            debug!(target: "jncep", error = %err, "process group kill failed");
        }
    }
    let _ = child.kill();
}

fn http_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)client error '(\d{3})|\b(40[124])\s+(?:unauthorized|payment required|not found)\b",
        )
        .expect("http status regex")
    })
}

fn traceback_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*File ".*", line \d+"#).expect("traceback frame regex")
    })
}

/// The parts of stderr worth classifying: traceback headers, frames and the
/// source lines under them are dropped, keeping messages and the final
/// exception line.
fn messages(stderr: &str) -> String {
    let mut kept = Vec::new();
    let mut in_frame = false;
    for line in stderr.lines() {
        if traceback_frame_re().is_match(line) {
            in_frame = true;
            continue;
        }
        if in_frame && line.starts_with(char::is_whitespace) {
            continue;
        }
        in_frame = false;
        if line.trim_start().starts_with("Traceback (most recent call last)") {
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

fn http_status(text: &str) -> Option<u16> {
    http_status_re().captures_iter(text).find_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Maps a failed run onto an error kind using what jncep printed.
pub(crate) fn classify_failure(code: Option<i32>, stderr: &str) -> GenerationError {
    let text = messages(stderr);
    let lower = text.to_lowercase();
    let detail = last_line(stderr);
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    match http_status(&text) {
        Some(402) => return GenerationError::PaymentRequired(detail),
        Some(401) => return GenerationError::Auth(detail),
        Some(404) => return GenerationError::NotFound(detail),
        _ => {}
    }

    if has(&["payment required"]) {
        GenerationError::PaymentRequired(detail)
    } else if has(&[
        "unauthorized",
        "invalid login",
        "login failed",
        "bad credentials",
    ]) {
        GenerationError::Auth(detail)
    } else if has(&["badweburlerror", "not found", "invalid url"]) {
        GenerationError::NotFound(detail)
    } else if has(&["part spec", "invalid part", "out of range", "no parts"]) {
        GenerationError::Range(detail)
    } else if has(&[
        "connecterror",
        "connecttimeout",
        "readtimeout",
        "timed out",
        "network",
        "connection",
    ]) {
        GenerationError::Network(detail)
    } else {
        GenerationError::Failed { code, detail }
    }
}

fn last_line(text: &str) -> String {
    let line = text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output");
    line.chars().take(MAX_DETAIL_CHARS).collect()
}

/// `*.epub` files in `dir`, ordered so that `Volume_9` comes before `Volume_10`.
pub(crate) fn collect_epubs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_epub = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
        if is_epub && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk {
    Num(u64),
    Text(String),
}

fn chunks(name: &str) -> Vec<Chunk> {
    let mut out = Vec::new();
    let mut chars = name.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            let mut n: u64 = 0;
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                n = n.saturating_mul(10).saturating_add(u64::from(d));
                chars.next();
            }
            out.push(Chunk::Num(n));
        } else {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    break;
                }
                s.extend(c.to_lowercase());
                chars.next();
            }
            out.push(Chunk::Text(s));
        }
    }
    out
}

pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::credentials::Credentials;
    use crate::base_system::part_range::PartSelection;

    fn request(parts: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            source_url: "https://j-novel.club/series/example".into(),
            part_range: PartSelection::parse(parts).unwrap(),
            credentials: Credentials {
                email: "reader@example.com".into(),
                password: "hunter2".into(),
            },
        }
    }

    #[test]
    fn command_line_carries_range_but_not_secrets() {
        let cli = JncepCli::new("python3 -m jncep", Duration::from_secs(5));
        let cmd = cli.command(&request(Some("4.1")), Path::new("/tmp/out"));

        assert_eq!(cmd.get_program(), "python3");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "-m",
                "jncep",
                "epub",
                "--output",
                "/tmp/out",
                "--byvolume",
                "--parts",
                "4.1:4.1",
                "https://j-novel.club/series/example",
            ]
        );
        assert!(!args.iter().any(|a| a.contains("hunter2")));

        let envs: Vec<(String, String)> = cmd
            .get_envs()
            .filter_map(|(k, v)| {
                Some((
                    k.to_string_lossy().into_owned(),
                    v?.to_string_lossy().into_owned(),
                ))
            })
            .collect();
        assert!(envs.contains(&(ENV_PASSWORD.to_string(), "hunter2".to_string())));
        assert!(envs.contains(&(ENV_EMAIL.to_string(), "reader@example.com".to_string())));
    }

    #[test]
    fn all_parts_omits_parts_flag() {
        let cli = JncepCli::new("jncep", Duration::from_secs(5));
        let cmd = cli.command(&request(None), Path::new("/tmp/out"));
        assert_eq!(cmd.get_program(), "jncep");
        assert!(!cmd.get_args().any(|a| a == "--parts"));
    }

    #[test]
    fn failures_are_classified_from_stderr() {
        let cases: [(&str, fn(&GenerationError) -> bool); 6] = [
            (
                "httpx.HTTPStatusError: Client error '402 Payment Required'",
                |e| matches!(e, GenerationError::PaymentRequired(_)),
            ),
            (
                "httpx.HTTPStatusError: Client error '401 Unauthorized' for url",
                |e| matches!(e, GenerationError::Auth(_)),
            ),
            (
                "jncep.jncweb.BadWebURLError: Invalid URL",
                |e| matches!(e, GenerationError::NotFound(_)),
            ),
            (
                "Invalid part spec: 99.1 is out of range",
                |e| matches!(e, GenerationError::Range(_)),
            ),
            (
                "httpx.ConnectError: [Errno -3] Temporary failure in name resolution",
                |e| matches!(e, GenerationError::Network(_)),
            ),
            ("Traceback ...\nKeyError: 'volumes'", |e| {
                matches!(e, GenerationError::Failed { code: Some(1), .. })
            }),
        ];

        for (stderr, check) in cases {
            let err = classify_failure(Some(1), stderr);
            assert!(check(&err), "{stderr} -> {err:?}");
        }
    }

    #[test]
    fn traceback_line_numbers_do_not_look_like_status_codes() {
        let stderr = r#"Traceback (most recent call last):
  File "/usr/lib/python3/site-packages/httpx/_transports/default.py", line 402, in handle_request
    resp = self._pool.handle_request(req)
  File "/usr/lib/python3/site-packages/httpcore/_sync/connection.py", line 1401, in connect
    stream = self._connect(request)
  File "/usr/lib/python3/site-packages/jncep/jncweb.py", line 404, in fetch
    raise NotFoundWrapper()
httpx.ConnectError: [Errno 111] Connection refused"#;

        match classify_failure(Some(1), stderr) {
            GenerationError::Network(detail) => {
                assert_eq!(detail, "httpx.ConnectError: [Errno 111] Connection refused")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_codes_count_only_in_http_context() {
        let stderr = "Traceback (most recent call last):\n  \
            File \"/x/jncep/core.py\", line 401, in run\n    \
            do_it()\n\
            httpx.HTTPStatusError: Client error '404 Not Found' for url 'https://labs.j-novel.club/app/v1/me'";
        assert!(matches!(
            classify_failure(Some(1), stderr),
            GenerationError::NotFound(_)
        ));

        let plain = "Processed 401 chapters\nKeyError: 'volumes'";
        assert!(matches!(
            classify_failure(Some(1), plain),
            GenerationError::Failed { .. }
        ));
    }

    #[test]
    fn detail_is_last_non_empty_line() {
        let err = classify_failure(Some(2), "first\n\n  KeyError: 'volumes'  \n\n");
        match err {
            GenerationError::Failed { detail, .. } => assert_eq!(detail, "KeyError: 'volumes'"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn natural_ordering_of_volume_files() {
        let mut names = vec![
            "Series_Volume_10.epub",
            "Series_Volume_2.epub",
            "Series_Volume_9.epub",
            "Series_Volume_1.epub",
        ];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            names,
            [
                "Series_Volume_1.epub",
                "Series_Volume_2.epub",
                "Series_Volume_9.epub",
                "Series_Volume_10.epub",
            ]
        );
    }

    #[test]
    fn collects_only_epubs_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["B_Volume_10.epub", "B_Volume_3.EPUB", "notes.txt", "cover.jpg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = collect_epubs(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["B_Volume_3.EPUB", "B_Volume_10.epub"]);
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = JncepCli::new("/nonexistent/jncep-binary", Duration::from_secs(5));
        let err = cli.generate(&request(None), dir.path()).unwrap_err();
        assert!(matches!(err, GenerationError::Launch(_)));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-jncep.sh");
        fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_returns_written_files() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = script(
            scratch.path(),
            r#"while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -n "$JNCEP_PASSWORD" ] || exit 3
: > "$out/Example_Volume_10.epub"
: > "$out/Example_Volume_9.epub"
echo done
"#,
        );

        let cli = JncepCli::new(&cmd, Duration::from_secs(10));
        let files = cli.generate(&request(Some("9:10")), out.path()).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, ["Example_Volume_9.epub", "Example_Volume_10.epub"]);
    }

    #[cfg(unix)]
    #[test]
    fn failing_run_is_classified() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = script(
            scratch.path(),
            "echo \"httpx.HTTPStatusError: Client error '401 Unauthorized'\" >&2\nexit 1\n",
        );

        let cli = JncepCli::new(&cmd, Duration::from_secs(10));
        let err = cli.generate(&request(None), out.path()).unwrap_err();
        assert!(matches!(err, GenerationError::Auth(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn hung_run_is_killed_after_timeout() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = script(scratch.path(), "exec sleep 30\n");

        let cli = JncepCli::new(&cmd, Duration::from_millis(300));
        let started = Instant::now();
        let err = cli.generate(&request(None), out.path()).unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_also_stops_grandchildren_holding_the_pipes() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let cmd = script(scratch.path(), "sleep 30\necho never\n");

        let cli = JncepCli::new(&cmd, Duration::from_millis(300));
        let started = Instant::now();
        let err = cli.generate(&request(None), out.path()).unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }
}
