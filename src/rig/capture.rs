//! Capture and transcoding through external commands
//!
//! Commands are argument templates. `{path}`, `{input}`, `{output}` and
//! `{ms}` are substituted per call, e.g.
//!
//! ```text
//! screenshot = ["v2u", "{path}"]
//! video      = ["v2u", "-t", "{ms}", "{path}"]
//! transcode  = ["ffmpeg", "-y", "-i", "{input}", "{output}"]
//! ```

use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use super::{CaptureDevice, Transcoder, VideoProcess};
use crate::error::RigError;

/// Build a command from `template`, replacing each `{key}` with its value
pub fn render_command(template: &[String], substitutions: &[(&str, String)]) -> Result<Command, RigError> {
    let (program, args) = template
        .split_first()
        .ok_or_else(|| RigError::Capture("empty command template".to_string()))?;
    let render = |arg: &String| {
        substitutions
            .iter()
            .fold(arg.clone(), |acc, (key, value)| acc.replace(&format!("{{{}}}", key), value))
    };
    let mut command = Command::new(render(program));
    command.args(args.iter().map(render));
    Ok(command)
}

fn run_to_completion(mut command: Command, what: &str) -> Result<(), RigError> {
    let status = command
        .status()
        .map_err(|e| RigError::Capture(format!("{} could not start: {}", what, e)))?;
    if status.success() {
        Ok(())
    } else {
        Err(RigError::Capture(format!("{} exited with {}", what, status)))
    }
}

#[derive(Debug, Clone)]
pub struct CommandCapture {
    pub screenshot: Vec<String>,
    pub video: Vec<String>,
}

struct ChildRecording {
    child: Child,
}

impl VideoProcess for ChildRecording {
    fn wait(mut self: Box<Self>) -> Result<(), RigError> {
        let status = self
            .child
            .wait()
            .map_err(|e| RigError::Capture(format!("video capture: {}", e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(RigError::Capture(format!("video capture exited with {}", status)))
        }
    }
}

impl CaptureDevice for CommandCapture {
    fn screenshot(&mut self, path: &Path) -> Result<(), RigError> {
        let command = render_command(&self.screenshot, &[("path", path.display().to_string())])?;
        run_to_completion(command, "screenshot capture")
    }

    fn start_video(&mut self, path: &Path, duration: Duration) -> Result<Box<dyn VideoProcess>, RigError> {
        let mut command = render_command(
            &self.video,
            &[
                ("path", path.display().to_string()),
                ("ms", duration.as_millis().to_string()),
            ],
        )?;
        let child = command
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| RigError::Capture(format!("video capture could not start: {}", e)))?;
        Ok(Box::new(ChildRecording { child }))
    }
}

#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    pub template: Vec<String>,
}

impl Transcoder for CommandTranscoder {
    fn transcode(&mut self, uncompressed: &Path, compressed: &Path, log: Option<&File>) -> Result<(), RigError> {
        let mut command = render_command(
            &self.template,
            &[
                ("input", uncompressed.display().to_string()),
                ("output", compressed.display().to_string()),
            ],
        )?;
        command.stdin(Stdio::null()).stdout(Stdio::null());
        if let Some(log) = log {
            let log = log.try_clone().map_err(|source| RigError::Io {
                path: "video compression log".to_string(),
                source,
            })?;
            command.stderr(Stdio::from(log));
        }
        run_to_completion(command, "transcoder")?;

        let removed = if uncompressed.is_dir() {
            fs::remove_dir_all(uncompressed)
        } else {
            fs::remove_file(uncompressed)
        };
        removed.map_err(|source| RigError::Io {
            path: uncompressed.display().to_string(),
            source,
        })
    }
}
