//! Runner that hands each file to an external program.

use anyhow::{Context, Result, bail};
use log::debug;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::process::{Command, Stdio};

use super::Runner;
use crate::TaskRecord;
use crate::utils::config::STDERR_TAIL_BYTES;

/// Runs `program args... <task path>`. A non-zero exit is a failed attempt.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    /// `argv[0]` is the program, the rest are leading arguments.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("no command given to run for each file");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Drain `reader` keeping only its last `max` bytes.
fn read_tail(mut reader: impl Read, max: usize) -> io::Result<Vec<u8>> {
    let mut ring: VecDeque<u8> = VecDeque::with_capacity(max);
    let mut buf = [0u8; 8192];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buf[n.saturating_sub(max)..n];
        let overflow = (ring.len() + chunk.len()).saturating_sub(max);
        ring.drain(..overflow.min(ring.len()));
        ring.extend(chunk);
    }
    Ok(ring.into())
}

impl Runner for CommandRunner {
    fn run(&self, task: &TaskRecord) -> Result<()> {
        debug!("exec {} {:?} {}", self.program, self.args, task.path());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(task.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn {}", self.program))?;
        let stderr = match child.stderr.take() {
            Some(pipe) => read_tail(pipe, STDERR_TAIL_BYTES),
            None => Ok(Vec::new()),
        };
        let status = child
            .wait()
            .with_context(|| format!("wait for {}", self.program))?;
        if status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&stderr.unwrap_or_default())
            .trim()
            .to_string();
        if stderr.is_empty() {
            bail!("{} exited with {}", self.program, status);
        }
        bail!("{} exited with {}: {}", self.program, status, stderr)
    }
}
