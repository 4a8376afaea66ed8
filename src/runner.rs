use crate::config::Config;
use crate::error::{Result, TunerError};
use crate::sampler::Contestant;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempPath;

/// How a match round ended. Only `Interrupted` discards the round; a failed
/// runner may still have written usable games.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Completed,
    /// Non-zero exit; `code` is `None` when the runner died from a signal.
    Failed { code: Option<i32> },
    Interrupted,
}

/// Games of one round. The PGN file is deleted when this is dropped.
pub struct RoundOutput {
    pub pgn: TempPath,
    pub status: RoundStatus,
}

impl RoundOutput {
    pub fn pgn_path(&self) -> &Path { &self.pgn }
}

/// Plays one round among the given contestants (plus any fixed opponents).
pub trait GameRunner {
    fn run_round(&mut self, contestants: &[Contestant]) -> Result<RoundOutput>;
}

/// A fully resolved match-runner invocation, passed as argv (no shell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl MatchCommand {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for MatchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            if a.is_empty() || a.contains(char::is_whitespace) {
                write!(f, " '{}'", a)?;
            } else {
                write!(f, " {}", a)?;
            }
        }
        Ok(())
    }
}

/// Render a config scalar the way engine option assignments expect it.
fn format_option_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn push_options(args: &mut Vec<String>, options: &BTreeMap<String, Value>) {
    args.extend(options.iter().map(|(k, v)| format!("option.{}={}", k, format_option_value(v))));
}

/// Build the cutechess-cli command for one round: one `-engine` segment per
/// contestant and opponent, shared `-each` settings, adjudication, and a
/// PGN output path.
pub fn build_command(config: &Config, contestants: &[Contestant], pgn_out: &Path) -> MatchCommand {
    let mr = &config.match_runner;
    let mut args: Vec<String> = Vec::new();

    for c in contestants {
        args.push("-engine".into());
        args.push(format!("cmd={}", config.engine.command));
        args.push(format!("name={}", c.name));
        args.extend(c.option_assignments());
        push_options(&mut args, &config.engine.fixed_parameters);
    }
    for opp in &config.opponents {
        args.push("-engine".into());
        args.push(format!("cmd={}", opp.command));
        args.push(format!("name={}", opp.name));
        push_options(&mut args, &opp.options);
    }

    args.push("-each".into());
    args.push(format!("proto={}", mr.protocol));
    args.push(format!("tc={}", mr.time_control));
    args.push(format!("timemargin={}", mr.time_margin_ms));
    if let Some(book) = &config.book_path {
        args.push(format!("book={}", book.display()));
        args.push(format!("bookdepth={}", mr.book_depth));
    }

    args.push("-concurrency".into());
    args.push(config.concurrency.to_string());
    args.extend([
        "-draw".to_string(),
        format!("movenumber={}", mr.draw.move_number),
        format!("movecount={}", mr.draw.move_count),
        format!("score={}", mr.draw.score),
    ]);
    args.extend([
        "-resign".to_string(),
        format!("movecount={}", mr.resign.move_count),
        format!("score={}", mr.resign.score),
        format!("twosided={}", mr.resign.two_sided),
    ]);
    if let Some(tb) = &config.syzygy_path {
        args.push("-tb".into());
        args.push(tb.display().to_string());
    }
    args.push("-tournament".into());
    args.push(mr.pairing.as_str().into());
    args.push("-games".into());
    args.push(mr.games.to_string());
    args.push("-rounds".into());
    args.push(mr.rounds.to_string());
    args.push("-pgnout".into());
    args.push(pgn_out.display().to_string());
    args.push("min".into());
    args.push("fi".into());
    args.extend(mr.extra_args.iter().cloned());

    MatchCommand { program: mr.command.clone(), args }
}

/// Owns a running child; kills it if still alive and always reaps it.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
        }
        let _ = self.0.wait();
    }
}

fn forward_lines<R: Read + Send + 'static>(stream: R, label: String, is_stderr: bool) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            match line {
                Ok(l) if is_stderr => warn!("[{}] {}", label, l),
                Ok(l) => info!("[{}] {}", label, l),
                Err(_) => break,
            }
        }
    })
}

fn program_label(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// Spawn `cmd`, forward its stdout/stderr line by line to the log, and block
/// until it exits. If `stop` is raised meanwhile the child is killed and
/// the round reported as interrupted.
pub fn run_streaming(cmd: &MatchCommand, stop: &AtomicBool, poll: Duration) -> Result<RoundStatus> {
    let mut child = cmd
        .to_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TunerError::Spawn { command: cmd.program.clone(), source })?;
    let label = program_label(&cmd.program);
    let mut forwarders = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() { forwarders.push(forward_lines(out, label.clone(), false)); }
    if let Some(err) = child.stderr.take() { forwarders.push(forward_lines(err, label.clone(), true)); }
    let mut guard = ChildGuard(child);

    let status: ExitStatus = loop {
        if stop.load(Ordering::SeqCst) {
            warn!("interrupt received, stopping {}", label);
            // Dropping the guard kills and reaps; forwarders end once the pipes close.
            drop(guard);
            return Ok(RoundStatus::Interrupted);
        }
        match guard.0.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(poll),
            Err(e) => return Err(TunerError::io(&cmd.program, e)),
        }
    };
    for h in forwarders {
        let _ = h.join();
    }
    debug!("{} exited with {}", label, status);
    if status.success() {
        Ok(RoundStatus::Completed)
    } else {
        Ok(RoundStatus::Failed { code: status.code() })
    }
}

/// Runs each round as a cutechess-cli subprocess writing to a fresh
/// temporary PGN file.
pub struct ProcessGameRunner {
    config: Config,
    stop: Arc<AtomicBool>,
    poll: Duration,
}

impl ProcessGameRunner {
    pub fn new(config: Config, stop: Arc<AtomicBool>) -> Self {
        Self { config, stop, poll: Duration::from_millis(50) }
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl GameRunner for ProcessGameRunner {
    fn run_round(&mut self, contestants: &[Contestant]) -> Result<RoundOutput> {
        let pgn = tempfile::Builder::new()
            .prefix("ucituner-")
            .suffix(".pgn")
            .tempfile()
            .map_err(|e| TunerError::io(std::env::temp_dir(), e))?
            .into_temp_path();
        let cmd = build_command(&self.config, contestants, &pgn);
        info!("running: {}", cmd);
        let status = run_streaming(&cmd, &self.stop, self.poll)?;
        if let RoundStatus::Failed { code } = status {
            match code {
                Some(c) => warn!("{} exited with non zero code: {}", self.config.match_runner.command, c),
                None => warn!("{} was terminated by a signal", self.config.match_runner.command),
            }
        }
        Ok(RoundOutput { pgn, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_values_render_unquoted() {
        assert_eq!(format_option_value(&json!("tb/syzygy")), "tb/syzygy");
        assert_eq!(format_option_value(&json!(64)), "64");
        assert_eq!(format_option_value(&json!(true)), "true");
        assert_eq!(format_option_value(&json!(0.5)), "0.5");
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let cmd = MatchCommand { program: "cutechess-cli".into(), args: vec!["-engine".into(), "cmd=/opt/my engine".into()] };
        assert_eq!(cmd.to_string(), "cutechess-cli -engine 'cmd=/opt/my engine'");
    }

    #[test]
    fn label_is_program_basename() {
        assert_eq!(program_label("/usr/local/bin/cutechess-cli"), "cutechess-cli");
        assert_eq!(program_label("cutechess-cli"), "cutechess-cli");
    }
}
