use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    WhiteWin,
    BlackWin,
    Draw,
    Unknown,
}

impl Outcome {
    /// Map a PGN result token. Anything that is not a decisive or drawn
    /// result (`*`, truncated or garbage tokens) is `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "1-0" => Outcome::WhiteWin,
            "0-1" => Outcome::BlackWin,
            "1/2-1/2" => Outcome::Draw,
            _ => Outcome::Unknown,
        }
    }

    pub fn is_decisive(&self) -> bool { matches!(self, Outcome::WhiteWin | Outcome::BlackWin) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
}

impl GameRecord {
    pub fn winner(&self) -> Option<&str> {
        match self.outcome {
            Outcome::WhiteWin => Some(&self.white),
            Outcome::BlackWin => Some(&self.black),
            Outcome::Draw | Outcome::Unknown => None,
        }
    }
}

const TERMINATORS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Default)]
struct RecordBuilder {
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
    termination: Option<String>,
    tag_names: HashSet<String>,
    seen_anything: bool,
}

impl RecordBuilder {
    fn tag(&mut self, name: &str, value: String) {
        self.seen_anything = true;
        self.tag_names.insert(name.to_string());
        match name {
            "White" => self.white = Some(value),
            "Black" => self.black = Some(value),
            "Result" => self.result = Some(value),
            _ => {}
        }
    }

    fn movetext(&mut self, line: &str) {
        self.seen_anything = true;
        for tok in line.split_whitespace() {
            if TERMINATORS.contains(&tok) {
                self.termination = Some(tok.to_string());
            }
        }
    }

    fn finish(self) -> GameRecord {
        // The Result tag wins over the movetext terminator when both exist.
        let outcome = self
            .result
            .as_deref()
            .or(self.termination.as_deref())
            .map(Outcome::from_token)
            .unwrap_or(Outcome::Unknown);
        GameRecord {
            white: self.white.unwrap_or_else(|| "?".to_string()),
            black: self.black.unwrap_or_else(|| "?".to_string()),
            outcome,
        }
    }
}

/// Parse `[Name "Value"]`, undoing the `\"` and `\\` escapes.
fn parse_tag(line: &str) -> Option<(&str, String)> {
    let inner = line.strip_prefix('[')?.trim_end().strip_suffix(']')?;
    let (name, rest) = inner.split_once(char::is_whitespace)?;
    let quoted = rest.trim();
    let raw = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() { value.push(next); }
        } else {
            value.push(c);
        }
    }
    Some((name, value))
}

/// Single-pass reader over a PGN stream, yielding one record per game.
/// Only the tag roster and the result are retained; moves are skipped.
pub struct PgnReader<R> {
    lines: Lines<R>,
    pending: Option<String>,
    done: bool,
}

impl<R: BufRead> PgnReader<R> {
    pub fn new(reader: R) -> Self { Self { lines: reader.lines(), pending: None, done: false } }
}

/// Open a PGN file for lazy parsing.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<PgnReader<BufReader<File>>> {
    Ok(PgnReader::new(BufReader::new(File::open(path)?)))
}

impl<R: BufRead> Iterator for PgnReader<R> {
    type Item = io::Result<GameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut rec = RecordBuilder::default();
            let mut in_movetext = false;
            let mut tags_closed = false;
            loop {
                let line = match self.pending.take() {
                    Some(l) => l,
                    None => match self.lines.next() {
                        Some(Ok(l)) => l,
                        Some(Err(e)) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                        None => {
                            self.done = true;
                            break;
                        }
                    },
                };
                let t = line.trim();
                if t.is_empty() {
                    tags_closed = rec.seen_anything;
                    continue;
                }
                if t.starts_with('%') { continue; }
                if t.starts_with('[') {
                    let tag = parse_tag(t).map(|(name, value)| (name.to_string(), value));
                    let repeated = tag.as_ref().is_some_and(|(name, _)| rec.tag_names.contains(name));
                    if in_movetext || tags_closed || repeated {
                        // First tag of the next game. Aborted games may have no movetext.
                        self.pending = Some(line);
                        break;
                    }
                    if let Some((name, value)) = tag { rec.tag(&name, value); }
                } else {
                    in_movetext = true;
                    rec.movetext(t);
                }
            }
            if rec.seen_anything { return Some(Ok(rec.finish())); }
        }
        None
    }
}
