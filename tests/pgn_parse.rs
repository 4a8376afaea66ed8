use pretty_assertions::assert_eq;
use std::io::{Cursor, Write};
use ucituner::pgn::{self, PgnReader};
use ucituner::{GameRecord, Outcome};

fn parse(text: &str) -> Vec<GameRecord> {
    PgnReader::new(Cursor::new(text.as_bytes())).map(|r| r.unwrap()).collect()
}

#[test]
fn decisive_and_drawn_records() {
    let text = r#"[Event "?"]
[White "X"]
[Black "Y"]
[Result "1-0"]

1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0

[Event "?"]
[White "Y"]
[Black "X"]
[Result "1/2-1/2"]

1. d4 d5 1/2-1/2
"#;
    let games = parse(text);
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].outcome, Outcome::WhiteWin);
    assert_eq!(games[0].winner(), Some("X"));
    assert_eq!(games[1].outcome, Outcome::Draw);
    assert_eq!(games[1].winner(), None);
}

#[test]
fn black_win_and_unterminated() {
    let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"0-1\"]\n\n1. f3 e5 2. g4 Qh4# 0-1\n\n\
                [White \"B\"]\n[Black \"A\"]\n[Result \"*\"]\n\n1. e4 *\n";
    let games = parse(text);
    assert_eq!(games[0].winner(), Some("B"));
    assert_eq!(games[1].outcome, Outcome::Unknown);
    assert_eq!(games[1].winner(), None);
}

#[test]
fn result_falls_back_to_movetext_terminator() {
    let text = "[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5\n2. Nf3 0-1\n";
    let games = parse(text);
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].outcome, Outcome::BlackWin);
}

#[test]
fn malformed_result_is_unknown() {
    let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"2-0\"]\n\n1. e4 2-0\n";
    assert_eq!(parse(text)[0].outcome, Outcome::Unknown);
    assert_eq!(Outcome::from_token("1/2"), Outcome::Unknown);
    assert!(!Outcome::Draw.is_decisive());
    assert!(Outcome::BlackWin.is_decisive());
}

#[test]
fn records_without_movetext_still_parse() {
    // cutechess writes tag-only records when a game aborts before move one
    let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"1-0\"]\n";
    let games = parse(text);
    assert_eq!(games, vec![GameRecord { white: "A".into(), black: "B".into(), outcome: Outcome::WhiteWin }]);
}

#[test]
fn consecutive_tag_only_records_stay_separate() {
    let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"1-0\"]\n\n[White \"C\"]\n[Black \"D\"]\n[Result \"*\"]\n";
    let games = parse(text);
    assert_eq!(
        games,
        vec![
            GameRecord { white: "A".into(), black: "B".into(), outcome: Outcome::WhiteWin },
            GameRecord { white: "C".into(), black: "D".into(), outcome: Outcome::Unknown },
        ]
    );
}

#[test]
fn repeated_tag_starts_a_new_record() {
    // no blank line between the two rosters
    let text = "[White \"A\"]\n[Black \"B\"]\n[Result \"0-1\"]\n[White \"C\"]\n[Black \"D\"]\n[Result \"1-0\"]\n";
    let games = parse(text);
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].winner(), Some("B"));
    assert_eq!(games[1].winner(), Some("C"));
}

#[test]
fn empty_input_yields_nothing() {
    assert!(parse("").is_empty());
    assert!(parse("\n\n  \n").is_empty());
}

#[test]
fn open_reads_from_disk() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, "[White \"Candidate-0001\"]\n[Black \"sf\"]\n[Result \"1-0\"]\n\n1. e4 1-0\n").unwrap();
    let games: Vec<_> = pgn::open(f.path()).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(games[0].winner(), Some("Candidate-0001"));
    assert!(pgn::open("/nonexistent/games.pgn").is_err());
}
