use std::path::Path;
use std::process::{Command, Output};

use rusqlite::{Connection, params};

/// Matthew 28, Mark 1, John 1-4, Jude; books table in Russian.
fn write_module(dir: &Path) {
    let conn = Connection::open(dir.join("KJV.SQLite3")).unwrap();
    conn.execute_batch(
        "CREATE TABLE verses (book_number INTEGER, chapter INTEGER, verse INTEGER, text TEXT);
         CREATE TABLE books (book_number INTEGER, short_name TEXT, long_name TEXT);
         INSERT INTO books VALUES (470, 'Мф', 'От Матфея'), (480, 'Мк', 'От Марка'),
                                  (500, 'Ин', 'От Иоанна'), (720, 'Иуд', 'Иуды');",
    )
    .unwrap();

    let books: [(u32, &[u32]); 3] = [(480, &[45]), (500, &[51, 25, 36, 54]), (720, &[25])];
    let mut insert = conn.prepare("INSERT INTO verses VALUES (?1, ?2, ?3, ?4)").unwrap();
    for (book, chapters) in books {
        for (c, &verses) in chapters.iter().enumerate() {
            let chapter = u32::try_from(c).unwrap() + 1;
            for verse in 1..=verses {
                insert.execute(params![book, chapter, verse, format!("text {book} {chapter}:{verse}")]).unwrap();
            }
        }
    }
    for verse in 1..=20_u32 {
        insert.execute(params![470, 28, verse, format!("text 470 28:{verse}")]).unwrap();
    }
}

fn scriptref(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scriptref"))
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path());
    dir
}

#[test]
fn parse_prints_ranges_with_counts() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["parse", "KJV", "John 3:16-18"]);
    assert!(out.status.success(), "parse failed: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("John 3:16-18\t3 verses\toffset 92"), "unexpected output: {stdout}");
    assert!(dir.path().join(".scriptref-cache/KJV.index.json").is_file(), "index artifact not written");
}

#[test]
fn rejected_citation_prints_nothing_and_exits_2() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["parse", "KJV", "John 3:16, 99:1"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty(), "partial output: {}", String::from_utf8_lossy(&out.stdout));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Out Of Range"));
}

#[test]
fn parse_json_round_trips_through_serde() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["parse", "KJV", "Jude", "--json"]);
    assert!(out.status.success(), "parse failed: {}", String::from_utf8_lossy(&out.stderr));

    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let first = &value[0];
    assert_eq!(first["verse_count"], 25);
    assert_eq!(first["range"]["end"]["verse"], 25);
}

#[test]
fn fetch_spans_book_boundaries() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["fetch", "KJV", "Matt 28:19 - John 1:2"]);
    assert!(out.status.success(), "fetch failed: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2 + 45 + 2);
    assert_eq!(lines.first().copied(), Some("Matthew 28:19  text 470 28:19"));
    assert_eq!(lines.get(2).copied(), Some("Mark 1:1  text 480 1:1"));
    assert_eq!(lines.last().copied(), Some("John 1:2  text 500 1:2"));
}

#[test]
fn module_names_parse_native_citations() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["fetch", "KJV", "Ин 3:16", "--module-names"]);
    assert!(out.status.success(), "fetch failed: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "От Иоанна 3:16  text 500 3:16");
}

#[test]
fn index_rebuild_replaces_artifact() {
    let dir = fixture();
    let artifact = dir.path().join(".scriptref-cache/KJV.index.json");
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, "garbage").unwrap();

    let out = scriptref(dir.path(), &["index", "KJV", "--rebuild"]);
    assert!(out.status.success(), "index failed: {}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("KJV: 4 books, 7 chapters"));

    let content = std::fs::read_to_string(&artifact).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["module"], "KJV");
}

#[test]
fn corrupt_artifact_is_silently_rebuilt() {
    let dir = fixture();
    let artifact = dir.path().join(".scriptref-cache/KJV.index.json");
    std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    std::fs::write(&artifact, "{").unwrap();

    let out = scriptref(dir.path(), &["parse", "KJV", "Jude"]);
    assert!(out.status.success(), "parse failed: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn books_lists_primary_abbreviations_and_absent_books() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["books", "KJV"]);
    assert!(out.status.success(), "books failed: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    let john = stdout.lines().find(|l| l.contains("John") && l.contains(" 500 ")).unwrap();
    assert!(john.starts_with(' '), "John should be present: {john}");
    let genesis = stdout.lines().find(|l| l.contains("Genesis")).unwrap();
    assert!(genesis.starts_with('-'), "Genesis should be marked absent: {genesis}");
    assert_eq!(stdout.lines().last(), Some("66 books, 4 in KJV"));
}

#[test]
fn index_of_empty_module_says_so() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open(dir.path().join("EMPTY.SQLite3")).unwrap();
    conn.execute_batch("CREATE TABLE verses (book_number INTEGER, chapter INTEGER, verse INTEGER, text TEXT);")
        .unwrap();
    drop(conn);

    let out = scriptref(dir.path(), &["index", "EMPTY"]);
    assert!(out.status.success(), "index failed: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("EMPTY: no indexable verses"));
    assert!(stdout.contains("module: ") && stdout.contains("EMPTY.SQLite3"));
}

#[test]
fn modules_lists_sqlite_files() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["modules"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("KJV -> "));
}

#[test]
fn unknown_module_exits_1() {
    let dir = fixture();
    let out = scriptref(dir.path(), &["parse", "NOPE", "John 3:16"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Module Not Found"));
}
