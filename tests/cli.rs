mod common;

use assert_cmd::Command;
use common::{TestWorkspace, numbered_csv};
use predicates::str::contains;
use rusqlite::Connection;

fn count_rows(db: &std::path::Path, table: &str) -> i64 {
    let conn = Connection::open(db).expect("open sqlite");
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

#[test]
fn probe_prints_create_table_statement() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write(
        "orders.csv",
        "id,name,signup\n1,Ann,2023-01-05\n2,Bea,2023-02-10\n3,C,bad-date\n",
    );

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args(["probe", "-i", csv.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains(
            r#"CREATE TABLE IF NOT EXISTS "orders" ("id" INTEGER, "name" TEXT, "signup" TEXT);"#,
        ));
}

#[test]
fn probe_honours_table_name_and_strict_identifiers() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", "say \"hi\",n\nx,1\n");

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "probe",
            "-i",
            csv.to_str().unwrap(),
            "--table",
            "greetings",
            "--strict-identifiers",
        ])
        .assert()
        .success()
        .stdout(contains(
            r#"CREATE TABLE IF NOT EXISTS "greetings" ("say ""hi""" TEXT, "n" INTEGER);"#,
        ));
}

#[test]
fn import_loads_folder_into_sqlite() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.path().join("data");
    std::fs::create_dir(&data_dir).expect("create data dir");
    std::fs::write(data_dir.join("scores.csv"), numbered_csv(1200)).expect("write csv");
    std::fs::write(data_dir.join("people.csv"), "id,name\n1,Ann\n2,Bea\n").expect("write csv");
    let db = workspace.path().join("target.db");

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "import",
            "-d",
            data_dir.to_str().unwrap(),
            "--dialect",
            "sqlite",
            "--path",
            db.to_str().unwrap(),
            "--batch-size",
            "500",
            "--workers",
            "3",
            "--throttle-ms",
            "0",
        ])
        .assert()
        .success();

    assert_eq!(count_rows(&db, "scores"), 1200);
    assert_eq!(count_rows(&db, "people"), 2);
}

#[test]
fn import_reads_connection_from_profile() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.path().join("data");
    std::fs::create_dir(&data_dir).expect("create data dir");
    std::fs::write(data_dir.join("t.csv"), "a\n1\n2\n3\n").expect("write csv");
    let db = workspace.path().join("profile.db");
    let profile = workspace.write(
        "profile.yml",
        &format!("dialect: sqlite\npath: {}\n", db.display()),
    );

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "import",
            "-d",
            data_dir.to_str().unwrap(),
            "--profile",
            profile.to_str().unwrap(),
            "--throttle-ms",
            "0",
        ])
        .assert()
        .success();

    assert_eq!(count_rows(&db, "t"), 3);
}

#[test]
fn import_fails_when_a_file_fails_but_loads_the_rest() {
    let workspace = TestWorkspace::new();
    let data_dir = workspace.path().join("data");
    std::fs::create_dir(&data_dir).expect("create data dir");
    std::fs::write(data_dir.join("a.csv"), "").expect("write csv");
    std::fs::write(data_dir.join("b.csv"), "x\n1\n").expect("write csv");
    let db = workspace.path().join("partial.db");

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "import",
            "-d",
            data_dir.to_str().unwrap(),
            "--dialect",
            "sqlite",
            "--database",
            db.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("1 of 2 file(s) failed to import"));

    assert_eq!(count_rows(&db, "b"), 1);
}

#[test]
fn unsupported_dialect_is_rejected_before_touching_files() {
    let workspace = TestWorkspace::new();

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "import",
            "-d",
            workspace.path().join("missing").to_str().unwrap(),
            "--dialect",
            "oracle",
        ])
        .assert()
        .failure()
        .stderr(contains("unsupported database type: oracle"));
}

#[test]
fn missing_server_settings_are_reported() {
    let workspace = TestWorkspace::new();

    Command::cargo_bin("csv-ingest")
        .expect("binary exists")
        .args([
            "import",
            "-d",
            workspace.path().to_str().unwrap(),
            "--dialect",
            "postgres",
            "--user",
            "loader",
            "--database",
            "warehouse",
        ])
        .assert()
        .failure()
        .stderr(contains("PostgreSQL connection requires `host`"));
}
