//! CLI smoke entry point.
//!
//! Opens the database given as the first argument (in-memory when omitted),
//! applies migrations and prints the resulting schema version.

use observation_core::{open_db, open_db_in_memory};
use std::process::ExitCode;

fn main() -> ExitCode {
    let opened = match std::env::args_os().nth(1) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };

    println!("observation_core version={}", observation_core::core_version());
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("observation_core db_open=error {err}");
            return ExitCode::FAILURE;
        }
    };

    match conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0)) {
        Ok(version) => {
            println!("observation_core schema_version={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("observation_core schema_version=error {err}");
            ExitCode::FAILURE
        }
    }
}
