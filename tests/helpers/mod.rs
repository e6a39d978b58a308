#![allow(dead_code)]

use pathstore::{
    action::{Reply, RouteContext, RouteOp},
    credential::CredentialHasher,
    sqlite::{filter::FilterPolicy, schema},
};

use anyhow::Result;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

///
/// Stores `plain:<password>`, keeps the tests fast and the stored values readable
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        Ok(format!("plain:{plaintext}"))
    }

    fn verify(&self, plaintext: &str, credential: &str) -> bool {
        credential == format!("plain:{plaintext}")
    }
}

fn insert_users(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, username, password) VALUES (1, 'alice', 'plain:wonderland')",
        [],
    )?;
    conn.execute(
        "INSERT INTO users (user_id, username, password) VALUES (2, 'bob', 'plain:builder')",
        [],
    )?;
    Ok(())
}

fn insert_readings(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        INSERT INTO oximeter (entry_id, user_id, heart_rate, blood_o2, temperature, entry_time)
            VALUES (1, 1, 72, 98, 98.6, '2022-03-30 10:00:00');
        INSERT INTO oximeter (entry_id, user_id, heart_rate, blood_o2, temperature, entry_time)
            VALUES (2, 1, 95, 96, 100.9, '2022-03-30 11:00:00');
        INSERT INTO oximeter (entry_id, user_id, heart_rate, blood_o2, temperature, entry_time)
            VALUES (3, 2, 64, 99, 97.8, '2022-03-31 09:30:00');
        INSERT INTO oximeter (entry_id, user_id, heart_rate, blood_o2, temperature, entry_time)
            VALUES (4, 2, 110, 93, 101.2, '2022-03-31 10:30:00');
        "#,
    )?;
    Ok(())
}

///
/// Create the baseline tables and seed two users with four readings
pub fn initialize_db(conn: &Connection) -> Result<()> {
    schema::bootstrap(conn)?;
    insert_users(conn)?;
    insert_readings(conn)?;
    Ok(())
}

pub fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn run_with(
    conn: &Connection,
    filter_policy: FilterPolicy,
    path: &str,
    pairs: &[(&str, &str)],
) -> Reply {
    let ctx = RouteContext {
        conn,
        hasher: &PlainHasher,
        filter_policy,
    };
    RouteOp::from_path(path).run(&ctx, &query(pairs))
}

///
/// Run a route the way the server does, with trusted filters
pub fn run(conn: &Connection, path: &str, pairs: &[(&str, &str)]) -> Reply {
    run_with(conn, FilterPolicy::Trusted, path, pairs)
}

///
/// The body of a regular reply, panics on any other outcome
pub fn body(reply: Reply) -> JsonValue {
    match reply {
        Reply::Json(body) => body,
        other => panic!("expected a JSON reply, got {:?}", other),
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}
