mod helpers;
use helpers::{body, count_rows, initialize_db, run, run_with};

use pathstore::{action::Reply, sqlite::filter::FilterPolicy};

use anyhow::Result;
use insta::assert_snapshot;
use rusqlite::Connection;
use serde_json::json;

fn setup() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize_db(&conn)?;
    Ok(conn)
}

fn stored_password(conn: &Connection, username: &str) -> Result<String> {
    Ok(conn.query_row(
        "SELECT password FROM users WHERE username = ?",
        [username],
        |row| row.get(0),
    )?)
}

#[test]
fn test_add_user() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/add/users/username/carol/password/pw", &[]));
    assert_eq!(
        reply,
        json!({ "message": "data added to users", "user_id": 3 })
    );
    assert_eq!(stored_password(&conn, "carol")?, "plain:pw");

    let reply = body(run(
        &conn,
        "/add/users",
        &[("username", "carol"), ("password", "other")],
    ));
    assert_eq!(reply, json!({ "message": "user exists", "username": "carol" }));
    assert_eq!(count_rows(&conn, "users")?, 3);
    Ok(())
}

#[test]
fn test_add_reading_echoes_the_reference() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/add/oximeter/user_id/2/heart_rate/80/blood_o2/97/temperature/98.2",
        &[],
    ));
    assert_eq!(
        reply,
        json!({ "message": "data added to oximeter", "entry_id": 5, "user_id": "2" })
    );
    assert_eq!(count_rows(&conn, "oximeter")?, 5);
    Ok(())
}

#[test]
fn test_add_lists_missing_parameters() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/add/oximeter/user_id/1",
        &[("heart_rate", "70"), ("entry_id", "9"), ("color", "red")],
    ));
    assert_eq!(
        reply,
        json!({
            "message": "missing parameters",
            "required": {
                "user_id": "INTEGER NOT NULL",
                "heart_rate": "INTEGER NOT NULL",
                "blood_o2": "INTEGER NOT NULL",
                "temperature": "DOUBLE NOT NULL",
            },
            "missing": {
                "blood_o2": "INTEGER NOT NULL",
                "temperature": "DOUBLE NOT NULL",
            },
            "submitted": { "user_id": "1", "heart_rate": "70" },
        })
    );
    assert_eq!(count_rows(&conn, "oximeter")?, 4);
    Ok(())
}

#[test]
fn test_get() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/get/users/username/alice", &[]));
    assert_eq!(reply["message"], "1 user entry found");
    assert_eq!(reply["data"]["user_id"], 1);
    assert_eq!(reply["data"]["username"], "alice");

    let reply = body(run(&conn, "/get/users", &[]));
    assert_eq!(reply["message"], "found 2 user entries");
    assert_eq!(reply["data"].as_array().map(Vec::len), Some(2));

    let reply = body(run(&conn, "/get/users/username/zed", &[]));
    assert_eq!(
        reply,
        json!({ "message": "0 user entries found using submitted parameters", "data": [] })
    );
    Ok(())
}

#[test]
fn test_get_with_filters() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/get/oximeter/user_id/1",
        &[("filter", "temperature > '100'")],
    ));
    assert_eq!(reply["message"], "1 oximeter entry found");
    assert_eq!(reply["data"]["entry_id"], 2);
    assert_eq!(reply["data"]["temperature"], 100.9);

    let reply = body(run(&conn, "/get/oximeter/filter/(heart_rate > '90')", &[]));
    assert_eq!(reply["message"], "found 2 oximeter entries");

    let reply = body(run(
        &conn,
        "/get/oximeter/user_id/2/filter/(heart_rate > '100' OR blood_o2 > '98')",
        &[],
    ));
    assert_eq!(reply["message"], "found 2 oximeter entries");
    Ok(())
}

#[test]
fn test_get_twice_gives_the_same_data() -> Result<()> {
    let conn = setup()?;

    let params = [("user_id", "2"), ("filter", "blood_o2 < '99'")];
    let first = body(run(&conn, "/get/oximeter", &params));
    let second = body(run(&conn, "/get/oximeter", &params));
    assert_eq!(first, second);
    assert_eq!(first["message"], "1 oximeter entry found");
    Ok(())
}

#[test]
fn test_edit_needs_a_value_and_a_condition() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/edit/users/user_id/1", &[]));
    assert_eq!(
        reply,
        json!({
            "message": "missing a parameter to edit",
            "editable": { "username": "TEXT NOT NULL", "password": "TEXT NOT NULL" },
            "submitted": { "user_id": "1" },
        })
    );

    let reply = body(run(&conn, "/edit/oximeter/heart_rate/70", &[]));
    assert_eq!(reply["message"], "missing a query parameter");
    assert_eq!(reply["query_params"]["entry_id"], "INTEGER PRIMARY KEY");
    assert_eq!(reply["query_params"]["user_id"], "INTEGER NOT NULL");
    assert!(reply["query_params"]["filter"].is_string());
    assert!(reply["query_params"].get("heart_rate").is_none());
    Ok(())
}

#[test]
fn test_edit() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/edit/oximeter/user_id/2/blood_o2/95", &[]));
    assert_eq!(reply["message"], "edited 2 oximeter entries");
    assert_eq!(reply["submitted"], json!({ "user_id": "2", "blood_o2": "95" }));

    let reply = body(run(
        &conn,
        "/edit/oximeter/heart_rate/60",
        &[("filter", "heart_rate > '100'")],
    ));
    assert_eq!(reply["message"], "edited 1 oximeter entry");

    let reply = body(run(&conn, "/edit/oximeter/entry_id/99/blood_o2/95", &[]));
    assert_eq!(
        reply["message"],
        "0 oximeter entries found matching your parameters"
    );

    let heart_rate: i64 = conn.query_row(
        "SELECT heart_rate FROM oximeter WHERE entry_id = 4",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(heart_rate, 60);
    Ok(())
}

#[test]
fn test_edit_with_an_expression() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/edit/oximeter/entry_id/1",
        &[("temperature", "(temperature-32)*5/9")],
    ));
    assert_eq!(reply["message"], "edited 1 oximeter entry");

    let temperature: f64 = conn.query_row(
        "SELECT temperature FROM oximeter WHERE entry_id = 1",
        [],
        |row| row.get(0),
    )?;
    assert!((temperature - 37.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_edit_password_is_stored_as_a_credential() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/edit/users/user_id/2/password/newpw", &[]));
    assert_eq!(reply["message"], "edited 1 user entry");
    assert_eq!(stored_password(&conn, "bob")?, "plain:newpw");

    let reply = body(run(&conn, "/login/username/bob/password/newpw", &[]));
    assert_eq!(reply["message"], "user login success");
    Ok(())
}

#[test]
fn test_delete() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/delete/oximeter", &[("color", "red")]));
    assert_eq!(reply["message"], "missing a query parameter");
    assert_eq!(reply["submitted"], json!({}));
    assert_eq!(count_rows(&conn, "oximeter")?, 4);

    let reply = body(run(
        &conn,
        "/delete/oximeter",
        &[("filter", "heart_rate > '100'")],
    ));
    assert_eq!(reply["message"], "1 oximeter entry deleted");

    let reply = body(run(&conn, "/delete/oximeter/user_id/1", &[]));
    assert_eq!(reply["message"], "2 oximeter entries deleted");

    let reply = body(run(&conn, "/delete/users/username/nobody", &[]));
    assert_eq!(
        reply["message"],
        "0 user entries found matching your parameters"
    );
    assert_eq!(count_rows(&conn, "oximeter")?, 1);
    Ok(())
}

#[test]
fn test_login() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/login", &[]));
    assert_eq!(reply["message"], "missing parameters");
    assert_eq!(reply["missing"], json!(["username", "password"]));

    let reply = body(run(&conn, "/login/username/zed/password/x", &[]));
    assert_eq!(
        reply,
        json!({ "message": "user does not exist", "username": "zed" })
    );

    let reply = body(run(
        &conn,
        "/login",
        &[("username", "alice"), ("password", "nope")],
    ));
    assert_eq!(
        reply,
        json!({ "message": "incorrect password", "username": "alice" })
    );

    let reply = body(run(&conn, "/login/username/alice/password/wonderland", &[]));
    assert_eq!(
        reply,
        json!({ "message": "user login success", "user_id": 1, "username": "alice" })
    );
    Ok(())
}

#[test]
fn test_create_and_delete_table() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/createTable/steps", &[]));
    assert_eq!(reply["message"], "missing parameters");
    assert_eq!(
        reply["available_types"],
        json!(["INTEGER", "DOUBLE", "TEXT", "DATETIME"])
    );

    let reply = body(run(
        &conn,
        "/createTable/steps/step_id/integer/user_id/integer/steps/integer",
        &[("step_time", "datetime")],
    ));
    assert_eq!(reply["message"], "table created");
    assert_eq!(reply["table"]["name"], "steps");
    assert_eq!(reply["table"]["columns"]["step_id"], "INTEGER PRIMARY KEY");
    assert_eq!(reply["table"]["columns"]["user_id"], "INTEGER NOT NULL");

    let reply = body(run(&conn, "/add/steps/user_id/1/steps/1200", &[]));
    assert_eq!(
        reply,
        json!({ "message": "data added to steps", "step_id": 1, "user_id": "1" })
    );
    let reply = body(run(&conn, "/get/steps/user_id/1", &[]));
    assert_eq!(reply["message"], "1 step entry found");
    assert_eq!(reply["data"]["steps"], 1200);

    let reply = body(run(&conn, "/createTable/steps/note/TEXT", &[]));
    assert_eq!(reply["message"], "table exists");

    let reply = body(run(&conn, "/deleteTable/steps", &[]));
    assert_eq!(reply, json!({ "message": "table deleted", "table": "steps" }));

    let reply = body(run(&conn, "/get/steps", &[]));
    assert_eq!(reply["message"], "active tables in the database");
    Ok(())
}

#[test]
fn test_create_table_refuses_bad_input() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/createTable/walks/walk_id/BLOB", &[]));
    assert_eq!(reply["message"], "invalid request");
    assert_snapshot!(
        reply["reason"].as_str().unwrap_or_default(),
        @r#"'BLOB' is not an available type for the column 'walk_id', use one of ["INTEGER", "DOUBLE", "TEXT", "DATETIME"]"#
    );

    let reply = body(run(&conn, "/createTable/bad-name/memo/TEXT", &[]));
    assert_eq!(reply["message"], "invalid request");

    let reply = body(run(&conn, "/createTable", &[]));
    assert_eq!(reply["message"], "active tables in the database");
    assert_eq!(reply["tables"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_statement_failures_stay_on_the_server() -> Result<()> {
    let conn = setup()?;

    let reply = run(&conn, "/get/oximeter", &[("filter", "heart_rate >>> '1'")]);
    assert_eq!(reply, Reply::Failed);
    assert_eq!(reply.body(), json!({ "message": "internal error" }));
    Ok(())
}

#[test]
fn test_strict_filters() -> Result<()> {
    let conn = setup()?;

    let reply = body(run_with(
        &conn,
        FilterPolicy::Strict,
        "/get/oximeter",
        &[("filter", "user_id = 1; DROP TABLE users")],
    ));
    assert_eq!(reply["message"], "invalid request");
    assert_eq!(count_rows(&conn, "users")?, 2);

    let reply = body(run_with(
        &conn,
        FilterPolicy::Strict,
        "/get/oximeter",
        &[("filter", "temperature >= '100' AND blood_o2 < '97'")],
    ));
    assert_eq!(reply["message"], "found 2 oximeter entries");

    let reply = body(run_with(
        &conn,
        FilterPolicy::Strict,
        "/edit/oximeter/entry_id/1",
        &[("temperature", "temperature+(SELECT 1)")],
    ));
    assert_eq!(reply["message"], "invalid request");
    Ok(())
}

#[test]
fn test_commands_and_redirects() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/", &[]));
    assert_eq!(reply["message"], "available commands");
    assert_eq!(reply["commands"][0], "/add");

    let reply = body(run(&conn, "/logout", &[]));
    assert_eq!(reply, json!({ "message": "user logged out" }));

    assert_eq!(
        run(&conn, "/getAllSensorData", &[]),
        Reply::Redirect("/get/oximeter".to_string())
    );

    let reply = run(&conn, "/launch", &[]);
    assert!(matches!(reply, Reply::NotFound(_)));
    assert_eq!(reply.message().as_deref(), Some("unknown command"));
    Ok(())
}

#[test]
fn test_caller_parameters_are_refused() -> Result<()> {
    let conn = setup()?;

    for filter in ["heart_rate > ?1", "heart_rate > ?"] {
        let reply = body(run(&conn, "/get/oximeter/user_id/2", &[("filter", filter)]));
        assert_eq!(reply["message"], "invalid request", "{filter}");
    }

    let reply = body(run(
        &conn,
        "/edit/oximeter/entry_id/1",
        &[("temperature", "temperature + ?")],
    ));
    assert_eq!(reply["message"], "invalid request");
    let temperature: f64 = conn.query_row(
        "SELECT temperature FROM oximeter WHERE entry_id = 1",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(temperature, 98.6);
    Ok(())
}

#[test]
fn test_path_filter_keeps_its_slashes() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/delete/oximeter/user_id/2/filter/heart_rate/2 > 50 AND blood_o2/3 < 32",
        &[],
    ));
    assert_eq!(reply["message"], "1 oximeter entry deleted");
    assert_eq!(
        reply["submitted"]["filter"],
        "heart_rate/2 > 50 AND blood_o2/3 < 32"
    );
    assert_eq!(count_rows(&conn, "oximeter")?, 3);
    Ok(())
}

#[test]
fn test_values_are_stored_as_submitted() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(
        &conn,
        "/add/users",
        &[("username", "dave"), ("password", " pw ")],
    ));
    assert_eq!(reply["message"], "data added to users");
    assert_eq!(stored_password(&conn, "dave")?, "plain: pw ");

    let reply = body(run(&conn, "/login/username/dave/password/pw", &[]));
    assert_eq!(reply["message"], "incorrect password");
    let reply = body(run(&conn, "/get/users/username/ alice", &[]));
    assert_eq!(
        reply["message"],
        "0 user entries found using submitted parameters"
    );
    Ok(())
}

#[test]
fn test_new_tables_are_identified_by_integers() -> Result<()> {
    let conn = setup()?;

    let reply = body(run(&conn, "/createTable/notes/note_id/TEXT/memo/TEXT", &[]));
    assert_eq!(reply["message"], "invalid request");
    assert_snapshot!(
        reply["reason"].as_str().unwrap_or_default(),
        @"'note_id' identifies the rows of 'notes' and has to be INTEGER, got 'TEXT'"
    );

    let reply = body(run(&conn, "/get/notes", &[]));
    assert_eq!(reply["message"], "active tables in the database");
    Ok(())
}
