use super::{
    add_op, del_op, edit_op, get_op, login_op, table_op,
    utils::{Reply, Rejected, RouteContext},
};
use crate::sqlite::basics::StatementError;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The commands listed by the index route
pub const COMMANDS: [&str; 8] = [
    "/add",
    "/get",
    "/edit",
    "/delete",
    "/createTable",
    "/deleteTable",
    "/login",
    "/logout",
];

/// Paths kept for older clients and the route each one moved to
pub const LEGACY_ROUTES: [(&str, &str); 11] = [
    ("addUser", "/add/users"),
    ("createUser", "/add/users"),
    ("getUser", "/get/users"),
    ("getUsers", "/get/users"),
    ("editUser", "/edit/users"),
    ("deleteUser", "/delete/users"),
    ("addSensorData", "/add/oximeter"),
    ("getSensorData", "/get/oximeter"),
    ("getAllSensorData", "/get/oximeter"),
    ("editSensorData", "/edit/oximeter"),
    ("deleteSensorData", "/delete/oximeter"),
];

///
/// The table a command works on and the rest of its path
/// # Fields
/// * `table` - the table name, empty when the path has none
/// * `rest` - the `key/value/...` path suffix after the table name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
    pub table: String,
    pub rest: String,
}

impl TableTarget {
    fn parse(path: &str) -> Self {
        let (table, rest) = path.split_once('/').unwrap_or((path, ""));
        Self {
            table: table.to_string(),
            rest: rest.to_string(),
        }
    }
}

///
/// One command of the HTTP surface, parsed from the request path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteOp {
    ///
    /// `/`, lists the commands
    Index,

    ///
    /// `/add/<table>/<k>/<v>/...`, inserts one row
    Add(TableTarget),

    ///
    /// `/get/<table>/<k>/<v>/.../filter/<expr>`, reads rows
    Get(TableTarget),

    ///
    /// `/edit/<table>/<k>/<v>/...`, updates editable columns
    Edit(TableTarget),

    ///
    /// `/delete/<table>/<k>/<v>/...`, deletes rows
    Delete(TableTarget),

    ///
    /// `/createTable/<table>/<column>/<TYPE>/...`
    CreateTable(TableTarget),

    ///
    /// `/deleteTable/<table>`
    DeleteTable(TableTarget),

    ///
    /// `/login/username/<name>/password/<password>`, a stateless credential check
    Login(String),

    Logout,

    ///
    /// An older path, answered with a redirect to its replacement
    LegacyRedirect(String),

    ///
    /// Anything else, carrying the path as it was requested
    Unknown(String),
}

impl RouteOp {
    ///
    /// Parse a request path, with or without leading and trailing slashes
    /// # Examples
    /// ```
    /// use pathstore::action::{RouteOp, TableTarget};
    /// assert_eq!(
    ///     RouteOp::from_path("/get/oximeter/user_id/3/"),
    ///     RouteOp::Get(TableTarget { table: "oximeter".to_string(), rest: "user_id/3".to_string() })
    /// );
    /// assert_eq!(RouteOp::from_path("/getUsers"), RouteOp::LegacyRedirect("/get/users".to_string()));
    /// ```
    pub fn from_path(path: &str) -> Self {
        let path = path.trim_matches('/');
        if path.is_empty() {
            return Self::Index;
        }
        let (command, rest) = path.split_once('/').unwrap_or((path, ""));
        match command {
            "add" => Self::Add(TableTarget::parse(rest)),
            "get" => Self::Get(TableTarget::parse(rest)),
            "edit" => Self::Edit(TableTarget::parse(rest)),
            "delete" => Self::Delete(TableTarget::parse(rest)),
            "createTable" => Self::CreateTable(TableTarget::parse(rest)),
            "deleteTable" => Self::DeleteTable(TableTarget::parse(rest)),
            "login" => Self::Login(rest.to_string()),
            "logout" if rest.is_empty() => Self::Logout,
            _ => match LEGACY_ROUTES.iter().find(|(old, _)| *old == command) {
                Some((_, new)) if rest.is_empty() => Self::LegacyRedirect(new.to_string()),
                _ => Self::Unknown(format!("/{path}")),
            },
        }
    }

    ///
    /// A short name for log lines, never carrying caller data
    pub fn name(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Add(_) => "add",
            Self::Get(_) => "get",
            Self::Edit(_) => "edit",
            Self::Delete(_) => "delete",
            Self::CreateTable(_) => "createTable",
            Self::DeleteTable(_) => "deleteTable",
            Self::Login(_) => "login",
            Self::Logout => "logout",
            Self::LegacyRedirect(_) => "redirect",
            Self::Unknown(_) => "unknown",
        }
    }

    fn dispatch(&self, ctx: &RouteContext, query: &[(String, String)]) -> Result<Reply> {
        match self {
            Self::Index => Ok(Reply::Json(json!({
                "message": "available commands",
                "commands": COMMANDS,
            }))),
            Self::Add(target) => add_op::add(ctx, target, query),
            Self::Get(target) => get_op::get(ctx, target, query),
            Self::Edit(target) => edit_op::edit(ctx, target, query),
            Self::Delete(target) => del_op::delete(ctx, target, query),
            Self::CreateTable(target) => table_op::create_table(ctx, target, query),
            Self::DeleteTable(target) => table_op::delete_table(ctx, target),
            Self::Login(rest) => login_op::login(ctx, rest, query),
            Self::Logout => Ok(Reply::Json(json!({ "message": "user logged out" }))),
            Self::LegacyRedirect(location) => Ok(Reply::Redirect(location.clone())),
            Self::Unknown(path) => Ok(Reply::NotFound(json!({
                "message": "unknown command",
                "path": path,
                "commands": COMMANDS,
            }))),
        }
    }

    ///
    /// Execute the command.
    ///
    /// Refused input is answered with its reason.
    /// Every other failure is logged with its statement and values,
    /// and the caller only learns that an internal error happened.
    /// # Arguments
    /// * `ctx` - the connection and capabilities held for this request
    /// * `query` - the query parameters in the order they were received
    pub fn run(&self, ctx: &RouteContext, query: &[(String, String)]) -> Reply {
        match self.dispatch(ctx, query) {
            Ok(reply) => reply,
            Err(err) => {
                if let Some(Rejected(reason)) = err.downcast_ref::<Rejected>() {
                    return Reply::Json(json!({
                        "message": "invalid request",
                        "reason": reason,
                    }));
                }
                match err.downcast_ref::<StatementError>() {
                    Some(failure) => {
                        tracing::error!(op = self.name(), failure = %failure.json(), "statement failed")
                    }
                    None => tracing::error!(op = self.name(), error = ?err, "request failed"),
                }
                Reply::Failed
            }
        }
    }
}
