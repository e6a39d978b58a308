//! Translation of table-generic requests into parameterized SQLite statements.
//!
//! The pieces, leaf first:
//! * [schema] reads the catalog and classifies columns by role
//! * [decompose] turns a path suffix and query parameters into column values and a filter
//! * [filter] rewrites filter literals into placeholders
//! * [sql] builds statements
//! * [basics] runs them

pub mod basics;
pub mod decompose;
pub mod filter;
pub mod schema;
pub mod shift;
pub mod sql;
