//! Database module - connection and statement handles over SQLite

mod database;
mod params;
mod row;
mod statement;

pub use database::Database;
pub use params::{to_sql_value, Params};
pub use row::sqlite_to_json;
pub use statement::Statement;
