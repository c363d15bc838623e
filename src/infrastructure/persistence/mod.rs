//! Sqlite-backed persistence. Database bootstrap is limited to the inline
//! `CREATE TABLE IF NOT EXISTS` schema in `database::Database::new`; a
//! dedicated migration-runner binary is out of scope.

pub mod database;
pub mod repositories;
