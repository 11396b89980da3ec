//! Table schema definitions and the DDL built from them.
//!
//! - column/table model + the product schema (`table`)
//! - identifier allow-list and `CREATE TABLE` generation (`ddl`)

pub mod ddl;
pub mod table;

pub use ddl::*;
pub use table::*;
