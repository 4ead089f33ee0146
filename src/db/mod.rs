//! Database module: models, schema and the actor owning the SQLite pool.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and insert payloads
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `patch.rs`: COALESCE patch payloads
//! - `ops/`: per-table queries run inside the actor

pub mod actor;
pub mod models;
pub mod ops;
pub mod patch;
pub mod schema;

mod patch_impl;

pub use actor::{DbActorHandle, spawn};
pub use models::{
    BranchRequest, ChatFilter, ChatWithWorkbench, DbAccount, DbChat, DbMessage, DbUser,
    DbWorkbench, NewAccount, NewChat, NewMessage, NewUser, NewWorkbench,
};
pub use patch::{AccountPatch, ChatPatch, DbPatchable, EntityPatch, UserPatch, WorkbenchPatch};
pub use schema::SQLITE_INIT;
