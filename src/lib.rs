//! Client side of a folder permissions viewer: fetch folders, subfolders and permission records from a backend, track
//! the selection in a reducer-style view state, and project permission records into table data.

pub mod common;
pub mod config;
pub mod v1;
