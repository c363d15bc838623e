//! Repository adapters: an in-memory store for tests/single-instance runs,
//! and a sqlite-backed store under `infrastructure::persistence`.

pub mod in_memory;
