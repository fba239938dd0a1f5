use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reference-data entities. Creation/maintenance of these rows is an
/// external collaborator (out of scope per §1) — the core only ever reads
/// them by id or name to validate a command and pull a handful of fields
/// (default_aging_days, allows_lot_mixing, sku, …).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub is_meat: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossType {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub active: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessProfile {
    pub id: i64,
    pub name: String,
    pub allows_lot_mixing: bool,
    pub default_aging_days: Option<i32>,
    pub mode: Option<String>,
}

/// Well-known process profile names looked up at runtime (§9: fetched by
/// name, fail fast if missing — applied to breakdown and QA split; rework
/// keeps the source's fetch-or-create behavior).
pub const PROFILE_NAME_BREAKDOWN: &str = "Breakdown";
pub const PROFILE_NAME_QA_SPLIT: &str = "QA Split";
pub const PROFILE_NAME_REWORK: &str = "Rework / Regrade";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotCodeCounter {
    pub code_date: NaiveDate,
    pub prefix: String,
    pub last_seq: i32,
}
