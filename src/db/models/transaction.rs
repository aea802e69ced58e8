//! Billing transaction (invoice) models.
//!
//! Transactions are an append-only ledger: once written they are never
//! mutated, and there is no refund or void operation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    /// Present when the invoice was created automatically by a completed
    /// appointment
    pub appointment_id: Option<String>,
    pub date: String,
    pub amount: i64,
    pub status: String,
    pub service: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub patient_id: String,
    pub amount: i64,
    pub status: TransactionStatus,
    pub service: Option<String>,
}

/// Query parameters for filtering the ledger
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TransactionQuery {
    pub patient_id: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}
