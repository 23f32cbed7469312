//! # Document Kinds
//!
//! The closed vocabulary of document origins (`RefType`) and the party
//! ledger's document classification (`DocType`).
//!
//! Both enums persist as their exact PascalCase variant names
//! (`"Sale"`, `"SaleRev"`, ...). These strings are a stored convention and
//! must stay bit-stable across versions.
//!
//! ## RefType → DocType
//! ```text
//! ┌──────────────────────────────┬──────────────────┐
//! │ RefType                      │ DocType          │
//! ├──────────────────────────────┼──────────────────┤
//! │ Sale, SaleRev                │ Sale             │
//! │ SaleReturn, Amend            │ SaleReturn       │
//! │ Purchase                     │ Purchase         │
//! │ PurchaseReturn               │ PurchaseReturn   │
//! │ Receipt                      │ Receipt          │
//! │ Payment, PayrollPayment      │ Payment          │
//! │ everything else              │ Adjustment       │
//! └──────────────────────────────┴──────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// RefType
// =============================================================================

/// Origin kind of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum RefType {
    Sale,
    SaleReturn,
    Purchase,
    PurchaseReturn,
    Receipt,
    Payment,
    Adjustment,
    /// Amendment of a posted sale (delta only).
    SaleRev,
    /// Amendment of a posted sale return (delta only).
    Amend,
    Opening,
    Voucher,
    PayrollAccrual,
    PayrollPayment,
    TillClose,
    /// Mirror of an earlier journal; ref id is the reversed transaction.
    Reversal,
}

impl RefType {
    pub const ALL: [RefType; 15] = [
        RefType::Sale,
        RefType::SaleReturn,
        RefType::Purchase,
        RefType::PurchaseReturn,
        RefType::Receipt,
        RefType::Payment,
        RefType::Adjustment,
        RefType::SaleRev,
        RefType::Amend,
        RefType::Opening,
        RefType::Voucher,
        RefType::PayrollAccrual,
        RefType::PayrollPayment,
        RefType::TillClose,
        RefType::Reversal,
    ];

    /// Persisted string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RefType::Sale => "Sale",
            RefType::SaleReturn => "SaleReturn",
            RefType::Purchase => "Purchase",
            RefType::PurchaseReturn => "PurchaseReturn",
            RefType::Receipt => "Receipt",
            RefType::Payment => "Payment",
            RefType::Adjustment => "Adjustment",
            RefType::SaleRev => "SaleRev",
            RefType::Amend => "Amend",
            RefType::Opening => "Opening",
            RefType::Voucher => "Voucher",
            RefType::PayrollAccrual => "PayrollAccrual",
            RefType::PayrollPayment => "PayrollPayment",
            RefType::TillClose => "TillClose",
            RefType::Reversal => "Reversal",
        }
    }

    /// Human-readable source label used by cash-book reports.
    pub const fn label(&self) -> &'static str {
        match self {
            RefType::Sale => "Sale",
            RefType::SaleReturn => "Sale Return",
            RefType::Purchase => "Purchase",
            RefType::PurchaseReturn => "Purchase Return",
            RefType::Receipt => "Receipt",
            RefType::Payment => "Payment",
            RefType::Adjustment => "Adjustment",
            RefType::SaleRev => "Sale Revision",
            RefType::Amend => "Sale Return Revision",
            RefType::Opening => "Opening Balance",
            RefType::Voucher => "Voucher",
            RefType::PayrollAccrual => "Payroll",
            RefType::PayrollPayment => "Payroll",
            RefType::TillClose => "Till Close",
            RefType::Reversal => "Reversal",
        }
    }

    /// Party ledger classification for this origin.
    pub const fn doc_type(&self) -> DocType {
        match self {
            RefType::Sale | RefType::SaleRev => DocType::Sale,
            RefType::SaleReturn | RefType::Amend => DocType::SaleReturn,
            RefType::Purchase => DocType::Purchase,
            RefType::PurchaseReturn => DocType::PurchaseReturn,
            RefType::Receipt => DocType::Receipt,
            RefType::Payment | RefType::PayrollPayment => DocType::Payment,
            _ => DocType::Adjustment,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RefType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "ref_type".to_string(),
                allowed: RefType::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// DocType
// =============================================================================

/// Document classification carried by party ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum DocType {
    Sale,
    SaleReturn,
    Purchase,
    PurchaseReturn,
    Receipt,
    Payment,
    Adjustment,
}

impl From<RefType> for DocType {
    fn from(kind: RefType) -> Self {
        kind.doc_type()
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocType::Sale => "Sale",
            DocType::SaleReturn => "SaleReturn",
            DocType::Purchase => "Purchase",
            DocType::PurchaseReturn => "PurchaseReturn",
            DocType::Receipt => "Receipt",
            DocType::Payment => "Payment",
            DocType::Adjustment => "Adjustment",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_type_strings_are_stable() {
        assert_eq!(RefType::SaleRev.as_str(), "SaleRev");
        assert_eq!(RefType::Amend.as_str(), "Amend");
        assert_eq!(RefType::PurchaseReturn.to_string(), "PurchaseReturn");

        for kind in RefType::ALL {
            assert_eq!(kind.as_str().parse::<RefType>().unwrap(), kind);
        }
        assert!("sale".parse::<RefType>().is_err());
    }

    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&RefType::SaleReturn).unwrap();
        assert_eq!(json, "\"SaleReturn\"");
    }

    #[test]
    fn test_doc_type_mapping() {
        assert_eq!(DocType::from(RefType::SaleRev), DocType::Sale);
        assert_eq!(DocType::from(RefType::Amend), DocType::SaleReturn);
        assert_eq!(DocType::from(RefType::PayrollPayment), DocType::Payment);
        assert_eq!(DocType::from(RefType::Voucher), DocType::Adjustment);
        assert_eq!(DocType::from(RefType::Opening), DocType::Adjustment);
        assert_eq!(DocType::from(RefType::Reversal), DocType::Adjustment);
    }
}
