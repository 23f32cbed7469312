//! # Chart of Accounts Scheme
//!
//! Fixed account codes and the roles the posting engine and till manager
//! ask for. The codes are a persisted convention: changing any constant in
//! this file orphans existing ledgers.
//!
//! ## Code Tree
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1 Assets (root, seeded)                                               │
//! │  ├── 111 Cash (header, auto-created)                                   │
//! │  │   ├── 11101-COMPANY   company cash in hand                          │
//! │  │   ├── 11101-{outlet}  outlet cash in hand                           │
//! │  │   └── 11102-{outlet}  outlet cash in till                           │
//! │  ├── 1130 Accounts Receivable                                          │
//! │  ├── 1140-{outlet} Supplier Advances                                   │
//! │  ├── 1150 Inventory                                                    │
//! │  └── 1160 Input Tax Recoverable                                        │
//! │  2 Liabilities: 2110 AP, 2120 Sales Tax, 2130 Salaries Payable         │
//! │  3 Equity:      3100 Opening Balance Equity                            │
//! │  4 Revenue:     4100 Sales Revenue                                     │
//! │  5 Expenses:    5100 COGS, 5200 Salaries, 5300 Cash Over/Short         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::AccountType;

// =============================================================================
// Fixed Codes
// =============================================================================

pub const ASSET_ROOT_CODE: &str = "1";
pub const LIABILITY_ROOT_CODE: &str = "2";
pub const EQUITY_ROOT_CODE: &str = "3";
pub const REVENUE_ROOT_CODE: &str = "4";
pub const EXPENSE_ROOT_CODE: &str = "5";

pub const CASH_HEADER_CODE: &str = "111";
pub const CASH_HEADER_NAME: &str = "Cash";
pub const CASH_IN_HAND_CODE: &str = "11101";
pub const CASH_IN_TILL_CODE: &str = "11102";
pub const SUPPLIER_ADVANCES_CODE: &str = "1140";

/// Suffix used for company-scope children.
pub const COMPANY_SUFFIX: &str = "COMPANY";

// =============================================================================
// System Accounts
// =============================================================================

/// Company-scope posting accounts living directly under a root header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemAccount {
    AccountsReceivable,
    Inventory,
    InputTax,
    AccountsPayable,
    SalesTaxPayable,
    SalariesPayable,
    OpeningEquity,
    SalesRevenue,
    CostOfGoodsSold,
    SalariesExpense,
    CashOverShort,
}

impl SystemAccount {
    pub const ALL: [SystemAccount; 11] = [
        SystemAccount::AccountsReceivable,
        SystemAccount::Inventory,
        SystemAccount::InputTax,
        SystemAccount::AccountsPayable,
        SystemAccount::SalesTaxPayable,
        SystemAccount::SalariesPayable,
        SystemAccount::OpeningEquity,
        SystemAccount::SalesRevenue,
        SystemAccount::CostOfGoodsSold,
        SystemAccount::SalariesExpense,
        SystemAccount::CashOverShort,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            SystemAccount::AccountsReceivable => "1130",
            SystemAccount::Inventory => "1150",
            SystemAccount::InputTax => "1160",
            SystemAccount::AccountsPayable => "2110",
            SystemAccount::SalesTaxPayable => "2120",
            SystemAccount::SalariesPayable => "2130",
            SystemAccount::OpeningEquity => "3100",
            SystemAccount::SalesRevenue => "4100",
            SystemAccount::CostOfGoodsSold => "5100",
            SystemAccount::SalariesExpense => "5200",
            SystemAccount::CashOverShort => "5300",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            SystemAccount::AccountsReceivable => "Accounts Receivable",
            SystemAccount::Inventory => "Inventory",
            SystemAccount::InputTax => "Input Tax Recoverable",
            SystemAccount::AccountsPayable => "Accounts Payable",
            SystemAccount::SalesTaxPayable => "Sales Tax Payable",
            SystemAccount::SalariesPayable => "Salaries Payable",
            SystemAccount::OpeningEquity => "Opening Balance Equity",
            SystemAccount::SalesRevenue => "Sales Revenue",
            SystemAccount::CostOfGoodsSold => "Cost of Goods Sold",
            SystemAccount::SalariesExpense => "Salaries Expense",
            SystemAccount::CashOverShort => "Cash Over/Short",
        }
    }

    pub const fn account_type(&self) -> AccountType {
        match self {
            SystemAccount::AccountsReceivable
            | SystemAccount::Inventory
            | SystemAccount::InputTax => AccountType::Asset,
            SystemAccount::AccountsPayable
            | SystemAccount::SalesTaxPayable
            | SystemAccount::SalariesPayable => AccountType::Liability,
            SystemAccount::OpeningEquity => AccountType::Equity,
            SystemAccount::SalesRevenue => AccountType::Revenue,
            SystemAccount::CostOfGoodsSold
            | SystemAccount::SalariesExpense
            | SystemAccount::CashOverShort => AccountType::Expense,
        }
    }
}

/// Root header code for an account type.
pub const fn root_code(account_type: AccountType) -> &'static str {
    match account_type {
        AccountType::Asset => ASSET_ROOT_CODE,
        AccountType::Liability => LIABILITY_ROOT_CODE,
        AccountType::Equity => EQUITY_ROOT_CODE,
        AccountType::Revenue => REVENUE_ROOT_CODE,
        AccountType::Expense => EXPENSE_ROOT_CODE,
    }
}

// =============================================================================
// Account Role
// =============================================================================

/// How the parent header of a role is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRule {
    /// Get-or-create a company-scope header under an (optional) root.
    AutoCreate {
        code: &'static str,
        name: &'static str,
        account_type: AccountType,
        parent_code: &'static str,
    },
    /// Header must already exist; a missing one is `AccountNotFound`.
    Existing { code: &'static str },
}

/// A canonical account, identified by what it is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountRole {
    CompanyCash,
    OutletCashInHand(String),
    OutletCashInTill(String),
    SupplierAdvances(String),
    System(SystemAccount),
}

impl AccountRole {
    /// Cash in hand for an outlet, or company cash without one.
    pub fn cash_in_hand(outlet_id: Option<&str>) -> Self {
        match outlet_id {
            Some(outlet) => AccountRole::OutletCashInHand(outlet.to_string()),
            None => AccountRole::CompanyCash,
        }
    }

    /// Composed account code, e.g. `11102-OUT1`.
    pub fn code(&self) -> String {
        match self {
            AccountRole::CompanyCash => format!("{}-{}", CASH_IN_HAND_CODE, COMPANY_SUFFIX),
            AccountRole::OutletCashInHand(outlet) => format!("{}-{}", CASH_IN_HAND_CODE, outlet),
            AccountRole::OutletCashInTill(outlet) => format!("{}-{}", CASH_IN_TILL_CODE, outlet),
            AccountRole::SupplierAdvances(outlet) => {
                format!("{}-{}", SUPPLIER_ADVANCES_CODE, outlet)
            }
            AccountRole::System(account) => account.code().to_string(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            AccountRole::CompanyCash => "Cash in Hand (Company)".to_string(),
            AccountRole::OutletCashInHand(outlet) => format!("Cash in Hand ({})", outlet),
            AccountRole::OutletCashInTill(outlet) => format!("Cash in Till ({})", outlet),
            AccountRole::SupplierAdvances(outlet) => format!("Supplier Advances ({})", outlet),
            AccountRole::System(account) => account.name().to_string(),
        }
    }

    pub fn account_type(&self) -> AccountType {
        match self {
            AccountRole::System(account) => account.account_type(),
            _ => AccountType::Asset,
        }
    }

    /// Scope of the child account (`None` = company).
    pub fn outlet_id(&self) -> Option<&str> {
        match self {
            AccountRole::OutletCashInHand(outlet)
            | AccountRole::OutletCashInTill(outlet)
            | AccountRole::SupplierAdvances(outlet) => Some(outlet),
            AccountRole::CompanyCash | AccountRole::System(_) => None,
        }
    }

    pub fn header(&self) -> HeaderRule {
        match self {
            AccountRole::CompanyCash
            | AccountRole::OutletCashInHand(_)
            | AccountRole::OutletCashInTill(_) => HeaderRule::AutoCreate {
                code: CASH_HEADER_CODE,
                name: CASH_HEADER_NAME,
                account_type: AccountType::Asset,
                parent_code: ASSET_ROOT_CODE,
            },
            AccountRole::SupplierAdvances(_) => HeaderRule::Existing {
                code: ASSET_ROOT_CODE,
            },
            AccountRole::System(account) => HeaderRule::Existing {
                code: root_code(account.account_type()),
            },
        }
    }
}

impl From<SystemAccount> for AccountRole {
    fn from(account: SystemAccount) -> Self {
        AccountRole::System(account)
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}
