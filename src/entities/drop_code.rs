//! Secret drop-code entity gating the coded claim path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drop_codes")]
pub struct Model {
    /// Faucet contract address, EIP-55 checksummed (one code per faucet)
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(42))")]
    pub faucet_address: String,
    /// 6-character code over [A-Z0-9]
    #[sea_orm(column_type = "String(StringLen::N(6))")]
    pub code: String,
    /// Validity window start, unix seconds
    pub start_time: i64,
    /// Validity window end, unix seconds (inclusive)
    pub end_time: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
