//! Per-(user, faucet) admin popup suppression flag.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "popup_preferences")]
pub struct Model {
    /// User wallet address, EIP-55 checksummed
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(42))")]
    pub user_address: String,
    /// Faucet contract address, EIP-55 checksummed
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(42))")]
    pub faucet_address: String,
    pub dont_show_admin_popup: bool,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
