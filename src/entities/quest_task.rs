//! Opaque quest-task documents attached at set-claim-parameters time.
//! Written here, read by the external quest service.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quest_tasks")]
pub struct Model {
    /// Faucet contract address, EIP-55 checksummed
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(42))")]
    pub faucet_address: String,
    pub tasks: Json,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
