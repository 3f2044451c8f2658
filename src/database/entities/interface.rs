use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::Interface;
use crate::error::Result as AppResult;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "interfaces")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub identifier: String,
    pub display_name: String,
    #[sea_orm(column_type = "Text")]
    pub data: String, // serialized domain::Interface
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self) -> AppResult<Interface> {
        let mut iface: Interface = serde_json::from_str(&self.data)?;
        // stored blocks may predate normalization
        let adv = iface.advanced_security().map(|adv| adv.normalized());
        iface.set_advanced_security(adv);
        Ok(iface)
    }
}

impl ActiveModel {
    pub fn from_domain(iface: &Interface) -> AppResult<Self> {
        let now = chrono::Utc::now();
        Ok(Self {
            identifier: Set(iface.identifier.to_string()),
            display_name: Set(iface.display_name.clone()),
            data: Set(serde_json::to_string(iface)?),
            created_at: Set(now),
            updated_at: Set(now),
        })
    }
}
