use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::domain::Peer;
use crate::error::Result as AppResult;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "peers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub identifier: String,
    pub interface_identifier: String,
    pub user_identifier: String,
    pub display_name: String,
    #[sea_orm(column_type = "Text")]
    pub data: String, // serialized domain::Peer
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self) -> AppResult<Peer> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

impl ActiveModel {
    pub fn from_domain(peer: &Peer) -> AppResult<Self> {
        let now = chrono::Utc::now();
        Ok(Self {
            identifier: Set(peer.identifier.to_string()),
            interface_identifier: Set(peer.interface_identifier.to_string()),
            user_identifier: Set(peer.user_identifier.to_string()),
            display_name: Set(peer.display_name.clone()),
            data: Set(serde_json::to_string(peer)?),
            created_at: Set(now),
            updated_at: Set(now),
        })
    }
}
