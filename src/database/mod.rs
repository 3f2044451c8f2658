pub mod connection;
pub mod entities;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tokio::sync::Mutex;

pub use connection::{create_connection, migrate_database};

use crate::domain::{Interface, InterfaceIdentifier, Peer, PeerIdentifier, RequestContext};
use crate::error::{AppError, Result};
use crate::repository::WireguardRepository;
use entities::{interface, peer};

/// sea-orm backed store for interfaces and peers.
#[derive(Clone)]
pub struct WireguardDatabase {
    db: Arc<DatabaseConnection>,
    write_lock: Arc<Mutex<()>>,
}

impl WireguardDatabase {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn find_interface(&self, id: &InterfaceIdentifier) -> Result<Option<interface::Model>> {
        Ok(interface::Entity::find_by_id(id.as_str()).one(&*self.db).await?)
    }
}

#[async_trait]
impl WireguardRepository for WireguardDatabase {
    async fn get_interface_and_peers(
        &self,
        ctx: &RequestContext,
        id: &InterfaceIdentifier,
    ) -> Result<(Interface, Vec<Peer>)> {
        let iface = self.get_interface(ctx, id).await?;

        ctx.check_cancelled()?;
        let peers = peer::Entity::find()
            .filter(peer::Column::InterfaceIdentifier.eq(id.as_str()))
            .order_by_asc(peer::Column::Identifier)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(peer::Model::into_domain)
            .collect::<Result<Vec<_>>>()?;

        Ok((iface, peers))
    }

    async fn get_interface(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<Interface> {
        ctx.check_cancelled()?;
        self.find_interface(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("interface {id}")))?
            .into_domain()
    }

    async fn get_peer(&self, ctx: &RequestContext, id: &PeerIdentifier) -> Result<Peer> {
        ctx.check_cancelled()?;
        peer::Entity::find_by_id(id.as_str())
            .one(&*self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("peer {id}")))?
            .into_domain()
    }

    async fn list_interfaces(&self, ctx: &RequestContext) -> Result<Vec<Interface>> {
        ctx.check_cancelled()?;
        interface::Entity::find()
            .order_by_asc(interface::Column::Identifier)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(interface::Model::into_domain)
            .collect()
    }

    async fn save_interface(&self, ctx: &RequestContext, iface: &Interface) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        ctx.check_cancelled()?;

        let mut model = interface::ActiveModel::from_domain(iface)?;
        match self.find_interface(&iface.identifier).await? {
            Some(existing) => {
                model.created_at = Set(existing.created_at);
                model.update(&*self.db).await?;
            }
            None => {
                model.insert(&*self.db).await?;
            }
        }

        tracing::debug!(interface = %iface.identifier, "Saved interface");
        Ok(())
    }

    async fn save_peer(&self, ctx: &RequestContext, peer: &Peer) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        ctx.check_cancelled()?;

        if self.find_interface(&peer.interface_identifier).await?.is_none() {
            return Err(AppError::NotFound(format!("interface {}", peer.interface_identifier)));
        }

        let mut model = peer::ActiveModel::from_domain(peer)?;
        match peer::Entity::find_by_id(peer.identifier.as_str()).one(&*self.db).await? {
            Some(existing) => {
                model.created_at = Set(existing.created_at);
                model.update(&*self.db).await?;
            }
            None => {
                model.insert(&*self.db).await?;
            }
        }

        tracing::debug!(peer = %peer.identifier, interface = %peer.interface_identifier, "Saved peer");
        Ok(())
    }

    async fn delete_interface(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        ctx.check_cancelled()?;

        let txn = self.db.begin().await?;
        peer::Entity::delete_many()
            .filter(peer::Column::InterfaceIdentifier.eq(id.as_str()))
            .exec(&txn)
            .await?;
        let deleted = interface::Entity::delete_by_id(id.as_str()).exec(&txn).await?;
        txn.commit().await?;

        if deleted.rows_affected == 0 {
            return Err(AppError::NotFound(format!("interface {id}")));
        }
        tracing::debug!(interface = %id, "Deleted interface");
        Ok(())
    }
}
