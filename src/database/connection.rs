use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait, Schema, Statement};
use migration::prelude::{MysqlQueryBuilder, PostgresQueryBuilder, SqliteQueryBuilder};
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::database::entities::{interface, peer};

/// Local file behind a `sqlite://` url, without query parameters.
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then(|| Path::new(path))
}

/// Creates the sqlite file and its directory if missing.
fn ensure_sqlite_file(path: &Path) -> Result<(), DbErr> {
    if path.exists() {
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| DbErr::Custom(format!("cannot create {}: {e}", dir.display())))?;
    }
    std::fs::File::create(path).map_err(|e| DbErr::Custom(format!("cannot create {}: {e}", path.display())))?;
    tracing::info!("Created database {}", path.display());
    Ok(())
}

pub async fn create_connection(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    if let Some(path) = sqlite_file_path(&config.url) {
        ensure_sqlite_file(path)?;
    }

    let mut options = sea_orm::ConnectOptions::new(&config.url);

    options
        .max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .max_lifetime(Duration::from_secs(config.max_lifetime))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(options).await
}

pub async fn migrate_database(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, interface::Entity).await?;
    create_table(db, peer::Entity).await?;

    tracing::info!("Database migration completed");
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut stmt = schema.create_table_from_entity(entity);

    let sql = match backend {
        DbBackend::Sqlite => stmt.if_not_exists().to_string(SqliteQueryBuilder),
        DbBackend::Postgres => stmt.if_not_exists().to_string(PostgresQueryBuilder),
        DbBackend::MySql => stmt.if_not_exists().to_string(MysqlQueryBuilder),
    };

    db.execute(Statement::from_string(backend, sql)).await?;
    Ok(())
}
