pub use sea_orm_migration::prelude::*;

mod m20250807_000001_create_relayer_tables;
mod m20250807_000002_add_analytics_cache;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250807_000001_create_relayer_tables::Migration),
            Box::new(m20250807_000002_add_analytics_cache::Migration),
        ]
    }
}
