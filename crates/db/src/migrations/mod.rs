//! Database migrations.
//!
//! Schema migrations for the status store.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_moderation_action_table;
mod m20250101_000002_create_vip_user_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_moderation_action_table::Migration),
            Box::new(m20250101_000002_create_vip_user_table::Migration),
        ]
    }
}
