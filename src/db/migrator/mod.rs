use sea_orm_migration::prelude::*;

mod m20260301_create_accounts;
mod m20260305_create_posts;
mod m20260312_create_password_resets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_create_accounts::Migration),
            Box::new(m20260305_create_posts::Migration),
            Box::new(m20260312_create_password_resets::Migration),
        ]
    }
}
