use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    // 未设置 DATABASE_URL 时由 CLI 的 --database-url 参数提供
    cli::run_cli(migration::Migrator).await;
}
