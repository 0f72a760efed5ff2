//! # API RBAC 主程序
//!
//! 双令牌会话与角色权限管理服务

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use api_rbac::{
    Result,
    app::AppContext,
    config, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    management::ManagementServer,
};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "api-rbac")]
#[command(about = "Dual-token session management and RBAC server")]
struct Cli {
    /// 配置文件路径，默认 config/config.{RUST_ENV}.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志级别过滤，如 info 或 api_rbac=debug
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动 HTTP 服务（默认）
    Serve,

    /// 只执行数据库迁移
    Migrate,

    /// 为用户追加一个角色
    GrantRole {
        /// 用户ID
        #[arg(long)]
        user_id: i32,

        /// 角色ID
        #[arg(long)]
        role_id: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    let config = config::load_config(cli.config.as_deref())?;
    let context = Arc::new(AppContext::from_database(config).await?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Main,
                "service_starting",
                "服务启动"
            );
            if let Err(e) = ManagementServer::new(context).serve().await {
                lerror!(
                    "system",
                    LogStage::Startup,
                    LogComponent::Main,
                    "service_failed",
                    format!("服务异常退出: {e:?}")
                );
                return Err(e);
            }
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::Main,
                "service_shutdown",
                "服务正常关闭"
            );
        }
        Commands::Migrate => {
            // 迁移已在上下文初始化时完成
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate_done",
                "数据库迁移完成"
            );
        }
        Commands::GrantRole { user_id, role_id } => {
            let mut role_ids: Vec<i32> = context
                .rbac
                .user_roles(user_id)
                .await?
                .into_iter()
                .map(|role| role.id)
                .collect();
            if !role_ids.contains(&role_id) {
                role_ids.push(role_id);
            }
            let roles = context.rbac.set_user_roles(user_id, &role_ids).await?;
            let codes: Vec<String> = roles.into_iter().map(|role| role.code).collect();
            linfo!(
                "system",
                LogStage::Authorization,
                LogComponent::Main,
                "grant_role",
                format!("用户 {user_id} 当前角色: {}", codes.join(", "))
            );
        }
    }
    Ok(())
}
