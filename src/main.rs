// ==========================================
// 影院经营决策系统 - 命令行入口
// ==========================================
// 子命令: init-db | operate | approve | reflect | config
// 结果以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use cinema_ops::app::{get_default_db_path, AppState};
use cinema_ops::domain::types::Intent;
use cinema_ops::{i18n, logging, OperateRequest};

#[derive(Parser)]
#[command(name = "cinema-ops")]
#[command(author, version, about = "影院经营决策系统: 需求预测 / 排片 / 调价 / 复盘")]
struct Cli {
    /// 数据库路径（缺省: CINEMA_OPS_DB_PATH 或用户数据目录）
    #[arg(long, global = true)]
    db: Option<String>,

    /// 汇总语言（zh-CN | en）
    #[arg(long, global = true, default_value = "zh-CN")]
    lang: String,

    /// JSON 格式日志
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化数据库表结构
    InitDb,

    /// 发起一次经营决策运行
    Operate {
        /// 显式意图: scheduling | pricing | optimize
        #[arg(long, value_parser = parse_intent)]
        intent: Option<Intent>,

        /// 自由文本诉求（未给 intent 时用于路由）
        #[arg(long)]
        query: Option<String>,

        /// 影片ID过滤，逗号分隔
        #[arg(long, value_delimiter = ',')]
        movies: Vec<String>,

        /// 预测天数
        #[arg(long, default_value_t = 3)]
        days: u32,
    },

    /// 审批挂起的运行并继续执行
    Approve {
        /// operate 返回的审批令牌
        token: String,
    },

    /// 回填实际值并汇总预测误差
    Reflect,

    /// 参数与信号配置
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// 列出配置（可按前缀过滤）
    List {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// 覆写参数
    Set { key: String, value: String },
    /// 设置影片热度 [0, 1]
    Buzz { movie_id: String, score: f64 },
    /// 设置节假日需求系数 [0.5, 3.0]
    Holiday { date: String, boost: f64 },
    /// 查看当前生效参数
    Policy,
}

fn parse_intent(raw: &str) -> Result<Intent, String> {
    raw.parse()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }
    i18n::set_locale(&cli.lang);

    tracing::info!(version = cinema_ops::VERSION, "{}", cinema_ops::APP_NAME);

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path.clone())
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    match cli.command {
        Commands::InitDb => {
            print_json(&serde_json::json!({ "db_path": db_path, "status": "ok" }))?;
        }
        Commands::Operate {
            intent,
            query,
            movies,
            days,
        } => {
            let request = OperateRequest {
                intent,
                query,
                movies: if movies.is_empty() { None } else { Some(movies) },
                forecast_days: days,
            };
            let outcome = state.operations_api.operate(request).await?;
            print_json(&outcome)?;
        }
        Commands::Approve { token } => {
            let outcome = state.operations_api.approve(&token).await?;
            print_json(&outcome)?;
        }
        Commands::Reflect => {
            let section = state.operations_api.reflect()?;
            print_json(&section)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::List { prefix } => {
                print_json(&state.config_api.list_configs(prefix.as_deref())?)?;
            }
            ConfigCommands::Set { key, value } => {
                state.config_api.update_config(&key, &value)?;
                print_json(&serde_json::json!({ "key": key, "value": value }))?;
            }
            ConfigCommands::Buzz { movie_id, score } => {
                state.config_api.set_buzz(&movie_id, score)?;
                print_json(&serde_json::json!({ "movie_id": movie_id, "buzz": score }))?;
            }
            ConfigCommands::Holiday { date, boost } => {
                state.config_api.set_holiday(&date, boost)?;
                print_json(&serde_json::json!({ "date": date, "boost": boost }))?;
            }
            ConfigCommands::Policy => {
                print_json(&state.config_api.current_policy()?)?;
            }
        },
    }

    Ok(())
}
