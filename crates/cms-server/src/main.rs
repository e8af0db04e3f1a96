use clap::{ArgAction, Args, Parser, Subcommand};
use cms_config::{AppConfig, ConfigLoader};
use cms_core::NewUser;
use cms_server::UserRef;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "CMS admin API server")]
struct Cli {
    /// 配置文件路径，默认读取可选的 cms.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 创建后台用户
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// 启用或停用用户
    SetUserActive {
        #[command(flatten)]
        target: Target,
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },
    /// 输出生效的配置（密钥已隐藏）
    PrintConfig,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Target {
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    email: Option<String>,
}

impl Target {
    fn into_ref(self) -> Option<UserRef> {
        self.id
            .map(UserRef::Id)
            .or_else(|| self.email.map(UserRef::Email))
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::from_path(path),
        None => ConfigLoader::new(),
    };
    Ok(loader.load()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            cms_server::init_logging(&config.logging)?;
            info!(config = ?cli.config, "Starting CMS admin server");
            cms_server::serve(config).await
        }
        Command::CreateUser {
            email,
            password,
            role,
            name,
        } => {
            cms_server::init_logging(&config.logging)?;
            let db = cms_server::connect_database(&config.database).await?;
            let user = cms_server::create_user(
                db,
                &config.auth,
                NewUser {
                    email,
                    password,
                    name,
                    role,
                },
            )
            .await?;
            println!("created user {} <{}> as {}", user.id, user.email, user.role);
            Ok(())
        }
        Command::SetUserActive { target, active } => {
            cms_server::init_logging(&config.logging)?;
            let Some(target) = target.into_ref() else {
                anyhow::bail!("either --id or --email is required");
            };
            let db = cms_server::connect_database(&config.database).await?;
            let user = cms_server::set_user_active(db, &config.auth, target, active).await?;
            println!("user {} <{}> active={}", user.id, user.email, user.active);
            Ok(())
        }
        Command::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
