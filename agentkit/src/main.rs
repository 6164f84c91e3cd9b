use dotenv::dotenv;
use serde_json::Value;
use std::sync::Arc;

use agentkit::action::providers::default_providers;
use agentkit::action::AgentKit;
use agentkit::config::Config;
use agentkit::http::ReqwestHttpClient;
use agentkit::tokens::load_tokens;
use agentkit::wallet::EnvWalletProvider;

const USAGE: &str = "Usage:
  agentkit list                      Print the available actions as JSON
  agentkit invoke <action> [json]    Run one action with JSON parameters";

enum Command {
    List,
    Invoke { action: String, params: Value },
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    match args.first().map(String::as_str) {
        Some("list") => Ok(Command::List),
        Some("invoke") => {
            let action = args.get(1).ok_or_else(|| "invoke needs an action name".to_string())?;
            let params = match args.get(2) {
                Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid JSON parameters: {}", e))?,
                None => Value::Null,
            };
            Ok(Command::Invoke {
                action: action.clone(),
                params,
            })
        }
        Some(other) => Err(format!("Unknown command '{}'", other)),
        None => Err("No command given".to_string()),
    }
}

async fn run(command: Command) -> Result<bool, String> {
    let config = Config::from_env();
    log::info!("Using config directory: {:?}", config.config_dir);
    if let Err(e) = load_tokens(&config.config_dir) {
        log::warn!("Token table not loaded, symbol lookups disabled: {}", e);
    }

    let wallet = EnvWalletProvider::from_config(&config).map_err(|e| format!("Wallet setup failed: {}", e))?;
    let http = Arc::new(ReqwestHttpClient::new());
    let kit = AgentKit::new(Arc::new(wallet), default_providers(&config, http));

    match command {
        Command::List => {
            let definitions = serde_json::to_string_pretty(&kit.definitions()).map_err(|e| e.to_string())?;
            println!("{}", definitions);
            Ok(true)
        }
        Command::Invoke { action, params } => {
            let result = kit.invoke(&action, params).await;
            println!("{}", result.content);
            Ok(result.success)
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    match run(command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
