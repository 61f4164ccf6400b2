use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use dotenvy::dotenv;
use tracing::info;

mod client;
mod config;
mod i18n;
mod llm;
mod models;
mod proxy;
mod utils;

use client::settings::ClientSettings;
use client::{run_compose, run_set_api_base, ComposeArgs};
use config::CONFIG;
use utils::logging::init_logging;

#[derive(Debug)]
enum CliCommand {
    Serve,
    Compose(ComposeArgs),
    SetApiBase(String),
}

fn usage() -> &'static str {
    "Usage:\n  dress-up [serve]\n  dress-up compose --character <path> --clothing <path> --prompt <text> [--output <path>|-] [--api-base <url>] [--lang <ko|en>]\n  dress-up set-api-base <url>   (empty string clears the saved value)"
}

fn parse_compose_args(args: &[String]) -> anyhow::Result<ComposeArgs> {
    let mut character: Option<PathBuf> = None;
    let mut clothing: Option<PathBuf> = None;
    let mut prompt: Option<String> = None;
    let mut output = None;
    let mut api_base = None;
    let mut language = None;

    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        let mut value = || {
            index += 1;
            args.get(index)
                .cloned()
                .ok_or_else(|| anyhow!("Missing value for {flag}"))
        };
        match flag {
            "--character" => character = Some(PathBuf::from(value()?)),
            "--clothing" => clothing = Some(PathBuf::from(value()?)),
            "--prompt" => prompt = Some(value()?),
            "--output" | "-o" => output = Some(PathBuf::from(value()?)),
            "--api-base" => api_base = Some(value()?),
            "--lang" => language = Some(value()?),
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => {
                return Err(anyhow!("Unknown compose argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    Ok(ComposeArgs {
        character: character.ok_or_else(|| anyhow!("--character is required"))?,
        clothing: clothing.ok_or_else(|| anyhow!("--clothing is required"))?,
        prompt: prompt.ok_or_else(|| anyhow!("--prompt is required"))?,
        output,
        api_base,
        language,
    })
}

fn parse_cli_args(args: &[String]) -> anyhow::Result<CliCommand> {
    match args.get(1).map(|value| value.as_str()) {
        None | Some("serve") => Ok(CliCommand::Serve),
        Some("compose") => Ok(CliCommand::Compose(parse_compose_args(&args[2..])?)),
        Some("set-api-base") => {
            let value = args
                .get(2)
                .cloned()
                .ok_or_else(|| anyhow!("Missing URL for set-api-base\n{}", usage()))?;
            Ok(CliCommand::SetApiBase(value))
        }
        Some("--help") | Some("-h") | Some("help") => Err(anyhow!(usage())),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_cli_args(&args)?;
    let log_stem = match command {
        CliCommand::Serve => "server",
        _ => "client",
    };
    let _guards = init_logging(&CONFIG.log_level, &CONFIG.log_dir, log_stem);
    let config = Arc::new(CONFIG.clone());

    match command {
        CliCommand::Serve => {
            info!("Starting character dress-up compositor");
            proxy::serve(config).await?;
        }
        CliCommand::Compose(compose_args) => {
            let settings = ClientSettings::load(&ClientSettings::default_path());
            run_compose(compose_args, &config, &settings).await?;
        }
        CliCommand::SetApiBase(value) => {
            run_set_api_base(&value, &ClientSettings::default_path())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_serve() {
        assert!(matches!(
            parse_cli_args(&argv(&["dress-up"])).unwrap(),
            CliCommand::Serve
        ));
    }

    #[test]
    fn compose_collects_flags() {
        let command = parse_cli_args(&argv(&[
            "dress-up",
            "compose",
            "--character",
            "hero.png",
            "--clothing",
            "coat.webp",
            "--prompt",
            "wear it",
            "--lang",
            "en",
        ]))
        .unwrap();

        let CliCommand::Compose(args) = command else {
            panic!("expected compose");
        };
        assert_eq!(args.character, PathBuf::from("hero.png"));
        assert_eq!(args.clothing, PathBuf::from("coat.webp"));
        assert_eq!(args.prompt, "wear it");
        assert_eq!(args.language.as_deref(), Some("en"));
        assert!(args.output.is_none());
        assert!(args.api_base.is_none());
    }

    #[test]
    fn compose_requires_both_images() {
        let err = parse_cli_args(&argv(&["dress-up", "compose", "--character", "a.png"]))
            .unwrap_err();
        assert!(err.to_string().contains("--clothing is required"));
    }

    #[test]
    fn dangling_flag_is_reported() {
        let err = parse_cli_args(&argv(&["dress-up", "compose", "--prompt"])).unwrap_err();
        assert_eq!(err.to_string(), "Missing value for --prompt");
    }

    #[test]
    fn set_api_base_takes_one_value() {
        let command =
            parse_cli_args(&argv(&["dress-up", "set-api-base", "https://proxy.example"])).unwrap();
        assert!(matches!(command, CliCommand::SetApiBase(url) if url == "https://proxy.example"));
    }
}
