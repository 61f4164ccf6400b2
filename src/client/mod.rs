pub mod service;
pub mod settings;
pub mod upload;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::i18n::Translator;
use crate::models::{CompositionRequest, EncodedImage, ImageMime};
use service::{generate_dress_up_image, ProxyTarget};
use settings::{resolve_api_base, ClientSettings};
use upload::{encode_role, LocalFile, UploadRole};

pub const DEFAULT_OUTPUT_STEM: &str = "generated-character";
/// `--output -` prints a data URL instead of writing a file.
pub const STDOUT_OUTPUT: &str = "-";

#[derive(Debug, Clone)]
pub struct ComposeArgs {
    pub character: PathBuf,
    pub clothing: PathBuf,
    pub prompt: String,
    pub output: Option<PathBuf>,
    pub api_base: Option<String>,
    pub language: Option<String>,
}

async fn encode_path(
    role: UploadRole,
    path: &Path,
    translator: &Translator,
) -> Result<EncodedImage> {
    let title = match role {
        UploadRole::Character => translator.t("characterImageTitle"),
        UploadRole::Clothing => translator.t("clothingImageTitle"),
    };
    let file = LocalFile::open(path)
        .await
        .map_err(|err| anyhow!("{} ({}): {}", title, path.display(), err))?;
    encode_role(role, &file).await.map_err(|err| {
        warn!("Rejected {} upload {}: {}", role.as_str(), file.path().display(), err);
        anyhow!(
            "{} ({}): {} [{}]",
            title,
            path.display(),
            translator.upload_error(&err),
            translator.t("uploadHint")
        )
    })
}

fn output_path_for(requested: Option<&Path>, mime_type: &str) -> PathBuf {
    match requested {
        Some(path) => path.to_path_buf(),
        None => {
            let extension = ImageMime::parse(mime_type)
                .map(ImageMime::extension)
                .unwrap_or("png");
            PathBuf::from(format!("{DEFAULT_OUTPUT_STEM}.{extension}"))
        }
    }
}

/// Encodes both uploads, sends one composite request and writes the result.
pub async fn run_compose(
    args: ComposeArgs,
    config: &Config,
    settings: &ClientSettings,
) -> Result<PathBuf> {
    let translator = Translator::new(args.language.as_deref().unwrap_or(config.ui_language.as_str()));
    info!("{}", translator.t("moderationWarning"));

    let character = encode_path(UploadRole::Character, &args.character, &translator).await?;
    let clothing = encode_path(UploadRole::Clothing, &args.clothing, &translator).await?;
    if args.prompt.trim().is_empty() {
        return Err(anyhow!("{}", translator.t("promptRequired")));
    }

    let api_base = resolve_api_base(
        args.api_base.as_deref(),
        settings.api_base.as_deref(),
        Some(config.api_base.as_str()),
    )?;
    let target = ProxyTarget {
        api_base,
        endpoint: config.composite_endpoint.clone(),
        local_origin: format!("http://127.0.0.1:{}", config.port),
        timeout: Duration::from_secs(config.gemini_timeout_seconds + 30),
    };

    let request = CompositionRequest {
        character,
        clothing,
        prompt: args.prompt,
    };

    info!(
        "{} {} ({})",
        translator.t("loadingMessage"),
        translator.t("loadingSubMessage"),
        target.url()
    );
    let image = generate_dress_up_image(&target, &request)
        .await
        .map_err(|err| {
            anyhow!(
                "{}: {}",
                translator.t("errorTitle"),
                translator.generation_error(&err)
            )
        })?;
    drop(request);

    if args.output.as_deref() == Some(Path::new(STDOUT_OUTPUT)) {
        println!("{}", image.data_url());
        return Ok(PathBuf::from(STDOUT_OUTPUT));
    }

    let bytes = image
        .decode()
        .map_err(|err| anyhow!("{}: {}", translator.t("errorGeneric"), err))?;
    let output = output_path_for(args.output.as_deref(), &image.mime_type);
    tokio::fs::write(&output, &bytes).await?;

    let shown = output.display().to_string();
    info!("{}", translator.format("resultSaved", &[("path", shown.as_str())]));
    Ok(output)
}

pub fn run_set_api_base(value: &str, path: &Path) -> Result<ClientSettings> {
    let mut settings = ClientSettings::load(path);
    settings.set_api_base(value)?;
    settings.save(path)?;
    match settings.api_base.as_deref() {
        Some(base) => info!("API base set to {}", base),
        None => info!("API base cleared"),
    }
    Ok(settings)
}
