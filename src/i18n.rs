use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::client::service::GenerationError;
use crate::client::upload::UploadError;

pub const FALLBACK_LOCALE: &str = "en";

type MessageTable = HashMap<&'static str, &'static str>;

const KO_MESSAGES: &[(&str, &str)] = &[
    ("appTitle", "AI 캐릭터 옷 입히기"),
    ("appDescription", "Gemini AI의 힘으로 캐릭터와 의상을 결합하세요"),
    ("characterImageTitle", "캐릭터 이미지"),
    ("clothingImageTitle", "의상 이미지"),
    ("moderationWarning", "참고: 부적절하거나 노출이 심한 의상(속옷, 비키니 등)에 대한 요청은 제한됩니다."),
    ("promptRequired", "조합 설명을 입력해주세요."),
    ("resultTitle", "결과"),
    ("resultSaved", "생성된 이미지를 저장했습니다: {path}"),
    ("errorTitle", "생성 실패"),
    ("errorGeneric", "알 수 없는 오류가 발생했습니다."),
    ("errorNoImage", "AI가 이미지를 반환하지 않았습니다. 더 명확한 프롬프트로 다시 시도해주세요."),
    ("errorGenerationFailed", "이미지 생성 실패: {message}"),
    ("fileTypeError", "잘못된 파일 형식입니다. PNG, JPG, WEBP 파일을 사용해주세요."),
    ("fileSizeError", "파일이 너무 큽니다. 최대 크기는 4MB입니다."),
    ("uploadHint", "PNG, JPG, WEBP, 최대 4MB"),
    ("loadingMessage", "이미지 생성 중..."),
    ("loadingSubMessage", "시간이 걸릴 수 있습니다. 잠시만 기다려주세요."),
];

const EN_MESSAGES: &[(&str, &str)] = &[
    ("appTitle", "AI Character Dress-Up"),
    ("appDescription", "Combine characters and outfits with the power of Gemini AI"),
    ("characterImageTitle", "Character Image"),
    ("clothingImageTitle", "Clothing Image"),
    ("moderationWarning", "Note: Requests for inappropriate or revealing clothing (e.g., underwear, bikinis) are restricted."),
    ("promptRequired", "Please describe how to combine the images."),
    ("resultTitle", "Result"),
    ("resultSaved", "Saved the generated image to {path}"),
    ("errorTitle", "Generation Failed"),
    ("errorGeneric", "An unknown error occurred."),
    ("errorNoImage", "The AI did not return an image. It might have returned text instead. Please try again with a clearer prompt."),
    ("errorGenerationFailed", "Image generation failed: {message}"),
    ("fileTypeError", "Invalid file type. Please use PNG, JPG, or WEBP files."),
    ("fileSizeError", "File is too large. The maximum size is 4MB."),
    ("uploadHint", "PNG, JPG, WEBP, Max 4MB"),
    ("loadingMessage", "Generating image..."),
    ("loadingSubMessage", "This may take a moment. Please wait."),
];

static TRANSLATIONS: Lazy<HashMap<&'static str, MessageTable>> = Lazy::new(|| {
    HashMap::from([
        ("ko", KO_MESSAGES.iter().copied().collect()),
        ("en", EN_MESSAGES.iter().copied().collect()),
    ])
});

#[derive(Debug, Clone)]
pub struct Translator {
    locale: String,
}

impl Translator {
    pub fn new(locale: &str) -> Self {
        Translator {
            locale: locale.trim().to_lowercase(),
        }
    }

    /// Looks up `key` in the active locale, then the fallback locale. Unknown
    /// keys come back unchanged.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        [self.locale.as_str(), FALLBACK_LOCALE]
            .iter()
            .filter_map(|locale| TRANSLATIONS.get(*locale))
            .find_map(|table| table.get(key).copied())
            .unwrap_or(key)
    }

    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        args.iter()
            .fold(self.t(key).to_string(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }

    pub fn upload_error(&self, err: &UploadError) -> String {
        match err {
            UploadError::InvalidFileType(_) => self.t("fileTypeError").to_string(),
            UploadError::FileTooLarge { .. } => self.t("fileSizeError").to_string(),
            UploadError::Io(_) => self.t("errorGeneric").to_string(),
        }
    }

    pub fn generation_error(&self, err: &GenerationError) -> String {
        match err {
            GenerationError::NoImageReturned => self.t("errorNoImage").to_string(),
            GenerationError::GenerationFailed(message) => {
                self.format("errorGenerationFailed", &[("message", message.as_str())])
            }
            GenerationError::Unknown(_) => self.t("errorGeneric").to_string(),
        }
    }
}
