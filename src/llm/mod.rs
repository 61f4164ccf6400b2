pub mod gemini;

pub use gemini::{
    build_composite_request, CompositeProvider, GeminiClient, GeminiRequestInlineData,
};
