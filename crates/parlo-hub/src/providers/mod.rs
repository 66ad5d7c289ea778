pub mod gtts;
pub mod openai;
pub mod translator;
pub mod whisper;

pub use gtts::GoogleTts;
pub use openai::OpenAiCompletion;
pub use translator::LlmTranslator;
pub use whisper::WhisperTranscriber;
