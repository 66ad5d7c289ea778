//! Speech helpers — text normalization for synthesis and audio validation.

/// Characters allowed through to the synthesizer besides alphanumerics and
/// whitespace. Everything else (emoji, markup, stray symbols) is dropped
/// because the TTS voice reads it out or stumbles over it.
const SPEECH_PUNCTUATION: &str = ".,!?;:'\"()-";

/// Normalize text before sending it to a speech gateway: strip emoji and
/// symbols, collapse whitespace runs. Accented letters survive.
pub fn sanitize_for_speech(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || SPEECH_PUNCTUATION.contains(*c))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Minimal MP3 container check: an ID3v2 tag or a frame sync header.
pub fn looks_like_mp3(bytes: &[u8]) -> bool {
    (bytes.len() > 2 && &bytes[..3] == b"ID3")
        || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_emoji_and_symbols() {
        assert_eq!(
            sanitize_for_speech("Olá! 👋 Tudo bem? ★"),
            "Olá! Tudo bem?"
        );
    }

    #[test]
    fn test_sanitize_keeps_accents_and_punctuation() {
        let text = "Não, obrigado. Quanto custa o pão?";
        assert_eq!(sanitize_for_speech(text), text);
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_for_speech("  bom \n dia  "), "bom dia");
    }

    #[test]
    fn test_mp3_magic_accepts_id3_and_frame_sync() {
        assert!(looks_like_mp3(b"ID3\x04\x00rest"));
        assert!(looks_like_mp3(&[0xFF, 0xFB, 0x90, 0x00]));
    }

    #[test]
    fn test_mp3_magic_rejects_empty_and_garbage() {
        assert!(!looks_like_mp3(b""));
        assert!(!looks_like_mp3(b"RIFF1234WAVE"));
        assert!(!looks_like_mp3(&[0xFF]));
    }
}
