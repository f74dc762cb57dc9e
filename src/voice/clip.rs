//! Encoded audio clips exchanged with recognition and synthesis backends

/// Container format of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Wav => "audio.wav",
            Self::Mp3 => "audio.mp3",
        }
    }
}

/// Encoded audio, optionally tagged with the language it speaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Vec<u8>,
    format: AudioFormat,
    language: Option<String>,
}

impl AudioClip {
    #[must_use]
    pub const fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: AudioFormat::Wav,
            language: None,
        }
    }

    #[must_use]
    pub const fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            format: AudioFormat::Mp3,
            language: None,
        }
    }

    /// Zero-duration clip, produced for empty replies
    #[must_use]
    pub fn silent(language: &str) -> Self {
        Self::mp3(Vec::new()).with_language(language)
    }

    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.bytes.is_empty()
    }
}
