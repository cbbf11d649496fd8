use domain::{Correction, Message, Timestamp, Translation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationDto {
    pub language: String,
    pub text: String,
}

impl From<&Translation> for TranslationDto {
    fn from(translation: &Translation) -> Self {
        Self {
            language: translation.language.clone(),
            text: translation.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionDto {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
    pub timestamp: Timestamp,
}

impl From<&Correction> for CorrectionDto {
    fn from(correction: &Correction) -> Self {
        Self {
            original: correction.original.clone(),
            corrected: correction.corrected.clone(),
            explanation: correction.explanation.clone(),
            timestamp: correction.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub text: String,
    pub sender: String,
    pub language: String,
    pub timestamp: Timestamp,
    pub translations: Vec<TranslationDto>,
    pub corrections: Vec<CorrectionDto>,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            text: message.text.as_str().to_owned(),
            sender: message.sender.as_str().to_owned(),
            language: message.language.as_str().to_owned(),
            timestamp: message.timestamp,
            translations: message
                .translations
                .iter()
                .map(TranslationDto::from)
                .collect(),
            corrections: message
                .corrections
                .iter()
                .map(CorrectionDto::from)
                .collect(),
        }
    }
}
