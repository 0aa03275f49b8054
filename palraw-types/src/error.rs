use thiserror::Error;

/// Результат для операций palraw
pub type PalResult<T> = std::result::Result<T, PalError>;

/// Типы ошибок декодера.
#[derive(Debug, Error)]
pub enum PalError {
    /// Повреждённая, усечённая или нераспознанная бинарная структура.
    /// `offset`: абсолютное смещение в файле, если оно известно.
    #[error("Format error{}: {reason}", at_offset(.offset))]
    Format { offset: Option<u64>, reason: String },

    /// Недопустимый производный параметр (например, нулевая частота)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Значение от вызывающей стороны нарушает ограничение поля
    #[error("Validation error: {0}")]
    Validation(String),

    /// Производное значение не помещается в представимый диапазон
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Нарушение внутреннего инварианта (дефект, не пользовательская ошибка)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Ошибки ввода/вывода (автоконвертируются из std::io::Error)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PalError {
    /// Удобные конструкторы
    pub fn format<S: Into<String>>(s: S) -> Self {
        Self::Format {
            offset: None,
            reason: s.into(),
        }
    }

    pub fn format_at<S: Into<String>>(
        offset: u64,
        s: S,
    ) -> Self {
        Self::Format {
            offset: Some(offset),
            reason: s.into(),
        }
    }

    pub fn configuration<S: Into<String>>(s: S) -> Self {
        Self::Configuration(s.into())
    }

    pub fn validation<S: Into<String>>(s: S) -> Self {
        Self::Validation(s.into())
    }

    pub fn overflow<S: Into<String>>(s: S) -> Self {
        Self::Overflow(s.into())
    }

    pub fn internal<S: Into<String>>(s: S) -> Self {
        Self::Internal(s.into())
    }

    /// Смещение повреждённой записи для `Format`, иначе `None`.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Format { offset, .. } => *offset,
            _ => None,
        }
    }
}

fn at_offset(offset: &Option<u64>) -> String {
    match offset {
        Some(off) => format!(" at byte {off}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message_with_offset() {
        let err = PalError::format_at(1027, "incomplete record");

        assert_eq!(err.offset(), Some(1027));
        assert_eq!(
            err.to_string(),
            "Format error at byte 1027: incomplete record"
        );
    }

    #[test]
    fn test_format_error_message_without_offset() {
        let err = PalError::format("unknown marker");

        assert_eq!(err.offset(), None);
        assert_eq!(err.to_string(), "Format error: unknown marker");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: PalError = io.into();

        assert!(matches!(err, PalError::Io(_)));
        assert_eq!(err.offset(), None);
    }
}
