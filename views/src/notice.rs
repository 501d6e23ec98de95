use myerrors::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            NoticeLevel::Success => "notice-success",
            NoticeLevel::Warning => "notice-warning",
            NoticeLevel::Error => "notice-error",
        }
    }
}

/// A one-shot message shown above a view after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl From<&QueryError> for Notice {
    fn from(err: &QueryError) -> Self {
        if err.is_blocking() {
            Notice::warning(err.message())
        } else {
            Notice::error(err.message())
        }
    }
}
