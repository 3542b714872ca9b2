mod library;
mod question;

pub use library::{
    Content, ContentLibrary, QuestionBank, RecommendationKey, RecommendationLookup,
    FALLBACK_LOCALE,
};
pub use question::{
    Answer, AnswerValue, Constitution, Question, QuestionKind, QuestionOption, Validation,
};
