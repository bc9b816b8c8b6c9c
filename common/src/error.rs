use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier '{0}' is missing the '{1}' separator")]
    MissingSeparator(String, char),

    #[error("Name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Domain '{domain}' is invalid: {reason}")]
    InvalidDomain {
        domain: String,
        reason: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Invalid amount '{0}'")]
    Invalid(String),

    #[error("Amount has {scale} fractional digits, more than the allowed {max}")]
    ScaleTooLarge { scale: u8, max: u8 },

    #[error("Amount overflow")]
    Overflow,

    #[error("Insufficient amount: need {need}, have {have}")]
    Insufficient { need: String, have: String },
}
