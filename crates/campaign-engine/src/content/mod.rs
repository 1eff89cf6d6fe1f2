pub mod candidate;
pub mod channel;
pub mod contracts;
pub mod validation;

pub use candidate::{
    ButtonKind, CandidateButton, CandidateMessage, FALLBACK_BODY, FALLBACK_LENGTH,
    MAX_WHATSAPP_BUTTONS,
};
pub use channel::{Channel, UnknownChannel};
pub use contracts::{ButtonContract, PlainContentContract, WhatsAppContentContract, output_schema};
pub use validation::{ValidationError, validate_output, validate_output_value};
