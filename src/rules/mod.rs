//! Rule model subsystem.
//!
//! # Data Flow
//! ```text
//! API payload (loose JSON)
//!     → model.rs (normalize: coerce types, map legacy aliases)
//!     → validation.rs (field checks, all errors collected)
//!     → codec.rs (RuleSpec → Traefik YAML document)
//!
//! YAML file on disk
//!     → codec.rs (document → one RuleSpec per usable router)
//!     → discovery (assigns names and ids)
//! ```

pub mod codec;
pub mod error;
pub mod model;
pub mod validation;

pub use codec::CodecError;
pub use error::RuleError;
pub use model::{Rule, RulePayload, RuleSpec};
pub use validation::FieldError;
