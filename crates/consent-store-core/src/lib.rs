pub mod category;
pub mod error;
pub mod id;
pub mod record;
pub mod state_model;
pub mod status;
pub mod time;

pub use category::{ApiVersion, ConsentCategory, ConsentFamily, ServiceKey};
pub use error::{ConsentError, ErrorCategory, Result};
pub use id::{IdGenerator, default_id_generator, generate_id, sequential_id_generator, validate_id};
pub use record::{
    AccountAccessExtension, Amount, Charge, ConsentExtension, ConsentPayload, ConsentRecord, DebtorAccountExtension,
    IdempotencyWindow, NewConsent, NoExtension, PaymentExtension,
};
pub use state_model::{REAUTHORISABLE, REVOCABLE, SINGLE_USE_PAYMENT, StateModel};
pub use status::ConsentStatus;
pub use time::{Clock, DynClock, ManualClock, SystemClock, now_utc};
