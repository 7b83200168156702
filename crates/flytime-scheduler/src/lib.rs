//! `flytime-scheduler` — Tokio-based timed flight scheduler.
//!
//! # Overview
//!
//! [`FlightScheduler`] keeps one session per flying entity. Each session owns
//! a repeating timer task that charges the elapsed interval to the
//! [`DurationStore`](flytime_store::DurationStore) and ends the session when
//! the balance reaches zero or the entity goes offline.
//!
//! # Session lifecycle
//!
//! | Transition            | Trigger                    | Store effect                 |
//! |-----------------------|----------------------------|------------------------------|
//! | Inactive → Active     | `activate`, balance > 0    | none                         |
//! | Active → Active       | tick, entity reachable     | charge one interval          |
//! | Active → Inactive     | tick, balance hits zero    | charge, flight revoked       |
//! | Active → Inactive     | tick, entity unreachable   | none                         |
//! | Active → Inactive     | `deactivate` / `shutdown`  | charge the partial interval  |

pub mod engine;
pub mod error;
pub mod grant;
pub mod host;
mod session;
pub mod types;
pub mod voucher;

pub use engine::{FlightScheduler, EXPIRED_MESSAGE};
pub use error::{GrantError, HostError, Result};
pub use grant::grant;
pub use host::EntityHost;
pub use types::{Activation, DeactivateOptions, Deactivation, SessionSnapshot};
pub use voucher::{ItemTags, RedeemError, Redemption, Voucher, VoucherTooLarge};
