//! Redeemable flight-time vouchers.
//!
//! A voucher is an ordinary inventory item carrying two integer tags: a
//! marker that tells it apart from other items and the number of seconds it
//! grants. The host owns the item itself; this module only reads and writes
//! the tags and performs the grant.

use std::collections::BTreeMap;

use flytime_core::{format_duration, Balance, EntityId};
use flytime_store::DurationStore;
use thiserror::Error;
use tracing::info;

use crate::{error::GrantError, grant};

/// Tag whose value `1` marks an item as a flight-time voucher.
pub const MARKER_TAG: &str = "fly_time_add";
/// Tag holding the seconds granted on redemption.
pub const SECONDS_TAG: &str = "fly_time";

/// Integer tags attached to an inventory item.
pub type ItemTags = BTreeMap<String, i64>;

/// A voucher worth `grant_seconds` of flight time.
///
/// Deliberately not `Clone`: redeeming consumes the value, so one voucher
/// can only ever be credited once.
#[derive(Debug, PartialEq, Eq)]
pub struct Voucher {
    grant_seconds: u64,
}

/// Result of a successful redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redemption {
    pub added: u64,
    pub balance: Balance,
}

/// Voucher values are stored in a signed 64-bit tag, so larger grants
/// cannot be minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Voucher of {0} seconds exceeds the largest storable value ({max})", max = i64::MAX)]
pub struct VoucherTooLarge(pub u64);

/// A failed redemption hands the voucher back so the host does not consume
/// the item.
#[derive(Debug, Error)]
#[error("voucher redemption failed: {source}")]
pub struct RedeemError {
    pub voucher: Voucher,
    #[source]
    pub source: GrantError,
}

impl Voucher {
    pub fn new(grant_seconds: u64) -> std::result::Result<Self, VoucherTooLarge> {
        if i64::try_from(grant_seconds).is_err() {
            return Err(VoucherTooLarge(grant_seconds));
        }
        Ok(Self { grant_seconds })
    }

    pub fn grant_seconds(&self) -> u64 {
        self.grant_seconds
    }

    /// Read a voucher from an item's tags. `None` for ordinary items.
    pub fn from_tags(tags: &ItemTags) -> Option<Self> {
        if tags.get(MARKER_TAG) != Some(&1) {
            return None;
        }
        let secs = *tags.get(SECONDS_TAG)?;
        let grant_seconds = u64::try_from(secs).ok()?;
        Some(Self { grant_seconds })
    }

    /// Tags to attach to a freshly minted voucher item.
    pub fn to_tags(&self) -> ItemTags {
        let mut tags = ItemTags::new();
        tags.insert(MARKER_TAG.to_string(), 1);
        // `new` and `from_tags` both keep the value within i64.
        tags.insert(SECONDS_TAG.to_string(), self.grant_seconds as i64);
        tags
    }

    /// Display name for the voucher item.
    pub fn label(&self) -> String {
        format!("Fly Time Voucher ({})", format_duration(self.grant_seconds))
    }

    /// Credit the voucher to `id`.
    ///
    /// A zero-second voucher is consumed without touching the counter.
    pub async fn redeem(
        self,
        store: &dyn DurationStore,
        id: &EntityId,
    ) -> std::result::Result<Redemption, RedeemError> {
        if self.grant_seconds == 0 {
            return Ok(Redemption {
                added: 0,
                balance: store.remaining_or_zero(id).await,
            });
        }
        match grant::grant(store, id, self.grant_seconds).await {
            Ok(balance) => {
                info!(entity = %id, added = self.grant_seconds, "voucher redeemed");
                Ok(Redemption {
                    added: self.grant_seconds,
                    balance,
                })
            }
            Err(source) => Err(RedeemError {
                voucher: self,
                source,
            }),
        }
    }
}
