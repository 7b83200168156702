//! In-process stand-in for a game server: named players that come and go,
//! a flight flag per player, and a small inventory for vouchers.

use dashmap::DashMap;
use flytime_core::EntityId;
use flytime_scheduler::{EntityHost, HostError, ItemTags, Voucher};
use tracing::debug;

/// An inventory item. Only its tags matter to flight time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub tags: ItemTags,
}

impl Item {
    pub fn voucher(voucher: &Voucher) -> Self {
        Self {
            name: voucher.label(),
            tags: voucher.to_tags(),
        }
    }
}

#[derive(Debug)]
struct Player {
    name: String,
    online: bool,
    flying: bool,
    inventory: Vec<Item>,
}

/// Console-driven [`EntityHost`].
///
/// Players keep their id for the life of the process, so leaving and joining
/// again resumes the same stored balance.
#[derive(Default)]
pub struct ConsoleHost {
    /// lower-cased name → id
    names: DashMap<String, EntityId>,
    players: DashMap<EntityId, Player>,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring `name` online, minting an id on first sight.
    pub fn join(&self, name: &str) -> EntityId {
        let id = *self.names.entry(name.to_lowercase()).or_insert_with(EntityId::new);
        self.players
            .entry(id)
            .and_modify(|p| p.online = true)
            .or_insert_with(|| Player {
                name: name.to_string(),
                online: true,
                flying: false,
                inventory: Vec::new(),
            });
        id
    }

    /// Take `name` offline. Returns `None` if the player is not online.
    pub fn leave(&self, name: &str) -> Option<EntityId> {
        let id = self.online_id(name)?;
        if let Some(mut player) = self.players.get_mut(&id) {
            player.online = false;
            player.flying = false;
        }
        Some(id)
    }

    /// Id of an online player.
    pub fn online_id(&self, name: &str) -> Option<EntityId> {
        let id = *self.names.get(&name.to_lowercase())?;
        self.is_reachable(&id).then_some(id)
    }

    pub fn name_of(&self, id: &EntityId) -> Option<String> {
        self.players.get(id).map(|p| p.name.clone())
    }

    pub fn is_flying(&self, id: &EntityId) -> bool {
        self.players.get(id).is_some_and(|p| p.flying)
    }

    pub fn give(&self, id: &EntityId, item: Item) -> Result<(), HostError> {
        let mut player = self.players.get_mut(id).ok_or(HostError::Unreachable(*id))?;
        player.inventory.push(item);
        Ok(())
    }

    pub fn inventory(&self, id: &EntityId) -> Vec<Item> {
        self.players
            .get(id)
            .map(|p| p.inventory.clone())
            .unwrap_or_default()
    }

    /// First voucher in the player's inventory and its slot.
    pub fn first_voucher(&self, id: &EntityId) -> Option<(usize, Voucher)> {
        let player = self.players.get(id)?;
        player
            .inventory
            .iter()
            .enumerate()
            .find_map(|(slot, item)| Voucher::from_tags(&item.tags).map(|v| (slot, v)))
    }

    /// Remove one item from `slot`.
    pub fn consume(&self, id: &EntityId, slot: usize) -> Option<Item> {
        let mut player = self.players.get_mut(id)?;
        (slot < player.inventory.len()).then(|| player.inventory.remove(slot))
    }
}

impl EntityHost for ConsoleHost {
    fn is_reachable(&self, id: &EntityId) -> bool {
        self.players.get(id).is_some_and(|p| p.online)
    }

    fn set_capability(&self, id: &EntityId, enabled: bool) -> Result<(), HostError> {
        let mut player = self.players.get_mut(id).ok_or(HostError::Unreachable(*id))?;
        player.flying = enabled;
        debug!(entity = %id, player = %player.name, enabled, "flight effect updated");
        Ok(())
    }

    fn notify(&self, id: &EntityId, message: &str) {
        if let Some(player) = self.players.get(id) {
            println!("[{}] {}", player.name, message);
        }
    }
}
