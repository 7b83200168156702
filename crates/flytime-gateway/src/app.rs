use std::sync::Arc;

use flytime_core::{format_duration, Balance, EntityId};
use flytime_scheduler::{
    Activation, DeactivateOptions, Deactivation, EntityHost, FlightScheduler, SessionSnapshot,
    Voucher,
};
use flytime_store::DurationStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::commands::FlyCommand;
use crate::host::{ConsoleHost, Item};

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// Operator at the server console; may run admin commands.
    Console,
    Player(EntityId),
}

/// Shared state of the gateway: the scheduler and the host it drives.
pub struct App {
    pub scheduler: FlightScheduler,
    pub host: Arc<ConsoleHost>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    active: usize,
    tick_interval_secs: u64,
    sessions: Vec<SessionStatus>,
}

#[derive(Debug, Serialize)]
struct SessionStatus {
    player: Option<String>,
    remaining: Balance,
    #[serde(flatten)]
    session: SessionSnapshot,
}

impl App {
    pub fn new(scheduler: FlightScheduler, host: Arc<ConsoleHost>) -> Self {
        Self { scheduler, host }
    }

    // ------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------

    /// A player connected: make sure their record exists.
    pub async fn join(&self, name: &str) -> String {
        let id = self.host.join(name);
        if let Err(e) = self.scheduler.store().ensure_record(&id).await {
            warn!(entity = %id, "ensure record on join failed: {e}");
        }
        info!(entity = %id, player = name, "player joined");
        format!("{name} joined ({id}).")
    }

    /// A player disconnected or was kicked: close their session, charging
    /// the partial interval, before they go offline.
    pub async fn leave(&self, name: &str) -> String {
        let Some(id) = self.host.online_id(name) else {
            return format!("Player '{name}' is not online.");
        };
        self.scheduler
            .deactivate(&id, DeactivateOptions::default())
            .await;
        self.host.leave(name);
        info!(entity = %id, player = name, "player left");
        format!("{name} left.")
    }

    /// A player used their first voucher. The item is consumed only if the
    /// grant went through.
    pub async fn use_voucher(&self, name: &str) -> String {
        let Some(id) = self.host.online_id(name) else {
            return format!("Player '{name}' is not online.");
        };
        let Some((slot, voucher)) = self.host.first_voucher(&id) else {
            return format!("{name} holds no voucher.");
        };

        match voucher.redeem(self.scheduler.store().as_ref(), &id).await {
            Ok(redemption) => {
                self.host.consume(&id, slot);
                let message = format!(
                    "Redeemed voucher. Added: {} → New remaining: {}.",
                    format_duration(redemption.added),
                    redemption.balance
                );
                self.host.notify(&id, &message);
                message
            }
            Err(e) => {
                warn!(entity = %id, "failed to redeem fly voucher: {e}");
                "Voucher could not be redeemed and was kept.".to_string()
            }
        }
    }

    /// One line per item the player holds.
    pub fn inventory(&self, name: &str) -> String {
        let Some(id) = self.host.online_id(name) else {
            return format!("Player '{name}' is not online.");
        };
        let items = self.host.inventory(&id);
        if items.is_empty() {
            return format!("{name} holds nothing.");
        }
        items
            .iter()
            .enumerate()
            .map(|(slot, item)| format!("{slot}: {}", item.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Run a parsed command and return the reply for the sender.
    pub async fn execute(&self, sender: Sender, command: FlyCommand) -> String {
        match (sender, command) {
            (Sender::Player(_), cmd) if cmd.is_admin() => {
                "You don't have permission to use this command.".to_string()
            }
            (Sender::Player(id), FlyCommand::Toggle) => {
                if self.scheduler.is_active(&id) {
                    self.fly_off(&id).await
                } else {
                    self.fly_on(&id).await
                }
            }
            (Sender::Player(id), FlyCommand::On) => self.fly_on(&id).await,
            (Sender::Player(id), FlyCommand::Off) => self.fly_off(&id).await,
            (Sender::Player(id), FlyCommand::GetTime) => {
                let balance = self.scheduler.store().remaining_or_zero(&id).await;
                format!("Your remaining flight time: {balance}.")
            }
            (Sender::Player(id), FlyCommand::GetItem { seconds }) => {
                let voucher = match Voucher::new(seconds) {
                    Ok(voucher) => voucher,
                    Err(e) => return format!("Could not mint the voucher: {e}"),
                };
                match self.host.give(&id, Item::voucher(&voucher)) {
                    Ok(()) => format!(
                        "You received a Fly Time Voucher: {}.",
                        format_duration(seconds)
                    ),
                    Err(e) => format!("Could not deliver the voucher: {e}"),
                }
            }
            (Sender::Console, FlyCommand::GetTime) => {
                "Only players can query their own flight time.".to_string()
            }
            (Sender::Console, FlyCommand::GetItem { .. }) => {
                "Only players can receive vouchers.".to_string()
            }
            (Sender::Console, FlyCommand::Toggle | FlyCommand::On | FlyCommand::Off) => {
                "Only players can use /fly.".to_string()
            }
            (_, FlyCommand::TimeAdd { player, seconds }) => self.time_add(&player, seconds).await,
            (_, FlyCommand::TimeUnlimited { player, enabled }) => {
                self.time_unlimited(&player, enabled).await
            }
            (_, FlyCommand::Status) => self.status().await,
        }
    }

    async fn fly_on(&self, id: &EntityId) -> String {
        match self.scheduler.activate(id).await {
            Activation::Activated { balance } => format!("Flight enabled. Remaining: {balance}."),
            Activation::AlreadyActive => "You are already flying.".to_string(),
            Activation::NoTimeRemaining => "You have no flight time remaining.".to_string(),
            Activation::ShuttingDown => "Flight is unavailable while the server stops.".to_string(),
        }
    }

    async fn fly_off(&self, id: &EntityId) -> String {
        match self
            .scheduler
            .deactivate(id, DeactivateOptions::default())
            .await
        {
            Deactivation::Stopped { balance, .. } => {
                format!("Flight disabled. Remaining: {balance}.")
            }
            Deactivation::NotActive => "You are not currently flying.".to_string(),
        }
    }

    async fn time_add(&self, player: &str, seconds: u64) -> String {
        let Some(id) = self.host.online_id(player) else {
            return format!("Player '{player}' is not online.");
        };
        let name = self.host.name_of(&id).unwrap_or_else(|| player.to_string());
        match self.scheduler.grant(&id, seconds).await {
            Ok(balance) => {
                self.host.notify(
                    &id,
                    &format!("You received {seconds}s of flight time. Remaining: {balance}."),
                );
                format!("Added {seconds}s to {name}. New remaining: {balance}.")
            }
            Err(e) => format!("Could not add flight time: {e}"),
        }
    }

    async fn time_unlimited(&self, player: &str, enabled: bool) -> String {
        let Some(id) = self.host.online_id(player) else {
            return format!("Player '{player}' is not online.");
        };
        let name = self.host.name_of(&id).unwrap_or_else(|| player.to_string());
        match self.scheduler.store().set_unlimited(&id, enabled).await {
            Ok(()) if enabled => format!("{name} now has unlimited flight time."),
            Ok(()) => format!("{name} no longer has unlimited flight time."),
            Err(e) => format!("Could not update {name}: {e}"),
        }
    }

    async fn status(&self) -> String {
        let store = self.scheduler.store();
        let mut sessions = Vec::new();
        for session in self.scheduler.sessions().await {
            sessions.push(SessionStatus {
                player: self.host.name_of(&session.entity),
                remaining: store.remaining_or_zero(&session.entity).await,
                session,
            });
        }
        let report = StatusReport {
            active: sessions.len(),
            tick_interval_secs: self.scheduler.interval().as_secs(),
            sessions,
        };
        match render(&report) {
            Ok(json) => json,
            Err(e) => format!("Could not render status [{}]: {e}", e.code()),
        }
    }
}

fn render<T: Serialize>(value: &T) -> flytime_core::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flytime_store::MemoryStore;
    use std::time::Duration;

    fn app() -> App {
        let host = Arc::new(ConsoleHost::new());
        let store: Arc<dyn DurationStore> = Arc::new(MemoryStore::new());
        let scheduler = FlightScheduler::new(store, host.clone(), Duration::from_secs(30));
        App::new(scheduler, host)
    }

    async fn player(app: &App, name: &str) -> EntityId {
        app.join(name).await;
        app.host.online_id(name).expect("player not online")
    }

    #[tokio::test(start_paused = true)]
    async fn fly_without_time_is_refused() {
        let app = app();
        let steve = player(&app, "Steve").await;

        let reply = app.execute(Sender::Player(steve), FlyCommand::Toggle).await;
        assert_eq!(reply, "You have no flight time remaining.");
        assert!(!app.host.is_flying(&steve));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_after_admin_grant() {
        let app = app();
        let steve = player(&app, "Steve").await;

        let reply = app
            .execute(
                Sender::Console,
                FlyCommand::TimeAdd {
                    player: "steve".to_string(),
                    seconds: 100,
                },
            )
            .await;
        assert_eq!(reply, "Added 100s to Steve. New remaining: 0y 0h 1m 40s.");

        let reply = app.execute(Sender::Player(steve), FlyCommand::Toggle).await;
        assert_eq!(reply, "Flight enabled. Remaining: 0y 0h 1m 40s.");
        assert!(app.host.is_flying(&steve));

        let reply = app.execute(Sender::Player(steve), FlyCommand::On).await;
        assert_eq!(reply, "You are already flying.");

        tokio::time::sleep(Duration::from_secs(12)).await;
        let reply = app.execute(Sender::Player(steve), FlyCommand::Toggle).await;
        assert_eq!(reply, "Flight disabled. Remaining: 0y 0h 1m 28s.");
        assert!(!app.host.is_flying(&steve));

        let reply = app.execute(Sender::Player(steve), FlyCommand::Off).await;
        assert_eq!(reply, "You are not currently flying.");
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_charges_the_partial_interval() {
        let app = app();
        let alex = player(&app, "alex").await;
        app.scheduler.store().set_remaining(&alex, 50).await.unwrap();
        app.execute(Sender::Player(alex), FlyCommand::On).await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(app.leave("alex").await, "alex left.");

        assert!(!app.scheduler.is_active(&alex));
        assert_eq!(
            app.scheduler.store().get_remaining(&alex).await.unwrap(),
            Balance::Limited(30)
        );
        assert_eq!(app.leave("alex").await, "Player 'alex' is not online.");
    }

    #[tokio::test(start_paused = true)]
    async fn vouchers_are_minted_and_redeemed_once() {
        let app = app();
        let alex = player(&app, "alex").await;

        let reply = app
            .execute(Sender::Player(alex), FlyCommand::GetItem { seconds: 90 })
            .await;
        assert_eq!(reply, "You received a Fly Time Voucher: 0y 0h 1m 30s.");
        assert_eq!(app.inventory("alex"), "0: Fly Time Voucher (0y 0h 1m 30s)");

        let reply = app.use_voucher("alex").await;
        assert_eq!(reply, "Redeemed voucher. Added: 0y 0h 1m 30s → New remaining: 0y 0h 1m 30s.");
        assert_eq!(app.inventory("alex"), "alex holds nothing.");
        assert_eq!(app.use_voucher("alex").await, "alex holds no voucher.");

        let reply = app.execute(Sender::Player(alex), FlyCommand::GetTime).await;
        assert_eq!(reply, "Your remaining flight time: 0y 0h 1m 30s.");
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_voucher_is_not_minted() {
        let app = app();
        let alex = player(&app, "alex").await;

        let reply = app
            .execute(Sender::Player(alex), FlyCommand::GetItem { seconds: u64::MAX })
            .await;
        assert!(reply.starts_with("Could not mint the voucher:"), "{reply}");
        assert_eq!(app.inventory("alex"), "alex holds nothing.");
    }

    #[tokio::test(start_paused = true)]
    async fn admin_commands_need_the_console() {
        let app = app();
        let alex = player(&app, "alex").await;

        let reply = app.execute(Sender::Player(alex), FlyCommand::Status).await;
        assert_eq!(reply, "You don't have permission to use this command.");

        let reply = app.execute(Sender::Console, FlyCommand::On).await;
        assert_eq!(reply, "Only players can use /fly.");

        let reply = app
            .execute(
                Sender::Console,
                FlyCommand::TimeAdd {
                    player: "nobody".to_string(),
                    seconds: 5,
                },
            )
            .await;
        assert_eq!(reply, "Player 'nobody' is not online.");
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_players_show_unlimited_time() {
        let app = app();
        let alex = player(&app, "alex").await;

        let reply = app
            .execute(
                Sender::Console,
                FlyCommand::TimeUnlimited {
                    player: "alex".to_string(),
                    enabled: true,
                },
            )
            .await;
        assert_eq!(reply, "alex now has unlimited flight time.");

        let reply = app.execute(Sender::Player(alex), FlyCommand::On).await;
        assert_eq!(reply, "Flight enabled. Remaining: unlimited.");
    }

    #[tokio::test(start_paused = true)]
    async fn status_lists_active_sessions_as_json() {
        let app = app();
        let alex = player(&app, "alex").await;
        app.scheduler.store().set_remaining(&alex, 100).await.unwrap();
        app.execute(Sender::Player(alex), FlyCommand::On).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let reply = app.execute(Sender::Console, FlyCommand::Status).await;
        let json: serde_json::Value = serde_json::from_str(&reply).expect("status is not JSON");
        assert_eq!(json["active"], 1);
        assert_eq!(json["tick_interval_secs"], 30);
        assert_eq!(json["sessions"][0]["player"], "alex");
        assert_eq!(json["sessions"][0]["uncharged_secs"], 5);
        assert_eq!(json["sessions"][0]["remaining"]["seconds"], 100);
    }
}
