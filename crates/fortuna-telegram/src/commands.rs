use teloxide::{
    prelude::*,
    types::{BotCommand, BotCommandScope, Recipient},
};
use tracing::{info, warn};

use fortuna_core::domain::UserId;

fn public_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Open the start screen"),
        BotCommand::new("draw", "Try your luck"),
    ]
}

fn admin_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Open the start screen"),
        BotCommand::new("promotions", "List and manage promotions"),
        BotCommand::new("addpromotion", "Add a promotion"),
        BotCommand::new("cancel", "Cancel the current dialog"),
        BotCommand::new("draw", "Test the draw"),
    ]
}

/// Register the command menus: public for everyone, the admin list in the
/// admin's private chat. Failures are logged only.
pub async fn register(bot: &Bot, admin_id: UserId) {
    match bot.set_my_commands(public_commands()).await {
        Ok(_) => info!("public commands registered"),
        Err(e) => warn!(error = %e, "failed to register public commands"),
    }

    let scope = BotCommandScope::Chat {
        chat_id: Recipient::Id(teloxide::types::ChatId(admin_id.0)),
    };
    match bot.set_my_commands(admin_commands()).scope(scope).await {
        Ok(_) => info!("admin commands registered"),
        Err(e) => warn!(error = %e, "failed to register admin commands"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_menu_is_a_superset_of_public_menu() {
        let admin: Vec<String> = admin_commands().into_iter().map(|c| c.command).collect();
        for c in public_commands() {
            assert!(admin.contains(&c.command), "{} missing from admin menu", c.command);
        }
    }
}
