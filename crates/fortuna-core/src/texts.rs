//! User-facing message templates (Telegram HTML).

use crate::formatting::escape_html;

pub const START_CAPTION: &str = "🎰 <b>Wheel of Fortune</b>\n\n\
Try your luck once and win a special offer from us.";
pub const DRAW_BUTTON: &str = "🎲 Try my luck";
pub const SHOP_BUTTON: &str = "🛍 Book now";
pub const CHECK_SUBSCRIPTION_BUTTON: &str = "✅ I've subscribed";

pub const ALREADY_CLAIMED: &str = "⚡️ You only get one attempt, and Fortune has already \
given you a special offer! Show it when you book with us.";
pub const CLAIMED_FOLLOWUP: &str = "⚡️ That was your one attempt. Show this message when \
you book to redeem the offer.";
pub const NO_PROMOTIONS: &str = "😔 There are no offers yet. Come back a bit later!";
pub const TRY_LATER: &str = "⚠️ Something went wrong. Please try again later.";

pub const ADMIN_NO_PROMOTIONS: &str = "📭 No promotions yet. Use /addpromotion to add one.";
pub const ADMIN_CHOOSE_PROMOTION: &str = "📋 <b>Promotions</b>\n\nChoose one to edit or delete:";
pub const ADMIN_ASK_NAME: &str = "✏️ Send the name of the new promotion:";
pub const ADMIN_ASK_VALUE: &str = "💰 Now send the promotion value (for example <code>10%</code>):";
pub const ADMIN_ASK_NEW_NAME: &str = "✏️ Send the new name:";
pub const ADMIN_ASK_NEW_VALUE: &str = "💰 Now send the new value:";
pub const ADMIN_EMPTY_INPUT: &str = "❌ The text cannot be empty.";
pub const ADMIN_CANCELLED: &str = "🛑 Cancelled.";
pub const ADMIN_NOT_FOUND: &str = "❓ Promotion not found. It may have been deleted.";
pub const ADMIN_DELETED: &str = "🗑 Promotion deleted.";
pub const EDIT_BUTTON: &str = "✏️ Edit";
pub const DELETE_BUTTON: &str = "🗑 Delete";
pub const CONFIRM_DELETE_BUTTON: &str = "⚠️ Yes, delete";

pub fn subscribe_prompt(link: &str) -> String {
    if link.is_empty() {
        return "📢 Subscribe to our channel first, then press the button below.".to_string();
    }
    format!(
        "📢 Subscribe to our channel first: {}\n\nThen press the button below.",
        escape_html(link)
    )
}

pub fn reveal(value: &str) -> String {
    format!("🎉 Your prize: <b>{}</b>", escape_html(value))
}

pub fn promotion_label(id: impl std::fmt::Display, name: &str) -> String {
    format!("[{id}] {name}")
}

pub fn promotion_menu(name: &str, value: &str) -> String {
    format!(
        "<b>{}</b>\nValue: {}\n\nWhat should be done with it?",
        escape_html(name),
        escape_html(value)
    )
}

pub fn confirm_delete(name: &str) -> String {
    format!("Delete <b>{}</b>? This cannot be undone.", escape_html(name))
}

pub fn promotion_added(name: &str, value: &str) -> String {
    format!(
        "✅ Promotion added: <b>{}</b> ({})",
        escape_html(name),
        escape_html(value)
    )
}

pub fn promotion_updated(name: &str, value: &str) -> String {
    format!(
        "✅ Promotion updated: <b>{}</b> ({})",
        escape_html(name),
        escape_html(value)
    )
}

pub fn store_failure(err: &impl std::fmt::Display) -> String {
    format!("❌ Error: {}", escape_html(&err.to_string()))
}
