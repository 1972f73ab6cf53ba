//! Inline-button payload protocol.
//!
//! Payloads are short strings: `start`, `draw`, or an action prefix followed
//! by a decimal promotion id (`promotion_7`, `edit_7`, `del_7`, `delok_7`).

use std::fmt;

use crate::domain::PromotionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Start,
    Draw,
    /// Admin: open the edit/delete menu for a promotion.
    Promotion(PromotionId),
    /// Admin: start the edit dialog.
    Edit(PromotionId),
    /// Admin: ask for delete confirmation.
    Delete(PromotionId),
    /// Admin: confirmed, delete now.
    ConfirmDelete(PromotionId),
}

const PROMOTION: &str = "promotion_";
// Buttons sent by older builds used `pack_`.
const PROMOTION_LEGACY: &str = "pack_";
const EDIT: &str = "edit_";
const DELETE: &str = "del_";
const CONFIRM_DELETE: &str = "delok_";

fn parse_id(raw: &str) -> Option<PromotionId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok().map(PromotionId)
}

impl CallbackAction {
    /// Parse a payload. Anything unrecognized yields `None`.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "start" => return Some(CallbackAction::Start),
            "draw" => return Some(CallbackAction::Draw),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix(CONFIRM_DELETE) {
            return parse_id(rest).map(CallbackAction::ConfirmDelete);
        }
        if let Some(rest) = data.strip_prefix(DELETE) {
            return parse_id(rest).map(CallbackAction::Delete);
        }
        if let Some(rest) = data.strip_prefix(EDIT) {
            return parse_id(rest).map(CallbackAction::Edit);
        }
        if let Some(rest) = data
            .strip_prefix(PROMOTION)
            .or_else(|| data.strip_prefix(PROMOTION_LEGACY))
        {
            return parse_id(rest).map(CallbackAction::Promotion);
        }
        None
    }

    pub fn is_admin_only(self) -> bool {
        !matches!(self, CallbackAction::Start | CallbackAction::Draw)
    }

    pub fn payload(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Start => f.write_str("start"),
            CallbackAction::Draw => f.write_str("draw"),
            CallbackAction::Promotion(id) => write!(f, "{PROMOTION}{id}"),
            CallbackAction::Edit(id) => write!(f, "{EDIT}{id}"),
            CallbackAction::Delete(id) => write!(f, "{DELETE}{id}"),
            CallbackAction::ConfirmDelete(id) => write!(f, "{CONFIRM_DELETE}{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_known_payload() {
        let id = PromotionId(12);
        assert_eq!(CallbackAction::parse("start"), Some(CallbackAction::Start));
        assert_eq!(CallbackAction::parse("draw"), Some(CallbackAction::Draw));
        assert_eq!(CallbackAction::parse("promotion_12"), Some(CallbackAction::Promotion(id)));
        assert_eq!(CallbackAction::parse("pack_12"), Some(CallbackAction::Promotion(id)));
        assert_eq!(CallbackAction::parse("edit_12"), Some(CallbackAction::Edit(id)));
        assert_eq!(CallbackAction::parse("del_12"), Some(CallbackAction::Delete(id)));
        assert_eq!(CallbackAction::parse("delok_12"), Some(CallbackAction::ConfirmDelete(id)));
    }

    #[test]
    fn rejects_malformed_payloads() {
        for raw in ["", "Draw", "del_", "del_x", "del_-1", "del_+3", "edit_1_2", "askuser:1:0", "delete_4"] {
            assert_eq!(CallbackAction::parse(raw), None, "{raw:?} should be ignored");
        }
    }

    #[test]
    fn payload_round_trips() {
        for action in [
            CallbackAction::Start,
            CallbackAction::Draw,
            CallbackAction::Promotion(PromotionId(1)),
            CallbackAction::Edit(PromotionId(2)),
            CallbackAction::Delete(PromotionId(3)),
            CallbackAction::ConfirmDelete(PromotionId(4)),
        ] {
            assert_eq!(CallbackAction::parse(&action.payload()), Some(action));
        }
    }

    #[test]
    fn only_start_and_draw_are_public() {
        assert!(!CallbackAction::Draw.is_admin_only());
        assert!(!CallbackAction::Start.is_admin_only());
        assert!(CallbackAction::ConfirmDelete(PromotionId(1)).is_admin_only());
        assert!(CallbackAction::Promotion(PromotionId(1)).is_admin_only());
    }
}
