/// Default cap on user-authored turns per chat session.
pub const DEFAULT_TURN_CAP: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnVerdict {
    Allowed,
    LimitReached,
}

/// Pure counting rule over user-authored turns. The check runs before any
/// backend call, so a capped session gets an instant local answer and the
/// backend is never contacted for it. The authoritative count is derived
/// server-side from the supplied history; client-reported counts are ignored.
#[derive(Clone, Copy, Debug)]
pub struct TurnLimiter {
    cap: u32,
}

impl TurnLimiter {
    pub fn new(cap: u32) -> Self {
        Self { cap: cap.max(1) }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn check(&self, turn_count: u32) -> TurnVerdict {
        if turn_count > self.cap {
            TurnVerdict::LimitReached
        } else {
            TurnVerdict::Allowed
        }
    }

    pub fn limit_message(&self) -> String {
        format!(
            "This conversation has reached the maximum limit of {} user messages. \
             Please start a new conversation.",
            self.cap
        )
    }
}

impl Default for TurnLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_TURN_CAP)
    }
}
