use std::cmp::Ordering;

use super::clock::DayWindow;
use super::domain::{FollowUp, FollowUpStatus};

/// Priority bucket used as the primary sort key. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RankClass {
    PendingToday,
    PendingLater,
    Completed,
    Other,
}

impl RankClass {
    pub fn of(follow_up: &FollowUp, today: &DayWindow) -> Self {
        match follow_up.status {
            FollowUpStatus::Pending if today.contains(follow_up.scheduled_at) => {
                Self::PendingToday
            }
            FollowUpStatus::Pending => Self::PendingLater,
            FollowUpStatus::Completed => Self::Completed,
            FollowUpStatus::Cancelled => Self::Other,
        }
    }

    /// Numeric rank as used by the SQL `CASE` expression.
    pub fn ordinal(self) -> i32 {
        match self {
            Self::PendingToday => 0,
            Self::PendingLater => 1,
            Self::Completed => 2,
            Self::Other => 3,
        }
    }
}

/// Rank class, then schedule, then identifier.
pub fn compare(a: &FollowUp, b: &FollowUp, today: &DayWindow) -> Ordering {
    RankClass::of(a, today)
        .cmp(&RankClass::of(b, today))
        .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_ranked(follow_ups: &mut [FollowUp], today: &DayWindow) {
    follow_ups.sort_by(|a, b| compare(a, b, today));
}

/// Whether a record belongs in the due-today feed.
pub fn is_due_today(follow_up: &FollowUp, today: &DayWindow) -> bool {
    RankClass::of(follow_up, today) == RankClass::PendingToday
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::customers::follow_ups::domain::{CustomerId, FollowUpId};
    use chrono::{DateTime, Offset, Utc};

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    fn follow_up(id: &str, status: FollowUpStatus, at: &str) -> FollowUp {
        FollowUp {
            id: FollowUpId(id.to_string()),
            scheduled_at: instant(at),
            content: format!("note {id}"),
            customer_id: CustomerId("cust-1".to_string()),
            agent_id: AgentId("agent-1".to_string()),
            status,
        }
    }

    fn today() -> DayWindow {
        DayWindow::containing(instant("2025-01-10T10:00:00Z"), Utc.fix())
    }

    fn ids(follow_ups: &[FollowUp]) -> Vec<&str> {
        follow_ups.iter().map(|f| f.id.0.as_str()).collect()
    }

    #[test]
    fn classes_follow_status_and_day() {
        let today = today();
        let cases = [
            (FollowUpStatus::Pending, "2025-01-10T18:00:00Z", RankClass::PendingToday),
            (FollowUpStatus::Pending, "2025-01-10T08:00:00Z", RankClass::PendingToday),
            (FollowUpStatus::Pending, "2025-01-11T00:00:00Z", RankClass::PendingLater),
            (FollowUpStatus::Completed, "2025-01-10T18:00:00Z", RankClass::Completed),
            (FollowUpStatus::Cancelled, "2025-01-10T18:00:00Z", RankClass::Other),
        ];
        for (status, at, expected) in cases {
            assert_eq!(RankClass::of(&follow_up("x", status, at), &today), expected);
        }
        assert!(RankClass::PendingToday < RankClass::Other);
        assert_eq!(RankClass::Other.ordinal(), 3);
    }

    #[test]
    fn ranking_law_orders_today_pending_first() {
        let mut items = vec![
            follow_up("d", FollowUpStatus::Cancelled, "2025-01-10T12:00:00Z"),
            follow_up("c", FollowUpStatus::Completed, "2025-01-10T12:00:00Z"),
            follow_up("b", FollowUpStatus::Pending, "2025-01-11T12:00:00Z"),
            follow_up("a", FollowUpStatus::Pending, "2025-01-10T12:00:00Z"),
        ];
        sort_ranked(&mut items, &today());
        assert_eq!(ids(&items), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn ties_break_on_time_then_identifier() {
        let mut items = vec![
            follow_up("z", FollowUpStatus::Pending, "2025-01-12T09:00:00Z"),
            follow_up("m", FollowUpStatus::Pending, "2025-01-12T08:00:00Z"),
            follow_up("b", FollowUpStatus::Pending, "2025-01-12T09:00:00Z"),
        ];
        sort_ranked(&mut items, &today());
        assert_eq!(ids(&items), vec!["m", "b", "z"]);
    }

    #[test]
    fn overdue_pending_from_yesterday_is_not_due_today() {
        let overdue = follow_up("y", FollowUpStatus::Pending, "2025-01-09T23:00:00Z");
        assert!(!is_due_today(&overdue, &today()));
        assert_eq!(RankClass::of(&overdue, &today()), RankClass::PendingLater);
    }
}
