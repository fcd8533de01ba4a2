use moodroom_core::{label_text, Expression, Locale, ParticipantIdentity, StaleLabelPolicy};

/// A tile's label, pushed up to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionEvent {
    pub identity: ParticipantIdentity,
    pub label: Option<Expression>,
}

/// Latest label per participant identity, in first-report order.
#[derive(Debug, Default)]
pub struct ExpressionBoard {
    entries: Vec<(ParticipantIdentity, Option<Expression>)>,
    policy: StaleLabelPolicy,
}

impl ExpressionBoard {
    pub fn new(policy: StaleLabelPolicy) -> Self {
        Self { entries: Vec::new(), policy }
    }

    pub fn policy(&self) -> StaleLabelPolicy {
        self.policy
    }

    /// Insert or overwrite the identity's label. Returns whether anything changed.
    pub fn merge(&mut self, event: ExpressionEvent) -> bool {
        match self.entries.iter_mut().find(|(id, _)| *id == event.identity) {
            Some((_, label)) if *label == event.label => false,
            Some((_, label)) => {
                *label = event.label;
                true
            }
            None => {
                self.entries.push((event.identity, event.label));
                true
            }
        }
    }

    /// Called when a participant has no tracks left or disconnected.
    pub fn participant_departed(&mut self, identity: &ParticipantIdentity) -> bool {
        if self.policy != StaleLabelPolicy::PruneOnDeparture {
            return false;
        }
        let before = self.entries.len();
        self.entries.retain(|(id, _)| id != identity);
        before != self.entries.len()
    }

    /// Called when the local participant leaves the room.
    pub fn room_left(&mut self) {
        if self.policy == StaleLabelPolicy::PruneOnDeparture {
            self.entries.clear();
        }
    }

    pub fn get(&self, identity: &ParticipantIdentity) -> Option<Option<Expression>> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, label)| *label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantIdentity, Option<Expression>)> {
        self.entries.iter().map(|(id, label)| (id, *label))
    }

    /// `identity: label` lines.
    pub fn lines(&self, locale: Locale) -> Vec<String> {
        self.iter()
            .map(|(id, label)| format!("{}: {}", id, label_text(label, locale)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(who: &str, label: Option<Expression>) -> ExpressionEvent {
        ExpressionEvent { identity: who.into(), label }
    }

    #[test]
    fn merge_overwrites_by_identity_and_keeps_order() {
        let mut board = ExpressionBoard::default();
        assert!(board.merge(event("bob", None)));
        assert!(board.merge(event("alice", Some(Expression::Sad))));
        assert!(board.merge(event("bob", Some(Expression::Happy))));
        assert!(!board.merge(event("bob", Some(Expression::Happy))));

        assert_eq!(board.len(), 2);
        assert_eq!(
            board.lines(Locale::English),
            vec!["bob: happy".to_string(), "alice: sad".to_string()]
        );
    }

    #[test]
    fn empty_label_renders_blank() {
        let mut board = ExpressionBoard::default();
        board.merge(event("carol", None));
        assert_eq!(board.lines(Locale::Korean), vec!["carol: ".to_string()]);
        assert_eq!(board.get(&"carol".into()), Some(None));
    }

    #[test]
    fn retain_policy_keeps_departed_entries() {
        let mut board = ExpressionBoard::new(StaleLabelPolicy::Retain);
        board.merge(event("dave", Some(Expression::Fear)));

        assert!(!board.participant_departed(&"dave".into()));
        board.room_left();
        assert_eq!(board.get(&"dave".into()), Some(Some(Expression::Fear)));
    }

    #[test]
    fn prune_policy_drops_departed_entries() {
        let mut board = ExpressionBoard::new(StaleLabelPolicy::PruneOnDeparture);
        board.merge(event("dave", Some(Expression::Fear)));
        board.merge(event("erin", Some(Expression::Neutral)));

        assert!(board.participant_departed(&"dave".into()));
        assert_eq!(board.get(&"dave".into()), None);
        assert_eq!(board.len(), 1);

        board.room_left();
        assert!(board.is_empty());
    }
}
