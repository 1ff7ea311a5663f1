use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::CaptureContext;
use crate::dispatch::ActionResult;
use crate::rules::Rule;

/// Overlay lifecycle. `ShowingResult` and `Closed` are terminal content
/// states; a new capture restarts at `AwaitingSelection` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayPhase {
    AwaitingSelection,
    Executing,
    ShowingResult,
    Closed,
}

/// State of one trigger-to-dismissal lifecycle. The generation stamp ties
/// asynchronous dispatch results back to the session that started them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub generation: u64,
    pub id: String,
    pub context: CaptureContext,
    pub candidates: Vec<Rule>,
    pub selected_index: usize,
    pub result: Option<ActionResult>,
    pub phase: OverlayPhase,
    pub started_at: DateTime<Utc>,
}

/// A dispatch the controller still has to run: everything the spawned task
/// needs, detached from the session lock.
#[derive(Debug, Clone)]
pub struct PendingDispatch {
    pub generation: u64,
    pub rule: Rule,
    pub text: String,
}

/// The single active session slot plus the generation counter. All transition
/// rules live here; the controller only adds window/event side effects.
#[derive(Debug, Default)]
pub struct OverlayState {
    next_generation: u64,
    session: Option<Session>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for a fresh capture, discarding any session in flight.
    /// Returns the snapshot to publish and whether this replaced a visible
    /// session (which must reset the popup to its compact footprint).
    pub fn begin(&mut self, context: CaptureContext, candidates: Vec<Rule>) -> (Session, bool) {
        let restarted = self
            .session
            .as_ref()
            .is_some_and(|s| s.phase != OverlayPhase::Closed);

        self.next_generation += 1;
        let session = Session {
            generation: self.next_generation,
            id: Uuid::new_v4().to_string(),
            context,
            candidates,
            selected_index: 0,
            result: None,
            phase: OverlayPhase::AwaitingSelection,
            started_at: Utc::now(),
        };
        self.session = Some(session.clone());
        (session, restarted)
    }

    /// Activate the candidate at `index`. Only legal while awaiting a
    /// selection, which also bars a second dispatch from starting.
    pub fn select(&mut self, index: usize) -> Option<PendingDispatch> {
        let session = self.session.as_mut()?;
        if session.phase != OverlayPhase::AwaitingSelection || index >= session.candidates.len() {
            return None;
        }

        session.selected_index = index;
        session.phase = OverlayPhase::Executing;
        Some(PendingDispatch {
            generation: session.generation,
            rule: session.candidates[index].clone(),
            text: session.context.text.clone(),
        })
    }

    /// Digit keys 1-9 map to candidate indexes 0-8; out-of-range digits are
    /// ignored.
    pub fn digit(&mut self, digit: u8) -> Option<PendingDispatch> {
        if !(1..=9).contains(&digit) {
            return None;
        }
        self.select(usize::from(digit) - 1)
    }

    /// Enter activates whatever the keyboard index currently points at.
    pub fn activate_current(&mut self) -> Option<PendingDispatch> {
        let index = self.session.as_ref()?.selected_index;
        self.select(index)
    }

    /// Move the keyboard index by `delta`, clamped to the candidate range.
    /// No wraparound. Returns whether the index changed.
    pub fn move_selection(&mut self, delta: i64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.phase != OverlayPhase::AwaitingSelection || session.candidates.is_empty() {
            return false;
        }

        let max_index = (session.candidates.len() - 1) as i64;
        let next = (session.selected_index as i64 + delta).clamp(0, max_index) as usize;
        let changed = next != session.selected_index;
        session.selected_index = next;
        changed
    }

    /// Apply a dispatch result. Stale results (generation mismatch, or the
    /// session already left `Executing`) are dropped, not applied.
    pub fn apply_result(&mut self, generation: u64, result: ActionResult) -> bool {
        match self.session.as_mut() {
            Some(session)
                if session.generation == generation && session.phase == OverlayPhase::Executing =>
            {
                session.result = Some(result);
                session.phase = OverlayPhase::ShowingResult;
                true
            }
            _ => false,
        }
    }

    /// A non-script handler failed: quietly return to the candidate strip so
    /// the user can retry.
    pub fn fail_executing(&mut self, generation: u64) -> bool {
        match self.session.as_mut() {
            Some(session)
                if session.generation == generation && session.phase == OverlayPhase::Executing =>
            {
                session.result = None;
                session.phase = OverlayPhase::AwaitingSelection;
                true
            }
            _ => false,
        }
    }

    /// Fire-and-forget kinds close the overlay as soon as dispatch starts the
    /// OS call; the session just has to still be the current one.
    pub fn close_if_current(&mut self, generation: u64) -> bool {
        match self.session.as_mut() {
            Some(session)
                if session.generation == generation && session.phase == OverlayPhase::Executing =>
            {
                session.phase = OverlayPhase::Closed;
                true
            }
            _ => false,
        }
    }

    /// Result text available for copying, only while a result is shown.
    pub fn result_text(&self) -> Option<String> {
        let session = self.session.as_ref()?;
        if session.phase != OverlayPhase::ShowingResult {
            return None;
        }
        session.result.as_ref().map(|r| r.text.clone())
    }

    /// Escape, blur or an explicit close. Returns whether anything was open.
    pub fn dismiss(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) if session.phase != OverlayPhase::Closed => {
                session.phase = OverlayPhase::Closed;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.session.clone()
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.generation)
    }

    pub fn phase(&self) -> Option<OverlayPhase> {
        self.session.as_ref().map(|s| s.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::{ActionSpec, RuleMeta, RuleScope, TriggerSpec};

    fn candidate(id: &str) -> Rule {
        Rule {
            meta: RuleMeta {
                id: id.to_string(),
                name: id.to_string(),
                version: "1.0.0".to_string(),
            },
            scope: RuleScope {
                include: vec!["*".to_string()],
                priority: 10,
            },
            trigger: TriggerSpec::Keyword {
                pattern: "x".to_string(),
            },
            action: ActionSpec::LocalFormat,
        }
    }

    fn context(text: &str) -> CaptureContext {
        CaptureContext {
            text: text.to_string(),
            app_id: "app".to_string(),
            origin: None,
        }
    }

    fn state_with_candidates(n: usize) -> OverlayState {
        let mut state = OverlayState::new();
        let candidates = (0..n).map(|i| candidate(&format!("c{i}"))).collect();
        state.begin(context("captured text"), candidates);
        state
    }

    #[test]
    fn digit_out_of_range_is_a_no_op() {
        let mut state = state_with_candidates(5);
        assert!(state.digit(7).is_none());
        assert_eq!(state.phase(), Some(OverlayPhase::AwaitingSelection));
    }

    #[test]
    fn digit_three_selects_index_two() {
        let mut state = state_with_candidates(5);
        let pending = state.digit(3).expect("digit 3 should dispatch");
        assert_eq!(pending.rule.meta.id, "c2");
        assert_eq!(state.phase(), Some(OverlayPhase::Executing));
    }

    #[test]
    fn digit_zero_is_ignored() {
        let mut state = state_with_candidates(5);
        assert!(state.digit(0).is_none());
    }

    #[test]
    fn arrows_clamp_without_wraparound() {
        let mut state = state_with_candidates(3);
        assert!(!state.move_selection(-1));
        assert_eq!(state.snapshot().unwrap().selected_index, 0);

        assert!(state.move_selection(1));
        assert!(state.move_selection(1));
        assert!(!state.move_selection(1));
        assert_eq!(state.snapshot().unwrap().selected_index, 2);
    }

    #[test]
    fn enter_activates_the_current_keyboard_index() {
        let mut state = state_with_candidates(4);
        state.move_selection(1);
        state.move_selection(1);
        let pending = state.activate_current().expect("enter should dispatch");
        assert_eq!(pending.rule.meta.id, "c2");
    }

    #[test]
    fn selecting_while_executing_is_barred() {
        let mut state = state_with_candidates(3);
        assert!(state.select(0).is_some());
        assert!(state.select(1).is_none());
    }

    #[test]
    fn result_moves_session_to_showing_result() {
        let mut state = state_with_candidates(2);
        let pending = state.select(1).unwrap();
        assert!(state.apply_result(
            pending.generation,
            ActionResult {
                text: "done".to_string(),
                kind: "local_format".to_string(),
            },
        ));
        assert_eq!(state.phase(), Some(OverlayPhase::ShowingResult));
        assert_eq!(state.result_text().as_deref(), Some("done"));
    }

    #[test]
    fn stale_result_does_not_touch_the_new_session() {
        let mut state = state_with_candidates(2);
        let pending_a = state.select(0).expect("session A dispatch");

        // A new capture arrives and replaces the session before A resolves.
        let (session_b, restarted) = state.begin(context("fresh"), vec![candidate("b0")]);
        assert!(restarted);

        let applied = state.apply_result(
            pending_a.generation,
            ActionResult {
                text: "stale".to_string(),
                kind: "translate".to_string(),
            },
        );
        assert!(!applied);

        let current = state.snapshot().unwrap();
        assert_eq!(current.generation, session_b.generation);
        assert_eq!(current.phase, OverlayPhase::AwaitingSelection);
        assert!(current.result.is_none());
    }

    #[test]
    fn failure_returns_to_awaiting_selection() {
        let mut state = state_with_candidates(2);
        let pending = state.select(0).unwrap();
        assert!(state.fail_executing(pending.generation));
        assert_eq!(state.phase(), Some(OverlayPhase::AwaitingSelection));
        assert!(state.result_text().is_none());
    }

    #[test]
    fn fire_and_forget_close_only_applies_to_current_generation() {
        let mut state = state_with_candidates(1);
        let pending = state.select(0).unwrap();
        state.begin(context("newer"), vec![candidate("n0")]);
        assert!(!state.close_if_current(pending.generation));
        assert_eq!(state.phase(), Some(OverlayPhase::AwaitingSelection));
    }

    #[test]
    fn dismiss_closes_from_any_phase() {
        let mut state = state_with_candidates(2);
        assert!(state.dismiss());
        assert_eq!(state.phase(), Some(OverlayPhase::Closed));
        assert!(!state.dismiss());
    }

    #[test]
    fn new_capture_restarts_after_a_result() {
        let mut state = state_with_candidates(1);
        let pending = state.select(0).unwrap();
        state.apply_result(
            pending.generation,
            ActionResult {
                text: "old".to_string(),
                kind: "script".to_string(),
            },
        );

        let (session, restarted) = state.begin(context("new text"), vec![candidate("n")]);
        assert!(restarted);
        assert_eq!(session.phase, OverlayPhase::AwaitingSelection);
        assert_eq!(session.selected_index, 0);
        assert!(session.result.is_none());
    }

    #[test]
    fn first_show_is_not_a_restart() {
        let mut state = OverlayState::new();
        let (_, restarted) = state.begin(context("text"), vec![candidate("c")]);
        assert!(!restarted);
    }
}
