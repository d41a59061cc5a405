//! Cooking alerts.
//!
//! The engine is polled roughly once a minute with the whole plan. A task
//! fires a "production start" alert when the clock is within the minute
//! following its start time, and a "production end" alert within the minute
//! following its cook end. A boundary that fell between two polls spaced
//! slightly more than a minute apart is still caught by the later poll.
//! Each (task, boundary) pair is remembered for two minutes so overlapping
//! polls never repeat an alert, while a task moved back onto the same
//! instant later on alerts again.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::model::Task;
use crate::timecalc::{cook_end, expiry};

/// How long after a boundary it still counts as "just crossed". Matches the
/// polling cadence.
pub const DETECTION_WINDOW_SECS: i64 = 60;

/// How long a sent alert is remembered. Must stay above the detection window.
/// Also bounds how far back a late poll looks for missed boundaries.
pub const MARK_TTL_SECS: i64 = 120;

/// The two instants of a task that raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    Start,
    End,
}

impl Boundary {
    pub const ALL: [Boundary; 2] = [Boundary::Start, Boundary::End];

    pub fn instant(&self, task: &Task) -> NaiveDateTime {
        match self {
            Boundary::Start => task.start_time(),
            Boundary::End => cook_end(task),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Boundary::Start => "Production start",
            Boundary::End => "Production end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub task_id: Option<String>,
    pub boundary: Option<Boundary>,
}

impl Notification {
    pub fn for_task(task: &Task, boundary: Boundary) -> Self {
        let body = match boundary {
            Boundary::Start => format!(
                "{} ({}): start cooking now, done at {}",
                task.name,
                task.responsible,
                cook_end(task).format("%H:%M")
            ),
            Boundary::End => format!(
                "{} ({}): cooking finished, pack within {} min, expires {}",
                task.name,
                task.responsible,
                task.packing_time,
                expiry(task).format("%d/%m %H:%M")
            ),
        };
        Notification {
            title: boundary.title().to_string(),
            body,
            task_id: Some(task.id.clone()),
            boundary: Some(boundary),
        }
    }

    fn confirmation() -> Self {
        Notification {
            title: "Production alerts enabled".to_string(),
            body: "You will be told when each task starts and finishes cooking.".to_string(),
            task_id: None,
            boundary: None,
        }
    }
}

/// Where notifications go.
pub trait NotificationSink {
    fn notify(&mut self, notification: &Notification) -> io::Result<()>;
}

/// Rings the terminal bell and prints the alert on a single line.
pub struct TerminalSink<W: Write> {
    out: W,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        TerminalSink { out }
    }
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        TerminalSink::new(io::stdout())
    }
}

impl<W: Write> NotificationSink for TerminalSink<W> {
    fn notify(&mut self, notification: &Notification) -> io::Result<()> {
        writeln!(self.out, "\x07[{}] {}", notification.title, notification.body)?;
        self.out.flush()
    }
}

/// Keeps every notification it receives. Useful when testing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub sent: Vec<Notification>,
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, notification: &Notification) -> io::Result<()> {
        self.sent.push(notification.clone());
        Ok(())
    }
}

/// Whether alerts may be shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Never asked.
    #[default]
    Default,
    Granted,
    Denied,
    /// The environment cannot show notifications at all.
    Unsupported,
}

/// Asks the user for permission to show alerts.
pub trait PermissionPrompt {
    fn is_supported(&self) -> bool;

    /// Returns whether the user agreed.
    fn ask(&mut self) -> io::Result<bool>;
}

/// Alerts already sent, each forgotten `MARK_TTL_SECS` after it was
/// recorded. Expired entries are dropped lazily whenever the set is used.
#[derive(Debug, Default)]
pub struct NotifiedMarks {
    entries: HashMap<(String, Boundary), NaiveDateTime>,
}

impl NotifiedMarks {
    pub fn prune(&mut self, now: NaiveDateTime) {
        let ttl = Duration::seconds(MARK_TTL_SECS);
        self.entries
            .retain(|_, marked_at| now.signed_duration_since(*marked_at) < ttl);
    }

    pub fn contains(&self, task_id: &str, boundary: Boundary) -> bool {
        self.entries.contains_key(&(task_id.to_string(), boundary))
    }

    /// Record an alert. Returns false if it was already recorded and has
    /// not expired.
    pub fn mark(&mut self, task_id: &str, boundary: Boundary, now: NaiveDateTime) -> bool {
        self.prune(now);
        let key = (task_id.to_string(), boundary);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, now);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `now` lies in `[boundary, boundary + DETECTION_WINDOW_SECS)`.
pub fn just_crossed(now: NaiveDateTime, boundary: NaiveDateTime) -> bool {
    let elapsed = now.signed_duration_since(boundary);
    elapsed >= Duration::zero() && elapsed < Duration::seconds(DETECTION_WINDOW_SECS)
}

/// Whether `boundary` is due at `now`: just crossed, or crossed after the
/// previous sweep when that sweep came late. Never reaches back further
/// than `MARK_TTL_SECS`, so a marked boundary cannot come due twice.
pub fn crossed_since(
    now: NaiveDateTime,
    boundary: NaiveDateTime,
    previous_sweep: Option<NaiveDateTime>,
) -> bool {
    if just_crossed(now, boundary) {
        return true;
    }
    let elapsed = now.signed_duration_since(boundary);
    match previous_sweep {
        Some(previous) => {
            boundary > previous
                && elapsed >= Duration::zero()
                && elapsed < Duration::seconds(MARK_TTL_SECS)
        }
        None => false,
    }
}

pub struct AlertEngine<C: Clock, S: NotificationSink> {
    clock: C,
    sink: S,
    permission: Permission,
    marks: NotifiedMarks,
    last_sweep: Option<NaiveDateTime>,
}

impl<C: Clock, S: NotificationSink> AlertEngine<C, S> {
    pub fn new(clock: C, sink: S, permission: Permission) -> Self {
        AlertEngine {
            clock,
            sink,
            permission,
            marks: NotifiedMarks::default(),
            last_sweep: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn set_permission(&mut self, permission: Permission) {
        if permission != self.permission {
            debug!(from = ?self.permission, to = ?permission, "notification permission changed");
        }
        self.permission = permission;
    }

    pub fn marks(&self) -> &NotifiedMarks {
        &self.marks
    }

    /// Check every task against the current time and send the alerts that
    /// are due. Returns how many were sent. Nothing is sent, or remembered,
    /// without permission.
    pub fn tick(&mut self, tasks: &[Task]) -> usize {
        if self.permission != Permission::Granted {
            trace!(permission = ?self.permission, "alerts suppressed");
            return 0;
        }

        let now = self.clock.now();
        self.marks.prune(now);
        let previous = self.last_sweep.replace(now);

        let mut sent = 0;
        for task in tasks {
            for boundary in Boundary::ALL.iter().copied() {
                if !crossed_since(now, boundary.instant(task), previous) {
                    continue;
                }
                if !self.marks.mark(&task.id, boundary, now) {
                    continue;
                }
                let notification = Notification::for_task(task, boundary);
                debug!(task = %task.id, ?boundary, "sending alert");
                if let Err(err) = self.sink.notify(&notification) {
                    warn!(task = %task.id, ?boundary, error = %err, "failed to deliver alert");
                }
                sent += 1;
            }
        }
        sent
    }

    /// Ask for permission to alert. A previous refusal is respected and the
    /// user is not asked again. When permission is newly granted a
    /// confirmation is sent and due alerts are swept immediately.
    pub fn request_permission(
        &mut self,
        prompt: &mut dyn PermissionPrompt,
        tasks: &[Task],
    ) -> Permission {
        let outcome = match self.permission {
            Permission::Granted => return Permission::Granted,
            Permission::Denied => return Permission::Denied,
            Permission::Default | Permission::Unsupported => {
                if !prompt.is_supported() {
                    Permission::Unsupported
                } else {
                    match prompt.ask() {
                        Ok(true) => Permission::Granted,
                        Ok(false) => Permission::Denied,
                        Err(err) => {
                            warn!(error = %err, "permission prompt failed");
                            self.permission
                        }
                    }
                }
            }
        };
        self.set_permission(outcome);

        if outcome == Permission::Granted {
            info!("production alerts enabled");
            if let Err(err) = self.sink.notify(&Notification::confirmation()) {
                warn!(error = %err, "failed to deliver confirmation");
            }
            self.tick(tasks);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::Shift;
    use crate::timecalc::parse_start_time;

    fn at(s: &str) -> NaiveDateTime {
        parse_start_time(s).unwrap()
    }

    fn task(id: &str, start: &str, cook: u32) -> Task {
        let mut task = Task::new(id, at(start), Shift::Morning, "Chef");
        task.name = format!("dish {}", id);
        task.cook_time = cook;
        task
    }

    fn engine(now: &str, permission: Permission) -> AlertEngine<FixedClock, RecordingSink> {
        AlertEngine::new(FixedClock::new(at(now)), RecordingSink::default(), permission)
    }

    struct ScriptedPrompt {
        supported: bool,
        answer: bool,
        asked: usize,
    }

    impl PermissionPrompt for ScriptedPrompt {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn ask(&mut self) -> io::Result<bool> {
            self.asked += 1;
            Ok(self.answer)
        }
    }

    struct BrokenSink;

    impl NotificationSink for BrokenSink {
        fn notify(&mut self, _: &Notification) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn start_alert_fires_once_per_window() {
        let tasks = vec![task("a", "2024-06-03T08:00", 90)];
        let mut engine = engine("2024-06-03T08:00:30", Permission::Granted);

        assert_eq!(engine.tick(&tasks), 1);
        engine.clock().advance(Duration::seconds(15));
        assert_eq!(engine.tick(&tasks), 0);

        let sent = &engine.sink().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Production start");
        assert_eq!(sent[0].boundary, Some(Boundary::Start));
        assert_eq!(sent[0].task_id.as_deref(), Some("a"));
    }

    #[test]
    fn end_alert_fires_at_cook_end() {
        let tasks = vec![task("a", "2024-06-03T08:00", 90)];
        let mut engine = engine("2024-06-03T09:29:59", Permission::Granted);

        assert_eq!(engine.tick(&tasks), 0);
        engine.clock().set(at("2024-06-03T09:30"));
        assert_eq!(engine.tick(&tasks), 1);
        assert_eq!(engine.sink().sent[0].boundary, Some(Boundary::End));
        assert_eq!(engine.sink().sent[0].title, "Production end");
    }

    #[test]
    fn window_is_half_open() {
        let start = at("2024-06-03T08:00");
        assert!(just_crossed(start, start));
        assert!(just_crossed(start + Duration::seconds(59), start));
        assert!(!just_crossed(start + Duration::seconds(60), start));
        assert!(!just_crossed(start - Duration::seconds(1), start));
    }

    #[test]
    fn minute_polling_never_misses_or_repeats() {
        let tasks = vec![task("a", "2024-06-03T08:00:20", 30)];
        let mut engine = engine("2024-06-03T07:55:00", Permission::Granted);

        for _ in 0..60 {
            engine.tick(&tasks);
            engine.clock().advance(Duration::seconds(60));
        }

        let boundaries: Vec<_> = engine.sink().sent.iter().map(|n| n.boundary).collect();
        assert_eq!(boundaries, vec![Some(Boundary::Start), Some(Boundary::End)]);
    }

    #[test]
    fn slow_polling_still_catches_each_boundary() {
        let tasks = vec![task("a", "2024-06-03T08:00", 1)];
        let first_poll = at("2024-06-03T08:00") - Duration::milliseconds(10);
        let mut engine = AlertEngine::new(
            FixedClock::new(first_poll),
            RecordingSink::default(),
            Permission::Granted,
        );

        for _ in 0..10 {
            engine.tick(&tasks);
            engine
                .clock()
                .advance(Duration::seconds(60) + Duration::milliseconds(20));
        }

        let boundaries: Vec<_> = engine.sink().sent.iter().map(|n| n.boundary).collect();
        assert_eq!(boundaries, vec![Some(Boundary::Start), Some(Boundary::End)]);
    }

    #[test]
    fn late_poll_does_not_reach_past_the_mark_ttl() {
        let start = at("2024-06-03T08:00");
        let previous = Some(start - Duration::seconds(5));
        assert!(crossed_since(start + Duration::seconds(90), start, previous));
        assert!(!crossed_since(start + Duration::seconds(120), start, previous));
        assert!(!crossed_since(start + Duration::seconds(90), start, Some(start)));
        assert!(!crossed_since(start + Duration::seconds(90), start, None));
    }

    #[test]
    fn zero_cook_time_fires_both_boundaries() {
        let tasks = vec![task("a", "2024-06-03T08:00", 0)];
        let mut engine = engine("2024-06-03T08:00:10", Permission::Granted);
        assert_eq!(engine.tick(&tasks), 2);
    }

    #[test]
    fn nothing_is_sent_without_permission() {
        let tasks = vec![task("a", "2024-06-03T08:00", 90)];
        for permission in [Permission::Default, Permission::Denied, Permission::Unsupported] {
            let mut engine = engine("2024-06-03T08:00:30", permission);
            assert_eq!(engine.tick(&tasks), 0);
            assert!(engine.sink().sent.is_empty());
            assert!(engine.marks().is_empty());
        }
    }

    #[test]
    fn rescheduled_task_alerts_again_after_mark_expires() {
        let mut tasks = vec![task("a", "2024-06-03T08:00", 90)];
        let mut engine = engine("2024-06-03T08:00:00", Permission::Granted);
        assert_eq!(engine.tick(&tasks), 1);

        // moved three minutes later, the previous mark has expired by then
        tasks[0].set_start_time(at("2024-06-03T08:03"));
        engine.clock().set(at("2024-06-03T08:03:10"));
        assert_eq!(engine.tick(&tasks), 1);
        assert_eq!(engine.sink().sent.len(), 2);
    }

    #[test]
    fn marks_expire_after_ttl() {
        let mut marks = NotifiedMarks::default();
        let now = at("2024-06-03T08:00");
        assert!(marks.mark("a", Boundary::Start, now));
        assert!(!marks.mark("a", Boundary::Start, now + Duration::seconds(119)));
        assert!(marks.mark("a", Boundary::End, now));
        assert!(marks.mark("a", Boundary::Start, now + Duration::seconds(120)));
        marks.prune(now + Duration::seconds(500));
        assert!(marks.is_empty());
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let tasks = vec![task("a", "2024-06-03T08:00", 90)];
        let clock = FixedClock::new(at("2024-06-03T08:00:05"));
        let mut engine = AlertEngine::new(&clock, BrokenSink, Permission::Granted);
        assert_eq!(engine.tick(&tasks), 1);
        assert!(engine.marks().contains("a", Boundary::Start));
        assert_eq!(engine.tick(&tasks), 0);
    }

    #[test]
    fn granting_permission_confirms_and_sweeps() {
        let tasks = vec![task("a", "2024-06-03T08:00", 90)];
        let mut engine = engine("2024-06-03T08:00:30", Permission::Default);
        let mut prompt = ScriptedPrompt {
            supported: true,
            answer: true,
            asked: 0,
        };

        assert_eq!(engine.request_permission(&mut prompt, &tasks), Permission::Granted);
        let titles: Vec<_> = engine.sink().sent.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Production alerts enabled", "Production start"]);

        // already granted: no second prompt, no second confirmation
        assert_eq!(engine.request_permission(&mut prompt, &tasks), Permission::Granted);
        assert_eq!(prompt.asked, 1);
        assert_eq!(engine.sink().sent.len(), 2);
    }

    #[test]
    fn denial_is_never_prompted_again() {
        let mut engine = engine("2024-06-03T08:00", Permission::Default);
        let mut prompt = ScriptedPrompt {
            supported: true,
            answer: false,
            asked: 0,
        };
        assert_eq!(engine.request_permission(&mut prompt, &[]), Permission::Denied);
        assert_eq!(engine.request_permission(&mut prompt, &[]), Permission::Denied);
        assert_eq!(prompt.asked, 1);
        assert!(engine.sink().sent.is_empty());
    }

    #[test]
    fn unsupported_environment_stays_inert() {
        let mut engine = engine("2024-06-03T08:00", Permission::Default);
        let mut prompt = ScriptedPrompt {
            supported: false,
            answer: true,
            asked: 0,
        };
        assert_eq!(engine.request_permission(&mut prompt, &[]), Permission::Unsupported);
        assert_eq!(prompt.asked, 0);
        assert!(engine.sink().sent.is_empty());
    }

    #[test]
    fn permission_defaults_to_never_asked() {
        assert_eq!(Permission::default(), Permission::Default);
        assert_eq!(serde_json::to_string(&Permission::default()).unwrap(), "\"default\"");
    }

    #[test]
    fn terminal_sink_writes_one_line() {
        let mut sink = TerminalSink::new(Vec::new());
        let alert = Notification::for_task(&task("a", "2024-06-03T08:00", 90), Boundary::Start);
        sink.notify(&alert).unwrap();
        let text = String::from_utf8(sink.out).unwrap();
        assert_eq!(
            text,
            "\x07[Production start] dish a (Chef): start cooking now, done at 09:30\n"
        );
    }
}
