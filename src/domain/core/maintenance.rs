use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{HousekeepingTaskId, RoomId, StaffId, StatusTransition};

/// メンテナンス作業リポジトリ
#[async_trait]
pub trait MaintenanceTaskRepository {
    async fn find_by_id(
        &self,
        id: MaintenanceTaskId,
    ) -> Result<Option<MaintenanceTask>, DataAccessError>;
    async fn find_by_room(&self, room_id: RoomId)
        -> Result<Vec<MaintenanceTask>, DataAccessError>;
    /// 未完了（保留・作業中）の作業を検索する
    async fn find_open(&self) -> Result<Vec<MaintenanceTask>, DataAccessError>;
    async fn save(&mut self, entity: &mut MaintenanceTask) -> Result<bool, DataAccessError>;
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    From,
    Deref,
    Default,
)]
pub struct MaintenanceTaskId(u64);

impl Id for MaintenanceTaskId {
    type Inner = u64;
}

/// メンテナンス作業の登録内容
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub name: String,
    pub room_id: RoomId,
    pub task_type: MaintenanceTaskType,
    pub source: MaintenanceSource,
    pub reported_at: DateTime<Utc>,
    pub scheduled: Option<DateTime<Utc>>,
    #[serde_as(as = "DurationSeconds<i64>")]
    pub duration: Duration,
    pub priority: Priority,
    pub description: String,
    pub housekeeping_task_id: Option<HousekeepingTaskId>,
}

impl MaintenanceReport {
    pub fn new(name: String, room_id: RoomId, reported_at: DateTime<Utc>) -> Self {
        Self {
            name,
            room_id,
            task_type: MaintenanceTaskType::Inspection,
            source: MaintenanceSource::Manual,
            reported_at,
            scheduled: None,
            duration: Duration::hours(1),
            priority: Priority::Normal,
            description: String::new(),
            housekeeping_task_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceTaskEvent {
    MaintenanceTaskReported {
        id: MaintenanceTaskId,
        report: MaintenanceReport,
    },
    MaintenanceTaskAssigned {
        id: MaintenanceTaskId,
        assignee: Option<StaffId>,
    },
    MaintenanceTaskScheduled {
        id: MaintenanceTaskId,
        scheduled: Option<DateTime<Utc>>,
    },
    MaintenanceTaskPriorityChanged {
        id: MaintenanceTaskId,
        priority: Priority,
    },
    MaintenanceTaskStatusChanged {
        id: MaintenanceTaskId,
        status: MaintenanceTaskStatus,
    },
}

impl Event for MaintenanceTaskEvent {
    type Id = MaintenanceTaskId;
}

/// メンテナンス作業エンティティ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    id: MaintenanceTaskId,
    #[serde(flatten)]
    report: MaintenanceReport,
    assignee: Option<StaffId>,
    status: MaintenanceTaskStatus,
    #[serde(skip)]
    events: EventQueue<MaintenanceTaskEvent>,
}

impl Default for MaintenanceTask {
    fn default() -> Self {
        Self {
            id: Default::default(),
            report: MaintenanceReport::new(String::new(), Default::default(), Default::default()),
            assignee: None,
            status: Default::default(),
            events: Default::default(),
        }
    }
}

impl MaintenanceTask {
    pub fn report(
        id: MaintenanceTaskId,
        report: MaintenanceReport,
    ) -> Result<Self, MaintenanceTaskError> {
        Self::validate_reported(&report)?;
        let mut entity = MaintenanceTask {
            id,
            report: report.clone(),
            ..Default::default()
        };
        entity
            .events
            .push(MaintenanceTaskEvent::MaintenanceTaskReported { id, report });
        Ok(entity)
    }

    pub fn assign(&mut self, assignee: Option<StaffId>) -> Result<(), MaintenanceTaskError> {
        self.validate_open()?;
        if self.assignee != assignee {
            self.assignee = assignee;
            self.events
                .push(MaintenanceTaskEvent::MaintenanceTaskAssigned { id: self.id, assignee });
        }
        Ok(())
    }

    pub fn schedule(&mut self, scheduled: Option<DateTime<Utc>>) -> Result<(), MaintenanceTaskError> {
        self.validate_open()?;
        if self.report.scheduled != scheduled {
            self.report.scheduled = scheduled;
            self.events
                .push(MaintenanceTaskEvent::MaintenanceTaskScheduled { id: self.id, scheduled });
        }
        Ok(())
    }

    pub fn change_priority(&mut self, priority: Priority) {
        if self.report.priority != priority {
            self.report.priority = priority;
            self.events
                .push(MaintenanceTaskEvent::MaintenanceTaskPriorityChanged { id: self.id, priority });
        }
    }

    /// 状態が変わった場合は true を返す
    pub fn change_status(
        &mut self,
        status: MaintenanceTaskStatus,
    ) -> Result<bool, MaintenanceTaskError> {
        self.status.validate_transition(&status)?;
        if self.status == status {
            return Ok(false);
        }
        self.status = status;
        self.events
            .push(MaintenanceTaskEvent::MaintenanceTaskStatusChanged { id: self.id, status });
        Ok(true)
    }

    pub fn name(&self) -> &str {
        &self.report.name
    }

    pub fn room_id(&self) -> RoomId {
        self.report.room_id
    }

    pub fn task_type(&self) -> MaintenanceTaskType {
        self.report.task_type
    }

    pub fn source(&self) -> MaintenanceSource {
        self.report.source
    }

    pub fn reported_at(&self) -> DateTime<Utc> {
        self.report.reported_at
    }

    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.report.scheduled
    }

    /// 予定日時。未定の場合は報告日時
    pub fn planned_at(&self) -> DateTime<Utc> {
        self.report.scheduled.unwrap_or(self.report.reported_at)
    }

    pub fn duration(&self) -> Duration {
        self.report.duration
    }

    pub fn priority(&self) -> Priority {
        self.report.priority
    }

    pub fn description(&self) -> &str {
        &self.report.description
    }

    pub fn housekeeping_task_id(&self) -> Option<HousekeepingTaskId> {
        self.report.housekeeping_task_id
    }

    pub fn assignee(&self) -> Option<StaffId> {
        self.assignee
    }

    pub fn status(&self) -> MaintenanceTaskStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// 作業順: 優先度の高い順、予定日時の早い順（未定は最後）、IDの新しい順
    pub fn queue_order(&self, other: &Self) -> Ordering {
        other
            .report
            .priority
            .cmp(&self.report.priority)
            .then_with(|| match (self.report.scheduled, other.report.scheduled) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| other.id.cmp(&self.id))
    }

    fn validate_id(&self, id: &MaintenanceTaskId) -> Result<(), MaintenanceTaskError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(MaintenanceTaskError::MismatchedId),
        }
    }

    fn validate_open(&self) -> Result<(), MaintenanceTaskError> {
        match self.is_open() {
            true => Ok(()),
            false => Err(MaintenanceTaskError::Closed),
        }
    }

    fn validate_reported(report: &MaintenanceReport) -> Result<(), MaintenanceTaskError> {
        if report.name.trim().is_empty() {
            return Err(MaintenanceTaskError::NameIsBlank);
        }
        if report.duration <= Duration::zero() {
            return Err(MaintenanceTaskError::InvalidDuration);
        }
        Ok(())
    }
}

impl Entity for MaintenanceTask {
    type Id = MaintenanceTaskId;

    const ENTITY_NAME: &'static str = "maintenance_task";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for MaintenanceTask {
    type Event = MaintenanceTaskEvent;
    type Error = MaintenanceTaskError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            MaintenanceTaskEvent::MaintenanceTaskReported { report, .. } => {
                Self::validate_reported(report)
            }
            MaintenanceTaskEvent::MaintenanceTaskAssigned { id, .. }
            | MaintenanceTaskEvent::MaintenanceTaskScheduled { id, .. } => {
                self.validate_id(id)?;
                self.validate_open()
            }
            MaintenanceTaskEvent::MaintenanceTaskPriorityChanged { id, .. } => self.validate_id(id),
            MaintenanceTaskEvent::MaintenanceTaskStatusChanged { id, status } => {
                self.validate_id(id)?;
                self.status.validate_transition(status)
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            MaintenanceTaskEvent::MaintenanceTaskReported { id, report } => {
                if self.id != id {
                    if let Ok(entity) = Self::report(id, report) {
                        *self = entity;
                    }
                }
            }
            MaintenanceTaskEvent::MaintenanceTaskAssigned { id, assignee } => {
                if self.id == id {
                    if let Err(_e) = self.assign(assignee) {}
                }
            }
            MaintenanceTaskEvent::MaintenanceTaskScheduled { id, scheduled } => {
                if self.id == id {
                    if let Err(_e) = self.schedule(scheduled) {}
                }
            }
            MaintenanceTaskEvent::MaintenanceTaskPriorityChanged { id, priority } => {
                if self.id == id {
                    self.change_priority(priority);
                }
            }
            MaintenanceTaskEvent::MaintenanceTaskStatusChanged { id, status } => {
                if self.id == id {
                    if let Err(_e) = self.change_status(status) {}
                }
            }
        }
    }

    fn events(&self) -> &EventQueue<Self::Event> {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event> {
        &mut self.events
    }
}

impl PartialEq for MaintenanceTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.report == other.report
            && self.assignee == other.assignee
            && self.status == other.status
    }
}

impl Eq for MaintenanceTask {}

/// メンテナンス作業エラー
#[derive(Error, Display, Debug)]
pub enum MaintenanceTaskError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "Title cannot be blank")]
    NameIsBlank,
    #[display(fmt = "Expected duration must be positive")]
    InvalidDuration,
    #[display(fmt = "The task is already closed")]
    Closed,
    #[display(fmt = "Invalid status transition: {}", _0)]
    InvalidStatusTransition(#[error(not(source))] StatusTransition<MaintenanceTaskStatus>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTaskType {
    #[default]
    Inspection,
    Repair,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceSource {
    /// 定期点検
    Inspection,
    /// 清掃担当からの報告
    Housekeeping,
    #[default]
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceTaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Cancelled,
}

impl MaintenanceTaskStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    fn validate_transition(
        &self,
        status: &MaintenanceTaskStatus,
    ) -> Result<(), MaintenanceTaskError> {
        use MaintenanceTaskStatus::*;
        match (self, status) {
            (from, to) if from == to => Ok(()),
            (Pending, InProgress)
            | (Pending, Done)
            | (Pending, Cancelled)
            | (InProgress, Pending)
            | (InProgress, Done)
            | (InProgress, Cancelled) => Ok(()),
            _ => Err(MaintenanceTaskError::InvalidStatusTransition(
                StatusTransition {
                    from: *self,
                    to: *status,
                },
            )),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn task(id: u64, priority: Priority, scheduled: Option<DateTime<Utc>>) -> MaintenanceTask {
        MaintenanceTask::report(
            id.into(),
            MaintenanceReport {
                priority,
                scheduled,
                ..MaintenanceReport::new("Leaking tap".to_owned(), 101.into(), now())
            },
        )
        .unwrap()
    }

    #[test]
    fn test_report_validation() {
        let report = MaintenanceReport::new(" ".to_owned(), 101.into(), now());
        assert!(matches!(
            MaintenanceTask::report(1.into(), report),
            Err(MaintenanceTaskError::NameIsBlank)
        ));
        let report = MaintenanceReport {
            duration: Duration::zero(),
            ..MaintenanceReport::new("Aircon".to_owned(), 101.into(), now())
        };
        assert!(matches!(
            MaintenanceTask::report(1.into(), report),
            Err(MaintenanceTaskError::InvalidDuration)
        ));
    }

    #[test]
    fn test_closed_tasks_are_terminal() {
        let mut task = task(1, Priority::Normal, None);
        assert!(task.change_status(MaintenanceTaskStatus::Cancelled).unwrap());
        assert!(task.change_status(MaintenanceTaskStatus::InProgress).is_err());
        assert!(matches!(task.schedule(Some(now())), Err(MaintenanceTaskError::Closed)));
    }

    #[test]
    fn test_queue_order() {
        let mut tasks = vec![
            task(1, Priority::Normal, None),
            task(2, Priority::Normal, Some(now() + Duration::days(2))),
            task(3, Priority::Urgent, None),
            task(4, Priority::Normal, Some(now() + Duration::days(1))),
            task(5, Priority::Normal, None),
        ];
        tasks.sort_by(MaintenanceTask::queue_order);
        let ids = tasks.iter().map(|t| *t.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 4, 2, 5, 1]);
    }

    #[test]
    fn test_replay() {
        let mut task = task(9, Priority::Low, None);
        task.assign(Some(2.into())).unwrap();
        task.change_priority(Priority::High);
        task.change_status(MaintenanceTaskStatus::InProgress).unwrap();
        let replayed = MaintenanceTask::replay(task.pop_all());
        assert_eq!(replayed, task);
    }
}
