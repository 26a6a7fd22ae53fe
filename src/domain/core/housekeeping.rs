use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

use super::{ReservationId, RoomId, StaffId, StatusTransition};

#[async_trait]
pub trait HousekeepingTaskRepository {
    async fn find_by_id(
        &self,
        id: HousekeepingTaskId,
    ) -> Result<Option<HousekeepingTask>, DataAccessError>;
    /// 客室の未完了の作業を検索する
    async fn find_open_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<HousekeepingTask>, DataAccessError>;
    async fn save(&mut self, entity: &mut HousekeepingTask) -> Result<bool, DataAccessError>;
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
pub struct HousekeepingTaskId(u64);

impl Id for HousekeepingTaskId {
    type Inner = u64;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HousekeepingTaskEvent {
    HousekeepingTaskCreated {
        id: HousekeepingTaskId,
        room_id: RoomId,
        task_type: HousekeepingTaskType,
        scheduled: Option<DateTime<Utc>>,
        description: String,
        reservation_id: Option<ReservationId>,
    },
    HousekeepingTaskAssigned {
        id: HousekeepingTaskId,
        assignee: Option<StaffId>,
    },
    HousekeepingTaskScheduled {
        id: HousekeepingTaskId,
        scheduled: Option<DateTime<Utc>>,
    },
    HousekeepingTaskStatusChanged {
        id: HousekeepingTaskId,
        status: HousekeepingTaskStatus,
    },
}

impl Event for HousekeepingTaskEvent {
    type Id = HousekeepingTaskId;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HousekeepingTask {
    id: HousekeepingTaskId,
    room_id: RoomId,
    assignee: Option<StaffId>,
    task_type: HousekeepingTaskType,
    status: HousekeepingTaskStatus,
    scheduled: Option<DateTime<Utc>>,
    description: String,
    reservation_id: Option<ReservationId>,
    #[serde(skip)]
    events: EventQueue<HousekeepingTaskEvent>,
}

impl HousekeepingTask {
    pub fn create(
        id: HousekeepingTaskId,
        room_id: RoomId,
        task_type: HousekeepingTaskType,
        scheduled: Option<DateTime<Utc>>,
        description: String,
        reservation_id: Option<ReservationId>,
    ) -> Self {
        let mut entity = HousekeepingTask {
            id,
            room_id,
            task_type,
            scheduled,
            description: description.clone(),
            reservation_id,
            ..Default::default()
        };
        entity
            .events
            .push(HousekeepingTaskEvent::HousekeepingTaskCreated {
                id,
                room_id,
                task_type,
                scheduled,
                description,
                reservation_id,
            });
        entity
    }

    pub fn assign(&mut self, assignee: Option<StaffId>) -> Result<(), HousekeepingTaskError> {
        self.validate_open()?;
        if self.assignee != assignee {
            self.assignee = assignee;
            self.events
                .push(HousekeepingTaskEvent::HousekeepingTaskAssigned { id: self.id, assignee });
        }
        Ok(())
    }

    pub fn schedule(
        &mut self,
        scheduled: Option<DateTime<Utc>>,
    ) -> Result<(), HousekeepingTaskError> {
        self.validate_open()?;
        if self.scheduled != scheduled {
            self.scheduled = scheduled;
            self.events
                .push(HousekeepingTaskEvent::HousekeepingTaskScheduled { id: self.id, scheduled });
        }
        Ok(())
    }

    /// 状態が変わった場合は true を返す
    pub fn change_status(
        &mut self,
        status: HousekeepingTaskStatus,
    ) -> Result<bool, HousekeepingTaskError> {
        self.status.validate_transition(&status)?;
        if self.status == status {
            return Ok(false);
        }
        self.status = status;
        self.events
            .push(HousekeepingTaskEvent::HousekeepingTaskStatusChanged { id: self.id, status });
        Ok(true)
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn assignee(&self) -> Option<StaffId> {
        self.assignee
    }

    pub fn task_type(&self) -> HousekeepingTaskType {
        self.task_type
    }

    pub fn status(&self) -> HousekeepingTaskStatus {
        self.status
    }

    pub fn scheduled(&self) -> Option<DateTime<Utc>> {
        self.scheduled
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn reservation_id(&self) -> Option<ReservationId> {
        self.reservation_id
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    fn validate_id(&self, id: &HousekeepingTaskId) -> Result<(), HousekeepingTaskError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(HousekeepingTaskError::MismatchedId),
        }
    }

    fn validate_open(&self) -> Result<(), HousekeepingTaskError> {
        match self.is_open() {
            true => Ok(()),
            false => Err(HousekeepingTaskError::AlreadyDone),
        }
    }
}

impl Entity for HousekeepingTask {
    type Id = HousekeepingTaskId;

    const ENTITY_NAME: &'static str = "housekeeping_task";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for HousekeepingTask {
    type Event = HousekeepingTaskEvent;
    type Error = HousekeepingTaskError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            HousekeepingTaskEvent::HousekeepingTaskCreated { .. } => Ok(()),
            HousekeepingTaskEvent::HousekeepingTaskAssigned { id, .. }
            | HousekeepingTaskEvent::HousekeepingTaskScheduled { id, .. } => {
                self.validate_id(id)?;
                self.validate_open()
            }
            HousekeepingTaskEvent::HousekeepingTaskStatusChanged { id, status } => {
                self.validate_id(id)?;
                self.status.validate_transition(status)
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            HousekeepingTaskEvent::HousekeepingTaskCreated {
                id,
                room_id,
                task_type,
                scheduled,
                description,
                reservation_id,
            } => {
                if self.id != id {
                    *self = Self::create(
                        id,
                        room_id,
                        task_type,
                        scheduled,
                        description,
                        reservation_id,
                    );
                }
            }
            HousekeepingTaskEvent::HousekeepingTaskAssigned { id, assignee } => {
                if self.id == id {
                    if let Err(_e) = self.assign(assignee) {}
                }
            }
            HousekeepingTaskEvent::HousekeepingTaskScheduled { id, scheduled } => {
                if self.id == id {
                    if let Err(_e) = self.schedule(scheduled) {}
                }
            }
            HousekeepingTaskEvent::HousekeepingTaskStatusChanged { id, status } => {
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

impl PartialEq for HousekeepingTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.room_id == other.room_id
            && self.assignee == other.assignee
            && self.task_type == other.task_type
            && self.status == other.status
            && self.scheduled == other.scheduled
            && self.description == other.description
            && self.reservation_id == other.reservation_id
    }
}

impl Eq for HousekeepingTask {}

#[derive(Error, Display, Debug)]
pub enum HousekeepingTaskError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "The task is already done")]
    AlreadyDone,
    #[display(fmt = "Invalid status transition: {}", _0)]
    InvalidStatusTransition(#[error(not(source))] StatusTransition<HousekeepingTaskStatus>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HousekeepingTaskType {
    #[default]
    Cleaning,
    Maintenance,
    Inspection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HousekeepingTaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl HousekeepingTaskStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    fn validate_transition(
        &self,
        status: &HousekeepingTaskStatus,
    ) -> Result<(), HousekeepingTaskError> {
        use HousekeepingTaskStatus::*;
        match (self, status) {
            (from, to) if from == to => Ok(()),
            (Pending, InProgress) | (Pending, Done) | (InProgress, Pending) | (InProgress, Done) => {
                Ok(())
            }
            _ => Err(HousekeepingTaskError::InvalidStatusTransition(
                StatusTransition {
                    from: *self,
                    to: *status,
                },
            )),
        }
    }
}
