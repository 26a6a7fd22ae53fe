use async_trait::async_trait;
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, DataAccessError, Entity, Event, EventQueue, Id};

/// 支店リポジトリ
#[async_trait]
pub trait BranchRepository {
    async fn find_by_id(&self, id: BranchId) -> Result<Option<Branch>, DataAccessError>;
    async fn find_all(&self) -> Result<Vec<Branch>, DataAccessError>;
    async fn save(&mut self, entity: &mut Branch) -> Result<bool, DataAccessError>;
}

/// 支店ID
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
pub struct BranchId(u64);

impl Id for BranchId {
    type Inner = u64;
}

/// 支店イベント
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchEvent {
    BranchOpened {
        id: BranchId,
        name: String,
        location: String,
    },
    BranchRenamed {
        id: BranchId,
        name: String,
    },
    BranchClosed {
        id: BranchId,
    },
    BranchReopened {
        id: BranchId,
    },
}

impl Event for BranchEvent {
    type Id = BranchId;
}

/// 支店エンティティ
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Branch {
    id: BranchId,
    name: String,
    location: String,
    active: bool,
    #[serde(skip)]
    events: EventQueue<BranchEvent>,
}

impl Branch {
    pub fn open(id: BranchId, name: String, location: String) -> Result<Self, BranchError> {
        Self::validate_name(&name)?;
        let mut entity = Branch {
            id,
            name: name.clone(),
            location: location.clone(),
            active: true,
            ..Default::default()
        };
        entity.events.push(BranchEvent::BranchOpened { id, name, location });
        Ok(entity)
    }

    pub fn rename(&mut self, name: String) -> Result<(), BranchError> {
        Self::validate_name(&name)?;
        self.name = name.clone();
        self.events
            .push(BranchEvent::BranchRenamed { id: self.id, name });
        Ok(())
    }

    pub fn close(&mut self) {
        if self.active {
            self.active = false;
            self.events.push(BranchEvent::BranchClosed { id: self.id });
        }
    }

    pub fn reopen(&mut self) {
        if !self.active {
            self.active = true;
            self.events.push(BranchEvent::BranchReopened { id: self.id });
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn validate_id(&self, id: &BranchId) -> Result<(), BranchError> {
        match self.id == *id {
            true => Ok(()),
            false => Err(BranchError::MismatchedId),
        }
    }

    fn validate_name(name: &str) -> Result<(), BranchError> {
        match name.trim().is_empty() {
            true => Err(BranchError::NameIsBlank),
            false => Ok(()),
        }
    }
}

impl Entity for Branch {
    type Id = BranchId;

    const ENTITY_NAME: &'static str = "branch";

    fn id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregation for Branch {
    type Event = BranchEvent;
    type Error = BranchError;

    fn validate(&self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            BranchEvent::BranchOpened { name, .. } => Self::validate_name(name),
            BranchEvent::BranchRenamed { id, name } => {
                self.validate_id(id)?;
                Self::validate_name(name)
            }
            BranchEvent::BranchClosed { id } | BranchEvent::BranchReopened { id } => {
                self.validate_id(id)
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            BranchEvent::BranchOpened { id, name, location } => {
                if self.id != id {
                    if let Ok(entity) = Self::open(id, name, location) {
                        *self = entity;
                    }
                }
            }
            BranchEvent::BranchRenamed { id, name } => {
                if self.id == id {
                    if let Err(_e) = self.rename(name) {}
                }
            }
            BranchEvent::BranchClosed { id } => {
                if self.id == id {
                    self.close();
                }
            }
            BranchEvent::BranchReopened { id } => {
                if self.id == id {
                    self.reopen();
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

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.location == other.location
            && self.active == other.active
    }
}

impl Eq for Branch {}

/// 支店エラー
#[derive(Error, Display, Debug)]
pub enum BranchError {
    #[display(fmt = "ID does not match")]
    MismatchedId,
    #[display(fmt = "Name cannot be blank")]
    NameIsBlank,
}
