use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error as StdError;
use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::core::{
    available_halls, available_rooms, overlaps, AccountingGateway, Amenity, AmenityId,
    AvailabilityError, Branch, BranchError, BranchId, BranchRepository, CatalogError,
    CatalogRepository, CoreEvent, EventBooking, EventBookingError, EventBookingId,
    EventBookingRepository, EventBookingStatus, EventPackage, EventPackageId, Guest, GuestId,
    Hall, HallAvailabilityQuery, HallError, HallId, HallRepository, HallType, HallTypeId,
    HousekeepingTask, HousekeepingTaskError, HousekeepingTaskEvent, HousekeepingTaskId,
    HousekeepingTaskRepository, HousekeepingTaskStatus, HousekeepingTaskType, InvoiceDraft,
    InvoiceError, InvoiceId, MaintenanceReport, MaintenanceSource, MaintenanceTask,
    MaintenanceTaskError, MaintenanceTaskEvent, MaintenanceTaskId, MaintenanceTaskRepository,
    MaintenanceTaskStatus, MaintenanceTaskType, Money, Occupancy, PaymentStatus, Priority,
    Reservation, ReservationError, ReservationEvent, ReservationId, ReservationRepository,
    ReservationStatus, ReservationTerms, Room, RoomAvailabilityQuery, RoomError, RoomId,
    RoomRepository, RoomStatus, RoomType, RoomTypeId, StaffId,
};
use crate::domain::{Aggregation, DataAccessError, Entity, IdGenerator};
use crate::Maintenance;

const PERIODIC_INSPECTION: &str = "Periodic Inspection";
const HOUSEKEEPING_REPORT: &str = "Maintenance Report from Housekeeping";

/// サービスが利用するリポジトリ群
pub struct Repositories {
    pub branches: Box<dyn BranchRepository + Send + Sync>,
    pub catalog: Box<dyn CatalogRepository + Send + Sync>,
    pub rooms: Box<dyn RoomRepository + Send + Sync>,
    pub halls: Box<dyn HallRepository + Send + Sync>,
    pub reservations: Box<dyn ReservationRepository + Send + Sync>,
    pub event_bookings: Box<dyn EventBookingRepository + Send + Sync>,
    pub housekeeping: Box<dyn HousekeepingTaskRepository + Send + Sync>,
    pub maintenance: Box<dyn MaintenanceTaskRepository + Send + Sync>,
}

/// ホテル業務サービス
///
/// 書き込みは検証後に保存され、保存されたイベントに応じて客室状態などの
/// 連携処理が実行される。連携処理の失敗は警告ログのみで、元の書き込みは取り消さない。
pub struct HotelService {
    branches: Box<dyn BranchRepository + Send + Sync>,
    catalog: Box<dyn CatalogRepository + Send + Sync>,
    rooms: Box<dyn RoomRepository + Send + Sync>,
    halls: Box<dyn HallRepository + Send + Sync>,
    reservations: Box<dyn ReservationRepository + Send + Sync>,
    event_bookings: Box<dyn EventBookingRepository + Send + Sync>,
    housekeeping: Box<dyn HousekeepingTaskRepository + Send + Sync>,
    maintenance: Box<dyn MaintenanceTaskRepository + Send + Sync>,
    accounting: Box<dyn AccountingGateway + Send + Sync>,
    id_generator: IdGenerator,
    inspection_interval: Duration,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewRoom {
    pub branch_id: BranchId,
    pub name: String,
    #[serde(default)]
    pub room_type_id: Option<RoomTypeId>,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub amenities: BTreeSet<AmenityId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewHall {
    pub branch_id: BranchId,
    pub name: String,
    pub hall_type_id: HallTypeId,
    pub capacity: u32,
    #[serde(default)]
    pub price_per_hour: Option<Money>,
    #[serde(default)]
    pub amenities: BTreeSet<AmenityId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewGuest {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub preferences: String,
    #[serde(default)]
    pub vip: bool,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewReservation {
    pub room_id: RoomId,
    pub guest_id: GuestId,
    pub time: Range<DateTime<Utc>>,
    #[serde(default)]
    pub terms: ReservationTerms,
    #[serde(default)]
    pub status: ReservationStatus,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct NewEventBooking {
    pub hall_id: HallId,
    pub customer_id: GuestId,
    pub start: DateTime<Utc>,
    #[serde_as(as = "DurationSeconds<i64>")]
    pub duration: Duration,
    #[serde(default)]
    pub package_id: Option<EventPackageId>,
    #[serde(default)]
    pub deposit: Option<Money>,
    #[serde(default)]
    pub total: Option<Money>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewHousekeepingTask {
    pub room_id: RoomId,
    #[serde(default)]
    pub task_type: HousekeepingTaskType,
    #[serde(default)]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
}

impl HotelService {
    pub fn new(
        repositories: Repositories,
        accounting: Box<dyn AccountingGateway + Send + Sync>,
        id_generator: IdGenerator,
        config: &Maintenance,
    ) -> Self {
        Self {
            branches: repositories.branches,
            catalog: repositories.catalog,
            rooms: repositories.rooms,
            halls: repositories.halls,
            reservations: repositories.reservations,
            event_bookings: repositories.event_bookings,
            housekeeping: repositories.housekeeping,
            maintenance: repositories.maintenance,
            accounting,
            id_generator,
            inspection_interval: Duration::days(
                config
                    .inspection_interval_days
                    .clamp(1, Maintenance::MAX_INSPECTION_INTERVAL_DAYS),
            ),
        }
    }

    // ---- branches and catalog ----

    pub async fn open_branch(
        &mut self,
        name: String,
        location: String,
    ) -> Result<Branch, ServiceError> {
        let mut branch = Branch::open(self.id_generator.generate(), name, location)?;
        self.branches.save(&mut branch).await?;
        info!("支店を開設しました: {}", branch.name());
        Ok(branch)
    }

    pub async fn rename_branch(
        &mut self,
        id: BranchId,
        name: String,
    ) -> Result<Branch, ServiceError> {
        let mut branch = self.branch(id).await?;
        branch.rename(name)?;
        self.branches.save(&mut branch).await?;
        Ok(branch)
    }

    pub async fn close_branch(&mut self, id: BranchId) -> Result<Branch, ServiceError> {
        let mut branch = self.branch(id).await?;
        branch.close();
        if self.branches.save(&mut branch).await? {
            info!("支店を閉鎖しました: {}", branch.name());
        }
        Ok(branch)
    }

    pub async fn branch(&self, id: BranchId) -> Result<Branch, ServiceError> {
        self.branches
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<Branch>(id))
    }

    pub async fn branches(&self) -> Result<Vec<Branch>, ServiceError> {
        Ok(self.branches.find_all().await?)
    }

    pub async fn create_room_type(
        &mut self,
        name: String,
        description: String,
        capacity: u32,
        default_price: Option<Money>,
    ) -> Result<RoomType, ServiceError> {
        let room_type = RoomType::create(
            self.id_generator.generate(),
            name,
            description,
            capacity,
            default_price,
        )?;
        self.catalog.save_room_type(&room_type).await?;
        Ok(room_type)
    }

    pub async fn create_amenity(
        &mut self,
        name: String,
        description: String,
    ) -> Result<Amenity, ServiceError> {
        let amenity = Amenity::create(self.id_generator.generate(), name, description)?;
        self.catalog.save_amenity(&amenity).await?;
        Ok(amenity)
    }

    pub async fn create_hall_type(
        &mut self,
        name: String,
        capacity: u32,
        price_per_hour: Option<Money>,
    ) -> Result<HallType, ServiceError> {
        let hall_type =
            HallType::create(self.id_generator.generate(), name, capacity, price_per_hour)?;
        self.catalog.save_hall_type(&hall_type).await?;
        Ok(hall_type)
    }

    pub async fn create_event_package(
        &mut self,
        name: String,
        description: String,
        price: Money,
        services: Vec<String>,
    ) -> Result<EventPackage, ServiceError> {
        let package = EventPackage::create(
            self.id_generator.generate(),
            name,
            description,
            price,
            services,
        )?;
        self.catalog.save_package(&package).await?;
        Ok(package)
    }

    pub async fn register_guest(&mut self, guest: NewGuest) -> Result<Guest, ServiceError> {
        let entity = Guest::create(
            self.id_generator.generate(),
            guest.name,
            guest.phone,
            guest.email,
        )?
        .with_preferences(guest.preferences)
        .with_vip(guest.vip)
        .with_nationality(guest.nationality)?;
        self.catalog.save_guest(&entity).await?;
        Ok(entity)
    }

    pub async fn guest(&self, id: GuestId) -> Result<Guest, ServiceError> {
        self.catalog
            .find_guest(id)
            .await?
            .ok_or_else(|| not_found::<Guest>(id))
    }

    // ---- inventory ----

    pub async fn register_room(&mut self, room: NewRoom) -> Result<Room, ServiceError> {
        self.branch(room.branch_id).await?;
        if let Some(id) = room.room_type_id {
            self.room_type(id).await?;
        }
        self.check_amenities(&room.amenities).await?;
        let mut entity = Room::register(
            self.id_generator.generate(),
            room.branch_id,
            room.name,
            room.room_type_id,
            room.floor,
            room.price,
            room.amenities,
        )?;
        self.rooms.save(&mut entity).await?;
        info!("客室を登録しました: {}", entity.name());
        Ok(entity)
    }

    pub async fn change_room_price(
        &mut self,
        id: RoomId,
        price: Option<Money>,
    ) -> Result<Room, ServiceError> {
        let mut room = self.room(id).await?;
        room.change_price(price);
        self.rooms.save(&mut room).await?;
        Ok(room)
    }

    pub async fn change_room_amenities(
        &mut self,
        id: RoomId,
        amenities: BTreeSet<AmenityId>,
    ) -> Result<Room, ServiceError> {
        self.check_amenities(&amenities).await?;
        let mut room = self.room(id).await?;
        room.change_amenities(amenities);
        self.rooms.save(&mut room).await?;
        Ok(room)
    }

    /// 客室の状態を手動で変更する
    pub async fn change_room_status(
        &mut self,
        id: RoomId,
        status: RoomStatus,
    ) -> Result<Room, ServiceError> {
        let mut room = self.room(id).await?;
        if room.change_status(status) {
            self.rooms.save(&mut room).await?;
            info!("客室 {} の状態を {:?} に変更しました", room.name(), status);
        }
        Ok(room)
    }

    pub async fn room(&self, id: RoomId) -> Result<Room, ServiceError> {
        self.rooms
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<Room>(id))
    }

    pub async fn rooms(&self, branch_id: BranchId) -> Result<Vec<Room>, ServiceError> {
        Ok(self.rooms.find_by_branch(branch_id).await?)
    }

    pub async fn register_hall(&mut self, hall: NewHall) -> Result<Hall, ServiceError> {
        self.branch(hall.branch_id).await?;
        self.hall_type(hall.hall_type_id).await?;
        self.check_amenities(&hall.amenities).await?;
        let mut entity = Hall::register(
            self.id_generator.generate(),
            hall.branch_id,
            hall.name,
            hall.hall_type_id,
            hall.capacity,
            hall.price_per_hour,
            hall.amenities,
        )?;
        self.halls.save(&mut entity).await?;
        info!("宴会場を登録しました: {}", entity.name());
        Ok(entity)
    }

    pub async fn change_hall_price(
        &mut self,
        id: HallId,
        price_per_hour: Option<Money>,
    ) -> Result<Hall, ServiceError> {
        let mut hall = self.hall(id).await?;
        hall.change_price(price_per_hour);
        self.halls.save(&mut hall).await?;
        Ok(hall)
    }

    pub async fn change_hall_capacity(
        &mut self,
        id: HallId,
        capacity: u32,
    ) -> Result<Hall, ServiceError> {
        let mut hall = self.hall(id).await?;
        hall.change_capacity(capacity);
        self.halls.save(&mut hall).await?;
        Ok(hall)
    }

    pub async fn hall(&self, id: HallId) -> Result<Hall, ServiceError> {
        self.halls
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<Hall>(id))
    }

    pub async fn halls(&self, branch_id: BranchId) -> Result<Vec<Hall>, ServiceError> {
        Ok(self.halls.find_by_branch(branch_id).await?)
    }

    // ---- reservations ----

    pub async fn create_reservation(
        &mut self,
        reservation: NewReservation,
    ) -> Result<Reservation, ServiceError> {
        self.room(reservation.room_id).await?;
        self.guest(reservation.guest_id).await?;
        let mut entity = Reservation::create(
            self.id_generator.generate(),
            reservation.room_id,
            reservation.guest_id,
            reservation.time,
            reservation.terms,
            reservation.status,
        )?;
        self.check_room_free(entity.room_id(), entity.time(), None)
            .await?;
        self.save_reservation(&mut entity).await?;
        info!(
            "予約を作成しました: {} (客室 {})",
            entity.id(),
            entity.room_id()
        );
        Ok(entity)
    }

    pub async fn reschedule_reservation(
        &mut self,
        id: ReservationId,
        time: Range<DateTime<Utc>>,
    ) -> Result<Reservation, ServiceError> {
        let mut reservation = self.reservation(id).await?;
        reservation.reschedule(time)?;
        self.check_room_free(reservation.room_id(), reservation.time(), Some(id))
            .await?;
        self.save_reservation(&mut reservation).await?;
        Ok(reservation)
    }

    pub async fn change_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, ServiceError> {
        let mut reservation = self.reservation(id).await?;
        if reservation.change_status(status)? {
            self.save_reservation(&mut reservation).await?;
            info!("予約 {} の状態を {:?} に変更しました", id, status);
        }
        Ok(reservation)
    }

    pub async fn change_payment_status(
        &mut self,
        id: ReservationId,
        payment_status: PaymentStatus,
    ) -> Result<Reservation, ServiceError> {
        let mut reservation = self.reservation(id).await?;
        reservation.change_payment_status(payment_status);
        self.save_reservation(&mut reservation).await?;
        Ok(reservation)
    }

    pub async fn reservation(&self, id: ReservationId) -> Result<Reservation, ServiceError> {
        self.reservations
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<Reservation>(id))
    }

    pub async fn reservations_of_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<Reservation>, ServiceError> {
        Ok(self.reservations.find_by_room(room_id).await?)
    }

    // ---- event bookings ----

    pub async fn create_event_booking(
        &mut self,
        booking: NewEventBooking,
    ) -> Result<EventBooking, ServiceError> {
        self.hall(booking.hall_id).await?;
        self.guest(booking.customer_id).await?;
        if let Some(id) = booking.package_id {
            self.package(id).await?;
        }
        let mut entity = EventBooking::create(
            self.id_generator.generate(),
            booking.hall_id,
            booking.customer_id,
            booking.start,
            booking.duration,
            booking.package_id,
            booking.deposit,
            booking.total,
        )?;
        self.check_hall_free(entity.hall_id(), &entity.time(), None)
            .await?;
        self.event_bookings.save(&mut entity).await?;
        info!(
            "宴会場予約を作成しました: {} (宴会場 {})",
            entity.id(),
            entity.hall_id()
        );
        Ok(entity)
    }

    pub async fn reschedule_event_booking(
        &mut self,
        id: EventBookingId,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<EventBooking, ServiceError> {
        let mut booking = self.event_booking(id).await?;
        booking.reschedule(start, duration)?;
        self.check_hall_free(booking.hall_id(), &booking.time(), Some(id))
            .await?;
        self.event_bookings.save(&mut booking).await?;
        Ok(booking)
    }

    pub async fn change_event_booking_hall(
        &mut self,
        id: EventBookingId,
        hall_id: HallId,
    ) -> Result<EventBooking, ServiceError> {
        self.hall(hall_id).await?;
        let mut booking = self.event_booking(id).await?;
        booking.change_hall(hall_id)?;
        self.check_hall_free(hall_id, &booking.time(), Some(id))
            .await?;
        self.event_bookings.save(&mut booking).await?;
        Ok(booking)
    }

    pub async fn change_event_booking_status(
        &mut self,
        id: EventBookingId,
        status: EventBookingStatus,
    ) -> Result<EventBooking, ServiceError> {
        let mut booking = self.event_booking(id).await?;
        if booking.change_status(status)? {
            self.event_bookings.save(&mut booking).await?;
            info!("宴会場予約 {} の状態を {:?} に変更しました", id, status);
        }
        Ok(booking)
    }

    pub async fn event_booking(&self, id: EventBookingId) -> Result<EventBooking, ServiceError> {
        self.event_bookings
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<EventBooking>(id))
    }

    // ---- availability ----

    pub async fn search_rooms(
        &self,
        query: &RoomAvailabilityQuery,
    ) -> Result<Vec<Room>, ServiceError> {
        query.validate()?;
        let rooms = self.rooms.find_by_branch(query.branch_id).await?;
        let room_types = self
            .catalog
            .find_room_types()
            .await?
            .into_iter()
            .map(|t| (t.id(), t))
            .collect::<HashMap<_, _>>();
        let reservations = self.reservations.find_active_overlapping(&query.time).await?;
        let found = available_rooms(query, rooms, &room_types, &reservations)?;
        debug!("空室検索: {:?} -> {} 件", query, found.len());
        Ok(found)
    }

    pub async fn search_halls(
        &self,
        query: &HallAvailabilityQuery,
    ) -> Result<Vec<Hall>, ServiceError> {
        query.validate()?;
        let halls = self.halls.find_by_branch(query.branch_id).await?;
        let bookings = self
            .event_bookings
            .find_active_starting_before(query.time()?.end)
            .await?;
        let found = available_halls(query, halls, &bookings)?;
        debug!("空き宴会場検索: {:?} -> {} 件", query, found.len());
        Ok(found)
    }

    /// 検索結果のうち指定された客室、または先頭の客室に仮予約を作成する
    pub async fn reserve_first_available(
        &mut self,
        query: &RoomAvailabilityQuery,
        guest_id: GuestId,
        terms: ReservationTerms,
        candidate: Option<RoomId>,
    ) -> Result<Reservation, ServiceError> {
        let found = self.search_rooms(query).await?;
        let room = match candidate {
            Some(id) => found.into_iter().find(|room| room.id() == id),
            None => found.into_iter().next(),
        }
        .ok_or(ServiceError::Unavailable)?;
        self.create_reservation(NewReservation {
            room_id: room.id(),
            guest_id,
            time: query.time.clone(),
            terms,
            status: ReservationStatus::Draft,
        })
        .await
    }

    /// 検索結果のうち指定された宴会場、または先頭の宴会場に仮予約を作成する
    pub async fn book_first_available(
        &mut self,
        query: &HallAvailabilityQuery,
        customer_id: GuestId,
        package_id: Option<EventPackageId>,
        candidate: Option<HallId>,
    ) -> Result<EventBooking, ServiceError> {
        let found = self.search_halls(query).await?;
        let hall = match candidate {
            Some(id) => found.into_iter().find(|hall| hall.id() == id),
            None => found.into_iter().next(),
        }
        .ok_or(ServiceError::Unavailable)?;
        self.create_event_booking(NewEventBooking {
            hall_id: hall.id(),
            customer_id,
            start: query.start,
            duration: query.duration,
            package_id,
            deposit: None,
            total: None,
        })
        .await
    }

    // ---- housekeeping ----

    pub async fn create_housekeeping_task(
        &mut self,
        task: NewHousekeepingTask,
    ) -> Result<HousekeepingTask, ServiceError> {
        self.room(task.room_id).await?;
        if let Some(id) = task.reservation_id {
            self.reservation(id).await?;
        }
        let mut entity = HousekeepingTask::create(
            self.id_generator.generate(),
            task.room_id,
            task.task_type,
            task.scheduled,
            task.description,
            task.reservation_id,
        );
        self.save_housekeeping_task(&mut entity).await?;
        Ok(entity)
    }

    pub async fn assign_housekeeping_task(
        &mut self,
        id: HousekeepingTaskId,
        assignee: Option<StaffId>,
    ) -> Result<HousekeepingTask, ServiceError> {
        let mut task = self.housekeeping_task(id).await?;
        task.assign(assignee)?;
        self.save_housekeeping_task(&mut task).await?;
        Ok(task)
    }

    pub async fn change_housekeeping_status(
        &mut self,
        id: HousekeepingTaskId,
        status: HousekeepingTaskStatus,
    ) -> Result<HousekeepingTask, ServiceError> {
        let mut task = self.housekeeping_task(id).await?;
        if task.change_status(status)? {
            self.save_housekeeping_task(&mut task).await?;
            info!("清掃作業 {} の状態を {:?} に変更しました", id, status);
        }
        Ok(task)
    }

    /// 清掃作業の客室に修理作業を登録する
    pub async fn report_maintenance(
        &mut self,
        id: HousekeepingTaskId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceTask, ServiceError> {
        let task = self.housekeeping_task(id).await?;
        let description = description
            .filter(|d| !d.trim().is_empty())
            .or_else(|| Some(task.description().to_owned()).filter(|d| !d.trim().is_empty()))
            .unwrap_or_else(|| format!("Issue reported from housekeeping task {}", id));
        let report = MaintenanceReport {
            task_type: MaintenanceTaskType::Repair,
            source: MaintenanceSource::Housekeeping,
            scheduled: Some(now),
            description,
            housekeeping_task_id: Some(id),
            ..MaintenanceReport::new(HOUSEKEEPING_REPORT.to_owned(), task.room_id(), now)
        };
        self.create_maintenance_task(report).await
    }

    pub async fn housekeeping_task(
        &self,
        id: HousekeepingTaskId,
    ) -> Result<HousekeepingTask, ServiceError> {
        self.housekeeping
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<HousekeepingTask>(id))
    }

    // ---- maintenance ----

    pub async fn create_maintenance_task(
        &mut self,
        report: MaintenanceReport,
    ) -> Result<MaintenanceTask, ServiceError> {
        self.room(report.room_id).await?;
        if let Some(id) = report.housekeeping_task_id {
            self.housekeeping_task(id).await?;
        }
        let mut task = MaintenanceTask::report(self.id_generator.generate(), report)?;
        self.save_maintenance_task(&mut task).await?;
        info!(
            "メンテナンス作業を登録しました: {} (客室 {})",
            task.name(),
            task.room_id()
        );
        Ok(task)
    }

    pub async fn assign_maintenance_task(
        &mut self,
        id: MaintenanceTaskId,
        assignee: Option<StaffId>,
    ) -> Result<MaintenanceTask, ServiceError> {
        let mut task = self.maintenance_task(id).await?;
        task.assign(assignee)?;
        self.save_maintenance_task(&mut task).await?;
        Ok(task)
    }

    pub async fn schedule_maintenance_task(
        &mut self,
        id: MaintenanceTaskId,
        scheduled: Option<DateTime<Utc>>,
    ) -> Result<MaintenanceTask, ServiceError> {
        let mut task = self.maintenance_task(id).await?;
        task.schedule(scheduled)?;
        self.save_maintenance_task(&mut task).await?;
        Ok(task)
    }

    pub async fn change_maintenance_priority(
        &mut self,
        id: MaintenanceTaskId,
        priority: Priority,
    ) -> Result<MaintenanceTask, ServiceError> {
        let mut task = self.maintenance_task(id).await?;
        task.change_priority(priority);
        self.save_maintenance_task(&mut task).await?;
        Ok(task)
    }

    pub async fn change_maintenance_status(
        &mut self,
        id: MaintenanceTaskId,
        status: MaintenanceTaskStatus,
    ) -> Result<MaintenanceTask, ServiceError> {
        let mut task = self.maintenance_task(id).await?;
        if task.change_status(status)? {
            self.save_maintenance_task(&mut task).await?;
            info!("メンテナンス作業 {} の状態を {:?} に変更しました", id, status);
        }
        Ok(task)
    }

    pub async fn maintenance_task(
        &self,
        id: MaintenanceTaskId,
    ) -> Result<MaintenanceTask, ServiceError> {
        self.maintenance
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found::<MaintenanceTask>(id))
    }

    /// 支店の未完了メンテナンス作業を作業順に返す
    pub async fn maintenance_queue(
        &self,
        branch_id: BranchId,
    ) -> Result<Vec<MaintenanceTask>, ServiceError> {
        let rooms = self
            .rooms
            .find_by_branch(branch_id)
            .await?
            .into_iter()
            .map(|room| room.id())
            .collect::<HashSet<_>>();
        let mut tasks = self
            .maintenance
            .find_open()
            .await?
            .into_iter()
            .filter(|task| rooms.contains(&task.room_id()))
            .collect::<Vec<_>>();
        tasks.sort_by(MaintenanceTask::queue_order);
        Ok(tasks)
    }

    /// 点検間隔を過ぎた客室に定期点検を登録する
    pub async fn generate_periodic_inspections(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceTask>, ServiceError> {
        let cutoff = now - self.inspection_interval;
        let mut created = Vec::new();
        for room in self.rooms.find_all().await? {
            let inspections = self
                .maintenance
                .find_by_room(room.id())
                .await?
                .into_iter()
                .filter(|task| task.task_type() == MaintenanceTaskType::Inspection)
                .collect::<Vec<_>>();
            if inspections.iter().any(|task| task.is_open()) {
                continue;
            }
            let last = inspections.iter().map(|task| task.planned_at()).max();
            if last.map_or(false, |when| when > cutoff) {
                continue;
            }
            let report = MaintenanceReport {
                task_type: MaintenanceTaskType::Inspection,
                source: MaintenanceSource::Inspection,
                scheduled: Some(now + Duration::days(1)),
                duration: Duration::hours(1),
                ..MaintenanceReport::new(PERIODIC_INSPECTION.to_owned(), room.id(), now)
            };
            let mut task = MaintenanceTask::report(self.id_generator.generate(), report)?;
            self.save_maintenance_task(&mut task).await?;
            created.push(task);
        }
        if !created.is_empty() {
            info!("定期点検を {} 件登録しました", created.len());
        }
        Ok(created)
    }

    // ---- invoicing ----

    pub async fn invoice_reservation(&mut self, id: ReservationId) -> Result<InvoiceId, ServiceError> {
        let mut reservation = self.reservation(id).await?;
        let room = self.room(reservation.room_id()).await?;
        let room_type = match room.room_type_id() {
            Some(id) => Some(self.room_type(id).await?),
            None => None,
        };
        let draft = InvoiceDraft::for_reservation(&reservation, &room, room_type.as_ref())?;
        let invoice_id = self.accounting.create_invoice(&draft).await?;
        reservation.attach_invoice(invoice_id)?;
        self.save_reservation(&mut reservation).await?;
        info!("予約 {} の請求書を作成しました: {}", id, invoice_id);
        Ok(invoice_id)
    }

    pub async fn invoice_event_booking(
        &mut self,
        id: EventBookingId,
    ) -> Result<InvoiceId, ServiceError> {
        let mut booking = self.event_booking(id).await?;
        let hall = self.hall(booking.hall_id()).await?;
        let hall_type = self.catalog.find_hall_type(hall.hall_type_id()).await?;
        let package = match booking.package_id() {
            Some(id) => Some(self.package(id).await?),
            None => None,
        };
        let draft =
            InvoiceDraft::for_event_booking(&booking, &hall, hall_type.as_ref(), package.as_ref())?;
        let invoice_id = self.accounting.create_invoice(&draft).await?;
        booking.attach_invoice(invoice_id)?;
        self.event_bookings.save(&mut booking).await?;
        info!("宴会場予約 {} の請求書を作成しました: {}", id, invoice_id);
        Ok(invoice_id)
    }

    pub async fn post_invoice(&mut self, id: InvoiceId) -> Result<(), ServiceError> {
        self.accounting.post_invoice(id).await?;
        info!("請求書を転記しました: {}", id);
        Ok(())
    }

    // ---- helpers ----

    async fn room_type(&self, id: RoomTypeId) -> Result<RoomType, ServiceError> {
        self.catalog
            .find_room_type(id)
            .await?
            .ok_or_else(|| not_found::<RoomType>(id))
    }

    async fn hall_type(&self, id: HallTypeId) -> Result<HallType, ServiceError> {
        self.catalog
            .find_hall_type(id)
            .await?
            .ok_or_else(|| not_found::<HallType>(id))
    }

    async fn package(&self, id: EventPackageId) -> Result<EventPackage, ServiceError> {
        self.catalog
            .find_package(id)
            .await?
            .ok_or_else(|| not_found::<EventPackage>(id))
    }

    async fn check_amenities(&self, amenities: &BTreeSet<AmenityId>) -> Result<(), ServiceError> {
        for id in amenities {
            if self.catalog.find_amenity(*id).await?.is_none() {
                return Err(not_found::<Amenity>(*id));
            }
        }
        Ok(())
    }

    async fn check_room_free(
        &self,
        room_id: RoomId,
        time: &Range<DateTime<Utc>>,
        exclude: Option<ReservationId>,
    ) -> Result<(), ServiceError> {
        let conflict = self
            .reservations
            .find_active_overlapping(time)
            .await?
            .into_iter()
            .find(|r| {
                r.room_id() == room_id && Some(r.id()) != exclude && overlaps(r.time(), time)
            });
        match conflict {
            Some(r) => Err(ServiceError::Overlap {
                entity: Reservation::ENTITY_NAME,
                id: r.id().to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn check_hall_free(
        &self,
        hall_id: HallId,
        time: &Range<DateTime<Utc>>,
        exclude: Option<EventBookingId>,
    ) -> Result<(), ServiceError> {
        let bookings = self.event_bookings.find_active_by_hall(hall_id).await?;
        let occupancy = Occupancy::new(
            bookings
                .iter()
                .filter(|b| b.is_active() && Some(b.id()) != exclude)
                .map(|b| (b.time(), b.id())),
        );
        let conflict = occupancy.conflicts(time).next().copied();
        match conflict {
            Some(id) => Err(ServiceError::Overlap {
                entity: EventBooking::ENTITY_NAME,
                id: id.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn save_reservation(&mut self, entity: &mut Reservation) -> Result<(), ServiceError> {
        let events = entity
            .iter()
            .cloned()
            .map(CoreEvent::ReservationEvent)
            .collect::<Vec<_>>();
        self.reservations.save(entity).await?;
        self.propagate(events).await;
        Ok(())
    }

    async fn save_housekeeping_task(
        &mut self,
        entity: &mut HousekeepingTask,
    ) -> Result<(), ServiceError> {
        let events = entity
            .iter()
            .cloned()
            .map(CoreEvent::HousekeepingTaskEvent)
            .collect::<Vec<_>>();
        self.housekeeping.save(entity).await?;
        self.propagate(events).await;
        Ok(())
    }

    async fn save_maintenance_task(
        &mut self,
        entity: &mut MaintenanceTask,
    ) -> Result<(), ServiceError> {
        let events = entity
            .iter()
            .cloned()
            .map(CoreEvent::MaintenanceTaskEvent)
            .collect::<Vec<_>>();
        self.maintenance.save(entity).await?;
        self.propagate(events).await;
        Ok(())
    }

    async fn propagate(&mut self, events: Vec<CoreEvent>) {
        for event in events {
            debug!("連携処理を実行: {:?}", event);
            if let Err(e) = self.execute(event).await {
                warn!("連携処理に失敗しました: {}", e);
            }
        }
    }

    /// 客室の状態を書き込む。連携処理はここで止まる
    async fn set_room_status(
        &mut self,
        room_id: RoomId,
        status: RoomStatus,
    ) -> Result<(), ServiceError> {
        let mut room = self.room(room_id).await?;
        if room.change_status(status) {
            self.rooms.save(&mut room).await?;
            info!("客室 {} の状態を {:?} に変更しました", room.name(), status);
        }
        Ok(())
    }

    async fn ensure_cleaning_task(
        &mut self,
        room_id: RoomId,
        reservation_id: ReservationId,
    ) -> Result<(), ServiceError> {
        let open = self.housekeeping.find_open_by_room(room_id).await?;
        if open
            .iter()
            .any(|task| task.task_type() == HousekeepingTaskType::Cleaning)
        {
            debug!("客室 {} には未完了の清掃作業があります", room_id);
            return Ok(());
        }
        let mut task = HousekeepingTask::create(
            self.id_generator.generate(),
            room_id,
            HousekeepingTaskType::Cleaning,
            None,
            "Cleaning after check-out".to_owned(),
            Some(reservation_id),
        );
        self.housekeeping.save(&mut task).await?;
        info!("客室 {} の清掃作業を登録しました", room_id);
        Ok(())
    }

    async fn has_open_maintenance(&self, room_id: RoomId) -> Result<bool, ServiceError> {
        Ok(self
            .maintenance
            .find_by_room(room_id)
            .await?
            .iter()
            .any(|task| task.is_open()))
    }
}

fn not_found<E: Entity>(id: E::Id) -> ServiceError {
    ServiceError::NotFound {
        entity: E::ENTITY_NAME,
        id: id.to_string(),
    }
}

/// 保存されたイベントの連携処理を実行する
#[async_trait]
pub trait Execute<E> {
    type Error: StdError;
    async fn execute(&mut self, event: E) -> Result<(), Self::Error>;
}

#[async_trait]
impl Execute<CoreEvent> for HotelService {
    type Error = ServiceError;
    async fn execute(&mut self, event: CoreEvent) -> Result<(), Self::Error> {
        match event {
            CoreEvent::ReservationEvent(event) => self.execute(event).await,
            CoreEvent::HousekeepingTaskEvent(event) => self.execute(event).await,
            CoreEvent::MaintenanceTaskEvent(event) => self.execute(event).await,
        }
    }
}

#[async_trait]
impl Execute<ReservationEvent> for HotelService {
    type Error = ServiceError;
    async fn execute(&mut self, event: ReservationEvent) -> Result<(), Self::Error> {
        let (id, room_id, status) = match event {
            ReservationEvent::ReservationCreated {
                id,
                room_id,
                status,
                ..
            } => (id, room_id, status),
            ReservationEvent::ReservationStatusChanged { id, status } => {
                (id, self.reservation(id).await?.room_id(), status)
            }
            _ => return Ok(()),
        };
        match status {
            ReservationStatus::Confirmed | ReservationStatus::CheckedIn => {
                self.set_room_status(room_id, RoomStatus::Occupied).await
            }
            ReservationStatus::Cancelled => {
                self.set_room_status(room_id, RoomStatus::Available).await
            }
            ReservationStatus::CheckedOut => {
                self.set_room_status(room_id, RoomStatus::Dirty).await?;
                self.ensure_cleaning_task(room_id, id).await
            }
            ReservationStatus::Draft => Ok(()),
        }
    }
}

#[async_trait]
impl Execute<HousekeepingTaskEvent> for HotelService {
    type Error = ServiceError;
    async fn execute(&mut self, event: HousekeepingTaskEvent) -> Result<(), Self::Error> {
        if let HousekeepingTaskEvent::HousekeepingTaskStatusChanged { id, status } = event {
            let room_id = self.housekeeping_task(id).await?.room_id();
            match status {
                HousekeepingTaskStatus::InProgress => {
                    self.set_room_status(room_id, RoomStatus::Cleaning).await?
                }
                HousekeepingTaskStatus::Done => {
                    if !self.has_open_maintenance(room_id).await? {
                        self.set_room_status(room_id, RoomStatus::Available)
                            .await?
                    }
                }
                HousekeepingTaskStatus::Pending => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Execute<MaintenanceTaskEvent> for HotelService {
    type Error = ServiceError;
    async fn execute(&mut self, event: MaintenanceTaskEvent) -> Result<(), Self::Error> {
        if let MaintenanceTaskEvent::MaintenanceTaskStatusChanged { id, status } = event {
            let room_id = self.maintenance_task(id).await?.room_id();
            match status {
                MaintenanceTaskStatus::InProgress => {
                    self.set_room_status(room_id, RoomStatus::Maintenance)
                        .await?
                }
                MaintenanceTaskStatus::Done => {
                    let room = self.room(room_id).await?;
                    let open = self.housekeeping.find_open_by_room(room_id).await?;
                    if room.status() == RoomStatus::Maintenance && open.is_empty() {
                        self.set_room_status(room_id, RoomStatus::Available)
                            .await?
                    }
                }
                MaintenanceTaskStatus::Pending | MaintenanceTaskStatus::Cancelled => {}
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Overlaps with {entity} {id}")]
    Overlap { entity: &'static str, id: String },
    #[error("No matching candidate is available")]
    Unavailable,
    #[error(transparent)]
    Availability(#[from] AvailabilityError),
    #[error(transparent)]
    Branch(#[from] BranchError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Hall(#[from] HallError),
    #[error(transparent)]
    Reservation(#[from] ReservationError),
    #[error(transparent)]
    EventBooking(#[from] EventBookingError),
    #[error(transparent)]
    Housekeeping(#[from] HousekeepingTaskError),
    #[error(transparent)]
    Maintenance(#[from] MaintenanceTaskError),
    #[error(transparent)]
    Invoice(#[from] InvoiceError),
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Overlap { .. }
            | ServiceError::Unavailable
            | ServiceError::Reservation(ReservationError::DuplicateInvoice)
            | ServiceError::EventBooking(EventBookingError::DuplicateInvoice) => {
                ErrorKind::Conflict
            }
            ServiceError::DataAccess(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::core::Currency;
    use crate::infrastructure::{self, MemoryAccounting};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, day, hour, 0, 0).unwrap()
    }

    fn yen(amount: i64) -> Money {
        Money::new(amount, Currency::JPY)
    }

    fn service() -> (HotelService, MemoryAccounting) {
        let accounting = MemoryAccounting::default();
        let service = HotelService::new(
            infrastructure::in_memory(),
            Box::new(accounting.clone()),
            IdGenerator::default(),
            &Maintenance::default(),
        );
        (service, accounting)
    }

    struct Fixture {
        service: HotelService,
        accounting: MemoryAccounting,
        branch: BranchId,
        room: RoomId,
        hall: HallId,
        guest: GuestId,
    }

    async fn fixture() -> Fixture {
        let (mut service, accounting) = service();
        let branch = service
            .open_branch("Kyoto".to_owned(), "Kyoto".to_owned())
            .await
            .unwrap()
            .id();
        let room_type = service
            .create_room_type("Twin".to_owned(), String::new(), 2, Some(yen(10000)))
            .await
            .unwrap()
            .id();
        let room = service
            .register_room(NewRoom {
                branch_id: branch,
                name: "201".to_owned(),
                room_type_id: Some(room_type),
                floor: 2,
                price: None,
                amenities: BTreeSet::new(),
            })
            .await
            .unwrap()
            .id();
        let hall_type = service
            .create_hall_type("Banquet".to_owned(), 200, Some(yen(30000)))
            .await
            .unwrap()
            .id();
        let hall = service
            .register_hall(NewHall {
                branch_id: branch,
                name: "Sakura".to_owned(),
                hall_type_id: hall_type,
                capacity: 150,
                price_per_hour: None,
                amenities: BTreeSet::new(),
            })
            .await
            .unwrap()
            .id();
        let guest = service
            .register_guest(NewGuest {
                name: "Sato".to_owned(),
                phone: String::new(),
                email: String::new(),
                preferences: String::new(),
                vip: false,
                nationality: Some("JP".to_owned()),
            })
            .await
            .unwrap()
            .id();
        Fixture {
            service,
            accounting,
            branch,
            room,
            hall,
            guest,
        }
    }

    fn booking(f: &Fixture, start: DateTime<Utc>, hours: i64) -> NewEventBooking {
        NewEventBooking {
            hall_id: f.hall,
            customer_id: f.guest,
            start,
            duration: Duration::hours(hours),
            package_id: None,
            deposit: None,
            total: None,
        }
    }

    fn stay(f: &Fixture, time: Range<DateTime<Utc>>, status: ReservationStatus) -> NewReservation {
        NewReservation {
            room_id: f.room,
            guest_id: f.guest,
            time,
            terms: ReservationTerms::default(),
            status,
        }
    }

    #[tokio::test]
    async fn test_event_booking_overlap() {
        let mut f = fixture().await;
        let first = f
            .service
            .create_event_booking(booking(&f, at(10, 10), 3))
            .await
            .unwrap();
        let result = f
            .service
            .create_event_booking(booking(&f, at(10, 12), 2))
            .await;
        assert!(matches!(result, Err(ServiceError::Overlap { .. })));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);

        // 連続する予約は境界の時刻のみ共有する
        let second = f
            .service
            .create_event_booking(booking(&f, at(10, 13), 2))
            .await
            .unwrap();

        f.service
            .change_event_booking_status(first.id(), EventBookingStatus::Cancelled)
            .await
            .unwrap();
        f.service
            .create_event_booking(booking(&f, at(10, 11), 2))
            .await
            .unwrap();
        let result = f
            .service
            .reschedule_event_booking(second.id(), at(10, 12), Duration::hours(2))
            .await;
        assert!(matches!(result, Err(ServiceError::Overlap { .. })));
        f.service
            .reschedule_event_booking(second.id(), at(10, 14), Duration::hours(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_hall_checks_overlap() {
        let mut f = fixture().await;
        let hall_type_id = f.service.hall(f.hall).await.unwrap().hall_type_id();
        let other = f
            .service
            .register_hall(NewHall {
                branch_id: f.branch,
                name: "Kiku".to_owned(),
                hall_type_id,
                capacity: 80,
                price_per_hour: None,
                amenities: BTreeSet::new(),
            })
            .await
            .unwrap();
        f.service
            .create_event_booking(booking(&f, at(10, 10), 3))
            .await
            .unwrap();
        let moving = f
            .service
            .create_event_booking(NewEventBooking {
                hall_id: other.id(),
                ..booking(&f, at(10, 12), 2)
            })
            .await
            .unwrap();
        let result = f.service.change_event_booking_hall(moving.id(), f.hall).await;
        assert!(matches!(result, Err(ServiceError::Overlap { .. })));
        assert_eq!(
            f.service.event_booking(moving.id()).await.unwrap().hall_id(),
            other.id()
        );
    }

    #[tokio::test]
    async fn test_event_booking_end_out_of_range() {
        let mut f = fixture().await;
        let result = f
            .service
            .create_event_booking(NewEventBooking {
                duration: Duration::days(100_000_000),
                ..booking(&f, at(10, 10), 1)
            })
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::EventBooking(EventBookingError::InvalidDuration))
        ));
        let created = f
            .service
            .create_event_booking(booking(&f, at(10, 10), 1))
            .await
            .unwrap();
        let result = f
            .service
            .reschedule_event_booking(created.id(), at(10, 10), Duration::days(100_000_000))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::EventBooking(EventBookingError::InvalidDuration))
        ));
        let query = HallAvailabilityQuery::new(f.branch, at(10, 10), Duration::days(100_000_000));
        let result = f.service.search_halls(&query).await;
        assert!(matches!(
            result,
            Err(ServiceError::Availability(AvailabilityError::InvalidRange))
        ));
    }

    #[tokio::test]
    async fn test_reservation_overlap_and_time() {
        let mut f = fixture().await;
        let result = f
            .service
            .create_reservation(stay(&f, at(5, 15)..at(5, 15), ReservationStatus::Draft))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Reservation(ReservationError::InvalidTime))
        ));
        f.service
            .create_reservation(stay(&f, at(5, 15)..at(7, 10), ReservationStatus::Draft))
            .await
            .unwrap();
        let result = f
            .service
            .create_reservation(stay(&f, at(6, 15)..at(8, 10), ReservationStatus::Draft))
            .await;
        assert!(matches!(result, Err(ServiceError::Overlap { .. })));
    }

    #[tokio::test]
    async fn test_reservation_status_cascade() {
        let mut f = fixture().await;
        let reservation = f
            .service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Occupied
        );
        f.service
            .change_reservation_status(reservation.id(), ReservationStatus::CheckedIn)
            .await
            .unwrap();
        f.service
            .change_reservation_status(reservation.id(), ReservationStatus::CheckedOut)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Dirty
        );
        let open = f.service.housekeeping.find_open_by_room(f.room).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].task_type(), HousekeepingTaskType::Cleaning);
        assert_eq!(open[0].reservation_id(), Some(reservation.id()));

        // 同じ状態を再設定しても何も起きない
        f.service
            .change_reservation_status(reservation.id(), ReservationStatus::CheckedOut)
            .await
            .unwrap();
        let open = f.service.housekeeping.find_open_by_room(f.room).await.unwrap();
        assert_eq!(open.len(), 1);

        let task = open[0].id();
        f.service
            .change_housekeeping_status(task, HousekeepingTaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Cleaning
        );
        f.service
            .change_housekeeping_status(task, HousekeepingTaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Available
        );
    }

    #[tokio::test]
    async fn test_cancellation_frees_room() {
        let mut f = fixture().await;
        let reservation = f
            .service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Confirmed))
            .await
            .unwrap();
        f.service
            .change_reservation_status(reservation.id(), ReservationStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Available
        );
        let result = f
            .service
            .change_reservation_status(reservation.id(), ReservationStatus::Confirmed)
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        f.service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Draft))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_housekeeping_done_waits_for_maintenance() {
        let mut f = fixture().await;
        let task = f
            .service
            .create_housekeeping_task(NewHousekeepingTask {
                room_id: f.room,
                task_type: HousekeepingTaskType::Cleaning,
                scheduled: None,
                description: "Broken lamp".to_owned(),
                reservation_id: None,
            })
            .await
            .unwrap();
        let repair = f
            .service
            .report_maintenance(task.id(), None, at(1, 9))
            .await
            .unwrap();
        assert_eq!(repair.task_type(), MaintenanceTaskType::Repair);
        assert_eq!(repair.source(), MaintenanceSource::Housekeeping);
        assert_eq!(repair.description(), "Broken lamp");
        assert_eq!(repair.housekeeping_task_id(), Some(task.id()));

        f.service
            .change_housekeeping_status(task.id(), HousekeepingTaskStatus::InProgress)
            .await
            .unwrap();
        f.service
            .change_housekeeping_status(task.id(), HousekeepingTaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Cleaning
        );

        f.service
            .change_maintenance_status(repair.id(), MaintenanceTaskStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Maintenance
        );
        f.service
            .change_maintenance_status(repair.id(), MaintenanceTaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Available
        );
    }

    #[tokio::test]
    async fn test_maintenance_done_keeps_room_with_open_housekeeping() {
        let mut f = fixture().await;
        f.service
            .create_housekeeping_task(NewHousekeepingTask {
                room_id: f.room,
                task_type: HousekeepingTaskType::Cleaning,
                scheduled: None,
                description: String::new(),
                reservation_id: None,
            })
            .await
            .unwrap();
        let repair = f
            .service
            .create_maintenance_task(MaintenanceReport {
                task_type: MaintenanceTaskType::Repair,
                ..MaintenanceReport::new("Leaking tap".to_owned(), f.room, at(1, 9))
            })
            .await
            .unwrap();
        f.service
            .change_maintenance_status(repair.id(), MaintenanceTaskStatus::InProgress)
            .await
            .unwrap();
        f.service
            .change_maintenance_status(repair.id(), MaintenanceTaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Maintenance
        );
    }

    #[tokio::test]
    async fn test_maintenance_done_leaves_other_room_status() {
        let mut f = fixture().await;
        f.service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Confirmed))
            .await
            .unwrap();
        let inspection = f
            .service
            .create_maintenance_task(MaintenanceReport::new(
                "Smoke detector".to_owned(),
                f.room,
                at(2, 9),
            ))
            .await
            .unwrap();
        f.service
            .change_maintenance_status(inspection.id(), MaintenanceTaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Occupied
        );
    }

    #[tokio::test]
    async fn test_check_out_keeps_existing_cleaning_task() {
        let mut f = fixture().await;
        let cleaning = f
            .service
            .create_housekeeping_task(NewHousekeepingTask {
                room_id: f.room,
                task_type: HousekeepingTaskType::Cleaning,
                scheduled: None,
                description: "Deep clean".to_owned(),
                reservation_id: None,
            })
            .await
            .unwrap();
        let reservation = f
            .service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Confirmed))
            .await
            .unwrap();
        for status in [ReservationStatus::CheckedIn, ReservationStatus::CheckedOut] {
            f.service
                .change_reservation_status(reservation.id(), status)
                .await
                .unwrap();
        }
        let open = f.service.housekeeping.find_open_by_room(f.room).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id(), cleaning.id());
        assert_eq!(
            f.service.room(f.room).await.unwrap().status(),
            RoomStatus::Dirty
        );
    }

    #[tokio::test]
    async fn test_report_maintenance_default_description() {
        let mut f = fixture().await;
        let task = f
            .service
            .create_housekeeping_task(NewHousekeepingTask {
                room_id: f.room,
                task_type: HousekeepingTaskType::Inspection,
                scheduled: None,
                description: String::new(),
                reservation_id: None,
            })
            .await
            .unwrap();
        let repair = f
            .service
            .report_maintenance(task.id(), None, at(1, 9))
            .await
            .unwrap();
        assert_eq!(
            repair.description(),
            format!("Issue reported from housekeeping task {}", task.id())
        );
        assert_eq!(repair.scheduled(), Some(at(1, 9)));
    }

    #[tokio::test]
    async fn test_search_rooms_excludes_overlaps() {
        let mut f = fixture().await;
        let other = f
            .service
            .register_room(NewRoom {
                branch_id: f.branch,
                name: "101".to_owned(),
                room_type_id: None,
                floor: 1,
                price: Some(yen(8000)),
                amenities: BTreeSet::new(),
            })
            .await
            .unwrap();
        f.service
            .create_reservation(stay(&f, at(1, 15)..at(3, 10), ReservationStatus::Draft))
            .await
            .unwrap();
        let query = RoomAvailabilityQuery::new(f.branch, at(2, 15)..at(4, 10));
        let found = f.service.search_rooms(&query).await.unwrap();
        assert_eq!(
            found.iter().map(|r| r.id()).collect::<Vec<_>>(),
            vec![other.id()]
        );

        let query = RoomAvailabilityQuery::new(f.branch, at(3, 10)..at(4, 10));
        let found = f.service.search_rooms(&query).await.unwrap();
        assert_eq!(found.len(), 2);

        let query = RoomAvailabilityQuery::new(f.branch, at(4, 10)..at(3, 10));
        let result = f.service.search_rooms(&query).await;
        assert!(matches!(
            result,
            Err(ServiceError::Availability(AvailabilityError::InvalidRange))
        ));
    }

    #[tokio::test]
    async fn test_search_halls_ignores_cancelled_bookings() {
        let mut f = fixture().await;
        let created = f
            .service
            .create_event_booking(booking(&f, at(3, 18), 3))
            .await
            .unwrap();
        let query = HallAvailabilityQuery::new(f.branch, at(3, 19), Duration::hours(1));
        assert!(f.service.search_halls(&query).await.unwrap().is_empty());
        f.service
            .change_event_booking_status(created.id(), EventBookingStatus::Cancelled)
            .await
            .unwrap();
        let found = f.service.search_halls(&query).await.unwrap();
        assert_eq!(
            found.iter().map(|h| h.id()).collect::<Vec<_>>(),
            vec![f.hall]
        );
    }

    #[tokio::test]
    async fn test_reserve_and_book_first_available() {
        let mut f = fixture().await;
        let query = RoomAvailabilityQuery::new(f.branch, at(1, 15)..at(2, 10));
        let reservation = f
            .service
            .reserve_first_available(&query, f.guest, ReservationTerms::default(), None)
            .await
            .unwrap();
        assert_eq!(reservation.room_id(), f.room);
        assert_eq!(reservation.status(), ReservationStatus::Draft);
        let result = f
            .service
            .reserve_first_available(&query, f.guest, ReservationTerms::default(), None)
            .await;
        assert!(matches!(result, Err(ServiceError::Unavailable)));

        let query = HallAvailabilityQuery::new(f.branch, at(1, 18), Duration::hours(3));
        let booking = f
            .service
            .book_first_available(&query, f.guest, None, Some(f.hall))
            .await
            .unwrap();
        assert_eq!(booking.hall_id(), f.hall);
        assert!(f.service.search_halls(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoicing() {
        let mut f = fixture().await;
        let reservation = f
            .service
            .create_reservation(stay(&f, at(1, 15)..at(4, 10), ReservationStatus::Draft))
            .await
            .unwrap();
        let result = f.service.invoice_reservation(reservation.id()).await;
        assert!(matches!(
            result,
            Err(ServiceError::Invoice(InvoiceError::NotInvoiceable))
        ));
        f.service
            .change_reservation_status(reservation.id(), ReservationStatus::Confirmed)
            .await
            .unwrap();
        let invoice = f.service.invoice_reservation(reservation.id()).await.unwrap();
        let entry = f.accounting.entry(invoice).await.unwrap();
        assert_eq!(entry.draft.total(), &yen(30000));
        assert!(!entry.posted);
        assert_eq!(
            f.service
                .reservation(reservation.id())
                .await
                .unwrap()
                .invoice_ids(),
            &[invoice]
        );
        f.service.post_invoice(invoice).await.unwrap();
        assert!(f.accounting.entry(invoice).await.unwrap().posted);

        let mut booking = f
            .service
            .create_event_booking(booking(&f, at(9, 10), 2))
            .await
            .unwrap();
        booking = f
            .service
            .change_event_booking_status(booking.id(), EventBookingStatus::Confirmed)
            .await
            .unwrap();
        let invoice = f.service.invoice_event_booking(booking.id()).await.unwrap();
        // 宴会場に料金がないので宴会場タイプの料金を使う
        let entry = f.accounting.entry(invoice).await.unwrap();
        assert_eq!(entry.draft.total(), &yen(60000));
    }

    #[tokio::test]
    async fn test_periodic_inspections() {
        let mut f = fixture().await;
        let now = at(20, 3);
        let created = f.service.generate_periodic_inspections(now).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name(), PERIODIC_INSPECTION);
        assert_eq!(created[0].scheduled(), Some(now + Duration::days(1)));
        assert_eq!(created[0].source(), MaintenanceSource::Inspection);

        // 未完了の点検があれば登録しない
        let created = f.service.generate_periodic_inspections(now).await.unwrap();
        assert!(created.is_empty());

        let task = f
            .service
            .maintenance_queue(f.branch)
            .await
            .unwrap()
            .remove(0);
        f.service
            .change_maintenance_status(task.id(), MaintenanceTaskStatus::Done)
            .await
            .unwrap();
        let created = f
            .service
            .generate_periodic_inspections(now + Duration::days(10))
            .await
            .unwrap();
        assert!(created.is_empty());
        let created = f
            .service
            .generate_periodic_inspections(now + Duration::days(31))
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_queue_order() {
        let mut f = fixture().await;
        let report = |name: &str, priority, scheduled| MaintenanceReport {
            priority,
            scheduled,
            ..MaintenanceReport::new(name.to_owned(), f.room, at(1, 9))
        };
        let low = report("low", Priority::Low, Some(at(2, 9)));
        let urgent = report("urgent", Priority::Urgent, None);
        let later = report("later", Priority::Normal, Some(at(5, 9)));
        let sooner = report("sooner", Priority::Normal, Some(at(3, 9)));
        for report in [low, urgent, later, sooner] {
            f.service.create_maintenance_task(report).await.unwrap();
        }
        let names = f
            .service
            .maintenance_queue(f.branch)
            .await
            .unwrap()
            .iter()
            .map(|t| t.name().to_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["urgent", "sooner", "later", "low"]);
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let mut f = fixture().await;
        let result = f
            .service
            .create_reservation(NewReservation {
                guest_id: 999.into(),
                ..stay(&f, at(1, 15)..at(2, 10), ReservationStatus::Draft)
            })
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        let result = f
            .service
            .change_event_booking_hall(12345.into(), f.hall)
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }
}
