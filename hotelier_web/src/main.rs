use std::{
    collections::BTreeSet, error::Error, net::SocketAddr, sync::Arc,
    time::Duration as StdDuration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use chrono::{DateTime, Duration, Utc};
use hotelier::{
    application::{
        ErrorKind, HotelService, NewEventBooking, NewGuest, NewHall, NewHousekeepingTask,
        NewReservation, NewRoom, ServiceError,
    },
    domain::{
        core::{
            Amenity, AmenityId, Branch, BranchId, EventBooking, EventBookingId, EventBookingStatus,
            EventPackage, EventPackageId, Guest, GuestId, Hall, HallAvailabilityQuery, HallId,
            HallType, HousekeepingTask, HousekeepingTaskId, HousekeepingTaskStatus, InvoiceId,
            MaintenanceReport, MaintenanceTask, MaintenanceTaskId, MaintenanceTaskStatus, Money,
            PaymentStatus, Priority, Reservation, ReservationId, ReservationStatus,
            ReservationTerms, Room, RoomAvailabilityQuery, RoomId, RoomStatus, RoomType, StaffId,
        },
        IdGenerator,
    },
    infrastructure::{self, MemoryAccounting},
    HotelierConfig,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, Level};

type AppState = Arc<Mutex<HotelService>>;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[tokio::main]
async fn main() {
    match HotelierConfig::load() {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = serve(&config).await {
                error!("アプリケーションエラー: {}", error);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("アプリケーションエラー: {}", error)
        }
    }
}

async fn serve(config: &HotelierConfig) -> Result<(), Box<dyn Error>> {
    let service = HotelService::new(
        infrastructure::in_memory(),
        Box::new(MemoryAccounting::default()),
        IdGenerator::default(),
        &config.maintenance,
    );
    let state = Arc::new(Mutex::new(service));
    spawn_inspection_sweep(
        state.clone(),
        StdDuration::from_secs(config.maintenance.sweep_period_secs),
    );
    let app = router(state);
    let addr = config.web.address.parse::<SocketAddr>()?;
    match &config.web.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
            info!("HTTPS で待ち受けます: {}", addr);
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("HTTP で待ち受けます: {}", addr);
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }
    Ok(())
}

fn spawn_inspection_sweep(state: AppState, period: StdDuration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let mut service = state.lock().await;
            if let Err(e) = service.generate_periodic_inspections(Utc::now()).await {
                error!("定期点検の登録に失敗しました: {}", e);
            }
        }
    });
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/branches", get(list_branches).post(open_branch))
        .route("/branches/:id", get(find_branch))
        .route("/branches/:id/name", put(rename_branch))
        .route("/branches/:id/close", post(close_branch))
        .route("/branches/:id/rooms", get(list_rooms))
        .route("/branches/:id/halls", get(list_halls))
        .route("/branches/:id/maintenance-queue", get(maintenance_queue))
        .route("/room-types", post(create_room_type))
        .route("/amenities", post(create_amenity))
        .route("/hall-types", post(create_hall_type))
        .route("/packages", post(create_package))
        .route("/guests", post(register_guest))
        .route("/guests/:id", get(find_guest))
        .route("/rooms", post(register_room))
        .route("/rooms/:id", get(find_room))
        .route("/rooms/:id/status", put(change_room_status))
        .route("/rooms/:id/price", put(change_room_price))
        .route("/rooms/:id/amenities", put(change_room_amenities))
        .route("/rooms/:id/reservations", get(list_room_reservations))
        .route("/halls", post(register_hall))
        .route("/halls/:id", get(find_hall))
        .route("/halls/:id/price", put(change_hall_price))
        .route("/halls/:id/capacity", put(change_hall_capacity))
        .route("/search/rooms", post(search_rooms))
        .route("/search/rooms/reserve", post(reserve_first_available))
        .route("/search/halls", post(search_halls))
        .route("/search/halls/book", post(book_first_available))
        .route("/reservations", post(create_reservation))
        .route("/reservations/:id", get(find_reservation))
        .route("/reservations/:id/time", put(reschedule_reservation))
        .route("/reservations/:id/status", put(change_reservation_status))
        .route("/reservations/:id/payment", put(change_payment_status))
        .route("/reservations/:id/invoice", post(invoice_reservation))
        .route("/event-bookings", post(create_event_booking))
        .route("/event-bookings/:id", get(find_event_booking))
        .route("/event-bookings/:id/time", put(reschedule_event_booking))
        .route("/event-bookings/:id/hall", put(change_event_booking_hall))
        .route("/event-bookings/:id/status", put(change_event_booking_status))
        .route("/event-bookings/:id/invoice", post(invoice_event_booking))
        .route("/invoices/:id/post", post(post_invoice))
        .route("/housekeeping-tasks", post(create_housekeeping_task))
        .route("/housekeeping-tasks/:id", get(find_housekeeping_task))
        .route("/housekeeping-tasks/:id/assignee", put(assign_housekeeping_task))
        .route("/housekeeping-tasks/:id/status", put(change_housekeeping_status))
        .route("/housekeeping-tasks/:id/report", post(report_maintenance))
        .route("/maintenance-tasks", post(create_maintenance_task))
        .route("/maintenance-tasks/:id", get(find_maintenance_task))
        .route("/maintenance-tasks/:id/assignee", put(assign_maintenance_task))
        .route("/maintenance-tasks/:id/schedule", put(schedule_maintenance_task))
        .route("/maintenance-tasks/:id/priority", put(change_maintenance_priority))
        .route("/maintenance-tasks/:id/status", put(change_maintenance_status))
        .with_state(state)
}

/// サービスエラーをHTTPレスポンスに変換する
struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value)
    }
}

fn status_code(error: &ServiceError) -> StatusCode {
    match error.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(&self.0);
        if status.is_server_error() {
            error!("リクエスト処理エラー: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
struct StatusBody<S> {
    status: S,
}

#[derive(Deserialize)]
struct NewBranch {
    name: String,
    #[serde(default)]
    location: String,
}

#[derive(Deserialize)]
struct NewRoomType {
    name: String,
    #[serde(default)]
    description: String,
    capacity: u32,
    #[serde(default)]
    default_price: Option<Money>,
}

#[derive(Deserialize)]
struct NewAmenity {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct NewHallType {
    name: String,
    capacity: u32,
    #[serde(default)]
    price_per_hour: Option<Money>,
}

#[derive(Deserialize)]
struct NewPackage {
    name: String,
    #[serde(default)]
    description: String,
    price: Money,
    #[serde(default)]
    services: Vec<String>,
}

#[derive(Deserialize)]
struct ReserveRequest {
    query: RoomAvailabilityQuery,
    guest_id: GuestId,
    #[serde(default)]
    terms: ReservationTerms,
    #[serde(default)]
    room_id: Option<RoomId>,
}

#[derive(Deserialize)]
struct BookRequest {
    query: HallAvailabilityQuery,
    customer_id: GuestId,
    #[serde(default)]
    package_id: Option<EventPackageId>,
    #[serde(default)]
    hall_id: Option<HallId>,
}

#[derive(Deserialize)]
struct TimeBody {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct EventTimeBody {
    start: DateTime<Utc>,
    /// 秒
    duration: i64,
}

#[derive(Deserialize)]
struct HallBody {
    hall_id: HallId,
}

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Deserialize)]
struct PriceBody {
    #[serde(default)]
    price: Option<Money>,
}

#[derive(Deserialize)]
struct AmenitiesBody {
    amenities: BTreeSet<AmenityId>,
}

#[derive(Deserialize)]
struct CapacityBody {
    capacity: u32,
}

#[derive(Deserialize)]
struct AssigneeBody {
    #[serde(default)]
    assignee: Option<StaffId>,
}

#[derive(Deserialize)]
struct ScheduleBody {
    #[serde(default)]
    scheduled: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PriorityBody {
    priority: Priority,
}

#[derive(Deserialize)]
struct ReportBody {
    #[serde(default)]
    description: Option<String>,
}

async fn list_branches(State(state): State<AppState>) -> ApiResult<Vec<Branch>> {
    Ok(Json(state.lock().await.branches().await?))
}

async fn open_branch(
    State(state): State<AppState>,
    Json(body): Json<NewBranch>,
) -> ApiResult<Branch> {
    let mut service = state.lock().await;
    Ok(Json(service.open_branch(body.name, body.location).await?))
}

async fn find_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> ApiResult<Branch> {
    Ok(Json(state.lock().await.branch(id).await?))
}

async fn rename_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    Json(body): Json<NameBody>,
) -> ApiResult<Branch> {
    Ok(Json(state.lock().await.rename_branch(id, body.name).await?))
}

async fn close_branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> ApiResult<Branch> {
    Ok(Json(state.lock().await.close_branch(id).await?))
}

async fn list_rooms(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> ApiResult<Vec<Room>> {
    Ok(Json(state.lock().await.rooms(id).await?))
}

async fn list_halls(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> ApiResult<Vec<Hall>> {
    Ok(Json(state.lock().await.halls(id).await?))
}

async fn maintenance_queue(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> ApiResult<Vec<MaintenanceTask>> {
    Ok(Json(state.lock().await.maintenance_queue(id).await?))
}

async fn create_room_type(
    State(state): State<AppState>,
    Json(body): Json<NewRoomType>,
) -> ApiResult<RoomType> {
    let mut service = state.lock().await;
    let room_type = service
        .create_room_type(body.name, body.description, body.capacity, body.default_price)
        .await?;
    Ok(Json(room_type))
}

async fn create_amenity(
    State(state): State<AppState>,
    Json(body): Json<NewAmenity>,
) -> ApiResult<Amenity> {
    let mut service = state.lock().await;
    Ok(Json(service.create_amenity(body.name, body.description).await?))
}

async fn create_hall_type(
    State(state): State<AppState>,
    Json(body): Json<NewHallType>,
) -> ApiResult<HallType> {
    let mut service = state.lock().await;
    let hall_type = service
        .create_hall_type(body.name, body.capacity, body.price_per_hour)
        .await?;
    Ok(Json(hall_type))
}

async fn create_package(
    State(state): State<AppState>,
    Json(body): Json<NewPackage>,
) -> ApiResult<EventPackage> {
    let mut service = state.lock().await;
    let package = service
        .create_event_package(body.name, body.description, body.price, body.services)
        .await?;
    Ok(Json(package))
}

async fn register_guest(
    State(state): State<AppState>,
    Json(body): Json<NewGuest>,
) -> ApiResult<Guest> {
    Ok(Json(state.lock().await.register_guest(body).await?))
}

async fn find_guest(State(state): State<AppState>, Path(id): Path<GuestId>) -> ApiResult<Guest> {
    Ok(Json(state.lock().await.guest(id).await?))
}

async fn register_room(
    State(state): State<AppState>,
    Json(body): Json<NewRoom>,
) -> ApiResult<Room> {
    Ok(Json(state.lock().await.register_room(body).await?))
}

async fn find_room(State(state): State<AppState>, Path(id): Path<RoomId>) -> ApiResult<Room> {
    Ok(Json(state.lock().await.room(id).await?))
}

async fn change_room_status(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    Json(body): Json<StatusBody<RoomStatus>>,
) -> ApiResult<Room> {
    Ok(Json(state.lock().await.change_room_status(id, body.status).await?))
}

async fn change_room_price(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    Json(body): Json<PriceBody>,
) -> ApiResult<Room> {
    Ok(Json(state.lock().await.change_room_price(id, body.price).await?))
}

async fn change_room_amenities(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
    Json(body): Json<AmenitiesBody>,
) -> ApiResult<Room> {
    let mut service = state.lock().await;
    Ok(Json(service.change_room_amenities(id, body.amenities).await?))
}

async fn list_room_reservations(
    State(state): State<AppState>,
    Path(id): Path<RoomId>,
) -> ApiResult<Vec<Reservation>> {
    Ok(Json(state.lock().await.reservations_of_room(id).await?))
}

async fn find_hall(State(state): State<AppState>, Path(id): Path<HallId>) -> ApiResult<Hall> {
    Ok(Json(state.lock().await.hall(id).await?))
}

async fn change_hall_price(
    State(state): State<AppState>,
    Path(id): Path<HallId>,
    Json(body): Json<PriceBody>,
) -> ApiResult<Hall> {
    Ok(Json(state.lock().await.change_hall_price(id, body.price).await?))
}

async fn change_hall_capacity(
    State(state): State<AppState>,
    Path(id): Path<HallId>,
    Json(body): Json<CapacityBody>,
) -> ApiResult<Hall> {
    let mut service = state.lock().await;
    Ok(Json(service.change_hall_capacity(id, body.capacity).await?))
}

async fn register_hall(
    State(state): State<AppState>,
    Json(body): Json<NewHall>,
) -> ApiResult<Hall> {
    Ok(Json(state.lock().await.register_hall(body).await?))
}

async fn search_rooms(
    State(state): State<AppState>,
    Json(query): Json<RoomAvailabilityQuery>,
) -> ApiResult<Vec<Room>> {
    Ok(Json(state.lock().await.search_rooms(&query).await?))
}

async fn reserve_first_available(
    State(state): State<AppState>,
    Json(body): Json<ReserveRequest>,
) -> ApiResult<Reservation> {
    let mut service = state.lock().await;
    let reservation = service
        .reserve_first_available(&body.query, body.guest_id, body.terms, body.room_id)
        .await?;
    Ok(Json(reservation))
}

async fn search_halls(
    State(state): State<AppState>,
    Json(query): Json<HallAvailabilityQuery>,
) -> ApiResult<Vec<Hall>> {
    Ok(Json(state.lock().await.search_halls(&query).await?))
}

async fn book_first_available(
    State(state): State<AppState>,
    Json(body): Json<BookRequest>,
) -> ApiResult<EventBooking> {
    let mut service = state.lock().await;
    let booking = service
        .book_first_available(&body.query, body.customer_id, body.package_id, body.hall_id)
        .await?;
    Ok(Json(booking))
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(body): Json<NewReservation>,
) -> ApiResult<Reservation> {
    Ok(Json(state.lock().await.create_reservation(body).await?))
}

async fn find_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> ApiResult<Reservation> {
    Ok(Json(state.lock().await.reservation(id).await?))
}

async fn reschedule_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
    Json(body): Json<TimeBody>,
) -> ApiResult<Reservation> {
    let mut service = state.lock().await;
    Ok(Json(
        service
            .reschedule_reservation(id, body.start..body.end)
            .await?,
    ))
}

async fn change_reservation_status(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
    Json(body): Json<StatusBody<ReservationStatus>>,
) -> ApiResult<Reservation> {
    let mut service = state.lock().await;
    Ok(Json(service.change_reservation_status(id, body.status).await?))
}

async fn change_payment_status(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
    Json(body): Json<StatusBody<PaymentStatus>>,
) -> ApiResult<Reservation> {
    let mut service = state.lock().await;
    Ok(Json(service.change_payment_status(id, body.status).await?))
}

async fn invoice_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
) -> ApiResult<InvoiceId> {
    Ok(Json(state.lock().await.invoice_reservation(id).await?))
}

async fn create_event_booking(
    State(state): State<AppState>,
    Json(body): Json<NewEventBooking>,
) -> ApiResult<EventBooking> {
    Ok(Json(state.lock().await.create_event_booking(body).await?))
}

async fn find_event_booking(
    State(state): State<AppState>,
    Path(id): Path<EventBookingId>,
) -> ApiResult<EventBooking> {
    Ok(Json(state.lock().await.event_booking(id).await?))
}

async fn reschedule_event_booking(
    State(state): State<AppState>,
    Path(id): Path<EventBookingId>,
    Json(body): Json<EventTimeBody>,
) -> ApiResult<EventBooking> {
    let mut service = state.lock().await;
    let booking = service
        .reschedule_event_booking(id, body.start, Duration::seconds(body.duration))
        .await?;
    Ok(Json(booking))
}

async fn change_event_booking_hall(
    State(state): State<AppState>,
    Path(id): Path<EventBookingId>,
    Json(body): Json<HallBody>,
) -> ApiResult<EventBooking> {
    let mut service = state.lock().await;
    Ok(Json(service.change_event_booking_hall(id, body.hall_id).await?))
}

async fn change_event_booking_status(
    State(state): State<AppState>,
    Path(id): Path<EventBookingId>,
    Json(body): Json<StatusBody<EventBookingStatus>>,
) -> ApiResult<EventBooking> {
    let mut service = state.lock().await;
    Ok(Json(service.change_event_booking_status(id, body.status).await?))
}

async fn invoice_event_booking(
    State(state): State<AppState>,
    Path(id): Path<EventBookingId>,
) -> ApiResult<InvoiceId> {
    Ok(Json(state.lock().await.invoice_event_booking(id).await?))
}

async fn post_invoice(
    State(state): State<AppState>,
    Path(id): Path<InvoiceId>,
) -> Result<StatusCode, ApiError> {
    state.lock().await.post_invoice(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_housekeeping_task(
    State(state): State<AppState>,
    Json(body): Json<NewHousekeepingTask>,
) -> ApiResult<HousekeepingTask> {
    Ok(Json(state.lock().await.create_housekeeping_task(body).await?))
}

async fn find_housekeeping_task(
    State(state): State<AppState>,
    Path(id): Path<HousekeepingTaskId>,
) -> ApiResult<HousekeepingTask> {
    Ok(Json(state.lock().await.housekeeping_task(id).await?))
}

async fn assign_housekeeping_task(
    State(state): State<AppState>,
    Path(id): Path<HousekeepingTaskId>,
    Json(body): Json<AssigneeBody>,
) -> ApiResult<HousekeepingTask> {
    let mut service = state.lock().await;
    Ok(Json(service.assign_housekeeping_task(id, body.assignee).await?))
}

async fn change_housekeeping_status(
    State(state): State<AppState>,
    Path(id): Path<HousekeepingTaskId>,
    Json(body): Json<StatusBody<HousekeepingTaskStatus>>,
) -> ApiResult<HousekeepingTask> {
    let mut service = state.lock().await;
    Ok(Json(service.change_housekeeping_status(id, body.status).await?))
}

async fn report_maintenance(
    State(state): State<AppState>,
    Path(id): Path<HousekeepingTaskId>,
    Json(body): Json<ReportBody>,
) -> ApiResult<MaintenanceTask> {
    let mut service = state.lock().await;
    let task = service
        .report_maintenance(id, body.description, Utc::now())
        .await?;
    Ok(Json(task))
}

async fn create_maintenance_task(
    State(state): State<AppState>,
    Json(body): Json<MaintenanceReport>,
) -> ApiResult<MaintenanceTask> {
    Ok(Json(state.lock().await.create_maintenance_task(body).await?))
}

async fn find_maintenance_task(
    State(state): State<AppState>,
    Path(id): Path<MaintenanceTaskId>,
) -> ApiResult<MaintenanceTask> {
    Ok(Json(state.lock().await.maintenance_task(id).await?))
}

async fn assign_maintenance_task(
    State(state): State<AppState>,
    Path(id): Path<MaintenanceTaskId>,
    Json(body): Json<AssigneeBody>,
) -> ApiResult<MaintenanceTask> {
    let mut service = state.lock().await;
    Ok(Json(service.assign_maintenance_task(id, body.assignee).await?))
}

async fn schedule_maintenance_task(
    State(state): State<AppState>,
    Path(id): Path<MaintenanceTaskId>,
    Json(body): Json<ScheduleBody>,
) -> ApiResult<MaintenanceTask> {
    let mut service = state.lock().await;
    Ok(Json(service.schedule_maintenance_task(id, body.scheduled).await?))
}

async fn change_maintenance_priority(
    State(state): State<AppState>,
    Path(id): Path<MaintenanceTaskId>,
    Json(body): Json<PriorityBody>,
) -> ApiResult<MaintenanceTask> {
    let mut service = state.lock().await;
    Ok(Json(service.change_maintenance_priority(id, body.priority).await?))
}

async fn change_maintenance_status(
    State(state): State<AppState>,
    Path(id): Path<MaintenanceTaskId>,
    Json(body): Json<StatusBody<MaintenanceTaskStatus>>,
) -> ApiResult<MaintenanceTask> {
    let mut service = state.lock().await;
    Ok(Json(service.change_maintenance_status(id, body.status).await?))
}
