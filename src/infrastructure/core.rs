mod branch;
mod event_booking;
mod hall;
mod housekeeping;
mod maintenance;
mod reservation;
mod room;
