//! Bookable interval derivation
//!
//! Pure functions: opening hours in, ordered intervals out. Matching the
//! intervals against persisted slot rows happens in the services layer.

pub mod generator;
pub mod hours;

pub use generator::{generate, tile, Interval, SlotTiling};
pub use hours::{resolve_day, DayHours, OpeningHoursError, WeeklyHours};
