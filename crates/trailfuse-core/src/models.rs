pub mod actor;
pub mod cell;
pub mod records;
pub mod table;

pub use actor::{Actor, ActorState, DataPoint, Position};
pub use cell::CellValue;
pub use records::{CodeInterval, CodeRecord, GpsRecord, MovementRecord, SpeechRecord};
pub use table::{RawRow, Table};
