pub mod item;
pub mod outcome;
