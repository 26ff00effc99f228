pub mod aggregates;
pub mod events;
pub mod shipping;
pub mod value_objects;
