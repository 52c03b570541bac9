pub mod components;
pub mod live;
