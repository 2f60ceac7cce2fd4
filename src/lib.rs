#![allow(async_fn_in_trait)]
pub mod catalog;
pub mod composite;
pub mod download_plan;
pub mod error;
pub mod landsat;
pub mod map_layers;
pub mod scene_selection;
pub mod store;
