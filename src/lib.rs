pub mod anim;
pub mod cache;
pub mod cell;
pub mod config;
pub mod edge;
pub mod fling;
pub mod gallery;
pub mod gesture;
pub mod layout;
pub mod provider;
pub mod scene;
pub mod transform;
pub mod viewer;
