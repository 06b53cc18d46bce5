mod admin;
mod auth;
mod catalog;
mod chapter;
mod common;
mod playback;
