//! campus-cache: scrape-through cache behind a university chat bot.
//!
//! Lookups for courses, students, contacts, programs and stickers are served
//! from a local SQLite store. Misses are scraped from the campus sites with
//! retry, per-domain failover and request coalescing, then written back.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod services;
