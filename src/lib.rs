//! # Appointment Booking Bot
//!
//! A Telegram bot for booking time slots with a single service provider.
//!
//! ## Features
//! - Slot availability from weekly business hours and date exceptions
//! - Atomic reservations that never double-book a provider
//! - Optional admin approval of new bookings
//! - Appointment lifecycle with cancellation windows and no-show tracking
//! - Automatic reminders (24h and 1h before by default)
//! - Post-appointment completion confirmation with photo proof
//! - Persistent storage with SQLite

/// Booking core: slots, reservations, lifecycle, approvals and reminders
pub mod booking;
/// Bot command handlers and message processing
pub mod bot;
/// Configuration management and environment variables
pub mod config;
/// Database models, connections, and migrations
pub mod database;
/// Error taxonomy shared by the booking core and the chat layer
pub mod error;
/// Background services like reminders, notifications and health checks
pub mod services;
/// Utility functions for datetime, validation, logging and feedback
pub mod utils;
