pub mod admin;
pub mod booking;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Appointment booking commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start the bot")]
    Start,
    #[command(description = "List bookable services")]
    Services,
    #[command(description = "Show free slots: /slots <service_id> <YYYY-MM-DD>", parse_with = "split")]
    Slots { service_id: String, date: String },
    #[command(description = "Book a slot: /book <service_id> <YYYY-MM-DD> <HH:MM>", parse_with = "split")]
    Book { service_id: String, date: String, time: String },
    #[command(description = "Show your appointments")]
    MyBookings,
    #[command(description = "Booking rules and terms")]
    Faq,
    #[command(description = "Cancel an appointment: /cancel <appointment_id> [reason]")]
    Cancel { args: String },
    #[command(description = "(admin) List requests awaiting approval")]
    Pending,
    #[command(description = "(admin) Confirm a scheduled appointment: /confirm <appointment_id>")]
    Confirm { appointment_id: String },
    #[command(rename = "start_appt", description = "(admin) Mark an appointment as started: /start_appt <appointment_id>")]
    StartAppt { appointment_id: String },
    #[command(description = "(admin) Mark an appointment as completed: /complete <appointment_id>")]
    Complete { appointment_id: String },
    #[command(description = "(admin) Mark a client as no-show: /noshow <appointment_id>")]
    NoShow { appointment_id: String },
}
