use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::approval::{ApprovalCoordinator, Decision};
use crate::booking::clock::Clock;
use crate::booking::completion::CompletionService;
use crate::booking::hours::{BusinessHoursProvider, SqliteBusinessHours};
use crate::booking::lifecycle::LifecycleService;
use crate::booking::notifier::{NotificationRequest, Notifier};
use crate::booking::reminders::ReminderScheduler;
use crate::booking::reservation::{BookingReservationService, ReservationRequest};
use crate::booking::slots::{Slot, SlotAvailabilityCalculator};
use crate::booking::state_machine::Actor;
use crate::config::BookingConfig;
use crate::database::models::{Appointment, AppointmentStatus, CompletionResponse, Service};
use crate::database::store::{AppointmentStore, ServiceCatalog, SqliteStore};
use crate::error::BookingError;
use crate::utils::logging::log_timeout;

/// Entry point for the chat layer. Stateless between calls; cheap to clone.
#[derive(Clone)]
pub struct BookingEngine {
    store: Arc<dyn AppointmentStore>,
    catalog: Arc<dyn ServiceCatalog>,
    hours: Arc<dyn BusinessHoursProvider>,
    slots: SlotAvailabilityCalculator,
    reservations: BookingReservationService,
    lifecycle: LifecycleService,
    approvals: ApprovalCoordinator,
    completion: CompletionService,
    reminders: ReminderScheduler,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        catalog: Arc<dyn ServiceCatalog>,
        hours: Arc<dyn BusinessHoursProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            slots: SlotAvailabilityCalculator::new(hours.clone(), store.clone()),
            reservations: BookingReservationService::new(
                hours.clone(),
                store.clone(),
                catalog.clone(),
                clock.clone(),
                config.approval_required,
            ),
            lifecycle: LifecycleService::new(store.clone(), clock.clone(), config.cancellation_window),
            approvals: ApprovalCoordinator::new(store.clone(), clock.clone()),
            completion: CompletionService::new(store.clone(), clock.clone()),
            reminders: ReminderScheduler::new(store.clone(), notifier, config.reminder_leads.clone()),
            store,
            catalog,
            hours,
            clock,
            config,
        }
    }

    /// Engine over a single SQLite pool for appointments, services and hours.
    pub fn sqlite(
        pool: SqlitePool,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        Self::new(
            store.clone(),
            store,
            Arc::new(SqliteBusinessHours::new(pool)),
            notifier,
            clock,
            config,
        )
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fails with `Timeout` when `operation` exceeds the configured bound.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, BookingError>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log_timeout(operation, self.config.operation_timeout.as_secs(), None);
                Err(BookingError::Timeout(operation))
            }
        }
    }

    async fn active_service(&self, provider_id: i64, service_id: i64) -> Result<Service, BookingError> {
        match self.catalog.find_service(service_id).await? {
            Some(service) if service.active && service.provider_id == provider_id => Ok(service),
            _ => Err(BookingError::NotFound("service")),
        }
    }

    /// Reference timezone used to read and display a provider's wall-clock times.
    pub async fn provider_timezone(&self, provider_id: i64) -> Result<FixedOffset, BookingError> {
        self.hours
            .timezone(provider_id)
            .await?
            .ok_or(BookingError::NotFound("provider"))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, BookingError> {
        Ok(self.catalog.list_services().await?)
    }

    pub async fn find_service(&self, service_id: i64) -> Result<Service, BookingError> {
        match self.catalog.find_service(service_id).await? {
            Some(service) if service.active => Ok(service),
            _ => Err(BookingError::NotFound("service")),
        }
    }

    pub async fn list_available_slots(
        &self,
        provider_id: i64,
        date: NaiveDate,
        service_id: i64,
    ) -> Result<Vec<Slot>, BookingError> {
        self.bounded("list_slots", async {
            let service = self.active_service(provider_id, service_id).await?;
            self.slots
                .compute_slots(provider_id, date, service.duration_minutes)
                .await
        })
        .await
    }

    pub async fn reserve_slot(&self, request: ReservationRequest) -> Result<Appointment, BookingError> {
        self.bounded("reserve", self.reservations.reserve(request)).await
    }

    pub async fn resolve_approval(
        &self,
        appointment_id: Uuid,
        admin_id: i64,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Appointment, BookingError> {
        self.bounded(
            "resolve",
            self.approvals.resolve(appointment_id, admin_id, decision, note),
        )
        .await
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        self.bounded("cancel", self.lifecycle.cancel(appointment_id, actor, reason))
            .await
    }

    pub async fn confirm(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.bounded("confirm", self.lifecycle.confirm(appointment_id, actor))
            .await
    }

    pub async fn start_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.bounded("start", self.lifecycle.start(appointment_id, actor))
            .await
    }

    pub async fn complete_appointment(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.bounded("complete", self.lifecycle.complete(appointment_id, actor))
            .await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid, actor: Actor) -> Result<Appointment, BookingError> {
        self.bounded("no_show", self.lifecycle.mark_no_show(appointment_id, actor))
            .await
    }

    pub async fn tick_reminders(&self, now: DateTime<Utc>) -> Result<Vec<NotificationRequest>, BookingError> {
        self.reminders.tick(now).await
    }

    pub async fn record_completion_response(
        &self,
        appointment_id: Uuid,
        response: CompletionResponse,
    ) -> Result<Appointment, BookingError> {
        self.bounded(
            "completion_response",
            self.completion.record_response(appointment_id, response),
        )
        .await
    }

    pub async fn record_proof_upload(&self, appointment_id: Uuid, proof_ref: &str) -> Result<Appointment, BookingError> {
        self.bounded("proof_upload", self.completion.record_proof(appointment_id, proof_ref))
            .await
    }

    pub async fn find_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("appointment"))
    }

    pub async fn list_client_appointments(&self, client_id: i64) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.client_appointments(client_id).await?)
    }

    pub async fn list_pending_approvals(&self) -> Result<Vec<Appointment>, BookingError> {
        Ok(self
            .store
            .appointments_with_status(&[AppointmentStatus::PendingApproval])
            .await?)
    }
}
