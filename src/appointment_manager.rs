use crate::backend::{to_fields, CollectionExt, Document, DocumentStore, Fields};
use crate::error::ApiError;
use crate::query::{Direction, Operator};
use crate::types::{now, Appointment, AppointmentCreate, AppointmentStatus, Availability};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use validator::Validate;

pub const APPOINTMENTS: &str = "appointments";

const SLOT_TAKEN: &str =
    "This appointment slot is already booked. Please select a different time.";

/// Books appointments and answers availability queries.
///
/// The overlap check and the write are not atomic in the store. Creation is
/// serialized through `booking_lock`, which only covers this process: several
/// instances sharing one store can still double-book a slot.
pub struct AppointmentManager<S> {
    store: Arc<S>,
    booking_lock: Arc<Mutex<()>>,
}

impl<S> Clone for AppointmentManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            booking_lock: self.booking_lock.clone(),
        }
    }
}

fn active_statuses() -> Value {
    json!(AppointmentStatus::ACTIVE.map(|status| status.as_str()))
}

impl<S: DocumentStore> AppointmentManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            booking_lock: Arc::default(),
        }
    }

    pub fn create_appointment(&self, input: AppointmentCreate) -> Result<Appointment, ApiError> {
        input.validate()?;
        const ACTION: &str = "Failed to create appointment";

        let _guard = self.booking_lock.lock().unwrap_or_else(|poisoned| {
            warn!("booking lock was poisoned");
            poisoned.into_inner()
        });

        let collection = self.store.collection(APPOINTMENTS);
        let existing = collection
            .filter("appointment_date", Operator::Equal, input.appointment_date.as_str())
            .filter("appointment_time", Operator::Equal, input.appointment_time.as_str())
            .filter("status", Operator::In, active_statuses())
            .get()
            .map_err(ApiError::store(ACTION))?;
        if !existing.is_empty() {
            info!(
                date = %input.appointment_date,
                time = %input.appointment_time,
                "appointment slot already booked"
            );
            return Err(ApiError::Conflict(SLOT_TAKEN.into()));
        }

        let document = collection.new_document();
        let appointment = Appointment {
            id: document.id().to_string(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            business: input.business,
            industry: input.industry,
            service_interests: input.service_interests,
            appointment_date: input.appointment_date,
            appointment_time: input.appointment_time,
            message: input.message,
            created_at: now(),
            status: AppointmentStatus::Pending,
        };
        document
            .set(to_fields(&appointment).map_err(ApiError::store(ACTION))?)
            .map_err(ApiError::store(ACTION))?;

        info!(
            id = %appointment.id,
            email = %appointment.email,
            date = %appointment.appointment_date,
            time = %appointment.appointment_time,
            "created appointment"
        );
        Ok(appointment)
    }

    pub fn appointments(
        &self,
        limit: usize,
        status_filter: Option<&str>,
    ) -> Result<Vec<Appointment>, ApiError> {
        const ACTION: &str = "Failed to retrieve appointments";

        let mut query = self
            .store
            .collection(APPOINTMENTS)
            .order_by("created_at", Direction::Descending);
        if let Some(status) = status_filter {
            query = query.filter("status", Operator::Equal, status);
        }

        let appointments = query
            .limit(limit)
            .get()
            .and_then(|documents| {
                documents
                    .iter()
                    .map(Document::to_record)
                    .collect::<Result<Vec<Appointment>, _>>()
            })
            .map_err(ApiError::store(ACTION))?;

        info!("Retrieved {} appointments", appointments.len());
        Ok(appointments)
    }

    /// Sets the status of an existing appointment. Any transition between the
    /// four statuses is allowed.
    pub fn update_status(&self, id: &str, status: &str) -> Result<AppointmentStatus, ApiError> {
        const ACTION: &str = "Failed to update appointment status";

        let status: AppointmentStatus = status.parse().map_err(|_| ApiError::InvalidStatus)?;

        let document = self.store.collection(APPOINTMENTS).document(id);
        if !document.get().map_err(ApiError::store(ACTION))?.exists() {
            return Err(ApiError::NotFound("Appointment not found".into()));
        }

        let mut fields = Fields::new();
        fields.insert("status".into(), json!(status));
        document.update(fields).map_err(ApiError::store(ACTION))?;

        info!(id, %status, "updated appointment status");
        Ok(status)
    }

    pub fn availability(&self, date: &str, time: Option<&str>) -> Result<Availability, ApiError> {
        const ACTION: &str = "Failed to check availability";

        let mut query = self
            .store
            .collection(APPOINTMENTS)
            .filter("appointment_date", Operator::Equal, date)
            .filter("status", Operator::In, active_statuses());
        if let Some(time) = time {
            query = query.filter("appointment_time", Operator::Equal, time);
        }
        let documents = query.get().map_err(ApiError::store(ACTION))?;

        let availability = match time {
            Some(time) => {
                let available = documents.is_empty();
                Availability::Slot {
                    available,
                    date: date.into(),
                    time: time.into(),
                    message: if available {
                        "Time slot is available".into()
                    } else {
                        "Time slot is already booked".into()
                    },
                }
            }
            None => {
                let booked_times: Vec<String> = documents
                    .iter()
                    .filter_map(|document| document.field("appointment_time"))
                    .filter_map(|time| time.as_str().map(str::to_string))
                    .collect();
                Availability::Day {
                    date: date.into(),
                    message: format!(
                        "Found {} booked appointments for this date",
                        booked_times.len()
                    ),
                    booked_times,
                }
            }
        };
        Ok(availability)
    }
}
