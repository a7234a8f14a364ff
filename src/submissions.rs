use crate::backend::{to_fields, CollectionExt, Document, DocumentStore};
use crate::error::ApiError;
use crate::query::{Direction, Operator};
use crate::types::{now, ContactForm, ContactFormCreate, StatusCheck, StatusCheckCreate};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub const STATUS_CHECKS: &str = "status_checks";
pub const CONTACT_FORMS: &str = "contact_forms";

const NEW_CONTACT: &str = "new";

/// Status checks and contact form submissions: validated, stored, listed.
pub struct Submissions<S> {
    store: Arc<S>,
}

impl<S> Clone for Submissions<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DocumentStore> Submissions<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create_status_check(&self, input: StatusCheckCreate) -> Result<StatusCheck, ApiError> {
        input.validate()?;
        const ACTION: &str = "Failed to create status check";

        let document = self.store.collection(STATUS_CHECKS).new_document();
        let status_check = StatusCheck {
            id: document.id().to_string(),
            client_name: input.client_name,
            message: input.message,
            timestamp: now(),
        };
        document
            .set(to_fields(&status_check).map_err(ApiError::store(ACTION))?)
            .map_err(ApiError::store(ACTION))?;

        info!(id = %status_check.id, "created status check");
        Ok(status_check)
    }

    pub fn status_checks(&self, limit: usize) -> Result<Vec<StatusCheck>, ApiError> {
        let status_checks = self
            .store
            .collection(STATUS_CHECKS)
            .order_by("timestamp", Direction::Descending)
            .limit(limit)
            .get()
            .and_then(|documents| {
                documents
                    .iter()
                    .map(Document::to_record)
                    .collect::<Result<Vec<StatusCheck>, _>>()
            })
            .map_err(ApiError::store("Failed to retrieve status checks"))?;

        info!("Retrieved {} status checks", status_checks.len());
        Ok(status_checks)
    }

    pub fn submit_contact_form(&self, input: ContactFormCreate) -> Result<ContactForm, ApiError> {
        input.validate()?;
        const ACTION: &str = "Failed to submit contact form";

        let document = self.store.collection(CONTACT_FORMS).new_document();
        let contact_form = ContactForm {
            id: document.id().to_string(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            industry: input.industry,
            service: input.service,
            message: input.message,
            submitted_at: now(),
            status: NEW_CONTACT.into(),
        };
        document
            .set(to_fields(&contact_form).map_err(ApiError::store(ACTION))?)
            .map_err(ApiError::store(ACTION))?;

        info!(id = %contact_form.id, email = %contact_form.email, "contact form submitted");
        Ok(contact_form)
    }

    pub fn contact_forms(
        &self,
        limit: usize,
        status_filter: Option<&str>,
    ) -> Result<Vec<ContactForm>, ApiError> {
        let mut query = self
            .store
            .collection(CONTACT_FORMS)
            .order_by("submitted_at", Direction::Descending);
        if let Some(status) = status_filter {
            query = query.filter("status", Operator::Equal, status);
        }

        let contact_forms = query
            .limit(limit)
            .get()
            .and_then(|documents| {
                documents
                    .iter()
                    .map(Document::to_record)
                    .collect::<Result<Vec<ContactForm>, _>>()
            })
            .map_err(ApiError::store("Failed to retrieve contact forms"))?;

        info!("Retrieved {} contact forms", contact_forms.len());
        Ok(contact_forms)
    }
}
