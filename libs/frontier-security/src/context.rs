use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::object_ref::ObjectRef;

/// `RequestContext` carries the per-request caller identity and budget.
///
/// Built by the authentication middleware and threaded explicitly through
/// every engine call; the engine never reads ambient or global state to find
/// out who is asking.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated principal (`app/user:...`, `app/serviceuser:...`).
    /// `None` for anonymous requests.
    principal: Option<ObjectRef>,
    /// Organization the caller is acting within, when known.
    org_id: Option<Uuid>,
    /// Absolute deadline for the whole request.
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a new `RequestContext` builder
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Create an anonymous context with no principal and no deadline
    #[must_use]
    pub fn anonymous() -> Self {
        RequestContextBuilder::default().build()
    }

    #[must_use]
    pub fn principal(&self) -> Option<&ObjectRef> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn org_id(&self) -> Option<Uuid> {
        self.org_id
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when no deadline is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    /// Return a copy whose deadline is the earlier of the current one and `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }
}

#[derive(Default)]
pub struct RequestContextBuilder {
    principal: Option<ObjectRef>,
    org_id: Option<Uuid>,
    deadline: Option<Instant>,
}

impl RequestContextBuilder {
    #[must_use]
    pub fn principal(mut self, principal: ObjectRef) -> Self {
        self.principal = Some(principal);
        self
    }

    #[must_use]
    pub fn org_id(mut self, org_id: Uuid) -> Self {
        self.org_id = Some(org_id);
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            principal: self.principal,
            org_id: self.org_id,
            deadline: self.deadline,
        }
    }
}
